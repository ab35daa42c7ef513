use std::sync::Arc;
use uuid::Uuid;

use crate::entities::{CashSessionStatus, cash_adjustment_entity, cash_session_entity};
use crate::error::{AppError, AppResult};
use crate::models::{
    CloseCashRegisterRequest, CreateCashAdjustmentRequest, Notice, OpenCashRegisterRequest,
    SessionSummary,
};
use crate::services::AppState;
use crate::services::ledger::SessionTotals;
use crate::store::{CashSessionPatch, OrderFilter, Store};
use crate::utils::{Clock, format_cents};

#[derive(Clone)]
pub struct CashRegisterService {
    store: Arc<dyn Store>,
    state: AppState,
    clock: Arc<dyn Clock>,
}

fn trimmed(notes: Option<String>) -> Option<String> {
    notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}

impl CashRegisterService {
    pub fn new(store: Arc<dyn Store>, state: AppState, clock: Arc<dyn Clock>) -> Self {
        Self { store, state, clock }
    }

    pub async fn list_sessions(&self) -> Vec<cash_session_entity::Model> {
        self.state.sessions().await
    }

    pub async fn active_session(&self) -> Option<cash_session_entity::Model> {
        self.state.active_session().await
    }

    pub async fn list_adjustments(
        &self,
        session_id: Uuid,
    ) -> AppResult<Vec<cash_adjustment_entity::Model>> {
        self.session(session_id).await?;
        Ok(self.state.adjustments(Some(session_id)).await)
    }

    async fn session(&self, id: Uuid) -> AppResult<cash_session_entity::Model> {
        if let Some(session) = self.state.session(id).await {
            return Ok(session);
        }
        self.store.get_cash_session(id).await?.ok_or_else(|| {
            AppError::NotFound(format!("Cash register session {id} not found"))
        })
    }

    pub async fn open_cash_register(
        &self,
        req: OpenCashRegisterRequest,
    ) -> AppResult<cash_session_entity::Model> {
        if req.opening_balance < 0 {
            return Err(AppError::ValidationError(
                "Opening balance cannot be negative".to_string(),
            ));
        }
        if self.state.active_session().await.is_some() {
            return Err(AppError::Conflict(
                "A cash register session is already open".to_string(),
            ));
        }
        if let Some(open) = self.store.find_open_cash_session().await? {
            self.state.put_session(open).await;
            return Err(AppError::Conflict(
                "A cash register session is already open".to_string(),
            ));
        }

        let now = self.clock.now();
        let session = cash_session_entity::Model {
            id: Uuid::new_v4(),
            opened_at: now,
            closed_at: None,
            opening_balance: req.opening_balance,
            calculated_sales: None,
            expected_in_cash: None,
            closing_balance_informed: None,
            difference: None,
            notes_opening: trimmed(req.notes),
            notes_closing: None,
            status: CashSessionStatus::Open,
            created_at: now,
        };
        let session = self.store.insert_cash_session(session).await?;
        self.state.put_session(session.clone()).await;
        log::info!(
            "Cash register session {} opened with {}",
            session.id,
            session.opening_balance
        );
        self.state.notify(Notice::success(format!(
            "Till opened with {}",
            format_cents(session.opening_balance)
        )));
        Ok(session)
    }

    /// Live totals for a session, read from the store rather than the mirror so that
    /// orders outside the mirrored window still count.
    async fn live_totals(&self, session: &cash_session_entity::Model) -> AppResult<SessionTotals> {
        let orders = self
            .store
            .list_orders(&OrderFilter::for_session(session.id))
            .await?;
        let adjustments = if self.state.adjustments_available() {
            self.store.list_cash_adjustments(Some(session.id)).await?
        } else {
            Vec::new()
        };
        Ok(SessionTotals::compute(
            session.id,
            session.opening_balance,
            orders.iter().map(|d| &d.order),
            &adjustments,
        ))
    }

    pub async fn close_cash_register(
        &self,
        id: Uuid,
        req: CloseCashRegisterRequest,
    ) -> AppResult<cash_session_entity::Model> {
        if req.closing_balance_informed < 0 {
            return Err(AppError::ValidationError(
                "Closing balance cannot be negative".to_string(),
            ));
        }
        let session = self.session(id).await?;
        if !session.is_open() {
            return Err(AppError::Conflict(format!(
                "Cash register session {id} is already closed"
            )));
        }

        let totals = self.live_totals(&session).await?;
        let difference = totals.difference(req.closing_balance_informed);
        let patch = CashSessionPatch {
            status: Some(CashSessionStatus::Closed),
            closed_at: Some(self.clock.now()),
            calculated_sales: Some(totals.sales_from_orders),
            expected_in_cash: Some(totals.expected_in_cash),
            closing_balance_informed: Some(req.closing_balance_informed),
            difference: Some(difference),
            notes_closing: trimmed(req.notes),
        };
        let closed = self.store.update_cash_session(id, &patch).await?;
        self.state.put_session(closed.clone()).await;
        log::info!(
            "Cash register session {id} closed: expected={} informed={} difference={difference}",
            totals.expected_in_cash,
            req.closing_balance_informed
        );

        let message = format!("Till closed. Difference: {}", format_cents(difference));
        self.state.notify(if difference == 0 {
            Notice::success(message)
        } else {
            Notice::info(message)
        });
        Ok(closed)
    }

    pub async fn add_cash_adjustment(
        &self,
        session_id: Uuid,
        req: CreateCashAdjustmentRequest,
    ) -> AppResult<cash_adjustment_entity::Model> {
        if !self.state.adjustments_available() {
            return Err(AppError::Unavailable(
                "Cash adjustments are disabled: the cash_adjustments table is missing, run the migrations"
                    .to_string(),
            ));
        }
        if req.amount <= 0 {
            return Err(AppError::ValidationError(
                "Adjustment amount must be greater than zero".to_string(),
            ));
        }
        let reason = req.reason.trim();
        if reason.is_empty() {
            return Err(AppError::ValidationError(
                "Adjustment reason is required".to_string(),
            ));
        }
        let session = self.session(session_id).await?;
        if !session.is_open() {
            return Err(AppError::Conflict(format!(
                "Cash register session {session_id} is closed"
            )));
        }

        let now = self.clock.now();
        let adjustment = cash_adjustment_entity::Model {
            id: Uuid::new_v4(),
            cash_register_session_id: session_id,
            adjustment_type: req.adjustment_type,
            amount: req.amount,
            reason: reason.to_string(),
            adjusted_at: now,
            created_at: now,
        };
        let adjustment = self.store.insert_cash_adjustment(adjustment).await?;
        self.state.put_adjustment(adjustment.clone()).await;
        self.state.notify(Notice::success(format!(
            "Cash {} of {} recorded",
            adjustment.adjustment_type,
            format_cents(adjustment.amount)
        )));
        Ok(adjustment)
    }

    pub async fn session_summary(&self, id: Uuid) -> AppResult<SessionSummary> {
        let session = self.session(id).await?;
        let totals = self.live_totals(&session).await?;
        let (sales_from_orders, expected_in_cash) = match session.status {
            CashSessionStatus::Closed => (
                session.calculated_sales.unwrap_or(totals.sales_from_orders),
                session.expected_in_cash.unwrap_or(totals.expected_in_cash),
            ),
            CashSessionStatus::Open => (totals.sales_from_orders, totals.expected_in_cash),
        };
        Ok(SessionSummary {
            session_id: session.id,
            status: session.status,
            opening_balance: session.opening_balance,
            sales_from_orders,
            added_adjustments: totals.added_adjustments,
            removed_adjustments: totals.removed_adjustments,
            expected_in_cash,
            closing_balance_informed: session.closing_balance_informed,
            difference: session.difference,
        })
    }
}
