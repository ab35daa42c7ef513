//! Persistence boundary.
//!
//! Every durable read and write the services perform goes through [`Store`]. Writes are
//! expressed as patches (`None` leaves a column alone, `Some(v)` sets it) so each
//! operation can build its whole change up front and persist it in one call.
//! Implementations publish a [`ChangeEvent`] for each row they write.

mod memory;
mod sea_orm_store;

pub use memory::MemoryStore;
pub use sea_orm_store::SeaOrmStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::entities::{
    CashSessionStatus, OrderStatus, PaymentMethod, TableStatus, cash_adjustment_entity,
    cash_session_entity, order_entity, order_item_entity, table_entity,
};
use crate::error::AppResult;
use crate::models::OrderDetail;

pub const CHANGE_FEED_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChangeRecord {
    Order(order_entity::Model),
    OrderItem(order_item_entity::Model),
    Table(table_entity::Model),
    CashSession(cash_session_entity::Model),
    CashAdjustment(cash_adjustment_entity::Model),
}

impl ChangeRecord {
    pub fn table(&self) -> &'static str {
        match self {
            ChangeRecord::Order(_) => "orders",
            ChangeRecord::OrderItem(_) => "order_items",
            ChangeRecord::Table(_) => "tables",
            ChangeRecord::CashSession(_) => "cash_register_sessions",
            ChangeRecord::CashAdjustment(_) => "cash_adjustments",
        }
    }
}

/// Row-level change notification.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub record: ChangeRecord,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, record: ChangeRecord) -> Self {
        Self { kind, record }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub statuses: Option<Vec<OrderStatus>>,
    pub cash_register_session_id: Option<Uuid>,
    /// Orders placed at or after this instant.
    pub placed_since: Option<DateTime<Utc>>,
    /// Newest first, capped.
    pub limit: Option<u64>,
}

impl OrderFilter {
    pub fn non_terminal() -> Self {
        Self {
            statuses: Some(vec![
                OrderStatus::Pending,
                OrderStatus::Preparing,
                OrderStatus::ReadyForPickup,
                OrderStatus::OutForDelivery,
            ]),
            ..Default::default()
        }
    }

    pub fn recent(limit: u64) -> Self {
        Self {
            limit: Some(limit),
            ..Default::default()
        }
    }

    pub fn for_session(session_id: Uuid) -> Self {
        Self {
            cash_register_session_id: Some(session_id),
            ..Default::default()
        }
    }

    pub fn placed_since(since: DateTime<Utc>) -> Self {
        Self {
            placed_since: Some(since),
            ..Default::default()
        }
    }

    pub fn with_statuses(mut self, statuses: Vec<OrderStatus>) -> Self {
        self.statuses = Some(statuses);
        self
    }

    pub fn matches(&self, order: &order_entity::Model) -> bool {
        if let Some(statuses) = &self.statuses
            && !statuses.contains(&order.status)
        {
            return false;
        }
        if let Some(session_id) = self.cash_register_session_id
            && order.cash_register_session_id != Some(session_id)
        {
            return false;
        }
        self.placed_since.is_none_or(|since| order.order_time >= since)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderPatch {
    pub status: Option<OrderStatus>,
    pub total_amount: Option<i64>,
    pub payment_method: Option<Option<PaymentMethod>>,
    pub amount_paid: Option<Option<i64>>,
    pub change_due: Option<Option<i64>>,
    pub cash_register_session_id: Option<Option<Uuid>>,
    pub last_status_change_time: Option<DateTime<Utc>>,
    pub next_auto_transition_time: Option<Option<DateTime<Utc>>>,
    pub auto_progress: Option<bool>,
    pub current_progress_percent: Option<i32>,
}

impl OrderPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn apply(&self, order: &mut order_entity::Model) {
        if let Some(v) = self.status {
            order.status = v;
        }
        if let Some(v) = self.total_amount {
            order.total_amount = v;
        }
        if let Some(v) = self.payment_method {
            order.payment_method = v;
        }
        if let Some(v) = self.amount_paid {
            order.amount_paid = v;
        }
        if let Some(v) = self.change_due {
            order.change_due = v;
        }
        if let Some(v) = self.cash_register_session_id {
            order.cash_register_session_id = v;
        }
        if let Some(v) = self.last_status_change_time {
            order.last_status_change_time = v;
        }
        if let Some(v) = self.next_auto_transition_time {
            order.next_auto_transition_time = v;
        }
        if let Some(v) = self.auto_progress {
            order.auto_progress = v;
        }
        if let Some(v) = self.current_progress_percent {
            order.current_progress_percent = v;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TablePatch {
    pub name: Option<String>,
    pub capacity: Option<i32>,
    pub status: Option<TableStatus>,
    pub current_order_id: Option<Option<Uuid>>,
    pub reservation_details: Option<Option<serde_json::Value>>,
}

impl TablePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, table: &mut table_entity::Model) {
        if let Some(v) = &self.name {
            table.name = v.clone();
        }
        if let Some(v) = self.capacity {
            table.capacity = v;
        }
        if let Some(v) = self.status {
            table.status = v;
        }
        if let Some(v) = self.current_order_id {
            table.current_order_id = v;
        }
        if let Some(v) = &self.reservation_details {
            table.reservation_details = v.clone();
        }
    }
}

/// Closing a session is its only mutation, so every field here is write-once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CashSessionPatch {
    pub status: Option<CashSessionStatus>,
    pub closed_at: Option<DateTime<Utc>>,
    pub calculated_sales: Option<i64>,
    pub expected_in_cash: Option<i64>,
    pub closing_balance_informed: Option<i64>,
    pub difference: Option<i64>,
    pub notes_closing: Option<String>,
}

impl CashSessionPatch {
    pub fn apply(&self, session: &mut cash_session_entity::Model) {
        if let Some(v) = self.status {
            session.status = v;
        }
        if let Some(v) = self.closed_at {
            session.closed_at = Some(v);
        }
        if let Some(v) = self.calculated_sales {
            session.calculated_sales = Some(v);
        }
        if let Some(v) = self.expected_in_cash {
            session.expected_in_cash = Some(v);
        }
        if let Some(v) = self.closing_balance_informed {
            session.closing_balance_informed = Some(v);
        }
        if let Some(v) = self.difference {
            session.difference = Some(v);
        }
        if let Some(v) = &self.notes_closing {
            session.notes_closing = Some(v.clone());
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn get_order(&self, id: Uuid) -> AppResult<Option<OrderDetail>>;
    /// Newest `order_time` first.
    async fn list_orders(&self, filter: &OrderFilter) -> AppResult<Vec<OrderDetail>>;
    /// Inserts the order and its items atomically.
    async fn insert_order(
        &self,
        order: order_entity::Model,
        items: Vec<order_item_entity::Model>,
    ) -> AppResult<()>;
    async fn update_order(&self, id: Uuid, patch: &OrderPatch) -> AppResult<()>;
    /// Inserts items and applies the patch atomically.
    async fn append_order_items(
        &self,
        id: Uuid,
        items: Vec<order_item_entity::Model>,
        patch: &OrderPatch,
    ) -> AppResult<()>;

    async fn get_table(&self, id: Uuid) -> AppResult<Option<table_entity::Model>>;
    async fn list_tables(&self) -> AppResult<Vec<table_entity::Model>>;
    async fn insert_table(&self, table: table_entity::Model) -> AppResult<table_entity::Model>;
    async fn update_table(&self, id: Uuid, patch: &TablePatch)
    -> AppResult<table_entity::Model>;
    async fn delete_table(&self, id: Uuid) -> AppResult<()>;

    async fn get_cash_session(&self, id: Uuid) -> AppResult<Option<cash_session_entity::Model>>;
    /// Newest `opened_at` first.
    async fn list_cash_sessions(&self) -> AppResult<Vec<cash_session_entity::Model>>;
    async fn find_open_cash_session(&self) -> AppResult<Option<cash_session_entity::Model>>;
    /// Fails with `Conflict` when another session is already open.
    async fn insert_cash_session(
        &self,
        session: cash_session_entity::Model,
    ) -> AppResult<cash_session_entity::Model>;
    async fn update_cash_session(
        &self,
        id: Uuid,
        patch: &CashSessionPatch,
    ) -> AppResult<cash_session_entity::Model>;

    /// Whether the adjustments table exists in this deployment.
    async fn cash_adjustments_available(&self) -> AppResult<bool>;
    /// Newest `adjusted_at` first; all sessions when `session_id` is `None`.
    async fn list_cash_adjustments(
        &self,
        session_id: Option<Uuid>,
    ) -> AppResult<Vec<cash_adjustment_entity::Model>>;
    async fn insert_cash_adjustment(
        &self,
        adjustment: cash_adjustment_entity::Model,
    ) -> AppResult<cash_adjustment_entity::Model>;

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;
}
