use async_trait::async_trait;
use sea_orm::DbErr;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

use super::{
    CHANGE_FEED_CAPACITY, CashSessionPatch, ChangeEvent, ChangeKind, ChangeRecord, OrderFilter,
    OrderPatch, Store, TablePatch,
};
use crate::entities::{
    cash_adjustment_entity, cash_session_entity, order_entity, order_item_entity, table_entity,
};
use crate::error::{AppError, AppResult};
use crate::models::OrderDetail;

#[derive(Default)]
struct Rows {
    orders: HashMap<Uuid, order_entity::Model>,
    items: Vec<order_item_entity::Model>,
    tables: HashMap<Uuid, table_entity::Model>,
    sessions: HashMap<Uuid, cash_session_entity::Model>,
    adjustments: Vec<cash_adjustment_entity::Model>,
}

impl Rows {
    fn detail(&self, order: &order_entity::Model) -> OrderDetail {
        OrderDetail {
            order: order.clone(),
            items: self
                .items
                .iter()
                .filter(|i| i.order_id == order.id)
                .cloned()
                .collect(),
        }
    }
}

/// In-process store for `memory://` deployments and tests.
///
/// Mirrors the Postgres constraints the services rely on (single open session) and can
/// be told to reject writes or to behave as if the adjustments table were missing.
#[derive(Clone)]
pub struct MemoryStore {
    rows: Arc<RwLock<Rows>>,
    changes: broadcast::Sender<ChangeEvent>,
    fail_writes: Arc<AtomicBool>,
    adjustments_table: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            rows: Arc::new(RwLock::new(Rows::default())),
            changes,
            fail_writes: Arc::new(AtomicBool::new(false)),
            adjustments_table: true,
        }
    }

    /// A store whose schema predates cash adjustments.
    pub fn without_cash_adjustments() -> Self {
        Self {
            adjustments_table: false,
            ..Self::new()
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> AppResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseError(DbErr::Custom(
                "memory store rejected the write".to_string(),
            )));
        }
        Ok(())
    }

    fn check_adjustments_table(&self) -> AppResult<()> {
        if !self.adjustments_table {
            return Err(AppError::DatabaseError(DbErr::Custom(
                "relation \"cash_adjustments\" does not exist".to_string(),
            )));
        }
        Ok(())
    }

    fn publish(&self, kind: ChangeKind, record: ChangeRecord) {
        let _ = self.changes.send(ChangeEvent::new(kind, record));
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_order(&self, id: Uuid) -> AppResult<Option<OrderDetail>> {
        let rows = self.rows.read().await;
        Ok(rows.orders.get(&id).map(|o| rows.detail(o)))
    }

    async fn list_orders(&self, filter: &OrderFilter) -> AppResult<Vec<OrderDetail>> {
        let rows = self.rows.read().await;
        let mut orders: Vec<&order_entity::Model> =
            rows.orders.values().filter(|o| filter.matches(o)).collect();
        orders.sort_by(|a, b| b.order_time.cmp(&a.order_time));
        if let Some(limit) = filter.limit {
            orders.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }
        Ok(orders.into_iter().map(|o| rows.detail(o)).collect())
    }

    async fn insert_order(
        &self,
        order: order_entity::Model,
        items: Vec<order_item_entity::Model>,
    ) -> AppResult<()> {
        self.check_writable()?;
        {
            let mut rows = self.rows.write().await;
            if rows.orders.contains_key(&order.id) {
                return Err(AppError::Conflict(format!("Order {} already exists", order.id)));
            }
            rows.orders.insert(order.id, order.clone());
            rows.items.extend(items.iter().cloned());
        }
        self.publish(ChangeKind::Insert, ChangeRecord::Order(order));
        for item in items {
            self.publish(ChangeKind::Insert, ChangeRecord::OrderItem(item));
        }
        Ok(())
    }

    async fn update_order(&self, id: Uuid, patch: &OrderPatch) -> AppResult<()> {
        self.check_writable()?;
        let updated = {
            let mut rows = self.rows.write().await;
            let order = rows
                .orders
                .get_mut(&id)
                .ok_or_else(|| AppError::NotFound(format!("Order {id} not found")))?;
            patch.apply(order);
            order.clone()
        };
        self.publish(ChangeKind::Update, ChangeRecord::Order(updated));
        Ok(())
    }

    async fn append_order_items(
        &self,
        id: Uuid,
        items: Vec<order_item_entity::Model>,
        patch: &OrderPatch,
    ) -> AppResult<()> {
        self.check_writable()?;
        let updated = {
            let mut rows = self.rows.write().await;
            let order = rows
                .orders
                .get_mut(&id)
                .ok_or_else(|| AppError::NotFound(format!("Order {id} not found")))?;
            patch.apply(order);
            let updated = order.clone();
            rows.items.extend(items.iter().cloned());
            updated
        };
        for item in items {
            self.publish(ChangeKind::Insert, ChangeRecord::OrderItem(item));
        }
        self.publish(ChangeKind::Update, ChangeRecord::Order(updated));
        Ok(())
    }

    async fn get_table(&self, id: Uuid) -> AppResult<Option<table_entity::Model>> {
        Ok(self.rows.read().await.tables.get(&id).cloned())
    }

    async fn list_tables(&self) -> AppResult<Vec<table_entity::Model>> {
        let mut tables: Vec<_> = self.rows.read().await.tables.values().cloned().collect();
        tables.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tables)
    }

    async fn insert_table(&self, table: table_entity::Model) -> AppResult<table_entity::Model> {
        self.check_writable()?;
        self.rows
            .write()
            .await
            .tables
            .insert(table.id, table.clone());
        self.publish(ChangeKind::Insert, ChangeRecord::Table(table.clone()));
        Ok(table)
    }

    async fn update_table(
        &self,
        id: Uuid,
        patch: &TablePatch,
    ) -> AppResult<table_entity::Model> {
        self.check_writable()?;
        let updated = {
            let mut rows = self.rows.write().await;
            let table = rows
                .tables
                .get_mut(&id)
                .ok_or_else(|| AppError::NotFound(format!("Table {id} not found")))?;
            patch.apply(table);
            table.clone()
        };
        self.publish(ChangeKind::Update, ChangeRecord::Table(updated.clone()));
        Ok(updated)
    }

    async fn delete_table(&self, id: Uuid) -> AppResult<()> {
        self.check_writable()?;
        let removed = self
            .rows
            .write()
            .await
            .tables
            .remove(&id)
            .ok_or_else(|| AppError::NotFound(format!("Table {id} not found")))?;
        self.publish(ChangeKind::Delete, ChangeRecord::Table(removed));
        Ok(())
    }

    async fn get_cash_session(&self, id: Uuid) -> AppResult<Option<cash_session_entity::Model>> {
        Ok(self.rows.read().await.sessions.get(&id).cloned())
    }

    async fn list_cash_sessions(&self) -> AppResult<Vec<cash_session_entity::Model>> {
        let mut sessions: Vec<_> = self.rows.read().await.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| b.opened_at.cmp(&a.opened_at));
        Ok(sessions)
    }

    async fn find_open_cash_session(&self) -> AppResult<Option<cash_session_entity::Model>> {
        Ok(self
            .rows
            .read()
            .await
            .sessions
            .values()
            .find(|s| s.is_open())
            .cloned())
    }

    async fn insert_cash_session(
        &self,
        session: cash_session_entity::Model,
    ) -> AppResult<cash_session_entity::Model> {
        self.check_writable()?;
        {
            let mut rows = self.rows.write().await;
            if session.is_open() && rows.sessions.values().any(|s| s.is_open()) {
                return Err(AppError::Conflict(
                    "A cash register session is already open".to_string(),
                ));
            }
            rows.sessions.insert(session.id, session.clone());
        }
        self.publish(ChangeKind::Insert, ChangeRecord::CashSession(session.clone()));
        Ok(session)
    }

    async fn update_cash_session(
        &self,
        id: Uuid,
        patch: &CashSessionPatch,
    ) -> AppResult<cash_session_entity::Model> {
        self.check_writable()?;
        let updated = {
            let mut rows = self.rows.write().await;
            let session = rows.sessions.get_mut(&id).ok_or_else(|| {
                AppError::NotFound(format!("Cash register session {id} not found"))
            })?;
            patch.apply(session);
            session.clone()
        };
        self.publish(ChangeKind::Update, ChangeRecord::CashSession(updated.clone()));
        Ok(updated)
    }

    async fn cash_adjustments_available(&self) -> AppResult<bool> {
        Ok(self.adjustments_table)
    }

    async fn list_cash_adjustments(
        &self,
        session_id: Option<Uuid>,
    ) -> AppResult<Vec<cash_adjustment_entity::Model>> {
        self.check_adjustments_table()?;
        let mut adjustments: Vec<_> = self
            .rows
            .read()
            .await
            .adjustments
            .iter()
            .filter(|a| session_id.is_none_or(|id| a.cash_register_session_id == id))
            .cloned()
            .collect();
        adjustments.sort_by(|a, b| b.adjusted_at.cmp(&a.adjusted_at));
        Ok(adjustments)
    }

    async fn insert_cash_adjustment(
        &self,
        adjustment: cash_adjustment_entity::Model,
    ) -> AppResult<cash_adjustment_entity::Model> {
        self.check_adjustments_table()?;
        self.check_writable()?;
        self.rows.write().await.adjustments.push(adjustment.clone());
        self.publish(
            ChangeKind::Insert,
            ChangeRecord::CashAdjustment(adjustment.clone()),
        );
        Ok(adjustment)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{CashSessionStatus, OrderStatus, OrderType, TableStatus};
    use chrono::{Duration, Utc};

    fn order(status: OrderStatus, minutes_ago: i64) -> order_entity::Model {
        let at = Utc::now() - Duration::minutes(minutes_ago);
        order_entity::Model {
            id: Uuid::new_v4(),
            customer_id: None,
            customer_name: "Walk-in".to_string(),
            customer_phone: None,
            customer_address: None,
            notes: None,
            total_amount: 1000,
            status,
            order_type: OrderType::Counter,
            table_id: None,
            payment_method: None,
            amount_paid: None,
            change_due: None,
            cash_register_session_id: None,
            order_time: at,
            last_status_change_time: at,
            next_auto_transition_time: None,
            auto_progress: false,
            current_progress_percent: 0,
            created_at: at,
        }
    }

    fn session() -> cash_session_entity::Model {
        let now = Utc::now();
        cash_session_entity::Model {
            id: Uuid::new_v4(),
            opened_at: now,
            closed_at: None,
            opening_balance: 0,
            calculated_sales: None,
            expected_in_cash: None,
            closing_balance_informed: None,
            difference: None,
            notes_opening: None,
            notes_closing: None,
            status: CashSessionStatus::Open,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn list_orders_filters_sorts_and_limits() {
        let store = MemoryStore::new();
        let old = order(OrderStatus::Delivered, 30);
        let mid = order(OrderStatus::Pending, 20);
        let new = order(OrderStatus::Preparing, 10);
        for o in [&old, &mid, &new] {
            store.insert_order(o.clone(), vec![]).await.unwrap();
        }

        let open = store.list_orders(&OrderFilter::non_terminal()).await.unwrap();
        let ids: Vec<_> = open.iter().map(|d| d.id()).collect();
        assert_eq!(ids, vec![new.id, mid.id]);

        let recent = store.list_orders(&OrderFilter::recent(1)).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id(), new.id);

        let since = Utc::now() - Duration::minutes(25);
        let placed = store.list_orders(&OrderFilter::placed_since(since)).await.unwrap();
        let ids: Vec<_> = placed.iter().map(|d| d.id()).collect();
        assert_eq!(ids, vec![new.id, mid.id]);

        let delivered = OrderFilter::placed_since(Utc::now() - Duration::minutes(60))
            .with_statuses(vec![OrderStatus::Delivered]);
        let delivered = store.list_orders(&delivered).await.unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].id(), old.id);
    }

    #[tokio::test]
    async fn second_open_session_is_a_conflict() {
        let store = MemoryStore::new();
        store.insert_cash_session(session()).await.unwrap();
        let err = store.insert_cash_session(session()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn failed_write_leaves_rows_untouched() {
        let store = MemoryStore::new();
        let o = order(OrderStatus::Pending, 1);
        store.insert_order(o.clone(), vec![]).await.unwrap();

        store.set_fail_writes(true);
        let patch = OrderPatch {
            status: Some(OrderStatus::Preparing),
            ..Default::default()
        };
        assert!(matches!(
            store.update_order(o.id, &patch).await,
            Err(AppError::DatabaseError(_))
        ));
        let stored = store.get_order(o.id).await.unwrap().unwrap();
        assert_eq!(stored.order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn writes_are_published_on_the_change_feed() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe();
        let now = Utc::now();
        let table = table_entity::Model {
            id: Uuid::new_v4(),
            name: "1".to_string(),
            capacity: 2,
            status: TableStatus::Available,
            current_order_id: None,
            reservation_details: None,
            created_at: now,
        };
        store.insert_table(table.clone()).await.unwrap();
        store.delete_table(table.id).await.unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.kind, ChangeKind::Insert);
        assert_eq!(first.record.table(), "tables");
        let second = rx.recv().await.unwrap();
        assert_eq!(second.kind, ChangeKind::Delete);
    }

    #[tokio::test]
    async fn missing_adjustments_table_reports_unavailable() {
        let store = MemoryStore::without_cash_adjustments();
        assert!(!store.cash_adjustments_available().await.unwrap());
        let err = store.list_cash_adjustments(None).await.unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
