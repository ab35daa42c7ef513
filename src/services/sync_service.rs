use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::error::AppResult;
use crate::services::AppState;
use crate::store::{ChangeEvent, ChangeKind, ChangeRecord, OrderFilter, Store};

/// How many of the latest orders are mirrored on top of the open ones.
pub const RECENT_ORDERS_WINDOW: u64 = 100;

/// Keeps the in-memory mirror in step with the store.
#[derive(Clone)]
pub struct SyncService {
    store: Arc<dyn Store>,
    state: AppState,
}

impl SyncService {
    pub fn new(store: Arc<dyn Store>, state: AppState) -> Self {
        Self { store, state }
    }

    /// Full load of the mirror.
    pub async fn bootstrap(&self) -> AppResult<()> {
        let tables = self.store.list_tables().await?;

        let mut orders = HashMap::new();
        for detail in self.store.list_orders(&OrderFilter::non_terminal()).await? {
            orders.insert(detail.id(), detail);
        }
        for detail in self
            .store
            .list_orders(&OrderFilter::recent(RECENT_ORDERS_WINDOW))
            .await?
        {
            orders.entry(detail.id()).or_insert(detail);
        }

        let sessions = self.store.list_cash_sessions().await?;

        let available = self.store.cash_adjustments_available().await?;
        let adjustments = if available {
            self.store.list_cash_adjustments(None).await?
        } else {
            log::warn!("Cash adjustments are unavailable in this deployment");
            Vec::new()
        };

        log::info!(
            "Mirror loaded: {} tables, {} orders, {} sessions, {} adjustments",
            tables.len(),
            orders.len(),
            sessions.len(),
            adjustments.len()
        );
        self.state.replace_tables(tables).await;
        self.state.replace_orders(orders.into_values().collect()).await;
        self.state.replace_sessions(sessions).await;
        self.state.set_adjustments_available(available);
        self.state.replace_adjustments(adjustments).await;
        Ok(())
    }

    /// Folds one change notification into the mirror.
    pub async fn apply(&self, event: ChangeEvent) -> AppResult<()> {
        match (event.kind, event.record) {
            (_, ChangeRecord::Order(order)) => self.refresh_order(order.id).await?,
            (_, ChangeRecord::OrderItem(item)) => self.refresh_order(item.order_id).await?,
            (ChangeKind::Delete, ChangeRecord::Table(table)) => {
                self.state.remove_table(table.id).await
            }
            (_, ChangeRecord::Table(table)) => self.state.put_table(table).await,
            (_, ChangeRecord::CashSession(session)) => self.state.put_session(session).await,
            (_, ChangeRecord::CashAdjustment(adjustment)) => {
                self.state.put_adjustment(adjustment).await
            }
        }
        Ok(())
    }

    async fn refresh_order(&self, id: uuid::Uuid) -> AppResult<()> {
        if let Some(detail) = self.store.get_order(id).await? {
            self.state.put_order(detail).await;
        }
        Ok(())
    }

    /// Consumes the store change feed until it closes. Falling behind triggers a reload.
    pub async fn run_realtime(&self) {
        let mut changes = self.store.subscribe();
        loop {
            match changes.recv().await {
                Ok(event) => {
                    let table = event.record.table();
                    if let Err(e) = self.apply(event).await {
                        log::error!("Failed to apply {table} change: {e}");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Change feed lagged by {skipped} events, reloading mirror");
                    if let Err(e) = self.bootstrap().await {
                        log::error!("Mirror reload failed: {e}");
                    }
                }
                Err(RecvError::Closed) => {
                    log::info!("Change feed closed, realtime sync stopped");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{TableStatus, table_entity};
    use crate::store::{MemoryStore, TablePatch};
    use chrono::Utc;
    use uuid::Uuid;

    fn table(name: &str) -> table_entity::Model {
        table_entity::Model {
            id: Uuid::new_v4(),
            name: name.to_string(),
            capacity: 4,
            status: TableStatus::Available,
            current_order_id: None,
            reservation_details: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn bootstrap_loads_rows_and_detects_adjustments() {
        let store = Arc::new(MemoryStore::without_cash_adjustments());
        store.insert_table(table("T2")).await.unwrap();
        store.insert_table(table("T1")).await.unwrap();
        let state = AppState::new();
        state.set_adjustments_available(true);

        SyncService::new(store, state.clone()).bootstrap().await.unwrap();

        let names: Vec<_> = state.tables().await.into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["T1", "T2"]);
        assert!(!state.adjustments_available());
    }

    #[tokio::test]
    async fn change_feed_updates_and_removes_tables() {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new();
        let sync = SyncService::new(store.clone(), state.clone());
        let mut feed = store.subscribe();

        let t = store.insert_table(table("Patio")).await.unwrap();
        sync.apply(feed.recv().await.unwrap()).await.unwrap();
        assert!(state.table(t.id).await.is_some());

        let patch = TablePatch {
            status: Some(TableStatus::Reserved),
            ..Default::default()
        };
        store.update_table(t.id, &patch).await.unwrap();
        sync.apply(feed.recv().await.unwrap()).await.unwrap();
        assert_eq!(state.table(t.id).await.unwrap().status, TableStatus::Reserved);

        store.delete_table(t.id).await.unwrap();
        sync.apply(feed.recv().await.unwrap()).await.unwrap();
        assert!(state.table(t.id).await.is_none());
    }
}
