//! In-memory mirror of the store and the event channel UIs listen on.
//!
//! Services update the mirror only after a write succeeded and the row was re-read, so a
//! failed persistence call never leaves it ahead of the store. The lock is never held
//! across a store call.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

use crate::entities::{cash_adjustment_entity, cash_session_entity, table_entity};
use crate::models::{AppEvent, Notice, NoticeLevel, OrderDetail};

pub const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Default)]
struct Mirror {
    orders: HashMap<Uuid, OrderDetail>,
    /// Published progress values not yet written back.
    live_progress: HashMap<Uuid, i32>,
    tables: HashMap<Uuid, table_entity::Model>,
    sessions: HashMap<Uuid, cash_session_entity::Model>,
    adjustments: HashMap<Uuid, cash_adjustment_entity::Model>,
}

impl Mirror {
    fn order_view(&self, detail: &OrderDetail) -> OrderDetail {
        let mut view = detail.clone();
        if let Some(live) = self.live_progress.get(&detail.order.id) {
            view.order.current_progress_percent = *live;
        }
        view
    }
}

#[derive(Clone)]
pub struct AppState {
    mirror: Arc<RwLock<Mirror>>,
    adjustments_available: Arc<AtomicBool>,
    events: broadcast::Sender<AppEvent>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            mirror: Arc::new(RwLock::new(Mirror::default())),
            adjustments_available: Arc::new(AtomicBool::new(false)),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: AppEvent) {
        let _ = self.events.send(event);
    }

    pub fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Error => log::error!("{}", notice.message),
            NoticeLevel::Info | NoticeLevel::Success => log::info!("{}", notice.message),
        }
        self.publish(AppEvent::Notice(notice));
    }

    // orders

    pub async fn order(&self, id: Uuid) -> Option<OrderDetail> {
        let mirror = self.mirror.read().await;
        mirror.orders.get(&id).map(|d| mirror.order_view(d))
    }

    /// Newest first, with live progress applied.
    pub async fn orders(&self) -> Vec<OrderDetail> {
        let mirror = self.mirror.read().await;
        let mut orders: Vec<_> = mirror.orders.values().map(|d| mirror.order_view(d)).collect();
        orders.sort_by(|a, b| b.order.order_time.cmp(&a.order.order_time));
        orders
    }

    /// Orders the tick should look at, as last persisted (no live overlay).
    pub async fn auto_progressing_orders(&self) -> Vec<OrderDetail> {
        self.mirror
            .read()
            .await
            .orders
            .values()
            .filter(|d| {
                !d.order.status.is_terminal()
                    && d.order.auto_progress
                    && d.order.next_auto_transition_time.is_some()
            })
            .cloned()
            .collect()
    }

    pub async fn put_order(&self, detail: OrderDetail) {
        {
            let mut mirror = self.mirror.write().await;
            let had_overlay = mirror.live_progress.remove(&detail.order.id).is_some();
            if !had_overlay && mirror.orders.get(&detail.order.id) == Some(&detail) {
                return;
            }
            mirror.orders.insert(detail.order.id, detail.clone());
        }
        self.publish(AppEvent::OrderChanged(detail));
    }

    pub async fn set_live_progress(&self, id: Uuid, percent: i32) {
        let view = {
            let mut mirror = self.mirror.write().await;
            let Some(detail) = mirror.orders.get(&id) else {
                return;
            };
            let current = mirror
                .live_progress
                .get(&id)
                .copied()
                .unwrap_or(detail.order.current_progress_percent);
            if current == percent {
                return;
            }
            mirror.live_progress.insert(id, percent);
            match mirror.orders.get(&id) {
                Some(detail) => mirror.order_view(detail),
                None => return,
            }
        };
        self.publish(AppEvent::OrderChanged(view));
    }

    pub async fn replace_orders(&self, orders: Vec<OrderDetail>) {
        let mut mirror = self.mirror.write().await;
        mirror.live_progress.clear();
        mirror.orders = orders.into_iter().map(|d| (d.order.id, d)).collect();
    }

    // tables

    pub async fn table(&self, id: Uuid) -> Option<table_entity::Model> {
        self.mirror.read().await.tables.get(&id).cloned()
    }

    /// Sorted by name.
    pub async fn tables(&self) -> Vec<table_entity::Model> {
        let mut tables: Vec<_> = self.mirror.read().await.tables.values().cloned().collect();
        tables.sort_by(|a, b| a.name.cmp(&b.name));
        tables
    }

    pub async fn put_table(&self, table: table_entity::Model) {
        {
            let mut mirror = self.mirror.write().await;
            if mirror.tables.get(&table.id) == Some(&table) {
                return;
            }
            mirror.tables.insert(table.id, table.clone());
        }
        self.publish(AppEvent::TableChanged(table));
    }

    pub async fn remove_table(&self, id: Uuid) {
        let removed = self.mirror.write().await.tables.remove(&id).is_some();
        if removed {
            self.publish(AppEvent::TableRemoved { id });
        }
    }

    pub async fn replace_tables(&self, tables: Vec<table_entity::Model>) {
        self.mirror.write().await.tables = tables.into_iter().map(|t| (t.id, t)).collect();
    }

    // cash sessions

    pub async fn session(&self, id: Uuid) -> Option<cash_session_entity::Model> {
        self.mirror.read().await.sessions.get(&id).cloned()
    }

    /// Newest first.
    pub async fn sessions(&self) -> Vec<cash_session_entity::Model> {
        let mut sessions: Vec<_> = self.mirror.read().await.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| b.opened_at.cmp(&a.opened_at));
        sessions
    }

    pub async fn active_session(&self) -> Option<cash_session_entity::Model> {
        self.mirror
            .read()
            .await
            .sessions
            .values()
            .filter(|s| s.is_open())
            .max_by_key(|s| s.opened_at)
            .cloned()
    }

    pub async fn put_session(&self, session: cash_session_entity::Model) {
        {
            let mut mirror = self.mirror.write().await;
            if mirror.sessions.get(&session.id) == Some(&session) {
                return;
            }
            mirror.sessions.insert(session.id, session.clone());
        }
        self.publish(AppEvent::CashSessionChanged(session));
    }

    pub async fn replace_sessions(&self, sessions: Vec<cash_session_entity::Model>) {
        self.mirror.write().await.sessions = sessions.into_iter().map(|s| (s.id, s)).collect();
    }

    // cash adjustments

    pub fn adjustments_available(&self) -> bool {
        self.adjustments_available.load(Ordering::SeqCst)
    }

    pub fn set_adjustments_available(&self, available: bool) {
        self.adjustments_available.store(available, Ordering::SeqCst);
    }

    /// Newest first; all sessions when `session_id` is `None`.
    pub async fn adjustments(&self, session_id: Option<Uuid>) -> Vec<cash_adjustment_entity::Model> {
        let mut adjustments: Vec<_> = self
            .mirror
            .read()
            .await
            .adjustments
            .values()
            .filter(|a| session_id.is_none_or(|id| a.cash_register_session_id == id))
            .cloned()
            .collect();
        adjustments.sort_by(|a, b| b.adjusted_at.cmp(&a.adjusted_at));
        adjustments
    }

    pub async fn put_adjustment(&self, adjustment: cash_adjustment_entity::Model) {
        {
            let mut mirror = self.mirror.write().await;
            if mirror.adjustments.contains_key(&adjustment.id) {
                return;
            }
            mirror.adjustments.insert(adjustment.id, adjustment.clone());
        }
        self.publish(AppEvent::CashAdjustmentAdded(adjustment));
    }

    pub async fn replace_adjustments(&self, adjustments: Vec<cash_adjustment_entity::Model>) {
        self.mirror.write().await.adjustments =
            adjustments.into_iter().map(|a| (a.id, a)).collect();
    }
}
