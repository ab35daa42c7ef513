use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::{
    OrderStatus, OrderType, PaymentMethod, TableStatus, order_entity, order_item_entity,
};
use crate::error::{AppError, AppResult};
use crate::models::{
    CreateOrderRequest, NewOrderItem, Notice, OrderDetail, PaymentDetails, TransitionSweep,
};
use crate::services::lifecycle::{LifecycleEngine, ProgressState};
use crate::services::{AppState, TableService};
use crate::store::{OrderPatch, Store};
use crate::utils::Clock;

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
    state: AppState,
    engine: LifecycleEngine,
    clock: Arc<dyn Clock>,
    tables: TableService,
}

fn with_progress(mut patch: OrderPatch, progress: ProgressState) -> OrderPatch {
    patch.auto_progress = Some(progress.auto_progress);
    patch.next_auto_transition_time = Some(progress.next_auto_transition_time);
    patch.current_progress_percent = Some(progress.progress_percent);
    patch
}

fn order_label(order: &order_entity::Model) -> String {
    format!("#{} ({})", &order.id.simple().to_string()[..8], order.customer_name)
}

fn validate_items(items: &[NewOrderItem]) -> AppResult<()> {
    if items.is_empty() {
        return Err(AppError::ValidationError(
            "An order needs at least one item".to_string(),
        ));
    }
    for item in items {
        if item.quantity <= 0 {
            return Err(AppError::ValidationError(format!(
                "Quantity for {} must be greater than zero",
                item.name
            )));
        }
        if item.price < 0 {
            return Err(AppError::ValidationError(format!(
                "Price for {} cannot be negative",
                item.name
            )));
        }
    }
    Ok(())
}

fn build_items(
    order_id: Uuid,
    items: Vec<NewOrderItem>,
    now: DateTime<Utc>,
) -> AppResult<Vec<order_item_entity::Model>> {
    items
        .into_iter()
        .map(|item| {
            let first_half_flavor = item.first_half_flavor.map(serde_json::to_value).transpose()?;
            let second_half_flavor =
                item.second_half_flavor.map(serde_json::to_value).transpose()?;
            Ok(order_item_entity::Model {
                id: Uuid::new_v4(),
                order_id,
                menu_item_id: item.menu_item_id,
                quantity: item.quantity,
                name: item.name,
                price: item.price,
                selected_size_id: item.selected_size_id,
                selected_crust_id: item.selected_crust_id,
                is_half_and_half: item.is_half_and_half,
                first_half_flavor,
                second_half_flavor,
                created_at: now,
            })
        })
        .collect()
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

impl OrderService {
    pub fn new(
        store: Arc<dyn Store>,
        state: AppState,
        engine: LifecycleEngine,
        clock: Arc<dyn Clock>,
        tables: TableService,
    ) -> Self {
        Self {
            store,
            state,
            engine,
            clock,
            tables,
        }
    }

    pub fn engine(&self) -> &LifecycleEngine {
        &self.engine
    }

    pub async fn list_orders(&self) -> Vec<OrderDetail> {
        self.state.orders().await
    }

    pub async fn get_order(&self, id: Uuid) -> AppResult<OrderDetail> {
        if let Some(detail) = self.state.order(id).await {
            return Ok(detail);
        }
        self.store
            .get_order(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Order {id} not found")))
    }

    /// Re-reads the order with its items and publishes it.
    async fn refresh(&self, id: Uuid) -> AppResult<OrderDetail> {
        let detail = self
            .store
            .get_order(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Order {id} not found")))?;
        self.state.put_order(detail.clone()).await;
        Ok(detail)
    }

    async fn persist(&self, id: Uuid, patch: &OrderPatch) -> AppResult<OrderDetail> {
        self.store.update_order(id, patch).await?;
        self.refresh(id).await
    }

    pub async fn create_order(&self, req: CreateOrderRequest) -> AppResult<OrderDetail> {
        validate_items(&req.items)?;

        let mut customer_name = req.customer_name.trim().to_string();
        let table = match req.order_type {
            OrderType::Table => {
                let table_id = req.table_id.ok_or_else(|| {
                    AppError::ValidationError("A table must be selected for table orders".to_string())
                })?;
                let table = match self.state.table(table_id).await {
                    Some(t) => t,
                    None => self
                        .store
                        .get_table(table_id)
                        .await?
                        .ok_or_else(|| AppError::NotFound(format!("Table {table_id} not found")))?,
                };
                if customer_name.is_empty() {
                    customer_name = format!("Table {}", table.name);
                }
                Some(table)
            }
            OrderType::Delivery if req.customer_id.is_some() => {
                if customer_name.is_empty()
                    || blank(&req.customer_phone)
                    || blank(&req.customer_address)
                {
                    return Err(AppError::ValidationError(
                        "Online delivery orders need a name, phone and address".to_string(),
                    ));
                }
                None
            }
            _ => None,
        };
        if customer_name.is_empty() {
            return Err(AppError::ValidationError("Customer name is required".to_string()));
        }

        let now = self.clock.now();
        let order_id = Uuid::new_v4();
        let total_amount: i64 = req.items.iter().map(|i| i.price * i64::from(i.quantity)).sum();
        let items = build_items(order_id, req.items, now)?;

        let (payment_method, amount_paid, change_due, session_id) = match (&table, req.payment_method)
        {
            (None, Some(method)) => {
                let (amount_paid, change_due) = if method == PaymentMethod::Cash {
                    let tendered = req.amount_paid;
                    if tendered.is_some_and(|v| v < 0) {
                        return Err(AppError::ValidationError(
                            "Amount paid cannot be negative".to_string(),
                        ));
                    }
                    let change = tendered
                        .filter(|paid| *paid >= total_amount)
                        .map(|paid| paid - total_amount);
                    (tendered, change)
                } else {
                    (None, None)
                };
                let session_id = if method.affects_till() {
                    self.state.active_session().await.map(|s| s.id)
                } else {
                    None
                };
                (Some(method), amount_paid, change_due, session_id)
            }
            _ => (None, None, None, None),
        };

        let progress = self.engine.enter(OrderStatus::Pending, req.order_type, now);
        let order = order_entity::Model {
            id: order_id,
            customer_id: req.customer_id,
            customer_name,
            customer_phone: req.customer_phone,
            customer_address: req.customer_address,
            notes: req.notes,
            total_amount,
            status: OrderStatus::Pending,
            order_type: req.order_type,
            table_id: table.as_ref().map(|t| t.id),
            payment_method,
            amount_paid,
            change_due,
            cash_register_session_id: session_id,
            order_time: now,
            last_status_change_time: now,
            next_auto_transition_time: progress.next_auto_transition_time,
            auto_progress: progress.auto_progress,
            current_progress_percent: progress.progress_percent,
            created_at: now,
        };

        let unlinked = payment_method.is_some_and(|m| m.affects_till()) && session_id.is_none();
        self.store.insert_order(order, items).await?;
        let detail = self.refresh(order_id).await?;
        log::info!(
            "Created {} order {order_id} total={total_amount}",
            detail.order.order_type
        );

        if let Some(table) = &table
            && let Err(e) = self.tables.occupy_for_order(table.id, order_id).await
        {
            log::error!("Failed to seat order {order_id} at table {}: {e}", table.name);
            self.state.notify(Notice::error(format!(
                "Order created but table {} could not be updated: {e}",
                table.name
            )));
        }

        if unlinked {
            self.state.notify(Notice::info(
                "No cash register session is open; the order was recorded without a till link",
            ));
        }
        self.state.notify(Notice::success(format!(
            "Order {} created",
            order_label(&detail.order)
        )));
        Ok(detail)
    }

    pub async fn update_order_status(
        &self,
        id: Uuid,
        new_status: OrderStatus,
        manual: bool,
    ) -> AppResult<OrderDetail> {
        let current = self.get_order(id).await?;
        let order = &current.order;
        if order.status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "Order {} is already {}",
                order_label(order),
                order.status
            )));
        }

        if manual && order.order_type == OrderType::Table && new_status == OrderStatus::Delivered {
            self.state.notify(Notice::info(format!(
                "Order {} is a table order; close the table account to finish it",
                order_label(order)
            )));
            return Ok(current);
        }

        let now = self.clock.now();
        let progress = self.engine.enter(new_status, order.order_type, now);
        let patch = with_progress(
            OrderPatch {
                status: Some(new_status),
                last_status_change_time: Some(now),
                ..Default::default()
            },
            progress,
        );

        let detail = self.persist(id, &patch).await?;
        log::info!(
            "Order {id} {} -> {new_status} ({})",
            order.status,
            if manual { "manual" } else { "automatic" }
        );

        if LifecycleEngine::is_held(order.order_type, new_status) {
            self.state.notify(Notice::info(format!(
                "Order {} is ready, awaiting account closing",
                order_label(order)
            )));
        }

        if new_status == OrderStatus::Cancelled
            && let Some(table_id) = order.table_id
            && let Err(e) = self.tables.release_cancelled_order(table_id, id).await
        {
            log::error!("Failed to release table for cancelled order {id}: {e}");
        }

        Ok(detail)
    }

    /// One pass of the automatic lifecycle. Failures are reported per order and never
    /// abort the sweep.
    pub async fn check_order_transitions(&self) -> TransitionSweep {
        let mut sweep = TransitionSweep::default();
        for detail in self.state.auto_progressing_orders().await {
            sweep.checked += 1;
            let order = &detail.order;
            let Some(due_at) = order.next_auto_transition_time else {
                continue;
            };
            let now = self.clock.now();

            if now >= due_at {
                let result = match self.engine.resolve_auto_target(order.status, order.order_type) {
                    Some(target) => self
                        .update_order_status(order.id, target, false)
                        .await
                        .map(|_| sweep.advanced += 1),
                    None => {
                        let patch = with_progress(OrderPatch::default(), ProgressState::stopped());
                        self.persist(order.id, &patch).await.map(|_| {
                            log::info!("Order {} has no successor for {}, stopping", order.id, order.status);
                            sweep.stopped += 1
                        })
                    }
                };
                if let Err(e) = result {
                    sweep.failed += 1;
                    self.state.notify(Notice::error(format!(
                        "Failed to advance order {}: {e}",
                        order_label(order)
                    )));
                }
                continue;
            }

            let live = self.engine.live_progress(order.status, due_at, now);
            if self
                .engine
                .should_persist_progress(live, order.current_progress_percent)
            {
                let patch = OrderPatch {
                    current_progress_percent: Some(live),
                    ..Default::default()
                };
                match self.persist(order.id, &patch).await {
                    Ok(_) => sweep.progress_persisted += 1,
                    Err(e) => {
                        sweep.failed += 1;
                        self.state.notify(Notice::error(format!(
                            "Failed to save progress of order {}: {e}",
                            order_label(order)
                        )));
                    }
                }
            } else {
                self.state.set_live_progress(order.id, live).await;
            }
        }
        sweep
    }

    pub async fn toggle_order_auto_progress(&self, id: Uuid) -> AppResult<OrderDetail> {
        let current = self.get_order(id).await?;
        let order = &current.order;
        let now = self.clock.now();

        if LifecycleEngine::is_held(order.order_type, order.status) && !order.auto_progress {
            self.state.notify(Notice::info(format!(
                "Order {} waits for its table account to be closed",
                order_label(order)
            )));
            let held = ProgressState::stopped();
            if order.next_auto_transition_time.is_none()
                && order.current_progress_percent == held.progress_percent
            {
                return Ok(current);
            }
            return self.persist(id, &with_progress(OrderPatch::default(), held)).await;
        }

        let patch = if order.auto_progress {
            OrderPatch {
                auto_progress: Some(false),
                next_auto_transition_time: Some(None),
                ..Default::default()
            }
        } else {
            let dwell = self.engine.dwell(order.status);
            if order.status.is_terminal() || dwell <= chrono::Duration::zero() {
                self.state.notify(Notice::info(format!(
                    "Order {} has no timed step in status {}",
                    order_label(order),
                    order.status
                )));
                with_progress(OrderPatch::default(), ProgressState::stopped())
            } else {
                OrderPatch {
                    last_status_change_time: Some(now),
                    auto_progress: Some(true),
                    next_auto_transition_time: Some(Some(now + dwell)),
                    current_progress_percent: Some(0),
                    ..Default::default()
                }
            }
        };

        let detail = self.persist(id, &patch).await?;
        log::info!(
            "Order {id} auto-progress {}",
            if detail.order.auto_progress { "enabled" } else { "disabled" }
        );
        Ok(detail)
    }

    pub async fn add_items_to_order(
        &self,
        id: Uuid,
        items: Vec<NewOrderItem>,
    ) -> AppResult<OrderDetail> {
        if items.is_empty() {
            return Err(AppError::ValidationError("No items to add".to_string()));
        }
        validate_items(&items)?;

        let current = self
            .store
            .get_order(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Order {id} not found")))?;
        let order = &current.order;
        if order.status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "Order {} is already {} and cannot take more items",
                order_label(order),
                order.status
            )));
        }

        let now = self.clock.now();
        let added: i64 = items.iter().map(|i| i.price * i64::from(i.quantity)).sum();
        let new_items = build_items(id, items, now)?;
        let count = new_items.len();

        let mut patch = OrderPatch {
            total_amount: Some(order.total_amount + added),
            last_status_change_time: Some(now),
            ..Default::default()
        };
        if matches!(order.status, OrderStatus::Pending | OrderStatus::Preparing) {
            patch.status = Some(OrderStatus::Pending);
            patch = with_progress(
                patch,
                self.engine.enter(OrderStatus::Pending, order.order_type, now),
            );
        }

        self.store.append_order_items(id, new_items, &patch).await?;
        let detail = self.refresh(id).await?;
        self.state.notify(Notice::success(format!(
            "{count} item(s) added to order {}",
            order_label(&detail.order)
        )));
        Ok(detail)
    }

    pub async fn close_table_account(
        &self,
        id: Uuid,
        payment: PaymentDetails,
    ) -> AppResult<OrderDetail> {
        let current = self.get_order(id).await?;
        let order = &current.order;
        if order.status.is_terminal() {
            self.state.notify(Notice::info(format!(
                "Order {} is already {}",
                order_label(order),
                order.status
            )));
            return Ok(current);
        }
        if payment.amount_paid.is_some_and(|v| v < 0) {
            return Err(AppError::ValidationError(
                "Amount paid cannot be negative".to_string(),
            ));
        }

        let now = self.clock.now();
        let method = payment.payment_method;
        let (amount_paid, change_due) = if method == PaymentMethod::Cash {
            let tendered = payment.amount_paid.unwrap_or(order.total_amount);
            (tendered, (tendered - order.total_amount).max(0))
        } else {
            (order.total_amount, 0)
        };
        let session_id = if method.affects_till() {
            self.state.active_session().await.map(|s| s.id)
        } else {
            None
        };

        let patch = with_progress(
            OrderPatch {
                status: Some(OrderStatus::Delivered),
                last_status_change_time: Some(now),
                payment_method: Some(Some(method)),
                amount_paid: Some(Some(amount_paid)),
                change_due: Some(Some(change_due)),
                cash_register_session_id: Some(session_id),
                ..Default::default()
            },
            ProgressState::stopped(),
        );
        let detail = self.persist(id, &patch).await?;
        log::info!("Closed account of order {id} via {method}, paid={amount_paid}");

        if let Some(table_id) = order.table_id
            && let Err(e) = self
                .tables
                .release_after_order(table_id, id, TableStatus::NeedsCleaning)
                .await
        {
            self.state.notify(Notice::error(format!(
                "Account closed but the table could not be marked for cleaning: {e}"
            )));
        }

        self.state.notify(Notice::success(format!(
            "Account for order {} closed",
            order_label(&detail.order)
        )));
        Ok(detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateTableRequest, NoticeLevel, OpenCashRegisterRequest};
    use crate::services::test_support::*;
    use chrono::Duration;

    async fn seat_table(h: &Harness, name: &str) -> Uuid {
        h.services
            .tables
            .add_table(CreateTableRequest {
                name: name.to_string(),
                capacity: 4,
                reservation_details: None,
            })
            .await
            .unwrap()
            .id
    }

    async fn table_order(h: &Harness, table_id: Uuid) -> OrderDetail {
        let mut req = order_request(OrderType::Table, vec![item("Margherita", 2500, 2)]);
        req.customer_name = String::new();
        req.table_id = Some(table_id);
        h.services.orders.create_order(req).await.unwrap()
    }

    #[tokio::test]
    async fn counter_order_runs_to_delivered_without_going_out() {
        let h = harness().await;
        let orders = &h.services.orders;
        let created = orders
            .create_order(order_request(OrderType::Counter, vec![item("Calzone", 3000, 1)]))
            .await
            .unwrap();
        assert_eq!(created.order.status, OrderStatus::Pending);
        assert_eq!(created.order.total_amount, 3000);
        assert!(created.order.auto_progress);

        h.clock.advance(Duration::seconds(300));
        let sweep = orders.check_order_transitions().await;
        assert_eq!(sweep.advanced, 1);
        let preparing = orders.get_order(created.id()).await.unwrap();
        assert_eq!(preparing.order.status, OrderStatus::Preparing);
        assert_eq!(preparing.order.current_progress_percent, 0);

        h.clock.advance(Duration::seconds(600));
        orders.check_order_transitions().await;
        let done = orders.get_order(created.id()).await.unwrap();
        assert_eq!(done.order.status, OrderStatus::Delivered);
        assert!(!done.order.auto_progress);
        assert_eq!(done.order.next_auto_transition_time, None);
        assert_eq!(done.order.current_progress_percent, 100);
    }

    #[tokio::test]
    async fn delivery_order_goes_out_for_delivery() {
        let h = harness().await;
        let orders = &h.services.orders;
        let created = orders
            .create_order(order_request(OrderType::Delivery, vec![item("Pepperoni", 4500, 1)]))
            .await
            .unwrap();

        orders
            .update_order_status(created.id(), OrderStatus::Preparing, true)
            .await
            .unwrap();
        h.clock.advance(Duration::seconds(600));
        orders.check_order_transitions().await;

        let out = orders.get_order(created.id()).await.unwrap();
        assert_eq!(out.order.status, OrderStatus::OutForDelivery);
        assert_eq!(
            out.order.next_auto_transition_time,
            Some(h.clock.now() + Duration::seconds(1800))
        );
    }

    #[tokio::test]
    async fn table_order_is_held_when_ready() {
        let h = harness().await;
        let table_id = seat_table(&h, "7").await;
        let created = table_order(&h, table_id).await;
        assert_eq!(created.order.customer_name, "Table 7");
        let table = h.services.state.table(table_id).await.unwrap();
        assert_eq!(table.status, TableStatus::Occupied);
        assert_eq!(table.current_order_id, Some(created.id()));

        let orders = &h.services.orders;
        orders
            .update_order_status(created.id(), OrderStatus::Preparing, true)
            .await
            .unwrap();
        let mut rx = h.services.state.subscribe();
        h.clock.advance(Duration::seconds(600));
        orders.check_order_transitions().await;

        let held = orders.get_order(created.id()).await.unwrap();
        assert_eq!(held.order.status, OrderStatus::ReadyForPickup);
        assert!(!held.order.auto_progress);
        assert_eq!(held.order.next_auto_transition_time, None);
        assert!(
            drain_notices(&mut rx)
                .iter()
                .any(|n| n.level == NoticeLevel::Info && n.message.contains("awaiting account"))
        );

        // later ticks leave it alone
        h.clock.advance(Duration::hours(2));
        let sweep = orders.check_order_transitions().await;
        assert!(!sweep.changed_anything());
    }

    #[tokio::test]
    async fn manual_deliver_of_table_order_is_only_advised() {
        let h = harness().await;
        let table_id = seat_table(&h, "3").await;
        let created = table_order(&h, table_id).await;
        let mut rx = h.services.state.subscribe();

        let returned = h
            .services
            .orders
            .update_order_status(created.id(), OrderStatus::Delivered, true)
            .await
            .unwrap();
        assert_eq!(returned.order.status, OrderStatus::Pending);
        let stored = h.store.get_order(created.id()).await.unwrap().unwrap();
        assert_eq!(stored.order.status, OrderStatus::Pending);
        let notices = drain_notices(&mut rx);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Info);
    }

    #[tokio::test]
    async fn small_progress_steps_stay_in_memory() {
        let h = harness().await;
        let orders = &h.services.orders;
        let created = orders
            .create_order(order_request(OrderType::Counter, vec![item("Soda", 700, 1)]))
            .await
            .unwrap();

        h.clock.advance(Duration::seconds(10));
        let sweep = orders.check_order_transitions().await;
        assert_eq!(sweep.progress_persisted, 0);
        assert_eq!(
            orders.get_order(created.id()).await.unwrap().order.current_progress_percent,
            3
        );
        let stored = h.store.get_order(created.id()).await.unwrap().unwrap();
        assert_eq!(stored.order.current_progress_percent, 0);

        h.clock.advance(Duration::seconds(50));
        let sweep = orders.check_order_transitions().await;
        assert_eq!(sweep.progress_persisted, 1);
        let stored = h.store.get_order(created.id()).await.unwrap().unwrap();
        assert_eq!(stored.order.current_progress_percent, 20);
    }

    #[tokio::test]
    async fn failed_tick_write_is_reported_and_retried() {
        let h = harness().await;
        let orders = &h.services.orders;
        let created = orders
            .create_order(order_request(OrderType::Counter, vec![item("Soda", 700, 1)]))
            .await
            .unwrap();
        let mut rx = h.services.state.subscribe();

        h.store.set_fail_writes(true);
        h.clock.advance(Duration::seconds(301));
        let sweep = orders.check_order_transitions().await;
        assert_eq!(sweep.failed, 1);
        assert_eq!(
            orders.get_order(created.id()).await.unwrap().order.status,
            OrderStatus::Pending
        );
        assert!(
            drain_notices(&mut rx)
                .iter()
                .any(|n| n.level == NoticeLevel::Error)
        );

        h.store.set_fail_writes(false);
        let sweep = orders.check_order_transitions().await;
        assert_eq!(sweep.advanced, 1);
        assert_eq!(
            orders.get_order(created.id()).await.unwrap().order.status,
            OrderStatus::Preparing
        );
    }

    #[tokio::test]
    async fn toggling_auto_progress_stops_and_restarts_the_timer() {
        let h = harness().await;
        let orders = &h.services.orders;
        let created = orders
            .create_order(order_request(OrderType::Counter, vec![item("Soda", 700, 1)]))
            .await
            .unwrap();

        let paused = orders.toggle_order_auto_progress(created.id()).await.unwrap();
        assert!(!paused.order.auto_progress);
        assert_eq!(paused.order.next_auto_transition_time, None);

        h.clock.advance(Duration::seconds(1000));
        assert!(!orders.check_order_transitions().await.changed_anything());

        let resumed = orders.toggle_order_auto_progress(created.id()).await.unwrap();
        assert!(resumed.order.auto_progress);
        assert_eq!(resumed.order.current_progress_percent, 0);
        assert_eq!(
            resumed.order.next_auto_transition_time,
            Some(h.clock.now() + Duration::seconds(300))
        );
    }

    #[tokio::test]
    async fn toggling_a_held_table_order_keeps_it_stopped() {
        let h = harness().await;
        let table_id = seat_table(&h, "9").await;
        let created = table_order(&h, table_id).await;
        let orders = &h.services.orders;
        orders
            .update_order_status(created.id(), OrderStatus::ReadyForPickup, true)
            .await
            .unwrap();

        let toggled = orders.toggle_order_auto_progress(created.id()).await.unwrap();
        assert_eq!(toggled.order.status, OrderStatus::ReadyForPickup);
        assert!(!toggled.order.auto_progress);
        assert_eq!(toggled.order.next_auto_transition_time, None);
    }

    #[tokio::test]
    async fn adding_items_sends_a_preparing_order_back_to_pending() {
        let h = harness().await;
        let orders = &h.services.orders;
        let created = orders
            .create_order(order_request(OrderType::Counter, vec![item("Calzone", 3000, 1)]))
            .await
            .unwrap();
        orders
            .update_order_status(created.id(), OrderStatus::Preparing, true)
            .await
            .unwrap();

        h.clock.advance(Duration::seconds(30));
        let updated = orders
            .add_items_to_order(created.id(), vec![item("Soda", 700, 2)])
            .await
            .unwrap();
        assert_eq!(updated.order.status, OrderStatus::Pending);
        assert_eq!(updated.order.total_amount, 4400);
        assert_eq!(updated.items.len(), 2);
        assert_eq!(
            updated.order.next_auto_transition_time,
            Some(h.clock.now() + Duration::seconds(300))
        );
    }

    #[tokio::test]
    async fn finished_orders_take_no_more_items() {
        let h = harness().await;
        let orders = &h.services.orders;
        let created = orders
            .create_order(order_request(OrderType::Counter, vec![item("Calzone", 3000, 1)]))
            .await
            .unwrap();
        orders
            .update_order_status(created.id(), OrderStatus::Cancelled, true)
            .await
            .unwrap();

        let err = orders
            .add_items_to_order(created.id(), vec![item("Soda", 700, 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        let stored = h.store.get_order(created.id()).await.unwrap().unwrap();
        assert_eq!(stored.order.total_amount, 3000);
        assert_eq!(stored.items.len(), 1);

        let err = orders.add_items_to_order(created.id(), vec![]).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn delivered_orders_take_no_more_items() {
        let h = harness().await;
        let orders = &h.services.orders;
        let created = orders
            .create_order(order_request(OrderType::Counter, vec![item("Lasagna", 3800, 1)]))
            .await
            .unwrap();
        orders
            .update_order_status(created.id(), OrderStatus::Delivered, true)
            .await
            .unwrap();
        let before = h.store.get_order(created.id()).await.unwrap().unwrap();

        h.clock.advance(Duration::seconds(45));
        let err = orders
            .add_items_to_order(created.id(), vec![item("Juice", 900, 2)])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        let after = h.store.get_order(created.id()).await.unwrap().unwrap();
        assert_eq!(after.order, before.order);
        assert_eq!(after.items.len(), 1);
        assert_eq!(
            h.services.state.order(created.id()).await.unwrap().order.total_amount,
            3800
        );
    }

    #[tokio::test]
    async fn adding_items_late_in_the_lifecycle_restamps_the_status_time() {
        let h = harness().await;
        let orders = &h.services.orders;
        let created = orders
            .create_order(order_request(OrderType::Delivery, vec![item("Pepperoni", 4500, 1)]))
            .await
            .unwrap();
        let out = orders
            .update_order_status(created.id(), OrderStatus::OutForDelivery, true)
            .await
            .unwrap();

        h.clock.advance(Duration::seconds(120));
        let updated = orders
            .add_items_to_order(created.id(), vec![item("Soda", 700, 1)])
            .await
            .unwrap();
        assert_eq!(updated.order.status, OrderStatus::OutForDelivery);
        assert_eq!(updated.order.total_amount, 5200);
        assert_eq!(updated.order.last_status_change_time, h.clock.now());
        assert_eq!(
            updated.order.next_auto_transition_time,
            out.order.next_auto_transition_time
        );
    }

    #[tokio::test]
    async fn enabling_auto_progress_on_a_zero_dwell_status_is_refused() {
        let h = harness().await;
        let orders = &h.services.orders;
        let created = orders
            .create_order(order_request(OrderType::Counter, vec![item("Calzone", 3000, 1)]))
            .await
            .unwrap();
        let ready = orders
            .update_order_status(created.id(), OrderStatus::ReadyForPickup, true)
            .await
            .unwrap();
        assert!(!ready.order.auto_progress);

        let mut rx = h.services.state.subscribe();
        let toggled = orders.toggle_order_auto_progress(created.id()).await.unwrap();
        assert_eq!(toggled.order.status, OrderStatus::ReadyForPickup);
        assert!(!toggled.order.auto_progress);
        assert_eq!(toggled.order.current_progress_percent, 100);
        assert_eq!(toggled.order.next_auto_transition_time, None);
        let stored = h.store.get_order(created.id()).await.unwrap().unwrap();
        assert!(!stored.order.auto_progress);
        assert_eq!(stored.order.next_auto_transition_time, None);
        assert!(
            drain_notices(&mut rx)
                .iter()
                .any(|n| n.level == NoticeLevel::Info && n.message.contains("no timed step"))
        );
    }

    #[tokio::test]
    async fn cash_orders_record_change_and_till_link() {
        let h = harness().await;
        h.services
            .cash_register
            .open_cash_register(OpenCashRegisterRequest {
                opening_balance: 10_000,
                notes: None,
            })
            .await
            .unwrap();
        let session = h.services.state.active_session().await.unwrap();

        let paid = h
            .services
            .orders
            .create_order(cash_request(OrderType::Counter, vec![item("Pizza", 4200, 1)], Some(5000)))
            .await
            .unwrap();
        assert_eq!(paid.order.amount_paid, Some(5000));
        assert_eq!(paid.order.change_due, Some(800));
        assert_eq!(paid.order.cash_register_session_id, Some(session.id));

        let short = h
            .services
            .orders
            .create_order(cash_request(OrderType::Counter, vec![item("Pizza", 4200, 1)], Some(4000)))
            .await
            .unwrap();
        assert_eq!(short.order.change_due, None);
    }

    #[tokio::test]
    async fn cash_order_without_open_till_is_flagged() {
        let h = harness().await;
        let mut rx = h.services.state.subscribe();
        let created = h
            .services
            .orders
            .create_order(cash_request(OrderType::Counter, vec![item("Pizza", 4200, 1)], None))
            .await
            .unwrap();
        assert_eq!(created.order.cash_register_session_id, None);
        assert!(
            drain_notices(&mut rx)
                .iter()
                .any(|n| n.level == NoticeLevel::Info && n.message.contains("without a till link"))
        );
    }

    #[tokio::test]
    async fn online_delivery_needs_contact_details() {
        let h = harness().await;
        let mut req = order_request(OrderType::Delivery, vec![item("Pizza", 4200, 1)]);
        req.customer_id = Some(Uuid::new_v4());
        req.customer_phone = Some("555-0100".to_string());
        let err = h.services.orders.create_order(req).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert!(h.services.orders.list_orders().await.is_empty());
    }

    #[tokio::test]
    async fn invalid_orders_are_rejected_before_persisting() {
        let h = harness().await;
        let orders = &h.services.orders;

        let err = orders
            .create_order(order_request(OrderType::Counter, vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let err = orders
            .create_order(order_request(OrderType::Counter, vec![item("Pizza", 4200, 0)]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let err = orders
            .create_order(order_request(OrderType::Table, vec![item("Pizza", 4200, 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert!(h.store.list_orders(&Default::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_insert_leaves_the_mirror_untouched() {
        let h = harness().await;
        h.store.set_fail_writes(true);
        let result = h
            .services
            .orders
            .create_order(order_request(OrderType::Counter, vec![item("Pizza", 4200, 1)]))
            .await;
        assert!(matches!(result, Err(AppError::DatabaseError(_))));
        assert!(h.services.orders.list_orders().await.is_empty());
    }

    #[tokio::test]
    async fn closing_a_table_account_settles_and_frees_the_table() {
        let h = harness().await;
        h.services
            .cash_register
            .open_cash_register(OpenCashRegisterRequest {
                opening_balance: 10_000,
                notes: None,
            })
            .await
            .unwrap();
        let table_id = seat_table(&h, "4").await;
        let created = table_order(&h, table_id).await;

        let closed = h
            .services
            .orders
            .close_table_account(
                created.id(),
                PaymentDetails {
                    payment_method: PaymentMethod::Cash,
                    amount_paid: Some(6000),
                },
            )
            .await
            .unwrap();
        assert_eq!(closed.order.status, OrderStatus::Delivered);
        assert_eq!(closed.order.amount_paid, Some(6000));
        assert_eq!(closed.order.change_due, Some(1000));
        assert!(closed.order.cash_register_session_id.is_some());
        assert_eq!(closed.order.current_progress_percent, 100);

        let table = h.services.state.table(table_id).await.unwrap();
        assert_eq!(table.status, TableStatus::NeedsCleaning);
        assert_eq!(table.current_order_id, None);

        // a second close is a no-op
        let again = h
            .services
            .orders
            .close_table_account(
                created.id(),
                PaymentDetails {
                    payment_method: PaymentMethod::CreditCard,
                    amount_paid: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(again.order.payment_method, Some(PaymentMethod::Cash));
    }

    #[tokio::test]
    async fn card_payment_is_not_linked_to_the_till() {
        let h = harness().await;
        h.services
            .cash_register
            .open_cash_register(OpenCashRegisterRequest {
                opening_balance: 0,
                notes: None,
            })
            .await
            .unwrap();
        let table_id = seat_table(&h, "5").await;
        let created = table_order(&h, table_id).await;
        let closed = h
            .services
            .orders
            .close_table_account(
                created.id(),
                PaymentDetails {
                    payment_method: PaymentMethod::DebitCard,
                    amount_paid: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(closed.order.amount_paid, Some(5000));
        assert_eq!(closed.order.change_due, Some(0));
        assert_eq!(closed.order.cash_register_session_id, None);
    }

    #[tokio::test]
    async fn cancelling_a_table_order_frees_the_table() {
        let h = harness().await;
        let table_id = seat_table(&h, "8").await;
        let created = table_order(&h, table_id).await;
        h.services
            .orders
            .update_order_status(created.id(), OrderStatus::Cancelled, true)
            .await
            .unwrap();
        let table = h.services.state.table(table_id).await.unwrap();
        assert_eq!(table.status, TableStatus::Available);
        assert_eq!(table.current_order_id, None);
    }

    #[tokio::test]
    async fn cancelling_one_of_two_orders_keeps_the_table_seated() {
        let h = harness().await;
        let table_id = seat_table(&h, "1").await;
        let first = table_order(&h, table_id).await;
        let second = table_order(&h, table_id).await;

        h.services
            .orders
            .update_order_status(second.id(), OrderStatus::Cancelled, true)
            .await
            .unwrap();

        let table = h.store.get_table(table_id).await.unwrap().unwrap();
        assert_eq!(table.status, TableStatus::Occupied);
        assert_eq!(table.current_order_id, Some(first.id()));
        assert_eq!(h.services.state.table(table_id).await.unwrap(), table);
        let first = h.store.get_order(first.id()).await.unwrap().unwrap();
        assert_eq!(first.order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn finished_orders_refuse_further_status_changes() {
        let h = harness().await;
        let table_id = seat_table(&h, "5").await;
        let settled = table_order(&h, table_id).await;
        h.services
            .orders
            .close_table_account(
                settled.id(),
                PaymentDetails {
                    payment_method: PaymentMethod::CreditCard,
                    amount_paid: None,
                },
            )
            .await
            .unwrap();
        h.services
            .tables
            .update_table(
                table_id,
                crate::models::UpdateTableRequest {
                    status: Some(TableStatus::Available),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let seated = table_order(&h, table_id).await;

        let err = h
            .services
            .orders
            .update_order_status(settled.id(), OrderStatus::Cancelled, true)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        let stored = h.store.get_order(settled.id()).await.unwrap().unwrap();
        assert_eq!(stored.order.status, OrderStatus::Delivered);
        let table = h.store.get_table(table_id).await.unwrap().unwrap();
        assert_eq!(table.status, TableStatus::Occupied);
        assert_eq!(table.current_order_id, Some(seated.id()));
    }
}
