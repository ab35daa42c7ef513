use async_trait::async_trait;
use sea_orm::{
    ActiveValue, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, SqlErr, TransactionTrait,
};
use std::collections::HashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{
    CHANGE_FEED_CAPACITY, CashSessionPatch, ChangeEvent, ChangeKind, ChangeRecord, OrderFilter,
    OrderPatch, Store, TablePatch,
};
use crate::entities::{
    CashSessionStatus, cash_adjustment_entity, cash_session_entity, order_entity,
    order_item_entity, table_entity,
};
use crate::error::{AppError, AppResult};
use crate::models::OrderDetail;

/// Postgres-backed store. Change events cover writes made through this instance.
#[derive(Clone)]
pub struct SeaOrmStore {
    pool: DatabaseConnection,
    changes: broadcast::Sender<ChangeEvent>,
}

impl SeaOrmStore {
    pub fn new(pool: DatabaseConnection) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self { pool, changes }
    }

    fn publish(&self, kind: ChangeKind, record: ChangeRecord) {
        // No subscribers is fine.
        let _ = self.changes.send(ChangeEvent::new(kind, record));
    }

    async fn load_items(
        &self,
        order_ids: Vec<Uuid>,
    ) -> AppResult<HashMap<Uuid, Vec<order_item_entity::Model>>> {
        let mut grouped: HashMap<Uuid, Vec<order_item_entity::Model>> = HashMap::new();
        if order_ids.is_empty() {
            return Ok(grouped);
        }
        let items = order_item_entity::Entity::find()
            .filter(order_item_entity::Column::OrderId.is_in(order_ids))
            .order_by_asc(order_item_entity::Column::CreatedAt)
            .all(&self.pool)
            .await?;
        for item in items {
            grouped.entry(item.order_id).or_default().push(item);
        }
        Ok(grouped)
    }
}

fn patched<V: Into<sea_orm::Value>>(value: Option<V>) -> ActiveValue<V> {
    match value {
        Some(v) => Set(v),
        None => ActiveValue::NotSet,
    }
}

fn not_updated_as_not_found(what: &str, id: Uuid) -> impl FnOnce(DbErr) -> AppError + '_ {
    move |err| match err {
        DbErr::RecordNotUpdated => AppError::NotFound(format!("{what} {id} not found")),
        other => AppError::DatabaseError(other),
    }
}

fn order_active_model(m: order_entity::Model) -> order_entity::ActiveModel {
    order_entity::ActiveModel {
        id: Set(m.id),
        customer_id: Set(m.customer_id),
        customer_name: Set(m.customer_name),
        customer_phone: Set(m.customer_phone),
        customer_address: Set(m.customer_address),
        notes: Set(m.notes),
        total_amount: Set(m.total_amount),
        status: Set(m.status),
        order_type: Set(m.order_type),
        table_id: Set(m.table_id),
        payment_method: Set(m.payment_method),
        amount_paid: Set(m.amount_paid),
        change_due: Set(m.change_due),
        cash_register_session_id: Set(m.cash_register_session_id),
        order_time: Set(m.order_time),
        last_status_change_time: Set(m.last_status_change_time),
        next_auto_transition_time: Set(m.next_auto_transition_time),
        auto_progress: Set(m.auto_progress),
        current_progress_percent: Set(m.current_progress_percent),
        created_at: Set(m.created_at),
    }
}

fn order_item_active_model(m: order_item_entity::Model) -> order_item_entity::ActiveModel {
    order_item_entity::ActiveModel {
        id: Set(m.id),
        order_id: Set(m.order_id),
        menu_item_id: Set(m.menu_item_id),
        quantity: Set(m.quantity),
        name: Set(m.name),
        price: Set(m.price),
        selected_size_id: Set(m.selected_size_id),
        selected_crust_id: Set(m.selected_crust_id),
        is_half_and_half: Set(m.is_half_and_half),
        first_half_flavor: Set(m.first_half_flavor),
        second_half_flavor: Set(m.second_half_flavor),
        created_at: Set(m.created_at),
    }
}

fn order_patch_active_model(id: Uuid, patch: &OrderPatch) -> order_entity::ActiveModel {
    order_entity::ActiveModel {
        id: ActiveValue::Unchanged(id),
        status: patched(patch.status),
        total_amount: patched(patch.total_amount),
        payment_method: patched(patch.payment_method),
        amount_paid: patched(patch.amount_paid),
        change_due: patched(patch.change_due),
        cash_register_session_id: patched(patch.cash_register_session_id),
        last_status_change_time: patched(patch.last_status_change_time),
        next_auto_transition_time: patched(patch.next_auto_transition_time),
        auto_progress: patched(patch.auto_progress),
        current_progress_percent: patched(patch.current_progress_percent),
        ..Default::default()
    }
}

#[async_trait]
impl Store for SeaOrmStore {
    async fn get_order(&self, id: Uuid) -> AppResult<Option<OrderDetail>> {
        let Some(order) = order_entity::Entity::find_by_id(id).one(&self.pool).await? else {
            return Ok(None);
        };
        let items = self.load_items(vec![id]).await?.remove(&id).unwrap_or_default();
        Ok(Some(OrderDetail { order, items }))
    }

    async fn list_orders(&self, filter: &OrderFilter) -> AppResult<Vec<OrderDetail>> {
        let mut query = order_entity::Entity::find();
        if let Some(statuses) = &filter.statuses {
            query = query.filter(order_entity::Column::Status.is_in(statuses.iter().copied()));
        }
        if let Some(session_id) = filter.cash_register_session_id {
            query = query.filter(order_entity::Column::CashRegisterSessionId.eq(session_id));
        }
        if let Some(since) = filter.placed_since {
            query = query.filter(order_entity::Column::OrderTime.gte(since));
        }
        query = query.order_by_desc(order_entity::Column::OrderTime);
        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }
        let orders = query.all(&self.pool).await?;

        let mut items = self.load_items(orders.iter().map(|o| o.id).collect()).await?;
        Ok(orders
            .into_iter()
            .map(|order| {
                let items = items.remove(&order.id).unwrap_or_default();
                OrderDetail { order, items }
            })
            .collect())
    }

    async fn insert_order(
        &self,
        order: order_entity::Model,
        items: Vec<order_item_entity::Model>,
    ) -> AppResult<()> {
        let txn = self.pool.begin().await?;
        order_entity::Entity::insert(order_active_model(order.clone()))
            .exec_without_returning(&txn)
            .await?;
        if !items.is_empty() {
            order_item_entity::Entity::insert_many(
                items.iter().cloned().map(order_item_active_model),
            )
            .exec_without_returning(&txn)
            .await?;
        }
        txn.commit().await?;

        self.publish(ChangeKind::Insert, ChangeRecord::Order(order));
        for item in items {
            self.publish(ChangeKind::Insert, ChangeRecord::OrderItem(item));
        }
        Ok(())
    }

    async fn update_order(&self, id: Uuid, patch: &OrderPatch) -> AppResult<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let updated = order_entity::Entity::update(order_patch_active_model(id, patch))
            .exec(&self.pool)
            .await
            .map_err(not_updated_as_not_found("Order", id))?;
        self.publish(ChangeKind::Update, ChangeRecord::Order(updated));
        Ok(())
    }

    async fn append_order_items(
        &self,
        id: Uuid,
        items: Vec<order_item_entity::Model>,
        patch: &OrderPatch,
    ) -> AppResult<()> {
        let txn = self.pool.begin().await?;
        if !items.is_empty() {
            order_item_entity::Entity::insert_many(
                items.iter().cloned().map(order_item_active_model),
            )
            .exec_without_returning(&txn)
            .await?;
        }
        let updated = order_entity::Entity::update(order_patch_active_model(id, patch))
            .exec(&txn)
            .await
            .map_err(not_updated_as_not_found("Order", id))?;
        txn.commit().await?;

        for item in items {
            self.publish(ChangeKind::Insert, ChangeRecord::OrderItem(item));
        }
        self.publish(ChangeKind::Update, ChangeRecord::Order(updated));
        Ok(())
    }

    async fn get_table(&self, id: Uuid) -> AppResult<Option<table_entity::Model>> {
        Ok(table_entity::Entity::find_by_id(id).one(&self.pool).await?)
    }

    async fn list_tables(&self) -> AppResult<Vec<table_entity::Model>> {
        Ok(table_entity::Entity::find()
            .order_by_asc(table_entity::Column::Name)
            .all(&self.pool)
            .await?)
    }

    async fn insert_table(&self, table: table_entity::Model) -> AppResult<table_entity::Model> {
        let am = table_entity::ActiveModel {
            id: Set(table.id),
            name: Set(table.name.clone()),
            capacity: Set(table.capacity),
            status: Set(table.status),
            current_order_id: Set(table.current_order_id),
            reservation_details: Set(table.reservation_details.clone()),
            created_at: Set(table.created_at),
        };
        table_entity::Entity::insert(am)
            .exec_without_returning(&self.pool)
            .await?;
        self.publish(ChangeKind::Insert, ChangeRecord::Table(table.clone()));
        Ok(table)
    }

    async fn update_table(
        &self,
        id: Uuid,
        patch: &TablePatch,
    ) -> AppResult<table_entity::Model> {
        if patch.is_empty() {
            return self
                .get_table(id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Table {id} not found")));
        }
        let am = table_entity::ActiveModel {
            id: ActiveValue::Unchanged(id),
            name: patched(patch.name.clone()),
            capacity: patched(patch.capacity),
            status: patched(patch.status),
            current_order_id: patched(patch.current_order_id),
            reservation_details: patched(patch.reservation_details.clone()),
            ..Default::default()
        };
        let updated = table_entity::Entity::update(am)
            .exec(&self.pool)
            .await
            .map_err(not_updated_as_not_found("Table", id))?;
        self.publish(ChangeKind::Update, ChangeRecord::Table(updated.clone()));
        Ok(updated)
    }

    async fn delete_table(&self, id: Uuid) -> AppResult<()> {
        let Some(existing) = self.get_table(id).await? else {
            return Err(AppError::NotFound(format!("Table {id} not found")));
        };
        let result = table_entity::Entity::delete_by_id(id).exec(&self.pool).await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Table {id} not found")));
        }
        self.publish(ChangeKind::Delete, ChangeRecord::Table(existing));
        Ok(())
    }

    async fn get_cash_session(&self, id: Uuid) -> AppResult<Option<cash_session_entity::Model>> {
        Ok(cash_session_entity::Entity::find_by_id(id)
            .one(&self.pool)
            .await?)
    }

    async fn list_cash_sessions(&self) -> AppResult<Vec<cash_session_entity::Model>> {
        Ok(cash_session_entity::Entity::find()
            .order_by_desc(cash_session_entity::Column::OpenedAt)
            .all(&self.pool)
            .await?)
    }

    async fn find_open_cash_session(&self) -> AppResult<Option<cash_session_entity::Model>> {
        Ok(cash_session_entity::Entity::find()
            .filter(cash_session_entity::Column::Status.eq(CashSessionStatus::Open))
            .order_by_desc(cash_session_entity::Column::OpenedAt)
            .one(&self.pool)
            .await?)
    }

    async fn insert_cash_session(
        &self,
        session: cash_session_entity::Model,
    ) -> AppResult<cash_session_entity::Model> {
        let am = cash_session_entity::ActiveModel {
            id: Set(session.id),
            opened_at: Set(session.opened_at),
            closed_at: Set(session.closed_at),
            opening_balance: Set(session.opening_balance),
            calculated_sales: Set(session.calculated_sales),
            expected_in_cash: Set(session.expected_in_cash),
            closing_balance_informed: Set(session.closing_balance_informed),
            difference: Set(session.difference),
            notes_opening: Set(session.notes_opening.clone()),
            notes_closing: Set(session.notes_closing.clone()),
            status: Set(session.status),
            created_at: Set(session.created_at),
        };
        match cash_session_entity::Entity::insert(am)
            .exec_without_returning(&self.pool)
            .await
        {
            Ok(_) => {}
            Err(err) => {
                if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
                    log::warn!("Rejected second open cash session: {detail}");
                    return Err(AppError::Conflict(
                        "A cash register session is already open".to_string(),
                    ));
                }
                return Err(err.into());
            }
        }
        self.publish(ChangeKind::Insert, ChangeRecord::CashSession(session.clone()));
        Ok(session)
    }

    async fn update_cash_session(
        &self,
        id: Uuid,
        patch: &CashSessionPatch,
    ) -> AppResult<cash_session_entity::Model> {
        let am = cash_session_entity::ActiveModel {
            id: ActiveValue::Unchanged(id),
            status: patched(patch.status),
            closed_at: patched(patch.closed_at.map(Some)),
            calculated_sales: patched(patch.calculated_sales.map(Some)),
            expected_in_cash: patched(patch.expected_in_cash.map(Some)),
            closing_balance_informed: patched(patch.closing_balance_informed.map(Some)),
            difference: patched(patch.difference.map(Some)),
            notes_closing: patched(patch.notes_closing.clone().map(Some)),
            ..Default::default()
        };
        let updated = cash_session_entity::Entity::update(am)
            .exec(&self.pool)
            .await
            .map_err(not_updated_as_not_found("Cash register session", id))?;
        self.publish(ChangeKind::Update, ChangeRecord::CashSession(updated.clone()));
        Ok(updated)
    }

    async fn cash_adjustments_available(&self) -> AppResult<bool> {
        match cash_adjustment_entity::Entity::find()
            .limit(1)
            .all(&self.pool)
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if err.to_string().contains("does not exist") => {
                log::warn!("cash_adjustments table missing, adjustments disabled: {err}");
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn list_cash_adjustments(
        &self,
        session_id: Option<Uuid>,
    ) -> AppResult<Vec<cash_adjustment_entity::Model>> {
        let mut query = cash_adjustment_entity::Entity::find();
        if let Some(session_id) = session_id {
            query = query
                .filter(cash_adjustment_entity::Column::CashRegisterSessionId.eq(session_id));
        }
        Ok(query
            .order_by_desc(cash_adjustment_entity::Column::AdjustedAt)
            .all(&self.pool)
            .await?)
    }

    async fn insert_cash_adjustment(
        &self,
        adjustment: cash_adjustment_entity::Model,
    ) -> AppResult<cash_adjustment_entity::Model> {
        let am = cash_adjustment_entity::ActiveModel {
            id: Set(adjustment.id),
            cash_register_session_id: Set(adjustment.cash_register_session_id),
            adjustment_type: Set(adjustment.adjustment_type),
            amount: Set(adjustment.amount),
            reason: Set(adjustment.reason.clone()),
            adjusted_at: Set(adjustment.adjusted_at),
            created_at: Set(adjustment.created_at),
        };
        cash_adjustment_entity::Entity::insert(am)
            .exec_without_returning(&self.pool)
            .await?;
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
