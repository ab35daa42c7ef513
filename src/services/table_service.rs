use std::sync::Arc;
use uuid::Uuid;

use crate::entities::{TableStatus, table_entity};
use crate::error::{AppError, AppResult};
use crate::models::{CreateTableRequest, Notice, UpdateTableRequest};
use crate::services::AppState;
use crate::store::{Store, TablePatch};
use crate::utils::Clock;

#[derive(Clone)]
pub struct TableService {
    store: Arc<dyn Store>,
    state: AppState,
    clock: Arc<dyn Clock>,
}

impl TableService {
    pub fn new(store: Arc<dyn Store>, state: AppState, clock: Arc<dyn Clock>) -> Self {
        Self { store, state, clock }
    }

    pub async fn list_tables(&self) -> Vec<table_entity::Model> {
        self.state.tables().await
    }

    async fn current_table(&self, id: Uuid) -> AppResult<table_entity::Model> {
        if let Some(table) = self.state.table(id).await {
            return Ok(table);
        }
        self.store
            .get_table(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Table {id} not found")))
    }

    pub async fn add_table(&self, req: CreateTableRequest) -> AppResult<table_entity::Model> {
        let name = req.name.trim();
        if name.is_empty() {
            return Err(AppError::ValidationError("Table name is required".to_string()));
        }
        if req.capacity <= 0 {
            return Err(AppError::ValidationError(
                "Table capacity must be greater than zero".to_string(),
            ));
        }
        let table = table_entity::Model {
            id: Uuid::new_v4(),
            name: name.to_string(),
            capacity: req.capacity,
            status: TableStatus::Available,
            current_order_id: None,
            reservation_details: req.reservation_details,
            created_at: self.clock.now(),
        };
        let table = self.store.insert_table(table).await?;
        self.state.put_table(table.clone()).await;
        self.state
            .notify(Notice::success(format!("Table {} added", table.name)));
        Ok(table)
    }

    pub async fn update_table(
        &self,
        id: Uuid,
        req: UpdateTableRequest,
    ) -> AppResult<table_entity::Model> {
        if let Some(name) = &req.name
            && name.trim().is_empty()
        {
            return Err(AppError::ValidationError("Table name is required".to_string()));
        }
        if let Some(capacity) = req.capacity
            && capacity <= 0
        {
            return Err(AppError::ValidationError(
                "Table capacity must be greater than zero".to_string(),
            ));
        }
        let current_order_id = if req.clear_current_order {
            Some(None)
        } else {
            req.current_order_id.map(Some)
        };
        let patch = TablePatch {
            name: req.name.map(|n| n.trim().to_string()),
            capacity: req.capacity,
            status: req.status,
            current_order_id,
            reservation_details: req.reservation_details.map(Some),
        };
        self.apply_patch(id, patch).await
    }

    /// Writes a table patch after checking the cleaning guard.
    async fn apply_patch(&self, id: Uuid, patch: TablePatch) -> AppResult<table_entity::Model> {
        let table = self.current_table(id).await?;
        if patch.status == Some(TableStatus::NeedsCleaning) {
            self.ensure_no_active_order(&table).await?;
        }
        let updated = self.store.update_table(id, &patch).await?;
        self.state.put_table(updated.clone()).await;
        Ok(updated)
    }

    async fn ensure_no_active_order(&self, table: &table_entity::Model) -> AppResult<()> {
        let Some(order_id) = table.current_order_id else {
            return Ok(());
        };
        let order = match self.state.order(order_id).await {
            Some(detail) => Some(detail.order),
            None => self.store.get_order(order_id).await?.map(|d| d.order),
        };
        if let Some(order) = order
            && !order.status.is_terminal()
        {
            return Err(AppError::Conflict(format!(
                "Table {} still has an open order ({})",
                table.name, order.status
            )));
        }
        Ok(())
    }

    pub async fn delete_table(&self, id: Uuid) -> AppResult<()> {
        let table = self.current_table(id).await?;
        if table.status == TableStatus::Occupied && table.current_order_id.is_some() {
            return Err(AppError::Conflict(format!(
                "Table {} is occupied and cannot be removed",
                table.name
            )));
        }
        self.store.delete_table(id).await?;
        self.state.remove_table(id).await;
        self.state
            .notify(Notice::success(format!("Table {} removed", table.name)));
        Ok(())
    }

    /// Seats a new table order. Tables that are not Available are left as they are.
    pub async fn occupy_for_order(&self, table_id: Uuid, order_id: Uuid) -> AppResult<()> {
        let table = self.current_table(table_id).await?;
        if table.status != TableStatus::Available {
            log::info!(
                "Table {} is {}, leaving it untouched for order {order_id}",
                table.name,
                table.status
            );
            return Ok(());
        }
        let patch = TablePatch {
            status: Some(TableStatus::Occupied),
            current_order_id: Some(Some(order_id)),
            ..Default::default()
        };
        self.apply_patch(table_id, patch).await?;
        Ok(())
    }

    /// Frees a table once `order_id` is finished with it. The order reference is only
    /// dropped if the table still points at that order.
    pub async fn release_after_order(
        &self,
        table_id: Uuid,
        order_id: Uuid,
        status: TableStatus,
    ) -> AppResult<table_entity::Model> {
        let table = self.current_table(table_id).await?;
        let patch = TablePatch {
            status: Some(status),
            current_order_id: (table.current_order_id == Some(order_id)).then_some(None),
            ..Default::default()
        };
        self.apply_patch(table_id, patch).await
    }

    /// Frees the table of a cancelled order. Tables seated by another order keep their
    /// status and reference; `None` means nothing changed.
    pub async fn release_cancelled_order(
        &self,
        table_id: Uuid,
        order_id: Uuid,
    ) -> AppResult<Option<table_entity::Model>> {
        let table = self.current_table(table_id).await?;
        if table.current_order_id != Some(order_id) {
            log::info!(
                "Table {} is not held by cancelled order {order_id}, leaving it {}",
                table.name,
                table.status
            );
            return Ok(None);
        }
        let patch = TablePatch {
            status: Some(TableStatus::Available),
            current_order_id: Some(None),
            ..Default::default()
        };
        self.apply_patch(table_id, patch).await.map(Some)
    }
}
