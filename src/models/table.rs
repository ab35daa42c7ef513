use crate::entities::{TableStatus, table_entity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateTableRequest {
    #[schema(example = "12")]
    pub name: String,
    #[schema(example = 4)]
    pub capacity: i32,
    #[schema(value_type = Option<Object>)]
    pub reservation_details: Option<serde_json::Value>,
}

/// Partial table update. Absent fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateTableRequest {
    pub name: Option<String>,
    pub capacity: Option<i32>,
    pub status: Option<TableStatus>,
    pub current_order_id: Option<Uuid>,
    /// Drops the current order reference; wins over `current_order_id`.
    #[serde(default)]
    pub clear_current_order: bool,
    #[schema(value_type = Option<Object>)]
    pub reservation_details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TableResponse {
    pub id: Uuid,
    pub name: String,
    pub capacity: i32,
    pub status: TableStatus,
    pub current_order_id: Option<Uuid>,
    #[schema(value_type = Option<Object>)]
    pub reservation_details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl From<table_entity::Model> for TableResponse {
    fn from(m: table_entity::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            capacity: m.capacity,
            status: m.status,
            current_order_id: m.current_order_id,
            reservation_details: m.reservation_details,
            created_at: m.created_at,
        }
    }
}
