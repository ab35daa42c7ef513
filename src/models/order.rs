use crate::entities::{
    OrderStatus, OrderType, PaymentMethod, order_entity, order_item_entity,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// An order row together with its line items.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: order_entity::Model,
    pub items: Vec<order_item_entity::Model>,
}

impl OrderDetail {
    pub fn id(&self) -> Uuid {
        self.order.id
    }
}

/// One half of a half-and-half pizza.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FlavorDetails {
    pub menu_item_id: Uuid,
    pub name: String,
    pub price_for_size: i64,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewOrderItem {
    pub menu_item_id: Uuid,
    #[schema(example = 2)]
    pub quantity: i32,
    pub name: String,
    /// Unit price in cents.
    #[schema(example = 3990)]
    pub price: i64,
    pub selected_size_id: Option<String>,
    pub selected_crust_id: Option<String>,
    #[serde(default)]
    pub is_half_and_half: bool,
    pub first_half_flavor: Option<FlavorDetails>,
    pub second_half_flavor: Option<FlavorDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    /// Set for orders placed by a registered customer (online orders).
    pub customer_id: Option<Uuid>,
    #[serde(default)]
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub customer_address: Option<String>,
    pub notes: Option<String>,
    pub order_type: OrderType,
    pub table_id: Option<Uuid>,
    pub payment_method: Option<PaymentMethod>,
    /// Cash tendered, in cents. Ignored for non-cash payments.
    pub amount_paid: Option<i64>,
    pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AddItemsRequest {
    pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentDetails {
    pub payment_method: PaymentMethod,
    /// Cash tendered, in cents.
    pub amount_paid: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub menu_item_id: Uuid,
    pub quantity: i32,
    pub name: String,
    pub price: i64,
    pub selected_size_id: Option<String>,
    pub selected_crust_id: Option<String>,
    pub is_half_and_half: bool,
    #[schema(value_type = Option<FlavorDetails>)]
    pub first_half_flavor: Option<serde_json::Value>,
    #[schema(value_type = Option<FlavorDetails>)]
    pub second_half_flavor: Option<serde_json::Value>,
}

impl From<order_item_entity::Model> for OrderItemResponse {
    fn from(m: order_item_entity::Model) -> Self {
        Self {
            id: m.id,
            menu_item_id: m.menu_item_id,
            quantity: m.quantity,
            name: m.name,
            price: m.price,
            selected_size_id: m.selected_size_id,
            selected_crust_id: m.selected_crust_id,
            is_half_and_half: m.is_half_and_half,
            first_half_flavor: m.first_half_flavor,
            second_half_flavor: m.second_half_flavor,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub customer_id: Option<Uuid>,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub customer_address: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<OrderItemResponse>,
    pub total_amount: i64,
    pub status: OrderStatus,
    pub order_type: OrderType,
    pub table_id: Option<Uuid>,
    pub payment_method: Option<PaymentMethod>,
    pub amount_paid: Option<i64>,
    pub change_due: Option<i64>,
    pub cash_register_session_id: Option<Uuid>,
    pub order_time: DateTime<Utc>,
    pub last_status_change_time: DateTime<Utc>,
    pub next_auto_transition_time: Option<DateTime<Utc>>,
    pub auto_progress: bool,
    pub current_progress_percent: i32,
}

impl From<OrderDetail> for OrderResponse {
    fn from(detail: OrderDetail) -> Self {
        let m = detail.order;
        Self {
            id: m.id,
            customer_id: m.customer_id,
            customer_name: m.customer_name,
            customer_phone: m.customer_phone,
            customer_address: m.customer_address,
            notes: m.notes,
            items: detail.items.into_iter().map(Into::into).collect(),
            total_amount: m.total_amount,
            status: m.status,
            order_type: m.order_type,
            table_id: m.table_id,
            payment_method: m.payment_method,
            amount_paid: m.amount_paid,
            change_due: m.change_due,
            cash_register_session_id: m.cash_register_session_id,
            order_time: m.order_time,
            last_status_change_time: m.last_status_change_time,
            next_auto_transition_time: m.next_auto_transition_time,
            auto_progress: m.auto_progress,
            current_progress_percent: m.current_progress_percent,
        }
    }
}

/// Outcome of one periodic transition sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TransitionSweep {
    pub checked: usize,
    pub advanced: usize,
    pub stopped: usize,
    pub progress_persisted: usize,
    pub failed: usize,
}

impl TransitionSweep {
    pub fn changed_anything(&self) -> bool {
        self.advanced + self.stopped + self.progress_persisted + self.failed > 0
    }
}
