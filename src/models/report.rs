use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Sales figures over delivered orders. Amounts in cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FinancialOverview {
    pub sales_today: i64,
    pub sales_this_month: i64,
    pub sales_this_year: i64,
    pub delivered_orders: usize,
    /// Mean delivered ticket, rounded down to the cent.
    pub average_ticket: i64,
    pub pending_orders: usize,
    pub orders_today: usize,
    pub generated_at: DateTime<Utc>,
}
