use crate::entities::{
    CashAdjustmentType, CashSessionStatus, cash_adjustment_entity, cash_session_entity,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OpenCashRegisterRequest {
    /// Float counted into the drawer, in cents.
    #[schema(example = 10000)]
    pub opening_balance: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CloseCashRegisterRequest {
    /// Cash physically counted at close, in cents.
    #[schema(example = 25500)]
    pub closing_balance_informed: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateCashAdjustmentRequest {
    #[serde(rename = "type")]
    pub adjustment_type: CashAdjustmentType,
    #[schema(example = 2000)]
    pub amount: i64,
    #[schema(example = "Change for the float")]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CashSessionResponse {
    pub id: Uuid,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub opening_balance: i64,
    pub calculated_sales: Option<i64>,
    pub expected_in_cash: Option<i64>,
    pub closing_balance_informed: Option<i64>,
    pub difference: Option<i64>,
    pub notes_opening: Option<String>,
    pub notes_closing: Option<String>,
    pub status: CashSessionStatus,
}

impl From<cash_session_entity::Model> for CashSessionResponse {
    fn from(m: cash_session_entity::Model) -> Self {
        Self {
            id: m.id,
            opened_at: m.opened_at,
            closed_at: m.closed_at,
            opening_balance: m.opening_balance,
            calculated_sales: m.calculated_sales,
            expected_in_cash: m.expected_in_cash,
            closing_balance_informed: m.closing_balance_informed,
            difference: m.difference,
            notes_opening: m.notes_opening,
            notes_closing: m.notes_closing,
            status: m.status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CashAdjustmentResponse {
    pub id: Uuid,
    pub cash_register_session_id: Uuid,
    #[serde(rename = "type")]
    pub adjustment_type: CashAdjustmentType,
    pub amount: i64,
    pub reason: String,
    pub adjusted_at: DateTime<Utc>,
}

impl From<cash_adjustment_entity::Model> for CashAdjustmentResponse {
    fn from(m: cash_adjustment_entity::Model) -> Self {
        Self {
            id: m.id,
            cash_register_session_id: m.cash_register_session_id,
            adjustment_type: m.adjustment_type,
            amount: m.amount,
            reason: m.reason,
            adjusted_at: m.adjusted_at,
        }
    }
}

/// Till figures for one session. For closed sessions these are the stored values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub status: CashSessionStatus,
    pub opening_balance: i64,
    pub sales_from_orders: i64,
    pub added_adjustments: i64,
    pub removed_adjustments: i64,
    pub expected_in_cash: i64,
    pub closing_balance_informed: Option<i64>,
    pub difference: Option<i64>,
}
