pub mod cash_adjustments;
pub mod cash_register_sessions;
pub mod order_items;
pub mod orders;
pub mod tables;

pub use cash_adjustments as cash_adjustment_entity;
pub use cash_register_sessions as cash_session_entity;
pub use order_items as order_item_entity;
pub use orders as order_entity;
pub use tables as table_entity;

pub use cash_adjustments::CashAdjustmentType;
pub use cash_register_sessions::CashSessionStatus;
pub use orders::{OrderStatus, OrderType, PaymentMethod};
pub use tables::TableStatus;
