pub mod cash_register;
pub mod events;
pub mod order;
pub mod report;
pub mod table;

pub use cash_register::cash_register_config;
pub use events::events_config;
pub use order::order_config;
pub use report::report_config;
pub use table::table_config;
