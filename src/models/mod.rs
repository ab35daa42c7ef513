pub mod cash_register;
pub mod common;
pub mod event;
pub mod order;
pub mod report;
pub mod table;

pub use cash_register::*;
pub use common::*;
pub use event::*;
pub use order::*;
pub use report::*;
pub use table::*;
