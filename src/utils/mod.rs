pub mod clock;
pub mod money;

pub use clock::{Clock, ManualClock, SystemClock};
pub use money::format_cents;
