pub mod clock;
pub mod sntp;
pub mod sync;

pub use clock::{Clock, NetworkClock, TimeSource};
pub use sync::await_synced_clock;
