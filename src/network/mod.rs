pub mod connectivity;
pub mod link;

pub use connectivity::ConnectivityManager;
pub use link::{HostLink, WirelessLink};
