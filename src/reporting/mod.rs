pub mod payload;
pub mod pipeline;
pub mod transport;

use thiserror::Error;

pub use pipeline::{ReportOutcome, Reporter};
pub use transport::{HttpsTransport, Transport};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to format timestamp: {0}")]
    Time(#[from] time::error::Format),
    #[error("failed to serialise report: {0}")]
    Json(#[from] serde_json::Error),
    #[error("TLS setup failed: {0}")]
    Tls(String),
    #[error("transport failure: {0}")]
    Transport(String),
}
