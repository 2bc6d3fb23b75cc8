/// Turning a full batch into one report
use log::{debug, error, info, warn};
use url::Url;

use super::payload::ReportPayload;
use super::transport::Transport;
use crate::models::Reading;

/// Identifier used until the link reports a hardware address
pub const UNKNOWN_DEVICE_ADDRESS: &str = "00:00:00:00:00:00";

/// What happened to one batch
///
/// Delivery is best-effort and at-most-once: a batch that could not be
/// sent is gone, and nothing upstream reacts to the outcome beyond logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    /// The endpoint answered; the status is informational only
    Sent { status: u16 },
    Dropped { reason: String },
    /// No endpoint (network disabled)
    Skipped,
}

pub struct Reporter<T> {
    transport: T,
    endpoint: Option<Url>,
    device_address: String,
}

impl<T: Transport> Reporter<T> {
    pub fn new(transport: T, endpoint: Option<Url>) -> Self {
        Self {
            transport,
            endpoint,
            device_address: UNKNOWN_DEVICE_ADDRESS.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    pub fn device_address(&self) -> &str {
        &self.device_address
    }

    pub fn set_device_address(&mut self, address: impl Into<String>) {
        self.device_address = address.into();
    }

    /// Serialize `readings` and POST them once
    ///
    /// Never fails: every error ends up as `ReportOutcome::Dropped`.
    /// `readings` is only borrowed for the duration of the call.
    pub async fn report(&self, readings: &[Reading]) -> ReportOutcome {
        debug!("Serialising {} readings", readings.len());
        let body = match ReportPayload::new(&self.device_address, readings).and_then(|p| p.to_json()) {
            Ok(body) => body,
            Err(e) => {
                error!("Failed to serialise report: {}", e);
                return ReportOutcome::Dropped {
                    reason: e.to_string(),
                };
            }
        };

        let Some(endpoint) = &self.endpoint else {
            debug!("Network disabled, not sending: {}", body);
            return ReportOutcome::Skipped;
        };

        info!("Posting data to {}", endpoint);
        debug!("{}", body);

        match self.transport.post_json(endpoint, body).await {
            Ok(status) => {
                info!("Response status code: {}", status);
                ReportOutcome::Sent { status }
            }
            Err(e) => {
                warn!("Report of {} readings dropped: {}", readings.len(), e);
                ReportOutcome::Dropped {
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::Measurement;
    use crate::reporting::ReportError;
    use serde_json::Value;
    use std::cell::RefCell;
    use std::future::Future;
    use time::OffsetDateTime;

    /// Transport that records bodies and either answers or refuses
    #[derive(Debug, Default)]
    pub(crate) struct RecordingTransport {
        pub bodies: RefCell<Vec<(String, String)>>,
        pub refuse: bool,
        pub status: u16,
    }

    impl RecordingTransport {
        pub(crate) fn answering(status: u16) -> Self {
            Self {
                status,
                ..Default::default()
            }
        }

        pub(crate) fn refusing() -> Self {
            Self {
                refuse: true,
                ..Default::default()
            }
        }

        pub(crate) fn posted(&self) -> Vec<Value> {
            self.bodies
                .borrow()
                .iter()
                .map(|(_, body)| serde_json::from_str(body).unwrap())
                .collect()
        }
    }

    impl Transport for RecordingTransport {
        fn post_json(&self, url: &Url, body: String) -> impl Future<Output = Result<u16, ReportError>> {
            self.bodies.borrow_mut().push((url.to_string(), body));
            let result = if self.refuse {
                Err(ReportError::Transport("Connection refused (os error 111)".into()))
            } else {
                Ok(self.status)
            };
            async move { result }
        }
    }

    fn endpoint() -> Option<Url> {
        Some(Url::parse("https://collector.example/v1/report").unwrap())
    }

    fn readings(n: usize) -> Vec<Reading> {
        (0..n)
            .map(|i| {
                Reading::new(
                    Measurement {
                        temperature: 20.0 + i as f32,
                        humidity: 50.0 + i as f32,
                    },
                    OffsetDateTime::from_unix_timestamp(1_700_000_000 + 5 * i as i64).unwrap(),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn posts_one_document_per_batch() {
        let mut reporter = Reporter::new(RecordingTransport::answering(201), endpoint());
        reporter.set_device_address("5C:CF:7F:0A:1B:2C");

        let outcome = reporter.report(&readings(4)).await;

        assert_eq!(outcome, ReportOutcome::Sent { status: 201 });
        let bodies = reporter.transport.bodies.borrow();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0].0, "https://collector.example/v1/report");

        let posted = reporter.transport.posted();
        assert_eq!(posted[0]["deviceAddress"], "5C:CF:7F:0A:1B:2C");
        let data = posted[0]["data"].as_array().unwrap();
        assert_eq!(data.len(), 4);
        let temperatures: Vec<f64> = data.iter().map(|d| d["temperature"].as_f64().unwrap()).collect();
        assert_eq!(temperatures, vec![20.0, 21.0, 22.0, 23.0]);
    }

    #[tokio::test]
    async fn error_status_is_still_sent() {
        let reporter = Reporter::new(RecordingTransport::answering(503), endpoint());

        assert_eq!(
            reporter.report(&readings(2)).await,
            ReportOutcome::Sent { status: 503 }
        );
    }

    #[tokio::test]
    async fn transport_failure_drops_the_batch() {
        let reporter = Reporter::new(RecordingTransport::refusing(), endpoint());

        let outcome = reporter.report(&readings(3)).await;

        assert!(matches!(outcome, ReportOutcome::Dropped { reason } if reason.contains("refused")));
        assert_eq!(reporter.transport.bodies.borrow().len(), 1);
    }

    #[tokio::test]
    async fn no_endpoint_skips_transport() {
        let reporter = Reporter::new(RecordingTransport::answering(200), None);

        assert_eq!(reporter.report(&readings(3)).await, ReportOutcome::Skipped);
        assert!(reporter.transport.bodies.borrow().is_empty());
    }

    #[test]
    fn device_address_defaults_to_zeroes() {
        let reporter = Reporter::new(RecordingTransport::default(), None);
        assert_eq!(reporter.device_address(), UNKNOWN_DEVICE_ADDRESS);
    }
}
