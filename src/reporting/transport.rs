/// Encrypted HTTP transport for report bodies
use log::debug;
use std::fs;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::ReportError;

const CONTENT_TYPE: &str = "application/json";

/// Single POST of a JSON body
///
/// Resolves to the HTTP status code of whatever response came back,
/// including error statuses. Only failures to get a response at all
/// (DNS, TLS handshake, refused connection, timeout) are errors.
pub trait Transport {
    fn post_json(&self, url: &Url, body: String) -> impl Future<Output = Result<u16, ReportError>>;
}

/// HTTPS over native TLS (OpenSSL on Linux)
#[derive(Debug, Clone)]
pub struct HttpsTransport {
    agent: ureq::Agent,
}

impl HttpsTransport {
    /// Build the agent, optionally trusting an extra PEM root certificate
    pub fn new(ca_cert: Option<&Path>, timeout: Duration) -> Result<Self, ReportError> {
        let mut builder = native_tls::TlsConnector::builder();

        if let Some(path) = ca_cert {
            let pem = fs::read(path).map_err(|e| {
                ReportError::Tls(format!("Error loading CA cert {}: {}", path.display(), e))
            })?;
            let cert = native_tls::Certificate::from_pem(&pem)
                .map_err(|e| ReportError::Tls(format!("Invalid CA cert {}: {}", path.display(), e)))?;
            builder.add_root_certificate(cert);
        }

        let connector = builder
            .build()
            .map_err(|e| ReportError::Tls(format!("TLS connector error: {}", e)))?;

        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .tls_connector(Arc::new(connector))
            .build();

        Ok(Self { agent })
    }
}

impl Transport for HttpsTransport {
    fn post_json(&self, url: &Url, body: String) -> impl Future<Output = Result<u16, ReportError>> {
        let agent = self.agent.clone();
        let url = url.to_string();

        async move {
            // ureq blocks; keep it off the runtime thread but wait for it
            let outcome = tokio::task::spawn_blocking(move || {
                agent
                    .post(&url)
                    .set("Content-Type", CONTENT_TYPE)
                    .send_string(&body)
            })
            .await
            .map_err(|e| ReportError::Transport(e.to_string()))?;

            match outcome {
                Ok(response) => Ok(response.status()),
                Err(ureq::Error::Status(status, _)) => {
                    debug!("Endpoint answered with error status {}", status);
                    Ok(status)
                }
                Err(ureq::Error::Transport(e)) => Err(ReportError::Transport(e.to_string())),
            }
        }
    }
}
