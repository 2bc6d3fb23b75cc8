use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_TIMEZONE: &str = "UTC";
const DEFAULT_TIME_SERVER: &str = "pool.ntp.org";
const DEFAULT_BATCH_SIZE: u64 = 5;
const MAX_BATCH_SIZE: u32 = 1_000;
const DEFAULT_SAMPLE_PERIOD_SECS: u64 = 5;
const DEFAULT_REPORT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_NETWORK_INTERFACE: &str = "wlan0";
const DEFAULT_HWMON_PATH: &str = "/sys/class/hwmon/hwmon0";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),
    #[error("invalid value '{value}' for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
    #[error("report endpoint must use https, got '{0}'")]
    InsecureEndpoint(String),
}

/// Switches that used to be compile-time constants on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    pub sensor_enabled: bool,
    pub network_enabled: bool,
    pub verbose_logging: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            sensor_enabled: true,
            network_enabled: true,
            verbose_logging: false,
        }
    }
}

/// Network name and passphrase
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub ssid: String,
    passphrase: String,
}

impl Credentials {
    pub fn new(ssid: impl Into<String>, passphrase: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            passphrase: passphrase.into(),
        }
    }

    pub fn passphrase(&self) -> &str {
        &self.passphrase
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid)
            .field("passphrase", &"<redacted>")
            .finish()
    }
}

/// sysfs LED used as the busy indicator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedConfig {
    pub path: PathBuf,
    pub active_low: bool,
}

/// Probe configuration, fixed for the lifetime of the process
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub features: FeatureFlags,
    pub credentials: Credentials,
    pub timezone: String,
    pub time_server: String,
    /// Always `Some` when the network is enabled
    pub report_endpoint: Option<Url>,
    pub report_ca_cert: Option<PathBuf>,
    pub report_timeout: Duration,
    pub batch_size: usize,
    pub sample_period: Duration,
    pub network_interface: String,
    pub sensor_hwmon_path: PathBuf,
    pub status_led: Option<LedConfig>,
}

impl ProbeConfig {
    pub fn new() -> Result<Self, ConfigError> {
        // Load environment variables
        dotenv::dotenv().ok();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let features = FeatureFlags {
            sensor_enabled: parse_flag("SENSOR_ENABLED", var("SENSOR_ENABLED"), true)?,
            network_enabled: parse_flag("NETWORK_ENABLED", var("NETWORK_ENABLED"), true)?,
            verbose_logging: parse_flag("VERBOSE_LOGGING", var("VERBOSE_LOGGING"), false)?,
        };

        let ssid = var("WIFI_SSID");
        let passphrase = var("WIFI_PASSWORD").unwrap_or_default();
        let endpoint = var("REPORT_ENDPOINT");

        let (credentials, report_endpoint) = if features.network_enabled {
            let ssid = ssid.ok_or(ConfigError::Missing("WIFI_SSID"))?;
            let endpoint = endpoint.ok_or(ConfigError::Missing("REPORT_ENDPOINT"))?;
            (
                Credentials::new(ssid, passphrase),
                Some(parse_endpoint(&endpoint)?),
            )
        } else {
            let endpoint = endpoint.map(|e| parse_endpoint(&e)).transpose()?;
            (Credentials::new(ssid.unwrap_or_default(), passphrase), endpoint)
        };

        let batch_size = parse_batch_size(var("BATCH_SIZE"))?;
        let sample_period = Duration::from_secs(parse_positive(
            "SAMPLE_PERIOD_SECS",
            var("SAMPLE_PERIOD_SECS"),
            DEFAULT_SAMPLE_PERIOD_SECS,
        )?);
        if sample_period.checked_mul(batch_size).is_none() {
            return Err(ConfigError::Invalid {
                name: "SAMPLE_PERIOD_SECS",
                value: sample_period.as_secs().to_string(),
                reason: format!("report cadence overflows with a batch of {}", batch_size),
            });
        }
        let report_timeout = parse_positive(
            "REPORT_TIMEOUT_SECS",
            var("REPORT_TIMEOUT_SECS"),
            DEFAULT_REPORT_TIMEOUT_SECS,
        )?;

        let status_led = match var("STATUS_LED_PATH") {
            Some(path) => Some(LedConfig {
                path: PathBuf::from(path),
                active_low: parse_flag(
                    "STATUS_LED_ACTIVE_LOW",
                    var("STATUS_LED_ACTIVE_LOW"),
                    false,
                )?,
            }),
            None => None,
        };

        Ok(ProbeConfig {
            features,
            credentials,
            timezone: var("TIMEZONE").unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
            time_server: var("TIME_SERVER").unwrap_or_else(|| DEFAULT_TIME_SERVER.to_string()),
            report_endpoint,
            report_ca_cert: var("REPORT_CA_CERT").map(PathBuf::from),
            report_timeout: Duration::from_secs(report_timeout),
            batch_size: batch_size as usize,
            sample_period,
            network_interface: var("NETWORK_INTERFACE")
                .unwrap_or_else(|| DEFAULT_NETWORK_INTERFACE.to_string()),
            sensor_hwmon_path: PathBuf::from(
                var("SENSOR_HWMON_PATH").unwrap_or_else(|| DEFAULT_HWMON_PATH.to_string()),
            ),
            status_led,
        })
    }

    /// Time between two reports, a derived multiple of the sampling period
    pub fn report_cadence(&self) -> Duration {
        u32::try_from(self.batch_size)
            .ok()
            .and_then(|n| self.sample_period.checked_mul(n))
            .unwrap_or(Duration::MAX)
    }
}

fn parse_flag(name: &'static str, value: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };

    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value,
            reason: "expected a boolean".into(),
        }),
    }
}

fn parse_positive(name: &'static str, value: Option<String>, default: u64) -> Result<u64, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };

    match value.parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid {
            name,
            value,
            reason: "must be greater than zero".into(),
        }),
        Ok(n) => Ok(n),
        Err(e) => Err(ConfigError::Invalid {
            name,
            value,
            reason: e.to_string(),
        }),
    }
}

/// Batch size, bounded so the buffer and the report cadence stay sane
fn parse_batch_size(value: Option<String>) -> Result<u32, ConfigError> {
    let raw = value.clone();
    let n = parse_positive("BATCH_SIZE", value, DEFAULT_BATCH_SIZE)?;

    match u32::try_from(n) {
        Ok(n) if n <= MAX_BATCH_SIZE => Ok(n),
        _ => Err(ConfigError::Invalid {
            name: "BATCH_SIZE",
            value: raw.unwrap_or_default(),
            reason: format!("must be at most {}", MAX_BATCH_SIZE),
        }),
    }
}

fn parse_endpoint(value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::Invalid {
        name: "REPORT_ENDPOINT",
        value: value.to_string(),
        reason: e.to_string(),
    })?;

    if url.scheme() != "https" {
        return Err(ConfigError::InsecureEndpoint(value.to_string()));
    }

    Ok(url)
}
