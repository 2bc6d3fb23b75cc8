/// Temperature/humidity sensor capability and its Linux hwmon adapter
use log::{debug, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::time::sleep;

use crate::models::Measurement;
use crate::retry::RetryPolicy;

// hwmon attribute names exposed by the kernel aht10 driver (AHT10/AHT20)
const TEMPERATURE_ATTR: &str = "temp1_input";
const HUMIDITY_ATTR: &str = "humidity1_input";

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("failed to read {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("malformed sensor value '{0}'")]
    Malformed(String),
}

/// Source of temperature/humidity measurements
pub trait Sensor {
    /// Probe the device; `false` while it is not answering
    fn begin(&mut self) -> bool;

    fn read(&mut self) -> Result<Measurement, SensorError>;
}

impl<S: Sensor + ?Sized> Sensor for Box<S> {
    fn begin(&mut self) -> bool {
        (**self).begin()
    }

    fn read(&mut self) -> Result<Measurement, SensorError> {
        (**self).read()
    }
}

/// Block until the sensor answers `begin`
///
/// Returns `false` only when a capped policy runs out of attempts.
pub async fn wait_for_sensor<S: Sensor>(sensor: &mut S, policy: &RetryPolicy) -> bool {
    let mut attempts = 0;
    loop {
        if sensor.begin() {
            return true;
        }
        attempts += 1;
        if !policy.allows(attempts) {
            return false;
        }
        warn!("Could not find sensor. Waiting...");
        sleep(policy.interval).await;
    }
}

/// Decode a hwmon milli-unit attribute (e.g. `21375\n`) into units
///
/// Values are rounded to two decimal places.
pub fn decode_milli(raw: &str) -> Result<f32, SensorError> {
    let trimmed = raw.trim();
    let milli: i64 = trimmed
        .parse()
        .map_err(|_| SensorError::Malformed(trimmed.to_string()))?;
    let value = milli as f32 / 1000.0;
    Ok((value * 100.0).round() / 100.0)
}

/// Sensor exposed through a hwmon directory such as `/sys/class/hwmon/hwmon0`
#[derive(Debug, Clone)]
pub struct HwmonSensor {
    dir: PathBuf,
}

impl HwmonSensor {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn read_attr(&self, name: &str) -> Result<f32, SensorError> {
        let path = self.dir.join(name);
        let raw = fs::read_to_string(&path).map_err(|source| SensorError::Io {
            path: path.clone(),
            source,
        })?;
        decode_milli(&raw)
    }

    fn has_attr(dir: &Path, name: &str) -> bool {
        dir.join(name).is_file()
    }
}

impl Sensor for HwmonSensor {
    fn begin(&mut self) -> bool {
        let present = Self::has_attr(&self.dir, TEMPERATURE_ATTR)
            && Self::has_attr(&self.dir, HUMIDITY_ATTR);
        debug!("Sensor at {} present: {}", self.dir.display(), present);
        present
    }

    fn read(&mut self) -> Result<Measurement, SensorError> {
        let temperature = self.read_attr(TEMPERATURE_ATTR)?;
        // Relative humidity is capped at 100%
        let humidity = self.read_attr(HUMIDITY_ATTR)?.clamp(0.0, 100.0);
        Ok(Measurement {
            temperature,
            humidity,
        })
    }
}

/// Stand-in used when the sensor feature is switched off
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledSensor;

impl Sensor for DisabledSensor {
    fn begin(&mut self) -> bool {
        true
    }

    fn read(&mut self) -> Result<Measurement, SensorError> {
        Ok(Measurement {
            temperature: 0.0,
            humidity: 0.0,
        })
    }
}
