use time::OffsetDateTime;

/// Raw output of one sensor acquisition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub temperature: f32,
    pub humidity: f32,
}

/// One timestamped temperature/humidity sample
///
/// Readings are immutable once captured; the sample buffer owns each one
/// until its slot is overwritten in the next cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Degrees Celsius
    pub temperature: f32,
    /// Relative humidity in percent
    pub humidity: f32,
    /// Capture instant, always UTC
    pub timestamp: OffsetDateTime,
}

impl Reading {
    pub fn new(measurement: Measurement, timestamp: OffsetDateTime) -> Self {
        Self {
            temperature: measurement.temperature,
            humidity: measurement.humidity,
            timestamp: timestamp.to_offset(time::UtcOffset::UTC),
        }
    }
}
