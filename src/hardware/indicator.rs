/// Busy indicator ("device busy, do not power down")
use log::debug;
use std::fs;
use std::path::PathBuf;

use crate::config::LedConfig;

/// Binary on/off signal with no feedback path
pub trait Indicator {
    fn set(&mut self, on: bool);
}

impl<I: Indicator + ?Sized> Indicator for Box<I> {
    fn set(&mut self, on: bool) {
        (**self).set(on)
    }
}

/// LED driven through `/sys/class/leds/<name>/brightness`
#[derive(Debug, Clone)]
pub struct SysfsLed {
    brightness: PathBuf,
    active_low: bool,
}

impl SysfsLed {
    pub fn new(config: &LedConfig) -> Self {
        Self {
            brightness: config.path.join("brightness"),
            active_low: config.active_low,
        }
    }
}

impl Indicator for SysfsLed {
    fn set(&mut self, on: bool) {
        // Active-low LEDs light up when the line is driven to 0
        let level = if on != self.active_low { "1" } else { "0" };
        if let Err(e) = fs::write(&self.brightness, level) {
            debug!("Failed to set LED {}: {}", self.brightness.display(), e);
        }
    }
}

/// Used when no LED is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIndicator;

impl Indicator for NoIndicator {
    fn set(&mut self, _on: bool) {}
}
