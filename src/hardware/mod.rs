pub mod indicator;
pub mod sensor;

pub use indicator::{Indicator, NoIndicator, SysfsLed};
pub use sensor::{wait_for_sensor, DisabledSensor, HwmonSensor, Sensor};
