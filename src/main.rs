mod buffer;
mod config;
mod hardware;
mod models;
mod network;
mod probe;
mod reporting;
mod retry;
mod time_sync;
mod utils;

use log::{error, info};

use config::ProbeConfig;
use hardware::{DisabledSensor, HwmonSensor, Indicator, NoIndicator, Sensor, SysfsLed};
use network::HostLink;
use probe::Probe;
use reporting::HttpsTransport;
use time_sync::NetworkClock;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration first, it decides the log level
    let config = ProbeConfig::new();
    let level = match &config {
        Ok(config) if config.features.verbose_logging => log::LevelFilter::Debug,
        _ => log::LevelFilter::Info,
    };

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_secs()
        .init();

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let transport = match HttpsTransport::new(config.report_ca_cert.as_deref(), config.report_timeout) {
        Ok(transport) => transport,
        Err(e) => {
            error!("Failed to set up report transport: {}", e);
            return Err(e.into());
        }
    };

    let sensor: Box<dyn Sensor> = if config.features.sensor_enabled {
        Box::new(HwmonSensor::new(&config.sensor_hwmon_path))
    } else {
        Box::new(DisabledSensor)
    };

    let indicator: Box<dyn Indicator> = match &config.status_led {
        Some(led) => Box::new(SysfsLed::new(led)),
        None => Box::new(NoIndicator),
    };

    let clock = if config.features.network_enabled {
        NetworkClock::new()
    } else {
        NetworkClock::from_host()
    };

    let link = HostLink::new(&config.network_interface);
    let mut probe = Probe::new(config, sensor, indicator, link, clock, transport);

    // Run the probe until Ctrl+C
    tokio::select! {
        _ = async {
            probe.boot().await;
            probe.run().await;
        } => {
            info!("Probe loop ended");
        }
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Program terminated by user. Exiting gracefully."),
                Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
            }
        }
    }

    Ok(())
}
