/// Boot sequence and steady-state sampling loop
use log::{debug, info, warn};
use tokio::time::sleep;

use crate::buffer::{BufferStatus, SampleBuffer};
use crate::config::ProbeConfig;
use crate::hardware::{wait_for_sensor, Indicator, Sensor};
use crate::models::Reading;
use crate::network::{ConnectivityManager, WirelessLink};
use crate::reporting::{ReportOutcome, Reporter, Transport};
use crate::retry::RetryPolicy;
use crate::time_sync::{await_synced_clock, Clock, TimeSource};
use crate::utils::format_datetime;

/// Result of one sampling tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Reading stored; `buffered` readings are waiting for the batch to fill
    Recorded { buffered: usize },
    /// The reading completed a batch, which went through the pipeline
    Reported(ReportOutcome),
    SensorFailed,
}

/// The probe and everything it owns
///
/// Runs on a single task: sampling, reporting and the blocking waits never
/// overlap, so the buffer needs no locking.
pub struct Probe<S, I, L, C, T> {
    config: ProbeConfig,
    sensor: S,
    indicator: I,
    /// `None` when the network feature is off
    connectivity: Option<ConnectivityManager<L>>,
    clock: C,
    reporter: Reporter<T>,
    buffer: SampleBuffer,
}

impl<S, I, L, C, T> Probe<S, I, L, C, T>
where
    S: Sensor,
    I: Indicator,
    L: WirelessLink,
    C: Clock + TimeSource,
    T: Transport,
{
    pub fn new(config: ProbeConfig, sensor: S, indicator: I, link: L, clock: C, transport: T) -> Self {
        let network_enabled = config.features.network_enabled;
        let connectivity =
            network_enabled.then(|| ConnectivityManager::new(link, RetryPolicy::link()));
        let endpoint = if network_enabled {
            config.report_endpoint.clone()
        } else {
            None
        };

        Self {
            buffer: SampleBuffer::new(config.batch_size),
            reporter: Reporter::new(transport, endpoint),
            config,
            sensor,
            indicator,
            connectivity,
            clock,
        }
    }

    /// Wait for the sensor, bring the link up and sync the clock
    pub async fn boot(&mut self) {
        self.indicator.set(true);
        info!("Booting...");

        if self.config.features.sensor_enabled
            && !wait_for_sensor(&mut self.sensor, &RetryPolicy::sensor_startup()).await
        {
            warn!("Sensor did not answer, continuing without it");
        }

        if let Some(connectivity) = self.connectivity.as_mut() {
            if let Err(e) = connectivity.ensure_connected(&self.config.credentials).await {
                warn!("Continuing without link: {}", e);
            }
            if let Some(address) = connectivity.link().hardware_address() {
                self.reporter.set_device_address(address);
            }
            info!("Device address: {}", self.reporter.device_address());

            await_synced_clock(
                &self.clock,
                &self.clock,
                &self.config.timezone,
                &self.config.time_server,
                &RetryPolicy::clock(),
            )
            .await;
        }

        info!("Bootup complete");
        self.indicator.set(false);
    }

    /// Take one reading and report the batch if it is now full
    pub async fn tick(&mut self) -> TickOutcome {
        let timestamp = self.clock.now();
        let measurement = match self.sensor.read() {
            Ok(measurement) => measurement,
            Err(e) => {
                warn!("Sensor read failed, skipping sample: {}", e);
                return TickOutcome::SensorFailed;
            }
        };

        let reading = Reading::new(measurement, timestamp);
        debug!(
            "[{}] {:.2} C | {:.2} %",
            format_datetime(&reading.timestamp),
            reading.temperature,
            reading.humidity
        );

        let status = self.buffer.record(reading);
        debug!("Buffered {} readings", self.fill_level());

        match status {
            BufferStatus::Accepted => TickOutcome::Recorded {
                buffered: self.buffer.cursor(),
            },
            BufferStatus::Full => TickOutcome::Reported(self.report_batch().await),
        }
    }

    fn fill_level(&self) -> String {
        format!("{}/{}", self.buffer.pending().len(), self.buffer.capacity())
    }

    async fn report_batch(&mut self) -> ReportOutcome {
        info!("Send data");
        self.indicator.set(true);

        if let Some(connectivity) = self.connectivity.as_mut() {
            if let Err(e) = connectivity.ensure_connected(&self.config.credentials).await {
                warn!("Link still down ({:?}): {}", connectivity.state(), e);
            }
        }

        let batch = self.buffer.batch().unwrap_or_default();
        let outcome = self.reporter.report(batch).await;

        // Whatever happened to the batch, the slots are free again
        self.buffer.reset();
        self.indicator.set(false);
        outcome
    }

    /// Sample forever at the configured period
    pub async fn run(&mut self) {
        info!(
            "Sampling every {}s, reporting every {}s",
            self.config.sample_period.as_secs(),
            self.config.report_cadence().as_secs()
        );

        loop {
            self.tick().await;
            sleep(self.config.sample_period).await;
        }
    }
}
