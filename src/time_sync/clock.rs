/// Wall-clock capability and its host implementations
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use time::OffsetDateTime;
use tokio::time::{sleep, Duration};

use super::sntp;
use super::sync::is_plausible;
use crate::utils::format_datetime;

/// Delay between two failed SNTP queries
const SNTP_RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// Source of the current absolute time
pub trait Clock {
    fn now(&self) -> OffsetDateTime;
}

/// Something that can be asked to fetch network time in the background
pub trait TimeSource {
    fn request_sync(&self, server: &str, timezone: &str);
}

/// Clock that stays unset until network time has been received
///
/// Before synchronisation `now()` counts seconds since process start from
/// the Unix epoch, like a device RTC that was never set. Clones share state.
/// `from_host` skips the wait and trusts the host clock as-is, which is
/// what runs when the network is disabled.
#[derive(Debug, Clone)]
pub struct NetworkClock {
    inner: Arc<ClockState>,
}

#[derive(Debug)]
struct ClockState {
    started: Instant,
    synced: AtomicBool,
    /// Correction applied to the host clock, in nanoseconds
    offset_nanos: AtomicI64,
}

impl NetworkClock {
    pub fn new() -> Self {
        Self::with_sync_state(false)
    }

    pub fn from_host() -> Self {
        Self::with_sync_state(true)
    }

    fn with_sync_state(synced: bool) -> Self {
        Self {
            inner: Arc::new(ClockState {
                started: Instant::now(),
                synced: AtomicBool::new(synced),
                offset_nanos: AtomicI64::new(0),
            }),
        }
    }

    pub fn is_synced(&self) -> bool {
        self.inner.synced.load(Ordering::Acquire)
    }

    /// Adopt `server_time` as the current time
    pub fn apply(&self, server_time: OffsetDateTime) {
        let offset = server_time - OffsetDateTime::now_utc();
        let nanos = i64::try_from(offset.whole_nanoseconds()).unwrap_or(i64::MAX);
        self.inner.offset_nanos.store(nanos, Ordering::Relaxed);
        self.inner.synced.store(true, Ordering::Release);
        debug!("Clock offset set to {} ms", offset.whole_milliseconds());
    }
}

impl Default for NetworkClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for NetworkClock {
    fn now(&self) -> OffsetDateTime {
        if self.is_synced() {
            let offset = self.inner.offset_nanos.load(Ordering::Relaxed);
            OffsetDateTime::now_utc() + time::Duration::nanoseconds(offset)
        } else {
            let uptime = self.inner.started.elapsed();
            OffsetDateTime::UNIX_EPOCH + uptime
        }
    }
}

impl TimeSource for NetworkClock {
    fn request_sync(&self, server: &str, timezone: &str) {
        info!("Requesting network time from {} (timezone {})", server, timezone);

        let clock = self.clone();
        let server = server.to_string();
        tokio::spawn(async move {
            loop {
                match sntp::query(&server).await {
                    Ok(server_time) if is_plausible(server_time) => {
                        clock.apply(server_time);
                        debug!(
                            "Network time from {}: {}",
                            server,
                            format_datetime(&server_time)
                        );
                        break;
                    }
                    Ok(server_time) => {
                        warn!("Ignoring implausible time {} from {}", server_time, server)
                    }
                    Err(e) => warn!("SNTP query to {} failed: {}", server, e),
                }
                sleep(SNTP_RETRY_INTERVAL).await;
            }
        });
    }
}
