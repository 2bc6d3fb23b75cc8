/// Waiting for a trustworthy wall clock at boot
use log::{debug, info};
use time::OffsetDateTime;
use tokio::time::sleep;

use super::clock::{Clock, TimeSource};
use crate::retry::RetryPolicy;
use crate::utils::format_datetime;

/// 2017-07-14T02:40:00Z; a clock at or below this was never set
pub const SANITY_FLOOR: i64 = 1_500_000_000;

pub fn is_plausible(t: OffsetDateTime) -> bool {
    t.unix_timestamp() > SANITY_FLOOR
}

/// Request network time, then poll `clock` until it passes the sanity floor
///
/// Must only run once the link is up. Returns the first plausible time, or
/// `None` if a capped policy runs out; with the default unbounded policy
/// this blocks until time arrives.
pub async fn await_synced_clock<C, S>(
    clock: &C,
    source: &S,
    timezone: &str,
    server: &str,
    policy: &RetryPolicy,
) -> Option<OffsetDateTime>
where
    C: Clock,
    S: TimeSource,
{
    source.request_sync(server, timezone);

    let mut polls = 0;
    loop {
        let now = clock.now();
        if is_plausible(now) {
            info!("Time set: {} UTC (display timezone {})", format_datetime(&now), timezone);
            return Some(now);
        }

        polls += 1;
        if !policy.allows(polls) {
            return None;
        }
        debug!("Clock not set yet ({}), waiting", now.unix_timestamp());
        sleep(policy.interval).await;
    }
}
