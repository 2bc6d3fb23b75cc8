/// Establishing and guarding the wireless link
use log::{info, warn};
use thiserror::Error;
use tokio::time::sleep;

use super::link::{LinkMode, LinkStatus, WirelessLink};
use crate::config::Credentials;
use crate::retry::RetryPolicy;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("link to '{ssid}' not up after {attempts} polls")]
    AttemptsExhausted { ssid: String, attempts: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    Disconnected,
    Connecting,
    Connected,
}

pub struct ConnectivityManager<L> {
    link: L,
    policy: RetryPolicy,
    state: ConnectivityState,
}

impl<L: WirelessLink> ConnectivityManager<L> {
    pub fn new(link: L, policy: RetryPolicy) -> Self {
        Self {
            link,
            policy,
            state: ConnectivityState::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// Make sure the link is up, associating from scratch if it is not
    ///
    /// Returns immediately when already connected. Otherwise the interface
    /// is reset (disassociate, off, station) before associating, because
    /// some driver stacks keep stale state across reconnects. Polling then
    /// continues until the link is up; with the default unbounded policy
    /// this never returns an error.
    pub async fn ensure_connected(&mut self, credentials: &Credentials) -> Result<(), LinkError> {
        if self.link.status() == LinkStatus::Connected {
            self.state = ConnectivityState::Connected;
            return Ok(());
        }

        self.state = ConnectivityState::Connecting;
        info!("Connecting to: {}", credentials.ssid);

        self.link.disconnect();
        self.link.set_mode(LinkMode::Off);
        self.link.set_mode(LinkMode::Station);
        self.link.begin(credentials);

        let mut polls = 0;
        loop {
            match self.link.status() {
                LinkStatus::Connected => break,
                LinkStatus::ConnectFailed => {
                    warn!("Failed to connect to {}", credentials.ssid);
                    sleep(self.policy.failure_backoff).await;
                }
                status => info!("Waiting for {} ({:?})", credentials.ssid, status),
            }

            polls += 1;
            if !self.policy.allows(polls) {
                self.state = ConnectivityState::Disconnected;
                return Err(LinkError::AttemptsExhausted {
                    ssid: credentials.ssid.clone(),
                    attempts: polls,
                });
            }
            sleep(self.policy.interval).await;
        }

        self.state = ConnectivityState::Connected;
        info!("Link connected");
        match self.link.local_address() {
            Some(ip) => info!("IP address: {}", ip),
            None => warn!("Link is up but has no local address yet"),
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;
    use tokio::time::Instant;

    /// Link whose status follows a script, then stays at the last entry
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedLink {
        pub statuses: std::cell::RefCell<VecDeque<LinkStatus>>,
        pub last: std::cell::Cell<Option<LinkStatus>>,
        pub begins: u32,
        pub disconnects: u32,
        pub modes: Vec<LinkMode>,
    }

    impl ScriptedLink {
        pub(crate) fn new(script: &[LinkStatus]) -> Self {
            Self {
                statuses: std::cell::RefCell::new(script.iter().copied().collect()),
                ..Default::default()
            }
        }
    }

    impl WirelessLink for ScriptedLink {
        fn status(&self) -> LinkStatus {
            let next = self.statuses.borrow_mut().pop_front();
            match next {
                Some(status) => {
                    self.last.set(Some(status));
                    status
                }
                None => self.last.get().unwrap_or(LinkStatus::Idle),
            }
        }

        fn disconnect(&mut self) {
            self.disconnects += 1;
        }

        fn set_mode(&mut self, mode: LinkMode) {
            self.modes.push(mode);
        }

        fn begin(&mut self, _credentials: &Credentials) {
            self.begins += 1;
        }

        fn hardware_address(&self) -> Option<String> {
            Some("5C:CF:7F:00:00:01".to_string())
        }

        fn local_address(&self) -> Option<IpAddr> {
            Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 40)))
        }
    }

    fn credentials() -> Credentials {
        Credentials::new("probe-net", "hunter2")
    }

    #[tokio::test(start_paused = true)]
    async fn already_connected_link_is_left_alone() {
        let link = ScriptedLink::new(&[LinkStatus::Connected]);
        let mut manager = ConnectivityManager::new(link, RetryPolicy::link());

        manager.ensure_connected(&credentials()).await.unwrap();
        manager.ensure_connected(&credentials()).await.unwrap();

        assert_eq!(manager.state(), ConnectivityState::Connected);
        assert_eq!(manager.link().begins, 0);
        assert_eq!(manager.link().disconnects, 0);
        assert!(manager.link().modes.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn connects_after_resetting_interface() {
        let link = ScriptedLink::new(&[
            LinkStatus::Disconnected,
            LinkStatus::Idle,
            LinkStatus::Idle,
            LinkStatus::Connected,
        ]);
        let mut manager = ConnectivityManager::new(link, RetryPolicy::link());
        let start = Instant::now();

        manager.ensure_connected(&credentials()).await.unwrap();

        assert_eq!(manager.state(), ConnectivityState::Connected);
        assert_eq!(manager.link().disconnects, 1);
        assert_eq!(manager.link().modes, vec![LinkMode::Off, LinkMode::Station]);
        assert_eq!(manager.link().begins, 1);
        // Two idle polls, one second apart
        assert_eq!(start.elapsed(), Duration::from_secs(2));

        // Second call is a no-op
        manager.ensure_connected(&credentials()).await.unwrap();
        assert_eq!(manager.link().begins, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_association_backs_off_and_keeps_trying() {
        let link = ScriptedLink::new(&[
            LinkStatus::Disconnected,
            LinkStatus::ConnectFailed,
            LinkStatus::Connected,
        ]);
        let mut manager = ConnectivityManager::new(link, RetryPolicy::link());
        let start = Instant::now();

        manager.ensure_connected(&credentials()).await.unwrap();

        assert_eq!(start.elapsed(), Duration::from_secs(11));
        assert_eq!(manager.link().begins, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn capped_policy_reports_exhaustion() {
        let link = ScriptedLink::new(&[LinkStatus::Disconnected]);
        let policy = RetryPolicy::link().with_max_attempts(3);
        let mut manager = ConnectivityManager::new(link, policy);

        let err = manager.ensure_connected(&credentials()).await.unwrap_err();

        assert_eq!(
            err,
            LinkError::AttemptsExhausted {
                ssid: "probe-net".into(),
                attempts: 3
            }
        );
        assert_eq!(manager.state(), ConnectivityState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_link_is_reestablished() {
        let link = ScriptedLink::new(&[
            LinkStatus::Connected,
            LinkStatus::Disconnected,
            LinkStatus::Idle,
            LinkStatus::Connected,
        ]);
        let mut manager = ConnectivityManager::new(link, RetryPolicy::link());

        manager.ensure_connected(&credentials()).await.unwrap();
        assert_eq!(manager.link().begins, 0);

        manager.ensure_connected(&credentials()).await.unwrap();
        assert_eq!(manager.link().begins, 1);
        assert_eq!(manager.state(), ConnectivityState::Connected);
    }
}
