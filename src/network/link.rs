/// Wireless link capability and the host adapter
use log::debug;
use std::fs;
use std::net::{IpAddr, UdpSocket};
use std::path::PathBuf;

use crate::config::Credentials;

const SYSFS_NET: &str = "/sys/class/net";

// Documentation address (RFC 5737); connecting a UDP socket sends nothing
const ROUTE_PROBE_ADDR: &str = "192.0.2.1:9";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Idle,
    Disconnected,
    /// Association was explicitly rejected
    ConnectFailed,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMode {
    Off,
    Station,
}

/// Driver-level operations on the wireless interface
pub trait WirelessLink {
    fn status(&self) -> LinkStatus;

    /// Drop any existing association
    fn disconnect(&mut self);

    fn set_mode(&mut self, mode: LinkMode);

    /// Start associating; progress is observed through `status`
    fn begin(&mut self, credentials: &Credentials);

    /// Link-layer address, upper-case and colon separated
    fn hardware_address(&self) -> Option<String>;

    fn local_address(&self) -> Option<IpAddr>;
}

/// Interface managed by the host network stack (wpa_supplicant, NetworkManager...)
///
/// Association is owned by the host, so the control calls only log; state
/// is read back from sysfs.
#[derive(Debug, Clone)]
pub struct HostLink {
    interface_dir: PathBuf,
    interface: String,
}

impl HostLink {
    pub fn new(interface: &str) -> Self {
        Self::with_sysfs_root(SYSFS_NET, interface)
    }

    pub fn with_sysfs_root(root: impl Into<PathBuf>, interface: &str) -> Self {
        Self {
            interface_dir: root.into().join(interface),
            interface: interface.to_string(),
        }
    }

    fn read_attr(&self, name: &str) -> Option<String> {
        fs::read_to_string(self.interface_dir.join(name))
            .ok()
            .map(|v| v.trim().to_string())
    }
}

impl WirelessLink for HostLink {
    fn status(&self) -> LinkStatus {
        match self.read_attr("operstate").as_deref() {
            Some("up") => LinkStatus::Connected,
            Some("down") | Some("lowerlayerdown") | Some("dormant") => LinkStatus::Disconnected,
            Some(_) => LinkStatus::Idle,
            None => LinkStatus::ConnectFailed,
        }
    }

    fn disconnect(&mut self) {
        debug!("Disconnect on {} left to the host network stack", self.interface);
    }

    fn set_mode(&mut self, mode: LinkMode) {
        debug!("Mode {:?} on {} left to the host network stack", mode, self.interface);
    }

    fn begin(&mut self, credentials: &Credentials) {
        debug!(
            "Association of {} with '{}' left to the host network stack",
            self.interface, credentials.ssid
        );
    }

    fn hardware_address(&self) -> Option<String> {
        self.read_attr("address")
            .filter(|a| !a.is_empty())
            .map(|a| a.to_uppercase())
    }

    fn local_address(&self) -> Option<IpAddr> {
        let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
        socket.connect(ROUTE_PROBE_ADDR).ok()?;
        socket.local_addr().ok().map(|addr| addr.ip())
    }
}
