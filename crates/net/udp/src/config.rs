use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use peerlink_channel::ChannelError;

/// Default credential shared by every instance of a mesh.
pub const DEFAULT_CREDENTIAL: &str = "Lets work together";

/// Configuration for a [`UdpTransport`](crate::UdpTransport).
#[derive(Debug, Clone)]
pub struct UdpConfig {
    /// Address every instance binds on.
    pub host: IpAddr,
    /// Port of this instance.
    pub local_port: u16,
    /// Every port that may host an instance, this one included.
    pub peer_ports: Vec<u16>,
    /// Shared static credential stamped on and required of every frame.
    pub credential: String,
    /// How often local subscriptions are re-announced.
    pub announce_interval: Duration,
    /// A remote subscription not refreshed for this long is dropped.
    pub subscription_ttl: Duration,
}

impl UdpConfig {
    /// Localhost config for ports `base_port..base_port + count`.
    pub fn localhost(base_port: u16, index: u16, count: u16) -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            local_port: base_port.saturating_add(index),
            peer_ports: (0..count).map(|i| base_port.saturating_add(i)).collect(),
            ..Default::default()
        }
    }

    /// Check the timing invariants the announce loop relies on.
    pub fn validate(&self) -> Result<(), ChannelError> {
        if self.announce_interval.is_zero() {
            return Err(ChannelError::Rejected(
                "announce interval must be non-zero".to_owned(),
            ));
        }
        if self.subscription_ttl <= self.announce_interval {
            return Err(ChannelError::Rejected(format!(
                "subscription ttl {:?} must exceed announce interval {:?}",
                self.subscription_ttl, self.announce_interval
            )));
        }
        Ok(())
    }
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            local_port: 6000,
            peer_ports: vec![6000],
            credential: DEFAULT_CREDENTIAL.to_owned(),
            announce_interval: Duration::from_millis(500),
            subscription_ttl: Duration::from_secs(2),
        }
    }
}
