//! Figment-based configuration loading.
//!
//! Configuration priority (highest wins):
//! 1. CLI arguments (applied after Figment load)
//! 2. Config file (TOML)
//! 3. Environment variables (`PEERLINK_` prefix, `__` between section and key)
//! 4. Defaults

use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;

use eyre::{Result, WrapErr, eyre};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use peerlink_net_udp::{DEFAULT_CREDENTIAL, UdpConfig};
use peerlink_router::RouterConfig;
use serde::{Deserialize, Serialize};

use crate::NodeArgs;

/// Transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub host: IpAddr,
    pub base_port: u16,
    pub credential: String,
    pub announce_interval_ms: u64,
    pub subscription_ttl_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            base_port: 6000,
            credential: DEFAULT_CREDENTIAL.to_owned(),
            announce_interval_ms: 500,
            subscription_ttl_ms: 2000,
        }
    }
}

/// Routing handler settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterSettings {
    /// Hold startup until someone subscribes to the broadcast topic.
    pub await_broadcast_match: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovery_timeout_ms: Option<u64>,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            await_broadcast_match: true,
            discovery_timeout_ms: None,
        }
    }
}

/// Complete instance configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerlinkConfig {
    pub network: NetworkConfig,
    pub router: RouterSettings,
}

impl PeerlinkConfig {
    /// Load configuration from defaults, environment, and config file.
    /// CLI overrides should be applied separately after loading.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(PeerlinkConfig::default()))
            .merge(Env::prefixed("PEERLINK_").split("__"));

        if let Some(path) = config_path {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }

        figment.extract().wrap_err("Failed to load configuration")
    }

    pub fn apply_args(&mut self, args: &NodeArgs) {
        if let Some(base_port) = args.base_port {
            self.network.base_port = base_port;
        }
        if let Some(credential) = &args.credential {
            self.network.credential = credential.clone();
        }
        if args.no_discovery_wait {
            self.router.await_broadcast_match = false;
        }
    }

    /// Transport config for process `index` of `count`.
    pub fn udp_config(&self, index: u16, count: u16) -> Result<UdpConfig> {
        let last = count
            .checked_sub(1)
            .and_then(|offset| self.network.base_port.checked_add(offset))
            .ok_or_else(|| {
                eyre!(
                    "{count} processes starting at port {} do not fit the port range",
                    self.network.base_port
                )
            })?;
        if index >= count {
            return Err(eyre!("process index {index} out of range for {count}"));
        }
        let interval = self.network.announce_interval_ms;
        if interval == 0 {
            return Err(eyre!("network.announce_interval_ms must be non-zero"));
        }
        if self.network.subscription_ttl_ms <= interval {
            return Err(eyre!(
                "network.subscription_ttl_ms ({}) must exceed network.announce_interval_ms ({interval})",
                self.network.subscription_ttl_ms
            ));
        }

        Ok(UdpConfig {
            host: self.network.host,
            local_port: self.network.base_port + index,
            peer_ports: (self.network.base_port..=last).collect(),
            credential: self.network.credential.clone(),
            announce_interval: Duration::from_millis(self.network.announce_interval_ms),
            subscription_ttl: Duration::from_millis(self.network.subscription_ttl_ms),
        })
    }

    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            await_broadcast_match: self.router.await_broadcast_match,
            discovery_timeout: self.router.discovery_timeout_ms.map(Duration::from_millis),
        }
    }
}
