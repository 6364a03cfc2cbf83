use crate::error::ConfigError;
use crate::protocol::{BROADCAST_ADDRESS, MAX_MODULE_ID};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 1);
pub const DEFAULT_PORT: u16 = 1234;

pub const DEFAULT_HEARTBEAT_MIN_MS: u64 = 390;
pub const DEFAULT_HEARTBEAT_MAX_MS: u64 = 410;

/// Where the bus lives. None of this is visible to the protocol layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub group: Ipv4Addr,
    pub port: u16,
    /// Local interface used to join the group.
    pub interface: Ipv4Addr,
    pub multicast_loop: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            group: DEFAULT_MULTICAST_GROUP,
            port: DEFAULT_PORT,
            interface: Ipv4Addr::UNSPECIFIED,
            multicast_loop: true,
        }
    }
}

impl BusConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.group.is_multicast() {
            return Err(ConfigError::NotMulticast(self.group));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    pub min_period_ms: u64,
    pub max_period_ms: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            min_period_ms: DEFAULT_HEARTBEAT_MIN_MS,
            max_period_ms: DEFAULT_HEARTBEAT_MAX_MS,
        }
    }
}

impl HeartbeatConfig {
    pub fn min_period(&self) -> Duration {
        Duration::from_millis(self.min_period_ms)
    }

    pub fn max_period(&self) -> Duration {
        Duration::from_millis(self.max_period_ms)
    }
}

/// Settings for one simulated module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub module_id: u8,
    pub group_id: u8,
    pub bus: BusConfig,
    pub heartbeat: HeartbeatConfig,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            module_id: 0x00,
            group_id: 0x00,
            bus: BusConfig::default(),
            heartbeat: HeartbeatConfig::default(),
        }
    }
}

impl SimulatorConfig {
    /// Reads a JSON config file. Missing keys fall back to the defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.module_id > MAX_MODULE_ID {
            return Err(ConfigError::ModuleIdOutOfRange(self.module_id));
        }
        if self.group_id == BROADCAST_ADDRESS {
            return Err(ConfigError::GroupIdIsBroadcast(self.group_id));
        }
        if self.heartbeat.min_period_ms > self.heartbeat.max_period_ms {
            return Err(ConfigError::HeartbeatRange {
                min_ms: self.heartbeat.min_period_ms,
                max_ms: self.heartbeat.max_period_ms,
            });
        }
        self.bus.validate()
    }
}

/// Parses `0x`-prefixed hex or plain decimal addresses, as typed on the
/// command line.
pub fn parse_address(value: &str) -> Option<u8> {
    let value = value.trim();
    match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u8::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}
