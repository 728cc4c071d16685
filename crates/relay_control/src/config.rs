use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_RELAY_PORT: u16 = 8080;
pub const DEFAULT_HEALTH_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_TELEMETRY_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_LOG_CAPACITY: usize = 15;

const MIN_HEALTH_INTERVAL: Duration = Duration::from_secs(1);
const MIN_TELEMETRY_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSettings {
    pub relay_port: u16,
    pub health_interval_secs: u64,
    pub telemetry_interval_ms: u64,
    pub log_capacity: usize,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            relay_port: DEFAULT_RELAY_PORT,
            health_interval_secs: DEFAULT_HEALTH_INTERVAL_SECS,
            telemetry_interval_ms: DEFAULT_TELEMETRY_INTERVAL_MS,
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

impl ControllerSettings {
    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs).max(MIN_HEALTH_INTERVAL)
    }

    pub fn telemetry_interval(&self) -> Duration {
        Duration::from_millis(self.telemetry_interval_ms).max(MIN_TELEMETRY_INTERVAL)
    }

    pub fn log_capacity(&self) -> usize {
        self.log_capacity.max(1)
    }
}
