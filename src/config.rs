#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Sensor tunables. Nothing here is persisted by the driver.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Seconds after the last accepted reading before the value expires,
    /// 0 never expires
    pub expiration_delay: u32,
    /// Smallest change in °C reported as a change
    pub threshold: f32,
    /// ROM search attempts made by [`crate::Ds18::enable_scan`]
    pub search_attempts: u8,
    pub search_retry_delay_ms: u32,
}

impl Config {
    pub const DEFAULT_THRESHOLD: f32 = 0.3;
    pub const DEFAULT_SEARCH_ATTEMPTS: u8 = 10;
}

impl Default for Config {
    fn default() -> Self {
        Config {
            expiration_delay: 0,
            threshold: Self::DEFAULT_THRESHOLD,
            search_attempts: Self::DEFAULT_SEARCH_ATTEMPTS,
            search_retry_delay_ms: 1,
        }
    }
}
