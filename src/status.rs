#[cfg(feature = "serde")]
use serde::Serialize;

/// Point-in-time view of a sensor, the shape exported to JSON.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status {
    pub enabled: bool,
    pub model: &'static str,
    /// ROM code, family byte first
    pub address: u64,
    /// Milliseconds since the last accepted reading
    #[cfg_attr(feature = "serde", serde(rename = "elapsed"))]
    pub elapsed_ms: u64,
    pub expired: bool,
    /// Only present while the reading is valid
    #[cfg_attr(feature = "serde", serde(rename = "temp"))]
    pub temperature: Option<f32>,
    #[cfg_attr(feature = "serde", serde(rename = "time"))]
    pub time_ms: u64,
    pub valid: bool,
}
