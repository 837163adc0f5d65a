use thiserror::Error;

/// Outcome of a failed bus transaction, in the priority the bus checks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// The transmitter/receiver channels were released
    #[error("driver not initialized")]
    DriverUninitialized,
    /// No presence pulse or no receive completion within the bounded wait
    #[error("timeout")]
    Timeout,
    /// Short capture, blank scratchpad or out-of-range value
    #[error("bad data")]
    MalformedData,
    #[error("CRC error")]
    Crc,
}

/// Error type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    #[error("invalid pin: {0}")]
    InvalidPin(u8),
    /// Discovery exhausted its attempt budget
    #[error("no DS18 sensor found")]
    DeviceNotFound,
    /// Zero address supplied where a resolved one is required
    #[error("invalid sensor address")]
    InvalidAddress,
    #[error("bus error: {0}")]
    Bus(#[from] BusError),
    #[error("sensor returned NaN")]
    NaNReading,
}
