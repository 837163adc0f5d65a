use crate::BusController;
use core::fmt::Debug;

/// Board services the sensor cannot provide itself.
pub trait Platform {
    /// Controller built on a claimed pin, usually [`crate::Bus`] over the
    /// board's channels
    type Bus: BusController;
    type Error: Debug;

    /// Can `pin` drive an open-drain output?
    fn is_output_pin(&self, pin: u8) -> bool;

    /// Creates the transmitter/receiver pair for `pin` and wraps it in a
    /// controller. Must refuse a pin that is already claimed.
    fn claim(&mut self, pin: u8) -> Result<Self::Bus, Self::Error>;

    /// Monotonic milliseconds
    fn now_ms(&self) -> u64;
}
