use crate::{Address, Bus, BusError, Channels};
use embedded_hal::delay::DelayNs;

/// The bus transactions a sensor needs from its controller.
pub trait BusController {
    /// Pin the controller drives
    fn pin(&self) -> u8;

    /// Fills `addresses` with responding devices, returns how many.
    fn search(
        &mut self,
        delay: &mut impl DelayNs,
        addresses: &mut [Address],
    ) -> Result<usize, BusError>;

    /// Starts a conversion on `address` without waiting for it.
    fn request(&mut self, delay: &mut impl DelayNs, address: &Address) -> Result<(), BusError>;

    /// Reads back the last conversion of `address` in degrees Celsius.
    fn fetch_temperature(
        &mut self,
        delay: &mut impl DelayNs,
        address: &Address,
    ) -> Result<f32, BusError>;

    /// Tears the hardware down; later transactions fail with
    /// [`BusError::DriverUninitialized`].
    fn release(&mut self, delay: &mut impl DelayNs);
}

impl<C: Channels> BusController for Bus<C> {
    fn pin(&self) -> u8 {
        Bus::pin(self)
    }

    fn search(
        &mut self,
        delay: &mut impl DelayNs,
        addresses: &mut [Address],
    ) -> Result<usize, BusError> {
        Bus::search(self, delay, addresses)
    }

    fn request(&mut self, delay: &mut impl DelayNs, address: &Address) -> Result<(), BusError> {
        Bus::request(self, delay, Some(address))
    }

    fn fetch_temperature(
        &mut self,
        delay: &mut impl DelayNs,
        address: &Address,
    ) -> Result<f32, BusError> {
        Bus::fetch_temperature(self, delay, address)
    }

    fn release(&mut self, delay: &mut impl DelayNs) {
        Bus::release(self, delay)
    }
}
