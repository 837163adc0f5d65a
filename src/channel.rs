use crate::Symbol;
use core::fmt::Debug;
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};
use embedded_hal::delay::DelayNs;

/// Hardware timing transmitter/receiver pair bound to one open-drain pin.
///
/// The transmitter emits [`Symbol`]s with microsecond accuracy. The receiver
/// captures the line into its own buffer; once the line has gone idle it
/// reports the number of captured symbols through [`Channels::completion`],
/// typically from its receive-done interrupt.
pub trait Channels {
    type Error: Debug;

    /// Arms the receiver for one capture.
    fn start_receive(&mut self) -> Result<(), Self::Error>;

    /// Emits `symbols` back to back, returning once they are on the wire.
    fn transmit(&mut self, symbols: &[Symbol]) -> Result<(), Self::Error>;

    /// Copies the last capture into `buffer`, returning the symbols copied.
    fn read_captured(&mut self, buffer: &mut [Symbol]) -> usize;

    fn completion(&self) -> &Completion;
}

/// One-slot queue from the receive-done notification to the waiting call.
pub struct Completion {
    queue: Channel<CriticalSectionRawMutex, usize, 1>,
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

impl Completion {
    /// Poll interval while waiting
    const POLL_US: u32 = 10;

    pub const fn new() -> Self {
        Completion {
            queue: Channel::new(),
        }
    }

    /// Posts a finished capture of `symbols` symbols. Never blocks; returns
    /// false if an earlier capture has not been picked up yet.
    pub fn notify(&self, symbols: usize) -> bool {
        self.queue.try_send(symbols).is_ok()
    }

    /// Drops a stale notification left over from an abandoned transaction.
    pub fn clear(&self) {
        while self.queue.try_receive().is_ok() {}
    }

    /// Waits at most `timeout_us` for a capture to finish.
    pub fn wait(&self, delay: &mut impl DelayNs, timeout_us: u32) -> Option<usize> {
        let mut waited = 0;
        loop {
            if let Ok(symbols) = self.queue.try_receive() {
                return Some(symbols);
            }
            if waited >= timeout_us {
                return None;
            }
            delay.delay_us(Self::POLL_US);
            waited += Self::POLL_US;
        }
    }
}
