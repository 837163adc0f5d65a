use crate::symbol::{
    PRESENCE_WAIT_MIN_US, RESET_PULSE_US, SLOT_BIT_US, SLOT_RECOVERY_US, SLOT_SAMPLE_US,
    SLOT_START_US,
};
use crate::{Channels, Completion, Symbol};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{Error, ErrorType, InputPin, OutputPin};

pub trait IoWire {
    type Error: Error;

    /// Is the input pin high?
    fn is_high(&mut self) -> Result<bool, Self::Error>;

    /// Is the input pin low?
    fn is_low(&mut self) -> Result<bool, Self::Error>;

    /// Drives the pin low
    fn set_low(&mut self) -> Result<(), Self::Error>;

    /// Releases the pin, the pull-up takes the line high
    ///
    /// *NOTE* the actual electrical state of the pin may still be low, e.g. while a slave
    /// holds the line
    fn set_high(&mut self) -> Result<(), Self::Error>;
}

/// Single open-drain pin
impl<IO> IoWire for (IO,)
where
    IO: ErrorType + OutputPin + InputPin,
{
    type Error = IO::Error;

    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.0.is_high()
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.0.is_low()
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.set_low()
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.set_high()
    }
}

/// Separate input and output pins on the same line
impl<E, I, O> IoWire for (I, O)
where
    E: Error,
    I: ErrorType<Error = E> + InputPin,
    O: ErrorType<Error = E> + OutputPin,
{
    type Error = E;

    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.0.is_high()
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.0.is_low()
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.1.set_low()
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.1.set_high()
    }
}

const MAX_SYMBOLS: usize = 64;

/// Presence window polling step
const PRESENCE_POLL_US: u16 = 5;

// the first poll must land before any presence pulse can start
const _: () = assert!(PRESENCE_POLL_US < PRESENCE_WAIT_MIN_US);

/// Software transmitter/receiver pair: toggles an [`IoWire`] with a
/// microsecond delay and samples the line where a receiver would.
///
/// Timing accuracy is that of `D` and of whatever may interrupt the caller,
/// so run it from a context that does not get preempted mid-slot.
pub struct BitBang<W: IoWire, D: DelayNs> {
    wire: W,
    delay: D,
    completion: Completion,
    armed: bool,
    captured: [Symbol; MAX_SYMBOLS],
    count: usize,
}

impl<W: IoWire, D: DelayNs> BitBang<W, D> {
    pub fn new(wire: W, delay: D) -> Self {
        BitBang {
            wire,
            delay,
            completion: Completion::new(),
            armed: false,
            captured: [Symbol::default(); MAX_SYMBOLS],
            count: 0,
        }
    }

    pub fn into_inner(self) -> (W, D) {
        (self.wire, self.delay)
    }

    fn capture(&mut self, symbol: Symbol) {
        if self.armed && self.count < MAX_SYMBOLS {
            self.captured[self.count] = symbol;
            self.count += 1;
        }
    }

    /// Holds the reset pulse, then watches the release window for a slave
    /// pulling the line low.
    fn reset(&mut self, symbol: &Symbol) -> Result<(), W::Error> {
        self.wire.set_low()?;
        self.delay.delay_us(symbol.low_us as u32);
        self.wire.set_high()?;

        let mut elapsed = 0;
        let mut fall = None;
        let mut rise = None;
        while elapsed < symbol.high_us {
            self.delay.delay_us(PRESENCE_POLL_US as u32);
            elapsed += PRESENCE_POLL_US;
            let low = self.wire.is_low()?;
            match (fall, rise) {
                (None, _) if low => fall = Some(elapsed),
                (Some(_), None) if !low => rise = Some(elapsed),
                _ => {}
            }
        }

        match fall {
            Some(fall) => {
                let rise = rise.unwrap_or(symbol.high_us);
                self.capture(Symbol::new(symbol.low_us, fall));
                self.capture(Symbol::new(rise - fall, symbol.high_us - rise));
            }
            None => self.capture(*symbol),
        }
        Ok(())
    }

    /// Emits one slot. Slots releasing the line before the sample point are
    /// sampled there; a slave holding the line reads as a stretched low.
    fn slot(&mut self, symbol: &Symbol) -> Result<(), W::Error> {
        self.wire.set_low()?;
        self.delay.delay_us(symbol.low_us as u32);
        self.wire.set_high()?;

        if symbol.low_us >= SLOT_SAMPLE_US {
            self.delay.delay_us(symbol.high_us as u32);
            self.capture(*symbol);
            return Ok(());
        }

        let until_sample = SLOT_SAMPLE_US - symbol.low_us;
        self.delay.delay_us(until_sample as u32);
        let held = self.wire.is_low()?;
        self.delay
            .delay_us(symbol.high_us.saturating_sub(until_sample) as u32);
        if held {
            self.capture(Symbol::new(SLOT_START_US + SLOT_BIT_US, SLOT_RECOVERY_US));
        } else {
            self.capture(*symbol);
        }
        Ok(())
    }
}

impl<W: IoWire, D: DelayNs> Channels for BitBang<W, D> {
    type Error = W::Error;

    fn start_receive(&mut self) -> Result<(), Self::Error> {
        self.armed = true;
        self.count = 0;
        Ok(())
    }

    fn transmit(&mut self, symbols: &[Symbol]) -> Result<(), Self::Error> {
        for symbol in symbols {
            if symbol.low_us >= RESET_PULSE_US {
                self.reset(symbol)?;
            } else {
                self.slot(symbol)?;
            }
        }
        if self.armed {
            self.armed = false;
            self.completion.notify(self.count);
        }
        Ok(())
    }

    fn read_captured(&mut self, buffer: &mut [Symbol]) -> usize {
        let count = buffer.len().min(self.count);
        buffer[..count].copy_from_slice(&self.captured[..count]);
        count
    }

    fn completion(&self) -> &Completion {
        &self.completion
    }
}
