use crate::{
    symbol::{BitEncoder, ResetEncoder},
    Address, BusError, Channels, Command, FunctionCommand, OpCode, Scratchpad, Symbol,
};
use embassy_sync::mutex::Mutex;
use embedded_hal::delay::DelayNs;

const MAX_SYMBOLS: usize = 64;

/// A bus controller owned elsewhere and lent to one or more sensors.
/// Holding it leaves interrupts enabled, so the receive-done notification
/// can still reach a transaction in progress.
pub type SharedBus<M, C> = Mutex<M, Bus<C>>;

/// Single-wire bus controller owning one pin's transmitter/receiver pair.
pub struct Bus<C: Channels> {
    pin: u8,
    channels: Option<C>,
    reset_encoder: ResetEncoder,
    bit_encoder: BitEncoder,
    tx: [Symbol; MAX_SYMBOLS],
    rx: [Symbol; MAX_SYMBOLS],
}

impl<C: Channels> Bus<C> {
    pub const MAX_SYMBOLS: usize = MAX_SYMBOLS;

    /// Upper bound on one receive
    pub const RX_TIMEOUT_US: u32 = 50_000;

    /// Time the pin needs after the channels are torn down
    pub const SETTLE_MS: u32 = 10;

    pub fn new(pin: u8, channels: C) -> Self {
        Bus {
            pin,
            channels: Some(channels),
            reset_encoder: ResetEncoder,
            bit_encoder: BitEncoder,
            tx: [Symbol::default(); MAX_SYMBOLS],
            rx: [Symbol::default(); MAX_SYMBOLS],
        }
    }

    pub fn pin(&self) -> u8 {
        self.pin
    }

    pub fn is_initialized(&self) -> bool {
        self.channels.is_some()
    }

    #[cfg(test)]
    pub(crate) fn channels_mut(&mut self) -> &mut C {
        self.channels.as_mut().unwrap()
    }

    /// Tears down the channels and waits for the pin to settle. Every later
    /// transaction reports [`BusError::DriverUninitialized`].
    pub fn release(&mut self, delay: &mut impl DelayNs) {
        if self.channels.take().is_some() {
            delay.delay_ms(Self::SETTLE_MS);
        }
    }

    /// Sends a reset pulse and listens for a presence pulse.
    /// Returns Ok(false) if no device answered within the receive timeout.
    pub fn reset(&mut self, delay: &mut impl DelayNs) -> Result<bool, BusError> {
        let channels = ready(&mut self.channels)?;
        channels.completion().clear();
        channels.start_receive().map_err(|_| BusError::Timeout)?;
        channels
            .transmit(&[self.reset_encoder.encode()])
            .map_err(|_| BusError::Timeout)?;

        match channels.completion().wait(delay, Self::RX_TIMEOUT_US) {
            Some(count) => {
                let count = channels.read_captured(&mut self.rx[..count.min(Self::MAX_SYMBOLS)]);
                Ok(self.reset_encoder.decode(&self.rx[..count]))
            }
            None => Ok(false),
        }
    }

    /// Reset that treats a missing presence pulse as an error
    pub fn reset_presence(&mut self, delay: &mut impl DelayNs) -> Result<(), BusError> {
        if self.reset(delay)? {
            Ok(())
        } else {
            Err(BusError::Timeout)
        }
    }

    /// Writes the low `len` bits of `data`, least significant first.
    pub fn write(&mut self, data: u8, len: u8) -> Result<(), BusError> {
        let channels = ready(&mut self.channels)?;
        let symbols = self.bit_encoder.encode(data, len, &mut self.tx);
        channels.transmit(symbols).map_err(|_| BusError::Timeout)
    }

    /// Reads `len` bits, least significant first.
    pub fn read(&mut self, delay: &mut impl DelayNs, len: u8) -> Result<u8, BusError> {
        let channels = ready(&mut self.channels)?;
        let slots = self.bit_encoder.encode_read(len, &mut self.tx);
        let expected = slots.len();

        channels.completion().clear();
        channels.start_receive().map_err(|_| BusError::Timeout)?;
        channels.transmit(slots).map_err(|_| BusError::Timeout)?;

        let count = channels
            .completion()
            .wait(delay, Self::RX_TIMEOUT_US)
            .ok_or(BusError::Timeout)?;
        let count = channels.read_captured(&mut self.rx[..count.min(Self::MAX_SYMBOLS)]);
        if count < expected {
            return Err(BusError::MalformedData);
        }
        Ok(self.bit_encoder.decode(&self.rx[..expected]))
    }

    pub fn write_bit(&mut self, bit: bool) -> Result<(), BusError> {
        self.write(bit as u8, 1)
    }

    pub fn read_bit(&mut self, delay: &mut impl DelayNs) -> Result<bool, BusError> {
        Ok(self.read(delay, 1)? & 0x01 != 0)
    }

    pub fn write_byte(&mut self, byte: u8) -> Result<(), BusError> {
        self.write(byte, 8)
    }

    pub fn read_byte(&mut self, delay: &mut impl DelayNs) -> Result<u8, BusError> {
        self.read(delay, 8)
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), BusError> {
        for b in bytes {
            self.write_byte(*b)?;
        }
        Ok(())
    }

    pub fn read_bytes(&mut self, delay: &mut impl DelayNs, dst: &mut [u8]) -> Result<(), BusError> {
        for d in dst {
            *d = self.read_byte(delay)?;
        }
        Ok(())
    }

    pub fn write_command(&mut self, cmd: impl OpCode) -> Result<(), BusError> {
        self.write_byte(cmd.op_code())
    }

    pub fn skip(&mut self) -> Result<(), BusError> {
        self.write_command(Command::SkipRom)
    }

    pub fn select(&mut self, addr: &Address) -> Result<(), BusError> {
        self.write_command(Command::MatchRom)?;
        self.write_bytes(addr.as_ref())
    }

    /// Reads the ROM code of the only device on the bus.
    pub fn read_rom(&mut self, delay: &mut impl DelayNs) -> Result<Address, BusError> {
        self.reset_presence(delay)?;
        self.write_command(Command::ReadRom)?;
        let mut address = Address::default();
        self.read_bytes(delay, address.as_mut())?;
        if address.is_crc_valid() {
            Ok(address)
        } else {
            Err(BusError::Crc)
        }
    }

    /// Starts a temperature conversion on `target`, or on every device when
    /// `None`. Returns without waiting for the conversion to finish.
    pub fn request(
        &mut self,
        delay: &mut impl DelayNs,
        target: Option<&Address>,
    ) -> Result<(), BusError> {
        self.reset_presence(delay)?;
        match target {
            Some(addr) => self.select(addr)?,
            None => self.skip()?,
        }
        self.write_command(FunctionCommand::Convert)
    }

    /// Reads the scratchpad of `addr` and converts the last conversion
    /// result to degrees Celsius.
    pub fn fetch_temperature(
        &mut self,
        delay: &mut impl DelayNs,
        addr: &Address,
    ) -> Result<f32, BusError> {
        let scratchpad = self.read_scratchpad(delay, addr)?;
        scratchpad.temperature(addr.family())
    }

    pub fn read_scratchpad(
        &mut self,
        delay: &mut impl DelayNs,
        addr: &Address,
    ) -> Result<Scratchpad, BusError> {
        self.reset_presence(delay)?;
        self.select(addr)?;
        self.write_command(FunctionCommand::ReadScratchpad)?;
        let mut raw = [0u8; Scratchpad::BYTES];
        self.read_bytes(delay, &mut raw)?;
        Ok(Scratchpad::from(raw))
    }
}

fn ready<C>(channels: &mut Option<C>) -> Result<&mut C, BusError> {
    channels.as_mut().ok_or(BusError::DriverUninitialized)
}
