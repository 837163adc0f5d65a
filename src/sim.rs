//! Simulated single-wire bus with DS18 slaves, at symbol level.

use crate::scratchpad::ds18b20_scratchpad;
use crate::symbol::{
    RESET_PULSE_US, RESET_WAIT_US, SLOT_BIT_US, SLOT_RECOVERY_US, SLOT_SAMPLE_US, SLOT_START_US,
};
use crate::{Address, Channels, Command, Completion, FunctionCommand, Scratchpad, Symbol};
use core::convert::Infallible;
use embedded_hal_mock::eh1::delay::NoopDelay;
use std::sync::Arc;
use std::time::Duration;
use std::vec::Vec;

#[derive(Debug, Clone)]
pub struct SimDevice {
    address: Address,
    scratchpad: [u8; Scratchpad::BYTES],
    active: bool,
}

impl SimDevice {
    /// Freshly powered DS18B20, scratchpad still holds 85 °C
    pub fn ds18b20(address: Address) -> Self {
        SimDevice {
            address,
            scratchpad: [0; Scratchpad::BYTES],
            active: false,
        }
        .with_raw_temperature(0x0550)
    }

    pub fn with_raw_temperature(mut self, raw: i16) -> Self {
        self.set_raw_temperature(raw);
        self
    }

    pub fn with_corrupt_scratchpad(mut self) -> Self {
        self.scratchpad[8] ^= 0x5A;
        self
    }

    pub fn set_raw_temperature(&mut self, raw: i16) {
        self.scratchpad
            .copy_from_slice(ds18b20_scratchpad(raw, 0x7F).as_ref());
    }

    fn scratchpad_bit(&self, bit: u8) -> bool {
        self.scratchpad[(bit / 8) as usize] & (0x01 << (bit % 8)) != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SearchStep {
    Id,
    Complement,
    Direction,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    /// Nobody listens until the next reset
    Idle,
    RomCommand,
    MatchRom(u8),
    ReadRom(u8),
    Search(u8, SearchStep),
    Function,
    ReadScratchpad(u8),
}

pub struct SimBus {
    devices: Vec<SimDevice>,
    phase: Phase,
    completion: Completion,
    armed: bool,
    captured: Vec<Symbol>,
    shift: u8,
    shift_len: u8,
    written: Vec<u8>,
    conversions: usize,
    resets: usize,
    deaf: bool,
    drop_last_read_symbol: bool,
}

impl SimBus {
    pub fn new(devices: &[SimDevice]) -> Self {
        SimBus {
            devices: devices.to_vec(),
            phase: Phase::Idle,
            completion: Completion::new(),
            armed: false,
            captured: Vec::new(),
            shift: 0,
            shift_len: 0,
            written: Vec::new(),
            conversions: 0,
            resets: 0,
            deaf: false,
            drop_last_read_symbol: false,
        }
    }

    /// Receiver never reports a finished capture
    pub fn set_deaf(&mut self, deaf: bool) {
        self.deaf = deaf;
    }

    /// Receiver loses the last symbol of every data capture
    pub fn drop_last_read_symbol(&mut self, drop: bool) {
        self.drop_last_read_symbol = drop;
    }

    /// Bytes the slaves received since power-up
    pub fn written(&self) -> &[u8] {
        &self.written
    }

    pub fn conversions(&self) -> usize {
        self.conversions
    }

    pub fn resets(&self) -> usize {
        self.resets
    }

    fn on_reset(&mut self) {
        self.resets += 1;
        self.shift = 0;
        self.shift_len = 0;
        for device in self.devices.iter_mut() {
            device.active = true;
        }
        if self.devices.is_empty() {
            self.phase = Phase::Idle;
            self.capture(Symbol::new(RESET_PULSE_US, RESET_WAIT_US));
        } else {
            self.phase = Phase::RomCommand;
            self.capture(Symbol::new(RESET_PULSE_US, 30));
            self.capture(Symbol::new(120, RESET_WAIT_US - 150));
        }
    }

    /// Runs one slot and returns the line level at the sample point.
    fn on_slot(&mut self, host_bit: bool) -> bool {
        let line = host_bit && self.slave_output();
        self.advance(line);
        line
    }

    /// Wired-AND of every active slave that is currently sending
    fn slave_output(&self) -> bool {
        let phase = self.phase;
        self.devices
            .iter()
            .filter(|d| d.active)
            .all(|d| match phase {
                Phase::ReadRom(bit) => d.address.bit(bit),
                Phase::Search(bit, SearchStep::Id) => d.address.bit(bit),
                Phase::Search(bit, SearchStep::Complement) => !d.address.bit(bit),
                Phase::ReadScratchpad(bit) => d.scratchpad_bit(bit),
                _ => true,
            })
    }

    fn advance(&mut self, line: bool) {
        self.phase = match self.phase {
            Phase::Idle => Phase::Idle,
            Phase::RomCommand => match self.shift_in(line) {
                None => Phase::RomCommand,
                Some(byte) if byte == Command::MatchRom as u8 => Phase::MatchRom(0),
                Some(byte) if byte == Command::SkipRom as u8 => Phase::Function,
                Some(byte) if byte == Command::ReadRom as u8 => Phase::ReadRom(0),
                Some(byte) if byte == Command::SearchRom as u8 => Phase::Search(0, SearchStep::Id),
                // unsupported, the slaves go quiet
                Some(_) => Phase::Idle,
            },
            Phase::MatchRom(bit) => {
                self.shift_in(line);
                self.deselect_unless(bit, line);
                self.next_rom_bit(bit, Phase::MatchRom)
            }
            Phase::ReadRom(bit) => self.next_rom_bit(bit, Phase::ReadRom),
            Phase::Search(bit, SearchStep::Id) => Phase::Search(bit, SearchStep::Complement),
            Phase::Search(bit, SearchStep::Complement) => Phase::Search(bit, SearchStep::Direction),
            Phase::Search(bit, SearchStep::Direction) => {
                self.deselect_unless(bit, line);
                self.next_rom_bit(bit, |next| Phase::Search(next, SearchStep::Id))
            }
            Phase::Function => match self.shift_in(line) {
                None => Phase::Function,
                Some(byte) if byte == FunctionCommand::Convert as u8 => {
                    self.conversions += 1;
                    Phase::Idle
                }
                Some(byte) if byte == FunctionCommand::ReadScratchpad as u8 => {
                    Phase::ReadScratchpad(0)
                }
                Some(_) => Phase::Idle,
            },
            Phase::ReadScratchpad(bit) if bit + 1 < (Scratchpad::BYTES * 8) as u8 => {
                Phase::ReadScratchpad(bit + 1)
            }
            Phase::ReadScratchpad(_) => Phase::Idle,
        };
    }

    fn next_rom_bit(&self, bit: u8, next: impl Fn(u8) -> Phase) -> Phase {
        if bit + 1 < Address::BITS {
            next(bit + 1)
        } else if self.devices.iter().any(|d| d.active) {
            Phase::Function
        } else {
            Phase::Idle
        }
    }

    fn deselect_unless(&mut self, bit: u8, value: bool) {
        for device in self.devices.iter_mut() {
            if device.address.bit(bit) != value {
                device.active = false;
            }
        }
    }

    fn shift_in(&mut self, bit: bool) -> Option<u8> {
        if bit {
            self.shift |= 0x01 << self.shift_len;
        }
        self.shift_len += 1;
        if self.shift_len < 8 {
            return None;
        }
        let byte = self.shift;
        self.shift = 0;
        self.shift_len = 0;
        self.written.push(byte);
        Some(byte)
    }

    fn capture(&mut self, symbol: Symbol) {
        if self.armed {
            self.captured.push(symbol);
        }
    }
}

impl Channels for SimBus {
    type Error = Infallible;

    fn start_receive(&mut self) -> Result<(), Self::Error> {
        self.armed = true;
        self.captured.clear();
        Ok(())
    }

    fn transmit(&mut self, symbols: &[Symbol]) -> Result<(), Self::Error> {
        let mut reset = false;
        for symbol in symbols {
            if symbol.low_us >= RESET_PULSE_US {
                reset = true;
                self.on_reset();
                continue;
            }
            let host_bit = symbol.low_us <= SLOT_SAMPLE_US;
            let line = self.on_slot(host_bit);
            if host_bit && !line {
                self.capture(Symbol::new(SLOT_START_US + SLOT_BIT_US, SLOT_RECOVERY_US));
            } else {
                self.capture(*symbol);
            }
        }

        if self.armed {
            self.armed = false;
            if self.drop_last_read_symbol && !reset {
                self.captured.pop();
            }
            if !self.deaf {
                self.completion.notify(self.captured.len());
            }
        }
        Ok(())
    }

    fn read_captured(&mut self, buffer: &mut [Symbol]) -> usize {
        let count = buffer.len().min(self.captured.len());
        buffer[..count].copy_from_slice(&self.captured[..count]);
        count
    }

    fn completion(&self) -> &Completion {
        &self.completion
    }
}

/// Receiver whose done notification arrives from another thread a little
/// after the transmission ends, the way an interrupt handler would post it.
pub struct LateNotify {
    sim: SimBus,
    completion: Arc<Completion>,
    lag: Duration,
}

impl LateNotify {
    pub fn new(devices: &[SimDevice], lag: Duration) -> Self {
        LateNotify {
            sim: SimBus::new(devices),
            completion: Arc::new(Completion::new()),
            lag,
        }
    }
}

impl Channels for LateNotify {
    type Error = Infallible;

    fn start_receive(&mut self) -> Result<(), Self::Error> {
        self.sim.start_receive()
    }

    fn transmit(&mut self, symbols: &[Symbol]) -> Result<(), Self::Error> {
        self.sim.transmit(symbols)?;
        if let Some(count) = self.sim.completion().wait(&mut NoopDelay::new(), 0) {
            let completion = self.completion.clone();
            let lag = self.lag;
            std::thread::spawn(move || {
                std::thread::sleep(lag);
                completion.notify(count);
            });
        }
        Ok(())
    }

    fn read_captured(&mut self, buffer: &mut [Symbol]) -> usize {
        self.sim.read_captured(buffer)
    }

    fn completion(&self) -> &Completion {
        &self.completion
    }
}
