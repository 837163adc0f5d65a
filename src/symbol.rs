//! Wire symbols and the two encoders that produce them.
//!
//! Every 1-Wire slot starts with the host pulling the line low and ends with
//! the line released. A [`Symbol`] describes one such slot as a low phase
//! followed by a high phase. The transmitter emits symbols, the receiver
//! captures what the line actually did, and a slave stretching the low phase
//! is how data travels back to the host.

/// Reset pulse, host holds the line low
pub const RESET_PULSE_US: u16 = 500;
/// Line released after the reset pulse, presence window included
pub const RESET_WAIT_US: u16 = 200;
/// A presence pulse starts no earlier than this after release
pub const PRESENCE_WAIT_MIN_US: u16 = 15;
/// A presence pulse lasts at least this long
pub const PRESENCE_MIN_US: u16 = 60;
/// Host low time opening every read or write slot
pub const SLOT_START_US: u16 = 2;
/// Data part of a slot
pub const SLOT_BIT_US: u16 = 60;
/// Recovery between slots
pub const SLOT_RECOVERY_US: u16 = 5;
/// Read slots are sampled this long after the slot opened
pub const SLOT_SAMPLE_US: u16 = 15;

/// Whole read/write slot
pub const SLOT_US: u16 = SLOT_START_US + SLOT_BIT_US + SLOT_RECOVERY_US;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Symbol {
    pub low_us: u16,
    pub high_us: u16,
}

impl Symbol {
    pub const fn new(low_us: u16, high_us: u16) -> Self {
        Symbol { low_us, high_us }
    }

    pub const fn duration_us(&self) -> u32 {
        self.low_us as u32 + self.high_us as u32
    }
}

/// Produces the reset pulse
#[derive(Debug, Clone, Copy, Default)]
pub struct ResetEncoder;

impl ResetEncoder {
    pub const fn encode(&self) -> Symbol {
        Symbol::new(RESET_PULSE_US, RESET_WAIT_US)
    }

    /// Looks for a presence pulse in a capture that started with the reset.
    pub fn decode(&self, captured: &[Symbol]) -> bool {
        match captured {
            [reset, presence, ..] => {
                reset.high_us > PRESENCE_WAIT_MIN_US && presence.low_us > PRESENCE_MIN_US
            }
            _ => false,
        }
    }
}

/// Produces read and write slots, least significant bit first
#[derive(Debug, Clone, Copy, Default)]
pub struct BitEncoder;

impl BitEncoder {
    /// Symbol writing `bit`. A '1' slot doubles as a read slot.
    pub const fn symbol(&self, bit: bool) -> Symbol {
        if bit {
            Symbol::new(SLOT_START_US, SLOT_BIT_US + SLOT_RECOVERY_US)
        } else {
            Symbol::new(SLOT_START_US + SLOT_BIT_US, SLOT_RECOVERY_US)
        }
    }

    /// Encodes the low `len` bits of `data` into `out`, returning the used part.
    pub fn encode<'a>(&self, data: u8, len: u8, out: &'a mut [Symbol]) -> &'a [Symbol] {
        let len = (len as usize).min(8).min(out.len());
        for (i, symbol) in out[..len].iter_mut().enumerate() {
            *symbol = self.symbol(data & (0x01 << i) != 0);
        }
        &out[..len]
    }

    /// Fills `out` with `len` read slots.
    pub fn encode_read<'a>(&self, len: u8, out: &'a mut [Symbol]) -> &'a [Symbol] {
        self.encode(0xFF, len, out)
    }

    /// A slave holding the line past the sample point reads as '0'.
    pub const fn decode_bit(&self, captured: &Symbol) -> bool {
        captured.low_us <= SLOT_SAMPLE_US
    }

    pub fn decode(&self, captured: &[Symbol]) -> u8 {
        captured
            .iter()
            .take(8)
            .enumerate()
            .fold(0u8, |byte, (i, symbol)| {
                if self.decode_bit(symbol) {
                    byte | (0x01 << i)
                } else {
                    byte
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_slots_follow_bit_values() {
        let encoder = BitEncoder;
        let mut out = [Symbol::default(); 8];
        let symbols = encoder.encode(0b0000_0101, 3, &mut out);
        assert_eq!(symbols.len(), 3);
        assert_eq!(symbols[0], Symbol::new(2, 65));
        assert_eq!(symbols[1], Symbol::new(62, 5));
        assert_eq!(symbols[2], Symbol::new(2, 65));
        assert!(symbols.iter().all(|s| s.duration_us() == SLOT_US as u32));
    }

    #[test]
    fn decode_is_lsb_first() {
        let encoder = BitEncoder;
        let zero = Symbol::new(SLOT_START_US + SLOT_BIT_US, SLOT_RECOVERY_US);
        let one = Symbol::new(SLOT_START_US + 3, SLOT_BIT_US);
        let captured = [one, zero, zero, zero, one, one, zero, one];
        assert_eq!(encoder.decode(&captured), 0b1011_0001);
    }

    #[test]
    fn presence_needs_wait_and_pulse() {
        let encoder = ResetEncoder;
        let present = [Symbol::new(500, 30), Symbol::new(110, 60)];
        assert!(encoder.decode(&present));

        let too_short = [Symbol::new(500, 30), Symbol::new(20, 150)];
        assert!(!encoder.decode(&too_short));

        let nothing = [Symbol::new(500, 200)];
        assert!(!encoder.decode(&nothing));
    }
}
