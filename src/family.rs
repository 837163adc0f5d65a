use core::fmt::{Display, Formatter, Result as FmtResult};

/// DS18 family, keyed by the first ROM byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Family {
    Ds18s20,
    Ds1822,
    Ds18b20,
    Ds1825,
    Ds28ea00,
    Unknown(u8),
}

impl Family {
    pub const fn from_code(code: u8) -> Self {
        match code {
            0x10 => Family::Ds18s20,
            0x22 => Family::Ds1822,
            0x28 => Family::Ds18b20,
            0x3B => Family::Ds1825,
            0x42 => Family::Ds28ea00,
            other => Family::Unknown(other),
        }
    }

    pub const fn code(&self) -> u8 {
        match self {
            Family::Ds18s20 => 0x10,
            Family::Ds1822 => 0x22,
            Family::Ds18b20 => 0x28,
            Family::Ds1825 => 0x3B,
            Family::Ds28ea00 => 0x42,
            Family::Unknown(code) => *code,
        }
    }

    pub const fn model(&self) -> &'static str {
        match self {
            Family::Ds18s20 => "DS18S20",
            Family::Ds1822 => "DS1822",
            Family::Ds18b20 => "DS18B20",
            Family::Ds1825 => "DS1825",
            Family::Ds28ea00 => "DS28EA00",
            Family::Unknown(_) => "Unknown",
        }
    }

    /// The DS18S20 reports a fixed 9-bit value with a count-remain byte
    /// instead of a configurable resolution.
    pub const fn has_fixed_resolution(&self) -> bool {
        matches!(self, Family::Ds18s20)
    }
}

impl From<u8> for Family {
    fn from(code: u8) -> Self {
        Self::from_code(code)
    }
}

impl Display for Family {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.write_str(self.model())
    }
}
