use crate::{compute_crc8, Family};
use core::{
    fmt::{Display, Formatter, Result as FmtResult},
    ops::{Deref, DerefMut},
    str::FromStr,
};

/// 64-bit ROM code in wire order: family code, 48-bit serial, CRC-8.
#[derive(Debug, Clone, Copy, PartialOrd, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Address {
    raw: [u8; Self::BYTES as usize],
}

impl Default for Address {
    fn default() -> Self {
        Self::UNRESOLVED
    }
}

impl From<[u8; Self::BYTES as usize]> for Address {
    fn from(raw: [u8; Self::BYTES as usize]) -> Self {
        Address { raw }
    }
}

impl From<Address> for [u8; Address::BYTES as usize] {
    fn from(addr: Address) -> [u8; Address::BYTES as usize] {
        addr.raw
    }
}

/// The integer form reads family first: `0x28AABBCC00000001` is a DS18B20.
impl From<u64> for Address {
    fn from(value: u64) -> Self {
        Address {
            raw: value.to_be_bytes(),
        }
    }
}

impl From<Address> for u64 {
    fn from(addr: Address) -> u64 {
        u64::from_be_bytes(addr.raw)
    }
}

impl Deref for Address {
    type Target = [u8; Self::BYTES as usize];

    fn deref(&self) -> &Self::Target {
        &self.raw
    }
}

impl DerefMut for Address {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.raw
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        self.deref() as _
    }
}

impl AsMut<[u8]> for Address {
    fn as_mut(&mut self) -> &mut [u8] {
        self.deref_mut() as _
    }
}

impl Address {
    /// The length of device address in bytes
    pub const BYTES: u8 = 8;

    /// The length of device address in bits
    pub const BITS: u8 = Self::BYTES * 8;

    /// Sentinel for "no device bound"
    pub const UNRESOLVED: Address = Address {
        raw: [0; Self::BYTES as usize],
    };

    pub fn family_code(&self) -> u8 {
        self[0]
    }

    pub fn family(&self) -> Family {
        Family::from_code(self.family_code())
    }

    pub fn model(&self) -> &'static str {
        self.family().model()
    }

    pub fn is_unresolved(&self) -> bool {
        self.raw == Self::UNRESOLVED.raw
    }

    /// Does the last byte match the CRC-8 of the first seven?
    pub fn is_crc_valid(&self) -> bool {
        compute_crc8(&self.raw[..7]) == self.raw[7]
    }

    pub fn to_u64(&self) -> u64 {
        u64::from(*self)
    }

    /// Returns the address with its last byte replaced by the CRC-8 of the
    /// first seven.
    pub fn with_crc(mut self) -> Self {
        self.raw[7] = compute_crc8(&self.raw[..7]);
        self
    }

    pub(crate) fn bit(&self, bit: u8) -> bool {
        self.raw[(bit / 8) as usize] & (0x01 << (bit % 8)) != 0x00
    }

    pub(crate) fn write_bit(&mut self, bit: u8, value: bool) {
        let index = (bit / 8) as usize;
        let mask = 0x01 << (bit % 8);
        if value {
            self.raw[index] |= mask;
        } else {
            self.raw[index] &= !mask;
        }
    }
}

/// Error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressError {
    NotEnough,
    Invalid,
}

fn hex_to_u8(c: char) -> Option<u8> {
    c.to_digit(16).map(|d| d as u8)
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut addr = Address::default();
        let s = s.strip_prefix("0x").unwrap_or(s);
        let mut chars = s.chars().filter(|c| !c.is_whitespace() && *c != ':' && *c != '_');

        for i in 0..Self::BYTES as usize {
            match (chars.next(), chars.next()) {
                (Some(h), Some(l)) => match (hex_to_u8(h), hex_to_u8(l)) {
                    (Some(h), Some(l)) => {
                        addr[i] = (h << 4) | l;
                    }
                    _ => return Err(AddressError::Invalid),
                },
                _ => return Err(AddressError::NotEnough),
            }
        }

        if chars.next().is_some() {
            return Err(AddressError::Invalid);
        }

        Ok(addr)
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self[0], self[1], self[2], self[3], self[4], self[5], self[6], self[7],
        )
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Address {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=u64:#018x}", self.to_u64())
    }
}
