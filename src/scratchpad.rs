//! DS18 scratchpad layout and temperature conversion.

use byteorder::{ByteOrder, LittleEndian};

use crate::{compute_crc8, BusError, Family};

/// Lowest temperature any DS18 reports
pub const MIN_CELSIUS: f32 = -55.0;
/// Highest temperature any DS18 reports
pub const MAX_CELSIUS: f32 = 125.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum MeasureResolution {
    Bits9 = 0b0001_1111,
    Bits10 = 0b0011_1111,
    Bits11 = 0b0101_1111,
    Bits12 = 0b0111_1111,
}

impl MeasureResolution {
    /// Decodes the R1/R0 bits of the configuration register
    pub fn from_config(config: u8) -> Self {
        match (config >> 5) & 0b11 {
            0b00 => MeasureResolution::Bits9,
            0b01 => MeasureResolution::Bits10,
            0b10 => MeasureResolution::Bits11,
            _ => MeasureResolution::Bits12,
        }
    }

    /// Maximum conversion time
    pub fn time_ms(&self) -> u16 {
        match self {
            MeasureResolution::Bits9 => 94,
            MeasureResolution::Bits10 => 188,
            MeasureResolution::Bits11 => 375,
            MeasureResolution::Bits12 => 750,
        }
    }

    /// Low bits of the raw value left undefined at this resolution
    fn undefined_bits(&self) -> i16 {
        match self {
            MeasureResolution::Bits9 => 0b111,
            MeasureResolution::Bits10 => 0b11,
            MeasureResolution::Bits11 => 0b1,
            MeasureResolution::Bits12 => 0,
        }
    }
}

/// The nine bytes a DS18 returns for Read Scratchpad
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scratchpad {
    raw: [u8; Self::BYTES],
}

impl From<[u8; Scratchpad::BYTES]> for Scratchpad {
    fn from(raw: [u8; Scratchpad::BYTES]) -> Self {
        Scratchpad { raw }
    }
}

impl AsRef<[u8]> for Scratchpad {
    fn as_ref(&self) -> &[u8] {
        &self.raw
    }
}

impl Scratchpad {
    pub const BYTES: usize = 9;

    pub fn raw_temperature(&self) -> i16 {
        LittleEndian::read_i16(&self.raw[0..2])
    }

    pub fn config(&self) -> u8 {
        self.raw[4]
    }

    pub fn resolution(&self) -> MeasureResolution {
        MeasureResolution::from_config(self.config())
    }

    pub fn crc(&self) -> u8 {
        self.raw[8]
    }

    pub fn is_crc_valid(&self) -> bool {
        compute_crc8(&self.raw[..8]) == self.crc()
    }

    /// A line held low reads all zeros (with a matching CRC), a line nobody
    /// drives reads all ones.
    pub fn is_blank(&self) -> bool {
        self.raw.iter().all(|b| *b == 0x00) || self.raw.iter().all(|b| *b == 0xFF)
    }

    /// Converts the stored conversion result to degrees Celsius, checking
    /// plausibility before the CRC.
    pub fn temperature(&self, family: Family) -> Result<f32, BusError> {
        if self.is_blank() {
            return Err(BusError::MalformedData);
        }

        let celsius = if family.has_fixed_resolution() {
            self.extended_temperature()?
        } else {
            let raw = self.raw_temperature() & !self.resolution().undefined_bits();
            raw as f32 / 16_f32
        };

        if !(MIN_CELSIUS..=MAX_CELSIUS).contains(&celsius) {
            return Err(BusError::MalformedData);
        }
        if !self.is_crc_valid() {
            return Err(BusError::Crc);
        }
        Ok(celsius)
    }

    /// DS18S20: half-degree reading refined with COUNT_REMAIN / COUNT_PER_C
    fn extended_temperature(&self) -> Result<f32, BusError> {
        let count_remain = self.raw[6] as f32;
        let count_per_c = self.raw[7] as f32;
        if self.raw[7] == 0 {
            return Err(BusError::MalformedData);
        }
        let half_degrees = self.raw_temperature() & !1;
        Ok(half_degrees as f32 / 2_f32 - 0.25 + (count_per_c - count_remain) / count_per_c)
    }
}

#[cfg(test)]
pub(crate) fn ds18b20_scratchpad(raw: i16, config: u8) -> Scratchpad {
    let [lsb, msb] = raw.to_le_bytes();
    let mut bytes = [lsb, msb, 0x4B, 0x46, config, 0xFF, 0x0C, 0x10, 0x00];
    bytes[8] = compute_crc8(&bytes[..8]);
    Scratchpad::from(bytes)
}

#[cfg(test)]
mod tests {
    use super::{ds18b20_scratchpad, MeasureResolution, Scratchpad};
    use crate::{compute_crc8, BusError, Family};

    fn celsius(raw: u16) -> Result<f32, BusError> {
        ds18b20_scratchpad(raw as i16, MeasureResolution::Bits12 as u8).temperature(Family::Ds18b20)
    }

    #[test]
    fn test_temp_conv() {
        assert_eq!(celsius(0x07d0), Ok(125.0));
        assert_eq!(celsius(0x0550), Ok(85.0));
        assert_eq!(celsius(0x0191), Ok(25.0625));
        assert_eq!(celsius(0x00A2), Ok(10.125));
        assert_eq!(celsius(0x0008), Ok(0.5));
        assert_eq!(celsius(0x0000), Ok(0.0));
        assert_eq!(celsius(0xfff8), Ok(-0.5));
        assert_eq!(celsius(0xFF5E), Ok(-10.125));
        assert_eq!(celsius(0xFE6F), Ok(-25.0625));
        assert_eq!(celsius(0xFC90), Ok(-55.0));
    }

    #[test]
    fn out_of_range_is_bad_data() {
        assert_eq!(celsius(0x07E0), Err(BusError::MalformedData)); // 126
        assert_eq!(celsius(0xFC80), Err(BusError::MalformedData)); // -56
    }

    #[test]
    fn lower_resolution_masks_undefined_bits() {
        let pad = ds18b20_scratchpad(0x019F, MeasureResolution::Bits9 as u8);
        assert_eq!(pad.resolution(), MeasureResolution::Bits9);
        assert_eq!(pad.temperature(Family::Ds18b20), Ok(25.5));

        let pad = ds18b20_scratchpad(0x0197, MeasureResolution::Bits11 as u8);
        assert_eq!(pad.temperature(Family::Ds18b20), Ok(25.375));
        assert_eq!(pad.resolution().time_ms(), 375);
    }

    #[test]
    fn ds18s20_extended_resolution() {
        // 25.0 °C reading refined by COUNT_REMAIN = 12: 25 - 0.25 + 4/16
        let mut bytes = [0x32, 0x00, 0x4B, 0x46, 0xFF, 0xFF, 0x0C, 0x10, 0x00];
        bytes[8] = compute_crc8(&bytes[..8]);
        let pad = Scratchpad::from(bytes);
        assert_eq!(pad.temperature(Family::Ds18s20), Ok(25.0));

        bytes[6] = 0x02;
        bytes[8] = compute_crc8(&bytes[..8]);
        let pad = Scratchpad::from(bytes);
        assert_eq!(pad.temperature(Family::Ds18s20), Ok(25.625));
    }

    #[test]
    fn crc_mismatch() {
        let mut bytes: [u8; 9] = ds18b20_scratchpad(0x0191, 0x7F).as_ref().try_into().unwrap();
        bytes[8] ^= 0x5A;
        assert_eq!(
            Scratchpad::from(bytes).temperature(Family::Ds18b20),
            Err(BusError::Crc)
        );
    }

    #[test]
    fn blank_scratchpads_are_bad_data() {
        // all zeros carries a valid CRC, it must still not read as 0 °C
        let zeros = Scratchpad::from([0x00; 9]);
        assert!(zeros.is_crc_valid());
        assert_eq!(zeros.temperature(Family::Ds18b20), Err(BusError::MalformedData));

        let ones = Scratchpad::from([0xFF; 9]);
        assert_eq!(ones.temperature(Family::Ds18b20), Err(BusError::MalformedData));
    }
}
