use bitfield_struct::bitfield;

use crate::{consts::ROM_ID_LEN, utils::OneWireCrc};

/// 64-bit 1-Wire ROM-ID.
///
/// The ID travels on the wire least significant bit first, so the integer
/// value is the little-endian interpretation of the eight transmitted bytes.
///
/// | Bit | Description |
/// |-----|-------------|
/// | 0-7 | Family code |
/// | 8-55 | Part-unique serial number (six bytes) |
/// | 56-63 | CRC-8 (`0b1_0001_1001` poly) over bytes 0..7 |
#[bitfield(u64)]
#[derive(PartialEq, Eq, Hash)]
pub struct RomId {
    /// Family code, the first byte on the wire.
    pub family: u8,
    /// Six part-unique bytes.
    #[bits(48)]
    pub serial: u64,
    /// CRC-8 of the family code and the serial number.
    pub crc: u8,
}

impl RomId {
    /// Build a ROM-ID from a family code and six part-unique bytes,
    /// computing the trailing CRC.
    pub fn from_parts(family: u8, part_id: [u8; 6]) -> Self {
        let mut bytes = [0u8; ROM_ID_LEN];
        bytes[0] = family;
        bytes[1..7].copy_from_slice(&part_id);
        bytes[7] = OneWireCrc::compute(&bytes[..7]);
        Self::from_le_bytes(bytes)
    }

    /// Interpret eight bytes in transmission order.
    pub fn from_le_bytes(bytes: [u8; ROM_ID_LEN]) -> Self {
        Self::from_bits(u64::from_le_bytes(bytes))
    }

    /// The eight bytes in transmission order.
    pub fn to_le_bytes(self) -> [u8; ROM_ID_LEN] {
        self.into_bits().to_le_bytes()
    }

    /// The six part-unique bytes.
    pub fn part_id(self) -> [u8; 6] {
        let bytes = self.to_le_bytes();
        let mut part = [0u8; 6];
        part.copy_from_slice(&bytes[1..7]);
        part
    }

    /// Whether the CRC byte matches the first seven bytes.
    pub fn is_valid(self) -> bool {
        OneWireCrc::validate(&self.to_le_bytes())
    }

    /// Bit `index` (0..64) in transmission order.
    pub fn bit(self, index: u8) -> bool {
        self.into_bits() >> index & 0x1 == 0x1
    }
}

impl core::fmt::Display for RomId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (i, b) in self.to_le_bytes().iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_wire_order() {
        let rom = RomId::from_parts(0x42, [0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        let bytes = rom.to_le_bytes();
        assert_eq!(bytes[0], 0x42);
        assert_eq!(&bytes[1..7], &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        assert_eq!(rom.family(), 0x42);
        assert_eq!(rom.serial(), 0x6655_4433_2211);
        assert_eq!(rom.crc(), OneWireCrc::compute(&bytes[..7]));
        assert_eq!(rom.part_id(), [0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        assert!(rom.is_valid());
    }

    #[test]
    fn bits_are_lsb_first() {
        let rom = RomId::from_le_bytes([0x01, 0x80, 0, 0, 0, 0, 0, 0]);
        assert!(rom.bit(0));
        assert!(!rom.bit(1));
        assert!(rom.bit(15));
        assert!(!rom.bit(63));
    }

    #[test]
    fn corrupted_crc_is_invalid() {
        let rom = RomId::from_parts(0x28, [1, 0, 0, 0, 0, 0]);
        assert!(!rom.with_crc(rom.crc() ^ 0x01).is_valid());
    }
}
