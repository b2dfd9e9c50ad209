use crate::{
    OneWire, OneWireError, OneWireResult, RomId,
    consts::{ONEWIRE_CONDITIONAL_SEARCH_CMD, ONEWIRE_SEARCH_CMD, ROM_ID_BITS, ROM_ID_LEN},
    utils::OneWireCrc,
};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Type of search performed using [`SearchCursor`].
pub enum OneWireSearchKind {
    /// Normal search
    Normal = ONEWIRE_SEARCH_CMD,
    /// Search only for devices with alarm
    Alarmed = ONEWIRE_CONDITIONAL_SEARCH_CMD,
}

/// State of a [1-Wire search](https://www.analog.com/en/resources/app-notes/1wire-search-algorithm.html)
/// in progress.
///
/// The cursor is a plain value owned by the caller; it borrows the bus only for
/// the duration of each call, so one bus can serve several searches. Bit
/// indices are 1-based as in the application note; a discrepancy of 0 means
/// none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchCursor {
    cmd: u8,
    last_discrepancy: u8,
    last_family_discrepancy: u8,
    last_device: bool,
    rom: [u8; ROM_ID_LEN],
}

impl SearchCursor {
    /// Creates a cursor positioned before the first device.
    pub fn new(kind: OneWireSearchKind) -> Self {
        Self {
            cmd: kind as _,
            last_discrepancy: 0,
            last_family_discrepancy: 0,
            last_device: false,
            rom: [0; ROM_ID_LEN],
        }
    }

    /// Creates a cursor and runs the first search pass.
    ///
    /// Returns the cursor together with the first device found, if any.
    pub fn first<T: OneWire>(
        bus: &mut T,
        kind: OneWireSearchKind,
    ) -> OneWireResult<(Self, Option<RomId>), T::BusError> {
        let mut cursor = Self::new(kind);
        let rom = cursor.next(bus)?;
        Ok((cursor, rom))
    }

    /// Positions the cursor so the next pass finds the first device of `family`,
    /// if one exists. The pass may return a device of a higher family when
    /// none is present; callers check [`RomId::family`].
    pub fn target_family(&mut self, family: u8) {
        self.rom = [family, 0, 0, 0, 0, 0, 0, 0];
        self.last_discrepancy = ROM_ID_BITS;
        self.last_family_discrepancy = 0;
        self.last_device = false;
    }

    /// Positions the cursor so the next pass skips every remaining device that
    /// shares the family code of the device found last.
    pub fn skip_family(&mut self) {
        self.last_discrepancy = self.last_family_discrepancy;
        self.last_family_discrepancy = 0;
        if self.last_discrepancy == 0 {
            self.last_device = true;
        }
    }

    /// Whether the last pass found the last device on the bus.
    pub fn is_exhausted(&self) -> bool {
        self.last_device
    }

    /// Searches for devices on the 1-Wire bus.
    /// This method implements the [1-Wire search algorithm](https://www.analog.com/en/resources/app-notes/1wire-search-algorithm.html) to discover devices connected to the bus.
    /// The [next](SearchCursor::next) method can be called repeatedly to find all devices on the bus.
    /// At the end of the search, calling this method will return `None` to indicate that no more devices are present.
    ///
    /// A CRC failure is returned as [`OneWireError::InvalidRomCrc`]; the cursor
    /// has still advanced, the caller decides whether to restart.
    #[allow(clippy::should_implement_trait)]
    pub fn next<T: OneWire>(&mut self, bus: &mut T) -> OneWireResult<Option<RomId>, T::BusError> {
        if self.last_device {
            return Ok(None); // If the last device was found, return None
        }
        bus.reset_expect_presence()?;
        bus.write_byte(self.cmd)?;

        let mut last_zero: u8 = 0;
        let mut crc = OneWireCrc::default();
        for id_bit_num in 1..=ROM_ID_BITS {
            let idx = ((id_bit_num - 1) / 8) as usize; // Index in the ROM array
            let rom_mask: u8 = 1 << ((id_bit_num - 1) % 8); // Mask for the current bit in the ROM byte

            let id_bit = bus.read_bit()?;
            let complement_bit = bus.read_bit()?;
            if id_bit && complement_bit {
                // Nobody is participating any more
                log::debug!("1-Wire search: no slaves answered at bit {id_bit_num}");
                self.last_discrepancy = 0;
                self.last_family_discrepancy = 0;
                self.last_device = true;
                return Ok(None);
            }
            let dir = if id_bit != complement_bit {
                id_bit
            } else {
                // Both bits are 0: a branch in the tree
                let dir = if id_bit_num < self.last_discrepancy {
                    self.rom[idx] & rom_mask > 0
                } else {
                    id_bit_num == self.last_discrepancy
                };
                if !dir {
                    last_zero = id_bit_num;
                    if last_zero < 9 {
                        self.last_family_discrepancy = last_zero;
                    }
                }
                dir
            };
            if dir {
                self.rom[idx] |= rom_mask;
            } else {
                self.rom[idx] &= !rom_mask;
            }
            bus.write_bit(dir)?;
            crc.update_bit(dir);
        }

        self.last_discrepancy = last_zero;
        self.last_device = self.last_discrepancy == 0;
        if crc.value() != 0 {
            return Err(OneWireError::InvalidRomCrc);
        }
        let rom = RomId::from_le_bytes(self.rom);
        log::debug!("1-Wire search found {rom}");
        Ok(Some(rom))
    }

    /// Verifies if the device with the given ROM code is present on the 1-Wire bus.
    ///
    /// Runs a single pass that replays every branch of `rom`. The cursor state
    /// is the same afterwards as before, so an enumeration in progress can
    /// continue.
    pub fn verify<T: OneWire>(&mut self, bus: &mut T, rom: RomId) -> OneWireResult<bool, T::BusError> {
        let saved = *self;
        self.rom = rom.to_le_bytes();
        self.last_discrepancy = ROM_ID_BITS;
        self.last_device = false;
        let res = self.next(bus);
        *self = saved;
        Ok(res? == Some(rom))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OneWireStatus;
    use core::convert::Infallible;

    /// Bus model answering search slots from a fixed set of ROM-IDs.
    struct FakeBus {
        roms: [Option<RomId>; 4],
        active: [bool; 4],
        cmd: Option<u8>,
        bit: u8,
        phase: u8,
    }

    struct Presence(bool);

    impl OneWireStatus for Presence {
        fn presence(&self) -> bool {
            self.0
        }
    }

    impl FakeBus {
        fn new(roms: &[RomId]) -> Self {
            let mut slots = [None; 4];
            for (slot, rom) in slots.iter_mut().zip(roms) {
                *slot = Some(*rom);
            }
            Self {
                roms: slots,
                active: [false; 4],
                cmd: None,
                bit: 0,
                phase: 0,
            }
        }

        fn participants(&self) -> impl Iterator<Item = RomId> + '_ {
            self.roms
                .iter()
                .zip(self.active.iter())
                .filter_map(|(r, &a)| if a { *r } else { None })
        }
    }

    impl OneWire for FakeBus {
        type Status = Presence;
        type BusError = Infallible;

        fn reset(&mut self) -> OneWireResult<Presence, Infallible> {
            for (a, r) in self.active.iter_mut().zip(self.roms.iter()) {
                *a = r.is_some();
            }
            self.cmd = None;
            self.bit = 0;
            self.phase = 0;
            Ok(Presence(self.roms.iter().any(Option::is_some)))
        }

        fn write_bit(&mut self, bit: bool) -> OneWireResult<(), Infallible> {
            if self.phase != 2 {
                return Ok(());
            }
            let index = self.bit;
            for (a, r) in self.active.iter_mut().zip(self.roms.iter()) {
                if let Some(r) = r {
                    if r.bit(index) != bit {
                        *a = false;
                    }
                }
            }
            self.bit += 1;
            self.phase = 0;
            Ok(())
        }

        fn read_bit(&mut self) -> OneWireResult<bool, Infallible> {
            let index = self.bit;
            let v = match self.phase {
                0 => self.participants().all(|r| r.bit(index)),
                _ => self.participants().all(|r| !r.bit(index)),
            };
            self.phase += 1;
            Ok(v)
        }

        fn sample_line(&mut self) -> OneWireResult<bool, Infallible> {
            Ok(true)
        }

        fn write_byte(&mut self, byte: u8) -> OneWireResult<(), Infallible> {
            self.cmd = Some(byte);
            Ok(())
        }
    }

    fn rom(family: u8, first: u8) -> RomId {
        RomId::from_parts(family, [first, 0, 0, 0, 0, 0])
    }

    #[test]
    fn single_device() {
        let id = RomId::from_parts(0x42, [0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        let mut bus = FakeBus::new(&[id]);
        let (mut cursor, found) = SearchCursor::first(&mut bus, OneWireSearchKind::Normal).unwrap();
        assert_eq!(bus.cmd, Some(ONEWIRE_SEARCH_CMD));
        assert_eq!(found, Some(id));
        assert!(cursor.is_exhausted());
        assert_eq!(cursor.next(&mut bus).unwrap(), None);
        assert!(cursor.verify(&mut bus, id).unwrap());
    }

    #[test]
    fn zero_branch_is_taken_first() {
        let a = rom(0x28, 0x01);
        let b = rom(0x28, 0x02);
        let mut bus = FakeBus::new(&[a, b]);
        let (mut cursor, first) = SearchCursor::first(&mut bus, OneWireSearchKind::Normal).unwrap();
        // first discrepancy is bit 0 of the second byte, where b has a zero
        assert_eq!(first, Some(b));
        assert_eq!(cursor.next(&mut bus).unwrap(), Some(a));
        assert_eq!(cursor.next(&mut bus).unwrap(), None);
    }

    #[test]
    fn enumeration_is_repeatable() {
        let roms = [rom(0x28, 0x01), rom(0x28, 0x02), rom(0x10, 0x07), rom(0x42, 0xff)];
        let mut bus = FakeBus::new(&roms);
        let mut runs = [[RomId::new(); 4]; 2];
        for run in runs.iter_mut() {
            let mut cursor = SearchCursor::new(OneWireSearchKind::Normal);
            let mut n = 0;
            while let Some(found) = cursor.next(&mut bus).unwrap() {
                run[n] = found;
                n += 1;
            }
            assert_eq!(n, 4);
            assert!(cursor.is_exhausted());
        }
        assert_eq!(runs[0], runs[1]);
        for r in roms {
            assert!(runs[0].contains(&r));
        }
    }

    #[test]
    fn verify_preserves_state() {
        let a = rom(0x28, 0x01);
        let b = rom(0x28, 0x02);
        let absent = rom(0x28, 0x03);
        let mut bus = FakeBus::new(&[a, b]);
        let (mut cursor, _) = SearchCursor::first(&mut bus, OneWireSearchKind::Normal).unwrap();
        let before = cursor;
        assert!(cursor.verify(&mut bus, a).unwrap());
        assert_eq!(cursor, before);
        assert!(!cursor.verify(&mut bus, absent).unwrap());
        assert_eq!(cursor, before);
        assert_eq!(cursor.next(&mut bus).unwrap(), Some(a));
    }

    #[test]
    fn target_and_skip_family() {
        let roms = [rom(0x10, 0x01), rom(0x28, 0x01), rom(0x28, 0x02), rom(0x42, 0x01)];
        let mut bus = FakeBus::new(&roms);
        let mut cursor = SearchCursor::new(OneWireSearchKind::Normal);
        cursor.target_family(0x28);
        let found = cursor.next(&mut bus).unwrap().unwrap();
        assert_eq!(found.family(), 0x28);

        cursor.skip_family();
        let found = cursor.next(&mut bus).unwrap().unwrap();
        assert_ne!(found.family(), 0x28);
    }

    #[test]
    fn empty_bus() {
        let mut bus = FakeBus::new(&[]);
        let err = SearchCursor::first(&mut bus, OneWireSearchKind::Normal).unwrap_err();
        assert_eq!(err, OneWireError::NoDevicePresent);
    }

    #[test]
    fn alarm_search_uses_conditional_command() {
        let mut bus = FakeBus::new(&[rom(0x28, 0x01)]);
        let _ = SearchCursor::first(&mut bus, OneWireSearchKind::Alarmed).unwrap();
        assert_eq!(bus.cmd, Some(ONEWIRE_CONDITIONAL_SEARCH_CMD));
    }
}
