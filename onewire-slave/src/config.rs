use embedded_hal::{delay::DelayNs, digital::OutputPin};
use embedded_onewire::RomId;

use crate::{OneWireSlave, PulseSource, SlaveError, SlaveResult};

/// Family code used when none is configured.
pub const DEFAULT_FAMILY_CODE: u8 = 0x4c;
/// Part ID used when none is configured or persisted.
pub const DEFAULT_PART_ID: [u8; 6] = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66];
/// Default location of the persisted part ID in stable storage.
pub const PART_ID_STORAGE_OFFSET: usize = 0;

/// Stable storage holding a per-device part ID, e.g. EEPROM.
pub trait PartIdStorage {
    /// Storage error.
    type Error;
    /// Fill `buf` from `offset`.
    fn read_part_id(&mut self, offset: usize, buf: &mut [u8; 6]) -> Result<(), Self::Error>;
}

/// The requested part ID lies outside the storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageOutOfRange;

impl PartIdStorage for &[u8] {
    type Error = StorageOutOfRange;

    fn read_part_id(&mut self, offset: usize, buf: &mut [u8; 6]) -> Result<(), Self::Error> {
        let end = offset.checked_add(buf.len()).ok_or(StorageOutOfRange)?;
        let src = self.get(offset..end).ok_or(StorageOutOfRange)?;
        buf.copy_from_slice(src);
        Ok(())
    }
}

/// Builds the ROM-ID a slave answers with.
///
/// ```ignore
/// let slave = SlaveConfig::new()
///     .with_family(0x4c)
///     .with_persisted_part_id(PART_ID_STORAGE_OFFSET)
///     .build_with_storage(&mut eeprom, pin, &PULSES, delay)?;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaveConfig {
    family: u8,
    part_id: [u8; 6],
    persisted_offset: Option<usize>,
}

impl Default for SlaveConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SlaveConfig {
    /// Default family code and part ID, nothing persisted.
    pub const fn new() -> Self {
        Self {
            family: DEFAULT_FAMILY_CODE,
            part_id: DEFAULT_PART_ID,
            persisted_offset: None,
        }
    }

    /// Set the family code.
    pub const fn with_family(mut self, family: u8) -> Self {
        self.family = family;
        self
    }

    /// Set the part ID. Ignored when a persisted part ID is configured.
    pub const fn with_part_id(mut self, part_id: [u8; 6]) -> Self {
        self.part_id = part_id;
        self
    }

    /// Read the part ID from storage at `offset` when building.
    pub const fn with_persisted_part_id(mut self, offset: usize) -> Self {
        self.persisted_offset = Some(offset);
        self
    }

    /// ROM-ID from the configured family and part ID, ignoring storage.
    pub fn rom_id(&self) -> RomId {
        RomId::from_parts(self.family, self.part_id)
    }

    /// ROM-ID with the part ID taken from `storage` if persistence is configured.
    pub fn load_rom_id<S: PartIdStorage>(&self, storage: &mut S) -> Result<RomId, S::Error> {
        match self.persisted_offset {
            Some(offset) => {
                let mut part_id = [0u8; 6];
                storage.read_part_id(offset, &mut part_id)?;
                Ok(RomId::from_parts(self.family, part_id))
            }
            None => Ok(self.rom_id()),
        }
    }

    /// Create the slave. Fails with [`SlaveError::Storage`] if a persisted
    /// part ID is configured, since there is no storage to read it from.
    pub fn build<P, S, D>(
        self,
        pin: P,
        pulses: S,
        delay: D,
    ) -> SlaveResult<OneWireSlave<P, S, D>, P::Error>
    where
        P: OutputPin,
        S: PulseSource,
        D: DelayNs,
    {
        if self.persisted_offset.is_some() {
            return Err(SlaveError::Storage);
        }
        Ok(OneWireSlave::new(pin, pulses, delay, self.rom_id())?)
    }

    /// Create the slave, reading a persisted part ID from `storage`.
    pub fn build_with_storage<M, P, S, D>(
        self,
        storage: &mut M,
        pin: P,
        pulses: S,
        delay: D,
    ) -> SlaveResult<OneWireSlave<P, S, D>, P::Error>
    where
        M: PartIdStorage,
        P: OutputPin,
        S: PulseSource,
        D: DelayNs,
    {
        let rom = self.load_rom_id(storage).map_err(|_| SlaveError::Storage)?;
        Ok(OneWireSlave::new(pin, pulses, delay, rom)?)
    }
}
