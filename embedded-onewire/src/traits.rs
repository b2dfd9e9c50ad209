use crate::{
    OneWireError, OneWireResult, RomId,
    consts::{ONEWIRE_MATCH_ROM_CMD, ONEWIRE_READ_ROM_CMD, ONEWIRE_SKIP_ROM_CMD, ROM_ID_LEN},
};

/// Status reported by a bus reset.
pub trait OneWireStatus {
    /// Whether at least one slave answered the reset with a presence pulse.
    fn presence(&self) -> bool;

    /// Whether the line was found stuck low.
    fn shortcircuit(&self) -> bool {
        false
    }

    /// Logic level of the line, if the master sampled it.
    fn logic_level(&self) -> Option<bool> {
        None
    }
}

/// How a transaction selects its slave(s) after the reset pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RomAddressing {
    /// `READ_ROM`: only valid when exactly one slave is on the bus. The slave
    /// answers with its ROM-ID, which the master reads and CRC checks.
    ReadRom,
    /// `MATCH_ROM` followed by the 64-bit ID of the slave to talk to.
    MatchRom(RomId),
    /// `SKIP_ROM`: every slave on the bus takes the function command.
    SkipRom,
}

/// Trait for 1-Wire communication.
/// This trait defines the basic operations required for 1-Wire communication, such as resetting the bus,
/// writing and reading bytes, and writing and reading bits.
///
/// Bytes travel least significant bit first.
pub trait OneWire {
    /// The status type returned by the reset operation.
    /// This type must implement the [OneWireStatus] trait.
    type Status: OneWireStatus;
    /// The error type returned by the operations of this trait.
    /// This type is used to indicate errors in the underlying hardware or communication.
    type BusError;

    /// Resets the 1-Wire bus and returns the status of the bus.
    ///
    /// A missing presence pulse is reported through [`OneWireStatus::presence`],
    /// not as an error, so callers that only probe the bus can tell the two apart.
    ///
    /// # Errors
    /// This method returns an error if the reset operation fails.
    fn reset(&mut self) -> OneWireResult<Self::Status, Self::BusError>;

    /// Writes a single bit to the 1-Wire bus.
    ///
    /// # Errors
    /// This method returns an error if the write operation fails.
    fn write_bit(&mut self, bit: bool) -> OneWireResult<(), Self::BusError>;

    /// Reads a single bit from the 1-Wire bus.
    /// # Returns
    /// The bit read from the bus.
    /// # Errors
    /// This method returns an error if the read operation fails.
    fn read_bit(&mut self) -> OneWireResult<bool, Self::BusError>;

    /// Samples the line without generating a time slot.
    ///
    /// Returns `true` if the line is high (released by everyone).
    fn sample_line(&mut self) -> OneWireResult<bool, Self::BusError>;

    /// Writes a byte to the 1-Wire bus.
    /// # Arguments
    /// * `byte` - The byte to write to the bus.
    ///
    /// # Errors
    /// This method returns an error if the write operation fails.
    fn write_byte(&mut self, byte: u8) -> OneWireResult<(), Self::BusError> {
        for i in 0..8 {
            self.write_bit(byte >> i & 0x1 == 0x1)?;
        }
        Ok(())
    }

    /// Reads a byte from the 1-Wire bus.
    /// # Returns
    /// Byte read from the bus.
    ///
    /// # Errors
    /// This method returns an error if the read operation fails.
    fn read_byte(&mut self) -> OneWireResult<u8, Self::BusError> {
        let mut byte = 0;
        for i in 0..8 {
            if self.read_bit()? {
                byte |= 1 << i;
            }
        }
        Ok(byte)
    }

    /// Writes every byte of `bytes` in order.
    fn write_bytes(&mut self, bytes: &[u8]) -> OneWireResult<(), Self::BusError> {
        for &b in bytes {
            self.write_byte(b)?;
        }
        Ok(())
    }

    /// Fills `buf` with bytes read from the bus.
    fn read_bytes(&mut self, buf: &mut [u8]) -> OneWireResult<(), Self::BusError> {
        for b in buf.iter_mut() {
            *b = self.read_byte()?;
        }
        Ok(())
    }

    /// Resets the bus and fails with [`OneWireError::NoDevicePresent`] or
    /// [`OneWireError::ShortCircuit`] unless a slave answered.
    fn reset_expect_presence(&mut self) -> OneWireResult<Self::Status, Self::BusError> {
        let status = self.reset()?;
        if status.shortcircuit() {
            return Err(OneWireError::ShortCircuit);
        }
        if !status.presence() {
            return Err(OneWireError::NoDevicePresent);
        }
        Ok(status)
    }

    /// Reads the ROM-ID of the only slave on the bus.
    ///
    /// A CRC mismatch is reported as [`OneWireError::InvalidRomCrc`] and never
    /// retried here; on a bus with several slaves the IDs collide and this is the
    /// expected outcome.
    fn read_rom(&mut self) -> OneWireResult<RomId, Self::BusError> {
        self.reset_expect_presence()?;
        self.write_byte(ONEWIRE_READ_ROM_CMD)?;
        read_rom_id(self)
    }

    /// Addresses devices on the 1-Wire bus.
    /// The first [`OneWire::read_byte`], [`OneWire::read_bit`], [`OneWire::write_byte`], [`OneWire::write_bit`] operation should be preceded by this method to address devices on the bus.
    /// Note: A [`OneWire::read_byte`] or [`OneWire::read_bit`] call will return garbage data if this method is called with [`RomAddressing::SkipRom`] on a bus with multiple devices.
    ///
    /// # Returns
    /// The ROM-ID read back when addressing with [`RomAddressing::ReadRom`],
    /// `None` otherwise.
    fn address(&mut self, addressing: RomAddressing) -> OneWireResult<Option<RomId>, Self::BusError> {
        self.reset_expect_presence()?; // Reset the bus before addressing
        match addressing {
            RomAddressing::ReadRom => {
                self.write_byte(ONEWIRE_READ_ROM_CMD)?;
                read_rom_id(self).map(Some)
            }
            RomAddressing::MatchRom(rom) => {
                self.write_byte(ONEWIRE_MATCH_ROM_CMD)?;
                self.write_bytes(&rom.to_le_bytes())?;
                Ok(None)
            }
            RomAddressing::SkipRom => {
                self.write_byte(ONEWIRE_SKIP_ROM_CMD)?;
                Ok(None)
            }
        }
    }

    /// Starts a transaction: reset, ROM addressing, then the function command.
    ///
    /// After this returns the caller owns the bit and byte stream until the next
    /// reset.
    fn transaction(
        &mut self,
        addressing: RomAddressing,
        function: u8,
    ) -> OneWireResult<Option<RomId>, Self::BusError> {
        let rom = self.address(addressing)?;
        self.write_byte(function)?;
        Ok(rom)
    }
}

fn read_rom_id<T: OneWire + ?Sized>(bus: &mut T) -> OneWireResult<RomId, T::BusError> {
    let mut bytes = [0u8; ROM_ID_LEN];
    bus.read_bytes(&mut bytes)?;
    let rom = RomId::from_le_bytes(bytes);
    if !rom.is_valid() {
        return Err(OneWireError::InvalidRomCrc);
    }
    Ok(rom)
}
