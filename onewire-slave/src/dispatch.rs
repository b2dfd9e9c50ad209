use embedded_hal::{delay::DelayNs, digital::OutputPin};
use embedded_onewire::consts::{
    ONEWIRE_CONDITIONAL_SEARCH_CMD, ONEWIRE_MATCH_ROM_CMD, ONEWIRE_READ_ROM_CMD,
    ONEWIRE_SEARCH_CMD, ONEWIRE_SKIP_ROM_CMD, ROM_ID_BITS,
};

use crate::{OneWireSlave, PulseSource, SlaveError, SlaveResult};

/// Where the slave stands in a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Ignoring the line until the next reset.
    WaitingReset,
    /// Presence sent, the next byte is a ROM command.
    WaitingRomCommand,
    /// Addressed, the next byte is a function command.
    WaitingFunctionCommand,
}

impl<P: OutputPin, S: PulseSource, D: DelayNs> OneWireSlave<P, S, D> {
    /// Runs the transaction state machine until this slave is addressed and
    /// the master sends a function command, and returns that command.
    ///
    /// The next call starts from [`TransactionState::WaitingReset`]; the
    /// function command's payload, if any, must be read before that.
    ///
    /// Being addressed elsewhere (`MATCH_ROM` for another ID, losing a search,
    /// an alarm search while not alarmed) is handled here and never returned.
    /// Resets are answered wherever they arrive. Other errors leave the slave
    /// waiting for a reset and are returned.
    pub fn wait_for_function_command(&mut self) -> SlaveResult<u8, P::Error> {
        loop {
            match self.state {
                TransactionState::WaitingReset => self.wait_for_reset()?,
                TransactionState::WaitingRomCommand => match self.rom_command() {
                    Ok(true) => self.state = TransactionState::WaitingFunctionCommand,
                    Ok(false) => self.state = TransactionState::WaitingReset,
                    Err(SlaveError::ResetDetectedAndHandled) => {}
                    Err(SlaveError::RomIdMismatch | SlaveError::NotAlarmed) => {
                        self.state = TransactionState::WaitingReset;
                    }
                    Err(e) => {
                        log::debug!("1-Wire slave: {e:?}, waiting for reset");
                        self.state = TransactionState::WaitingReset;
                        return Err(e);
                    }
                },
                TransactionState::WaitingFunctionCommand => match self.read_byte() {
                    Ok(cmd) => {
                        self.state = TransactionState::WaitingReset;
                        return Ok(cmd);
                    }
                    Err(SlaveError::ResetDetectedAndHandled) => {}
                    Err(e) => {
                        log::debug!("1-Wire slave: {e:?}, waiting for reset");
                        self.state = TransactionState::WaitingReset;
                        return Err(e);
                    }
                },
            }
        }
    }

    /// Reads and answers one ROM command. `Ok(true)` if this slave is now
    /// addressed, `Ok(false)` if it dropped out of a search.
    fn rom_command(&mut self) -> SlaveResult<bool, P::Error> {
        match self.read_byte()? {
            ONEWIRE_READ_ROM_CMD => {
                let rom = self.rom_id().to_le_bytes();
                self.write_bytes(&rom)?;
                Ok(true)
            }
            ONEWIRE_MATCH_ROM_CMD => self.match_rom().map(|_| true),
            ONEWIRE_SKIP_ROM_CMD => Ok(true),
            ONEWIRE_SEARCH_CMD => self.search_rom(),
            ONEWIRE_CONDITIONAL_SEARCH_CMD => {
                if !self.is_alarmed() {
                    return Err(SlaveError::NotAlarmed);
                }
                self.search_rom()
            }
            cmd => Err(SlaveError::DidNotGetRomCommand(cmd)),
        }
    }

    fn match_rom(&mut self) -> SlaveResult<(), P::Error> {
        let rom = self.rom_id();
        for i in 0..ROM_ID_BITS {
            if self.read_bit()? != rom.bit(i) {
                return Err(SlaveError::RomIdMismatch);
            }
        }
        Ok(())
    }

    /// One pass of the binary-tree search: each ROM bit is sent as-is and
    /// complemented, then the master's direction is read.
    fn search_rom(&mut self) -> SlaveResult<bool, P::Error> {
        let rom = self.rom_id();
        for i in 0..ROM_ID_BITS {
            let bit = rom.bit(i);
            self.write_bit(bit)?;
            self.write_bit(!bit)?;
            if self.read_bit()? != bit {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
