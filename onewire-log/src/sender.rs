use embedded_hal::delay::DelayNs;
use embedded_onewire::{OneWire, RomAddressing};

use crate::{LOG_ACK, LOG_FUNCTION_CMD, LogError, LogFrame, LogResult};

/// Pause between the function command and the length byte.
const FRAME_DELAY_US: u32 = 10;
/// Poll period while the slave holds the line busy.
const BUSY_POLL_US: u32 = 10;
/// Default limit on how long the slave may stay busy.
const DEFAULT_BUSY_TIMEOUT_US: u32 = 100_000;

/// Master side of the log protocol.
///
/// ```ignore
/// let sender = LogSender::new().with_addressing(RomAddressing::MatchRom(rom));
/// sender.send(&mut bus, &mut delay, b"hello")?;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSender {
    addressing: RomAddressing,
    busy_timeout_us: u32,
}

impl Default for LogSender {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSender {
    /// Addresses the only slave on the bus with `READ_ROM`.
    pub const fn new() -> Self {
        Self {
            addressing: RomAddressing::ReadRom,
            busy_timeout_us: DEFAULT_BUSY_TIMEOUT_US,
        }
    }

    /// Selects the receiving slave(s).
    pub const fn with_addressing(mut self, addressing: RomAddressing) -> Self {
        self.addressing = addressing;
        self
    }

    /// Limits how long the slave may hold the line while handling a message.
    pub const fn with_busy_timeout_us(mut self, timeout_us: u32) -> Self {
        self.busy_timeout_us = timeout_us;
        self
    }

    /// Sends `payload` and waits for the slave to acknowledge it.
    ///
    /// # Errors
    /// - [`LogError::MessageTooLong`] before touching the bus.
    /// - [`LogError::OneWire`] if addressing fails, e.g. no presence.
    /// - [`LogError::BusyTimeout`] if the slave does not release the line.
    /// - [`LogError::NoAck`] if the slave rejected the frame or never got it.
    pub fn send<B: OneWire, D: DelayNs>(
        &self,
        bus: &mut B,
        delay: &mut D,
        payload: &[u8],
    ) -> LogResult<(), B::BusError> {
        let frame = LogFrame::new(payload).ok_or(LogError::MessageTooLong(payload.len()))?;
        bus.transaction(self.addressing, LOG_FUNCTION_CMD)?;
        delay.delay_us(FRAME_DELAY_US);
        bus.write_byte(frame.len())?;
        bus.write_bytes(frame.payload())?;
        bus.write_bytes(&frame.crc_bytes())?;

        let mut waited = 0;
        while !bus.sample_line()? {
            if waited >= self.busy_timeout_us {
                return Err(LogError::BusyTimeout);
            }
            delay.delay_us(BUSY_POLL_US);
            waited += BUSY_POLL_US;
        }

        let ack = bus.read_byte()?;
        if ack != LOG_ACK {
            log::debug!("Log frame of {} bytes not acknowledged: {ack:#04x}", frame.len());
            return Err(LogError::NoAck(ack));
        }
        log::debug!("Log frame of {} bytes delivered", frame.len());
        Ok(())
    }
}
