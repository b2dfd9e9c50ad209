use embedded_hal::{delay::DelayNs, digital::OutputPin};
use onewire_slave::{OneWireSlave, PulseSource, SlaveError};

use crate::{
    FrameCheck, LOG_ACK, LOG_FUNCTION_CMD, LogError, LogMessage, LogResult, MAX_MESSAGE_LENGTH,
};

/// Reads the rest of a log frame once [`LOG_FUNCTION_CMD`] has been received,
/// and checks its CRC.
///
/// The CRC is updated as each byte arrives, so the slave can take the line
/// busy right after the last CRC bit.
pub fn receive_frame<P, S, D>(
    slave: &mut OneWireSlave<P, S, D>,
) -> LogResult<LogMessage, P::Error>
where
    P: OutputPin,
    S: PulseSource,
    D: DelayNs,
{
    let len = slave.read_byte()?;
    if usize::from(len) > MAX_MESSAGE_LENGTH {
        return Err(LogError::MessageTooLong(len.into()));
    }
    let mut check = FrameCheck::new(len);
    let mut payload = [0u8; MAX_MESSAGE_LENGTH];
    let payload = &mut payload[..usize::from(len)];
    for b in payload.iter_mut() {
        *b = slave.read_byte()?;
        check.update(*b);
    }
    let mut crc = [0u8; 2];
    slave.read_bytes(&mut crc)?;
    check
        .verify(crc)
        .map_err(|(computed, received)| LogError::CrcMismatch { computed, received })?;
    LogMessage::from_payload(payload).ok_or(LogError::MessageTooLong(len.into()))
}

/// Slave side of the log protocol: hands every accepted message to a handler.
///
/// ```ignore
/// let mut receiver = LogReceiver::new(|msg: &LogMessage| uart.write(msg.payload()));
/// loop {
///     if let Err(e) = receiver.poll(&mut slave) {
///         log::debug!("log frame dropped: {e:?}");
///     }
/// }
/// ```
pub struct LogReceiver<F> {
    handler: F,
}

impl<F: FnMut(&LogMessage)> LogReceiver<F> {
    /// Creates a receiver calling `handler` for each message.
    pub fn new(handler: F) -> Self {
        Self { handler }
    }

    /// Waits until this slave is sent a log frame, handles it and acknowledges it.
    ///
    /// The line is held busy while the handler runs. A frame that fails its CRC
    /// check is dropped without an ack, and the master reports it undelivered.
    /// A reset part way through a frame has already been answered with a
    /// presence pulse; the receiver goes back to waiting for the next ROM
    /// command.
    pub fn poll<P, S, D>(&mut self, slave: &mut OneWireSlave<P, S, D>) -> LogResult<(), P::Error>
    where
        P: OutputPin,
        S: PulseSource,
        D: DelayNs,
    {
        let msg = loop {
            let cmd = slave.wait_for_function_command()?;
            if cmd != LOG_FUNCTION_CMD {
                return Err(LogError::InvalidFunctionCommand(cmd));
            }
            match receive_frame(slave) {
                Ok(msg) => break msg,
                Err(LogError::Slave(SlaveError::ResetDetectedAndHandled)) => {
                    log::debug!("Log frame cut short by a reset");
                }
                Err(e) => return Err(e),
            }
        };
        let handler = &mut self.handler;
        slave.busy(|| handler(&msg))?;
        slave.write_byte(LOG_ACK)?;
        Ok(())
    }
}
