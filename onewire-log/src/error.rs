use embedded_onewire::OneWireError;
use onewire_slave::SlaveError;

#[derive(Debug, PartialEq, Eq)]
/// Log frame errors.
pub enum LogError<E> {
    /// Master bus error.
    OneWire(OneWireError<E>),
    /// Slave line error, including resets that cut a frame short.
    Slave(SlaveError<E>),
    /// Payload longer than [`MAX_MESSAGE_LENGTH`](crate::MAX_MESSAGE_LENGTH).
    MessageTooLong(usize),
    /// The frame CRC does not match its contents; no ack is sent.
    CrcMismatch {
        /// CRC over the received length and payload.
        computed: u16,
        /// CRC sent by the master.
        received: u16,
    },
    /// The slave was addressed with a function command other than
    /// [`LOG_FUNCTION_CMD`](crate::LOG_FUNCTION_CMD).
    InvalidFunctionCommand(u8),
    /// The byte read back instead of [`LOG_ACK`](crate::LOG_ACK). A slave
    /// that stays silent reads as `0xff`.
    NoAck(u8),
    /// The slave held the line low for longer than the busy timeout.
    BusyTimeout,
}

impl<E> From<OneWireError<E>> for LogError<E> {
    fn from(value: OneWireError<E>) -> Self {
        Self::OneWire(value)
    }
}

impl<E> From<SlaveError<E>> for LogError<E> {
    fn from(value: SlaveError<E>) -> Self {
        Self::Slave(value)
    }
}
