#[derive(Debug, PartialEq, Eq)]
/// 1-Wire slave errors.
pub enum SlaveError<E> {
    /// Error driving the line pin.
    Pin(E),
    /// A low pulse (in µs) that is neither a bit nor a reset.
    UnexpectedPulseLength(u16),
    /// A reset pulse arrived and the presence pulse has already been sent.
    /// Not fatal: the slave is waiting for a ROM command again.
    ResetDetectedAndHandled,
    /// `MATCH_ROM` addressed another slave.
    RomIdMismatch,
    /// The byte after a reset was not a ROM command.
    DidNotGetRomCommand(u8),
    /// The slave sat out an alarm search because its alarm flag is clear.
    NotAlarmed,
    /// The persisted part ID could not be read.
    Storage,
}

impl<E> From<E> for SlaveError<E> {
    fn from(value: E) -> Self {
        Self::Pin(value)
    }
}
