use bitfield_struct::bitfield;
use embedded_onewire::OneWireStatus;

/// Outcome of a reset pulse as seen by the master.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct ResetStatus {
    /// The line was low at the presence sample point, i.e. at least one
    /// slave answered the reset.
    pub presence_pulse_detect: bool,
    /// The line was still low at the end of the reset recovery time. No slave
    /// holds a presence pulse that long, so the line is shorted or a slave is
    /// stuck.
    pub short_detect: bool,
    /// Line level at the end of the reset recovery time.
    pub logic_level: bool,
    #[bits(5)]
    __: u8,
}

impl OneWireStatus for ResetStatus {
    fn presence(&self) -> bool {
        self.presence_pulse_detect()
    }

    fn shortcircuit(&self) -> bool {
        self.short_detect()
    }

    fn logic_level(&self) -> Option<bool> {
        Some(self.logic_level())
    }
}
