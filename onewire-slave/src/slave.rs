use embedded_hal::{delay::DelayNs, digital::OutputPin};
use embedded_onewire::RomId;

use self::timing::*;
use crate::{PulseKind, PulseSource, SlaveError, SlaveResult, TransactionState};

/// Slave-side slot timings in microseconds.
pub mod timing {
    /// Quiet time between the end of a reset pulse and the presence pulse.
    pub const PRESENCE_WAIT_US: u32 = 28;
    /// Presence pulse low time.
    pub const PRESENCE_LOW_US: u32 = 116;
    /// Low time when answering a read slot with zero, counted from the end
    /// of the master's slot start pulse. Covers the master's sample point.
    pub const WRITE_ZERO_LOW_US: u32 = 37;
    /// Time the slave sits out a read slot it answers with one. Zero answers
    /// from other slaves end within this window and are dropped.
    pub const SLOT_GUARD_US: u32 = 45;
}

/// A 1-Wire slave on one open-drain line.
///
/// `P` drives the line (`set_low` pulls it down, `set_high` releases it), `S`
/// delivers the measured low pulses and `D` times the slave's own pulses.
pub struct OneWireSlave<P, S, D> {
    pin: P,
    pulses: S,
    delay: D,
    rom: RomId,
    alarmed: bool,
    pub(crate) state: TransactionState,
}

impl<P: OutputPin, S: PulseSource, D: DelayNs> OneWireSlave<P, S, D> {
    /// Creates a slave answering to `rom` and releases the line.
    pub fn new(pin: P, pulses: S, delay: D, rom: RomId) -> Result<Self, P::Error> {
        let mut slave = Self {
            pin,
            pulses,
            delay,
            rom,
            alarmed: false,
            state: TransactionState::WaitingReset,
        };
        slave.pin.set_high()?;
        Ok(slave)
    }

    /// The ROM-ID this slave answers with.
    pub fn rom_id(&self) -> RomId {
        self.rom
    }

    /// Current dispatcher state.
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Take part in alarm searches from now on, or stop doing so.
    pub fn set_alarmed(&mut self, alarmed: bool) {
        self.alarmed = alarmed;
    }

    /// Whether this slave answers alarm searches.
    pub fn is_alarmed(&self) -> bool {
        self.alarmed
    }

    /// Releases the pin, the pulse source and the delay.
    pub fn into_inner(self) -> (P, S, D) {
        (self.pin, self.pulses, self.delay)
    }

    /// Answers a reset that has just ended.
    ///
    /// Consuming the rising edge of the presence pulse also swallows a reset
    /// the master starts before the presence pulse is over.
    pub fn presence_pulse(&mut self) -> SlaveResult<(), P::Error> {
        self.delay.delay_us(PRESENCE_WAIT_US);
        self.pin.set_low()?;
        self.delay.delay_us(PRESENCE_LOW_US);
        self.pin.set_high()?;
        self.pulses.wait_for_pulse_end();
        self.state = TransactionState::WaitingRomCommand;
        Ok(())
    }

    /// Ignores everything on the line up to the next reset, then answers it.
    pub fn wait_for_reset(&mut self) -> SlaveResult<(), P::Error> {
        while PulseKind::classify(self.pulses.wait_for_pulse_end()) != PulseKind::Reset {}
        self.presence_pulse()
    }

    /// Waits for the next bit slot and returns its start pulse in µs.
    fn next_slot(&mut self) -> SlaveResult<u16, P::Error> {
        let us = self.pulses.wait_for_pulse_end();
        match PulseKind::classify(us) {
            PulseKind::Reset => {
                self.presence_pulse()?;
                Err(SlaveError::ResetDetectedAndHandled)
            }
            PulseKind::Malformed => {
                if cfg!(feature = "strict") {
                    crate::trap("malformed pulse", us);
                }
                Err(SlaveError::UnexpectedPulseLength(us))
            }
            PulseKind::One | PulseKind::Zero => Ok(us),
        }
    }

    /// Reads one bit written by the master.
    pub fn read_bit(&mut self) -> SlaveResult<bool, P::Error> {
        let us = self.next_slot()?;
        Ok(PulseKind::classify(us) == PulseKind::One)
    }

    /// Answers the next read slot with `bit`.
    pub fn write_bit(&mut self, bit: bool) -> SlaveResult<(), P::Error> {
        let us = match self.next_slot() {
            Err(SlaveError::ResetDetectedAndHandled) if cfg!(feature = "strict") => {
                crate::trap("reset during write slot", crate::threshold::RESET_MIN_US);
            }
            res => res?,
        };
        // read slots start with a short pulse
        if PulseKind::classify(us) != PulseKind::One {
            if cfg!(feature = "strict") {
                crate::trap("write slot without read slot", us);
            }
            return Err(SlaveError::UnexpectedPulseLength(us));
        }
        if bit {
            self.delay.delay_us(SLOT_GUARD_US);
            self.pulses.discard_pending();
        } else {
            self.pin.set_low()?;
            self.delay.delay_us(WRITE_ZERO_LOW_US);
            self.pin.set_high()?;
            self.pulses.wait_for_pulse_end();
        }
        Ok(())
    }

    /// Reads one byte, least significant bit first.
    pub fn read_byte(&mut self) -> SlaveResult<u8, P::Error> {
        let mut byte = 0;
        for i in 0..8 {
            if self.read_bit()? {
                byte |= 1 << i;
            }
        }
        Ok(byte)
    }

    /// Writes one byte, least significant bit first.
    pub fn write_byte(&mut self, byte: u8) -> SlaveResult<(), P::Error> {
        for i in 0..8 {
            self.write_bit(byte >> i & 0x1 == 0x1)?;
        }
        Ok(())
    }

    /// Fills `buf` from the line.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> SlaveResult<(), P::Error> {
        for b in buf.iter_mut() {
            *b = self.read_byte()?;
        }
        Ok(())
    }

    /// Writes `bytes` in order.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> SlaveResult<(), P::Error> {
        for &b in bytes {
            self.write_byte(b)?;
        }
        Ok(())
    }

    /// Holds the line low to tell the master the slave is busy.
    pub fn busy_begin(&mut self) -> SlaveResult<(), P::Error> {
        self.pin.set_low()?;
        Ok(())
    }

    /// Releases a busy hold and consumes its rising edge.
    pub fn busy_end(&mut self) -> SlaveResult<(), P::Error> {
        self.pin.set_high()?;
        self.pulses.wait_for_pulse_end();
        Ok(())
    }

    /// Runs `f` while holding the line busy.
    pub fn busy<R>(&mut self, f: impl FnOnce() -> R) -> SlaveResult<R, P::Error> {
        self.busy_begin()?;
        let out = f();
        self.busy_end()?;
        Ok(out)
    }
}
