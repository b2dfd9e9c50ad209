#![no_std]
#![deny(missing_docs)]

/*! # onewire-gpio
 *
 * Bit-banged 1-Wire master. Drives one open-drain line through an
 * [`embedded_hal`] pin and busy-waits slot timings with a
 * [`DelayNs`](embedded_hal::delay::DelayNs) implementation.
 *
 * The pin must be configured open drain with an external pull-up:
 * `set_high` releases the line, `set_low` pulls it down, and the input
 * side reads the actual line level.
 */

#[cfg(test)]
extern crate std;

pub use embedded_onewire::{OneWire, OneWireError, OneWireResult};
mod onewire;
mod status;

pub use status::ResetStatus;

use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
};

/// Slot timings in microseconds. These are the standard-speed protocol
/// contract; shortening them breaks slaves that discriminate pulse widths.
pub mod timing {
    /// Reset pulse low time.
    pub const RESET_LOW_US: u32 = 480;
    /// Delay between releasing the reset pulse and sampling for presence.
    pub const PRESENCE_SAMPLE_US: u32 = 70;
    /// Remainder of the 480 µs reset recovery after the presence sample.
    pub const RESET_RECOVERY_US: u32 = 410;
    /// Low time of a write-one slot.
    pub const WRITE_ONE_LOW_US: u32 = 6;
    /// High time completing a write-one slot.
    pub const WRITE_ONE_HIGH_US: u32 = 64;
    /// Low time of a write-zero slot.
    pub const WRITE_ZERO_LOW_US: u32 = 60;
    /// High time completing a write-zero slot.
    pub const WRITE_ZERO_HIGH_US: u32 = 10;
    /// Low time opening a read slot.
    pub const READ_LOW_US: u32 = 6;
    /// Delay between releasing a read slot and sampling it.
    pub const READ_SAMPLE_US: u32 = 9;
    /// High time completing a read slot after the sample.
    pub const READ_RECOVERY_US: u32 = 55;
    /// Longest wait for an idle-high line before a reset.
    pub const IDLE_TIMEOUT_US: u32 = 250;
    /// Poll period while waiting for the line to go high.
    pub const IDLE_POLL_US: u32 = 2;
}

/// A bit-banged 1-Wire master.
///
/// Takes ownership of an open-drain pin (implementing both [`InputPin`] and
/// [`OutputPin`]) and a timer object implementing the [`DelayNs`] trait.
pub struct GpioOneWire<P, D> {
    pub(crate) pin: P,
    pub(crate) delay: D,
}

impl<P: InputPin + OutputPin, D: DelayNs> GpioOneWire<P, D> {
    /// Creates a new master and releases the line.
    pub fn new(pin: P, delay: D) -> Result<Self, P::Error> {
        let mut dev = GpioOneWire { pin, delay };
        dev.release()?;
        Ok(dev)
    }

    /// Releases the pin and the delay.
    pub fn into_inner(self) -> (P, D) {
        (self.pin, self.delay)
    }

    /// Lets the pull-up (or a slave) set the line level.
    pub fn release(&mut self) -> Result<(), P::Error> {
        self.pin.set_high()
    }

    /// Pulls the line low.
    pub fn drive_low(&mut self) -> Result<(), P::Error> {
        self.pin.set_low()
    }

    /// Reads the line level; `true` is high.
    pub fn sample(&mut self) -> Result<bool, P::Error> {
        self.pin.is_high()
    }

    /// Busy-waits until the line reads high, for at most `timeout_us`.
    pub(crate) fn wait_for_high(&mut self, timeout_us: u32) -> OneWireResult<(), P::Error> {
        let mut waited = 0;
        loop {
            if self.sample()? {
                return Ok(());
            }
            if waited >= timeout_us {
                return Err(OneWireError::BusInUse);
            }
            self.delay.delay_us(timing::IDLE_POLL_US);
            waited += timing::IDLE_POLL_US;
        }
    }
}
