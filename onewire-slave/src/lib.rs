#![no_std]
#![deny(missing_docs)]
//! # onewire-slave
//! An interrupt-driven 1-Wire slave.
//!
//! The slave never times bits by polling. A pin-change interrupt feeds every
//! edge of the line into a [`PulseCapture`], which measures how long the line
//! was low; the main loop classifies those pulses ([`PulseKind`]) as bits or
//! resets. On top of the bit layer, [`OneWireSlave::wait_for_function_command`]
//! answers the ROM commands (including the binary-tree search) and hands the
//! next function command to the application.
//!
//! A reset can arrive at any point. Whatever the slave was doing, it answers
//! with a presence pulse and the operation returns
//! [`SlaveError::ResetDetectedAndHandled`]; the dispatcher then continues
//! with the next ROM command.
//!
//! With the `strict` feature, timing violations (malformed pulses, pulse events
//! the main loop was too slow to consume, resets during a write slot) panic
//! instead of being recovered from.

#[cfg(test)]
extern crate std;

mod config;
mod dispatch;
mod error;
mod pulse;
mod slave;

pub use config::{
    DEFAULT_FAMILY_CODE, DEFAULT_PART_ID, PART_ID_STORAGE_OFFSET, PartIdStorage, SlaveConfig,
    StorageOutOfRange,
};
pub use dispatch::TransactionState;
pub use error::SlaveError;
pub use pulse::{PulseCapture, PulseEvent, PulseKind, PulseSource, Stopwatch, threshold};
pub use slave::{OneWireSlave, timing};

pub use embedded_onewire::RomId;

/// Result type for 1-Wire slave operations.
pub type SlaveResult<T, E> = Result<T, SlaveError<E>>;

#[cold]
#[inline(never)]
pub(crate) fn trap(what: &str, us: u16) -> ! {
    panic!("1-Wire slave trap: {what} ({us} us)")
}
