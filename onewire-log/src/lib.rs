#![no_std]
#![deny(missing_docs)]
//! # onewire-log
//! Printf-style log messages relayed from a 1-Wire master to a slave.
//!
//! A message travels as the payload of function command [`LOG_FUNCTION_CMD`]:
//!
//! | Byte | Content |
//! |------|---------|
//! | 0 | payload length `L`, at most [`MAX_MESSAGE_LENGTH`] |
//! | 1..=L | payload |
//! | L+1, L+2 | CRC16-CCITT over length and payload, high byte first |
//!
//! The slave then holds the line low while it handles the message, and
//! answers [`LOG_ACK`] once it is done. The master only treats a message as
//! delivered when it reads that exact byte.
//!
//! [`LogSender`] is the master side, [`LogReceiver`] the slave side.

#[cfg(test)]
extern crate std;

mod error;
mod frame;
mod receiver;
mod sender;

pub use error::LogError;
pub use frame::{FrameCheck, LogFrame, LogMessage, MESSAGE_CAPACITY};
pub use receiver::{LogReceiver, receive_frame};
pub use sender::LogSender;

/// Function command announcing a log frame.
pub const LOG_FUNCTION_CMD: u8 = 0x44;
/// Byte the slave answers a handled message with.
pub const LOG_ACK: u8 = 0x42;
/// Longest payload either end accepts.
pub const MAX_MESSAGE_LENGTH: usize = 242;

/// Result type for log frame operations.
pub type LogResult<T, E> = Result<T, LogError<E>>;
