#![no_std]
#![deny(missing_docs)]
//! # embedded-onewire
//! A no-std implementation of the 1-Wire protocol.
//!
//! This crate provides a trait-based interface for 1-Wire communication, allowing you to implement the protocol on various platforms.
//! [OneWire] trait defines the basic operations required for a 1-Wire master, such as resetting the bus, writing and reading bytes, and writing and reading bits,
//! along with the ROM addressing and transaction launcher built on top of them.
//!
//! The crate also provides the search algorithm for discovering devices on the 1-Wire bus in [SearchCursor],
//! the [RomId] type shared by masters and slaves, and the CRC primitives ([OneWireCrc], [Crc16Ccitt]) used on the wire.

pub mod consts;
mod error;
mod rom;
mod search;
mod traits;
mod utils;
pub use error::OneWireError;
pub use rom::RomId;
pub use search::{OneWireSearchKind, SearchCursor};
pub use traits::{OneWire, OneWireStatus, RomAddressing};
pub use utils::{Crc16Ccitt, OneWireCrc};

/// Error type for 1-Wire operations.
pub type OneWireResult<T, E> = Result<T, OneWireError<E>>;
