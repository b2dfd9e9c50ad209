//! Command constants for 1-Wire communication.

/// Command to read the ROM of the only device on the bus.
///
/// The slave answers with its 64-bit ROM-ID, least significant bit first.
/// When more than one slave is present their open-drain outputs collide and
/// the master reads the wired AND of all IDs, which fails the CRC check.
pub const ONEWIRE_READ_ROM_CMD: u8 = 0x33;

/// Command to match a specific ROM address in 1-Wire communication.
///
/// The master follows this byte with the 64-bit ROM-ID it wants to address.
/// Every slave whose ID disagrees with a transmitted bit stops listening
/// until the next reset pulse.
pub const ONEWIRE_MATCH_ROM_CMD: u8 = 0x55;

/// Command to skip ROM addressing; every slave on the bus proceeds to the
/// function command.
pub const ONEWIRE_SKIP_ROM_CMD: u8 = 0xcc;

/// Command to search for devices on the 1-Wire bus.
pub const ONEWIRE_SEARCH_CMD: u8 = 0xf0;

/// Command to search for devices in alarm state on the 1-Wire bus.
pub const ONEWIRE_CONDITIONAL_SEARCH_CMD: u8 = 0xec;

/// Length of a ROM-ID in bytes.
pub const ROM_ID_LEN: usize = 8;

/// Number of bits in a ROM-ID, i.e. the number of search triplets per pass.
pub const ROM_ID_BITS: u8 = 64;
