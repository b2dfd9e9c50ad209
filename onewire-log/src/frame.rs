use embedded_onewire::Crc16Ccitt;
use heapless::Vec;

use crate::MAX_MESSAGE_LENGTH;

/// An outgoing log frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogFrame<'a> {
    payload: &'a [u8],
}

impl<'a> LogFrame<'a> {
    /// `None` if `payload` is longer than [`MAX_MESSAGE_LENGTH`].
    pub fn new(payload: &'a [u8]) -> Option<Self> {
        (payload.len() <= MAX_MESSAGE_LENGTH).then_some(Self { payload })
    }

    /// The length byte.
    pub fn len(&self) -> u8 {
        // bounded by MAX_MESSAGE_LENGTH
        self.payload.len() as u8
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// The payload.
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// CRC16-CCITT over the length byte and the payload.
    pub fn crc(&self) -> u16 {
        let mut crc = Crc16Ccitt::new();
        crc.update(self.len());
        crc.update_all(self.payload);
        crc.value()
    }

    /// The trailing CRC in transmission order.
    pub fn crc_bytes(&self) -> [u8; 2] {
        self.crc().to_be_bytes()
    }
}

/// Running CRC of a frame being received.
///
/// Length and payload bytes are folded in as they arrive, so once the trailing
/// CRC has been read only a compare is left.
#[derive(Debug, Clone, Copy)]
pub struct FrameCheck {
    crc: Crc16Ccitt,
}

impl FrameCheck {
    /// Starts a check for a frame announcing `len` payload bytes.
    pub fn new(len: u8) -> Self {
        let mut crc = Crc16Ccitt::new();
        crc.update(len);
        Self { crc }
    }

    /// Folds in one payload byte.
    pub fn update(&mut self, byte: u8) {
        self.crc.update(byte);
    }

    /// CRC of everything folded in so far.
    pub fn computed(&self) -> u16 {
        self.crc.value()
    }

    /// Compares against the CRC bytes as received; `Err((computed, received))`
    /// on a mismatch.
    pub fn verify(&self, crc_bytes: [u8; 2]) -> Result<(), (u16, u16)> {
        let computed = self.computed();
        let received = u16::from_be_bytes(crc_bytes);
        if computed == received {
            Ok(())
        } else {
            Err((computed, received))
        }
    }
}

/// Capacity of a received message: the longest payload and its NUL.
pub const MESSAGE_CAPACITY: usize = MAX_MESSAGE_LENGTH + 1;

/// A received, CRC-checked log message, NUL terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    buf: Vec<u8, MESSAGE_CAPACITY>,
}

impl LogMessage {
    /// Takes a payload and appends the terminating NUL. `None` if `payload`
    /// is longer than [`MAX_MESSAGE_LENGTH`].
    pub fn from_payload(payload: &[u8]) -> Option<Self> {
        let mut buf = Vec::new();
        buf.extend_from_slice(payload).ok()?;
        buf.push(0).ok()?;
        Some(Self { buf })
    }

    /// The payload without the NUL.
    pub fn payload(&self) -> &[u8] {
        &self.buf[..self.buf.len() - 1]
    }

    /// The payload with the NUL, as handed to C-style consumers.
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        &self.buf
    }

    /// The payload as text, if it is UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        core::str::from_utf8(self.payload()).ok()
    }
}
