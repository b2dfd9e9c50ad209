#[derive(Debug, Default, Clone, Copy)]
/// Calculate CRC-8 used in 1-Wire communications.
///
/// This is the Maxim/Dallas "iButton" CRC (`x^8 + x^5 + x^4 + 1`, reflected),
/// initial value 0. It protects ROM-IDs and is folded bit by bit during a
/// ROM search.
pub struct OneWireCrc(u8);

#[cfg(feature = "crc-table")]
const CRC8_TABLE: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x1 == 0x1 { (crc >> 1) ^ 0x8c } else { crc >> 1 };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

impl OneWireCrc {
    /// Create a CRC state starting from `value`.
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Get the current CRC value
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Update the CRC with the incoming byte.
    #[cfg(feature = "crc-table")]
    pub fn update(&mut self, byte: u8) {
        self.0 = CRC8_TABLE[(self.0 ^ byte) as usize];
    }

    /// Update the CRC with the incoming byte.
    #[cfg(not(feature = "crc-table"))]
    pub fn update(&mut self, byte: u8) {
        let mut crc = self.0 ^ byte; // XOR the byte with the current CRC value
        for _ in 0..8 {
            if crc & 0x1 == 0x1 {
                crc = (crc >> 1) ^ 0x8c; // Polynomial for CRC-8
            } else {
                crc >>= 1;
            }
        }
        self.0 = crc;
    }

    /// Update the CRC with a single bit, as received during a ROM search.
    pub fn update_bit(&mut self, bit: bool) {
        let mix = (self.0 & 0x1 == 0x1) ^ bit;
        self.0 >>= 1;
        if mix {
            self.0 ^= 0x8c;
        }
    }

    /// CRC-8 of a byte sequence.
    pub fn compute(sequence: &[u8]) -> u8 {
        let mut crc = OneWireCrc(0);
        for &byte in sequence.iter() {
            crc.update(byte);
        }
        crc.0
    }

    /// Validate a sequence of bytes where the last byte is the 1-Wire CRC of
    /// the previous bytes.
    pub fn validate(sequence: &[u8]) -> bool {
        // If the last byte is the CRC of the rest, the result is 0
        Self::compute(sequence) == 0x0
    }
}

/// CRC-16-CCITT used to protect log frames.
///
/// Reflected form of the CCITT polynomial (`0x8408`), initial value `0xffff`, no
/// final XOR. This is the variant AVR toolchains ship as `_crc_ccitt_update`,
/// so frames interoperate with the 8-bit targets this protocol runs on.
#[derive(Debug, Clone, Copy)]
pub struct Crc16Ccitt(u16);

impl Default for Crc16Ccitt {
    fn default() -> Self {
        Self::new()
    }
}

impl Crc16Ccitt {
    /// Initial CRC register value.
    pub const INIT: u16 = 0xffff;

    /// Create a fresh CRC state.
    pub const fn new() -> Self {
        Self(Self::INIT)
    }

    /// Get the current CRC value.
    pub fn value(&self) -> u16 {
        self.0
    }

    /// Update the CRC with the incoming byte.
    pub fn update(&mut self, byte: u8) {
        let mut crc = self.0 ^ byte as u16;
        for _ in 0..8 {
            if crc & 0x1 == 0x1 {
                crc = (crc >> 1) ^ 0x8408;
            } else {
                crc >>= 1;
            }
        }
        self.0 = crc;
    }

    /// Update the CRC with every byte of `bytes`.
    pub fn update_all(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.update(b);
        }
    }

    /// CRC-16 of a byte sequence.
    pub fn compute(bytes: &[u8]) -> u16 {
        let mut crc = Self::new();
        crc.update_all(bytes);
        crc.0
    }
}
