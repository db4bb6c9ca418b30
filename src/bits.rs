//! Big-endian bit packing used by the canonical storage encoding.
//!
//! Values are written most significant bit first, one after the other without alignment,
//! and the final byte is padded with zero bits.

/// Appends fixed-width values to a byte vector.
pub(crate) struct BitWriter<'a> {
    out: &'a mut Vec<u8>,
    /// Number of bits already used in the last byte of `out` (0 means byte aligned).
    used: u32,
}

impl<'a> BitWriter<'a> {
    pub(crate) fn new(out: &'a mut Vec<u8>) -> Self {
        Self { out, used: 0 }
    }

    /// Write the lowest `width` bits of `value`, `width` in `1..=64`.
    pub(crate) fn write(&mut self, value: u64, width: u32) {
        let mut remaining = width;
        while remaining > 0 {
            if self.used == 0 {
                self.out.push(0);
            }
            let free = 8 - self.used;
            let take = free.min(remaining);
            let shift = remaining - take;
            let chunk = ((value >> shift) & ((1u64 << take) - 1)) as u8;
            if let Some(last) = self.out.last_mut() {
                *last |= chunk << (free - take);
            }
            self.used = (self.used + take) % 8;
            remaining -= take;
        }
    }
}

/// Reads fixed-width values from a byte slice.
pub(crate) struct BitReader<'a> {
    data: &'a [u8],
    /// Absolute bit position of the next read.
    pos: usize,
}

impl<'a> BitReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Number of complete `width`-bit values left in the input.
    pub(crate) fn remaining(&self, width: u32) -> usize {
        (self.data.len() * 8 - self.pos) / width as usize
    }

    /// Read the next `width` bits, `width` in `1..=64`. Returns `None` past the end.
    pub(crate) fn read(&mut self, width: u32) -> Option<u64> {
        if self.remaining(width) == 0 {
            return None;
        }
        let mut value = 0u64;
        let mut remaining = width;
        while remaining > 0 {
            let byte = self.data[self.pos / 8];
            let offset = (self.pos % 8) as u32;
            let avail = 8 - offset;
            let take = avail.min(remaining);
            let chunk = (byte >> (avail - take)) & ((1u16 << take) - 1) as u8;
            value = (value << take) | u64::from(chunk);
            self.pos += take as usize;
            remaining -= take;
        }
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_words_are_msb_first() {
        // two 19-bit sparse words from the interop vectors
        let mut out = Vec::new();
        let mut writer = BitWriter::new(&mut out);
        writer.write(13074 << 5 | 3, 19);
        writer.write(13933 << 5 | 3, 19);
        assert_eq!(out, [0xcc, 0x48, 0x7b, 0x36, 0x8c]);

        let mut reader = BitReader::new(&out);
        assert_eq!(reader.remaining(19), 2);
        assert_eq!(reader.read(19), Some(13074 << 5 | 3));
        assert_eq!(reader.read(19), Some(13933 << 5 | 3));
        assert_eq!(reader.read(19), None);
    }

    #[test]
    fn test_full_width_values() {
        let mut out = Vec::new();
        let mut writer = BitWriter::new(&mut out);
        writer.write(u64::MAX, 64);
        writer.write(0x8000_0000_0000_0001, 64);
        assert_eq!(out.len(), 16);

        let mut reader = BitReader::new(&out);
        assert_eq!(reader.read(64), Some(u64::MAX));
        assert_eq!(reader.read(64), Some(0x8000_0000_0000_0001));
    }
}
