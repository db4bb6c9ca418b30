//! ## Full representation
//! Holds all `m` registers, each `regwidth` bits wide, packed most significant bit first.
//! The storage body is the packed register array as is.

use crate::estimator::HllError;
use crate::representation::{probabilistic_cardinality, RepresentationTrait, StorageType};
use crate::settings::HllSettings;

/// Full representation container
#[derive(Clone, PartialEq)]
pub(crate) struct Full {
    regwidth: u8,
    /// Packed registers
    data: Vec<u8>,
}

impl Full {
    /// Create full representation with all registers set to zero.
    pub(crate) fn new(settings: &HllSettings) -> Self {
        Self {
            regwidth: settings.regwidth(),
            data: vec![0; settings.full_data_len()],
        }
    }

    /// Decode the storage body, which must hold exactly `m` registers.
    pub(crate) fn from_data(settings: &HllSettings, data: &[u8]) -> Result<Self, HllError> {
        if data.len() != settings.full_data_len() {
            return Err(HllError::InvalidLength {
                storage: StorageType::Full,
                len: data.len(),
            });
        }
        Ok(Self {
            regwidth: settings.regwidth(),
            data: data.to_vec(),
        })
    }

    /// Bit offset within the two byte window starting at the register's first byte, and
    /// the index of that byte.
    #[inline]
    fn locate(&self, idx: u32) -> (usize, u32) {
        let bit = idx as usize * usize::from(self.regwidth);
        (bit / 8, (bit % 8) as u32)
    }

    #[inline]
    fn window(&self, byte: usize) -> u16 {
        let hi = self.data[byte];
        let lo = self.data.get(byte + 1).copied().unwrap_or(0);
        u16::from_be_bytes([hi, lo])
    }

    #[inline]
    fn mask(&self) -> u16 {
        (1u16 << self.regwidth) - 1
    }

    /// Value of register `idx`
    #[inline]
    pub(crate) fn get(&self, idx: u32) -> u8 {
        let (byte, offset) = self.locate(idx);
        let shift = 16 - offset - u32::from(self.regwidth);
        ((self.window(byte) >> shift) & self.mask()) as u8
    }

    /// Raise register `idx` to `value` if it is currently lower.
    #[inline]
    pub(crate) fn set_max(&mut self, idx: u32, value: u8) {
        if value <= self.get(idx) {
            return;
        }
        let (byte, offset) = self.locate(idx);
        let shift = 16 - offset - u32::from(self.regwidth);
        let window = (self.window(byte) & !(self.mask() << shift)) | (u16::from(value) << shift);
        let [hi, lo] = window.to_be_bytes();
        self.data[byte] = hi;
        if let Some(next) = self.data.get_mut(byte + 1) {
            *next = lo;
        }
    }

    /// Iterate over all register values in index order.
    pub(crate) fn registers(&self) -> impl Iterator<Item = (u32, u8)> + '_ {
        let m = (self.data.len() * 8 / usize::from(self.regwidth)) as u32;
        (0..m).map(|idx| (idx, self.get(idx)))
    }
}

impl RepresentationTrait for Full {
    fn storage_type(&self) -> StorageType {
        StorageType::Full
    }

    fn cardinality(&self, settings: &HllSettings) -> u64 {
        let m = settings.m() as u32;
        let mut zeros = 0;
        let mut sum = 0.0;
        for idx in 0..m {
            let v = self.get(idx);
            if v == 0 {
                zeros += 1;
            }
            sum += 1.0 / (1u64 << v) as f64;
        }
        probabilistic_cardinality(settings, sum, zeros)
    }

    fn data_len(&self, _settings: &HllSettings) -> usize {
        self.data.len()
    }

    fn write_data(&self, _settings: &HllSettings, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.data);
    }
}

impl std::fmt::Debug for Full {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.data.iter().filter(|&&b| b != 0).count();
        f.debug_struct("Full")
            .field("regwidth", &self.regwidth)
            .field("bytes", &self.data.len())
            .field("non_zero_bytes", &non_zero)
            .finish()
    }
}
