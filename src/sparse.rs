//! ## Sparse representation
//! Keeps only the non-zero registers, keyed by register index.
//!
//! Storage body: one `log2m + regwidth` bit word per non-zero register, holding
//! `index << regwidth | value`, sorted by index and bit-packed big-endian.

use std::collections::BTreeMap;

use crate::bits::{BitReader, BitWriter};
use crate::estimator::HllError;
use crate::representation::{probabilistic_cardinality, RepresentationTrait, StorageType};
use crate::settings::HllSettings;

/// Sparse representation container
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Sparse {
    registers: BTreeMap<u32, u8>,
}

impl Sparse {
    /// Raise register `idx` to `value` if it is currently lower.
    /// Returns the number of non-zero registers afterwards.
    #[inline]
    pub(crate) fn set_max(&mut self, idx: u32, value: u8) -> usize {
        if value > 0 {
            let register = self.registers.entry(idx).or_insert(0);
            if value > *register {
                *register = value;
            }
        }
        self.registers.len()
    }

    /// Iterate `(index, value)` pairs of non-zero registers in index order
    pub(crate) fn registers(&self) -> impl Iterator<Item = (u32, u8)> + '_ {
        self.registers.iter().map(|(&idx, &value)| (idx, value))
    }

    pub(crate) fn len(&self) -> usize {
        self.registers.len()
    }

    /// Decode the storage body. Words with a zero value are padding and skipped.
    pub(crate) fn from_data(settings: &HllSettings, data: &[u8]) -> Result<Self, HllError> {
        let word_bits = settings.sparse_word_bits() as u32;
        let regwidth = u32::from(settings.regwidth());
        let value_mask = (1u64 << regwidth) - 1;
        let mut sparse = Self::default();
        let mut reader = BitReader::new(data);
        while let Some(word) = reader.read(word_bits) {
            let value = (word & value_mask) as u8;
            if value == 0 {
                continue;
            }
            let idx = (word >> regwidth) as u32;
            if idx as usize >= settings.m() {
                return Err(HllError::InvalidRegister(idx));
            }
            sparse.set_max(idx, value);
        }
        Ok(sparse)
    }
}

impl RepresentationTrait for Sparse {
    fn storage_type(&self) -> StorageType {
        StorageType::Sparse
    }

    fn cardinality(&self, settings: &HllSettings) -> u64 {
        let zeros = settings.m() - self.registers.len();
        let sum = self
            .registers
            .values()
            .fold(zeros as f64, |sum, &v| sum + 1.0 / (1u64 << v) as f64);
        probabilistic_cardinality(settings, sum, zeros)
    }

    fn data_len(&self, settings: &HllSettings) -> usize {
        (self.registers.len() * settings.sparse_word_bits()).div_ceil(8)
    }

    fn write_data(&self, settings: &HllSettings, out: &mut Vec<u8>) {
        let word_bits = settings.sparse_word_bits() as u32;
        let regwidth = u32::from(settings.regwidth());
        let mut writer = BitWriter::new(out);
        for (&idx, &value) in &self.registers {
            writer.write((u64::from(idx) << regwidth) | u64::from(value), word_bits);
        }
    }
}
