//! ## Explicit representation
//! Keeps every distinct raw value exactly, up to the configured explicit threshold.
//!
//! Storage body: the values as big-endian 64-bit signed integers in ascending order.

use std::collections::BTreeSet;
use std::mem::size_of;

use crate::estimator::HllError;
use crate::representation::{RepresentationTrait, StorageType};
use crate::settings::HllSettings;

/// Explicit representation container
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Explicit {
    /// Raw values reinterpreted as `i64` so iteration order matches the storage order.
    values: BTreeSet<i64>,
}

impl Explicit {
    /// Insert raw value, returns the number of values held afterwards.
    #[inline]
    pub(crate) fn insert(&mut self, raw: u64) -> usize {
        self.values.insert(raw as i64);
        self.values.len()
    }

    /// Iterate raw values in storage order
    pub(crate) fn raw_values(&self) -> impl Iterator<Item = u64> + '_ {
        self.values.iter().map(|&v| v as u64)
    }

    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }

    /// Decode the storage body.
    pub(crate) fn from_data(data: &[u8]) -> Result<Self, HllError> {
        if data.len() % size_of::<i64>() != 0 {
            return Err(HllError::InvalidLength {
                storage: StorageType::Explicit,
                len: data.len(),
            });
        }
        let values = data
            .chunks_exact(size_of::<i64>())
            .map(|chunk| {
                let mut be = [0u8; 8];
                be.copy_from_slice(chunk);
                i64::from_be_bytes(be)
            })
            .collect();
        Ok(Self { values })
    }
}

impl RepresentationTrait for Explicit {
    fn storage_type(&self) -> StorageType {
        StorageType::Explicit
    }

    fn cardinality(&self, _settings: &HllSettings) -> u64 {
        self.values.len() as u64
    }

    fn data_len(&self, _settings: &HllSettings) -> usize {
        self.values.len() * size_of::<i64>()
    }

    fn write_data(&self, _settings: &HllSettings, out: &mut Vec<u8>) {
        for v in &self.values {
            out.extend_from_slice(&v.to_be_bytes());
        }
    }
}
