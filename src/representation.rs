use enum_dispatch::enum_dispatch;

use crate::explicit::Explicit;
use crate::full::Full;
use crate::settings::HllSettings;
use crate::sparse::Sparse;

/// Storage type ordinals written into the low nibble of header byte 0.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    Empty = 1,
    Explicit = 2,
    Sparse = 3,
    Full = 4,
}

impl StorageType {
    pub(crate) fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            1 => Some(Self::Empty),
            2 => Some(Self::Explicit),
            3 => Some(Self::Sparse),
            4 => Some(Self::Full),
            _ => None,
        }
    }

    /// Promotion order: an estimator only ever moves to a higher rank.
    pub(crate) fn rank(self) -> u8 {
        self as u8
    }
}

/// No value has been added yet.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Empty;

/// Representation types supported by `Hll`
#[derive(Debug, Clone, PartialEq)]
#[enum_dispatch]
pub(crate) enum Representation {
    Empty(Empty),
    Explicit(Explicit),
    Sparse(Sparse),
    Full(Full),
}

/// Representation trait which must be implemented by all representations.
#[enum_dispatch(Representation)]
pub(crate) trait RepresentationTrait {
    fn storage_type(&self) -> StorageType;
    fn cardinality(&self, settings: &HllSettings) -> u64;
    /// Length of the body following the 3 byte header.
    fn data_len(&self, settings: &HllSettings) -> usize;
    fn write_data(&self, settings: &HllSettings, out: &mut Vec<u8>);
}

impl RepresentationTrait for Empty {
    fn storage_type(&self) -> StorageType {
        StorageType::Empty
    }

    fn cardinality(&self, _settings: &HllSettings) -> u64 {
        0
    }

    fn data_len(&self, _settings: &HllSettings) -> usize {
        0
    }

    fn write_data(&self, _settings: &HllSettings, _out: &mut Vec<u8>) {}
}

/// Compute register index and value for a raw hash, `None` when the substream is zero
/// (p(0) is undefined, so such values are ignored by the probabilistic representations).
#[inline]
pub(crate) fn register_for(settings: &HllSettings, raw: u64) -> Option<(u32, u8)> {
    let substream = raw >> settings.log2m();
    if substream == 0 {
        return None;
    }
    let index = (raw & ((1u64 << settings.log2m()) - 1)) as u32;
    let value = ((substream | settings.pw_max_mask()).trailing_zeros() + 1) as u8;
    Some((index, value))
}

/// HyperLogLog estimate from the harmonic sum of `2^-register` over all `m` registers and
/// the number of zero registers, with small and large range corrections.
pub(crate) fn probabilistic_cardinality(settings: &HllSettings, sum: f64, zeros: usize) -> u64 {
    let m = settings.m() as f64;
    let estimator = settings.alpha_m_squared() / sum;
    let small_cutoff = m * 5.0 / 2.0;
    let two_to_l = settings.two_to_l();
    let large_cutoff = two_to_l / 30.0;

    let estimate = if zeros != 0 && estimator < small_cutoff {
        // linear counting
        m * (m / zeros as f64).ln()
    } else if estimator <= large_cutoff {
        estimator
    } else {
        -two_to_l * (1.0 - estimator / two_to_l).ln()
    };
    estimate.ceil() as u64
}
