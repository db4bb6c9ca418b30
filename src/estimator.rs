//! HyperLogLog cardinality estimator with the canonical (schema version 1) storage format,
//! so that estimators can be exchanged bit-for-bit with other implementations of the
//! same storage specification.
//!
//! # Data-structure design rationale
//!
//! ## Low memory footprint
//! An estimator starts out `Empty` and only allocates when values are added. With the
//! production settings (`log2m = 14`, `regwidth = 5`, sparse enabled, explicit disabled):
//! - no clients: 3 bytes of storage (header only)
//! - up to 4096 non-zero registers: sparse representation, 19 bits per register
//! - above that: full representation, 10240 bytes of packed registers
//!
//! Most domains in a DNS dataset are queried by few clients, so most estimators stay sparse.
//!
//! ## Strict unions
//! Two estimators can only be unioned when their [`HllSettings`] are identical. Unions never
//! fold registers to a lower precision; incompatible inputs return an error instead.
//!
//! # Storage format
//! - byte 0: `version << 4 | storage type` (version is always 1)
//! - byte 1: `(regwidth - 1) << 5 | log2m`
//! - byte 2: `sparse enabled << 6 | explicit cutoff`
//! - bytes 3..: representation specific body, see the `explicit`, `sparse` and `full` modules.
//!
//! Original HyperLogLog paper:
//! http://algo.inria.fr/flajolet/Publications/FlFuGaMe07.pdf

use std::fmt::{Debug, Formatter};

use thiserror::Error;

use crate::explicit::Explicit;
use crate::full::Full;
use crate::representation::{register_for, Empty, Representation, RepresentationTrait, StorageType};
use crate::settings::HllSettings;
use crate::sparse::Sparse;

/// Storage schema version written into the high nibble of header byte 0.
pub const SCHEMA_VERSION: u8 = 1;
/// Length of the storage header.
const HEADER_LEN: usize = 3;

/// Estimator level errors
#[derive(Debug, Error)]
pub enum HllError {
    #[error("log2m {0} is out of range")]
    InvalidLog2m(u8),
    #[error("regwidth {0} is out of range")]
    InvalidRegwidth(u8),
    #[error("explicit threshold {0} must be a power of two no larger than 131072")]
    InvalidExplicitThreshold(u32),
    #[error("invalid HLL header: {0}")]
    InvalidHeader(&'static str),
    #[error("unsupported HLL schema version {0}")]
    UnsupportedVersion(u8),
    #[error("unknown HLL storage type {0}")]
    UnknownType(u8),
    #[error("invalid {storage:?} body length {len}")]
    InvalidLength { storage: StorageType, len: usize },
    #[error("register index {0} is out of range")]
    InvalidRegister(u32),
    #[error("incompatible HLL settings: {expected:?} and {found:?}")]
    IncompatibleSettings {
        expected: HllSettings,
        found: HllSettings,
    },
}

/// HyperLogLog estimator over pre-hashed 64-bit values
#[derive(Clone, PartialEq)]
pub struct Hll {
    settings: HllSettings,
    repr: Representation,
}

impl Hll {
    /// Creates new empty estimator
    #[inline]
    pub fn new(settings: HllSettings) -> Self {
        Self {
            settings,
            repr: Representation::Empty(Empty),
        }
    }

    /// Estimator settings
    #[inline]
    pub fn settings(&self) -> &HllSettings {
        &self.settings
    }

    /// Current storage type
    #[inline]
    pub fn storage_type(&self) -> StorageType {
        self.repr.storage_type()
    }

    /// Returns `true` when no value has been added.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.storage_type() == StorageType::Empty
    }

    /// Add an already hashed value. The low `log2m` bits select the register, the remaining
    /// bits determine the register value.
    pub fn add_raw(&mut self, raw: u64) {
        if let Representation::Empty(_) = self.repr {
            self.repr = self.initial_representation();
        }

        let settings = self.settings;
        let overflow = match &mut self.repr {
            Representation::Empty(_) => false,
            Representation::Explicit(explicit) => {
                explicit.insert(raw) > settings.explicit_threshold()
            }
            Representation::Sparse(sparse) => match register_for(&settings, raw) {
                Some((idx, value)) => sparse.set_max(idx, value) > settings.sparse_threshold(),
                None => false,
            },
            Representation::Full(full) => {
                if let Some((idx, value)) = register_for(&settings, raw) {
                    full.set_max(idx, value);
                }
                false
            }
        };

        if overflow {
            self.promote();
        }
    }

    /// Return cardinality estimate, rounded up
    #[inline]
    pub fn cardinality(&self) -> u64 {
        self.repr.cardinality(&self.settings)
    }

    /// Union `other` into `self`. Fails without modifying `self` if the settings differ.
    pub fn strict_union(&mut self, other: &Hll) -> Result<(), HllError> {
        if self.settings != other.settings {
            return Err(HllError::IncompatibleSettings {
                expected: self.settings,
                found: other.settings,
            });
        }

        if other.storage_type().rank() > self.storage_type().rank() {
            // take over the richer representation and fold our own values into it
            let mut merged = other.clone();
            merged.absorb(self);
            *self = merged;
        } else {
            self.absorb(other);
        }
        Ok(())
    }

    /// Canonical storage bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.storage_size());
        out.push((SCHEMA_VERSION << 4) | self.storage_type() as u8);
        out.push(self.settings.parameters_byte());
        out.push(self.settings.cutoff_byte());
        self.repr.write_data(&self.settings, &mut out);
        out
    }

    /// Decode canonical storage bytes. The settings are taken from the header.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HllError> {
        if bytes.len() < HEADER_LEN {
            return Err(HllError::InvalidHeader("fewer than 3 bytes"));
        }
        let version = bytes[0] >> 4;
        if version != SCHEMA_VERSION {
            return Err(HllError::UnsupportedVersion(version));
        }
        let ordinal = bytes[0] & 0x0f;
        let storage = StorageType::from_ordinal(ordinal).ok_or(HllError::UnknownType(ordinal))?;
        let settings = HllSettings::from_header(bytes[1], bytes[2])?;
        let body = &bytes[HEADER_LEN..];

        let repr = match storage {
            StorageType::Empty if body.is_empty() => Representation::Empty(Empty),
            StorageType::Empty => {
                return Err(HllError::InvalidLength {
                    storage,
                    len: body.len(),
                })
            }
            StorageType::Explicit => Representation::Explicit(Explicit::from_data(body)?),
            StorageType::Sparse => Representation::Sparse(Sparse::from_data(&settings, body)?),
            StorageType::Full => Representation::Full(Full::from_data(&settings, body)?),
        };
        Ok(Self { settings, repr })
    }

    /// Length of [`Hll::to_bytes`] output, computed without encoding.
    #[inline]
    pub fn storage_size(&self) -> usize {
        HEADER_LEN + self.repr.data_len(&self.settings)
    }

    /// First non-empty representation allowed by the settings
    fn initial_representation(&self) -> Representation {
        if self.settings.explicit_threshold() > 0 {
            Representation::Explicit(Explicit::default())
        } else {
            self.probabilistic_representation()
        }
    }

    fn probabilistic_representation(&self) -> Representation {
        if self.settings.sparse_enabled() {
            Representation::Sparse(Sparse::default())
        } else {
            Representation::Full(Full::new(&self.settings))
        }
    }

    /// Move to the next representation after the current one overflowed its threshold.
    fn promote(&mut self) {
        let next = match &self.repr {
            Representation::Explicit(explicit) => {
                let mut promoted = Self {
                    settings: self.settings,
                    repr: self.probabilistic_representation(),
                };
                for raw in explicit.raw_values() {
                    promoted.add_raw(raw);
                }
                promoted.repr
            }
            Representation::Sparse(sparse) => {
                let mut full = Full::new(&self.settings);
                for (idx, value) in sparse.registers() {
                    full.set_max(idx, value);
                }
                Representation::Full(full)
            }
            Representation::Empty(_) | Representation::Full(_) => return,
        };
        self.repr = next;
    }

    /// Fold `other` into `self`, where `other` never has a higher storage rank.
    fn absorb(&mut self, other: &Hll) {
        match &other.repr {
            Representation::Empty(_) => {}
            Representation::Explicit(explicit) => {
                for raw in explicit.raw_values() {
                    self.add_raw(raw);
                }
            }
            Representation::Sparse(sparse) => self.absorb_registers(sparse.registers()),
            Representation::Full(full) => self.absorb_registers(full.registers()),
        }
    }

    fn absorb_registers(&mut self, registers: impl Iterator<Item = (u32, u8)>) {
        let threshold = self.settings.sparse_threshold();
        let overflow = match &mut self.repr {
            Representation::Sparse(sparse) => {
                let mut len = sparse.len();
                for (idx, value) in registers {
                    len = sparse.set_max(idx, value);
                }
                len > threshold
            }
            Representation::Full(full) => {
                for (idx, value) in registers {
                    full.set_max(idx, value);
                }
                false
            }
            Representation::Empty(_) | Representation::Explicit(_) => false,
        };
        if overflow {
            self.promote();
        }
    }
}

impl Default for Hll {
    fn default() -> Self {
        Self::new(HllSettings::production())
    }
}

impl Debug for Hll {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{ representation: {:?}, estimate: {}, size: {} }}",
            self.storage_type(),
            self.cardinality(),
            self.storage_size()
        )
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::settings::ExplicitThreshold;
    use test_case::test_case;
    use xxhash_rust::xxh3::xxh3_64;

    const IPV4_HASH: u64 = 0xb15c_e949_ae6f_3312;
    const IPV6_HASH: u64 = 0x1a82_8659_2f9f_366d;

    fn filled(settings: HllSettings, n: u64) -> Hll {
        let mut hll = Hll::new(settings);
        for i in 0..n {
            hll.add_raw(xxh3_64(&i.to_be_bytes()));
        }
        hll
    }

    #[test]
    fn test_interop_bytes() {
        let mut hll = Hll::default();
        assert_eq!(hll.to_bytes(), [0x11, 0x8e, 0x40]);

        hll.add_raw(IPV4_HASH);
        assert_eq!(hll.to_bytes(), [0x13, 0x8e, 0x40, 0xcc, 0x48, 0x60]);

        hll.add_raw(IPV6_HASH);
        assert_eq!(
            hll.to_bytes(),
            [0x13, 0x8e, 0x40, 0xcc, 0x48, 0x7b, 0x36, 0x8c]
        );
        assert_eq!(hll.storage_size(), 8);
    }

    #[test_case(0 => "{ representation: Empty, estimate: 0, size: 3 }")]
    #[test_case(1 => "{ representation: Sparse, estimate: 2, size: 6 }")]
    #[test_case(2 => "{ representation: Sparse, estimate: 3, size: 8 }")]
    fn test_debug(n: usize) -> String {
        let mut hll = Hll::default();
        for raw in [IPV4_HASH, IPV6_HASH].into_iter().take(n) {
            hll.add_raw(raw);
        }
        format!("{:?}", hll)
    }

    #[test]
    fn test_zero_substream_still_leaves_empty() {
        let mut hll = Hll::default();
        hll.add_raw(0x1234);
        assert_eq!(hll.storage_type(), StorageType::Sparse);
        assert_eq!(hll.cardinality(), 0);
        assert_eq!(hll.to_bytes(), [0x13, 0x8e, 0x40]);
    }

    #[test_case(100, 0.05; "hundred")]
    #[test_case(10_000, 0.03; "ten thousand")]
    #[test_case(200_000, 0.03; "two hundred thousand")]
    fn test_estimate_error(n: u64, max_err: f64) {
        let hll = filled(HllSettings::production(), n);
        let err = (hll.cardinality() as f64 - n as f64).abs() / n as f64;
        assert!(err < max_err, "n = {n}, estimate = {}", hll.cardinality());
    }

    #[test]
    fn test_sparse_promotes_to_full() {
        let hll = filled(HllSettings::production(), 20_000);
        assert_eq!(hll.storage_type(), StorageType::Full);
        assert_eq!(hll.storage_size(), 3 + 10240);
    }

    #[test]
    fn test_explicit_counts_exactly_then_promotes() {
        let settings = HllSettings::new(10, 5, ExplicitThreshold::Fixed(64), true).unwrap();
        let hll = filled(settings, 64);
        assert_eq!(hll.storage_type(), StorageType::Explicit);
        assert_eq!(hll.cardinality(), 64);
        assert_eq!(hll.storage_size(), 3 + 64 * 8);

        let hll = filled(settings, 65);
        assert_eq!(hll.storage_type(), StorageType::Sparse);
    }

    #[test]
    fn test_explicit_without_sparse_promotes_to_full() {
        let settings = HllSettings::new(8, 4, ExplicitThreshold::Auto, false).unwrap();
        // auto threshold: 256 * 4 / 8 / 8 = 16 values
        assert_eq!(settings.explicit_threshold(), 16);
        assert_eq!(filled(settings, 16).storage_type(), StorageType::Explicit);
        assert_eq!(filled(settings, 17).storage_type(), StorageType::Full);
    }

    #[test_case(0; "empty")]
    #[test_case(1; "single")]
    #[test_case(1000; "sparse")]
    #[test_case(50_000; "full")]
    fn test_bytes_round_trip(n: u64) {
        let hll = filled(HllSettings::production(), n);
        let bytes = hll.to_bytes();
        let decoded = Hll::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, hll);
        assert_eq!(decoded.to_bytes(), bytes);
    }

    #[test]
    fn test_explicit_round_trip() {
        let settings = HllSettings::new(11, 5, ExplicitThreshold::Auto, true).unwrap();
        let hll = filled(settings, 10);
        let decoded = Hll::from_bytes(&hll.to_bytes()).unwrap();
        assert_eq!(decoded.settings(), &settings);
        assert_eq!(decoded.cardinality(), 10);
    }

    #[test_case(&[] => matches Err(HllError::InvalidHeader(_)); "too short")]
    #[test_case(&[0x21, 0x8e, 0x40] => matches Err(HllError::UnsupportedVersion(2)); "version")]
    #[test_case(&[0x15, 0x8e, 0x40] => matches Err(HllError::UnknownType(5)); "storage type")]
    #[test_case(&[0x11, 0x8e, 0x40, 0x00] => matches Err(HllError::InvalidLength { .. }); "empty with body")]
    #[test_case(&[0x14, 0x8e, 0x40, 0x00] => matches Err(HllError::InvalidLength { .. }); "short full")]
    #[test_case(&[0x11, 0x83, 0x40] => matches Err(HllError::InvalidLog2m(3)); "log2m")]
    fn test_from_bytes_errors(bytes: &[u8]) -> Result<Hll, HllError> {
        Hll::from_bytes(bytes)
    }

    #[test]
    fn test_union_requires_equal_settings() {
        let mut lhs = Hll::default();
        let rhs = Hll::new(HllSettings::new(12, 5, ExplicitThreshold::Disabled, true).unwrap());
        let err = lhs.strict_union(&rhs).unwrap_err();
        assert!(matches!(err, HllError::IncompatibleSettings { .. }));
        assert!(lhs.is_empty());
    }

    #[test_case(0, 0 => "{ representation: Empty, estimate: 0, size: 3 }")]
    #[test_case(1, 0 => "{ representation: Sparse, estimate: 2, size: 6 }")]
    #[test_case(0, 1 => "{ representation: Sparse, estimate: 2, size: 6 }")]
    #[test_case(1, 1 => "{ representation: Sparse, estimate: 2, size: 6 }")]
    fn test_union_small(lhs_n: u64, rhs_n: u64) -> String {
        let mut lhs = filled(HllSettings::production(), lhs_n);
        let rhs = filled(HllSettings::production(), rhs_n);
        lhs.strict_union(&rhs).unwrap();
        format!("{:?}", lhs)
    }

    #[test_case(100, 20_000; "sparse into full")]
    #[test_case(20_000, 100; "full absorbs sparse")]
    #[test_case(3000, 3000; "sparse overflow")]
    fn test_union_matches_single_estimator(lhs_n: u64, rhs_n: u64) {
        let mut lhs = filled(HllSettings::production(), lhs_n);
        let mut rhs = Hll::default();
        for i in 0..rhs_n {
            rhs.add_raw(xxh3_64(&(i + 1_000_000).to_be_bytes()));
        }
        let mut expected = lhs.clone();
        for i in 0..rhs_n {
            expected.add_raw(xxh3_64(&(i + 1_000_000).to_be_bytes()));
        }

        lhs.strict_union(&rhs).unwrap();
        assert_eq!(lhs.storage_type(), expected.storage_type());
        assert_eq!(lhs.cardinality(), expected.cardinality());
        assert_eq!(lhs.to_bytes(), expected.to_bytes());
    }

    #[test]
    fn test_union_with_itself_is_idempotent() {
        let mut hll = filled(HllSettings::production(), 5000);
        let copy = hll.clone();
        hll.strict_union(&copy).unwrap();
        assert_eq!(hll, copy);
    }
}
