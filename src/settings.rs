//! Estimator configuration.
//!
//! An [`HllSettings`] value fixes everything that must match for two estimators to be
//! unioned: the number of registers (`2^log2m`), the register width in bits, the explicit
//! (exact) threshold and whether the sparse representation may be used. The settings are
//! also the parameters written into byte 1 and byte 2 of the canonical storage header.
//!
//! Production datasets use [`HllSettings::production`]:
//! - `log2m = 14`: 16384 registers, standard error 1.04 / sqrt(2^14) = 0.81%
//! - `regwidth = 5`: register values up to 31, enough for ~10^10 distinct clients
//! - explicit representation disabled
//! - sparse representation enabled

use crate::estimator::HllError;

/// Smallest supported `log2m`.
pub const MIN_LOG2M: u8 = 4;
/// Largest supported `log2m`.
pub const MAX_LOG2M: u8 = 30;
/// Smallest supported register width.
pub const MIN_REGWIDTH: u8 = 1;
/// Largest supported register width.
pub const MAX_REGWIDTH: u8 = 8;
/// Largest explicit threshold accepted (and the cap applied to the automatic one).
pub const MAX_EXPLICIT_THRESHOLD: u32 = 1 << 17;

/// Explicit cutoff value stored in the header meaning "disabled".
const EXPLICIT_CUTOFF_DISABLED: u8 = 0;
/// Explicit cutoff value stored in the header meaning "automatic".
const EXPLICIT_CUTOFF_AUTO: u8 = 63;

/// How many distinct raw values are kept exactly before switching to a probabilistic
/// representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExplicitThreshold {
    /// Never use the explicit representation.
    Disabled,
    /// Use as many values as fit in the full representation's byte size.
    Auto,
    /// Fixed power-of-two threshold.
    Fixed(u32),
}

/// Estimator configuration, constructed once and passed to every estimator constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HllSettings {
    log2m: u8,
    regwidth: u8,
    explicit: ExplicitThreshold,
    sparse_enabled: bool,
}

impl HllSettings {
    /// Settings used for all production datasets.
    pub const fn production() -> Self {
        Self {
            log2m: 14,
            regwidth: 5,
            explicit: ExplicitThreshold::Disabled,
            sparse_enabled: true,
        }
    }

    /// Creates validated settings.
    pub fn new(
        log2m: u8,
        regwidth: u8,
        explicit: ExplicitThreshold,
        sparse_enabled: bool,
    ) -> Result<Self, HllError> {
        if !(MIN_LOG2M..=MAX_LOG2M).contains(&log2m) {
            return Err(HllError::InvalidLog2m(log2m));
        }
        if !(MIN_REGWIDTH..=MAX_REGWIDTH).contains(&regwidth) {
            return Err(HllError::InvalidRegwidth(regwidth));
        }
        if let ExplicitThreshold::Fixed(t) = explicit {
            if t == 0 || !t.is_power_of_two() || t > MAX_EXPLICIT_THRESHOLD {
                return Err(HllError::InvalidExplicitThreshold(t));
            }
        }
        Ok(Self {
            log2m,
            regwidth,
            explicit,
            sparse_enabled,
        })
    }

    /// Number of bits used for the register index.
    #[inline]
    pub fn log2m(&self) -> u8 {
        self.log2m
    }

    /// Register width in bits.
    #[inline]
    pub fn regwidth(&self) -> u8 {
        self.regwidth
    }

    #[inline]
    pub fn explicit(&self) -> ExplicitThreshold {
        self.explicit
    }

    #[inline]
    pub fn sparse_enabled(&self) -> bool {
        self.sparse_enabled
    }

    /// Number of registers.
    #[inline]
    pub fn m(&self) -> usize {
        1 << self.log2m
    }

    /// Largest value a register can hold.
    #[inline]
    pub(crate) fn max_register_value(&self) -> u8 {
        // regwidth 8 would overflow `1 << 8` in u8
        ((1u16 << self.regwidth) - 1) as u8
    }

    /// Mask applied to the substream before counting trailing zeros so that `p(w)` never
    /// exceeds the largest register value.
    #[inline]
    pub(crate) fn pw_max_mask(&self) -> u64 {
        let pw_bits = u32::from(self.max_register_value()) - 1;
        match 1u64.checked_shl(pw_bits) {
            Some(bit) => !(bit - 1),
            // wide registers can hold any trailing-zero count of a 64-bit value
            None => 0,
        }
    }

    /// Number of bits in one sparse word (`index << regwidth | value`).
    #[inline]
    pub(crate) fn sparse_word_bits(&self) -> usize {
        usize::from(self.log2m) + usize::from(self.regwidth)
    }

    /// Number of bytes needed for the full representation's registers.
    #[inline]
    pub(crate) fn full_data_len(&self) -> usize {
        (self.m() * usize::from(self.regwidth)).div_ceil(8)
    }

    /// Number of explicit values kept before promotion, 0 when disabled.
    pub(crate) fn explicit_threshold(&self) -> usize {
        match self.explicit {
            ExplicitThreshold::Disabled => 0,
            ExplicitThreshold::Auto => {
                let longs = self.full_data_len() / 8;
                longs.min(MAX_EXPLICIT_THRESHOLD as usize)
            }
            ExplicitThreshold::Fixed(t) => t as usize,
        }
    }

    /// Number of sparse registers kept before promotion to the full representation,
    /// 0 when sparse is disabled.
    pub(crate) fn sparse_threshold(&self) -> usize {
        if !self.sparse_enabled {
            return 0;
        }
        let cutoff = (self.m() * usize::from(self.regwidth)) / self.sparse_word_bits();
        // largest power of two not above the cutoff
        1 << cutoff.ilog2()
    }

    /// Header byte 1: `(regwidth - 1) << 5 | log2m`.
    pub(crate) fn parameters_byte(&self) -> u8 {
        ((self.regwidth - 1) << 5) | self.log2m
    }

    /// Header byte 2: `sparse_enabled << 6 | explicit cutoff`.
    pub(crate) fn cutoff_byte(&self) -> u8 {
        let cutoff = match self.explicit {
            ExplicitThreshold::Disabled => EXPLICIT_CUTOFF_DISABLED,
            ExplicitThreshold::Auto => EXPLICIT_CUTOFF_AUTO,
            ExplicitThreshold::Fixed(t) => (t.trailing_zeros() + 1) as u8,
        };
        (u8::from(self.sparse_enabled) << 6) | cutoff
    }

    /// Reads settings back from header bytes 1 and 2.
    pub(crate) fn from_header(parameters: u8, cutoff: u8) -> Result<Self, HllError> {
        let regwidth = (parameters >> 5) + 1;
        let log2m = parameters & 0x1f;
        let sparse_enabled = cutoff & 0x40 != 0;
        let explicit = match cutoff & 0x3f {
            EXPLICIT_CUTOFF_DISABLED => ExplicitThreshold::Disabled,
            EXPLICIT_CUTOFF_AUTO => ExplicitThreshold::Auto,
            c => 1u32
                .checked_shl(u32::from(c) - 1)
                .map(ExplicitThreshold::Fixed)
                .ok_or(HllError::InvalidHeader("explicit cutoff out of range"))?,
        };
        Self::new(log2m, regwidth, explicit, sparse_enabled)
    }

    /// `alpha * m^2` from the HyperLogLog paper.
    pub(crate) fn alpha_m_squared(&self) -> f64 {
        let m = self.m();
        alpha(m) * (m as f64) * (m as f64)
    }

    /// Size of the hash space inspected by the registers, `2^(pw_bits + log2m)`.
    pub(crate) fn two_to_l(&self) -> f64 {
        let pw_bits = i32::from(self.max_register_value()) - 1;
        2f64.powi(pw_bits + i32::from(self.log2m))
    }
}

impl Default for HllSettings {
    fn default() -> Self {
        Self::production()
    }
}

/// Parameter for bias correction
#[inline]
fn alpha(m: usize) -> f64 {
    match m {
        16 => 0.673,
        32 => 0.697,
        64 => 0.709,
        _ => 0.7213 / (1.0 + 1.079 / (m as f64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_production_header_bytes() {
        let settings = HllSettings::production();
        assert_eq!(settings.parameters_byte(), 0x8e);
        assert_eq!(settings.cutoff_byte(), 0x40);
        assert_eq!(settings.m(), 16384);
        assert_eq!(settings.sparse_threshold(), 4096);
        assert_eq!(settings.explicit_threshold(), 0);
        assert_eq!(settings.full_data_len(), 10240);
    }

    #[test_case(ExplicitThreshold::Disabled; "explicit disabled")]
    #[test_case(ExplicitThreshold::Auto; "explicit auto")]
    #[test_case(ExplicitThreshold::Fixed(1); "explicit one")]
    #[test_case(ExplicitThreshold::Fixed(256); "explicit 256")]
    fn test_header_round_trip(explicit: ExplicitThreshold) {
        let settings = HllSettings::new(11, 6, explicit, false).unwrap();
        let parsed =
            HllSettings::from_header(settings.parameters_byte(), settings.cutoff_byte()).unwrap();
        assert_eq!(settings, parsed);
    }

    #[test_case(3, 5 => matches Err(HllError::InvalidLog2m(3)); "log2m too small")]
    #[test_case(31, 5 => matches Err(HllError::InvalidLog2m(31)); "log2m too large")]
    #[test_case(14, 0 => matches Err(HllError::InvalidRegwidth(0)); "regwidth zero")]
    #[test_case(14, 9 => matches Err(HllError::InvalidRegwidth(9)); "regwidth too large")]
    #[test_case(14, 5 => matches Ok(_); "production parameters")]
    fn test_validation(log2m: u8, regwidth: u8) -> Result<HllSettings, HllError> {
        HllSettings::new(log2m, regwidth, ExplicitThreshold::Disabled, true)
    }

    #[test]
    fn test_fixed_threshold_must_be_power_of_two() {
        let err = HllSettings::new(14, 5, ExplicitThreshold::Fixed(3), true).unwrap_err();
        assert!(matches!(err, HllError::InvalidExplicitThreshold(3)));
    }

    #[test]
    fn test_pw_max_mask_caps_register_value() {
        let settings = HllSettings::production();
        // only bits 30 and above are forced on, giving p(w) <= 31
        assert_eq!(settings.pw_max_mask(), !((1u64 << 30) - 1));
        assert_eq!(settings.two_to_l(), 2f64.powi(44));
    }
}
