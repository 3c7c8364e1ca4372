//! Audio domain newtypes for compile-time safety.
//!
//! These zero-cost abstractions prevent common errors:
//! - `DacCode`: clamps to the 12-bit converter range, prevents register overflow
//! - `SampleRateHz`: validates the clip sample-rate range and derives hold time

use crate::config::{DAC_MAX_CODE, MAX_SAMPLE_RATE_HZ, MIN_SAMPLE_RATE_HZ};

// ── Error type ───────────────────────────────────────────────────────────────

/// Error returned when a value is out of the valid range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[error("value {value} outside {min}..={max}")]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutOfRangeError {
    /// The value that was out of range.
    pub value: u32,
    /// The inclusive minimum allowed value.
    pub min: u32,
    /// The inclusive maximum allowed value.
    pub max: u32,
}

// ── DacCode ──────────────────────────────────────────────────────────────────

/// Output code for the 12-bit DAC, `0..=4095`.
///
/// `0` drives the pin to 0 V, `4095` to full scale (3.3 V on the Feather M4).
/// Construct with [`DacCode::new`] (clamping) or [`DacCode::try_new`]
/// (fallible, strict).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct DacCode(u16);

impl DacCode {
    /// Lowest output code (0 V).
    pub const MIN: Self = Self(0);
    /// Highest output code (full scale).
    pub const MAX: Self = Self(DAC_MAX_CODE);
    /// Mid-rail code, the resting level of an AC-coupled speaker output.
    pub const MID: Self = Self(DAC_MAX_CODE / 2);

    /// Create a `DacCode`, clamping values above 4095 to 4095.
    #[must_use]
    pub const fn new(value: u16) -> Self {
        if value > DAC_MAX_CODE {
            Self(DAC_MAX_CODE)
        } else {
            Self(value)
        }
    }

    /// Create a `DacCode`, returning an error if `value > 4095`.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] if `value > 4095`.
    pub fn try_new(value: u16) -> Result<Self, OutOfRangeError> {
        if value > DAC_MAX_CODE {
            Err(OutOfRangeError {
                value: u32::from(value),
                min: 0,
                max: u32::from(DAC_MAX_CODE),
            })
        } else {
            Ok(Self(value))
        }
    }

    /// Return the raw register value.
    #[must_use]
    pub const fn get(self) -> u16 {
        self.0
    }
}

// ── SampleRateHz ─────────────────────────────────────────────────────────────

/// Clip sample rate in Hz.
///
/// Valid range: 1000–100000 Hz. The upper bound keeps the per-sample hold
/// at 10 µs or more, which the timer-driven pacing can still honour; speech
/// clips are recorded at 16 kHz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct SampleRateHz(u32);

impl SampleRateHz {
    /// Minimum supported sample rate.
    pub const MIN_HZ: u32 = MIN_SAMPLE_RATE_HZ;

    /// Maximum supported sample rate.
    pub const MAX_HZ: u32 = MAX_SAMPLE_RATE_HZ;

    /// Create a `SampleRateHz`, returning an error if out of range.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] if `hz < MIN_HZ` or `hz > MAX_HZ`.
    pub fn new(hz: u32) -> Result<Self, OutOfRangeError> {
        if hz < Self::MIN_HZ || hz > Self::MAX_HZ {
            Err(OutOfRangeError {
                value: hz,
                min: Self::MIN_HZ,
                max: Self::MAX_HZ,
            })
        } else {
            Ok(Self(hz))
        }
    }

    /// Return the sample rate in Hz.
    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }

    /// Microseconds each sample is held on the DAC: `round(1_000_000 / hz)`.
    ///
    /// 16 kHz → 63 µs (62.5 rounds half-up). Never zero inside the valid range.
    #[must_use]
    pub fn hold_time_us(self) -> u32 {
        // hz >= MIN_HZ > 0, so the division is defined; the numerator cannot
        // overflow because hz / 2 <= 50_000.
        #[allow(clippy::arithmetic_side_effects)]
        let hold = (1_000_000 + self.0 / 2) / self.0;
        hold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dac_code_new_clamps() {
        assert_eq!(DacCode::new(5000).get(), 4095);
        assert_eq!(DacCode::new(4095).get(), 4095);
        assert_eq!(DacCode::new(0).get(), 0);
    }

    #[test]
    fn dac_code_try_new_rejects_over_range() {
        assert!(DacCode::try_new(4096).is_err());
        assert_eq!(DacCode::try_new(2048).map(DacCode::get), Ok(2048));
    }

    #[test]
    fn dac_code_mid_is_half_scale() {
        assert_eq!(DacCode::MID.get(), 2047);
    }

    #[test]
    fn hold_time_at_16khz_rounds_to_63() {
        let rate = SampleRateHz::new(16_000).map(SampleRateHz::hold_time_us);
        assert_eq!(rate, Ok(63));
    }

    #[test]
    fn hold_time_at_8khz_is_exact() {
        let rate = SampleRateHz::new(8_000).map(SampleRateHz::hold_time_us);
        assert_eq!(rate, Ok(125));
    }

    #[test]
    fn hold_time_at_44100_rounds_to_23() {
        // 1e6 / 44100 = 22.68 → 23
        let rate = SampleRateHz::new(44_100).map(SampleRateHz::hold_time_us);
        assert_eq!(rate, Ok(23));
    }

    #[test]
    fn sample_rate_rejects_zero() {
        assert!(SampleRateHz::new(0).is_err());
    }
}
