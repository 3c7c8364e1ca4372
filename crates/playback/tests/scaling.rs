//! Property tests for the sample → DAC code scalers.

#![allow(clippy::unwrap_used, clippy::cast_possible_truncation)]

use proptest::prelude::*;

use playback::{scale_16bit_to_dac, scale_8bit_to_dac, scale_float_to_dac, scale_sample, SampleFormat};

proptest! {
    #[test]
    fn scaled_codes_stay_within_12_bits(s8 in any::<u8>(), s16 in any::<i16>(), f in any::<f32>()) {
        prop_assert!(scale_8bit_to_dac(s8).get() <= 4095);
        prop_assert!(scale_16bit_to_dac(s16).get() <= 4095);
        prop_assert!(scale_float_to_dac(f).get() <= 4095);
    }

    #[test]
    fn sixteen_bit_matches_rounded_formula(s in any::<i16>()) {
        let exact = (f64::from(s) + 32_768.0) * 4095.0 / 65_535.0;
        let code = f64::from(scale_16bit_to_dac(s).get());
        prop_assert!((code - exact).abs() <= 0.5 + 1e-9);
    }

    #[test]
    fn eight_bit_matches_rounded_formula(s in any::<u8>()) {
        let exact = f64::from(s) * 4095.0 / 255.0;
        let code = f64::from(scale_8bit_to_dac(s).get());
        prop_assert!((code - exact).abs() <= 0.5 + 1e-9);
    }

    #[test]
    fn sixteen_bit_is_monotone(a in any::<i16>(), b in any::<i16>()) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(scale_16bit_to_dac(lo) <= scale_16bit_to_dac(hi));
    }

    #[test]
    fn float_in_range_is_within_one_code(f in -1.0f32..=1.0) {
        let exact = (f64::from(f) + 1.0) * 4095.0 / 2.0;
        let code = f64::from(scale_float_to_dac(f).get());
        prop_assert!((code - exact).abs() <= 1.0);
    }

    #[test]
    fn stored_8bit_sample_scales_like_raw_byte(s in any::<u8>()) {
        prop_assert_eq!(scale_sample(SampleFormat::U8, i16::from(s)), scale_8bit_to_dac(s));
    }
}
