//! Sample → 12-bit DAC code conversion.
//!
//! All three scalers are total: out-of-range input clamps, it never fails.
//! Integer scalers round half up with exact integer arithmetic.

use platform::config::DAC_MAX_CODE;
use platform::DacCode;

use crate::wav::SampleFormat;

const FULL: u32 = DAC_MAX_CODE as u32;

/// 8-bit unsigned PCM → DAC code: `round(s * 4095 / 255)`.
#[must_use]
pub fn scale_8bit_to_dac(sample: u8) -> DacCode {
    // 255 * 4095 + 127 fits easily in u32; the divisor is a non-zero constant.
    #[allow(clippy::arithmetic_side_effects, clippy::cast_possible_truncation)]
    let code = ((u32::from(sample) * FULL + 127) / 255) as u16;
    DacCode::new(code)
}

/// 16-bit signed PCM → DAC code: `round((s + 32768) * 4095 / 65535)`.
#[must_use]
pub fn scale_16bit_to_dac(sample: i16) -> DacCode {
    // Flipping the sign bit of the two's-complement pattern adds 32768.
    let shifted = u32::from(u16::from_ne_bytes(sample.to_ne_bytes()) ^ 0x8000);
    // 65535 * 4095 + 32767 < u32::MAX; the divisor is a non-zero constant.
    #[allow(clippy::arithmetic_side_effects, clippy::cast_possible_truncation)]
    let code = ((shifted * FULL + 32_767) / 65_535) as u16;
    DacCode::new(code)
}

/// Normalised float → DAC code: `round((s + 1.0) * 4095 / 2.0)`, clamped.
///
/// Input outside `[-1.0, 1.0]` clamps to the rails; NaN maps to 0.
#[must_use]
pub fn scale_float_to_dac(sample: f32) -> DacCode {
    if sample.is_nan() {
        return DacCode::MIN;
    }
    let full = f32::from(DAC_MAX_CODE);
    let scaled = ((sample + 1.0) * full / 2.0).clamp(0.0, full);
    // scaled is in [0, 4095]; adding 0.5 then truncating rounds half up.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let code = (scaled + 0.5) as u16;
    DacCode::new(code)
}

/// Scale one stored sample according to the buffer's format.
///
/// 8-bit samples are stored zero-extended; anything outside `0..=255`
/// clamps to the nearest rail.
#[must_use]
pub fn scale_sample(format: SampleFormat, sample: i16) -> DacCode {
    match format {
        SampleFormat::U8 => {
            let byte = u8::try_from(sample).unwrap_or(if sample < 0 { 0 } else { u8::MAX });
            scale_8bit_to_dac(byte)
        }
        SampleFormat::I16 => scale_16bit_to_dac(sample),
    }
}
