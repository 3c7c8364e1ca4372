//! Application configuration and constants
//!
//! Central configuration values for the clip player. Converter geometry,
//! accepted sample rates and default clip locations reference these
//! constants rather than hardcoding values.

/// DAC resolution in bits (SAMD51 DAC0).
pub const DAC_BITS: u8 = 12;

/// Highest DAC output code, `2^DAC_BITS - 1`.
pub const DAC_MAX_CODE: u16 = 4095;

/// Slowest clip sample rate the player accepts.
pub const MIN_SAMPLE_RATE_HZ: u32 = 1_000;

/// Fastest clip sample rate the player accepts (10 µs hold).
pub const MAX_SAMPLE_RATE_HZ: u32 = 100_000;

/// Sample rate the speech clips are recorded at.
pub const CLIP_SAMPLE_RATE_HZ: u32 = 16_000;

/// Folder holding the default speaker's clips.
pub const DEFAULT_VOICE_FOLDER: &str = "/male";

/// File-name suffix after the spoken character, e.g. `c_bwh_16.wav`.
pub const DEFAULT_VOICE_SUFFIX: &str = "_bwh_16.wav";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dac_max_code_is_12_bit() {
        assert_eq!(DAC_MAX_CODE, 4095);
    }

    #[test]
    fn clip_rate_is_in_accepted_range() {
        assert!((MIN_SAMPLE_RATE_HZ..=MAX_SAMPLE_RATE_HZ).contains(&CLIP_SAMPLE_RATE_HZ));
    }

    #[test]
    fn default_voice_folder_is_absolute() {
        assert!(DEFAULT_VOICE_FOLDER.starts_with('/'));
        assert!(DEFAULT_VOICE_SUFFIX.ends_with(".wav"));
    }
}
