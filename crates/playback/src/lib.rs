//! Speech-clip playback: WAV parsing, sample staging and timed DAC output
//!
//! ```text
//! AudioQspi ── parse_header ── load_samples ── PlaybackDriver ── DacOutput
//!     │                                              │
//!   Storage                                       DelayNs
//! ```
#![cfg_attr(not(test), no_std)]
#![deny(clippy::unwrap_used)]
#![allow(async_fn_in_trait)]

mod log;

pub mod announce;
pub mod audio_qspi;
pub mod driver;
pub mod loader;
pub mod scale;
pub mod wav;

pub use announce::{AnnounceReport, Voice};
pub use audio_qspi::{AudioError, AudioQspi, AudioResult, PlayReport};
pub use driver::{
    CancelToken, DriverError, DriverState, PlaybackDriver, PlaybackOutcome, PlaybackReport,
};
pub use loader::{load_samples, LoadError, LoadReport, SampleBuffer, Truncation, MAX_BUFFER_SIZE};
pub use scale::{scale_16bit_to_dac, scale_8bit_to_dac, scale_float_to_dac, scale_sample};
pub use wav::{parse_header, FormatError, SampleFormat, UnsupportedFormat, WavError, WaveInfo};

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::cast_possible_truncation
)]
mod tests {
    /// Minimal WAV writer shared by the unit tests.
    pub(crate) fn wav(rate: u32, bits: u16, channels: u16, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data.len() as u32).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&rate.to_le_bytes());
        let block = channels * bits / 8;
        out.extend_from_slice(&(rate * u32::from(block)).to_le_bytes());
        out.extend_from_slice(&block.to_le_bytes());
        out.extend_from_slice(&bits.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(data);
        out
    }

    /// Scaler boundary tests
    mod scale_tests {
        use crate::scale::*;
        use crate::wav::SampleFormat;

        #[test]
        fn test_8bit_rails() {
            assert_eq!(scale_8bit_to_dac(0).get(), 0);
            assert_eq!(scale_8bit_to_dac(255).get(), 4095);
            // 128 * 4095 / 255 = 2055.53
            assert_eq!(scale_8bit_to_dac(128).get(), 2056);
        }

        #[test]
        fn test_16bit_rails() {
            assert_eq!(scale_16bit_to_dac(i16::MIN).get(), 0);
            assert_eq!(scale_16bit_to_dac(i16::MAX).get(), 4095);
            assert_eq!(scale_16bit_to_dac(0).get(), 2048);
        }

        #[test]
        fn test_float_rails_and_clamp() {
            assert_eq!(scale_float_to_dac(-1.0).get(), 0);
            assert_eq!(scale_float_to_dac(1.0).get(), 4095);
            assert_eq!(scale_float_to_dac(0.0).get(), 2048);
            assert_eq!(scale_float_to_dac(-7.5).get(), 0);
            assert_eq!(scale_float_to_dac(3.0).get(), 4095);
            assert_eq!(scale_float_to_dac(f32::INFINITY).get(), 4095);
            assert_eq!(scale_float_to_dac(f32::NAN).get(), 0);
        }

        #[test]
        fn test_scale_sample_selects_scaler() {
            assert_eq!(scale_sample(SampleFormat::U8, 255).get(), 4095);
            assert_eq!(scale_sample(SampleFormat::I16, 255).get(), 2063);
            assert_eq!(scale_sample(SampleFormat::U8, -4).get(), 0);
            assert_eq!(scale_sample(SampleFormat::U8, 999).get(), 4095);
        }
    }

    /// Header parser tests
    mod wav_tests {
        use super::wav;
        use crate::wav::*;
        use platform::mocks::MockStorage;
        use platform::{File, Storage};

        async fn parse(bytes: Vec<u8>) -> Result<WaveInfo, WavError<platform::mocks::MockStorageError>> {
            let mut storage = MockStorage::new().with_file("/t.wav", bytes);
            let mut file = storage.open_file("/t.wav").await.unwrap();
            parse_header(&mut file, "/t.wav").await
        }

        #[tokio::test]
        async fn test_parse_16bit_mono() {
            let info = parse(wav(16_000, 16, 1, &[0u8; 200])).await.unwrap();
            assert_eq!(info.samples_per_sec, 16_000);
            assert_eq!(info.bytes_per_sample, 2);
            assert_eq!(info.num_samples, 100);
            assert_eq!(info.holdtime, 63);
            assert_eq!(info.filesize, 244);
            assert_eq!(info.data_offset, 44);
            assert_eq!(info.filename.as_str(), "/t.wav");
            assert_eq!(info.format(), SampleFormat::I16);
        }

        #[tokio::test]
        async fn test_parse_8bit_mono() {
            let info = parse(wav(8_000, 8, 1, &[128u8; 81])).await.unwrap();
            assert_eq!(info.bytes_per_sample, 1);
            assert_eq!(info.num_samples, 81);
            assert_eq!(info.holdtime, 125);
            assert_eq!(info.duration_ms(), 10);
        }

        #[tokio::test]
        async fn test_cursor_left_on_payload() {
            let mut storage =
                MockStorage::new().with_file("/t.wav", wav(16_000, 16, 1, &[0xAB, 0xCD]));
            let mut file = storage.open_file("/t.wav").await.unwrap();
            parse_header(&mut file, "/t.wav").await.unwrap();
            let mut next = [0u8; 2];
            assert_eq!(file.read(&mut next).await.unwrap(), 2);
            assert_eq!(next, [0xAB, 0xCD]);
        }

        #[tokio::test]
        async fn test_missing_riff() {
            let mut bytes = wav(16_000, 16, 1, &[0u8; 4]);
            bytes[0..4].copy_from_slice(b"RIFX");
            assert_eq!(
                parse(bytes).await,
                Err(WavError::Format(FormatError::MissingRiff))
            );
            assert_eq!(
                parse(b"RIF".to_vec()).await,
                Err(WavError::Format(FormatError::MissingRiff))
            );
        }

        #[tokio::test]
        async fn test_missing_wave() {
            let mut bytes = wav(16_000, 16, 1, &[0u8; 4]);
            bytes[8..12].copy_from_slice(b"AVI ");
            assert_eq!(
                parse(bytes).await,
                Err(WavError::Format(FormatError::MissingWave))
            );
        }

        #[tokio::test]
        async fn test_stereo_unsupported() {
            assert_eq!(
                parse(wav(16_000, 16, 2, &[0u8; 8])).await,
                Err(WavError::Unsupported(UnsupportedFormat::Channels(2)))
            );
        }

        #[tokio::test]
        async fn test_24bit_unsupported() {
            assert_eq!(
                parse(wav(16_000, 24, 1, &[0u8; 6])).await,
                Err(WavError::Unsupported(UnsupportedFormat::BitsPerSample(24)))
            );
        }

        #[tokio::test]
        async fn test_float_format_unsupported() {
            let mut bytes = wav(16_000, 16, 1, &[0u8; 4]);
            bytes[20..22].copy_from_slice(&3u16.to_le_bytes());
            assert_eq!(
                parse(bytes).await,
                Err(WavError::Unsupported(UnsupportedFormat::NotPcm(3)))
            );
        }

        #[tokio::test]
        async fn test_zero_rate_is_format_error() {
            assert_eq!(
                parse(wav(0, 16, 1, &[0u8; 4])).await,
                Err(WavError::Format(FormatError::ZeroSampleRate))
            );
        }

        #[tokio::test]
        async fn test_truncated_payload_is_short_data() {
            let mut bytes = wav(16_000, 16, 1, &[0u8; 10]);
            bytes.truncate(bytes.len() - 4);
            assert_eq!(
                parse(bytes).await,
                Err(WavError::ShortData {
                    declared: 5,
                    available: 3
                })
            );
        }

        #[tokio::test]
        async fn test_fmt_without_data_is_missing_data() {
            let mut bytes = wav(16_000, 16, 1, &[]);
            // RIFF header (12) + fmt chunk (8 + 16); drop the data chunk.
            bytes.truncate(36);
            assert_eq!(
                parse(bytes).await,
                Err(WavError::Format(FormatError::MissingData))
            );
        }

        #[tokio::test]
        async fn test_list_only_is_missing_fmt() {
            let mut bytes = Vec::new();
            bytes.extend_from_slice(b"RIFF");
            bytes.extend_from_slice(&16u32.to_le_bytes());
            bytes.extend_from_slice(b"WAVE");
            bytes.extend_from_slice(b"LIST");
            bytes.extend_from_slice(&4u32.to_le_bytes());
            bytes.extend_from_slice(b"INFO");
            assert_eq!(
                parse(bytes).await,
                Err(WavError::Format(FormatError::MissingFmt))
            );
        }

        #[tokio::test]
        async fn test_data_without_fmt_is_missing_fmt() {
            let mut bytes = Vec::new();
            bytes.extend_from_slice(b"RIFF");
            bytes.extend_from_slice(&14u32.to_le_bytes());
            bytes.extend_from_slice(b"WAVE");
            bytes.extend_from_slice(b"data");
            bytes.extend_from_slice(&2u32.to_le_bytes());
            bytes.extend_from_slice(&[0, 0]);
            assert_eq!(
                parse(bytes).await,
                Err(WavError::Format(FormatError::MissingFmt))
            );
        }

        #[tokio::test]
        async fn test_short_fmt_rejected() {
            let mut bytes = wav(16_000, 16, 1, &[0u8; 4]);
            bytes[16..20].copy_from_slice(&14u32.to_le_bytes());
            assert_eq!(
                parse(bytes).await,
                Err(WavError::Format(FormatError::FmtTooShort))
            );
        }
    }

    /// Driver state machine tests
    mod driver_tests {
        use crate::driver::*;
        use crate::wav::SampleFormat;
        use platform::mocks::{MockDac, MockDelay};

        #[tokio::test]
        async fn test_driver_runs_once() {
            let mut dac = MockDac::new();
            let mut delay = MockDelay::new();
            let mut driver = PlaybackDriver::new(&mut dac, &mut delay, 63);
            assert_eq!(driver.state(), DriverState::Ready);
            let report = driver.run(&[0, 1, 2], SampleFormat::I16).await.unwrap();
            assert_eq!(report.samples_written, 3);
            assert_eq!(report.outcome, PlaybackOutcome::Completed);
            assert_eq!(driver.state(), DriverState::Done);
            assert_eq!(
                driver.run(&[0], SampleFormat::I16).await,
                Err(DriverError::NotReady)
            );
        }

        #[tokio::test]
        async fn test_every_sample_is_held() {
            let mut dac = MockDac::new();
            let mut delay = MockDelay::new();
            PlaybackDriver::new(&mut dac, &mut delay, 125)
                .run(&[10, 20, 30, 40], SampleFormat::U8)
                .await
                .unwrap();
            assert_eq!(delay.holds_us(), vec![125; 4]);
            assert_eq!(dac.values().len(), 4);
        }

        #[tokio::test]
        async fn test_empty_buffer_completes() {
            let mut dac = MockDac::new();
            let mut delay = MockDelay::new();
            let report = PlaybackDriver::new(&mut dac, &mut delay, 63)
                .run(&[], SampleFormat::I16)
                .await
                .unwrap();
            assert_eq!(report.samples_written, 0);
            assert_eq!(delay.count(), 0);
        }

        #[tokio::test]
        async fn test_dac_fault_aborts_without_hold() {
            let mut dac = MockDac::failing_at(2);
            let mut delay = MockDelay::new();
            let mut driver = PlaybackDriver::new(&mut dac, &mut delay, 63);
            let result = driver.run(&[0; 10], SampleFormat::I16).await;
            assert!(matches!(result, Err(DriverError::DacFault { index: 2, .. })));
            assert_eq!(driver.state(), DriverState::Done);
            assert_eq!(dac.attempts(), 3);
            assert_eq!(delay.count(), 2);
        }

        #[tokio::test]
        async fn test_preset_cancel_writes_one_sample() {
            let token = CancelToken::new();
            token.cancel();
            let mut dac = MockDac::new();
            let mut delay = MockDelay::new();
            let report = PlaybackDriver::new(&mut dac, &mut delay, 63)
                .with_cancel(&token)
                .run(&[0; 10], SampleFormat::I16)
                .await
                .unwrap();
            assert_eq!(report.outcome, PlaybackOutcome::Cancelled);
            assert_eq!(report.samples_written, 1);
            assert_eq!(delay.count(), 0);
        }

        #[tokio::test]
        async fn test_float_run_uses_float_scaler() {
            let mut dac = MockDac::new();
            let mut delay = MockDelay::new();
            PlaybackDriver::new(&mut dac, &mut delay, 63)
                .run_float(&[-1.0, 0.0, 1.0, 2.0])
                .await
                .unwrap();
            assert_eq!(dac.values(), vec![0, 2048, 4095, 4095]);
        }

        #[test]
        fn test_cancel_token_reset() {
            let token = CancelToken::new();
            token.cancel();
            assert!(token.is_cancelled());
            token.reset();
            assert!(!token.is_cancelled());
        }
    }

    /// Voice path tests
    mod voice_tests {
        use crate::announce::Voice;

        #[test]
        fn test_default_voice_path() {
            let path = Voice::default().clip_path('C').unwrap();
            assert_eq!(path.as_str(), "/male/c_bwh_16.wav");
        }

        #[test]
        fn test_digits_and_trailing_slash() {
            let voice = Voice {
                folder: "/female/",
                suffix: ".wav",
            };
            assert_eq!(voice.clip_path('7').unwrap().as_str(), "/female/7.wav");
        }

        #[test]
        fn test_unspeakable_characters() {
            let voice = Voice::default();
            assert!(voice.clip_path(' ').is_none());
            assert!(voice.clip_path('-').is_none());
            assert!(voice.clip_path('é').is_none());
        }

        #[test]
        fn test_overlong_path_rejected() {
            let voice = Voice {
                folder: "/a/folder/name/that/is/long",
                suffix: "_suffix.wav",
            };
            assert!(voice.clip_path('a').is_none());
        }
    }
}
