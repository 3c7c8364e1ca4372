//! End-to-end tests for `AudioQspi` over the host mocks.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::cast_possible_truncation
)]

mod common;

use common::{buffer, mounted, ramp16, WavBuilder};
use platform::mocks::{MockDac, MockDacFault, MockDelay, MockStorage, MockStorageError};
use platform::{DacCode, DacOutput};
use playback::{
    AudioError, AudioQspi, CancelToken, FormatError, LoadError, PlaybackOutcome, Truncation,
    UnsupportedFormat,
};

const CLIP: &str = "/male/c_bwh_16.wav";

fn expected_16bit(sample: i16) -> i32 {
    ((f64::from(sample) + 32_768.0) * 4095.0 / 65_535.0).round() as i32
}

// ── Happy path ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn one_second_ramp_plays_every_sample_in_order() {
    let samples = ramp16(16_000);
    let storage = MockStorage::new().with_file(CLIP, WavBuilder::pcm16(16_000, &samples).build());
    let mut buf = buffer();
    let mut player = mounted(storage, &mut buf).await;

    let report = player.play(CLIP).await.unwrap();
    assert_eq!(report.samples_played, 16_000);
    assert_eq!(report.outcome, PlaybackOutcome::Completed);
    assert_eq!(report.truncation, None);
    assert_eq!(report.info.holdtime, 63);

    let values = player.dac().values();
    assert_eq!(values.len(), 16_000);
    for (value, sample) in values.iter().zip(&samples) {
        assert!((i32::from(*value) - expected_16bit(*sample)).abs() <= 1);
    }
    assert!(values.windows(2).all(|w| w[0] <= w[1]));

    let holds = player.delay().holds_us();
    assert_eq!(holds.len(), 16_000);
    assert!(holds.iter().all(|&h| h == 63));
    assert_eq!(player.storage().open_handles(), 0);
}

#[tokio::test]
async fn eight_bit_clip_hits_both_rails() {
    let storage = MockStorage::new().with_file(CLIP, WavBuilder::pcm8(8_000, &[0, 128, 255]).build());
    let mut buf = buffer();
    let mut player = mounted(storage, &mut buf).await;

    let report = player.play(CLIP).await.unwrap();
    assert_eq!(report.info.bytes_per_sample, 1);
    assert_eq!(player.dac().values(), vec![0, 2056, 4095]);
    assert_eq!(player.delay().holds_us(), vec![125; 3]);
}

#[tokio::test]
async fn long_clip_is_truncated_to_buffer_capacity() {
    let samples = ramp16(48_000);
    let storage = MockStorage::new().with_file(CLIP, WavBuilder::pcm16(16_000, &samples).build());
    let mut buf = buffer();
    let mut player = mounted(storage, &mut buf).await;

    let report = player.play(CLIP).await.unwrap();
    assert_eq!(report.info.num_samples, 48_000);
    assert_eq!(
        report.truncation,
        Some(Truncation {
            declared: 48_000,
            kept: 32_000
        })
    );
    assert_eq!(report.samples_played, 32_000);
    assert_eq!(player.buffer().len(), 32_000);
    assert_eq!(player.dac().values().len(), 32_000);
    assert_eq!(player.buffer().as_slice()[..4], samples[..4]);
}

#[tokio::test]
async fn get_info_reads_header_only() {
    let samples = vec![0i16; 1_000];
    let storage = MockStorage::new().with_file(CLIP, WavBuilder::pcm16(16_000, &samples).build());
    let mut buf = buffer();
    let mut player = mounted(storage, &mut buf).await;

    let info = player.get_info(CLIP).await.unwrap();
    assert_eq!(info.filename.as_str(), CLIP);
    assert_eq!(info.filesize, 44 + 2_000);
    assert_eq!(info.samples_per_sec, 16_000);
    assert_eq!(info.bytes_per_sample, 2);
    assert_eq!(info.num_samples, 1_000);
    assert_eq!(info.holdtime, 63);
    assert!(player.dac().values().is_empty());
    assert!(player.buffer().is_empty());
    assert_eq!(player.storage().open_handles(), 0);
}

#[tokio::test]
async fn odd_sized_list_chunk_is_skipped() {
    let samples = [100i16, -100, 7];
    let wav = WavBuilder::pcm16(16_000, &samples)
        .chunk(b"LIST", b"INFOabc")
        .build();
    let storage = MockStorage::new().with_file(CLIP, wav);
    let mut buf = buffer();
    let mut player = mounted(storage, &mut buf).await;

    let report = player.play(CLIP).await.unwrap();
    assert_eq!(report.samples_played, 3);
    assert_eq!(report.info.data_offset, 44 + 8 + 8);
    assert_eq!(player.buffer().as_slice(), &samples);
}

#[tokio::test]
async fn handles_are_returned_between_plays() {
    let storage = MockStorage::new()
        .with_file(CLIP, WavBuilder::pcm16(16_000, &[0; 16]).build())
        .max_handles(1);
    let mut buf = buffer();
    let mut player = mounted(storage, &mut buf).await;

    for _ in 0..3 {
        player.play(CLIP).await.unwrap();
        assert_eq!(player.storage().open_handles(), 0);
    }
    assert_eq!(player.dac().values().len(), 48);
}

// ── Lifecycle ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn begin_is_idempotent() {
    let mut buf = buffer();
    let mut player = mounted(MockStorage::new(), &mut buf).await;
    player.begin().await.unwrap();
    assert!(player.is_mounted());
    assert_eq!(player.storage().mount_calls(), 1);
}

#[tokio::test]
async fn calls_before_begin_are_rejected() {
    let storage = MockStorage::new().with_file(CLIP, WavBuilder::pcm16(16_000, &[0; 4]).build());
    let mut buf = buffer();
    let mut player = AudioQspi::new(storage, MockDac::new(), MockDelay::new(), &mut *buf);
    assert_eq!(player.get_info(CLIP).await.err(), Some(AudioError::NotMounted));
    assert!(matches!(player.play(CLIP).await, Err(AudioError::NotMounted)));
    assert_eq!(player.storage().open_handles(), 0);
}

#[tokio::test]
async fn mount_failure_is_reported_and_retryable() {
    let mut buf = buffer();
    let mut player = AudioQspi::new(
        MockStorage::new().failing_mount(),
        MockDac::new(),
        MockDelay::new(),
        &mut *buf,
    );
    assert_eq!(
        player.begin().await,
        Err(AudioError::Mount(MockStorageError::MountFailed))
    );
    assert!(!player.is_mounted());
    assert!(player.begin().await.is_err());
    assert_eq!(player.storage().mount_calls(), 2);
}

// ── Failure paths ────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_clip_is_not_found() {
    let mut buf = buffer();
    let mut player = mounted(MockStorage::new(), &mut buf).await;
    assert_eq!(player.get_info("/male/q.wav").await.err(), Some(AudioError::NotFound));
    assert!(matches!(player.play("/male/q.wav").await, Err(AudioError::NotFound)));
    assert_eq!(player.storage().open_handles(), 0);
}

#[tokio::test]
async fn overlong_name_is_rejected_before_lookup() {
    let mut buf = buffer();
    let mut player = mounted(MockStorage::new(), &mut buf).await;
    let name = "/male/this_name_is_far_too_long.wav";
    assert!(name.len() > 31);
    assert_eq!(player.get_info(name).await.err(), Some(AudioError::NameTooLong));
}

#[tokio::test]
async fn malformed_headers_are_format_errors() {
    let mut not_riff = WavBuilder::pcm16(16_000, &[0; 4]).build();
    not_riff[0..4].copy_from_slice(b"RIFX");
    let mut not_wave = WavBuilder::pcm16(16_000, &[0; 4]).build();
    not_wave[8..12].copy_from_slice(b"WAVX");
    let data_first = WavBuilder::pcm16(16_000, &[0; 4]).build_data_first();

    let storage = MockStorage::new()
        .with_file("/riff.wav", not_riff)
        .with_file("/wave.wav", not_wave)
        .with_file("/order.wav", data_first);
    let mut buf = buffer();
    let mut player = mounted(storage, &mut buf).await;

    assert_eq!(
        player.get_info("/riff.wav").await.err(),
        Some(AudioError::Format(FormatError::MissingRiff))
    );
    assert_eq!(
        player.get_info("/wave.wav").await.err(),
        Some(AudioError::Format(FormatError::MissingWave))
    );
    assert_eq!(
        player.get_info("/order.wav").await.err(),
        Some(AudioError::Format(FormatError::FmtAfterData))
    );
    assert!(matches!(
        player.play("/riff.wav").await,
        Err(AudioError::Format(FormatError::MissingRiff))
    ));
    assert!(player.dac().values().is_empty());
    assert_eq!(player.storage().open_handles(), 0);
}

#[tokio::test]
async fn unsupported_content_is_rejected() {
    let stereo = WavBuilder::pcm16(16_000, &[0; 4]).channels(2).build();
    let float = WavBuilder::pcm16(16_000, &[0; 4]).audio_format(3).build();
    let slow = WavBuilder::pcm16(500, &[0; 4]).build();
    let storage = MockStorage::new()
        .with_file("/stereo.wav", stereo)
        .with_file("/float.wav", float)
        .with_file("/slow.wav", slow);
    let mut buf = buffer();
    let mut player = mounted(storage, &mut buf).await;

    assert!(matches!(
        player.play("/stereo.wav").await,
        Err(AudioError::Unsupported(UnsupportedFormat::Channels(2)))
    ));
    assert!(matches!(
        player.play("/float.wav").await,
        Err(AudioError::Unsupported(UnsupportedFormat::NotPcm(3)))
    ));
    assert!(matches!(
        player.play("/slow.wav").await,
        Err(AudioError::Unsupported(UnsupportedFormat::SampleRate(500)))
    ));
    assert!(player.dac().values().is_empty());
    assert_eq!(player.storage().open_handles(), 0);
}

#[tokio::test]
async fn short_read_empties_buffer_and_closes_file() {
    let storage = MockStorage::new()
        .with_file(CLIP, WavBuilder::pcm16(16_000, &[0; 1_000]).build())
        .short_read_at(44 + 100);
    let mut buf = buffer();
    let mut player = mounted(storage, &mut buf).await;

    assert!(matches!(
        player.play(CLIP).await,
        Err(AudioError::Read(LoadError::ShortRead {
            expected: 1_000,
            got: 50
        }))
    ));
    assert!(player.buffer().is_empty());
    assert!(player.dac().values().is_empty());
    assert_eq!(player.storage().open_handles(), 0);
}

#[tokio::test]
async fn truncated_file_is_a_read_error() {
    let mut bytes = WavBuilder::pcm16(16_000, &[0; 100]).build();
    bytes.truncate(bytes.len() - 40);
    let storage = MockStorage::new().with_file(CLIP, bytes);
    let mut buf = buffer();
    let mut player = mounted(storage, &mut buf).await;

    assert_eq!(
        player.get_info(CLIP).await.err(),
        Some(AudioError::Read(LoadError::ShortRead {
            expected: 100,
            got: 80
        }))
    );
    assert!(matches!(
        player.play(CLIP).await,
        Err(AudioError::Read(LoadError::ShortRead {
            expected: 100,
            got: 80
        }))
    ));
    assert!(player.dac().values().is_empty());
    assert_eq!(player.storage().open_handles(), 0);
}

#[tokio::test]
async fn rejected_header_leaves_previous_samples_in_place() {
    let good = [100i16, -100, 2_000, -2_000];
    let mut no_data = WavBuilder::pcm16(16_000, &[]).build();
    // RIFF header (12) + fmt chunk (24); the data chunk is cut off.
    no_data.truncate(36);
    let mut not_riff = WavBuilder::pcm16(16_000, &[7; 8]).build();
    not_riff[0..4].copy_from_slice(b"RIFX");
    let storage = MockStorage::new()
        .with_file("/good.wav", WavBuilder::pcm16(16_000, &good).build())
        .with_file("/no_data.wav", no_data)
        .with_file("/not_riff.wav", not_riff);
    let mut buf = buffer();
    let mut player = mounted(storage, &mut buf).await;

    player.play("/good.wav").await.unwrap();
    assert_eq!(player.buffer().as_slice(), &good);

    assert!(matches!(
        player.play("/no_data.wav").await,
        Err(AudioError::Format(FormatError::MissingData))
    ));
    assert_eq!(player.buffer().as_slice(), &good);

    assert!(matches!(
        player.play("/not_riff.wav").await,
        Err(AudioError::Format(FormatError::MissingRiff))
    ));
    assert_eq!(player.buffer().as_slice(), &good);
    assert_eq!(player.dac().values().len(), good.len());
    assert_eq!(player.storage().open_handles(), 0);
}

#[tokio::test]
async fn storage_read_error_is_propagated() {
    let storage = MockStorage::new()
        .with_file(CLIP, WavBuilder::pcm16(16_000, &[0; 1_000]).build())
        .read_error_at(100);
    let mut buf = buffer();
    let mut player = mounted(storage, &mut buf).await;

    assert!(matches!(
        player.play(CLIP).await,
        Err(AudioError::Read(LoadError::Read(MockStorageError::Io)))
    ));
    assert_eq!(player.storage().open_handles(), 0);
}

#[tokio::test]
async fn dac_fault_stops_playback_at_failing_sample() {
    let storage = MockStorage::new().with_file(CLIP, WavBuilder::pcm16(16_000, &[0; 100]).build());
    let mut buf = buffer();
    let mut player = AudioQspi::new(storage, MockDac::failing_at(5), MockDelay::new(), &mut *buf);
    player.begin().await.unwrap();

    assert!(matches!(
        player.play(CLIP).await,
        Err(AudioError::DacFault {
            index: 5,
            error: MockDacFault { attempt: 5 }
        })
    ));
    assert_eq!(player.dac().attempts(), 6);
    assert_eq!(player.dac().values().len(), 5);
    assert_eq!(player.delay().count(), 5);
    assert_eq!(player.storage().open_handles(), 0);
}

// ── Cancellation ─────────────────────────────────────────────────────────────

/// DAC that sets a cancel token once it has latched `after` samples.
struct CancellingDac<'t> {
    inner: MockDac,
    token: &'t CancelToken,
    after: usize,
}

impl DacOutput for CancellingDac<'_> {
    type Error = MockDacFault;

    fn write(&mut self, code: DacCode) -> Result<(), Self::Error> {
        let result = self.inner.write(code);
        if self.inner.attempts() == self.after {
            self.token.cancel();
        }
        result
    }
}

#[tokio::test]
async fn cancel_stops_after_current_sample() {
    let token = CancelToken::new();
    let dac = CancellingDac {
        inner: MockDac::new(),
        token: &token,
        after: 10,
    };
    let storage = MockStorage::new().with_file(CLIP, WavBuilder::pcm16(16_000, &[0; 100]).build());
    let mut buf = buffer();
    let mut player = AudioQspi::new(storage, dac, MockDelay::new(), &mut *buf);
    player.begin().await.unwrap();

    let report = player.play_with_cancel(CLIP, &token).await.unwrap();
    assert_eq!(report.outcome, PlaybackOutcome::Cancelled);
    assert_eq!(report.samples_played, 10);
    assert_eq!(player.dac().inner.values().len(), 10);
    assert_eq!(player.delay().count(), 9);
    assert_eq!(player.storage().open_handles(), 0);
}

// ── Synthesised output ───────────────────────────────────────────────────────

#[tokio::test]
async fn float_buffer_plays_at_requested_rate() {
    let mut buf = buffer();
    let mut player = mounted(MockStorage::new(), &mut buf).await;
    let report = player.play_float(&[-1.0, 0.0, 1.0], 8_000).await.unwrap();
    assert_eq!(report.samples_written, 3);
    assert_eq!(player.dac().values(), vec![0, 2048, 4095]);
    assert_eq!(player.delay().holds_us(), vec![125; 3]);
}

#[tokio::test]
async fn float_buffer_rejects_unpaceable_rate() {
    let mut buf = buffer();
    let mut player = mounted(MockStorage::new(), &mut buf).await;
    assert_eq!(
        player.play_float(&[0.0], 200_000).await,
        Err(AudioError::Unsupported(UnsupportedFormat::SampleRate(200_000)))
    );
    assert!(player.dac().values().is_empty());
}
