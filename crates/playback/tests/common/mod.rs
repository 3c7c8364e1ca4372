//! Shared fixtures for the playback integration tests.

#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::cast_possible_truncation,
    clippy::arithmetic_side_effects
)]

use platform::mocks::{MockDac, MockDelay, MockStorage};
use playback::{AudioQspi, SampleBuffer};

/// Player type used throughout the tests.
pub type TestPlayer<'b> = AudioQspi<'b, MockStorage, MockDac, MockDelay>;

/// Builder for mono PCM WAV files.
#[derive(Debug, Clone)]
pub struct WavBuilder {
    rate: u32,
    bits: u16,
    channels: u16,
    audio_format: u16,
    extra_chunks: Vec<([u8; 4], Vec<u8>)>,
    data: Vec<u8>,
}

impl WavBuilder {
    /// 16-bit mono PCM at `rate`.
    pub fn pcm16(rate: u32, samples: &[i16]) -> Self {
        Self {
            rate,
            bits: 16,
            channels: 1,
            audio_format: 1,
            extra_chunks: Vec::new(),
            data: samples.iter().flat_map(|s| s.to_le_bytes()).collect(),
        }
    }

    /// 8-bit mono PCM at `rate`.
    pub fn pcm8(rate: u32, samples: &[u8]) -> Self {
        Self {
            rate,
            bits: 8,
            channels: 1,
            audio_format: 1,
            extra_chunks: Vec::new(),
            data: samples.to_vec(),
        }
    }

    pub fn channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    pub fn audio_format(mut self, format: u16) -> Self {
        self.audio_format = format;
        self
    }

    /// Insert an extra chunk between `fmt ` and `data`.
    pub fn chunk(mut self, tag: &[u8; 4], body: &[u8]) -> Self {
        self.extra_chunks.push((*tag, body.to_vec()));
        self
    }

    fn fmt_chunk(&self) -> Vec<u8> {
        let block = self.channels * self.bits / 8;
        let mut out = Vec::new();
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&self.audio_format.to_le_bytes());
        out.extend_from_slice(&self.channels.to_le_bytes());
        out.extend_from_slice(&self.rate.to_le_bytes());
        out.extend_from_slice(&(self.rate * u32::from(block)).to_le_bytes());
        out.extend_from_slice(&block.to_le_bytes());
        out.extend_from_slice(&self.bits.to_le_bytes());
        out
    }

    fn data_chunk(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"data");
        out.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.data);
        out
    }

    fn wrap(body: Vec<u8>) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(4 + body.len() as u32).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(&body);
        out
    }

    /// Canonical order: `fmt `, extra chunks, `data`.
    pub fn build(&self) -> Vec<u8> {
        let mut body = self.fmt_chunk();
        for (tag, chunk) in &self.extra_chunks {
            body.extend_from_slice(tag);
            body.extend_from_slice(&(chunk.len() as u32).to_le_bytes());
            body.extend_from_slice(chunk);
            if chunk.len() % 2 == 1 {
                body.push(0);
            }
        }
        body.extend_from_slice(&self.data_chunk());
        Self::wrap(body)
    }

    /// `data` before `fmt `.
    pub fn build_data_first(&self) -> Vec<u8> {
        let mut body = self.data_chunk();
        if self.data.len() % 2 == 1 {
            body.push(0);
        }
        body.extend_from_slice(&self.fmt_chunk());
        Self::wrap(body)
    }
}

/// Rising 16-bit ramp covering most of the signed range.
pub fn ramp16(len: usize) -> Vec<i16> {
    let step = (65_536 / len.max(1)).max(1) as i32;
    (0..len as i32).map(|i| (i32::from(i16::MIN) + i * step) as i16).collect()
}

/// Fresh heap-allocated default-size buffer.
pub fn buffer() -> Box<SampleBuffer> {
    Box::new(SampleBuffer::new())
}

/// Mounted player over `storage`.
pub async fn mounted(storage: MockStorage, buffer: &mut SampleBuffer) -> TestPlayer<'_> {
    let mut player = AudioQspi::new(storage, MockDac::new(), MockDelay::new(), buffer);
    player.begin().await.unwrap();
    player
}
