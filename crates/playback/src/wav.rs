//! RIFF/WAVE header parser.
//!
//! Reads the container header straight from a [`File`] and leaves the cursor
//! on the first byte of the `data` payload. Only mono integer PCM at 8 or 16
//! bits is accepted; the player drives a single DAC channel.
//!
//! ```text
//! [0..4]   "RIFF"
//! [4..8]   riff size    u32 le
//! [8..12]  "WAVE"
//! [12..]   sub-chunks:  tag [4] + len u32 le + payload (+1 pad byte if len is odd)
//!
//! "fmt " payload (first 16 bytes):
//! [0..2]   audio format u16 le (1 = PCM)
//! [2..4]   channels     u16 le
//! [4..8]   sample rate  u32 le
//! [8..12]  byte rate    u32 le
//! [12..14] block align  u16 le
//! [14..16] bits/sample  u16 le
//! ```

use platform::storage::{read_fully, File};
use platform::SampleRateHz;

use crate::log::debug;

/// Longest clip name kept in [`WaveInfo::filename`].
pub const NAME_CAPACITY: usize = 32;

const RIFF_HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: u64 = 8;
const FMT_BODY_LEN: usize = 16;
const WAVE_FORMAT_PCM: u16 = 1;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// The file is not a well-formed RIFF/WAVE container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FormatError {
    /// Bytes `[0..4]` are not `RIFF`, or the file is shorter than 12 bytes.
    #[error("missing RIFF tag")]
    MissingRiff,
    /// Bytes `[8..12]` are not `WAVE`.
    #[error("missing WAVE tag")]
    MissingWave,
    /// No `fmt ` sub-chunk before end of file.
    #[error("missing fmt chunk")]
    MissingFmt,
    /// The `fmt ` sub-chunk is shorter than 16 bytes.
    #[error("fmt chunk too short")]
    FmtTooShort,
    /// The `fmt ` sub-chunk follows the `data` sub-chunk.
    #[error("fmt chunk after data chunk")]
    FmtAfterData,
    /// No `data` sub-chunk before end of file.
    #[error("missing data chunk")]
    MissingData,
    /// The `fmt ` sub-chunk declares a sample rate of zero.
    #[error("sample rate is zero")]
    ZeroSampleRate,
}

/// The file is valid WAV but not something the player can output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UnsupportedFormat {
    /// Audio format code other than 1 (integer PCM).
    #[error("audio format {0} is not PCM")]
    NotPcm(u16),
    /// More than one channel (or zero).
    #[error("{0} channels, only mono is supported")]
    Channels(u16),
    /// Bits per sample other than 8 or 16.
    #[error("{0} bits per sample, only 8 and 16 are supported")]
    BitsPerSample(u16),
    /// Sample rate outside the pacing range of the player.
    #[error("sample rate {0} Hz out of range")]
    SampleRate(u32),
}

/// Error from [`parse_header`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WavError<E: core::fmt::Debug> {
    /// Malformed container.
    #[error("malformed WAV: {0}")]
    Format(FormatError),
    /// Valid container, unsupported content.
    #[error("unsupported WAV: {0}")]
    Unsupported(UnsupportedFormat),
    /// The storage read or seek failed.
    #[error("read failed: {0:?}")]
    Read(E),
    /// The file ends before the samples its `data` chunk declares.
    #[error("file truncated: {declared} samples declared, {available} present")]
    ShortData {
        /// Samples declared by the `data` chunk.
        declared: u32,
        /// Whole samples between the payload start and end of file.
        available: u32,
    },
}

impl<E: core::fmt::Debug> From<FormatError> for WavError<E> {
    fn from(e: FormatError) -> Self {
        Self::Format(e)
    }
}

impl<E: core::fmt::Debug> From<UnsupportedFormat> for WavError<E> {
    fn from(e: UnsupportedFormat) -> Self {
        Self::Unsupported(e)
    }
}

// ---------------------------------------------------------------------------
// WaveInfo
// ---------------------------------------------------------------------------

/// PCM encoding of the samples in a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleFormat {
    /// 8-bit unsigned, silence at 128.
    U8,
    /// 16-bit signed little-endian, silence at 0.
    I16,
}

impl SampleFormat {
    /// Map a `bits per sample` field to a format.
    #[must_use]
    pub fn from_bits(bits: u16) -> Option<Self> {
        match bits {
            8 => Some(Self::U8),
            16 => Some(Self::I16),
            _ => None,
        }
    }

    /// Bytes per stored sample (1 or 2).
    #[must_use]
    pub const fn bytes_per_sample(self) -> u8 {
        match self {
            Self::U8 => 1,
            Self::I16 => 2,
        }
    }
}

/// Descriptor of one clip, rebuilt on every `get_info`/`play`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveInfo {
    /// Clip name as requested, e.g. `/male/c_bwh_16.wav`.
    pub filename: heapless::String<NAME_CAPACITY>,
    /// Total file size in bytes.
    pub filesize: u32,
    /// Sample rate in Hz.
    pub samples_per_sec: u32,
    /// 1 for 8-bit clips, 2 for 16-bit clips.
    pub bytes_per_sample: u8,
    /// Samples in the `data` chunk.
    pub num_samples: u32,
    /// Microseconds each sample is held, `round(1e6 / samples_per_sec)`.
    pub holdtime: u32,
    /// File offset of the first `data` payload byte.
    pub data_offset: u32,
}

impl WaveInfo {
    /// Sample encoding derived from `bytes_per_sample`.
    #[must_use]
    pub fn format(&self) -> SampleFormat {
        if self.bytes_per_sample == 1 {
            SampleFormat::U8
        } else {
            SampleFormat::I16
        }
    }

    /// Clip length in milliseconds, rounded down.
    #[must_use]
    pub fn duration_ms(&self) -> u32 {
        let ms = u64::from(self.num_samples)
            .saturating_mul(1_000)
            .checked_div(u64::from(self.samples_per_sec))
            .unwrap_or(0);
        u32::try_from(ms).unwrap_or(u32::MAX)
    }
}

/// Fields of the `fmt ` chunk the player uses.
#[derive(Debug, Clone, Copy)]
struct FmtChunk {
    format: SampleFormat,
    rate: SampleRateHz,
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Read and validate the WAV header of `file`.
///
/// On success the cursor sits on the first `data` payload byte. Chunks other
/// than `fmt ` and `data` (`LIST`, `fact`, ...) are skipped, including the pad
/// byte after odd-sized chunks.
///
/// # Errors
///
/// - [`WavError::Format`] for a malformed container.
/// - [`WavError::Unsupported`] for non-PCM, non-mono or non-8/16-bit content.
/// - [`WavError::Read`] if the storage fails.
/// - [`WavError::ShortData`] if the file ends inside the `data` payload.
pub async fn parse_header<F: File>(
    file: &mut F,
    name: &str,
) -> Result<WaveInfo, WavError<F::Error>> {
    let file_size = file.size();

    file.seek(0).await.map_err(WavError::Read)?;
    let mut riff = [0u8; RIFF_HEADER_LEN];
    let n = read_fully(file, &mut riff).await.map_err(WavError::Read)?;
    if n < RIFF_HEADER_LEN || riff.get(0..4) != Some(b"RIFF".as_slice()) {
        return Err(FormatError::MissingRiff.into());
    }
    if riff.get(8..12) != Some(b"WAVE".as_slice()) {
        return Err(FormatError::MissingWave.into());
    }

    let mut pos = RIFF_HEADER_LEN as u64;
    let mut fmt: Option<FmtChunk> = None;
    let mut data_seen = false;

    loop {
        let mut header = [0u8; CHUNK_HEADER_LEN as usize];
        let n = read_fully(file, &mut header).await.map_err(WavError::Read)?;
        if n < header.len() {
            // End of file inside the chunk list.
            return Err(match fmt {
                None => FormatError::MissingFmt,
                Some(_) => FormatError::MissingData,
            }
            .into());
        }
        let (tag, len) = split_chunk_header(&header);
        let body = pos.saturating_add(CHUNK_HEADER_LEN);

        match &tag {
            b"fmt " => {
                if data_seen {
                    return Err(FormatError::FmtAfterData.into());
                }
                fmt = Some(read_fmt(file, len).await?);
            }
            b"data" if !data_seen => {
                if let Some(fmt) = fmt {
                    if body.saturating_add(u64::from(len)) > file_size {
                        return Err(short_data(fmt, len, file_size.saturating_sub(body)));
                    }
                    // Cursor is already on the payload.
                    return Ok(build_info(name, file_size, fmt, len, body));
                }
                // Keep scanning so a late fmt chunk is told apart from none.
                data_seen = true;
            }
            _ => {}
        }

        pos = body
            .saturating_add(u64::from(len))
            .saturating_add(u64::from(len & 1));
        file.seek(pos).await.map_err(WavError::Read)?;
    }
}

/// Split an 8-byte chunk header into tag and declared length.
fn split_chunk_header(header: &[u8; CHUNK_HEADER_LEN as usize]) -> ([u8; 4], u32) {
    let [t0, t1, t2, t3, l0, l1, l2, l3] = *header;
    ([t0, t1, t2, t3], u32::from_le_bytes([l0, l1, l2, l3]))
}

async fn read_fmt<F: File>(file: &mut F, len: u32) -> Result<FmtChunk, WavError<F::Error>> {
    if len < FMT_BODY_LEN as u32 {
        return Err(FormatError::FmtTooShort.into());
    }
    let mut body = [0u8; FMT_BODY_LEN];
    let n = read_fully(file, &mut body).await.map_err(WavError::Read)?;
    if n < FMT_BODY_LEN {
        return Err(FormatError::FmtTooShort.into());
    }
    let [f0, f1, c0, c1, r0, r1, r2, r3, _, _, _, _, _, _, b0, b1] = body;
    let audio_format = u16::from_le_bytes([f0, f1]);
    let channels = u16::from_le_bytes([c0, c1]);
    let sample_rate = u32::from_le_bytes([r0, r1, r2, r3]);
    let bits = u16::from_le_bytes([b0, b1]);

    debug!(
        "fmt chunk: format {} channels {} rate {} bits {}",
        audio_format, channels, sample_rate, bits
    );

    if audio_format != WAVE_FORMAT_PCM {
        return Err(UnsupportedFormat::NotPcm(audio_format).into());
    }
    if channels != 1 {
        return Err(UnsupportedFormat::Channels(channels).into());
    }
    let format = SampleFormat::from_bits(bits).ok_or(UnsupportedFormat::BitsPerSample(bits))?;
    if sample_rate == 0 {
        return Err(FormatError::ZeroSampleRate.into());
    }
    let rate =
        SampleRateHz::new(sample_rate).map_err(|_| UnsupportedFormat::SampleRate(sample_rate))?;
    Ok(FmtChunk { format, rate })
}

fn build_info(name: &str, file_size: u64, fmt: FmtChunk, data_len: u32, data_offset: u64) -> WaveInfo {
    let bytes_per_sample = fmt.format.bytes_per_sample();
    WaveInfo {
        filename: bounded_name(name),
        filesize: u32::try_from(file_size).unwrap_or(u32::MAX),
        samples_per_sec: fmt.rate.get(),
        bytes_per_sample,
        num_samples: data_len
            .checked_div(u32::from(bytes_per_sample))
            .unwrap_or(0),
        holdtime: fmt.rate.hold_time_us(),
        data_offset: u32::try_from(data_offset).unwrap_or(u32::MAX),
    }
}

fn short_data<E: core::fmt::Debug>(fmt: FmtChunk, data_len: u32, present: u64) -> WavError<E> {
    let bytes_per_sample = fmt.format.bytes_per_sample();
    let available = present
        .checked_div(u64::from(bytes_per_sample))
        .unwrap_or(0);
    WavError::ShortData {
        declared: data_len
            .checked_div(u32::from(bytes_per_sample))
            .unwrap_or(0),
        available: u32::try_from(available).unwrap_or(u32::MAX),
    }
}

/// Copy `name` into a bounded string, cutting on a char boundary if needed.
pub(crate) fn bounded_name(name: &str) -> heapless::String<NAME_CAPACITY> {
    let mut out = heapless::String::new();
    for ch in name.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}
