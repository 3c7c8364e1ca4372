//! Sample buffer loader.
//!
//! Streams the `data` payload into a caller-owned [`SampleBuffer`]. The
//! buffer has a hard capacity; longer clips keep only their first `N`
//! samples and the load report says so.

use platform::storage::{read_fully, File};

use crate::log::log_warn;
use crate::wav::{SampleFormat, WaveInfo};

/// Default buffer capacity: 2.0 s of audio at 16 kHz.
pub const MAX_BUFFER_SIZE: usize = 32_000;

/// Stack scratch used for each storage read.
const SCRATCH_LEN: usize = 512;

/// Error from [`load_samples`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoadError<E: core::fmt::Debug> {
    /// The storage read failed.
    #[error("sample read failed: {0:?}")]
    Read(E),
    /// The file ended before the declared samples were read.
    #[error("short read: expected {expected} samples, got {got}")]
    ShortRead {
        /// Samples the loader set out to read.
        expected: u32,
        /// Whole samples actually read.
        got: u32,
    },
}

/// The clip was longer than the buffer; only a prefix was kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Truncation {
    /// Samples declared by the `data` chunk.
    pub declared: u32,
    /// Samples loaded (the buffer capacity).
    pub kept: u32,
}

/// Result of a successful load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LoadReport {
    /// Samples now in the buffer.
    pub loaded: u32,
    /// Set when the clip did not fit.
    pub truncation: Option<Truncation>,
}

/// Fixed-capacity sample store.
///
/// 16-bit clips are stored as read; 8-bit clips are stored zero-extended
/// (`0..=255`) and tagged [`SampleFormat::U8`] so the driver applies the
/// 8-bit scaler. At the default capacity this is 64 KB: on hardware keep it
/// in a `static`, not on a task stack.
pub struct SampleBuffer<const N: usize = MAX_BUFFER_SIZE> {
    samples: [i16; N],
    len: usize,
    format: SampleFormat,
}

impl<const N: usize> SampleBuffer<N> {
    /// Empty buffer; usable in `static` initialisers.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            samples: [0; N],
            len: 0,
            format: SampleFormat::I16,
        }
    }

    /// Maximum number of samples.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of loaded samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` when nothing is loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Encoding of the loaded samples.
    #[must_use]
    pub fn format(&self) -> SampleFormat {
        self.format
    }

    /// The loaded samples.
    #[must_use]
    pub fn as_slice(&self) -> &[i16] {
        self.samples.get(..self.len).unwrap_or(&[])
    }

    /// Drop all loaded samples.
    pub fn clear(&mut self) {
        self.len = 0;
    }
}

impl<const N: usize> Default for SampleBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Load `min(info.num_samples, N)` samples from `file` into `buffer`.
///
/// `file` must be positioned on the first `data` byte, as left by
/// [`parse_header`](crate::wav::parse_header). The cursor advances by the
/// bytes consumed; the file is not closed. On error the buffer is left empty.
///
/// # Errors
///
/// - [`LoadError::Read`] if the storage read fails.
/// - [`LoadError::ShortRead`] if the file ends early.
pub async fn load_samples<F: File, const N: usize>(
    file: &mut F,
    info: &WaveInfo,
    buffer: &mut SampleBuffer<N>,
) -> Result<LoadReport, LoadError<F::Error>> {
    buffer.clear();
    let format = info.format();
    buffer.format = format;

    let declared = usize::try_from(info.num_samples).unwrap_or(usize::MAX);
    let kept = declared.min(N);
    let truncation = (declared > N).then(|| Truncation {
        declared: info.num_samples,
        kept: to_u32(kept),
    });
    if let Some(t) = truncation {
        log_warn!(
            "clip truncated: {} samples declared, {} kept",
            t.declared, t.kept
        );
    }

    let bytes_per_sample = usize::from(format.bytes_per_sample());
    let mut scratch = [0u8; SCRATCH_LEN];
    let mut filled = 0usize;

    while filled < kept {
        let want = kept
            .saturating_sub(filled)
            .saturating_mul(bytes_per_sample)
            .min(SCRATCH_LEN);
        let Some(chunk) = scratch.get_mut(..want) else {
            break;
        };
        let got = match read_fully(file, chunk).await {
            Ok(got) => got,
            Err(e) => {
                buffer.clear();
                return Err(LoadError::Read(e));
            }
        };
        let whole = got.checked_div(bytes_per_sample).unwrap_or(0);
        let src = chunk.get(..whole.saturating_mul(bytes_per_sample)).unwrap_or(&[]);
        let dst = buffer
            .samples
            .get_mut(filled..filled.saturating_add(whole))
            .unwrap_or(&mut []);
        decode_into(format, src, dst);
        filled = filled.saturating_add(whole);

        if got < want {
            buffer.clear();
            return Err(LoadError::ShortRead {
                expected: to_u32(kept),
                got: to_u32(filled),
            });
        }
    }

    buffer.len = filled;
    Ok(LoadReport {
        loaded: to_u32(filled),
        truncation,
    })
}

fn decode_into(format: SampleFormat, src: &[u8], dst: &mut [i16]) {
    match format {
        SampleFormat::U8 => {
            for (out, &b) in dst.iter_mut().zip(src) {
                *out = i16::from(b);
            }
        }
        SampleFormat::I16 => {
            for (out, pair) in dst.iter_mut().zip(src.chunks_exact(2)) {
                if let [lo, hi] = *pair {
                    *out = i16::from_le_bytes([lo, hi]);
                }
            }
        }
    }
}

fn to_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
