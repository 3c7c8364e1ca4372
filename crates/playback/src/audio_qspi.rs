//! `AudioQspi`: clip playback from the QSPI flash.
//!
//! Ties the pieces together: storage mount, name lookup, header parse,
//! sample load and the playback driver. Every file handle is a local value
//! inside one call, so it is closed on every exit path, including `?`.
//!
//! # Example
//!
//! ```no_run
//! # async fn example() {
//! use platform::mocks::{MockDac, MockDelay, MockStorage};
//! use playback::{AudioQspi, SampleBuffer};
//!
//! let mut buffer: SampleBuffer = SampleBuffer::new();
//! let mut audio = AudioQspi::new(MockStorage::new(), MockDac::new(), MockDelay::new(), &mut buffer);
//! audio.begin().await.unwrap();
//! let report = audio.play("/male/c_bwh_16.wav").await.unwrap();
//! # let _ = report;
//! # }
//! ```

use embedded_hal_async::delay::DelayNs;
use platform::storage::{File, Storage, MAX_NAME_LEN};
use platform::{DacOutput, SampleRateHz};

use crate::driver::{CancelToken, DriverError, PlaybackDriver, PlaybackOutcome, PlaybackReport};
use crate::loader::{load_samples, LoadError, SampleBuffer, Truncation, MAX_BUFFER_SIZE};
use crate::log::{debug, info, log_warn};
use crate::wav::{parse_header, FormatError, UnsupportedFormat, WavError, WaveInfo};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Error from [`AudioQspi`] operations.
///
/// `SE` is the storage error, `DE` the DAC error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AudioError<SE: core::fmt::Debug, DE: core::fmt::Debug> {
    /// The flash or its file system could not be brought up.
    #[error("mount failed: {0:?}")]
    Mount(SE),
    /// `begin()` has not succeeded yet.
    #[error("storage not mounted")]
    NotMounted,
    /// Clip names are limited to 31 bytes.
    #[error("clip name longer than 31 bytes")]
    NameTooLong,
    /// No clip under that name.
    #[error("clip not found")]
    NotFound,
    /// Lookup or open failed in the storage layer.
    #[error("storage error: {0:?}")]
    Storage(SE),
    /// Malformed WAV container.
    #[error("malformed WAV: {0}")]
    Format(FormatError),
    /// Unsupported WAV content.
    #[error("unsupported WAV: {0}")]
    Unsupported(UnsupportedFormat),
    /// Reading the header or samples failed.
    #[error("read failed: {0:?}")]
    Read(LoadError<SE>),
    /// The DAC failed at sample `index`.
    #[error("DAC fault at sample {index}: {error:?}")]
    DacFault {
        /// Zero-based index of the failing sample.
        index: u32,
        /// Error reported by the DAC.
        error: DE,
    },
    /// The playback driver was reused.
    #[error("driver not ready")]
    NotReady,
}

impl<SE: core::fmt::Debug, DE: core::fmt::Debug> From<WavError<SE>> for AudioError<SE, DE> {
    fn from(e: WavError<SE>) -> Self {
        match e {
            WavError::Format(f) => Self::Format(f),
            WavError::Unsupported(u) => Self::Unsupported(u),
            WavError::Read(r) => Self::Read(LoadError::Read(r)),
            WavError::ShortData {
                declared,
                available,
            } => Self::Read(LoadError::ShortRead {
                expected: declared,
                got: available,
            }),
        }
    }
}

impl<SE: core::fmt::Debug, DE: core::fmt::Debug> From<LoadError<SE>> for AudioError<SE, DE> {
    fn from(e: LoadError<SE>) -> Self {
        Self::Read(e)
    }
}

impl<SE: core::fmt::Debug, DE: core::fmt::Debug> From<DriverError<DE>> for AudioError<SE, DE> {
    fn from(e: DriverError<DE>) -> Self {
        match e {
            DriverError::NotReady => Self::NotReady,
            DriverError::DacFault { index, error } => Self::DacFault { index, error },
        }
    }
}

/// Shorthand for the facade's result type.
pub type AudioResult<T, S, D> =
    Result<T, AudioError<<S as Storage>::Error, <D as DacOutput>::Error>>;

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Summary of a `play` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayReport {
    /// Header of the clip that played.
    pub info: WaveInfo,
    /// Samples written to the DAC.
    pub samples_played: u32,
    /// Set when the clip was longer than the buffer.
    pub truncation: Option<Truncation>,
    /// Completed or cancelled.
    pub outcome: PlaybackOutcome,
}

// ---------------------------------------------------------------------------
// AudioQspi
// ---------------------------------------------------------------------------

/// Speech-clip player over a [`Storage`], a [`DacOutput`] and a [`DelayNs`].
///
/// The sample buffer is lent by the caller so its size (and placement in
/// RAM) stays explicit; it is cleared on every load, nothing is cached
/// between calls.
///
/// The constraint `S::File: File<Error = S::Error>` lets open, read and seek
/// failures share one error variant.
pub struct AudioQspi<'b, S, D, T, const N: usize = MAX_BUFFER_SIZE>
where
    S: Storage,
    S::File: File<Error = S::Error>,
    D: DacOutput,
    T: DelayNs,
{
    storage: S,
    dac: D,
    delay: T,
    buffer: &'b mut SampleBuffer<N>,
    mounted: bool,
}

impl<'b, S, D, T, const N: usize> AudioQspi<'b, S, D, T, N>
where
    S: Storage,
    S::File: File<Error = S::Error>,
    D: DacOutput,
    T: DelayNs,
{
    /// Build an unmounted player. Call [`begin`](Self::begin) before use.
    pub fn new(storage: S, dac: D, delay: T, buffer: &'b mut SampleBuffer<N>) -> Self {
        Self {
            storage,
            dac,
            delay,
            buffer,
            mounted: false,
        }
    }

    /// Mount the clip storage.
    ///
    /// Calling it again after a successful mount is a no-op.
    ///
    /// # Errors
    ///
    /// [`AudioError::Mount`] if the chip or its file system is unavailable.
    pub async fn begin(&mut self) -> AudioResult<(), S, D> {
        if self.mounted {
            return Ok(());
        }
        self.storage.mount().await.map_err(AudioError::Mount)?;
        self.mounted = true;
        info!("clip storage mounted");
        Ok(())
    }

    /// `true` after a successful [`begin`](Self::begin).
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Parse the header of `name` without loading samples.
    ///
    /// # Errors
    ///
    /// [`AudioError::NotMounted`], [`AudioError::NameTooLong`],
    /// [`AudioError::NotFound`], [`AudioError::Storage`],
    /// [`AudioError::Format`], [`AudioError::Unsupported`] or
    /// [`AudioError::Read`].
    pub async fn get_info(&mut self, name: &str) -> AudioResult<WaveInfo, S, D> {
        let mut file = self.open(name).await?;
        let info = parse_header(&mut file, name).await?;
        Ok(info)
    }

    /// Play `name` to the end. Completes when the last sample's hold ends.
    ///
    /// # Errors
    ///
    /// Everything [`get_info`](Self::get_info) returns, plus
    /// [`AudioError::Read`] if sample loading fails and
    /// [`AudioError::DacFault`] if the DAC fails mid-clip.
    pub async fn play(&mut self, name: &str) -> AudioResult<PlayReport, S, D> {
        self.play_inner(name, None).await
    }

    /// Like [`play`](Self::play), but stops early once `token` is set.
    ///
    /// # Errors
    ///
    /// Same as [`play`](Self::play).
    pub async fn play_with_cancel(
        &mut self,
        name: &str,
        token: &CancelToken,
    ) -> AudioResult<PlayReport, S, D> {
        self.play_inner(name, Some(token)).await
    }

    /// Play a caller-synthesised buffer of normalised floats at `sample_rate`.
    ///
    /// Does not touch storage or the sample buffer.
    ///
    /// # Errors
    ///
    /// [`AudioError::Unsupported`] for a sample rate the player cannot pace,
    /// [`AudioError::DacFault`] if the DAC fails.
    pub async fn play_float(
        &mut self,
        samples: &[f32],
        sample_rate: u32,
    ) -> AudioResult<PlaybackReport, S, D> {
        let rate = SampleRateHz::new(sample_rate)
            .map_err(|_| AudioError::Unsupported(UnsupportedFormat::SampleRate(sample_rate)))?;
        let mut driver = PlaybackDriver::new(&mut self.dac, &mut self.delay, rate.hold_time_us());
        Ok(driver.run_float(samples).await?)
    }

    async fn play_inner(
        &mut self,
        name: &str,
        cancel: Option<&CancelToken>,
    ) -> AudioResult<PlayReport, S, D> {
        let mut file = self.open(name).await?;
        let info = parse_header(&mut file, name).await?;
        debug!(
            "clip {} rate {} Hz, {} samples, hold {} us",
            name, info.samples_per_sec, info.num_samples, info.holdtime
        );
        let load = load_samples(&mut file, &info, &mut *self.buffer).await?;
        // Samples are in RAM; release the handle before the long output loop.
        drop(file);

        let mut driver = PlaybackDriver::new(&mut self.dac, &mut self.delay, info.holdtime);
        if let Some(token) = cancel {
            driver = driver.with_cancel(token);
        }
        let report = driver
            .run(self.buffer.as_slice(), self.buffer.format())
            .await?;

        Ok(PlayReport {
            info,
            samples_played: report.samples_written,
            truncation: load.truncation,
            outcome: report.outcome,
        })
    }

    /// Hold the output for `ms` milliseconds between clips.
    pub(crate) async fn pause_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms).await;
    }

    /// Validate `name`, resolve it and open it.
    async fn open(&mut self, name: &str) -> AudioResult<S::File, S, D> {
        if !self.mounted {
            return Err(AudioError::NotMounted);
        }
        if name.len() > MAX_NAME_LEN {
            return Err(AudioError::NameTooLong);
        }
        if !self.storage.exists(name).await.map_err(AudioError::Storage)? {
            log_warn!("clip not found: {}", name);
            return Err(AudioError::NotFound);
        }
        self.storage.open_file(name).await.map_err(AudioError::Storage)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The clip storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// The clip storage, mutably.
    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// The DAC.
    pub fn dac(&self) -> &D {
        &self.dac
    }

    /// The sample pacer.
    pub fn delay(&self) -> &T {
        &self.delay
    }

    /// Samples left from the last successful load.
    pub fn buffer(&self) -> &SampleBuffer<N> {
        &*self.buffer
    }

    /// Give back the storage, DAC and delay.
    pub fn into_parts(self) -> (S, D, T) {
        (self.storage, self.dac, self.delay)
    }
}
