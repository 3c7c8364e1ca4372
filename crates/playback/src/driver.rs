//! Playback driver.
//!
//! `PlaybackDriver` outputs one buffer of samples to the DAC at a fixed
//! rate. It runs exactly once: `Ready → Playing → Done`. Each sample is
//! scaled, written, checked against the cancel token, then held for the
//! clip's hold time. The hold is the only suspension point, so the caller's
//! future completes only when the whole buffer has played, the run was
//! cancelled, or the DAC failed.

use core::sync::atomic::{AtomicBool, Ordering};

use embedded_hal_async::delay::DelayNs;
use platform::{DacCode, DacOutput};

use crate::log::{debug, info, log_warn};
use crate::scale::{scale_float_to_dac, scale_sample};
use crate::wav::SampleFormat;

/// Driver lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriverState {
    /// Created, nothing written yet.
    Ready,
    /// Writing samples.
    Playing,
    /// Finished, cancelled or faulted; the driver cannot run again.
    Done,
}

/// Error from a driver run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriverError<E: core::fmt::Debug> {
    /// The driver has already run.
    #[error("driver already ran")]
    NotReady,
    /// The DAC rejected the write of sample `index`; playback stopped there.
    #[error("DAC fault at sample {index}: {error:?}")]
    DacFault {
        /// Zero-based index of the sample whose write failed.
        index: u32,
        /// Error reported by the DAC.
        error: E,
    },
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlaybackOutcome {
    /// Every sample was written and held.
    Completed,
    /// The cancel token was set.
    Cancelled,
}

/// Summary of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PlaybackReport {
    /// Samples latched onto the DAC.
    pub samples_written: u32,
    /// Completed or cancelled.
    pub outcome: PlaybackOutcome,
}

/// Request to stop playback early.
///
/// May be set from another task or an interrupt handler. The driver checks
/// it once per sample, after the write and before the hold.
#[derive(Debug, Default)]
pub struct CancelToken {
    cancelled: AtomicBool,
}

impl CancelToken {
    /// A token that is not set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
        }
    }

    /// Ask the current run to stop.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// `true` once [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Clear the token so it can guard another run.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::Release);
    }
}

/// One-shot sample output loop.
pub struct PlaybackDriver<'a, D, T> {
    dac: &'a mut D,
    delay: &'a mut T,
    hold_us: u32,
    cancel: Option<&'a CancelToken>,
    state: DriverState,
}

impl<'a, D, T> PlaybackDriver<'a, D, T>
where
    D: DacOutput,
    T: DelayNs,
{
    /// Driver holding every sample for `hold_us` microseconds.
    pub fn new(dac: &'a mut D, delay: &'a mut T, hold_us: u32) -> Self {
        Self {
            dac,
            delay,
            hold_us,
            cancel: None,
            state: DriverState::Ready,
        }
    }

    /// Stop early when `token` is set.
    #[must_use]
    pub fn with_cancel(mut self, token: &'a CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Play stored PCM samples of `format`, from index 0 to the end.
    ///
    /// # Errors
    ///
    /// - [`DriverError::NotReady`] if this driver already ran.
    /// - [`DriverError::DacFault`] if a DAC write fails.
    pub async fn run(
        &mut self,
        samples: &[i16],
        format: SampleFormat,
    ) -> Result<PlaybackReport, DriverError<D::Error>> {
        self.drive(samples.iter().map(|&s| scale_sample(format, s)))
            .await
    }

    /// Play normalised float samples (`-1.0..=1.0`, clamped).
    ///
    /// # Errors
    ///
    /// Same as [`run`](Self::run).
    pub async fn run_float(
        &mut self,
        samples: &[f32],
    ) -> Result<PlaybackReport, DriverError<D::Error>> {
        self.drive(samples.iter().map(|&s| scale_float_to_dac(s)))
            .await
    }

    async fn drive<I>(&mut self, codes: I) -> Result<PlaybackReport, DriverError<D::Error>>
    where
        I: Iterator<Item = DacCode>,
    {
        if self.state != DriverState::Ready {
            return Err(DriverError::NotReady);
        }
        self.state = DriverState::Playing;
        debug!("playback start, hold {} us", self.hold_us);

        let mut written: u32 = 0;
        for code in codes {
            if let Err(error) = self.dac.write(code) {
                self.state = DriverState::Done;
                log_warn!("DAC fault at sample {}", written);
                return Err(DriverError::DacFault {
                    index: written,
                    error,
                });
            }
            written = written.saturating_add(1);

            if self.cancel.is_some_and(CancelToken::is_cancelled) {
                self.state = DriverState::Done;
                info!("playback cancelled after {} samples", written);
                return Ok(PlaybackReport {
                    samples_written: written,
                    outcome: PlaybackOutcome::Cancelled,
                });
            }

            self.delay.delay_us(self.hold_us).await;
        }

        self.state = DriverState::Done;
        debug!("playback done, {} samples", written);
        Ok(PlaybackReport {
            samples_written: written,
            outcome: PlaybackOutcome::Completed,
        })
    }
}
