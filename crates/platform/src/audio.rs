//! DAC output abstraction
//!
//! The speech clips are played on a single 12-bit DAC channel (SAMD51 `A0`).
//! Writes are plain register stores on that part, so [`DacOutput::write`] is
//! synchronous; pacing between writes belongs to the caller.

use crate::audio_types::DacCode;

/// Single-channel DAC used for clip playback.
pub trait DacOutput {
    /// Error type
    type Error: core::fmt::Debug;

    /// Latch `code` onto the analogue output.
    ///
    /// An error means the converter is faulted; callers abort playback
    /// instead of retrying.
    fn write(&mut self, code: DacCode) -> Result<(), Self::Error>;
}

impl<T: DacOutput + ?Sized> DacOutput for &mut T {
    type Error = T::Error;

    fn write(&mut self, code: DacCode) -> Result<(), Self::Error> {
        T::write(self, code)
    }
}
