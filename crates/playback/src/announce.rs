//! Spoken announcements built from per-character clips.
//!
//! A grid square such as `CN87` is spoken one character at a time, each from
//! its own clip: `/male/c_bwh_16.wav`, `/male/n_bwh_16.wav`, ... A [`Voice`]
//! names the folder and file-name suffix of one speaker's clip set.

use core::fmt::Write as _;

use embedded_hal_async::delay::DelayNs;
use platform::config::{DEFAULT_VOICE_FOLDER, DEFAULT_VOICE_SUFFIX};
use platform::storage::{File, Storage, MAX_NAME_LEN};
use platform::DacOutput;

use crate::audio_qspi::{AudioError, AudioQspi, AudioResult};
use crate::log::{debug, log_warn};

/// One speaker's clip set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Voice<'a> {
    /// Folder holding the clips, e.g. `/male`.
    pub folder: &'a str,
    /// Text after the character, e.g. `_bwh_16.wav`.
    pub suffix: &'a str,
}

impl Default for Voice<'static> {
    fn default() -> Self {
        Self {
            folder: DEFAULT_VOICE_FOLDER,
            suffix: DEFAULT_VOICE_SUFFIX,
        }
    }
}

impl Voice<'_> {
    /// Clip path for `ch`, or `None` if `ch` is not ASCII alphanumeric or
    /// the path would exceed the 31-byte name limit.
    #[must_use]
    pub fn clip_path(&self, ch: char) -> Option<heapless::String<MAX_NAME_LEN>> {
        if !ch.is_ascii_alphanumeric() {
            return None;
        }
        let mut path = heapless::String::new();
        write!(
            path,
            "{}/{}{}",
            self.folder.trim_end_matches('/'),
            ch.to_ascii_lowercase(),
            self.suffix
        )
        .ok()?;
        Some(path)
    }
}

/// Result of an announcement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AnnounceReport {
    /// Characters whose clip played.
    pub spoken: u32,
    /// Characters skipped: not speakable, no clip, or an unplayable clip.
    pub skipped: u32,
}

impl<S, D, T, const N: usize> AudioQspi<'_, S, D, T, N>
where
    S: Storage,
    S::File: File<Error = S::Error>,
    D: DacOutput,
    T: DelayNs,
{
    /// Speak `text` one character at a time in `voice`.
    ///
    /// Whitespace is ignored. Other characters without a clip, and clips
    /// that are missing or unplayable, are counted as skipped and the rest
    /// of the text is still spoken.
    ///
    /// # Errors
    ///
    /// Aborts on [`AudioError::NotMounted`], [`AudioError::Storage`] and
    /// [`AudioError::DacFault`]; these would fail every following clip too.
    pub async fn announce(&mut self, text: &str, voice: Voice<'_>) -> AudioResult<AnnounceReport, S, D> {
        self.announce_with_gap(text, voice, 0).await
    }

    /// Like [`announce`](Self::announce), with `gap_ms` of silence between
    /// characters.
    ///
    /// # Errors
    ///
    /// Same as [`announce`](Self::announce).
    pub async fn announce_with_gap(
        &mut self,
        text: &str,
        voice: Voice<'_>,
        gap_ms: u32,
    ) -> AudioResult<AnnounceReport, S, D> {
        let mut report = AnnounceReport::default();
        let mut first = true;

        for ch in text.chars() {
            let Some(path) = voice.clip_path(ch) else {
                if !ch.is_whitespace() {
                    report.skipped = report.skipped.saturating_add(1);
                }
                continue;
            };

            if !first && gap_ms > 0 {
                self.pause_ms(gap_ms).await;
            }
            first = false;

            match self.play(&path).await {
                Ok(_) => report.spoken = report.spoken.saturating_add(1),
                Err(
                    AudioError::NotFound
                    | AudioError::Format(_)
                    | AudioError::Unsupported(_)
                    | AudioError::Read(_),
                ) => {
                    log_warn!("announce: skipping clip {}", path.as_str());
                    report.skipped = report.skipped.saturating_add(1);
                }
                Err(e) => return Err(e),
            }
        }

        debug!("announce: {} spoken, {} skipped", report.spoken, report.skipped);
        Ok(report)
    }
}
