//! Hardware Abstraction Layer (HAL) for the Griduino speech-clip player
//!
//! This crate provides trait-based abstractions for the hardware the clip
//! player touches, enabling development and testing without a board.
//!
//! # Architecture Layers
//!
//! ```text
//! Application Layer (grid-square display firmware)
//!         ↓
//! Feature Layer (playback: WAV parsing, AudioQspi, announcer)
//!         ↓
//! Platform HAL (this crate - trait abstractions)
//!         ↓
//! Hardware Layer (SAMD51 HAL: QSPI XiP window, DAC0, TC timer)
//! ```
//!
//! # Abstractions
//!
//! - [`Storage`] / [`File`] - clip file access (mount, open, read, seek)
//! - [`DacOutput`] - 12-bit converter output
//! - [`PacedDelay`] - drift-free sample hold on embassy-time
//! - [`FlashClipStorage`] - clip table on QSPI NOR flash
//!
//! # Features
//!
//! - `std`: local-directory storage and host mocks
//! - `hardware`: XiP flash window constructor
//! - `defmt`: Enable defmt formatting of platform types
//!
//! # Example
//!
//! ```no_run
//! use platform::{File, Storage};
//!
//! async fn clip_len<S: Storage>(storage: &mut S) -> Result<u64, S::Error> {
//!     storage.mount().await?;
//!     let file = storage.open_file("/male/c_bwh_16.wav").await?;
//!     Ok(file.size())
//! }
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
// Pedantic lints suppressed for this hardware HAL crate:
#![allow(clippy::doc_markdown)] // hex addresses and register names in doc comments
#![allow(clippy::must_use_candidate)] // hardware accessors — callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(async_fn_in_trait)] // Embassy no_std: single-threaded, Send bounds not needed

pub mod audio;
pub mod audio_types;
pub mod clip_table;
pub mod config;
pub mod qspi_config;
pub mod storage;
pub mod storage_flash;
pub mod timing;

#[cfg(any(test, feature = "std"))]
pub mod storage_local;

#[cfg(any(test, feature = "std"))]
pub mod mocks;

// Re-export main high-level traits
pub use audio::DacOutput;
pub use audio_types::{DacCode, OutOfRangeError, SampleRateHz};
pub use storage::{read_fully, File, Storage, MAX_NAME_LEN};

// Re-export clip store types
pub use clip_table::{ClipEntry, ClipTableError, ClipTableHeader};
#[cfg(any(test, feature = "std"))]
pub use clip_table::build_image;
pub use qspi_config::MappedFlash;
pub use storage_flash::{FlashClipFile, FlashClipStorage, FlashStorageError};
pub use timing::PacedDelay;
