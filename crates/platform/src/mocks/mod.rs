//! Mock implementations for testing
//!
//! In-memory stand-ins for the storage, DAC and delay traits. They record
//! what the player did so tests can assert on exact sample sequences, hold
//! times and handle lifetimes, and they can inject the failures the player
//! must survive.

#![cfg(any(test, feature = "std"))]

use std::cell::Cell;
use std::rc::Rc;
use std::string::String;
use std::vec::Vec;

use embedded_hal_async::delay::DelayNs;

use crate::audio::DacOutput;
use crate::audio_types::DacCode;
use crate::storage::{File, Storage};

// ── DAC ──────────────────────────────────────────────────────────────────────

/// Error returned by [`MockDac`] when a fault is injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockDacFault {
    /// Zero-based index of the failing write attempt.
    pub attempt: usize,
}

/// Mock DAC recording every latched code.
#[derive(Debug, Default)]
pub struct MockDac {
    codes: Vec<DacCode>,
    attempts: usize,
    fail_at: Option<usize>,
}

impl MockDac {
    /// Create a DAC that accepts every write.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a DAC whose write attempt number `attempt` (zero-based) fails.
    pub fn failing_at(attempt: usize) -> Self {
        Self {
            fail_at: Some(attempt),
            ..Self::default()
        }
    }

    /// Codes written so far, in order.
    pub fn codes(&self) -> &[DacCode] {
        &self.codes
    }

    /// Raw register values written so far.
    pub fn values(&self) -> Vec<u16> {
        self.codes.iter().map(|c| c.get()).collect()
    }

    /// Number of write calls, including a failed one.
    pub fn attempts(&self) -> usize {
        self.attempts
    }
}

impl DacOutput for MockDac {
    type Error = MockDacFault;

    fn write(&mut self, code: DacCode) -> Result<(), Self::Error> {
        let attempt = self.attempts;
        self.attempts = self.attempts.saturating_add(1);
        if self.fail_at == Some(attempt) {
            return Err(MockDacFault { attempt });
        }
        self.codes.push(code);
        Ok(())
    }
}

// ── Delay ────────────────────────────────────────────────────────────────────

/// Mock delay that returns immediately and records each requested hold.
#[derive(Debug, Default)]
pub struct MockDelay {
    holds_ns: Vec<u64>,
}

impl MockDelay {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requested holds in microseconds, in order.
    pub fn holds_us(&self) -> Vec<u64> {
        self.holds_ns.iter().map(|ns| ns / 1_000).collect()
    }

    /// Number of holds requested.
    pub fn count(&self) -> usize {
        self.holds_ns.len()
    }

    /// Sum of all requested holds in microseconds.
    pub fn total_us(&self) -> u64 {
        self.holds_ns.iter().sum::<u64>() / 1_000
    }
}

impl DelayNs for MockDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.holds_ns.push(u64::from(ns));
    }

    async fn delay_us(&mut self, us: u32) {
        self.holds_ns.push(u64::from(us).saturating_mul(1_000));
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.holds_ns.push(u64::from(ms).saturating_mul(1_000_000));
    }
}

// ── Storage ──────────────────────────────────────────────────────────────────

/// Errors produced by [`MockStorage`] and [`MockFile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockStorageError {
    /// Injected mount failure (chip absent).
    MountFailed,
    /// No file under that name.
    NotFound,
    /// Every handle slot is in use.
    TooManyHandles,
    /// Injected read failure.
    Io,
}

/// In-memory file system with a bounded handle pool.
///
/// Open handles are counted through a shared counter that [`MockFile`]
/// decrements on drop, so tests can assert that no path leaks a handle.
#[derive(Debug)]
pub struct MockStorage {
    files: Vec<(String, Rc<[u8]>)>,
    open_handles: Rc<Cell<usize>>,
    max_handles: usize,
    mount_calls: usize,
    fail_mount: bool,
    short_read_at: Option<usize>,
    read_error_at: Option<usize>,
}

impl Default for MockStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStorage {
    /// Empty storage with four handle slots.
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            open_handles: Rc::new(Cell::new(0)),
            max_handles: 4,
            mount_calls: 0,
            fail_mount: false,
            short_read_at: None,
            read_error_at: None,
        }
    }

    /// Add (or replace) a file.
    #[must_use]
    pub fn with_file(mut self, name: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(name, bytes);
        self
    }

    /// Add (or replace) a file in place.
    pub fn insert(&mut self, name: &str, bytes: impl Into<Vec<u8>>) {
        let data: Rc<[u8]> = Rc::from(bytes.into());
        self.files.retain(|(n, _)| n != name);
        self.files.push((String::from(name), data));
    }

    /// Make every `mount` call fail.
    #[must_use]
    pub fn failing_mount(mut self) -> Self {
        self.fail_mount = true;
        self
    }

    /// Files opened from now on report end of file at byte `offset`,
    /// even though `size()` still reports the full length.
    #[must_use]
    pub fn short_read_at(mut self, offset: usize) -> Self {
        self.short_read_at = Some(offset);
        self
    }

    /// Files opened from now on fail any read that reaches byte `offset`.
    #[must_use]
    pub fn read_error_at(mut self, offset: usize) -> Self {
        self.read_error_at = Some(offset);
        self
    }

    /// Limit the number of simultaneously open handles.
    #[must_use]
    pub fn max_handles(mut self, max: usize) -> Self {
        self.max_handles = max;
        self
    }

    /// Handles currently open.
    pub fn open_handles(&self) -> usize {
        self.open_handles.get()
    }

    /// Number of `mount` calls seen.
    pub fn mount_calls(&self) -> usize {
        self.mount_calls
    }

    fn lookup(&self, path: &str) -> Option<&Rc<[u8]>> {
        self.files.iter().find(|(n, _)| n == path).map(|(_, d)| d)
    }
}

impl Storage for MockStorage {
    type Error = MockStorageError;
    type File = MockFile;

    async fn mount(&mut self) -> Result<(), Self::Error> {
        self.mount_calls = self.mount_calls.saturating_add(1);
        if self.fail_mount {
            Err(MockStorageError::MountFailed)
        } else {
            Ok(())
        }
    }

    async fn open_file(&mut self, path: &str) -> Result<Self::File, Self::Error> {
        let data = self.lookup(path).cloned().ok_or(MockStorageError::NotFound)?;
        let open = self.open_handles.get();
        if open >= self.max_handles {
            return Err(MockStorageError::TooManyHandles);
        }
        self.open_handles.set(open.saturating_add(1));
        Ok(MockFile {
            data,
            pos: 0,
            handles: Rc::clone(&self.open_handles),
            short_read_at: self.short_read_at,
            read_error_at: self.read_error_at,
        })
    }

    async fn exists(&mut self, path: &str) -> Result<bool, Self::Error> {
        Ok(self.lookup(path).is_some())
    }
}

/// Handle into a [`MockStorage`] file. Dropping it frees the handle slot.
#[derive(Debug)]
pub struct MockFile {
    data: Rc<[u8]>,
    pos: usize,
    handles: Rc<Cell<usize>>,
    short_read_at: Option<usize>,
    read_error_at: Option<usize>,
}

impl File for MockFile {
    type Error = MockStorageError;

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let end = self
            .short_read_at
            .map_or(self.data.len(), |cut| cut.min(self.data.len()));
        let avail = self.data.get(self.pos..end).unwrap_or(&[]);
        let n = avail.len().min(buf.len());
        if let Some(limit) = self.read_error_at {
            if n > 0 && self.pos.saturating_add(n) > limit {
                return Err(MockStorageError::Io);
            }
        }
        if let (Some(dst), Some(src)) = (buf.get_mut(..n), avail.get(..n)) {
            dst.copy_from_slice(src);
        }
        self.pos = self.pos.saturating_add(n);
        Ok(n)
    }

    async fn seek(&mut self, pos: u64) -> Result<u64, Self::Error> {
        self.pos = usize::try_from(pos).unwrap_or(usize::MAX).min(self.data.len());
        Ok(self.pos as u64)
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

impl Drop for MockFile {
    fn drop(&mut self) {
        self.handles.set(self.handles.get().saturating_sub(1));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::storage::read_fully;

    #[test]
    fn mock_dac_fails_at_requested_attempt() {
        let mut dac = MockDac::failing_at(2);
        assert!(dac.write(DacCode::new(1)).is_ok());
        assert!(dac.write(DacCode::new(2)).is_ok());
        assert_eq!(dac.write(DacCode::new(3)), Err(MockDacFault { attempt: 2 }));
        assert_eq!(dac.values(), vec![1, 2]);
        assert_eq!(dac.attempts(), 3);
    }

    #[tokio::test]
    async fn mock_delay_records_microseconds() {
        let mut delay = MockDelay::new();
        delay.delay_us(63).await;
        delay.delay_ms(1).await;
        assert_eq!(delay.holds_us(), vec![63, 1000]);
        assert_eq!(delay.total_us(), 1063);
    }

    #[tokio::test]
    async fn handle_count_follows_drop() {
        let mut storage = MockStorage::new().with_file("/a.wav", b"abc".to_vec());
        let file = storage.open_file("/a.wav").await.unwrap();
        assert_eq!(storage.open_handles(), 1);
        drop(file);
        assert_eq!(storage.open_handles(), 0);
    }

    #[tokio::test]
    async fn handle_pool_is_bounded() {
        let mut storage = MockStorage::new()
            .with_file("/a.wav", b"abc".to_vec())
            .max_handles(1);
        let _held = storage.open_file("/a.wav").await.unwrap();
        assert_eq!(
            storage.open_file("/a.wav").await.err(),
            Some(MockStorageError::TooManyHandles)
        );
    }

    #[tokio::test]
    async fn short_read_hides_tail_but_keeps_size() {
        let mut storage = MockStorage::new()
            .with_file("/a.wav", vec![7u8; 100])
            .short_read_at(40);
        let mut file = storage.open_file("/a.wav").await.unwrap();
        let mut buf = [0u8; 100];
        assert_eq!(read_fully(&mut file, &mut buf).await.unwrap(), 40);
        assert_eq!(file.size(), 100);
    }

    #[tokio::test]
    async fn read_error_is_reported() {
        let mut storage = MockStorage::new()
            .with_file("/a.wav", vec![0u8; 10])
            .read_error_at(5);
        let mut file = storage.open_file("/a.wav").await.unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(file.read(&mut buf).await, Ok(4));
        assert_eq!(file.read(&mut buf).await, Err(MockStorageError::Io));
    }

    #[tokio::test]
    async fn failing_mount_counts_calls() {
        let mut storage = MockStorage::new().failing_mount();
        assert_eq!(storage.mount().await, Err(MockStorageError::MountFailed));
        assert_eq!(storage.mount_calls(), 1);
    }
}
