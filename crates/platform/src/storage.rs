//! Storage abstraction for clip file systems
//!
//! A [`Storage`] is mounted once at startup and then resolves clip names to
//! [`File`] handles. Handles are closed by dropping them; every backend must
//! release its handle slot in `Drop` so that early returns cannot leak a slot
//! from a small, fixed handle pool.

/// Longest clip name (in bytes) accepted by any backend.
///
/// Names are stored NUL-padded in 32-byte fields, so 31 usable bytes.
pub const MAX_NAME_LEN: usize = 31;

/// Storage trait for file system access
pub trait Storage {
    /// Error type
    type Error: core::fmt::Debug;
    /// File type
    type File: File;

    /// Bring up the transport and read the file system metadata.
    ///
    /// Fails if the chip is absent/unresponsive or the file system cannot be
    /// read. Calling it again after a successful mount re-validates.
    fn mount(&mut self) -> impl core::future::Future<Output = Result<(), Self::Error>>;

    /// Open file for reading
    fn open_file(
        &mut self,
        path: &str,
    ) -> impl core::future::Future<Output = Result<Self::File, Self::Error>>;

    /// Check if path exists
    fn exists(
        &mut self,
        path: &str,
    ) -> impl core::future::Future<Output = Result<bool, Self::Error>>;
}

/// File trait for reading files
///
/// Dropping the value closes the file.
pub trait File {
    /// Error type
    type Error: core::fmt::Debug;

    /// Read from current position
    ///
    /// Returns `Ok(0)` at end of file.
    fn read(
        &mut self,
        buf: &mut [u8],
    ) -> impl core::future::Future<Output = Result<usize, Self::Error>>;

    /// Seek to absolute position from the start of the file
    fn seek(&mut self, pos: u64) -> impl core::future::Future<Output = Result<u64, Self::Error>>;

    /// Get file size
    fn size(&self) -> u64;
}

/// Read until `buf` is full or the file reports end of file.
///
/// Returns the number of bytes read; fewer than `buf.len()` means EOF.
pub async fn read_fully<F: File>(file: &mut F, buf: &mut [u8]) -> Result<usize, F::Error> {
    let mut pos = 0;
    while let Some(rest) = buf.get_mut(pos..) {
        if rest.is_empty() {
            break;
        }
        let n = file.read(rest).await?;
        if n == 0 {
            break;
        }
        pos = pos.saturating_add(n);
    }
    Ok(pos)
}
