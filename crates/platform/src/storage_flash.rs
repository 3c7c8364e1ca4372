//! Clip store on QSPI NOR flash.
//!
//! `FlashClipStorage` implements [`Storage`] over any
//! [`ReadNorFlash`] device holding a clip image (see [`crate::clip_table`])
//! at a fixed base offset. On the Feather M4 the device is
//! [`MappedFlash`](crate::qspi_config::MappedFlash) over the XiP window, so
//! every read is a plain memory copy.
//!
//! The flash handle is cloned into each open file; handles carry no other
//! shared state, so dropping a file needs no bookkeeping.

use embedded_storage::nor_flash::ReadNorFlash;

use crate::clip_table::{ClipEntry, ClipTableError, ClipTableHeader};
use crate::storage::{File, Storage};

/// Errors from the flash clip store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashStorageError<E: core::fmt::Debug> {
    /// The underlying flash read failed.
    #[error("flash read failed: {0:?}")]
    Flash(E),
    /// The clip table is missing or malformed.
    #[error("clip table invalid: {0}")]
    Table(ClipTableError),
    /// `open_file`/`exists` was called before a successful mount.
    #[error("clip store not mounted")]
    NotMounted,
    /// No clip is stored under the requested name.
    #[error("clip not found")]
    NotFound,
    /// A table entry or image extends past the end of the flash device.
    #[error("clip extends past end of flash")]
    OutOfBounds,
    /// The device needs aligned reads; clip extents are byte-granular.
    #[error("flash device requires aligned reads")]
    UnalignedReads,
}

/// Read-only [`Storage`] backed by a clip image on NOR flash.
pub struct FlashClipStorage<F> {
    flash: F,
    base: u32,
    header: Option<ClipTableHeader>,
}

impl<F> FlashClipStorage<F>
where
    F: ReadNorFlash + Clone,
{
    /// Wrap `flash`; the clip image starts at byte `base` of the device.
    #[must_use]
    pub fn new(flash: F, base: u32) -> Self {
        Self {
            flash,
            base,
            header: None,
        }
    }

    /// Number of clips in the mounted image, `None` before mount.
    #[must_use]
    pub fn clip_count(&self) -> Option<u32> {
        self.header.map(|h| h.entry_count)
    }

    /// Return the wrapped flash device.
    pub fn into_inner(self) -> F {
        self.flash
    }

    fn absolute(&self, image_offset: u32) -> Result<u32, FlashStorageError<F::Error>> {
        self.base
            .checked_add(image_offset)
            .ok_or(FlashStorageError::OutOfBounds)
    }

    fn read_at(&mut self, image_offset: u32, buf: &mut [u8]) -> Result<(), FlashStorageError<F::Error>> {
        let addr = self.absolute(image_offset)?;
        let end = usize::try_from(addr)
            .ok()
            .and_then(|a| a.checked_add(buf.len()))
            .ok_or(FlashStorageError::OutOfBounds)?;
        if end > self.flash.capacity() {
            return Err(FlashStorageError::OutOfBounds);
        }
        self.flash.read(addr, buf).map_err(FlashStorageError::Flash)
    }

    /// Linear scan of the table; images hold at most a few hundred clips.
    fn find(&mut self, path: &str) -> Result<Option<ClipEntry>, FlashStorageError<F::Error>> {
        let header = self.header.ok_or(FlashStorageError::NotMounted)?;
        for index in 0..header.entry_count {
            let mut raw = [0u8; ClipEntry::SIZE];
            self.read_at(ClipTableHeader::entry_offset(index), &mut raw)?;
            let entry = ClipEntry::decode(&raw).map_err(FlashStorageError::Table)?;
            if entry.matches(path) {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }
}

impl<F> Storage for FlashClipStorage<F>
where
    F: ReadNorFlash + Clone,
{
    type Error = FlashStorageError<F::Error>;
    type File = FlashClipFile<F>;

    async fn mount(&mut self) -> Result<(), Self::Error> {
        self.header = None;
        if F::READ_SIZE != 1 {
            return Err(FlashStorageError::UnalignedReads);
        }
        let mut raw = [0u8; ClipTableHeader::SIZE];
        self.read_at(0, &mut raw)?;
        let header = ClipTableHeader::decode(&raw).map_err(FlashStorageError::Table)?;
        // The whole table must be readable before any lookup trusts it.
        let table_end = self.absolute(header.data_start())?;
        if usize::try_from(table_end).map_or(true, |end| end > self.flash.capacity()) {
            return Err(FlashStorageError::OutOfBounds);
        }
        self.header = Some(header);
        Ok(())
    }

    async fn open_file(&mut self, path: &str) -> Result<Self::File, Self::Error> {
        let entry = self.find(path)?.ok_or(FlashStorageError::NotFound)?;
        let start = self.absolute(entry.offset)?;
        let end = entry
            .end()
            .ok_or(FlashStorageError::OutOfBounds)
            .and_then(|end| self.absolute(end))?;
        if usize::try_from(end).map_or(true, |end| end > self.flash.capacity()) {
            return Err(FlashStorageError::OutOfBounds);
        }
        Ok(FlashClipFile {
            flash: self.flash.clone(),
            start,
            size: entry.size,
            pos: 0,
        })
    }

    async fn exists(&mut self, path: &str) -> Result<bool, Self::Error> {
        Ok(self.find(path)?.is_some())
    }
}

/// One clip opened from a [`FlashClipStorage`].
pub struct FlashClipFile<F> {
    flash: F,
    start: u32,
    size: u32,
    pos: u32,
}

impl<F> File for FlashClipFile<F>
where
    F: ReadNorFlash,
{
    type Error = FlashStorageError<F::Error>;

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let remaining = self.size.saturating_sub(self.pos);
        let n = buf
            .len()
            .min(usize::try_from(remaining).unwrap_or(usize::MAX));
        let Some(dst) = buf.get_mut(..n) else {
            return Ok(0);
        };
        if dst.is_empty() {
            return Ok(0);
        }
        // start + size was checked against capacity in open_file.
        let addr = self.start.saturating_add(self.pos);
        self.flash.read(addr, dst).map_err(FlashStorageError::Flash)?;
        self.pos = self
            .pos
            .saturating_add(u32::try_from(n).unwrap_or(remaining));
        Ok(n)
    }

    async fn seek(&mut self, pos: u64) -> Result<u64, Self::Error> {
        // Seeking past the end parks the cursor at EOF.
        self.pos = u32::try_from(pos).unwrap_or(u32::MAX).min(self.size);
        Ok(u64::from(self.pos))
    }

    fn size(&self) -> u64 {
        u64::from(self.size)
    }
}
