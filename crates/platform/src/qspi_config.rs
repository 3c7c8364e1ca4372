//! QSPI configuration for the GD25Q16C NOR flash on the Feather M4 Express.
//!
//! XiP = eXecute in Place: the SAMD51 QSPI controller presents the flash as a
//! memory-mapped read-only window at `0x0400_0000`. After the controller is
//! switched to memory-mapped mode the CPU reads clip bytes with plain loads;
//! no per-read SPI transaction is issued by software.
//!
//! # Hardware
//!
//! **Flash chip:** GD25Q16C (GigaDevice), 2 MB, SOIC-8. The board support
//! package brings the controller up in memory-mapped mode before `main`
//! touches the clip image.
//!
//! # Sources
//!
//! - SAMD5x/E5x Family Data Sheet (DS60001507): §37 QSPI, memory map table

use embedded_storage::nor_flash::{check_read, ErrorType, NorFlashErrorKind, ReadNorFlash};

/// Flash capacity in bytes (GD25Q16C = 16 Mbit).
pub const QSPI_FLASH_BYTES: usize = 2 * 1024 * 1024;

/// Base address of the QSPI memory-mapped region in the SAMD51 memory map.
///
/// All clip flash addresses are offsets from this base.
pub const QSPI_BASE_ADDR: u32 = 0x0400_0000;

/// Partition offsets within QSPI flash (relative to flash start, not to
/// `QSPI_BASE_ADDR`; add `QSPI_BASE_ADDR` to get the CPU address in XiP mode).
///
/// # Partition map (GD25Q16C, 2 MB total)
///
/// ```text
/// Offset       Size     Contents
/// 0x0000_0000  1984 KB  Clip image (clip table + WAV bytes)
/// 0x001F_0000    64 KB  Reserved (settings, not touched by the player)
/// ```
pub mod partitions {
    /// Clip image: the clip table header sits at this offset.
    ///
    /// Written by `cargo xtask pack-clips` output through the bootloader's
    /// mass-storage flasher; read-only at runtime.
    pub const CLIP_IMAGE: u32 = 0x0000_0000;

    /// Reserved tail region; the clip image must end before it.
    pub const RESERVED: u32 = 0x001F_0000;

    /// Largest clip image that fits before the reserved region.
    pub const CLIP_IMAGE_MAX_BYTES: u32 = 0x001F_0000;
}

/// `true` if a clip image of `len` bytes fits its partition.
#[must_use]
pub fn fits_clip_partition(len: usize) -> bool {
    u32::try_from(len).is_ok_and(|len| len <= partitions::CLIP_IMAGE_MAX_BYTES)
}

// ─── Memory-mapped flash ─────────────────────────────────────────────────────

/// Read-only NOR flash backed by a byte slice.
///
/// On hardware the slice is the XiP window (see [`MappedFlash::xip`]); on the
/// host it is an image loaded into memory.
#[derive(Debug, Clone, Copy)]
pub struct MappedFlash<'a> {
    bytes: &'a [u8],
}

impl<'a> MappedFlash<'a> {
    /// Wrap an in-memory flash image.
    #[must_use]
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }
}

#[cfg(feature = "hardware")]
impl MappedFlash<'static> {
    /// The whole QSPI chip through the XiP window.
    ///
    /// # Safety
    ///
    /// The QSPI controller must already be in memory-mapped read mode, and
    /// nothing may program or erase the flash while the returned value (or
    /// any clone of it) is alive.
    #[must_use]
    pub unsafe fn xip() -> Self {
        // SAFETY: the caller guarantees the window is mapped and read-only for
        // 'static; QSPI_BASE_ADDR..+QSPI_FLASH_BYTES is the SAMD51 XiP region.
        let bytes = unsafe {
            core::slice::from_raw_parts(QSPI_BASE_ADDR as usize as *const u8, QSPI_FLASH_BYTES)
        };
        Self { bytes }
    }
}

impl ErrorType for MappedFlash<'_> {
    type Error = NorFlashErrorKind;
}

impl ReadNorFlash for MappedFlash<'_> {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        check_read(&*self, offset, bytes.len())?;
        let start = usize::try_from(offset).map_err(|_| NorFlashErrorKind::OutOfBounds)?;
        let src = start
            .checked_add(bytes.len())
            .and_then(|end| self.bytes.get(start..end))
            .ok_or(NorFlashErrorKind::OutOfBounds)?;
        bytes.copy_from_slice(src);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.bytes.len()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
