//! Binary clip table stored at the start of the QSPI clip partition.
//!
//! Layout of a clip image (all multi-byte integers little-endian):
//!
//! ```text
//! [0..16]                    ClipTableHeader
//! [16..16 + 48 * count]      ClipEntry × count
//! [..]                       clip bytes (WAV files, byte-for-byte)
//! ```
//!
//! Entry offsets are relative to the start of the image, so the same image
//! can be flashed at any partition offset.

use crate::storage::MAX_NAME_LEN;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Error variants for clip table encode/decode operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClipTableError {
    /// Header magic bytes are not `b"CLIP"`.
    #[error("clip table magic missing")]
    BadMagic,
    /// Header version is not recognised by this implementation.
    #[error("unsupported clip table version")]
    UnsupportedVersion,
    /// Header declares more entries than [`MAX_CLIPS`].
    #[error("clip table declares too many entries")]
    TooManyEntries,
    /// Clip name is empty, longer than 31 bytes, or not UTF-8.
    #[error("invalid clip name")]
    BadName,
    /// A fixed-size sub-slice could not be converted.
    #[error("clip table decode error")]
    DecodeError,
    /// Two clips share a name.
    #[error("duplicate clip name")]
    DuplicateName,
    /// Clip offsets do not fit in 32 bits.
    #[error("clip image larger than 4 GiB")]
    ImageTooLarge,
}

/// Upper bound on clips per image (table = 16 + 256 × 48 bytes ≈ 12 KB).
pub const MAX_CLIPS: u32 = 256;

// ---------------------------------------------------------------------------
// ClipTableHeader: 16-byte fixed header
// ---------------------------------------------------------------------------

/// 16-byte header at offset 0 of a clip image.
///
/// Layout (16 bytes total):
/// ```text
/// [0..4]   magic        b"CLIP"
/// [4]      version      u8 = 1
/// [5..8]   _pad         [u8; 3]
/// [8..12]  entry_count  u32 le
/// [12..16] _pad         [u8; 4]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipTableHeader {
    /// Number of [`ClipEntry`] records following the header.
    pub entry_count: u32,
}

impl ClipTableHeader {
    /// Encoded size in bytes.
    pub const SIZE: usize = 16;
    /// Magic bytes at offset 0.
    pub const MAGIC: &'static [u8; 4] = b"CLIP";
    /// Format version written by this implementation.
    pub const VERSION: u8 = 1;

    /// Encode the header into a 16-byte buffer.
    ///
    /// # Safety (lint allow)
    /// All range indices are compile-time constants within `[0, SIZE)`.
    #[must_use]
    #[allow(clippy::indexing_slicing)]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(Self::MAGIC);
        buf[4] = Self::VERSION;
        buf[8..12].copy_from_slice(&self.entry_count.to_le_bytes());
        buf
    }

    /// Decode a header from a 16-byte buffer.
    ///
    /// # Errors
    ///
    /// Returns [`ClipTableError::BadMagic`] if bytes `[0..4]` are not `b"CLIP"`,
    /// [`ClipTableError::UnsupportedVersion`] if byte `[4]` is not
    /// [`ClipTableHeader::VERSION`], and [`ClipTableError::TooManyEntries`]
    /// if the entry count exceeds [`MAX_CLIPS`].
    #[allow(clippy::indexing_slicing)]
    pub fn decode(buf: &[u8; Self::SIZE]) -> Result<Self, ClipTableError> {
        if buf.get(0..4) != Some(Self::MAGIC.as_ref()) {
            return Err(ClipTableError::BadMagic);
        }
        if buf.get(4).copied() != Some(Self::VERSION) {
            return Err(ClipTableError::UnsupportedVersion);
        }
        let entry_count = u32::from_le_bytes(
            buf[8..12]
                .try_into()
                .map_err(|_| ClipTableError::DecodeError)?,
        );
        if entry_count > MAX_CLIPS {
            return Err(ClipTableError::TooManyEntries);
        }
        Ok(Self { entry_count })
    }

    /// Byte offset of entry `index` from the start of the image.
    #[must_use]
    pub fn entry_offset(index: u32) -> u32 {
        // index < MAX_CLIPS, so 16 + 256 * 48 cannot overflow.
        #[allow(clippy::arithmetic_side_effects, clippy::cast_possible_truncation)]
        let offset = Self::SIZE as u32 + index * ClipEntry::SIZE as u32;
        offset
    }

    /// Offset of the first byte after the table, where clip data starts.
    #[must_use]
    pub fn data_start(&self) -> u32 {
        Self::entry_offset(self.entry_count)
    }
}

// ---------------------------------------------------------------------------
// ClipEntry: 48-byte record
// ---------------------------------------------------------------------------

/// One clip record: name, offset and length of the WAV bytes.
///
/// Layout (48 bytes total):
/// ```text
/// [0..32]  name    NUL-padded UTF-8, e.g. "/male/c_bwh_16.wav"
/// [32..36] offset  u32 le (from start of image)
/// [36..40] size    u32 le
/// [40..48] _pad
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipEntry {
    name: [u8; 32],
    /// Offset of the first clip byte from the start of the image.
    pub offset: u32,
    /// Clip length in bytes.
    pub size: u32,
}

impl ClipEntry {
    /// Encoded size in bytes.
    pub const SIZE: usize = 48;

    /// Build an entry for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ClipTableError::BadName`] if `name` is empty, longer than
    /// 31 bytes, or contains a NUL byte.
    pub fn new(name: &str, offset: u32, size: u32) -> Result<Self, ClipTableError> {
        let bytes = name.as_bytes();
        if bytes.is_empty() || bytes.len() > MAX_NAME_LEN || bytes.contains(&0) {
            return Err(ClipTableError::BadName);
        }
        let mut buf = [0u8; 32];
        buf.iter_mut().zip(bytes).for_each(|(dst, &b)| *dst = b);
        Ok(Self {
            name: buf,
            offset,
            size,
        })
    }

    /// Clip name without NUL padding, or `None` if the stored bytes are not UTF-8.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        let len = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.name.len());
        self.name
            .get(..len)
            .and_then(|n| core::str::from_utf8(n).ok())
    }

    /// `true` when this entry is stored under `path`.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        self.name() == Some(path)
    }

    /// Encode the entry into a 48-byte buffer.
    ///
    /// # Safety (lint allow)
    /// All range indices are compile-time constants within `[0, SIZE)`.
    #[must_use]
    #[allow(clippy::indexing_slicing)]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..32].copy_from_slice(&self.name);
        buf[32..36].copy_from_slice(&self.offset.to_le_bytes());
        buf[36..40].copy_from_slice(&self.size.to_le_bytes());
        buf
    }

    /// Decode an entry from a 48-byte buffer.
    ///
    /// # Errors
    ///
    /// Returns [`ClipTableError::DecodeError`] if a fixed-size sub-slice cannot
    /// be converted (structurally unreachable for a `&[u8; 48]` argument).
    #[allow(clippy::indexing_slicing)]
    pub fn decode(buf: &[u8; Self::SIZE]) -> Result<Self, ClipTableError> {
        let mut name = [0u8; 32];
        name.copy_from_slice(&buf[0..32]);
        Ok(Self {
            name,
            offset: u32::from_le_bytes(
                buf[32..36]
                    .try_into()
                    .map_err(|_| ClipTableError::DecodeError)?,
            ),
            size: u32::from_le_bytes(
                buf[36..40]
                    .try_into()
                    .map_err(|_| ClipTableError::DecodeError)?,
            ),
        })
    }

    /// Exclusive end offset of the clip bytes, or `None` on overflow.
    #[must_use]
    pub fn end(&self) -> Option<u32> {
        self.offset.checked_add(self.size)
    }
}

// ---------------------------------------------------------------------------
// Image builder (host only)
// ---------------------------------------------------------------------------

/// Lay out a complete clip image: header, one entry per clip, then the clip
/// bytes in the same order.
///
/// # Errors
///
/// [`ClipTableError::TooManyEntries`] above [`MAX_CLIPS`] clips,
/// [`ClipTableError::BadName`] or [`ClipTableError::DuplicateName`] for an
/// unusable name, [`ClipTableError::ImageTooLarge`] if offsets overflow.
#[cfg(any(test, feature = "std"))]
pub fn build_image(clips: &[(&str, &[u8])]) -> Result<std::vec::Vec<u8>, ClipTableError> {
    let entry_count = u32::try_from(clips.len()).map_err(|_| ClipTableError::TooManyEntries)?;
    if entry_count > MAX_CLIPS {
        return Err(ClipTableError::TooManyEntries);
    }
    let header = ClipTableHeader { entry_count };

    let mut image = header.encode().to_vec();
    let mut offset = header.data_start();
    for (i, (name, bytes)) in clips.iter().enumerate() {
        if clips.iter().take(i).any(|(other, _)| other == name) {
            return Err(ClipTableError::DuplicateName);
        }
        let size = u32::try_from(bytes.len()).map_err(|_| ClipTableError::ImageTooLarge)?;
        let entry = ClipEntry::new(name, offset, size)?;
        offset = entry.end().ok_or(ClipTableError::ImageTooLarge)?;
        image.extend_from_slice(&entry.encode());
    }
    for (_, bytes) in clips {
        image.extend_from_slice(bytes);
    }
    Ok(image)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::cast_possible_truncation
)]
mod tests {
    use super::*;

    #[test]
    fn header_size_is_16_bytes() {
        assert_eq!(ClipTableHeader::SIZE, 16);
        assert_eq!(ClipEntry::SIZE, 48);
    }

    #[test]
    fn header_roundtrip() {
        let h = ClipTableHeader { entry_count: 37 };
        let decoded = ClipTableHeader::decode(&h.encode()).unwrap();
        assert_eq!(decoded.entry_count, 37);
    }

    #[test]
    fn header_decode_rejects_bad_magic() {
        let mut bytes = ClipTableHeader { entry_count: 1 }.encode();
        bytes[0..4].copy_from_slice(b"RIFF");
        assert_eq!(
            ClipTableHeader::decode(&bytes),
            Err(ClipTableError::BadMagic)
        );
    }

    #[test]
    fn header_decode_rejects_wrong_version() {
        let mut bytes = ClipTableHeader { entry_count: 1 }.encode();
        bytes[4] = 9;
        assert_eq!(
            ClipTableHeader::decode(&bytes),
            Err(ClipTableError::UnsupportedVersion)
        );
    }

    #[test]
    fn header_decode_rejects_oversized_count() {
        let bytes = ClipTableHeader {
            entry_count: MAX_CLIPS + 1,
        }
        .encode();
        assert_eq!(
            ClipTableHeader::decode(&bytes),
            Err(ClipTableError::TooManyEntries)
        );
    }

    #[test]
    fn erased_flash_is_not_a_table() {
        // Blank NOR flash reads back as 0xFF.
        assert_eq!(
            ClipTableHeader::decode(&[0xFF; 16]),
            Err(ClipTableError::BadMagic)
        );
    }

    #[test]
    fn data_starts_after_last_entry() {
        let h = ClipTableHeader { entry_count: 2 };
        assert_eq!(h.data_start(), 16 + 2 * 48);
    }

    #[test]
    fn entry_name_strips_padding() {
        let e = ClipEntry::new("/male/c_bwh_16.wav", 112, 9000).unwrap();
        let decoded = ClipEntry::decode(&e.encode()).unwrap();
        assert_eq!(decoded.name(), Some("/male/c_bwh_16.wav"));
        assert_eq!(decoded.offset, 112);
        assert_eq!(decoded.size, 9000);
        assert!(decoded.matches("/male/c_bwh_16.wav"));
        assert!(!decoded.matches("/male/c_bwh_16"));
    }

    #[test]
    fn entry_rejects_long_or_empty_names() {
        assert_eq!(ClipEntry::new("", 0, 0), Err(ClipTableError::BadName));
        let long = "/a/very/long/clip/name/over/31/bytes.wav";
        assert_eq!(ClipEntry::new(long, 0, 0), Err(ClipTableError::BadName));
        let exact = "/0123456789012345678901234567.w";
        assert_eq!(exact.len(), 31);
        assert!(ClipEntry::new(exact, 0, 0).is_ok());
    }

    #[test]
    fn built_image_places_clips_after_table() {
        let image = build_image(&[("/a.wav", &b"aaaa"[..]), ("/b.wav", &b"bb"[..])]).unwrap();
        let header = ClipTableHeader::decode(&image[..16].try_into().unwrap()).unwrap();
        assert_eq!(header.entry_count, 2);
        let second = ClipEntry::decode(&image[64..112].try_into().unwrap()).unwrap();
        assert_eq!(second.name(), Some("/b.wav"));
        assert_eq!(second.offset, 16 + 2 * 48 + 4);
        assert_eq!(&image[second.offset as usize..], b"bb");
    }

    #[test]
    fn build_rejects_duplicate_names() {
        assert_eq!(
            build_image(&[("/a.wav", &b"1"[..]), ("/a.wav", &b"2"[..])]),
            Err(ClipTableError::DuplicateName)
        );
    }

    #[test]
    fn entry_end_detects_overflow() {
        let e = ClipEntry::new("/x.wav", u32::MAX, 2).unwrap();
        assert_eq!(e.end(), None);
    }
}
