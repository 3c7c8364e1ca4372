//! xtask pack-clips: pack a directory of WAV clips into a QSPI flash image.
//!
//! Clip names are the paths relative to the clip directory with a leading
//! `/`: `male/c_bwh_16.wav` is stored as `/male/c_bwh_16.wav`. Each file is
//! checked with the player's own header parser before it is packed.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use colored::Colorize;
use platform::qspi_config::{fits_clip_partition, partitions};
use platform::storage_local::LocalFileStorage;
use platform::{build_image, Storage, MAX_NAME_LEN};
use playback::wav::{parse_header, WaveInfo};
use walkdir::WalkDir;

/// One clip accepted into the image.
#[derive(Debug)]
pub(crate) struct PackedClip {
    pub name: String,
    pub info: WaveInfo,
}

/// Entry point called from main.rs
pub fn run(clips_dir: &Path, out: &Path) -> Result<()> {
    println!("Packing clips from: {}", clips_dir.display());
    let clips = pack(clips_dir, out)?;

    for clip in &clips {
        println!(
            "  {:<31} {:>6} Hz {:>2}-bit {:>7} samples {:>6} ms",
            clip.name,
            clip.info.samples_per_sec,
            u32::from(clip.info.bytes_per_sample).saturating_mul(8),
            clip.info.num_samples,
            clip.info.duration_ms()
        );
    }
    let len = std::fs::metadata(out).map(|m| m.len()).unwrap_or(0);
    println!(
        "{}",
        format!(
            "✓ {} clips, {} of {} bytes, written to {}",
            clips.len(),
            len,
            partitions::CLIP_IMAGE_MAX_BYTES,
            out.display()
        )
        .green()
    );
    Ok(())
}

/// Validate every clip under `clips_dir` and write the image to `out`.
pub(crate) fn pack(clips_dir: &Path, out: &Path) -> Result<Vec<PackedClip>> {
    let files = scan_wav_files(clips_dir)?;
    if files.is_empty() {
        bail!("no .wav files under {}", clips_dir.display());
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .context("starting runtime")?;
    let mut storage = LocalFileStorage::new(clips_dir);
    runtime
        .block_on(storage.mount())
        .with_context(|| format!("opening clip directory {}", clips_dir.display()))?;

    let mut clips = Vec::with_capacity(files.len());
    let mut blobs = Vec::with_capacity(files.len());
    for path in &files {
        let name = clip_name(clips_dir, path)?;
        if name.len() > MAX_NAME_LEN {
            bail!("{name}: clip names are limited to {MAX_NAME_LEN} bytes");
        }
        let info = runtime.block_on(inspect(&mut storage, &name))?;
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        clips.push(PackedClip { name, info });
        blobs.push(bytes);
    }

    let entries: Vec<(&str, &[u8])> = clips
        .iter()
        .zip(&blobs)
        .map(|(clip, bytes)| (clip.name.as_str(), bytes.as_slice()))
        .collect();
    let image = build_image(&entries).map_err(|e| anyhow!("building clip table: {e}"))?;
    if !fits_clip_partition(image.len()) {
        bail!(
            "image is {} bytes, the clip partition holds {}",
            image.len(),
            partitions::CLIP_IMAGE_MAX_BYTES
        );
    }

    std::fs::write(out, &image).with_context(|| format!("writing {}", out.display()))?;
    Ok(clips)
}

/// Parse the header of `name` exactly as the player will.
async fn inspect(storage: &mut LocalFileStorage, name: &str) -> Result<WaveInfo> {
    let mut file = storage
        .open_file(name)
        .await
        .with_context(|| format!("opening {name}"))?;
    parse_header(&mut file, name)
        .await
        .map_err(|e| anyhow!("{name}: {e}"))
}

/// Recursively collect `.wav` files under `dir`, sorted by path.
pub(crate) fn scan_wav_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        let is_wav = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
        if entry.file_type().is_file() && is_wav {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// `/`-separated clip name of `path` relative to `root`.
pub(crate) fn clip_name(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .with_context(|| format!("{} is outside {}", path.display(), root.display()))?;
    let mut name = String::new();
    for part in relative.iter() {
        let part = part
            .to_str()
            .ok_or_else(|| anyhow!("{} is not valid UTF-8", path.display()))?;
        name.push('/');
        name.push_str(part);
    }
    Ok(name)
}

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
    use std::fs;

    use platform::mocks::{MockDac, MockDelay};
    use platform::qspi_config::MappedFlash;
    use platform::FlashClipStorage;
    use playback::{AudioQspi, SampleBuffer, Voice};
    use tempfile::TempDir;

    fn wav(channels: u16, samples: &[u8]) -> Vec<u8> {
        let rate = 8_000u32;
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + samples.len() as u32).to_le_bytes());
        out.extend_from_slice(b"WAVEfmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&rate.to_le_bytes());
        out.extend_from_slice(&(rate * u32::from(channels)).to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&8u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&(samples.len() as u32).to_le_bytes());
        out.extend_from_slice(samples);
        out
    }

    fn create_voice(dir: &TempDir) {
        let male = dir.path().join("male");
        fs::create_dir_all(&male).unwrap();
        fs::write(male.join("a_bwh_16.wav"), wav(1, &[0, 255])).unwrap();
        fs::write(male.join("b_bwh_16.wav"), wav(1, &[255])).unwrap();
        fs::write(male.join("notes.txt"), b"not a clip").unwrap();
    }

    #[test]
    fn scan_finds_only_wav_files() {
        let tmp = TempDir::new().unwrap();
        create_voice(&tmp);
        assert_eq!(scan_wav_files(tmp.path()).unwrap().len(), 2);
    }

    #[test]
    fn clip_name_is_rooted_relative_path() {
        let root = Path::new("/tmp/clips");
        let name = clip_name(root, &root.join("male").join("c_bwh_16.wav")).unwrap();
        assert_eq!(name, "/male/c_bwh_16.wav");
    }

    #[test]
    fn stereo_clip_is_rejected() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        create_voice(&src);
        fs::write(src.path().join("male").join("c_bwh_16.wav"), wav(2, &[0, 0])).unwrap();

        let image = out.path().join("clips.bin");
        let err = pack(src.path(), &image).unwrap_err();
        assert!(err.to_string().contains("/male/c_bwh_16.wav"));
        assert!(!image.exists());
    }

    #[test]
    fn empty_directory_is_rejected() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        assert!(pack(src.path(), &out.path().join("clips.bin")).is_err());
    }

    #[test]
    fn packed_image_mounts_and_plays() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        create_voice(&src);
        let path = out.path().join("clips.bin");

        let clips = pack(src.path(), &path).unwrap();
        assert_eq!(clips.len(), 2);
        assert_eq!(clips[0].name, "/male/a_bwh_16.wav");
        assert_eq!(clips[0].info.num_samples, 2);

        let image = fs::read(&path).unwrap();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        runtime.block_on(async {
            let mut buffer: Box<SampleBuffer> = Box::new(SampleBuffer::new());
            let mut player = AudioQspi::new(
                FlashClipStorage::new(MappedFlash::new(&image), 0),
                MockDac::new(),
                MockDelay::new(),
                &mut *buffer,
            );
            player.begin().await.unwrap();
            let report = player.announce("ab", Voice::default()).await.unwrap();
            assert_eq!(report.spoken, 2);
            assert_eq!(player.dac().values(), vec![0, 4095, 4095]);
        });
    }
}
