//! Content-addressed BMP storage.
//!
//! Uploaded images arrive in whatever container the operator had at hand.
//! The firmware only accepts 480×800 uncompressed BMP, so every upload is
//! normalized here: decode, RGB, center-crop-and-scale with Lanczos, BMP
//! re-encode. The SHA-256 of the normalized output names the file, which
//! makes writes idempotent and lets overlapping overrides share bytes.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::Context;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use sha2::{Digest, Sha256};

use crate::error::{ApiError, ApiResult};

/// Native raster width of the frame panel.
pub const FRAME_WIDTH: u32 = 480;
/// Native raster height of the frame panel.
pub const FRAME_HEIGHT: u32 = 800;

/// A normalized asset persisted under its digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAsset {
    /// `<sha256>.bmp`
    pub name: String,
    /// Hex digest of the normalized BMP bytes.
    pub sha256: String,
}

/// Filesystem sink for normalized assets. Append-only from the core's view.
#[derive(Debug, Clone)]
pub struct AssetSink {
    dir: PathBuf,
}

impl AssetSink {
    /// Sink rooted at `dir`. The directory is created on demand.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The asset directory root.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Normalize `raw` and persist the result, returning its digest name.
    ///
    /// Writing is skipped when a file with the same digest already exists.
    pub fn store_normalized(&self, raw: &[u8]) -> ApiResult<StoredAsset> {
        let bmp = normalize_to_bmp(raw)?;

        let digest = Sha256::digest(&bmp);
        let sha256 = format!("{digest:x}");
        let name = format!("{sha256}.bmp");

        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("create asset dir {}", self.dir.display()))?;
        let path = self.dir.join(&name);
        if !path.exists() {
            std::fs::write(&path, &bmp)
                .with_context(|| format!("write asset {}", path.display()))?;
        }
        Ok(StoredAsset { name, sha256 })
    }

    /// Resolve a client-supplied asset name to a path, if the file exists.
    ///
    /// Only the final path component is honored, so traversal attempts
    /// degrade to a plain lookup.
    pub fn lookup(&self, name: &str) -> Option<PathBuf> {
        let safe = Path::new(name).file_name()?;
        let path = self.dir.join(safe);
        path.is_file().then_some(path)
    }
}

/// Normalize arbitrary image bytes to a 480×800 RGB BMP.
pub fn normalize_to_bmp(raw: &[u8]) -> ApiResult<Vec<u8>> {
    if raw.is_empty() {
        return Err(ApiError::ClientInput("empty upload file".into()));
    }

    let decoded = image::load_from_memory(raw)
        .map_err(|e| ApiError::ClientInput(format!("cannot decode image: {e}")))?;
    let rgb = decoded.to_rgb8();

    // An already-sized frame passes through untouched, which keeps
    // normalization idempotent byte-for-byte.
    let fitted = if rgb.dimensions() == (FRAME_WIDTH, FRAME_HEIGHT) {
        rgb
    } else {
        DynamicImage::ImageRgb8(rgb)
            .resize_to_fill(FRAME_WIDTH, FRAME_HEIGHT, FilterType::Lanczos3)
            .to_rgb8()
    };

    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(fitted)
        .write_to(&mut out, ImageFormat::Bmp)
        .context("encode BMP")?;
    Ok(out.into_inner())
}
