//! Local image assets: bytes plus pixel dimensions, read on demand.
//!
//! Dimensions come from the image header via `image`'s format sniffing, so
//! a mislabelled extension (a PNG saved as `.jpg`) still reports the right
//! size. Only the header is decoded, never the pixel data.

use crate::error::MigrationError;
use image::ImageReader;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A local image ready to upload.
#[derive(Debug, Clone)]
pub struct ImageAsset {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl ImageAsset {
    /// Read `path` and probe its pixel dimensions.
    pub async fn load(path: &Path) -> Result<Self, MigrationError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| MigrationError::ImageRead {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
        let (width, height) = probe_dimensions(&bytes).map_err(|detail| MigrationError::ImageRead {
            path: path.to_path_buf(),
            detail,
        })?;
        debug!("Loaded {}: {}x{}, {} bytes", path.display(), width, height, bytes.len());
        Ok(Self {
            path: path.to_path_buf(),
            bytes,
            width,
            height,
        })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Name sent as `file_name` on upload.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string())
    }
}

/// Width and height from an encoded image's header.
pub fn probe_dimensions(bytes: &[u8]) -> Result<(u32, u32), String> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| e.to_string())?
        .into_dimensions()
        .map_err(|e| e.to_string())
}
