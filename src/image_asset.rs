use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{imageops::FilterType, DynamicImage, ImageFormat};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{NamerError, Result};
use crate::utils::format_size;

// Hosted vision APIs downscale anything larger than this anyway.
const MAX_LONG_SIDE: u32 = 2000;
const MAX_SHORT_SIDE: u32 = 768;

const FALLBACK_MIME: &str = "image/png";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmitFormat {
    /// The file's bytes exactly as read from disk.
    Original,
    /// Size-bounded WebP re-encode.
    WebP,
}

/// Image bytes ready to be put on the wire.
#[derive(Debug, Clone)]
pub struct Payload {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl Payload {
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.to_base64())
    }
}

/// A decoded screenshot held in memory for the length of one file's run.
#[derive(Debug, Clone)]
pub struct ImageAsset {
    pub path: PathBuf,
    raw: Vec<u8>,
    image: DynamicImage,
}

impl ImageAsset {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read(path).map_err(|e| NamerError::unreadable(path, e))?;
        let image = image::load_from_memory(&raw).map_err(|e| NamerError::unreadable(path, e))?;

        debug!(
            path = %path.display(),
            width = image.width(),
            height = image.height(),
            "decoded image"
        );

        Ok(Self {
            path: path.to_path_buf(),
            raw,
            image,
        })
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    fn raw_len(&self) -> usize {
        self.raw.len()
    }

    pub fn payload(&self, format: TransmitFormat) -> Result<Payload> {
        match format {
            TransmitFormat::Original => Ok(Payload {
                bytes: self.raw.clone(),
                mime: infer::get(&self.raw)
                    .map(|t| t.mime_type())
                    .unwrap_or(FALLBACK_MIME)
                    .to_string(),
            }),
            TransmitFormat::WebP => self.encode_webp(),
        }
    }

    fn encode_webp(&self) -> Result<Payload> {
        let current = self.dimensions();
        let target = bounded_size(current);

        let resized;
        let image = if target != current {
            info!(
                "Resize image for API submission from {}x{} to {}x{}",
                current.0, current.1, target.0, target.1
            );
            resized = self.image.resize_exact(target.0, target.1, FilterType::Lanczos3);
            &resized
        } else {
            &self.image
        };

        // The WebP encoder only takes 8-bit buffers.
        let rgba = DynamicImage::ImageRgba8(image.to_rgba8());
        let mut bytes = Vec::new();
        rgba.write_to(&mut Cursor::new(&mut bytes), ImageFormat::WebP)
            .map_err(|e| NamerError::unreadable(&self.path, format!("WebP encoding failed: {}", e)))?;

        info!(
            "API submission image size: {} → {}",
            format_size(self.raw_len() as u64),
            format_size(bytes.len() as u64)
        );

        Ok(Payload {
            bytes,
            mime: "image/webp".to_string(),
        })
    }
}

/// Fit `(width, height)` so the long side is at most 2000 px and the short
/// side at most 768 px, keeping the aspect ratio.
pub fn bounded_size(size: (u32, u32)) -> (u32, u32) {
    let dims = [size.0 as u64, size.1 as u64];
    let (long, short) = if dims[0] > dims[1] { (0, 1) } else { (1, 0) };
    let mut bounded = dims;

    if bounded[long] > MAX_LONG_SIDE as u64 {
        bounded[short] = MAX_LONG_SIDE as u64 * dims[short] / dims[long];
        bounded[long] = MAX_LONG_SIDE as u64;
    }
    if bounded[short] > MAX_SHORT_SIDE as u64 {
        bounded[long] = MAX_SHORT_SIDE as u64 * dims[long] / dims[short];
        bounded[short] = MAX_SHORT_SIDE as u64;
    }

    (bounded[0].max(1) as u32, bounded[1].max(1) as u32)
}

#[cfg(test)]
mod tests;
