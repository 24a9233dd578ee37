use std::path::Path;
use tokio::process::Command;
use tracing::{debug, warn};

const SHORTCUT_NAME: &str = "Extract text from image";

/// Source of text found inside an image.
///
/// Any failure means "no text"; OCR never fails a file.
#[allow(async_fn_in_trait)]
pub trait TextExtractor {
    async fn extract_text(&self, image_path: &Path) -> Option<String>;
}

/// macOS OCR through the Shortcuts app's "Extract text from image" action.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShortcutsOcr;

impl TextExtractor for ShortcutsOcr {
    async fn extract_text(&self, image_path: &Path) -> Option<String> {
        if !cfg!(target_os = "macos") {
            debug!("OCR via Shortcuts is only available on macOS");
            return None;
        }

        let output = Command::new("shortcuts")
            .arg("run")
            .arg(SHORTCUT_NAME)
            .arg("--input-path")
            .arg(image_path)
            .args(["--output-type", "public.plain-text", "--output-path", "-"])
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                warn!("Error extracting text from image: {}", e);
                return None;
            }
        };

        if !output.status.success() {
            warn!(
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "Error extracting text from image"
            );
            return None;
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoOcr;

impl TextExtractor for NoOcr {
    async fn extract_text(&self, _image_path: &Path) -> Option<String> {
        None
    }
}

/// OCR choice made once from the command line.
#[derive(Debug, Clone, Copy)]
pub enum Ocr {
    Shortcuts(ShortcutsOcr),
    Disabled(NoOcr),
}

impl Ocr {
    pub fn new(enabled: bool) -> Self {
        if enabled {
            Ocr::Shortcuts(ShortcutsOcr)
        } else {
            Ocr::Disabled(NoOcr)
        }
    }
}

impl TextExtractor for Ocr {
    async fn extract_text(&self, image_path: &Path) -> Option<String> {
        match self {
            Ocr::Shortcuts(ocr) => ocr.extract_text(image_path).await,
            Ocr::Disabled(ocr) => ocr.extract_text(image_path).await,
        }
    }
}
