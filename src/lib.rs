pub mod config;
pub mod error;
pub mod image_asset;
pub mod naming;
pub mod ocr;
pub mod prompt;
pub mod providers;
pub mod renamer;
pub mod utils;

pub use config::Config;
pub use error::NamerError;
pub use naming::{NamingOptions, RenamePlan};
pub use providers::{BackendKind, ModelClient};
pub use renamer::{FileOutcome, Report, ScreenshotRenamer, Stage};
