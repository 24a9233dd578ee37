use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum NamerError {
    #[error("Failed to read image {}: {reason}", path.display())]
    UnreadableImage { path: PathBuf, reason: String },

    #[error("Model backend at {endpoint} unavailable: {reason}")]
    ModelUnavailable { endpoint: String, reason: String },

    #[error("Model returned an empty or unparseable suggestion")]
    EmptySuggestion,

    #[error("Failed to rename {} to {}: {source}", from.display(), to.display())]
    RenameFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl NamerError {
    pub(crate) fn unreadable(path: &std::path::Path, reason: impl ToString) -> Self {
        NamerError::UnreadableImage {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn unavailable(endpoint: &str, reason: impl ToString) -> Self {
        NamerError::ModelUnavailable {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Only configuration problems stop the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, NamerError::Configuration(_))
    }
}

pub type Result<T> = std::result::Result<T, NamerError>;
