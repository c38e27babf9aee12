//! Camera error types

use std::path::PathBuf;

use contracts::ContractError;
use thiserror::Error;

/// Camera construction error
#[derive(Debug, Error)]
pub enum CameraError {
    /// Replay directory could not be read
    #[error("failed to read replay directory {path:?}: {message}")]
    ReplayDir { path: PathBuf, message: String },

    /// Replay directory holds no playable images
    #[error("no image files found in {path:?}")]
    NoFrames { path: PathBuf },

    /// Wrapped ContractError
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl CameraError {
    /// Create replay directory error
    pub fn replay_dir(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ReplayDir {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, CameraError>;
