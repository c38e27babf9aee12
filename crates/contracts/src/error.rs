//! Layered error definitions
//!
//! Categorized by source: config / driver / sink

use thiserror::Error;

use crate::ControlKind;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Driver Errors =====
    /// Camera driver error
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// Malformed pixel buffer
    #[error("invalid image: {message}")]
    InvalidImage { message: String },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create invalid image error
    pub fn invalid_image(message: impl Into<String>) -> Self {
        Self::InvalidImage {
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }
}

/// Camera driver call outcome taxonomy.
///
/// Only `Fatal` is allowed to escape the capture loop; `Unsupported` and
/// `Transient` are absorbed where they occur.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DriverError {
    /// The driver lacks this capability for the whole session
    #[error("capability '{capability}' not supported by driver")]
    Unsupported { capability: String },

    /// The call failed but may succeed later
    #[error("transient driver failure: {message}")]
    Transient { message: String },

    /// The camera handle is unusable and must be restarted
    #[error("fatal driver failure: {message}")]
    Fatal { message: String },
}

impl DriverError {
    /// Unsupported control
    pub fn unsupported(control: ControlKind) -> Self {
        Self::Unsupported {
            capability: control.as_str().to_string(),
        }
    }

    /// Unsupported non-control capability (e.g. auto exposure)
    pub fn unsupported_capability(capability: impl Into<String>) -> Self {
        Self::Unsupported {
            capability: capability.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal {
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

/// Driver call result
pub type DriverResult<T> = std::result::Result<T, DriverError>;
