//! Error types module
//!
//! Every failure the optimization pipeline can report is unified under
//! [`OptimizeError`]. Pluggable code (strategies, observers, host
//! repositories) returns `anyhow::Error`, which is wrapped into the matching
//! variant at the seam.

use std::io;

use crate::models::AssetKind;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected conditions like unsupported input files
    Debug,
    /// Warning level - for bad input or misconfiguration
    Warn,
    /// Error level - for unexpected failures
    Error,
}

#[derive(Debug, thiserror::Error)]
pub enum OptimizeError {
    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Source file not found: {0}")]
    SourceNotFound(String),

    #[error("No binary available for {0}")]
    MissingBinary(AssetKind),

    #[error("Image decode error: {0}")]
    Decode(String),

    #[error("Image encode error: {0}")]
    Encode(String),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid image quality: {0} (expected 0-100)")]
    InvalidQuality(i32),

    #[error("Optimized size {size} does not fit the {kind} size field")]
    SizeOverflow { kind: AssetKind, size: usize },

    #[error("Transformation strategy failed: {0}")]
    Strategy(#[source] anyhow::Error),

    #[error("Optimization observer failed: {0}")]
    Observer(#[source] anyhow::Error),

    #[error("Repository error: {0}")]
    Repository(#[source] anyhow::Error),

    #[error("Image optimization produced no output")]
    EmptyOutput,

    #[error("Image pipeline panicked: {0}")]
    Panicked(String),
}

/// Result type for optimization operations
pub type OptimizeResult<T> = Result<T, OptimizeError>;

impl OptimizeError {
    /// Log level an error sink should use for this error
    pub fn log_level(&self) -> LogLevel {
        match self {
            OptimizeError::UnsupportedFormat(_) => LogLevel::Debug,
            OptimizeError::Decode(_)
            | OptimizeError::InvalidQuality(_)
            | OptimizeError::SourceNotFound(_)
            | OptimizeError::MissingBinary(_)
            | OptimizeError::Settings(_) => LogLevel::Warn,
            OptimizeError::Storage(_)
            | OptimizeError::Encode(_)
            | OptimizeError::SizeOverflow { .. }
            | OptimizeError::Strategy(_)
            | OptimizeError::Observer(_)
            | OptimizeError::Repository(_)
            | OptimizeError::EmptyOutput
            | OptimizeError::Panicked(_) => LogLevel::Error,
        }
    }

    /// Machine-readable error code (e.g., "EMPTY_OUTPUT")
    pub fn error_code(&self) -> &'static str {
        match self {
            OptimizeError::Settings(_) => "SETTINGS_ERROR",
            OptimizeError::Storage(_) => "STORAGE_ERROR",
            OptimizeError::SourceNotFound(_) => "SOURCE_NOT_FOUND",
            OptimizeError::MissingBinary(_) => "MISSING_BINARY",
            OptimizeError::Decode(_) => "DECODE_ERROR",
            OptimizeError::Encode(_) => "ENCODE_ERROR",
            OptimizeError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            OptimizeError::InvalidQuality(_) => "INVALID_QUALITY",
            OptimizeError::SizeOverflow { .. } => "SIZE_OVERFLOW",
            OptimizeError::Strategy(_) => "STRATEGY_ERROR",
            OptimizeError::Observer(_) => "OBSERVER_ERROR",
            OptimizeError::Repository(_) => "REPOSITORY_ERROR",
            OptimizeError::EmptyOutput => "EMPTY_OUTPUT",
            OptimizeError::Panicked(_) => "PIPELINE_PANIC",
        }
    }
}

impl From<io::Error> for OptimizeError {
    fn from(err: io::Error) -> Self {
        OptimizeError::Storage(format!("IO error: {}", err))
    }
}
