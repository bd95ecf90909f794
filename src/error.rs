use std::path::PathBuf;
use thiserror::Error;

/// Failures the tidy engine can report.
///
/// Per-item errors (`MissingMetadata`, `MalformedMetadata`) are collected by the
/// scanner, per-move errors (`MoveIoFailure`) by the executor. Only
/// `InvalidRoot` and `ConfigError` abort a whole operation.
#[derive(Error, Debug)]
pub enum TidyError {
    #[error("Invalid library root (not a directory): {path}")]
    InvalidRoot { path: PathBuf },

    #[error("No metadata sidecar found in {path}")]
    MissingMetadata { path: PathBuf },

    #[error("Malformed metadata in {path}: field `{field}`: {reason}")]
    MalformedMetadata {
        path: PathBuf,
        field: String,
        reason: String,
    },

    #[error("Could not derive a name for {what}; using placeholder `{placeholder}`")]
    NameFormattingFailure { what: String, placeholder: String },

    #[error("No free name found for {path}")]
    CollisionUnresolvable { path: PathBuf },

    #[error("Failed to {action} {from} -> {to}: {source}")]
    MoveIoFailure {
        action: &'static str,
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TidyError {
    pub fn malformed(path: impl Into<PathBuf>, field: &str, reason: impl Into<String>) -> Self {
        TidyError::MalformedMetadata {
            path: path.into(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TidyError::Io {
            path: path.into(),
            source,
        }
    }

    /// Errors that only skip one item during a scan.
    pub fn is_item_level(&self) -> bool {
        matches!(
            self,
            TidyError::MissingMetadata { .. } | TidyError::MalformedMetadata { .. }
        )
    }
}

pub type TidyResult<T> = std::result::Result<T, TidyError>;
