use std::path::PathBuf;

use serde_json::json;
use sos_protocol::ErrorEnvelope;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SosError>;

#[derive(Error, Debug)]
pub enum SosError {
    #[error("Unknown domain: {domain}")]
    UnknownDomain { domain: String },

    #[error("Unknown report: {report}")]
    UnknownReport { report: String },

    #[error("Path not found: {path}")]
    NotFound { path: String },

    #[error("Path is not a file: {path}")]
    NotAFile { path: String },

    #[error("Path is not a directory: {path}")]
    NotADirectory { path: String },

    #[error("Path escapes the report root: {path}")]
    OutOfBounds { path: String },

    #[error("Invalid UTF-8 in '{path}' at byte offset {offset}")]
    Decode { path: String, offset: u64 },

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid domain configuration: {0}")]
    Config(String),

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SosError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownDomain { .. } => "unknown_domain",
            Self::UnknownReport { .. } => "unknown_report",
            Self::NotFound { .. } => "not_found",
            Self::NotAFile { .. } => "not_a_file",
            Self::NotADirectory { .. } => "not_a_directory",
            Self::OutOfBounds { .. } => "out_of_bounds",
            Self::Decode { .. } => "decode_error",
            Self::InvalidPattern { .. } => "invalid_pattern",
            Self::Config(_) => "config",
            Self::Io { .. } => "io",
        }
    }

    /// Wire form of the error, carrying the offending identifier in `details`.
    pub fn to_envelope(&self) -> ErrorEnvelope {
        let details = match self {
            Self::UnknownDomain { domain } => Some(json!({ "domain": domain })),
            Self::UnknownReport { report } => Some(json!({ "report": report })),
            Self::NotFound { path }
            | Self::NotAFile { path }
            | Self::NotADirectory { path }
            | Self::OutOfBounds { path } => Some(json!({ "path": path })),
            Self::Decode { path, offset } => Some(json!({ "path": path, "offset": offset })),
            Self::InvalidPattern { pattern, reason } => {
                Some(json!({ "pattern": pattern, "reason": reason }))
            }
            Self::Io { path, .. } => Some(json!({ "path": path.display().to_string() })),
            Self::Config(_) => None,
        };
        ErrorEnvelope {
            code: self.code().to_string(),
            message: self.to_string(),
            details,
            hint: None,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid_pattern(pattern: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}
