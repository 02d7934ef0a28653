//! Error types for ArtCallFinder.
//!
//! Library crates use [`ArtCallError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all ArtCallFinder operations.
#[derive(Debug, thiserror::Error)]
pub enum ArtCallError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while scraping a listing site.
    #[error("network error: {0}")]
    Network(String),

    /// HTML or JSON content could not be interpreted.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Record store error (malformed collection file, serialization).
    #[error("storage error: {0}")]
    Storage(String),

    /// Transport or API failure while calling the generator. Never retried
    /// by the structured-response validator.
    #[error("generation error: {0}")]
    Generation(String),

    /// The generator answered, but the text is not valid structured data.
    #[error("malformed generator output: {message}")]
    MalformedOutput { message: String, raw: String },

    /// Every attempt to obtain parseable structured data failed.
    #[error("failed to get valid JSON after {attempts} attempts")]
    ValidationExhausted { attempts: u32 },

    /// An enrichment task inside a batch failed outside the enricher's own
    /// error containment (panic or aborted task).
    #[error("batch task failed for '{title}': {message}")]
    BatchTask { title: String, message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Spreadsheet export error.
    #[error("export error: {0}")]
    Export(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ArtCallError>;

impl ArtCallError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a generation (transport/API) error.
    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation(msg.into())
    }

    /// Create a malformed-output error, keeping the raw text for diagnosis.
    pub fn malformed(msg: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::MalformedOutput {
            message: msg.into(),
            raw: raw.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error is the recoverable malformed-output class.
    pub fn is_retryable_output(&self) -> bool {
        matches!(self, Self::MalformedOutput { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = ArtCallError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = ArtCallError::ValidationExhausted { attempts: 3 };
        assert_eq!(err.to_string(), "failed to get valid JSON after 3 attempts");
    }

    #[test]
    fn only_malformed_output_is_retryable() {
        assert!(ArtCallError::malformed("bad", "not json").is_retryable_output());
        assert!(!ArtCallError::generation("HTTP 500").is_retryable_output());
        assert!(!ArtCallError::ValidationExhausted { attempts: 3 }.is_retryable_output());
    }
}
