use thiserror::Error;

/// Errors raised while reading or writing persisted artifacts.
///
/// Load failures are mapped to "start empty" by callers; write failures are
/// logged and retried on the next cycle. Neither is ever fatal.
#[derive(Error, Debug)]
pub enum ArtifactError {
    /// Represents an error during I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Represents an error during data parsing or deserialization.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for ArtifactError {
    fn from(e: serde_json::Error) -> Self {
        ArtifactError::Parse(e.to_string())
    }
}
