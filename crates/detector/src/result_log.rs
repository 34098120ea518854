use crate::evaluate::ArbitrageResult;
use common::ArtifactError;
use std::path::Path;
use tracing::debug;

/// Loads the persisted result log. A missing or malformed file means
/// "start empty" and is never fatal.
pub fn load_results<P: AsRef<Path>>(path: P) -> Vec<ArbitrageResult> {
    let content = match std::fs::read_to_string(path.as_ref()) {
        Ok(content) => content,
        Err(e) => {
            debug!(path = %path.as_ref().display(), error = %e, "No result log to load");
            return Vec::new();
        }
    };
    match serde_json::from_str(&content) {
        Ok(results) => results,
        Err(e) => {
            debug!(path = %path.as_ref().display(), error = %e, "Result log unreadable, starting empty");
            Vec::new()
        }
    }
}

/// Rewrites the result log wholesale.
pub fn save_results<P: AsRef<Path>>(
    path: P,
    results: &[ArbitrageResult],
) -> Result<(), ArtifactError> {
    let file = std::fs::File::create(path.as_ref())?;
    serde_json::to_writer_pretty(file, results)?;
    Ok(())
}
