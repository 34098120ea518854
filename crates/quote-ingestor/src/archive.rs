use common::{ArchiveLine, ArtifactError, QuoteRecord};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Append-only writer for the newline-delimited JSON quote archive.
///
/// The file is opened per write, so many stream tasks can share one writer
/// without coordination; each line is a complete record.
#[derive(Debug, Clone)]
pub struct ArchiveWriter {
    path: PathBuf,
}

impl ArchiveWriter {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, line: &ArchiveLine) -> Result<(), ArtifactError> {
        let json = serde_json::to_string(line)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{json}")?;
        Ok(())
    }
}

/// Loads quote records from an archive file.
///
/// Error records, blank lines, and corrupt lines are skipped; a missing or
/// unreadable file yields an empty collection. Never fatal.
pub fn load_archive<P: AsRef<Path>>(path: P) -> Vec<QuoteRecord> {
    let file = match std::fs::File::open(path.as_ref()) {
        Ok(file) => file,
        Err(e) => {
            debug!(path = %path.as_ref().display(), error = %e, "No quote archive to load");
            return Vec::new();
        }
    };

    let mut records = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Stopping archive load on read error");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ArchiveLine>(&line) {
            Ok(ArchiveLine::Quote(record)) => records.push(record),
            Ok(ArchiveLine::Error(_)) => {}
            Err(_) => {}
        }
    }
    records
}
