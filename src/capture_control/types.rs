//! Types describing the capture artifact and the end of a capture phase.

use chrono::{DateTime, Utc};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// State of the capture artifact as seen right before analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    /// No file at the artifact path.
    Missing,
    /// The file exists but holds no data.
    Empty,
    /// The file exists and holds this many bytes.
    Ready(u64),
}

impl ArtifactState {
    /// Inspects the artifact at `path`. Errors other than "not found" are
    /// returned so the caller can decide; a missing file is a valid state.
    pub fn inspect(path: &Path) -> io::Result<Self> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() == 0 => Ok(ArtifactState::Empty),
            Ok(meta) => Ok(ArtifactState::Ready(meta.len())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(ArtifactState::Missing),
            Err(e) => Err(e),
        }
    }

    /// Whether filter jobs have anything to read.
    pub fn has_data(&self) -> bool {
        matches!(self, ArtifactState::Ready(_))
    }
}

impl fmt::Display for ArtifactState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactState::Missing => write!(f, "missing"),
            ArtifactState::Empty => write!(f, "empty"),
            ArtifactState::Ready(bytes) => write!(f, "{} bytes", bytes),
        }
    }
}

/// Result of a capture process that exited by itself.
#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    pub artifact: PathBuf,
    pub artifact_state: ArtifactState,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn inspect_distinguishes_missing_empty_and_ready() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("missing.pcap");
        assert_eq!(ArtifactState::inspect(&missing).unwrap(), ArtifactState::Missing);

        let empty = dir.path().join("empty.pcap");
        std::fs::File::create(&empty).unwrap();
        assert_eq!(ArtifactState::inspect(&empty).unwrap(), ArtifactState::Empty);

        let ready = dir.path().join("ready.pcap");
        let mut f = std::fs::File::create(&ready).unwrap();
        f.write_all(b"0123456789").unwrap();
        drop(f);
        let state = ArtifactState::inspect(&ready).unwrap();
        assert_eq!(state, ArtifactState::Ready(10));
        assert!(state.has_data());
        assert!(!ArtifactState::Empty.has_data());
        assert_eq!(state.to_string(), "10 bytes");
    }
}
