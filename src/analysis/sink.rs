use log::{debug, error, warn};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use super::predicate::FilterPredicate;
use crate::error_handling::types::AnalysisError;

/// Report file exclusively owned by one filter job.
///
/// The file handle is closed exactly once: either when it is handed to the
/// filter process as its stdout (and that process side is dropped), or when
/// the sink itself is dropped.
#[derive(Debug)]
pub struct OutputSink {
    predicate: FilterPredicate,
    path: PathBuf,
    file: File,
}

impl OutputSink {
    /// Creates (or truncates) the report file at `path`.
    pub fn create(predicate: FilterPredicate, path: PathBuf) -> io::Result<Self> {
        let file = File::create(&path)?;
        debug!("[{}] opened sink {}", predicate, path.display());
        Ok(Self {
            predicate,
            path,
            file,
        })
    }

    pub fn predicate(&self) -> FilterPredicate {
        self.predicate
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Gives up the file so it becomes a child's stdout.
    pub fn into_stdio(self) -> (PathBuf, Stdio) {
        (self.path, Stdio::from(self.file))
    }

    /// Writes an empty JSON array and closes the sink.
    pub fn finish_empty(mut self) -> io::Result<PathBuf> {
        self.file.write_all(b"[]\n")?;
        self.file.flush()?;
        debug!("[{}] wrote empty report {}", self.predicate, self.path.display());
        Ok(self.path)
    }
}

/// The four sinks of one analysis run, opened all-or-nothing.
#[derive(Debug)]
pub struct SinkSet {
    sinks: Vec<OutputSink>,
}

impl SinkSet {
    /// Opens one sink per predicate inside `output_dir`.
    ///
    /// When any sink fails to open, the sinks opened before it are closed and
    /// their files removed, and the failing path is reported.
    pub fn open_all(
        output_dir: &Path,
        predicates: &[FilterPredicate],
        secondary_label: &str,
    ) -> Result<Self, AnalysisError> {
        let mut sinks: Vec<OutputSink> = Vec::with_capacity(predicates.len());
        for predicate in predicates {
            let path = output_dir.join(predicate.report_file_name(secondary_label));
            match OutputSink::create(*predicate, path.clone()) {
                Ok(sink) => sinks.push(sink),
                Err(cause) => {
                    error!("[{}] cannot open sink {}: {}", predicate, path.display(), cause);
                    Self::release(sinks);
                    return Err(AnalysisError::SinkCreationFailure { sink: path, cause });
                }
            }
        }
        Ok(Self { sinks })
    }

    fn release(sinks: Vec<OutputSink>) {
        for sink in sinks {
            let path = sink.path.clone();
            drop(sink);
            if let Err(e) = std::fs::remove_file(&path) {
                warn!("Failed to remove partial sink {}: {}", path.display(), e);
            } else {
                debug!("Released partial sink {}", path.display());
            }
        }
    }

    pub fn into_sinks(self) -> Vec<OutputSink> {
        self.sinks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_all_creates_one_file_per_predicate() {
        let dir = tempfile::tempdir().unwrap();
        let sinks = SinkSet::open_all(dir.path(), &FilterPredicate::ALL, "wlan0")
            .unwrap()
            .into_sinks();
        assert_eq!(sinks.len(), 4);
        for name in [
            "local-send.json",
            "local-receive.json",
            "wlan0-send.json",
            "wlan0-receive.json",
        ] {
            assert!(dir.path().join(name).exists(), "{} missing", name);
        }
        let predicates: Vec<FilterPredicate> =
            sinks.iter().map(|s| s.predicate()).collect();
        assert_eq!(predicates, FilterPredicate::ALL.to_vec());
    }

    #[test]
    fn failing_sink_releases_earlier_ones() {
        let dir = tempfile::tempdir().unwrap();
        // A directory squatting on the third report name makes File::create fail.
        std::fs::create_dir(dir.path().join("secondary-send.json")).unwrap();

        match SinkSet::open_all(dir.path(), &FilterPredicate::ALL, "secondary") {
            Err(AnalysisError::SinkCreationFailure { sink, .. }) => {
                assert_eq!(sink, dir.path().join("secondary-send.json"));
            }
            other => panic!("expected a sink creation failure, got {:?}", other),
        }
        assert!(!dir.path().join("local-send.json").exists());
        assert!(!dir.path().join("local-receive.json").exists());
        assert!(!dir.path().join("secondary-receive.json").exists());
    }

    #[test]
    fn finish_empty_writes_an_empty_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let sink = OutputSink::create(
            FilterPredicate::ALL[1],
            dir.path().join("local-receive.json"),
        )
        .unwrap();
        let path = sink.finish_empty().unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        let parsed: Vec<serde_json::Value> = serde_json::from_str(&content).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn create_truncates_previous_reports() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local-send.json");
        std::fs::write(&path, "[{\"stale\": true}]").unwrap();
        let sink = OutputSink::create(FilterPredicate::ALL[0], path.clone()).unwrap();
        drop(sink);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }
}
