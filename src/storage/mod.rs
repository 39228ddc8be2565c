//! Storage module for the raw and typed record files
//!
//! The crawl and normalize stages only communicate through these files:
//! - the raw file holds [`RawPosting`]s, appended page by page
//! - the typed file holds [`TypedRecord`]s, regenerated on every normalize run
//!
//! Every full-file write goes through a temp file in the target directory
//! and a rename, so readers never observe a half-written file.

mod raw;
mod records;
mod typed;

pub use raw::{export_jsonl, load_raw, RawSink};
pub use records::{posting_identity, Citizenship, Decision, Degree, RawPosting, TypedRecord};
pub use typed::{load_typed, write_typed};

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Errors raised by the output sinks
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed record in {path} at line {line}: {source}")]
    Malformed {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to replace {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },
}

impl SinkError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Replaces `path` with `content` atomically
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<(), SinkError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| SinkError::io(dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| SinkError::io(dir, e))?;
    tmp.write_all(content).map_err(|e| SinkError::io(path, e))?;
    tmp.flush().map_err(|e| SinkError::io(path, e))?;
    tmp.as_file_mut()
        .sync_all()
        .map_err(|e| SinkError::io(path, e))?;

    tmp.persist(path).map_err(|e| SinkError::Persist {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic_creates_and_replaces() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("out.json");

        write_atomic(&path, b"first").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first");

        write_atomic(&path, b"second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");

        // No temp files left behind
        let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1);
    }
}
