//! Append-only sink for raw postings
//!
//! Two on-disk layouts are supported and either one is read back on resume:
//! - `json`: a single array, atomically rewritten after each page
//! - `jsonl`: one object per line, appended and synced after each page
//!
//! The sink is the crawl's checkpoint: the ids it holds are the dedup set and
//! its length is the number of records collected so far. Ids found on disk
//! are recomputed from each posting's fragment when the sink is opened.

use crate::config::RawFormat;
use crate::normalize::clean_fragment;
use crate::storage::{posting_identity, write_atomic, RawPosting, SinkError};
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Contents of a raw file as found on disk
struct RawFile {
    postings: Vec<RawPosting>,
    format: Option<RawFormat>,
    /// A JSON Lines file whose tail was cut off mid-write
    needs_repair: bool,
}

fn read_raw(path: &Path) -> Result<RawFile, SinkError> {
    let content = std::fs::read_to_string(path).map_err(|e| SinkError::io(path, e))?;
    let trimmed = content.trim_start();

    if trimmed.is_empty() {
        return Ok(RawFile {
            postings: Vec::new(),
            format: None,
            needs_repair: false,
        });
    }

    if trimmed.starts_with('[') {
        let postings = serde_json::from_str(trimmed).map_err(|source| SinkError::Malformed {
            path: path.to_path_buf(),
            line: source.line(),
            source,
        })?;
        return Ok(RawFile {
            postings,
            format: Some(RawFormat::Json),
            needs_repair: false,
        });
    }

    let lines: Vec<(usize, &str)> = content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .collect();
    let last = lines.len().saturating_sub(1);
    let mut postings = Vec::with_capacity(lines.len());
    let mut needs_repair = !content.ends_with('\n');

    for (i, (line_no, line)) in lines.into_iter().enumerate() {
        match serde_json::from_str::<RawPosting>(line) {
            Ok(posting) => postings.push(posting),
            Err(e) if i == last => {
                tracing::warn!(
                    "Dropping incomplete final record in {} (line {}): {}",
                    path.display(),
                    line_no + 1,
                    e
                );
                needs_repair = true;
            }
            Err(source) => {
                return Err(SinkError::Malformed {
                    path: path.to_path_buf(),
                    line: line_no + 1,
                    source,
                })
            }
        }
    }

    Ok(RawFile {
        postings,
        format: Some(RawFormat::Jsonl),
        needs_repair,
    })
}

/// Reads every raw posting from `path`, detecting the layout from its content
pub fn load_raw(path: &Path) -> Result<Vec<RawPosting>, SinkError> {
    Ok(read_raw(path)?.postings)
}

fn to_jsonl(postings: &[RawPosting]) -> Result<String, SinkError> {
    let mut out = String::new();
    for posting in postings {
        out.push_str(&serde_json::to_string(posting)?);
        out.push('\n');
    }
    Ok(out)
}

/// Writes postings as JSON Lines for batch tools that stream records
pub fn export_jsonl(postings: &[RawPosting], path: &Path) -> Result<usize, SinkError> {
    write_atomic(path, to_jsonl(postings)?.as_bytes())?;
    tracing::info!("Exported {} raw postings to {}", postings.len(), path.display());
    Ok(postings.len())
}

/// Single writer for the raw posting file
#[derive(Debug)]
pub struct RawSink {
    path: PathBuf,
    format: RawFormat,
    postings: Vec<RawPosting>,
    seen: HashSet<String>,
}

impl RawSink {
    /// Opens the raw file, loading whatever a previous run left behind
    ///
    /// With `fresh` the existing file is discarded. A file in the other layout
    /// or with a torn final line is rewritten in `format` before any append.
    pub fn open(path: &Path, format: RawFormat, fresh: bool) -> Result<Self, SinkError> {
        let mut sink = Self {
            path: path.to_path_buf(),
            format,
            postings: Vec::new(),
            seen: HashSet::new(),
        };

        if fresh && path.exists() {
            std::fs::remove_file(path).map_err(|e| SinkError::io(path, e))?;
            tracing::info!("Discarded previous raw file {}", path.display());
            return Ok(sink);
        }

        if !path.exists() {
            return Ok(sink);
        }

        let existing = read_raw(path)?;
        let loaded = existing.postings.len();
        let mut reidentified = 0;
        for mut posting in existing.postings {
            let identity = posting_identity(&clean_fragment(&posting.raw_html_fragment));
            if posting.id != identity {
                posting.id = identity;
                reidentified += 1;
            }
            if sink.seen.insert(posting.id.clone()) {
                sink.postings.push(posting);
            }
        }

        if reidentified > 0 {
            tracing::info!(
                "Recomputed {} stale posting ids in {}",
                reidentified,
                path.display()
            );
        }

        let converted = matches!(existing.format, Some(on_disk) if on_disk != format);
        if existing.needs_repair
            || converted
            || reidentified > 0
            || sink.postings.len() != loaded
        {
            sink.rewrite()?;
        }

        tracing::info!(
            "Resuming with {} postings from {}",
            sink.postings.len(),
            path.display()
        );
        Ok(sink)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn postings(&self) -> &[RawPosting] {
        &self.postings
    }

    /// Persists the postings whose ids are not yet in the sink
    ///
    /// Returns how many were added. On `Ok` the new postings are durable.
    pub fn append<I>(&mut self, batch: I) -> Result<usize, SinkError>
    where
        I: IntoIterator<Item = RawPosting>,
    {
        let new: Vec<RawPosting> = batch
            .into_iter()
            .filter(|posting| self.seen.insert(posting.id.clone()))
            .collect();

        if new.is_empty() {
            return Ok(0);
        }

        let added = new.len();
        match self.format {
            RawFormat::Json => {
                self.postings.extend(new);
                self.rewrite()?;
            }
            RawFormat::Jsonl => {
                let lines = to_jsonl(&new)?;
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)
                    .map_err(|e| SinkError::io(&self.path, e))?;
                file.write_all(lines.as_bytes())
                    .map_err(|e| SinkError::io(&self.path, e))?;
                file.sync_all().map_err(|e| SinkError::io(&self.path, e))?;
                self.postings.extend(new);
            }
        }

        tracing::debug!("Appended {} postings ({} total)", added, self.postings.len());
        Ok(added)
    }

    fn rewrite(&self) -> Result<(), SinkError> {
        let content = match self.format {
            RawFormat::Json => {
                let mut json = serde_json::to_string_pretty(&self.postings)?;
                json.push('\n');
                json
            }
            RawFormat::Jsonl => to_jsonl(&self.postings)?,
        };
        write_atomic(&self.path, content.as_bytes())
    }
}
