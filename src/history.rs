//! Durable record of wallpapers we've already used.
//!
//! Stored as one URL per line, oldest first. Every update rewrites the whole
//! file through [atomic_write].

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use url::Url;

use crate::error::WallfetchError;
use crate::storage::atomic_write;

/// True for anything that parses as an absolute, hierarchical URL.
pub fn is_absolute_url(value: &str) -> bool {
    Url::parse(value)
        .map(|url| !url.cannot_be_a_base())
        .unwrap_or(false)
}

/// File-backed, size-bounded history of consumed candidates.
#[derive(Clone, Debug)]
pub struct HistoryStore {
    path: PathBuf,
    max_entries: usize,
}

impl HistoryStore {
    /// Creates a store over `path` that keeps at most `max_entries` URLs.
    pub fn new(path: impl Into<PathBuf>, max_entries: usize) -> Self {
        Self {
            path: path.into(),
            max_entries,
        }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries oldest first. Missing or unreadable files are empty; junk
    /// lines are dropped and a repeated URL keeps its latest position.
    pub fn load_ordered(&self) -> Vec<String> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                warn!(
                    "Failed to read history {}, treating it as empty: {}",
                    self.path.display(),
                    err
                );
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        let mut entries: Vec<String> = contents
            .lines()
            .rev()
            .map(str::trim)
            .filter(|line| {
                if line.is_empty() {
                    return false;
                }
                if !is_absolute_url(line) {
                    debug!("Dropping malformed history line {:?}", line);
                    return false;
                }
                true
            })
            .filter(|line| seen.insert(line.to_string()))
            .map(str::to_string)
            .collect();
        entries.reverse();
        entries
    }

    /// The set of used URLs.
    pub fn load(&self) -> HashSet<String> {
        self.load_ordered().into_iter().collect()
    }

    /// Records `url` as the most recent entry, evicting the oldest entries
    /// past the size limit.
    pub fn add(&self, url: &str) -> Result<(), WallfetchError> {
        if !is_absolute_url(url) {
            return Err(WallfetchError::Persistence(format!(
                "refusing to record {url:?}, not an absolute URL"
            )));
        }
        let mut entries = self.load_ordered();
        entries.retain(|entry| entry != url);
        entries.push(url.to_string());
        if entries.len() > self.max_entries {
            let excess = entries.len() - self.max_entries;
            debug!("Evicting {} oldest history entries", excess);
            entries.drain(..excess);
        }
        self.write(&entries)
    }

    /// Forgets everything.
    pub fn clear(&self) -> Result<(), WallfetchError> {
        self.write(&[])
    }

    fn write(&self, entries: &[String]) -> Result<(), WallfetchError> {
        let mut body = entries.join("\n");
        if !body.is_empty() {
            body.push('\n');
        }
        atomic_write(&self.path, body.as_bytes())
    }
}
