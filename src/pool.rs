//! Cached list of candidate URLs with a freshness window.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::WallfetchError;
use crate::storage::atomic_write;

/// On-disk shape of the pool file.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PoolFile {
    /// Candidate URLs
    pub urls: Vec<String>,
    /// Unix seconds when the pool was written
    pub updated_at: f64,
}

/// File-backed candidate pool.
#[derive(Clone, Debug)]
pub struct PoolCache {
    path: PathBuf,
    ttl: Duration,
}

impl PoolCache {
    /// Creates a cache over `path`, trusted for `ttl` after each save.
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
        }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when the file is missing or was last written `ttl` or more ago.
    pub fn is_stale(&self) -> bool {
        let modified = match std::fs::metadata(&self.path).and_then(|meta| meta.modified()) {
            Ok(modified) => modified,
            Err(err) => {
                debug!("Pool {} is unavailable: {}", self.path.display(), err);
                return true;
            }
        };
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        debug!("Pool {} is {:?} old", self.path.display(), age);
        age >= self.ttl
    }

    /// Stored URLs in order, without duplicates. Missing or corrupt files
    /// give an empty list.
    pub fn load(&self) -> Vec<String> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                warn!("Failed to read pool {}: {}", self.path.display(), err);
                return Vec::new();
            }
        };
        match serde_json::from_slice::<PoolFile>(&bytes) {
            Ok(pool) => {
                let mut seen = HashSet::new();
                pool.urls
                    .into_iter()
                    .filter(|url| seen.insert(url.clone()))
                    .collect()
            }
            Err(err) => {
                warn!(
                    "Pool {} is corrupt, ignoring it: {}",
                    self.path.display(),
                    err
                );
                Vec::new()
            }
        }
    }

    /// Replaces the pool with `urls`, stamped with the current time.
    pub fn save(&self, urls: &[String]) -> Result<(), WallfetchError> {
        let updated_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();
        let pool = PoolFile {
            urls: urls.to_vec(),
            updated_at,
        };
        let bytes = serde_json::to_vec(&pool)?;
        atomic_write(&self.path, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THIRTY_DAYS: Duration = Duration::from_secs(30 * 24 * 60 * 60);

    #[test]
    fn absent_pool_is_stale_until_saved() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pool = PoolCache::new(dir.path().join("pool.json"), THIRTY_DAYS);
        assert!(pool.is_stale());
        assert!(pool.load().is_empty());

        pool.save(&["https://example.org/a.jpg".to_string()])
            .expect("save");
        assert!(!pool.is_stale());
    }

    #[test]
    fn zero_ttl_is_always_stale() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pool = PoolCache::new(dir.path().join("pool.json"), Duration::ZERO);
        pool.save(&[]).expect("save");
        assert!(pool.is_stale());
    }

    #[test]
    fn round_trips_urls_in_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pool = PoolCache::new(dir.path().join("pool.json"), THIRTY_DAYS);
        let urls = vec![
            "https://example.org/b.jpg".to_string(),
            "https://example.org/a.jpg".to_string(),
        ];
        pool.save(&urls).expect("save");
        assert_eq!(pool.load(), urls);

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(pool.path()).expect("read")).expect("json");
        assert!(raw["updated_at"].as_f64().expect("updated_at") > 0.0);
        assert_eq!(raw["urls"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn corrupt_pool_loads_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pool = PoolCache::new(dir.path().join("pool.json"), THIRTY_DAYS);
        std::fs::write(pool.path(), b"{\"urls\": [\"https://exa").expect("write junk");
        assert!(pool.load().is_empty());
    }

    #[test]
    fn duplicate_urls_collapse() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pool = PoolCache::new(dir.path().join("pool.json"), THIRTY_DAYS);
        std::fs::write(
            pool.path(),
            r#"{"urls": ["https://e.org/a", "https://e.org/b", "https://e.org/a"], "updated_at": 1.5}"#,
        )
        .expect("write pool");
        assert_eq!(pool.load(), vec!["https://e.org/a", "https://e.org/b"]);
    }
}
