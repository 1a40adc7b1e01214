//! Ties the pipeline together: keep the pool fresh, pick an unused candidate,
//! download, validate, encode, record. Failed candidates are swapped for
//! another one until the attempt budget runs out.

use std::collections::HashSet;
use std::fmt;
use std::io::Cursor;

use image::ImageReader;
use rand::seq::IndexedRandom;
use tracing::{debug, error, info, instrument, warn};

use crate::config::Config;
use crate::encoder::{downscale, encode_with_budget};
use crate::error::WallfetchError;
use crate::fetcher::MetadataFetcher;
use crate::history::HistoryStore;
use crate::pool::PoolCache;
use crate::transport::Transport;
use crate::validator::{Verdict, normalize_color, validate};

/// Where in the per-candidate pipeline something went wrong.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stage {
    /// Fetching the image bytes
    Download,
    /// Decoding and quality gates
    Validate,
    /// Writing the output
    Encode,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Download => "download",
            Stage::Validate => "validate",
            Stage::Encode => "encode",
        };
        f.write_str(name)
    }
}

/// A candidate that didn't make it.
#[derive(Debug)]
pub struct AttemptFailure {
    /// The candidate URL
    pub url: String,
    /// Stage that failed
    pub stage: Stage,
    /// What went wrong
    pub error: WallfetchError,
}

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// A new wallpaper was written.
    Produced {
        /// The candidate that was used
        url: String,
        /// Candidates tried, including the successful one
        attempts: usize,
    },
    /// Every candidate tried failed; the output file was left alone.
    Exhausted {
        /// Candidates tried
        attempts: usize,
        /// Why each one failed, in order
        failures: Vec<AttemptFailure>,
    },
    /// Nothing to choose from: no cached pool and the refresh came back empty.
    NoCandidates,
}

impl RunOutcome {
    /// True when a new output file was written.
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Produced { .. })
    }

    /// Candidates tried during the run.
    pub fn attempts(&self) -> usize {
        match self {
            RunOutcome::Produced { attempts, .. } | RunOutcome::Exhausted { attempts, .. } => {
                *attempts
            }
            RunOutcome::NoCandidates => 0,
        }
    }
}

/// Runs the acquisition pipeline against a [Transport].
pub struct Orchestrator<T> {
    config: Config,
    transport: T,
    history: HistoryStore,
    pool: PoolCache,
}

impl<T: Transport> Orchestrator<T> {
    /// Sets up the history and pool stores described by `config`.
    pub fn new(config: Config, transport: T) -> Self {
        let history = HistoryStore::new(config.history_path.clone(), config.max_history);
        let pool = PoolCache::new(config.pool_path.clone(), config.pool_ttl);
        Self {
            config,
            transport,
            history,
            pool,
        }
    }

    /// The history store in use.
    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// The pool cache in use.
    pub fn pool(&self) -> &PoolCache {
        &self.pool
    }

    /// Refreshes the pool if it's stale and returns the candidates to use.
    ///
    /// A failed or empty refresh falls back to whatever is on disk, however
    /// old.
    pub fn ensure_pool(&self) -> Vec<String> {
        if self.config.force_refresh || self.pool.is_stale() {
            info!("Candidate pool is stale, refreshing");
            let exclude = self.history.load();
            let fetched =
                MetadataFetcher::new(&self.transport, &self.config).fetch_candidates(&exclude);
            if fetched.is_empty() {
                warn!("Refresh found no new candidates, using the cached pool");
            } else {
                if let Err(err) = self.pool.save(&fetched) {
                    warn!("Failed to save candidate pool: {}", err);
                }
                return fetched;
            }
        }
        self.pool.load()
    }

    /// Picks a random candidate from `pool` that isn't in history and hasn't
    /// been tried this run. If history covers every untried candidate it is
    /// cleared and the untried part of the pool becomes eligible again.
    pub fn select_candidate(&self, pool: &[String], tried: &HashSet<String>) -> Option<String> {
        let used = self.history.load();
        let untried: Vec<&String> = pool.iter().filter(|url| !tried.contains(*url)).collect();
        let mut available: Vec<&String> = untried
            .iter()
            .copied()
            .filter(|url| !used.contains(*url))
            .collect();
        if available.is_empty() && !untried.is_empty() {
            info!(
                "All {} untried candidates have been used, clearing history",
                untried.len()
            );
            if let Err(err) = self.history.clear() {
                warn!("Failed to clear history: {}", err);
            }
            available = untried;
        }
        debug!("{} candidates available", available.len());
        available
            .choose(&mut rand::rng())
            .map(|url| url.to_string())
    }

    /// Download, validate and encode one candidate into the output path.
    #[instrument(skip(self))]
    pub fn process_candidate(&self, url: &str) -> Result<(), (Stage, WallfetchError)> {
        let bytes = self
            .transport
            .get(url, &[])
            .map_err(|err| (Stage::Download, WallfetchError::from(err)))?;
        debug!("Downloaded {} bytes", bytes.len());

        let image = ImageReader::new(Cursor::new(&bytes))
            .with_guessed_format()
            .map_err(|err| (Stage::Validate, WallfetchError::Decode(err.to_string())))?
            .decode()
            .map_err(|err| (Stage::Validate, WallfetchError::Decode(err.to_string())))?;
        let image = normalize_color(image);
        info!("Decoded {}x{} image", image.width(), image.height());

        let image = match validate(&image, &self.config.validation) {
            Verdict::Reject(reason) => {
                return Err((Stage::Validate, WallfetchError::from(reason)));
            }
            Verdict::Accept {
                resize: Some((width, height)),
            } => downscale(&image, width, height),
            Verdict::Accept { resize: None } => image,
        };

        let written = encode_with_budget(
            &image,
            &self.config.output_path,
            self.config.format,
            self.config.size_budget_kb,
            &self.config.quality,
        );
        if !written {
            return Err((
                Stage::Encode,
                WallfetchError::Encode(format!(
                    "{} was not written",
                    self.config.output_path.display()
                )),
            ));
        }
        Ok(())
    }

    /// Runs the whole pipeline once.
    pub fn run(&self) -> RunOutcome {
        let pool = self.ensure_pool();
        if pool.is_empty() {
            error!("No candidates available, giving up");
            return RunOutcome::NoCandidates;
        }

        let mut tried = HashSet::new();
        let mut failures = Vec::new();
        for attempt in 1..=self.config.max_attempts {
            if attempt > 1 {
                std::thread::sleep(self.config.retry_delay);
            }
            let Some(url) = self.select_candidate(&pool, &tried) else {
                warn!("Ran out of untried candidates");
                break;
            };
            tried.insert(url.clone());
            info!(
                "Attempt {}/{}: {}",
                attempt, self.config.max_attempts, url
            );

            match self.process_candidate(&url) {
                Ok(()) => {
                    if let Err(err) = self.history.add(&url) {
                        error!("Wallpaper saved but history update failed: {}", err);
                    }
                    info!(
                        "Wallpaper updated from {} after {} attempt(s)",
                        url, attempt
                    );
                    return RunOutcome::Produced {
                        url,
                        attempts: attempt,
                    };
                }
                Err((stage, error)) => {
                    warn!("Candidate {} failed at {}: {}", url, stage, error);
                    failures.push(AttemptFailure { url, stage, error });
                }
            }
        }

        error!(
            "No wallpaper produced after {} attempt(s), output left untouched",
            tried.len()
        );
        RunOutcome::Exhausted {
            attempts: tried.len(),
            failures,
        }
    }
}
