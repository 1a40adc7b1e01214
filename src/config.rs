//! Config handling

use std::path::PathBuf;
use std::time::Duration;

use tracing::log::LevelFilter;

use crate::cli::CliOptions;
use crate::constants::{
    API_ENDPOINT, API_ORIGIN, DEFAULT_MARKET, HISTORY_PATH, MAX_ATTEMPTS, MAX_HISTORY, MAX_IDX,
    OUTPUT_PATH, PAGE_DELAY, PAGE_SIZE, POOL_PATH, POOL_TTL, REQUEST_TIMEOUT, RETRY_DELAY,
    SIZE_BUDGET_KB, TARGET_CANDIDATES,
};
use crate::encoder::{OutputFormat, QualityLadder};
use crate::transport::RetryPolicy;
use crate::validator::ValidationRules;

/// Sets up logging based on the debug flag
pub fn setup_logging(debug: bool) -> Result<(), Box<std::io::Error>> {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut logger = simple_logger::SimpleLogger::new().with_level(level);
    if !debug {
        logger = logger
            .with_module_level("ureq", LevelFilter::Info)
            .with_module_level("ureq_proto", LevelFilter::Info)
            .with_module_level("rustls", LevelFilter::Info);
    }
    logger.init().map_err(|err| {
        eprintln!("Failed to initialize logger: {}", err);
        Box::new(std::io::Error::other(err))
    })
}

/// Everything a run needs to know, passed in at construction time.
#[derive(Clone, Debug)]
pub struct Config {
    /// Where the wallpaper is written, defaults to `img.jpg`.
    pub output_path: PathBuf,
    /// Output encoding, defaults to JPEG.
    pub format: OutputFormat,
    /// Target output size in kilobytes, defaults to 1024.
    pub size_budget_kb: u64,
    /// JPEG quality ladder, defaults to 85 down to 60 in steps of 5.
    pub quality: QualityLadder,
    /// Resolution and aspect gates.
    pub validation: ValidationRules,
    /// Used URLs, defaults to `history.txt`.
    pub history_path: PathBuf,
    /// History is trimmed to this many entries, defaults to 2000.
    pub max_history: usize,
    /// Cached candidates, defaults to `pool.json`.
    pub pool_path: PathBuf,
    /// Pool freshness window, defaults to 30 days. Zero means always stale.
    pub pool_ttl: Duration,
    /// Refresh the pool even when it is fresh.
    pub force_refresh: bool,
    /// Distinct candidates tried per run, defaults to 3.
    pub max_attempts: usize,
    /// Pause between candidate attempts, defaults to 2s.
    pub retry_delay: Duration,
    /// Metadata endpoint.
    pub api_endpoint: String,
    /// Prefix for relative image URLs.
    pub api_origin: String,
    /// `mkt` query parameter, defaults to `zh-CN`.
    pub market: String,
    /// Records per metadata page, defaults to 8.
    pub page_size: u32,
    /// Fetching stops at this many new candidates, defaults to 200.
    pub target_candidates: usize,
    /// Upper bound on the `idx` parameter, defaults to 365.
    pub max_idx: u32,
    /// Pause between metadata pages, defaults to 1s.
    pub page_delay: Duration,
    /// Per-request timeout, defaults to 10s.
    pub request_timeout: Duration,
    /// Transport-level retries.
    pub retry_policy: RetryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_path: OUTPUT_PATH.clone(),
            format: OutputFormat::Jpeg,
            size_budget_kb: SIZE_BUDGET_KB,
            quality: QualityLadder::default(),
            validation: ValidationRules::default(),
            history_path: HISTORY_PATH.clone(),
            max_history: MAX_HISTORY,
            pool_path: POOL_PATH.clone(),
            pool_ttl: POOL_TTL,
            force_refresh: false,
            max_attempts: MAX_ATTEMPTS,
            retry_delay: RETRY_DELAY,
            api_endpoint: API_ENDPOINT.to_string(),
            api_origin: API_ORIGIN.to_string(),
            market: DEFAULT_MARKET.to_string(),
            page_size: PAGE_SIZE,
            target_candidates: TARGET_CANDIDATES,
            max_idx: MAX_IDX,
            page_delay: PAGE_DELAY,
            request_timeout: REQUEST_TIMEOUT,
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl From<&CliOptions> for Config {
    fn from(cli: &CliOptions) -> Self {
        let defaults = Config::default();
        let output_path = match &cli.output {
            Some(path) => path.clone(),
            None => defaults.output_path.with_extension(cli.format.extension()),
        };
        Self {
            output_path,
            format: cli.format,
            size_budget_kb: cli.size_budget_kb,
            history_path: cli.history.clone(),
            pool_path: cli.pool.clone(),
            market: cli.market.clone(),
            max_attempts: cli.attempts.get(),
            force_refresh: cli.force_refresh,
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn defaults_match_constants() {
        let config = Config::default();
        assert_eq!(config.max_history, 2000);
        assert_eq!(config.pool_ttl, Duration::from_secs(30 * 24 * 60 * 60));
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.output_path, PathBuf::from("img.jpg"));
    }

    #[test]
    fn png_format_changes_default_extension() {
        let cli = CliOptions::parse_from(["wallfetch", "--format", "png"]);
        let config = Config::from(&cli);
        assert_eq!(config.format, OutputFormat::Png);
        assert_eq!(config.output_path, PathBuf::from("img.png"));

        let cli = CliOptions::parse_from(["wallfetch", "--format", "png", "--output", "/tmp/w.png"]);
        assert_eq!(Config::from(&cli).output_path, PathBuf::from("/tmp/w.png"));
    }
}
