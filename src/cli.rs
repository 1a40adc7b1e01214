//! CLI parser
use clap::Parser;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use crate::encoder::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "wallfetch")]
/// CLI Options
pub struct CliOptions {
    #[clap(long, help = "Enable debug logging", env = "WALLFETCH_DEBUG")]
    /// Enable debug logging. Env: WALLFETCH_DEBUG
    pub debug: bool,

    #[clap(long, short, env = "WALLFETCH_OUTPUT")]
    /// Output file, defaults to `img.jpg` or `img.png` depending on `--format`.
    /// Env: WALLFETCH_OUTPUT
    pub output: Option<PathBuf>,

    #[clap(long, short, value_enum, default_value = "jpeg", env = "WALLFETCH_FORMAT")]
    /// Output format, defaults to `jpeg`.
    /// Env: WALLFETCH_FORMAT
    pub format: OutputFormat,

    #[clap(long, default_value = "1024", env = "WALLFETCH_SIZE_BUDGET_KB")]
    /// Output size budget in kilobytes, defaults to `1024`.
    /// Env: WALLFETCH_SIZE_BUDGET_KB
    pub size_budget_kb: u64,

    #[clap(long, default_value = "history.txt", env = "WALLFETCH_HISTORY")]
    /// Path to the history file, defaults to `history.txt`.
    /// Env: WALLFETCH_HISTORY
    pub history: PathBuf,

    #[clap(long, default_value = "pool.json", env = "WALLFETCH_POOL")]
    /// Path to the candidate pool cache, defaults to `pool.json`.
    /// Env: WALLFETCH_POOL
    pub pool: PathBuf,

    #[clap(long, short, default_value = "zh-CN", env = "WALLFETCH_MARKET")]
    /// Market passed to the metadata API, defaults to `zh-CN`.
    /// Env: WALLFETCH_MARKET
    pub market: String,

    #[clap(long, short, default_value = "3", env = "WALLFETCH_ATTEMPTS")]
    /// Distinct candidates to try before giving up, defaults to `3`.
    /// Env: WALLFETCH_ATTEMPTS
    pub attempts: NonZeroUsize,

    #[clap(long, env = "WALLFETCH_FORCE_REFRESH")]
    /// Refresh the candidate pool even if it's still fresh.
    /// Env: WALLFETCH_FORCE_REFRESH
    pub force_refresh: bool,
}
