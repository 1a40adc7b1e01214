//! Shared constants/defaults for things
//!

use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

/// Where the finished wallpaper goes
pub static OUTPUT_PATH: LazyLock<PathBuf> = LazyLock::new(|| PathBuf::from("img.jpg"));

/// The list of URLs we've already used
pub static HISTORY_PATH: LazyLock<PathBuf> = LazyLock::new(|| PathBuf::from("history.txt"));

/// The cached candidate pool
pub static POOL_PATH: LazyLock<PathBuf> = LazyLock::new(|| PathBuf::from("pool.json"));

/// Metadata endpoint, queried with `format=js&idx=..&n=..&mkt=..`
pub const API_ENDPOINT: &str = "https://www.bing.com/HPImageArchive.aspx";

/// Prefix for the relative URLs the metadata endpoint hands back
pub const API_ORIGIN: &str = "https://www.bing.com";

/// Default market passed as `mkt`
pub const DEFAULT_MARKET: &str = "zh-CN";

/// Resolution token in the API's URLs
pub const RESOLUTION_TOKEN: &str = "1920x1080";

/// What we swap [RESOLUTION_TOKEN] for
pub const UHD_TOKEN: &str = "UHD";

/// Maximum number of history entries kept on disk.
pub const MAX_HISTORY: usize = 2000;

/// How long a candidate pool is trusted for.
pub const POOL_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Distinct candidates tried per run.
pub const MAX_ATTEMPTS: usize = 3;

/// Pause between candidate attempts.
pub const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Pause between metadata pages.
pub const PAGE_DELAY: Duration = Duration::from_secs(1);

/// Records requested per metadata page.
pub const PAGE_SIZE: u32 = 8;

/// Stop fetching once this many new candidates are collected.
pub const TARGET_CANDIDATES: usize = 200;

/// One year of daily pages.
pub const MAX_IDX: u32 = 365;

/// Timeout applied to every HTTP call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Largest response body we'll read, in bytes.
pub const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

/// Output size budget, in kilobytes.
pub const SIZE_BUDGET_KB: u64 = 1024;

/// Minimum accepted width.
pub const MIN_WIDTH: u32 = 1920;

/// Minimum accepted height.
pub const MIN_HEIGHT: u32 = 1080;

/// Narrowest accepted aspect ratio (width / height).
pub const MIN_ASPECT: f64 = 1.5;

/// Widest accepted aspect ratio (width / height).
pub const MAX_ASPECT: f64 = 2.5;

/// Width images are pre-downscaled towards when they are far too big.
pub const TARGET_WIDTH: u32 = 1920;

/// First JPEG quality tried.
pub const JPEG_START_QUALITY: u8 = 85;

/// How much quality drops per step.
pub const JPEG_QUALITY_STEP: u8 = 5;

/// Quality never goes below this.
pub const JPEG_QUALITY_FLOOR: u8 = 60;

/// Status codes the transport retries on.
pub const RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// User agent sent with every request
pub static USER_AGENT: LazyLock<String> =
    LazyLock::new(|| format!("wallfetch/{}", env!("CARGO_PKG_VERSION")));
