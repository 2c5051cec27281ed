//! Land parcel scanner for a single cadastral block.
//!
//! Probes the public registry with `<block>:<n>` for every `n` in a range, keeps
//! whatever registered land parcels it finds and checkpoints its progress so an
//! interrupted run picks up where it stopped.

pub mod block;
pub mod checkpoint;
pub mod config;
mod error;
pub mod export;
pub mod logging;
mod macros;
pub mod parse;
pub mod process;
pub mod prompt;
pub mod record;
pub mod request;
pub mod scanner;
pub mod shutdown;

pub use error::{Error, Result};

/// Lowest parcel number accepted for a range bound.
pub const MIN_PARCEL_NUM: u32 = 1;
/// Highest parcel number accepted for a range bound.
pub const MAX_PARCEL_NUM: u32 = 99_999;
const DEFAULT_START: u32 = 1;
const DEFAULT_END: u32 = 9_999;

/// Consecutive misses after which the block is assumed to be exhausted.
/// If set to 0 the scan never stops early.
const MAX_NOT_FOUND_STREAK: u32 = 100;
const CHECKPOINT_EVERY_FOUND: usize = 10;
const CHECKPOINT_EVERY_PROBE: u32 = 50;
const PROGRESS_EVERY: u32 = 10;
const REQUEST_DELAY_MS: u64 = 500;
const REQUEST_TIMEOUT_SECS: u64 = 15;

const NSPD_SEARCH_URL: &str = "https://nspd.gov.ru/api/geoportal/v2/search/geoportal";
const NSPD_MAP_URL: &str = "https://nspd.gov.ru/map";
const OUTPUT_DIR: &str = "results";
const LOG_FILE: &str = "land_parcel_scan.log";
