//! Command line flags and the policy values derived from them.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::{
    CHECKPOINT_EVERY_FOUND, CHECKPOINT_EVERY_PROBE, LOG_FILE, MAX_NOT_FOUND_STREAK,
    NSPD_MAP_URL, NSPD_SEARCH_URL, OUTPUT_DIR, PROGRESS_EVERY, REQUEST_DELAY_MS,
    REQUEST_TIMEOUT_SECS,
};

#[derive(Debug, Clone, Parser)]
#[command(name = "cadastre-scan", version, about = "Scan a cadastral block for registered land parcels")]
pub struct Args {
    /// Cadastral block to scan (XX:XX:XXXXXXX). Prompted for when omitted.
    #[arg(short, long)]
    pub block: Option<String>,

    /// First parcel number to probe. Prompted for when omitted.
    #[arg(long)]
    pub start: Option<u32>,

    /// Last parcel number to probe. Prompted for when omitted.
    #[arg(long)]
    pub end: Option<u32>,

    /// Resume from an existing checkpoint without asking.
    #[arg(long, conflicts_with = "restart")]
    pub resume: bool,

    /// Throw away an existing checkpoint without asking.
    #[arg(long)]
    pub restart: bool,

    /// Directory for checkpoints and exports.
    #[arg(short, long, default_value = OUTPUT_DIR)]
    pub output_dir: PathBuf,

    #[arg(long, default_value = LOG_FILE)]
    pub log_file: PathBuf,

    /// trace, debug, info, warn or error.
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Consecutive misses before giving up on the block, 0 disables.
    #[arg(long, default_value_t = MAX_NOT_FOUND_STREAK)]
    pub max_not_found: u32,

    #[arg(long, default_value_t = CHECKPOINT_EVERY_FOUND)]
    pub checkpoint_every_found: usize,

    #[arg(long, default_value_t = CHECKPOINT_EVERY_PROBE)]
    pub checkpoint_every_probe: u32,

    /// Log a progress line every this many lookups, 0 disables.
    #[arg(long, default_value_t = PROGRESS_EVERY)]
    pub progress_every: u32,

    /// Pause between two lookups in milliseconds.
    #[arg(long, default_value_t = REQUEST_DELAY_MS)]
    pub delay_ms: u64,

    #[arg(long, default_value_t = REQUEST_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    #[arg(long, default_value = NSPD_SEARCH_URL)]
    pub search_url: String,

    /// Skip TLS certificate verification for the registry.
    #[arg(long)]
    pub insecure: bool,
}

impl Args {
    pub fn policy(&self) -> ScanPolicy {
        ScanPolicy {
            max_not_found: self.max_not_found,
            checkpoint_every_found: self.checkpoint_every_found,
            checkpoint_every_probe: self.checkpoint_every_probe,
            progress_every: self.progress_every,
            delay: Duration::from_millis(self.delay_ms),
        }
    }

    pub fn lookup_config(&self) -> LookupConfig {
        LookupConfig {
            search_url: self.search_url.clone(),
            map_url: NSPD_MAP_URL.to_string(),
            timeout: Duration::from_secs(self.timeout_secs),
            accept_invalid_certs: self.insecure,
        }
    }
}

/// Stopping, checkpointing and pacing knobs of a scan.
///
/// The early-stop threshold is a heuristic for "no more parcels past this
/// point", not a guarantee. A value of 0 disables the matching rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPolicy {
    pub max_not_found: u32,
    pub checkpoint_every_found: usize,
    pub checkpoint_every_probe: u32,
    pub progress_every: u32,
    pub delay: Duration,
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self {
            max_not_found: MAX_NOT_FOUND_STREAK,
            checkpoint_every_found: CHECKPOINT_EVERY_FOUND,
            checkpoint_every_probe: CHECKPOINT_EVERY_PROBE,
            progress_every: PROGRESS_EVERY,
            delay: Duration::from_millis(REQUEST_DELAY_MS),
        }
    }
}

impl ScanPolicy {
    /// Whether a checkpoint is due after probing `current` with `found` parcels collected so far.
    pub fn checkpoint_due(&self, found: usize, current: u32) -> bool {
        let every_found = self.checkpoint_every_found > 0 && found % self.checkpoint_every_found == 0;
        let every_probe =
            self.checkpoint_every_probe > 0 && current % self.checkpoint_every_probe == 0;
        found > 0 && (every_found || every_probe)
    }

    /// Whether a progress line is due after `probed` lookups in this run.
    pub fn progress_due(&self, probed: u32) -> bool {
        self.progress_every > 0 && probed % self.progress_every == 0
    }

    pub fn should_stop_early(&self, not_found_streak: u32) -> bool {
        self.max_not_found > 0 && not_found_streak >= self.max_not_found
    }
}

/// Settings of the registry HTTP client.
#[derive(Debug, Clone)]
pub struct LookupConfig {
    pub search_url: String,
    /// Base of the `Referer` sent along, the registry's map page.
    pub map_url: String,
    pub timeout: Duration,
    pub accept_invalid_certs: bool,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            search_url: NSPD_SEARCH_URL.to_string(),
            map_url: NSPD_MAP_URL.to_string(),
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            accept_invalid_certs: false,
        }
    }
}
