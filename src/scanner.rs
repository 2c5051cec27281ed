//! The sequential probe loop.
//!
//! One lookup is in flight at a time. Every probe is classified as found,
//! miss or failure; failures count as misses for the stopping rule but are
//! tallied separately. The state is checkpointed on the policy's cadence and
//! once more whenever the scan ends, however it ends.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use chrono::{DateTime, Local};
use futures::FutureExt;
use log::{debug, error, info};

use crate::block::ScanRange;
use crate::checkpoint::CheckpointStore;
use crate::config::ScanPolicy;
use crate::parse::extract_parcel;
use crate::record::ParcelRecord;
use crate::request::ParcelLookup;
use crate::shutdown::Shutdown;
use crate::{info_time, Error, Result};

/// Everything a scan has learned so far. Owned by the [`Scanner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanState {
    pub range: ScanRange,
    /// Next parcel number to probe, `range.end + 1` once the range is done.
    pub cursor: u32,
    pub not_found_streak: u32,
    /// Found parcels in ascending parcel number order.
    pub records: Vec<ParcelRecord>,
}

impl ScanState {
    pub fn new(range: ScanRange) -> Self {
        Self {
            cursor: range.start,
            range,
            not_found_streak: 0,
            records: Vec::new(),
        }
    }

    pub fn found_count(&self) -> usize {
        self.records.len()
    }

    /// Last fully processed parcel number, `start - 1` before the first probe.
    pub fn last_checked(&self) -> u32 {
        self.cursor - 1
    }

    /// Parcel numbers processed so far, over every run of this scan.
    pub fn checked(&self) -> u32 {
        self.cursor - self.range.start
    }

    pub fn completion(&self) -> f64 {
        f64::from(self.checked()) / f64::from(self.range.size()) * 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every parcel number in the range was probed.
    Exhausted,
    /// Too many misses in a row.
    EarlyStop,
    Interrupted,
    /// The loop panicked.
    Aborted,
}

#[derive(Debug, Clone)]
pub struct ScanSummary {
    /// Parcel numbers processed in total, including earlier runs.
    pub checked: u32,
    /// Lookups made by this run.
    pub probed: u32,
    pub found: usize,
    /// Lookups that failed or returned an unreadable payload.
    pub errors: u32,
    pub checkpoints: u32,
    pub elapsed: Duration,
    pub stop: StopReason,
}

impl ScanSummary {
    /// Lookups per second made by this run.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            f64::from(self.probed) / secs
        } else {
            0.0
        }
    }
}

#[derive(Debug)]
pub struct ScanReport {
    pub state: ScanState,
    pub summary: ScanSummary,
}

enum Probe {
    Found(ParcelRecord),
    Miss,
    Failed,
}

pub struct Scanner<L> {
    lookup: L,
    store: CheckpointStore,
    policy: ScanPolicy,
    state: ScanState,
    probed: u32,
    errors: u32,
    checkpoints: u32,
}

impl<L: ParcelLookup> Scanner<L> {
    pub fn new(lookup: L, store: CheckpointStore, policy: ScanPolicy, state: ScanState) -> Self {
        Self {
            lookup,
            store,
            policy,
            state,
            probed: 0,
            errors: 0,
            checkpoints: 0,
        }
    }

    /// Scans until the range is exhausted, the early-stop rule fires or
    /// `shutdown` is requested, then writes a final checkpoint.
    ///
    /// A panic inside the loop still gets the final checkpoint and is
    /// returned as [`Error::Fatal`].
    pub async fn run(mut self, shutdown: &Shutdown) -> Result<ScanReport> {
        let start_time = Local::now();
        let range = &self.state.range;
        info!(
            "Scanning block {} over {}..={}, starting at {}",
            range.block, range.start, range.end, self.state.cursor
        );

        let outcome = AssertUnwindSafe(self.scan_loop(shutdown))
            .catch_unwind()
            .await;
        let stop = outcome.as_ref().copied().unwrap_or(StopReason::Aborted);

        self.checkpoint().await;
        let summary = self.summary(start_time, stop);

        match outcome {
            Ok(_) => Ok(ScanReport {
                state: self.state,
                summary,
            }),
            Err(panic) => {
                let msg = panic_message(&*panic);
                error!("Critical error while scanning {}: {msg}", self.state.range.block);
                Err(Error::Fatal(msg))
            }
        }
    }

    async fn scan_loop(&mut self, shutdown: &Shutdown) -> StopReason {
        let end = self.state.range.end;
        while self.state.cursor <= end {
            if shutdown.is_requested() {
                info!("Scan interrupted, last checked parcel: {}", self.state.last_checked());
                return StopReason::Interrupted;
            }

            let current = self.state.cursor;
            let probe = self.probe(current).await;
            self.apply(probe);
            self.state.cursor += 1;
            self.probed += 1;

            if self.policy.checkpoint_due(self.state.found_count(), current) {
                self.checkpoint().await;
            } else if self.policy.progress_due(self.probed) {
                self.log_progress();
            }

            if self.state.cursor > end {
                break;
            }
            if self.policy.should_stop_early(self.state.not_found_streak) {
                info!(
                    "Stopping early after {} parcels in a row were not found",
                    self.state.not_found_streak
                );
                return StopReason::EarlyStop;
            }

            if !self.policy.delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.policy.delay) => {}
                    _ = shutdown.requested() => {}
                }
            }
        }
        StopReason::Exhausted
    }

    async fn probe(&self, current: u32) -> Probe {
        let cad_num = self.state.range.parcel_id(current);

        let payload = match self.lookup.lookup(&cad_num).await {
            Ok(Some(payload)) => payload,
            Ok(None) => return Probe::Miss,
            Err(e) => {
                error!("Lookup of {cad_num} failed: {e}");
                return Probe::Failed;
            }
        };

        match extract_parcel(payload, &cad_num) {
            Ok(Some(record)) => Probe::Found(record),
            Ok(None) => Probe::Miss,
            Err(e) => {
                error!("{e}");
                Probe::Failed
            }
        }
    }

    fn apply(&mut self, probe: Probe) {
        match probe {
            Probe::Found(record) => {
                info!(
                    "Found {} ({} so far)",
                    record.cadastral_number,
                    self.state.found_count() + 1
                );
                self.state.records.push(record);
                self.state.not_found_streak = 0;
            }
            Probe::Miss => {
                debug!("{} not found", self.state.range.parcel_id(self.state.cursor));
                self.state.not_found_streak += 1;
            }
            Probe::Failed => {
                self.errors += 1;
                self.state.not_found_streak += 1;
            }
        }
    }

    async fn checkpoint(&mut self) {
        if self.store.save(&self.state).await {
            self.checkpoints += 1;
        }
        self.log_progress();
    }

    fn log_progress(&self) {
        info!(
            "Progress {}: {}/{} checked ({:.2}%), {} found, {} failed",
            self.state.range.block,
            self.state.checked(),
            self.state.range.size(),
            self.state.completion(),
            self.state.found_count(),
            self.errors
        );
    }

    fn summary(&self, start_time: DateTime<Local>, stop: StopReason) -> ScanSummary {
        let summary = ScanSummary {
            checked: self.state.checked(),
            probed: self.probed,
            found: self.state.found_count(),
            errors: self.errors,
            checkpoints: self.checkpoints,
            elapsed: (Local::now() - start_time).to_std().unwrap_or_default(),
            stop,
        };

        info!("{}", "=".repeat(40));
        info_time!(start_time, "Scan of {} finished: {:?}", self.state.range.block, stop);
        info!("Parcels checked: {}", summary.checked);
        info!("Parcels found: {}", summary.found);
        info!("Failed lookups: {}", summary.errors);
        info!("Average speed: {:.2} parcels/sec", summary.throughput());
        info!(
            "Results saved to: {}",
            self.store.export_path(&self.state.range.block).display()
        );
        info!("{}", "=".repeat(40));
        summary
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
