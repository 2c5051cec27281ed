//! Durable snapshots of a [`ScanState`], one per cadastral block.
//!
//! Layout of `<dir>/checkpoint_<block>.json`:
//! `{metadata: {block_id, start, end, last_checked, not_found_streak, timestamp},
//!   stats: {total_checked, found_count, completion}, records: [...]}`.
//! A CSV export of the records lives next to it as `parcels_<block>.csv`.
//!
//! Both files are written to a `.tmp` sibling first and renamed over the
//! target, so a crash mid-write leaves the previous snapshot intact.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Local;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use tokio::{fs, io::AsyncWriteExt};

use crate::block::{BlockId, ScanRange};
use crate::export::records_to_csv;
use crate::record::ParcelRecord;
use crate::scanner::ScanState;
use crate::{Error, Result};

#[derive(Debug, Serialize, Deserialize)]
struct Checkpoint {
    metadata: Metadata,
    stats: Stats,
    records: Vec<ParcelRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Metadata {
    block_id: BlockId,
    start: u32,
    end: u32,
    last_checked: u32,
    #[serde(default)]
    not_found_streak: u32,
    timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Stats {
    total_checked: u32,
    found_count: usize,
    completion: String,
}

impl From<&ScanState> for Checkpoint {
    fn from(state: &ScanState) -> Self {
        Self {
            metadata: Metadata {
                block_id: state.range.block.clone(),
                start: state.range.start,
                end: state.range.end,
                last_checked: state.last_checked(),
                not_found_streak: state.not_found_streak,
                timestamp: Local::now().to_rfc3339(),
            },
            stats: Stats {
                total_checked: state.checked(),
                found_count: state.found_count(),
                completion: format!("{:.2}%", state.completion()),
            },
            records: state.records.clone(),
        }
    }
}

impl TryFrom<Checkpoint> for ScanState {
    type Error = Error;

    fn try_from(cp: Checkpoint) -> Result<Self> {
        let meta = cp.metadata;
        let range = ScanRange::new(meta.block_id, meta.start, meta.end)?;
        if meta.last_checked > range.end || meta.last_checked + 1 < range.start {
            return Err(Error::Config(format!(
                "last checked parcel {} lies outside {}..={}",
                meta.last_checked, range.start, range.end
            )));
        }
        Ok(ScanState {
            range,
            cursor: meta.last_checked + 1,
            not_found_streak: meta.not_found_streak,
            records: cp.records,
        })
    }
}

/// Reads, writes and discards checkpoints under one output directory.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn checkpoint_path(&self, block: &BlockId) -> PathBuf {
        self.dir.join(format!("checkpoint_{}.json", block.file_stem()))
    }

    pub fn export_path(&self, block: &BlockId) -> PathBuf {
        self.dir.join(format!("parcels_{}.csv", block.file_stem()))
    }

    pub async fn exists(&self, block: &BlockId) -> bool {
        fs::try_exists(self.checkpoint_path(block))
            .await
            .unwrap_or(false)
    }

    /// Writes a snapshot of `state` and refreshes the export when there are records.
    /// Failures are logged and reported as `false`.
    pub async fn save(&self, state: &ScanState) -> bool {
        match self.try_save(state).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to save checkpoint for {}: {e}", state.range.block);
                false
            }
        }
    }

    async fn try_save(&self, state: &ScanState) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        let block = &state.range.block;

        let json = serde_json::to_vec_pretty(&Checkpoint::from(state))?;
        write_atomic(&self.checkpoint_path(block), &json).await?;
        debug!(
            "Checkpoint for {block} at parcel {} written",
            state.last_checked()
        );

        if !state.records.is_empty() {
            self.write_export(block, &state.records).await?;
            info!(
                "Saved {} parcels to {}",
                state.records.len(),
                self.export_path(block).display()
            );
        }
        Ok(())
    }

    /// Loads the checkpoint of `block`, resuming after its last checked parcel.
    ///
    /// Returns `None` when there is no checkpoint or it can't be read; the
    /// latter is logged.
    pub async fn load(&self, block: &BlockId) -> Option<ScanState> {
        match self.try_load(block).await {
            Ok(state) => state,
            Err(e) => {
                error!("Failed to load checkpoint for {block}: {e}");
                None
            }
        }
    }

    async fn try_load(&self, block: &BlockId) -> Result<Option<ScanState>> {
        let path = self.checkpoint_path(block);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let checkpoint: Checkpoint = serde_json::from_slice(&bytes)?;
        if &checkpoint.metadata.block_id != block {
            return Err(Error::Config(format!(
                "{} belongs to block {}",
                path.display(),
                checkpoint.metadata.block_id
            )));
        }
        let state = ScanState::try_from(checkpoint)?;

        info!(
            "Loaded progress for {block}: {} parcels found, resuming at {}",
            state.found_count(),
            state.cursor
        );
        if !state.records.is_empty() {
            self.write_export(block, &state.records).await?;
        }
        Ok(Some(state))
    }

    /// Removes the checkpoint and export of `block`. Missing files are fine.
    pub async fn discard(&self, block: &BlockId) -> bool {
        let mut ok = true;
        for path in [self.checkpoint_path(block), self.export_path(block)] {
            match fs::remove_file(&path).await {
                Ok(()) => info!("Removed {}", path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    error!("Failed to remove {}: {e}", path.display());
                    ok = false;
                }
            }
        }
        ok
    }

    async fn write_export(&self, block: &BlockId, records: &[ParcelRecord]) -> Result<()> {
        let csv = records_to_csv(records);
        write_atomic(&self.export_path(block), csv.as_bytes()).await
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let mut file = fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn block() -> BlockId {
        "77:01:0001001".parse().unwrap()
    }

    fn record(num: u32) -> ParcelRecord {
        ParcelRecord {
            cadastral_number: block().parcel_id(num),
            address: format!("Plot {num}"),
            ..ParcelRecord::default()
        }
    }

    fn state_after(last_checked: u32, found: &[u32]) -> ScanState {
        let range = ScanRange::new(block(), 1, 200).unwrap();
        let mut state = ScanState::new(range);
        state.cursor = last_checked + 1;
        state.not_found_streak = 4;
        state.records = found.iter().copied().map(record).collect();
        state
    }

    #[tokio::test]
    async fn round_trip_keeps_records_and_resume_point() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("out"));
        let state = state_after(57, &[3, 12, 40]);

        assert!(store.save(&state).await);
        assert!(store.exists(&block()).await);
        assert!(store.export_path(&block()).exists());

        let loaded = store.load(&block()).await.unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.cursor, 58);
        assert_eq!(loaded.found_count(), 3);
    }

    #[tokio::test]
    async fn document_layout() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());
        assert!(store.save(&state_after(50, &[7])).await);

        let raw = std::fs::read_to_string(store.checkpoint_path(&block())).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["metadata"]["block_id"], "77:01:0001001");
        assert_eq!(doc["metadata"]["last_checked"], 50);
        assert_eq!(doc["stats"]["total_checked"], 50);
        assert_eq!(doc["stats"]["found_count"], 1);
        assert_eq!(doc["stats"]["completion"], "25.00%");
        assert_eq!(doc["records"][0]["cadastral_number"], "77:01:0001001:7");
        assert!(!store.dir().join("checkpoint_77_01_0001001.json.tmp").exists());
    }

    #[tokio::test]
    async fn no_export_without_records() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());
        assert!(store.save(&state_after(10, &[])).await);
        assert!(store.exists(&block()).await);
        assert!(!store.export_path(&block()).exists());
    }

    #[tokio::test]
    async fn missing_checkpoint_loads_nothing() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());
        assert!(!store.exists(&block()).await);
        assert!(store.load(&block()).await.is_none());
    }

    #[tokio::test]
    async fn corrupt_checkpoint_loads_nothing() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());
        std::fs::write(store.checkpoint_path(&block()), b"{\"metadata\": ").unwrap();
        assert!(store.load(&block()).await.is_none());
    }

    #[tokio::test]
    async fn missing_streak_defaults_to_zero() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());
        let doc = serde_json::json!({
            "metadata": { "block_id": "77:01:0001001", "start": 1, "end": 9, "last_checked": 4, "timestamp": "" },
            "stats": { "total_checked": 4, "found_count": 0, "completion": "44.44%" },
            "records": []
        });
        std::fs::write(store.checkpoint_path(&block()), doc.to_string()).unwrap();

        let state = store.load(&block()).await.unwrap();
        assert_eq!(state.cursor, 5);
        assert_eq!(state.not_found_streak, 0);
    }

    #[tokio::test]
    async fn discard_removes_checkpoint_and_export() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());
        assert!(store.save(&state_after(20, &[2])).await);

        assert!(store.discard(&block()).await);
        assert!(!store.exists(&block()).await);
        assert!(!store.export_path(&block()).exists());
        // Nothing left to remove is not a failure.
        assert!(store.discard(&block()).await);
    }

    #[tokio::test]
    async fn unwritable_dir_reports_failure() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("occupied");
        std::fs::write(&file, b"").unwrap();
        let store = CheckpointStore::new(&file);
        assert!(!store.save(&state_after(1, &[1])).await);
    }
}
