use std::path::{Path, PathBuf};

use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::error::Result;
use crate::types::PredictionRecord;

/// Persisted column order. Matches the field order of [`PredictionRecord`].
pub const COLUMNS: [&str; 31] = [
    "prediction_accuracy",
    "date",
    "time",
    "home",
    "home_probable",
    "away",
    "away_probable",
    "predicted_winner",
    "predicted_winner_location",
    "model",
    "favorite",
    "home_odds",
    "home_odds_bookmaker",
    "away_odds",
    "away_odds_bookmaker",
    "home_score",
    "away_score",
    "winning_pitcher",
    "losing_pitcher",
    "prediction_value",
    "venue",
    "series_status",
    "national_broadcasts",
    "odds_retrieval_time",
    "prediction_generation_time",
    "datetime",
    "game_id",
    "summary",
    "tweet",
    "time_to_tweet",
    "tweeted?",
];

// ---------------------------------------------------------------------------
// PredictionStore
// ---------------------------------------------------------------------------

/// CSV-backed prediction table. Every access reads or rewrites the whole file.
///
/// The table is only reachable through [`PredictionStore::lock`], so each
/// load-mutate-save span runs with exclusive access. Saves go to a sibling temp
/// file that is renamed over the table, so readers never see a half-written file.
pub struct PredictionStore {
    path: PathBuf,
    writer: Mutex<()>,
}

impl PredictionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), writer: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire the process-wide writer lock.
    pub async fn lock(&self) -> StoreGuard<'_> {
        let guard = self.writer.lock().await;
        StoreGuard { store: self, _guard: guard }
    }

    /// Like [`lock`](Self::lock), but gives up after `timeout`.
    pub async fn lock_timeout(&self, timeout: std::time::Duration) -> Option<StoreGuard<'_>> {
        let guard = tokio::time::timeout(timeout, self.writer.lock()).await.ok()?;
        Some(StoreGuard { store: self, _guard: guard })
    }

    /// Convenience read under the lock.
    pub async fn snapshot(&self) -> Result<Vec<PredictionRecord>> {
        self.lock().await.load()
    }

    fn load_unlocked(&self) -> Result<Vec<PredictionRecord>> {
        let mut reader = match csv::Reader::from_path(&self.path) {
            Ok(r) => r,
            Err(e) => match e.kind() {
                csv::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                    debug!(path = %self.path.display(), "No prediction table yet, starting empty");
                    return Ok(Vec::new());
                }
                _ => return Err(e.into()),
            },
        };

        let mut records = Vec::new();
        for row in reader.deserialize() {
            records.push(row?);
        }
        Ok(records)
    }

    fn save_unlocked(&self, records: &[PredictionRecord]) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }

        let tmp = self.path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&tmp)?;
            if records.is_empty() {
                writer.write_record(COLUMNS)?;
            }
            for record in records {
                writer.serialize(record)?;
            }
            writer.flush()?;
        }
        std::fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), rows = records.len(), "Prediction table saved");
        Ok(())
    }
}

/// Exclusive access to the prediction table for one load-mutate-save span.
pub struct StoreGuard<'a> {
    store: &'a PredictionStore,
    _guard: MutexGuard<'a, ()>,
}

impl StoreGuard<'_> {
    /// Read the whole table. A missing file is an empty table.
    pub fn load(&self) -> Result<Vec<PredictionRecord>> {
        self.store.load_unlocked()
    }

    /// Replace the whole table.
    pub fn save(&self, records: &[PredictionRecord]) -> Result<()> {
        self.store.save_unlocked(records)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
