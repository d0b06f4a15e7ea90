//! Run bookkeeping: store backups and the per-run size log.

use crate::storage::EventStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const SUMMARY_HEADER: &str = "timestamp,num_venues,num_events,scrape_time_s";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub venues: usize,
    pub events: usize,
}

impl StoreStats {
    pub fn of(store: &EventStore) -> Self {
        Self {
            venues: store.venue_count(),
            events: store.event_count(),
        }
    }
}

/// One row of the size log.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub timestamp: DateTime<Utc>,
    pub stats: StoreStats,
    pub elapsed_secs: f64,
}

impl RunSummary {
    fn csv_row(&self) -> String {
        format!(
            "{},{},{},{:.2}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.stats.venues,
            self.stats.events,
            self.elapsed_secs
        )
    }
}

/// `docs/events_db.json` -> `docs/events_db_copy.json`
pub fn backup_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}_copy.{}", stem, ext.to_string_lossy()),
        None => format!("{}_copy", stem),
    };
    path.with_file_name(name)
}

/// Copies the store document aside. A missing store is not an error; there
/// is simply nothing to back up yet.
pub fn backup_store(path: &Path) -> std::io::Result<Option<PathBuf>> {
    if !path.exists() {
        warn!("No store at {} to back up", path.display());
        return Ok(None);
    }
    let target = backup_path(path);
    fs::copy(path, &target)?;
    info!("Backed up {} to {}", path.display(), target.display());
    Ok(Some(target))
}

/// Appends one row to the size log, writing the header when the file is new.
pub fn append_summary(csv_path: &Path, summary: &RunSummary) -> std::io::Result<()> {
    if let Some(parent) = csv_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let needs_header = fs::metadata(csv_path).map(|m| m.len() == 0).unwrap_or(true);

    let mut file = OpenOptions::new().create(true).append(true).open(csv_path)?;
    if needs_header {
        writeln!(file, "{}", SUMMARY_HEADER)?;
    }
    writeln!(file, "{}", summary.csv_row())?;
    Ok(())
}
