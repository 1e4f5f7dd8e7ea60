//! Timestamped JSON output files.
//!
//! Every run writes derived records (EV bets, predictions, value bets) to a
//! fresh file named `{sport}_{league|all}_{kind}_{YYYYmmdd_HHMMSS}.json`.
//! Nothing is updated in place.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::Result;

pub struct JsonRecordWriter {
    dir: PathBuf,
}

impl JsonRecordWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name(sport: &str, league: Option<&str>, kind: &str, at: DateTime<Utc>) -> String {
        format!(
            "{}_{}_{}_{}.json",
            sport,
            league.unwrap_or("all"),
            kind,
            at.format("%Y%m%d_%H%M%S")
        )
    }

    /// Write `records`; returns the file path, or `None` if there was nothing to write
    pub async fn write<T: Serialize>(
        &self,
        sport: &str,
        league: Option<&str>,
        kind: &str,
        records: &[T],
    ) -> Result<Option<PathBuf>> {
        self.write_at(sport, league, kind, records, Utc::now()).await
    }

    pub async fn write_at<T: Serialize>(
        &self,
        sport: &str,
        league: Option<&str>,
        kind: &str,
        records: &[T],
        at: DateTime<Utc>,
    ) -> Result<Option<PathBuf>> {
        if records.is_empty() {
            warn!(sport, league = league.unwrap_or("all"), kind, "No records to save");
            return Ok(None);
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(Self::file_name(sport, league, kind, at));
        tokio::fs::write(&path, serde_json::to_vec_pretty(records)?).await?;

        info!(count = records.len(), path = %path.display(), "Saved {}", kind);
        Ok(Some(path))
    }
}
