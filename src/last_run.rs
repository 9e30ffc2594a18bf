use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

const LAST_RUN_FILE: &str = "last_run.json";

/// Remembers when the engine last ran so callers can skip redundant runs.
///
/// This is only a hint: losing or resetting it makes the next run do a full
/// pass, which the engine's own existence checks keep duplicate-free.
#[derive(Debug, Clone)]
pub struct LastRunCache {
    path: PathBuf,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct LastRunRecord {
    ran_at: DateTime<Local>,
}

impl LastRunCache {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        LastRunCache { path: dir.as_ref().join(LAST_RUN_FILE) }
    }

    /// The recorded time, if any. An unreadable record counts as no record.
    pub fn last_run(&self) -> Option<DateTime<Local>> {
        let s = fs::read_to_string(&self.path).ok()?;
        serde_json::from_str::<LastRunRecord>(&s).ok().map(|r| r.ran_at)
    }

    pub fn record(&self, ran_at: DateTime<Local>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let s = serde_json::to_string_pretty(&LastRunRecord { ran_at })?;
        fs::write(&self.path, s).map_err(|e| StoreError::io(&self.path, e))
    }

    /// True when a run was recorded on `today`.
    pub fn ran_on(&self, today: NaiveDate) -> bool {
        self.last_run().is_some_and(|t| t.date_naive() == today)
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| StoreError::io(&self.path, e))?;
        }
        Ok(())
    }
}
