//! Timestamped artifact naming

use chrono::{Local, NaiveDateTime};
use std::path::{Path, PathBuf};

/// The moment an export run started.
///
/// Every artifact of one run carries the same stamp:
/// - `database-export-<YYYYMMDD_HHMMSS>.json`
/// - `database-export-<YYYYMMDD_HHMMSS>.sql`
/// - `csv-export-<YYYYMMDD_HHMMSS>/`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExportStamp(NaiveDateTime);

impl ExportStamp {
    pub fn now() -> Self {
        Self(Local::now().naive_local())
    }

    pub fn at(time: NaiveDateTime) -> Self {
        Self(time)
    }

    /// `YYYYMMDD_HHMMSS`, used in file names
    pub fn suffix(&self) -> String {
        self.0.format("%Y%m%d_%H%M%S").to_string()
    }

    /// ISO-8601 local time with microseconds
    pub fn iso(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }

    pub fn json_path(&self, dir: impl AsRef<Path>) -> PathBuf {
        dir.as_ref()
            .join(format!("database-export-{}.json", self.suffix()))
    }

    pub fn sql_path(&self, dir: impl AsRef<Path>) -> PathBuf {
        dir.as_ref()
            .join(format!("database-export-{}.sql", self.suffix()))
    }

    pub fn csv_dir(&self, dir: impl AsRef<Path>) -> PathBuf {
        dir.as_ref().join(format!("csv-export-{}", self.suffix()))
    }
}
