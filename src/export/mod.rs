//! Table export to JSON, SQL and CSV artifacts
//!
//! Each writer re-reads the catalog through a [`TableSource`], exports every
//! table it can and records the ones it cannot in its [`WriteReport`]. A
//! failing table never stops a writer; a failing catalog does.

mod csv;
mod json;
mod sql;

pub use self::csv::{CsvWriter, csv_cell, csv_file_name};
pub use json::{ExportBundle, JsonWriter};
pub use sql::{SqlWriter, sql_array_literal, sql_identifier, sql_literal};

use crate::etl::TableSource;
use crate::storage::ExportStamp;
use clap::ValueEnum;
use eyre::{Context, Result};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};

/// Artifact formats selectable on the command line
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Sql,
    Csv,
    All,
}

impl ExportFormat {
    /// The concrete formats to write, in run order
    pub fn expand(self) -> Vec<ExportFormat> {
        match self {
            Self::All => vec![Self::Json, Self::Sql, Self::Csv],
            other => vec![other],
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => write!(f, "JSON"),
            Self::Sql => write!(f, "SQL"),
            Self::Csv => write!(f, "CSV"),
            Self::All => write!(f, "all"),
        }
    }
}

/// Outcome of one writer run
#[derive(Clone, Debug)]
pub struct WriteReport {
    pub format: ExportFormat,
    /// File (JSON, SQL) or directory (CSV) written
    pub path: PathBuf,
    /// Tables handled successfully with their row counts, in catalog order
    pub exported: Vec<(String, usize)>,
    /// Tables skipped with the reason
    pub failed: Vec<(String, String)>,
}

impl WriteReport {
    pub fn new(format: ExportFormat, path: impl Into<PathBuf>) -> Self {
        Self {
            format,
            path: path.into(),
            exported: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn record_success(&mut self, table: &str, rows: usize) {
        self.exported.push((table.to_string(), rows));
    }

    pub fn record_failure(&mut self, table: &str, error: &eyre::Report) {
        log::warn!("   ✗ Failed to export {}: {:#}", table.yellow(), error);
        self.failed.push((table.to_string(), format!("{:#}", error)));
    }

    /// Total rows across successful tables
    pub fn row_count(&self) -> usize {
        self.exported.iter().map(|(_, rows)| rows).sum()
    }

    pub fn exported_tables(&self) -> Vec<&str> {
        self.exported.iter().map(|(t, _)| t.as_str()).collect()
    }

    pub fn failed_tables(&self) -> Vec<&str> {
        self.failed.iter().map(|(t, _)| t.as_str()).collect()
    }
}

/// Runs the requested writers in order against one source
///
/// # Example
/// ```no_run
/// use pgsnap::etl::MemorySource;
/// use pgsnap::export::{ExportFormat, Exporter};
///
/// # async fn example() -> eyre::Result<()> {
/// let source = MemorySource::new();
/// let exporter = Exporter::new(&source, "data-exports", "shop");
/// let reports = exporter.run(ExportFormat::All).await?;
/// assert_eq!(reports.len(), 3);
/// # Ok(())
/// # }
/// ```
pub struct Exporter<'a, S> {
    source: &'a S,
    output_dir: PathBuf,
    label: String,
    stamp: ExportStamp,
}

impl<'a, S: TableSource> Exporter<'a, S> {
    pub fn new(source: &'a S, output_dir: impl AsRef<Path>, label: &str) -> Self {
        Self {
            source,
            output_dir: output_dir.as_ref().to_path_buf(),
            label: label.to_string(),
            stamp: ExportStamp::now(),
        }
    }

    /// Use a fixed stamp instead of the current time
    pub fn with_stamp(mut self, stamp: ExportStamp) -> Self {
        self.stamp = stamp;
        self
    }

    pub fn stamp(&self) -> ExportStamp {
        self.stamp
    }

    /// Write every format selected by `format`
    ///
    /// # Errors
    /// Returns the first writer error (catalog query or artifact I/O). Writers
    /// after the failing one are not run.
    pub async fn run(&self, format: ExportFormat) -> Result<Vec<WriteReport>> {
        std::fs::create_dir_all(&self.output_dir).with_context(|| {
            format!(
                "Failed to create output directory: {}",
                self.output_dir.display()
            )
        })?;

        let mut reports = Vec::new();
        for format in format.expand() {
            log::info!("Creating {} export...", format.cyan());
            let report = match format {
                ExportFormat::Json => {
                    JsonWriter::new(&self.output_dir, &self.label, self.stamp)
                        .write(self.source)
                        .await?
                }
                ExportFormat::Sql => {
                    SqlWriter::new(&self.output_dir, &self.label, self.stamp)
                        .write(self.source)
                        .await?
                }
                ExportFormat::Csv => {
                    CsvWriter::new(&self.output_dir, self.stamp)
                        .write(self.source)
                        .await?
                }
                ExportFormat::All => unreachable!("expand() yields concrete formats"),
            };

            log::info!(
                "✓ {} export created: {} ({} table(s), {} row(s), {} failed)",
                format,
                report.path.display().bright_black(),
                report.exported.len(),
                report.row_count(),
                report.failed.len()
            );
            reports.push(report);
        }

        Ok(reports)
    }
}
