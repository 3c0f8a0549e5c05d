//! JSON bundle export

use super::{ExportFormat, WriteReport};
use crate::etl::TableSource;
use crate::storage::ExportStamp;
use eyre::{Context, Result};
use owo_colors::OwoColorize;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// The single document written by [`JsonWriter`]
///
/// ```json
/// {
///   "exportDate": "2024-03-09T07:05:01.000250",
///   "database": "shop",
///   "tables": {
///     "posts": [],
///     "users": [{"id": 1, "name": "Ada"}]
///   }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    pub export_date: String,
    pub database: String,
    /// Table name to its rows, in catalog order
    pub tables: Map<String, Value>,
}

impl ExportBundle {
    pub fn new(database: &str, stamp: ExportStamp) -> Self {
        Self {
            export_date: stamp.iso(),
            database: database.to_string(),
            tables: Map::new(),
        }
    }

    /// Rows exported for `table`, if it made it into the bundle
    pub fn rows(&self, table: &str) -> Option<&Vec<Value>> {
        self.tables.get(table).and_then(Value::as_array)
    }
}

/// Writes every table into one `database-export-<stamp>.json`
pub struct JsonWriter {
    output_dir: PathBuf,
    label: String,
    stamp: ExportStamp,
}

impl JsonWriter {
    pub fn new(output_dir: impl AsRef<Path>, label: &str, stamp: ExportStamp) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            label: label.to_string(),
            stamp,
        }
    }

    /// Read all tables into a bundle
    ///
    /// Tables that fail to read are left out of the bundle and recorded in
    /// the report.
    pub async fn build<S: TableSource>(
        &self,
        source: &S,
    ) -> Result<(ExportBundle, WriteReport)> {
        let path = self.stamp.json_path(&self.output_dir);
        let mut report = WriteReport::new(ExportFormat::Json, path);
        let mut bundle = ExportBundle::new(&self.label, self.stamp);

        let tables = source.list_tables().await?;
        log::info!("Tables found: {}", tables.join(", "));

        for table in &tables {
            log::info!("Exporting table: {}", table.cyan());
            match source.read_table(table).await {
                Ok(rows) => {
                    log::info!("   ✓ {} record(s) exported", rows.len());
                    report.record_success(table, rows.len());
                    let rows = rows.into_iter().map(Value::Object).collect();
                    bundle.tables.insert(table.clone(), Value::Array(rows));
                }
                Err(e) => report.record_failure(table, &e),
            }
        }

        Ok((bundle, report))
    }

    /// Build the bundle and write it to disk
    pub async fn write<S: TableSource>(&self, source: &S) -> Result<WriteReport> {
        let (bundle, report) = self.build(source).await?;

        let json = serde_json::to_string_pretty(&bundle)?;
        std::fs::write(&report.path, json)
            .with_context(|| format!("Failed to write JSON export: {}", report.path.display()))?;

        log::debug!("Wrote {}", report.path.display().bright_black());
        Ok(report)
    }
}
