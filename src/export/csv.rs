//! Per-table CSV export

use super::{ExportFormat, WriteReport};
use crate::etl::{Row, TableSource};
use crate::storage::ExportStamp;
use eyre::{Context, Result, bail};
use owo_colors::OwoColorize;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Render a value as a CSV cell: empty for null, raw text for strings, JSON otherwise
pub fn csv_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// File name for `table` inside the CSV directory
///
/// Fails for names that would resolve outside it.
pub fn csv_file_name(table: &str) -> Result<String> {
    if table.is_empty() || table == "." || table == ".." {
        bail!("table name {:?} is not a usable file name", table);
    }
    if table.contains(['/', '\\', '\0']) {
        bail!("table name {:?} contains a path separator", table);
    }
    Ok(format!("{}.csv", table))
}

/// Writes one `<table>.csv` per non-empty table into `csv-export-<stamp>/`
pub struct CsvWriter {
    output_dir: PathBuf,
    stamp: ExportStamp,
}

impl CsvWriter {
    pub fn new(output_dir: impl AsRef<Path>, stamp: ExportStamp) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            stamp,
        }
    }

    pub async fn write<S: TableSource>(&self, source: &S) -> Result<WriteReport> {
        let csv_dir = self.stamp.csv_dir(&self.output_dir);
        std::fs::create_dir_all(&csv_dir)
            .with_context(|| format!("Failed to create CSV directory: {}", csv_dir.display()))?;
        let mut report = WriteReport::new(ExportFormat::Csv, &csv_dir);

        for table in source.list_tables().await? {
            log::info!("CSV export for: {}", table.cyan());
            let rows = match source.read_table(&table).await {
                Ok(rows) => rows,
                Err(e) => {
                    report.record_failure(&table, &e);
                    continue;
                }
            };

            if rows.is_empty() {
                report.record_success(&table, 0);
                continue;
            }

            let path = match csv_file_name(&table) {
                Ok(name) => csv_dir.join(name),
                Err(e) => {
                    report.record_failure(&table, &e);
                    continue;
                }
            };
            match write_table(&path, &rows) {
                Ok(()) => {
                    log::info!(
                        "   ✓ {} line(s) exported to {}",
                        rows.len(),
                        path.display().bright_black()
                    );
                    report.record_success(&table, rows.len());
                }
                Err(e) => {
                    // Don't leave a half-written table behind
                    let _ = std::fs::remove_file(&path);
                    report.record_failure(&table, &e);
                }
            }
        }

        Ok(report)
    }
}

/// Write rows to `path` with the first row's keys as the header
fn write_table(path: &Path, rows: &[Row]) -> Result<()> {
    let header: Vec<&String> = match rows.first() {
        Some(first) => first.keys().collect(),
        None => return Ok(()),
    };

    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_path(path)
        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;

    writer.write_record(&header)?;

    for (index, row) in rows.iter().enumerate() {
        if let Some(extra) = row.keys().find(|key| !header.contains(key)) {
            bail!(
                "row {} has column {} which is not in the header",
                index + 1,
                extra
            );
        }

        let record: Vec<String> = header
            .iter()
            .map(|column| row.get(*column).map(csv_cell).unwrap_or_default())
            .collect();
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::etl::MemorySource;
    use chrono::NaiveDate;
    use serde_json::json;
    use tempfile::TempDir;

    fn stamp() -> ExportStamp {
        ExportStamp::at(
            NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(3, 4, 5)
                .unwrap(),
        )
    }

    #[test]
    fn test_cells() {
        assert_eq!(csv_cell(&json!(null)), "");
        assert_eq!(csv_cell(&json!("plain")), "plain");
        assert_eq!(csv_cell(&json!(3)), "3");
        assert_eq!(csv_cell(&json!(true)), "true");
        assert_eq!(csv_cell(&json!(["a"])), "[\"a\"]");
    }

    #[test]
    fn test_file_names() {
        assert_eq!(csv_file_name("users").unwrap(), "users.csv");
        assert_eq!(csv_file_name("User").unwrap(), "User.csv");
        assert_eq!(csv_file_name("..data").unwrap(), "..data.csv");
        assert!(csv_file_name("").is_err());
        assert!(csv_file_name("..").is_err());
        assert!(csv_file_name("../escaped").is_err());
        assert!(csv_file_name("a\\b").is_err());
        assert!(csv_file_name("nul\0").is_err());
    }

    #[tokio::test]
    async fn test_table_names_cannot_leave_the_csv_dir() {
        let temp = TempDir::new().unwrap();
        let output_dir = temp.path().join("out");
        let source = MemorySource::new()
            .with_table("../escaped", &["id"], vec![json!({"id": 1})])
            .with_table("users", &["id"], vec![json!({"id": 1})]);

        let report = CsvWriter::new(&output_dir, stamp())
            .write(&source)
            .await
            .unwrap();

        assert_eq!(report.failed_tables(), vec!["../escaped"]);
        assert!(report.failed[0].1.contains("path separator"));
        assert!(!output_dir.join("escaped.csv").exists());
        assert!(report.path.join("users.csv").exists());
        assert_eq!(std::fs::read_dir(&report.path).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_empty_tables_produce_no_file() {
        let temp = TempDir::new().unwrap();
        let source = MemorySource::new()
            .with_table("users", &["id", "name"], vec![json!({"id": 1, "name": "Ada"})])
            .with_table("posts", &["id"], vec![]);

        let report = CsvWriter::new(temp.path(), stamp())
            .write(&source)
            .await
            .unwrap();

        assert_eq!(report.path, temp.path().join("csv-export-20240102_030405"));
        assert!(report.path.join("users.csv").exists());
        assert!(!report.path.join("posts.csv").exists());
    }

    #[tokio::test]
    async fn test_header_and_quoting() {
        let temp = TempDir::new().unwrap();
        let source = MemorySource::new().with_table(
            "notes",
            &["id", "body", "deleted_at"],
            vec![
                json!({"id": 1, "body": "hello, world", "deleted_at": null}),
                json!({"id": 2, "body": "say \"hi\""}),
            ],
        );

        let report = CsvWriter::new(temp.path(), stamp())
            .write(&source)
            .await
            .unwrap();

        let content = std::fs::read_to_string(report.path.join("notes.csv")).unwrap();
        assert_eq!(
            content,
            "id,body,deleted_at\r\n1,\"hello, world\",\r\n2,\"say \"\"hi\"\"\",\r\n"
        );
    }

    #[tokio::test]
    async fn test_extra_column_fails_table() {
        let temp = TempDir::new().unwrap();
        let source = MemorySource::new()
            .with_table(
                "events",
                &["id"],
                vec![json!({"id": 1}), json!({"id": 2, "surprise": true})],
            )
            .with_table("users", &["id"], vec![json!({"id": 1})]);

        let report = CsvWriter::new(temp.path(), stamp())
            .write(&source)
            .await
            .unwrap();

        assert_eq!(report.failed_tables(), vec!["events"]);
        assert!(report.failed[0].1.contains("surprise"));
        assert!(!report.path.join("events.csv").exists());
        assert!(report.path.join("users.csv").exists());
    }
}
