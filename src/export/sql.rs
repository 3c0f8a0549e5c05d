//! SQL script export
//!
//! The script truncates every table, re-inserts the rows and finally resets
//! each table's `id` sequence:
//!
//! ```sql
//! -- Export of database shop
//! -- Date: 2024-03-09T07:05:01.000250
//! -- Generated automatically
//!
//! -- Reset tables
//! TRUNCATE TABLE users CASCADE;
//! TRUNCATE TABLE posts CASCADE;
//!
//! -- Data for posts
//! INSERT INTO posts (id, title) VALUES (1, 'It''s alive');
//!
//! -- Reset sequences
//! SELECT setval('posts_id_seq', (SELECT MAX(id) FROM posts));
//! SELECT setval('users_id_seq', (SELECT MAX(id) FROM users));
//! ```
//!
//! The sequence reset is emitted for every table and assumes an `id` column
//! backed by a sequence named `<table>_id_seq`. Tables without one make those
//! statements fail at import time.
//!
//! Identifiers are emitted bare when they are lower-case and not reserved
//! (`users`), double-quoted otherwise (`"User"`, `"order"`). Array columns are
//! written as PostgreSQL array literals (`'{1,2}'`), `json`/`jsonb` values as
//! their JSON text.

use super::{ExportFormat, WriteReport};
use crate::etl::{Column, Row, TableSource};
use crate::storage::ExportStamp;
use eyre::{Context, Result};
use owo_colors::OwoColorize;
use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static PLAIN_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_$]*$").expect("valid identifier regex"));

/// Keywords PostgreSQL reserves outright or for type and function names
const RESERVED_KEYWORDS: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric",
    "authorization", "binary", "both", "case", "cast", "check", "collate", "collation",
    "column", "concurrently", "constraint", "create", "cross", "current_catalog",
    "current_date", "current_role", "current_schema", "current_time", "current_timestamp",
    "current_user", "default", "deferrable", "desc", "distinct", "do", "else", "end",
    "except", "false", "fetch", "for", "foreign", "freeze", "from", "full", "grant",
    "group", "having", "ilike", "in", "initially", "inner", "intersect", "into", "is",
    "isnull", "join", "lateral", "leading", "left", "like", "limit", "localtime",
    "localtimestamp", "natural", "not", "notnull", "null", "offset", "on", "only", "or",
    "order", "outer", "overlaps", "placing", "primary", "references", "returning", "right",
    "select", "session_user", "similar", "some", "symmetric", "system_user", "table",
    "tablesample", "then", "to", "trailing", "true", "union", "unique", "user", "using",
    "variadic", "verbose", "when", "where", "window", "with",
];

/// Render a value as a SQL literal
///
/// - null: `NULL`
/// - numbers: as-is
/// - booleans: `TRUE` / `FALSE`
/// - anything else: single-quoted text with `'` doubled
pub fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::String(s) => quote_text(s),
        other => quote_text(&other.to_string()),
    }
}

fn quote_text(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Render an array column value as a quoted PostgreSQL array literal
///
/// `[1, null, "a\"b"]` becomes `'{1,NULL,"a\"b"}'`. Nested arrays become
/// nested braces and objects are written as quoted JSON text.
pub fn sql_array_literal(value: &Value) -> String {
    match value {
        Value::Array(_) => quote_text(&array_text(value)),
        other => sql_literal(other),
    }
}

fn array_text(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::String(s) => array_element(s),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(array_text).collect();
            format!("{{{}}}", items.join(","))
        }
        Value::Object(_) => array_element(&value.to_string()),
    }
}

fn array_element(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Render a table or column name
///
/// Quotes names PostgreSQL would fold, reject or read as a keyword.
pub fn sql_identifier(name: &str) -> Cow<'_, str> {
    if PLAIN_IDENTIFIER.is_match(name) && !RESERVED_KEYWORDS.contains(&name) {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("\"{}\"", name.replace('"', "\"\"")))
    }
}

/// Writes `database-export-<stamp>.sql`
pub struct SqlWriter {
    output_dir: PathBuf,
    label: String,
    stamp: ExportStamp,
}

impl SqlWriter {
    pub fn new(output_dir: impl AsRef<Path>, label: &str, stamp: ExportStamp) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            label: label.to_string(),
            stamp,
        }
    }

    /// Render the whole script
    pub async fn render<S: TableSource>(&self, source: &S) -> Result<(String, WriteReport)> {
        let path = self.stamp.sql_path(&self.output_dir);
        let mut report = WriteReport::new(ExportFormat::Sql, path);
        let mut script = String::new();

        let tables = source.list_tables().await?;

        writeln!(script, "-- Export of database {}", self.label)?;
        writeln!(script, "-- Date: {}", self.stamp.iso())?;
        writeln!(script, "-- Generated automatically")?;
        writeln!(script)?;

        // Reverse order so children tend to go before their parents
        writeln!(script, "-- Reset tables")?;
        for table in tables.iter().rev() {
            writeln!(script, "TRUNCATE TABLE {} CASCADE;", sql_identifier(table))?;
        }
        writeln!(script)?;

        for table in &tables {
            log::info!("Generating SQL for: {}", table.cyan());
            match self.render_inserts(source, table).await {
                Ok((block, rows)) => {
                    if rows > 0 {
                        log::info!("   ✓ {} INSERT statement(s) generated", rows);
                    }
                    script.push_str(&block);
                    report.record_success(table, rows);
                }
                Err(e) => report.record_failure(table, &e),
            }
        }

        writeln!(script, "-- Reset sequences")?;
        for table in &tables {
            writeln!(
                script,
                "SELECT setval('{}', (SELECT MAX(id) FROM {}));",
                sql_identifier(&format!("{}_id_seq", table)).replace('\'', "''"),
                sql_identifier(table)
            )?;
        }

        Ok((script, report))
    }

    /// Render the data block of one table, empty when it has no rows
    async fn render_inserts<S: TableSource>(
        &self,
        source: &S,
        table: &str,
    ) -> Result<(String, usize)> {
        let rows = source.read_table(table).await?;
        if rows.is_empty() {
            return Ok((String::new(), 0));
        }

        let mut columns = source.table_columns(table).await?;
        if columns.is_empty() {
            columns = rows[0].keys().map(|name| Column::new(name, "")).collect();
        }

        let table_name = sql_identifier(table);
        let column_list = columns
            .iter()
            .map(|c| sql_identifier(&c.name))
            .collect::<Vec<_>>()
            .join(", ");

        let mut block = String::new();
        writeln!(block, "-- Data for {}", table)?;
        for row in &rows {
            writeln!(
                block,
                "INSERT INTO {} ({}) VALUES ({});",
                table_name,
                column_list,
                row_values(row, &columns)
            )?;
        }
        writeln!(block)?;

        Ok((block, rows.len()))
    }

    /// Render the script and write it to disk
    pub async fn write<S: TableSource>(&self, source: &S) -> Result<WriteReport> {
        let (script, report) = self.render(source).await?;

        std::fs::write(&report.path, script).with_context(|| {
            format!("Failed to write SQL export: {}", report.path.display())
        })?;

        log::debug!("Wrote {}", report.path.display().bright_black());
        Ok(report)
    }
}

fn row_values(row: &Row, columns: &[Column]) -> String {
    columns
        .iter()
        .map(|column| {
            let value = row.get(&column.name).unwrap_or(&Value::Null);
            if column.is_array() {
                sql_array_literal(value)
            } else {
                sql_literal(value)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::etl::MemorySource;
    use chrono::NaiveDate;
    use serde_json::json;

    fn writer() -> SqlWriter {
        let stamp = ExportStamp::at(
            NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(3, 4, 5)
                .unwrap(),
        );
        SqlWriter::new(".", "shop", stamp)
    }

    #[test]
    fn test_literals() {
        assert_eq!(sql_literal(&json!(null)), "NULL");
        assert_eq!(sql_literal(&json!(42)), "42");
        assert_eq!(sql_literal(&json!(-1.5)), "-1.5");
        assert_eq!(sql_literal(&json!(true)), "TRUE");
        assert_eq!(sql_literal(&json!(false)), "FALSE");
        assert_eq!(sql_literal(&json!("O'Brien")), "'O''Brien'");
        assert_eq!(
            sql_literal(&json!("2024-01-01T00:00:00")),
            "'2024-01-01T00:00:00'"
        );
        assert_eq!(sql_literal(&json!({"a": "it's"})), r#"'{"a":"it''s"}'"#);
    }

    #[test]
    fn test_identifiers() {
        assert_eq!(sql_identifier("users"), "users");
        assert_eq!(sql_identifier("_prisma_migrations"), "_prisma_migrations");
        assert_eq!(sql_identifier("User"), "\"User\"");
        assert_eq!(sql_identifier("created at"), "\"created at\"");
        assert_eq!(sql_identifier("1st"), "\"1st\"");
    }

    #[test]
    fn test_reserved_identifiers_are_quoted() {
        assert_eq!(sql_identifier("user"), "\"user\"");
        assert_eq!(sql_identifier("order"), "\"order\"");
        assert_eq!(sql_identifier("group"), "\"group\"");
        assert_eq!(sql_identifier("orders"), "orders");
        assert_eq!(sql_identifier("username"), "username");
    }

    #[test]
    fn test_array_literals() {
        assert_eq!(sql_array_literal(&json!([1, 2])), "'{1,2}'");
        assert_eq!(sql_array_literal(&json!([])), "'{}'");
        assert_eq!(sql_array_literal(&json!([[1, 2], [3, null]])), "'{{1,2},{3,NULL}}'");
        assert_eq!(sql_array_literal(&json!([true, false])), "'{true,false}'");
        assert_eq!(
            sql_array_literal(&json!(["it's", "say \"hi\"", "a,b", "back\\slash"])),
            r#"'{"it''s","say \"hi\"","a,b","back\\slash"}'"#
        );
        assert_eq!(sql_array_literal(&json!(null)), "NULL");
    }

    #[tokio::test]
    async fn test_array_and_json_columns() {
        let source = MemorySource::new().with_typed_table(
            "posts",
            &[("id", "integer"), ("tags", "ARRAY"), ("meta", "jsonb")],
            vec![json!({"id": 1, "tags": ["rust", "sql"], "meta": [1, 2]})],
        );

        let (script, _) = writer().render(&source).await.unwrap();
        assert!(script.contains(
            r#"INSERT INTO posts (id, tags, meta) VALUES (1, '{"rust","sql"}', '[1,2]');"#
        ));
    }

    #[tokio::test]
    async fn test_reserved_table_and_column_names() {
        let source = MemorySource::new().with_table(
            "user",
            &["id", "order"],
            vec![json!({"id": 1, "order": 2})],
        );

        let (script, _) = writer().render(&source).await.unwrap();
        assert!(script.contains("TRUNCATE TABLE \"user\" CASCADE;"));
        assert!(script.contains("INSERT INTO \"user\" (id, \"order\") VALUES (1, 2);"));
        assert!(script.contains(
            "SELECT setval('user_id_seq', (SELECT MAX(id) FROM \"user\"));"
        ));
    }

    #[tokio::test]
    async fn test_script_layout() {
        let source = MemorySource::new()
            .with_table(
                "users",
                &["id", "name", "active"],
                vec![
                    json!({"id": 1, "name": "Ada", "active": true}),
                    json!({"id": 2, "name": "O'Neil", "active": null}),
                ],
            )
            .with_table("posts", &["id"], vec![]);

        let (script, report) = writer().render(&source).await.unwrap();
        let lines: Vec<&str> = script.lines().collect();

        assert_eq!(
            lines,
            vec![
                "-- Export of database shop",
                "-- Date: 2024-01-02T03:04:05.000000",
                "-- Generated automatically",
                "",
                "-- Reset tables",
                "TRUNCATE TABLE users CASCADE;",
                "TRUNCATE TABLE posts CASCADE;",
                "",
                "-- Data for users",
                "INSERT INTO users (id, name, active) VALUES (1, 'Ada', TRUE);",
                "INSERT INTO users (id, name, active) VALUES (2, 'O''Neil', NULL);",
                "",
                "-- Reset sequences",
                "SELECT setval('posts_id_seq', (SELECT MAX(id) FROM posts));",
                "SELECT setval('users_id_seq', (SELECT MAX(id) FROM users));",
            ]
        );
        assert_eq!(
            report.exported,
            vec![("posts".to_string(), 0), ("users".to_string(), 2)]
        );
    }

    #[tokio::test]
    async fn test_columns_follow_ordinal_order() {
        let source = MemorySource::new().with_table(
            "items",
            &["id", "price", "label"],
            vec![json!({"label": "pen", "id": 7, "price": 1.25})],
        );

        let (script, _) = writer().render(&source).await.unwrap();
        assert!(
            script.contains("INSERT INTO items (id, price, label) VALUES (7, 1.25, 'pen');")
        );
    }

    #[tokio::test]
    async fn test_missing_column_renders_null() {
        let source = MemorySource::new().with_table(
            "items",
            &["id", "note"],
            vec![json!({"id": 1})],
        );

        let (script, _) = writer().render(&source).await.unwrap();
        assert!(script.contains("INSERT INTO items (id, note) VALUES (1, NULL);"));
    }

    #[tokio::test]
    async fn test_quoted_table_names() {
        let source = MemorySource::new().with_table(
            "User",
            &["id", "createdAt"],
            vec![json!({"id": 1, "createdAt": "2024-01-01"})],
        );

        let (script, _) = writer().render(&source).await.unwrap();
        assert!(script.contains("TRUNCATE TABLE \"User\" CASCADE;"));
        assert!(script.contains(
            "INSERT INTO \"User\" (id, \"createdAt\") VALUES (1, '2024-01-01');"
        ));
        assert!(script.contains(
            "SELECT setval('\"User_id_seq\"', (SELECT MAX(id) FROM \"User\"));"
        ));
    }

    #[tokio::test]
    async fn test_unreadable_table_keeps_truncate_and_setval() {
        let source = MemorySource::new()
            .with_table("users", &["id"], vec![json!({"id": 1})])
            .with_unreadable_table("audit");

        let (script, report) = writer().render(&source).await.unwrap();
        assert!(script.contains("TRUNCATE TABLE audit CASCADE;"));
        assert!(script.contains("SELECT setval('audit_id_seq'"));
        assert!(!script.contains("-- Data for audit"));
        assert_eq!(report.failed_tables(), vec!["audit"]);
    }
}
