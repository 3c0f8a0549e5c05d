//! In-memory table source

use super::{Column, Row, TableSource};
use eyre::{Result, bail, eyre};

struct MemoryTable {
    name: String,
    columns: Vec<Column>,
    rows: Vec<Row>,
    readable: bool,
}

/// A [`TableSource`] backed by tables held in memory
///
/// A test double for exercising the writers without a PostgreSQL server.
/// It is not meant for production exports.
///
/// # Example
/// ```
/// use pgsnap::etl::MemorySource;
/// use serde_json::json;
///
/// let source = MemorySource::new()
///     .with_table("users", &["id", "name"], vec![json!({"id": 1, "name": "Ada"})])
///     .with_unreadable_table("audit_log");
/// ```
#[derive(Default)]
pub struct MemorySource {
    tables: Vec<MemoryTable>,
    catalog_error: Option<String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table whose columns are all `text`. Non-object values in `rows`
    /// are ignored.
    pub fn with_table(self, name: &str, columns: &[&str], rows: Vec<serde_json::Value>) -> Self {
        let columns: Vec<(&str, &str)> = columns.iter().map(|c| (*c, "text")).collect();
        self.with_typed_table(name, &columns, rows)
    }

    /// Add a table with `(name, data_type)` columns
    pub fn with_typed_table(
        mut self,
        name: &str,
        columns: &[(&str, &str)],
        rows: Vec<serde_json::Value>,
    ) -> Self {
        let rows = rows
            .into_iter()
            .filter_map(|row| match row {
                serde_json::Value::Object(map) => Some(map),
                _ => None,
            })
            .collect();

        self.tables.push(MemoryTable {
            name: name.to_string(),
            columns: columns
                .iter()
                .map(|(name, data_type)| Column::new(*name, *data_type))
                .collect(),
            rows,
            readable: true,
        });
        self
    }

    /// Add a table that shows up in the catalog but fails every read
    pub fn with_unreadable_table(mut self, name: &str) -> Self {
        self.tables.push(MemoryTable {
            name: name.to_string(),
            columns: Vec::new(),
            rows: Vec::new(),
            readable: false,
        });
        self
    }

    /// Make catalog listing fail with `message`
    pub fn with_catalog_error(mut self, message: &str) -> Self {
        self.catalog_error = Some(message.to_string());
        self
    }

    fn find(&self, table: &str) -> Result<&MemoryTable> {
        let found = self
            .tables
            .iter()
            .find(|t| t.name == table)
            .ok_or_else(|| eyre!("relation \"{}\" does not exist", table))?;

        if !found.readable {
            bail!("permission denied for table {}", table);
        }
        Ok(found)
    }
}

impl TableSource for MemorySource {
    async fn list_tables(&self) -> Result<Vec<String>> {
        if let Some(message) = &self.catalog_error {
            bail!("{}", message);
        }

        let mut names: Vec<String> = self.tables.iter().map(|t| t.name.clone()).collect();
        names.sort();
        Ok(names)
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<Column>> {
        Ok(self.find(table)?.columns.clone())
    }

    async fn read_table(&self, table: &str) -> Result<Vec<Row>> {
        Ok(self.find(table)?.rows.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_tables_listed_alphabetically() {
        let source = MemorySource::new()
            .with_table("users", &["id"], vec![])
            .with_table("accounts", &["id"], vec![]);

        let tables = source.list_tables().await.unwrap();
        assert_eq!(tables, vec!["accounts", "users"]);
    }

    #[tokio::test]
    async fn test_read_keeps_column_order() {
        let source = MemorySource::new().with_table(
            "users",
            &["zeta", "alpha"],
            vec![json!({"zeta": 1, "alpha": 2})],
        );

        let rows = source.read_table("users").await.unwrap();
        let keys: Vec<&String> = rows[0].keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
    }

    #[tokio::test]
    async fn test_typed_columns() {
        let source = MemorySource::new()
            .with_typed_table("posts", &[("id", "integer"), ("tags", "ARRAY")], vec![])
            .with_table("users", &["name"], vec![]);

        let posts = source.table_columns("posts").await.unwrap();
        assert_eq!(posts[1], Column::new("tags", "ARRAY"));
        let users = source.table_columns("users").await.unwrap();
        assert_eq!(users, vec![Column::new("name", "text")]);
    }

    #[tokio::test]
    async fn test_unreadable_table() {
        let source = MemorySource::new().with_unreadable_table("secret");

        assert_eq!(source.list_tables().await.unwrap(), vec!["secret"]);
        let err = source.read_table("secret").await.unwrap_err();
        assert!(err.to_string().contains("permission denied"));
    }

    #[tokio::test]
    async fn test_catalog_error() {
        let source = MemorySource::new().with_catalog_error("connection reset");
        assert!(source.list_tables().await.is_err());
    }
}
