//! TableSource trait for reading tables out of a database

use eyre::Result;
use serde_json::{Map, Value};

/// One table row: column name to scalar value, in ordinal column order.
pub type Row = Map<String, Value>;

/// A column as reported by the catalog
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    /// `information_schema.columns.data_type`, e.g. `integer` or `ARRAY`
    pub data_type: String,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }

    /// PostgreSQL array columns, whose rows arrive as JSON arrays
    pub fn is_array(&self) -> bool {
        self.data_type.eq_ignore_ascii_case("ARRAY")
    }
}

/// Source of tables and their rows
///
/// Implementors provide the catalog (which tables exist, which columns they
/// have) and full-table reads. Every call hits the source again; nothing is
/// cached between calls.
///
/// # Example
/// ```no_run
/// use pgsnap::etl::{Column, Row, TableSource};
/// use eyre::Result;
///
/// struct EmptySource;
///
/// impl TableSource for EmptySource {
///     async fn list_tables(&self) -> Result<Vec<String>> {
///         Ok(vec![])
///     }
///
///     async fn table_columns(&self, _table: &str) -> Result<Vec<Column>> {
///         Ok(vec![])
///     }
///
///     async fn read_table(&self, _table: &str) -> Result<Vec<Row>> {
///         Ok(vec![])
///     }
/// }
/// ```
pub trait TableSource: Send + Sync {
    /// List base tables in alphabetical order
    ///
    /// # Errors
    /// Returns an error if the catalog cannot be queried. Callers treat this
    /// as fatal for the current export format.
    fn list_tables(&self) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;

    /// List the columns of `table` in ordinal order
    fn table_columns(
        &self,
        table: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Column>>> + Send;

    /// Read every row of `table`
    ///
    /// # Errors
    /// Returns an error if the table cannot be read. Callers skip the table
    /// and carry on with the rest.
    fn read_table(
        &self,
        table: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Row>>> + Send;
}
