//! PostgreSQL client module
//!
//! Provides `PostgresClient`, the [`TableSource`] used for real exports.

use super::ConnectionParams;
use crate::etl::{Column, Row, TableSource};
use eyre::{Context, Result};
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls};

/// A single PostgreSQL connection scoped to one schema.
///
/// All queries run one after another on the same connection. Call
/// [`PostgresClient::close`] when done so the connection task shuts down.
///
/// # Example
/// ```no_run
/// use pgsnap::client::{ConnectionParams, PostgresClient};
/// use pgsnap::etl::TableSource;
///
/// # async fn example() -> eyre::Result<()> {
/// let client = PostgresClient::connect(&ConnectionParams::default(), "public").await?;
/// for table in client.list_tables().await? {
///     println!("{}", table);
/// }
/// client.close().await;
/// # Ok(())
/// # }
/// ```
pub struct PostgresClient {
    client: Client,
    connection: JoinHandle<()>,
    schema: String,
}

impl PostgresClient {
    /// Open a connection
    ///
    /// # Errors
    /// Returns an error if the server is unreachable or rejects the login.
    pub async fn connect(params: &ConnectionParams, schema: &str) -> Result<Self> {
        let (client, connection) = params
            .to_pg_config()
            .connect(NoTls)
            .await
            .with_context(|| format!("Failed to connect to PostgreSQL at {}", params))?;

        // Drive the connection until the client is dropped
        let connection = tokio::spawn(async move {
            if let Err(e) = connection.await {
                log::error!("PostgreSQL connection error: {}", e);
            }
        });

        Ok(Self {
            client,
            connection,
            schema: schema.to_string(),
        })
    }

    /// The schema this client reads from
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// List the names of all non-template databases on the server
    pub async fn list_databases(&self) -> Result<Vec<String>> {
        let rows = self
            .client
            .query(
                "SELECT datname FROM pg_database WHERE datistemplate = false",
                &[],
            )
            .await
            .context("Failed to list databases")?;

        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    /// Close the connection and wait for the connection task to finish
    pub async fn close(self) {
        drop(self.client);
        if let Err(e) = self.connection.await {
            log::warn!("PostgreSQL connection task ended abnormally: {}", e);
        }
    }
}

impl TableSource for PostgresClient {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let rows = self
            .client
            .query(
                "SELECT table_name::text FROM information_schema.tables \
                 WHERE table_schema = $1 AND table_type = 'BASE TABLE' \
                 ORDER BY table_name",
                &[&self.schema],
            )
            .await
            .with_context(|| format!("Failed to list tables in schema {}", self.schema))?;

        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<Column>> {
        let rows = self
            .client
            .query(
                "SELECT column_name::text, data_type::text FROM information_schema.columns \
                 WHERE table_schema = $1 AND table_name = $2 \
                 ORDER BY ordinal_position",
                &[&self.schema, &table],
            )
            .await
            .with_context(|| format!("Failed to list columns of {}", table))?;

        Ok(rows
            .iter()
            .map(|row| Column::new(row.get::<_, String>(0), row.get::<_, String>(1)))
            .collect())
    }

    async fn read_table(&self, table: &str) -> Result<Vec<Row>> {
        // row_to_json keeps ordinal column order and renders non-JSON types as strings
        let sql = format!(
            "SELECT row_to_json(t)::text FROM {}.{} t",
            quoted(&self.schema),
            quoted(table)
        );
        let rows = self
            .client
            .query(sql.as_str(), &[])
            .await
            .with_context(|| format!("Failed to read table {}", table))?;

        rows.iter()
            .map(|row| -> Result<Row> {
                let text: String = row.try_get(0)?;
                decode_row(&text).with_context(|| format!("Failed to decode a row of {}", table))
            })
            .collect()
    }
}

/// Decode one `row_to_json` document
///
/// Numbers keep their exact text, so `numeric` values beyond `f64` survive.
pub fn decode_row(text: &str) -> Result<Row> {
    Ok(serde_json::from_str(text)?)
}

/// Always double-quote an identifier
fn quoted(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
