//! CLI helper functions

use crate::{
    client::{ConnectionOverrides, ConnectionParams, DEFAULT_DATABASE, PostgresClient},
    export::{ExportFormat, Exporter, WriteReport},
    storage::{read_config_file, write_config_file},
};
use eyre::{Context, Result};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};

/// Substrings used to guess the application database when none is configured
pub const DEFAULT_DATABASE_HINTS: &[&str] = &["video", "ia", "net"];

/// Options for [`export_database`]
#[derive(Clone, Debug)]
pub struct ExportOptions {
    pub format: ExportFormat,
    pub output_dir: PathBuf,
    /// Explicit `db_config.json` to take the connection from
    pub config: Option<PathBuf>,
    pub overrides: ConnectionOverrides,
    pub schema: String,
    /// Export label; defaults to the database name
    pub label: Option<String>,
}

/// Options for [`configure`]
#[derive(Clone, Debug)]
pub struct ConfigureOptions {
    pub output: PathBuf,
    pub overrides: ConnectionOverrides,
    pub hints: Vec<String>,
    pub skip_test: bool,
}

/// Resolve the connection for an export
///
/// Uses the config file when one is given, the environment otherwise, then
/// applies command-line overrides on top.
pub fn load_connection_params(
    config: Option<&Path>,
    overrides: &ConnectionOverrides,
) -> Result<ConnectionParams> {
    let params = match config {
        Some(path) => {
            log::info!("Reading connection from {}", path.display().bright_black());
            read_config_file(path)?
        }
        None => ConnectionParams::from_env()?,
    };
    Ok(overrides.apply(params))
}

/// Pick the database that most likely belongs to the application
///
/// Returns the first candidate whose lower-cased name contains any hint,
/// else the first candidate, else `None`.
pub fn pick_database(candidates: &[String], hints: &[String]) -> Option<String> {
    candidates
        .iter()
        .find(|name| {
            let name = name.to_lowercase();
            hints
                .iter()
                .any(|hint| !hint.is_empty() && name.contains(&hint.to_lowercase()))
        })
        .or_else(|| candidates.first())
        .cloned()
}

/// Dump every table to the requested formats
///
/// Connection failure is fatal. Once connected, the connection is closed
/// whether or not the writers succeed.
pub async fn export_database(options: &ExportOptions) -> Result<Vec<WriteReport>> {
    let params = load_connection_params(options.config.as_deref(), &options.overrides)?;

    log::info!("Starting database export...");
    log::info!("Connecting to {}...", params.to_string().bright_black());
    let client = PostgresClient::connect(&params, &options.schema).await?;
    log::info!("✓ Database connection established");

    let label = options.label.as_deref().unwrap_or(&params.database);
    let exporter = Exporter::new(&client, &options.output_dir, label);
    let result = exporter.run(options.format).await;

    client.close().await;
    log::info!("Database connection closed");

    let reports = result.context("Export failed")?;
    log::info!("✓ Export finished");
    Ok(reports)
}

/// Discover connection parameters and save them for later exports
///
/// Returns the resolved parameters after writing them to `options.output`.
pub async fn configure(options: &ConfigureOptions) -> Result<ConnectionParams> {
    log::info!("Configuring the database connection");

    let mut params = options.overrides.apply(ConnectionParams::from_env()?);

    log::info!("Detected configuration:");
    log::info!("   Host: {}", params.host);
    log::info!("   Port: {}", params.port);
    log::info!("   Database: {}", params.database);
    log::info!("   User: {}", params.user);
    log::info!("   Password: {}", params.masked_password());

    if !options.skip_test {
        log::info!("Testing connection...");
        let client = match PostgresClient::connect(&params, "public").await {
            Ok(client) => client,
            Err(e) => {
                log::error!("Could not connect to the database");
                log::error!("Check that:");
                log::error!("   - PostgreSQL is running");
                log::error!("   - The connection parameters are correct");
                log::error!("   - The port is reachable");
                return Err(e);
            }
        };
        log::info!("✓ Connection succeeded");

        if params.database == DEFAULT_DATABASE {
            match client.list_databases().await {
                Ok(candidates) => {
                    if let Some(found) = pick_database(&candidates, &options.hints) {
                        log::info!("✓ Database found: {}", found.cyan());
                        params.database = found;
                    }
                }
                Err(e) => log::warn!(
                    "Database discovery failed, keeping {}: {:#}",
                    DEFAULT_DATABASE,
                    e
                ),
            }
        }

        client.close().await;
    }

    write_config_file(&options.output, &params)?;
    log::info!(
        "✓ Configuration saved to {}",
        options.output.display().bright_black()
    );
    log::info!(
        "To export the database, run: pgsnap export --config {}",
        options.output.display()
    );

    Ok(params)
}
