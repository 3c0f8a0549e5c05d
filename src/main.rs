use clap::{Args, Parser, Subcommand, builder::styling};
use eyre::Result;
use owo_colors::OwoColorize;
use pgsnap::{
    cli::{ConfigureOptions, DEFAULT_DATABASE_HINTS, ExportOptions, configure, export_database},
    client::ConnectionOverrides,
    export::ExportFormat,
    storage::DEFAULT_CONFIG_FILE,
};
use std::path::{Path, PathBuf};

// CLI Styling
const STYLES: styling::Styles = styling::Styles::styled()
    .header(styling::AnsiColor::BrightWhite.on_default())
    .usage(styling::AnsiColor::BrightWhite.on_default())
    .literal(styling::AnsiColor::Green.on_default())
    .placeholder(styling::AnsiColor::Cyan.on_default());

/// pgsnap: snapshot every table of a PostgreSQL database to JSON, SQL and CSV
#[derive(Parser)]
#[command(name = "pgsnap", version, styles = STYLES)]
struct Cli {
    /// The dotenv file to source DATABASE_URL and PG* variables from
    #[arg(short, long, global = true, default_value = ".env")]
    env: String,

    /// More verbose logging
    #[arg(long, global = true)]
    debug: bool,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

/// Connection settings that replace the resolved ones
#[derive(Args)]
struct ConnectionArgs {
    /// Database server host
    #[arg(long)]
    host: Option<String>,

    /// Database server port
    #[arg(long)]
    port: Option<u16>,

    /// Database name
    #[arg(long)]
    database: Option<String>,

    /// User name (the password comes from PGPASSWORD or the config file)
    #[arg(long)]
    user: Option<String>,
}

impl From<ConnectionArgs> for ConnectionOverrides {
    fn from(args: ConnectionArgs) -> Self {
        Self {
            host: args.host,
            port: args.port,
            database: args.database,
            user: args.user,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Dump every base table to JSON, SQL and/or CSV
    Export {
        /// Export format
        #[arg(short, long, value_enum, default_value_t = ExportFormat::All)]
        format: ExportFormat,

        /// Directory to write the exports to
        #[arg(short, long, default_value = "../data-exports")]
        output_dir: PathBuf,

        /// A db_config.json to read the connection from, instead of the environment
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Schema whose tables are exported
        #[arg(short, long, default_value = "public")]
        schema: String,

        /// Label written into the export headers. Defaults to the database name
        #[arg(short, long)]
        label: Option<String>,

        #[command(flatten)]
        connection: ConnectionArgs,
    },

    /// Discover connection parameters and save them to a db_config.json
    Config {
        /// The config file to write
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        output: PathBuf,

        /// Substring identifying the application database, repeatable
        #[arg(
            long = "hint",
            default_values_t = DEFAULT_DATABASE_HINTS.iter().map(|h| h.to_string())
        )]
        hints: Vec<String>,

        /// Save without connecting to verify the parameters
        #[arg(long)]
        skip_test: bool,

        #[command(flatten)]
        connection: ConnectionArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let env_loaded = Path::new(&cli.env).exists();
    if env_loaded {
        dotenvy::from_filename(&cli.env)?;
    }

    let log_level = match cli.debug {
        true => "debug",
        false => "info",
    };
    let env = env_logger::Env::default().filter_or("LOG_LEVEL", log_level);
    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .init();

    if env_loaded {
        log::debug!("Loaded environment from {}", cli.env.bright_black());
    } else {
        log::debug!("No env file at {}, using the process environment", cli.env);
    }

    match cli.command {
        Commands::Export {
            format,
            output_dir,
            config,
            schema,
            label,
            connection,
        } => {
            log::info!(
                "Exporting {} to: {}",
                format.cyan(),
                output_dir.display().bright_black()
            );
            let options = ExportOptions {
                format,
                output_dir,
                config,
                overrides: connection.into(),
                schema,
                label,
            };
            let reports = export_database(&options).await?;

            let failed: usize = reports.iter().map(|r| r.failed.len()).sum();
            if failed > 0 {
                log::warn!("{} table export(s) failed, see the log above", failed);
            }
        }
        Commands::Config {
            output,
            hints,
            skip_test,
            connection,
        } => {
            let options = ConfigureOptions {
                output,
                overrides: connection.into(),
                hints,
                skip_test,
            };
            configure(&options).await?;
        }
    }

    Ok(())
}
