//! Connection parameter resolution
//!
//! Parameters come from, in increasing precedence:
//! 1. Built-in defaults (`localhost:5432`, database `template1`, user `postgres`)
//! 2. The host found in a `prisma+postgres://` `DATABASE_URL`
//! 3. `PGHOST`, `PGPORT`, `PGDATABASE`, `PGUSER` and `PGPASSWORD`
//! 4. Command-line overrides

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_DATABASE: &str = "template1";
pub const DEFAULT_USER: &str = "postgres";

const PRISMA_POSTGRES_SCHEME: &str = "prisma+postgres";

/// Everything needed to open a PostgreSQL connection.
///
/// Serializes to the `db_config.json` layout:
/// ```json
/// {
///   "host": "localhost",
///   "port": 5432,
///   "database": "template1",
///   "user": "postgres",
///   "password": null
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: Option<String>,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            database: DEFAULT_DATABASE.to_string(),
            user: DEFAULT_USER.to_string(),
            password: None,
        }
    }
}

/// Values given on the command line, each replacing the resolved one when set
#[derive(Clone, Debug, Default)]
pub struct ConnectionOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub user: Option<String>,
}

impl ConnectionOverrides {
    pub fn apply(&self, mut params: ConnectionParams) -> ConnectionParams {
        if let Some(host) = &self.host {
            params.host = host.clone();
        }
        if let Some(port) = self.port {
            params.port = port;
        }
        if let Some(database) = &self.database {
            params.database = database.clone();
        }
        if let Some(user) = &self.user {
            params.user = user.clone();
        }
        params
    }
}

impl ConnectionParams {
    /// Resolve parameters from the process environment
    ///
    /// Expected environment variables:
    /// - DATABASE_URL: `prisma+postgres://<host>:<port>/...` (optional, only the host is used)
    /// - PGHOST, PGPORT, PGDATABASE, PGUSER, PGPASSWORD (optional overrides)
    pub fn from_env() -> Result<Self> {
        Self::resolve(|key| std::env::var(key).ok())
    }

    /// Resolve parameters from an arbitrary variable lookup
    pub fn resolve(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut params = match lookup("DATABASE_URL") {
            Some(url) => match parse_database_url(&url) {
                Some(params) => {
                    log::debug!("Host {} taken from DATABASE_URL", params.host);
                    params
                }
                None => {
                    log::debug!("DATABASE_URL is not a prisma+postgres URL, using defaults");
                    Self::default()
                }
            },
            None => Self::default(),
        };

        if let Some(host) = lookup("PGHOST") {
            params.host = host;
        }
        if let Some(port) = lookup("PGPORT") {
            params.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid PGPORT: {}", port))?;
        }
        if let Some(database) = lookup("PGDATABASE") {
            params.database = database;
        }
        if let Some(user) = lookup("PGUSER") {
            params.user = user;
        }
        if let Some(password) = lookup("PGPASSWORD") {
            params.password = Some(password);
        }

        Ok(params)
    }

    /// The password with every character replaced by `*`, or `None`
    pub fn masked_password(&self) -> String {
        match &self.password {
            Some(password) => "*".repeat(password.chars().count()),
            None => "None".to_string(),
        }
    }

    /// Build the tokio-postgres connection config
    pub fn to_pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.database)
            .user(&self.user);
        if let Some(password) = &self.password {
            config.password(password);
        }
        config
    }
}

impl std::fmt::Display for ConnectionParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}@{}:{}/{}",
            self.user, self.host, self.port, self.database
        )
    }
}

/// Extract connection parameters from a Prisma Postgres `DATABASE_URL`
///
/// Only `prisma+postgres://<host>:<port>/...` is recognised. The host is kept;
/// the port in the URL belongs to the Prisma proxy, so every other field falls
/// back to its default. Anything else yields `None`.
pub fn parse_database_url(url: &str) -> Option<ConnectionParams> {
    let url = url.trim().trim_matches('"');
    if !url.starts_with(&format!("{}://", PRISMA_POSTGRES_SCHEME)) {
        return None;
    }

    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str().filter(|h| !h.is_empty())?;
    // Require an explicit host:port authority
    parsed.port()?;

    Some(ConnectionParams {
        host: host.to_string(),
        ..ConnectionParams::default()
    })
}
