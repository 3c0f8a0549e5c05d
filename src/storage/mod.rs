//! File system storage operations
//!
//! This module handles the files that live outside the database:
//! - `db_config.json` reading/writing
//! - Timestamped artifact naming

mod artifacts;
mod config_file;

pub use artifacts::ExportStamp;
pub use config_file::{DEFAULT_CONFIG_FILE, read_config_file, write_config_file};
