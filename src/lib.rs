//! pgsnap
//!
//! Snapshot every base table of a PostgreSQL schema to JSON, SQL and CSV

pub mod cli;
pub mod client;
pub mod etl;
pub mod export;
pub mod storage;

// Re-exports for convenience
pub use client::{ConnectionParams, PostgresClient};
pub use etl::{Column, Row, TableSource};
pub use export::{ExportBundle, ExportFormat, Exporter, WriteReport};
pub use storage::ExportStamp;
