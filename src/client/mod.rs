//! PostgreSQL connection handling.
//!
//! This module provides [`ConnectionParams`] and its resolution from the
//! environment, along with the [`PostgresClient`] used to read tables.

mod params;
mod postgres;

pub use params::{
    ConnectionOverrides, ConnectionParams, DEFAULT_DATABASE, DEFAULT_HOST, DEFAULT_PORT,
    DEFAULT_USER, parse_database_url,
};
pub use postgres::{PostgresClient, decode_row};
