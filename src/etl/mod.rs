//! Core extraction abstractions
//!
//! The writers in [`crate::export`] never talk to PostgreSQL directly. They
//! read through the [`TableSource`] trait, which covers catalog discovery and
//! full-table reads.

mod memory;
mod source;

pub use memory::MemorySource;
pub use source::{Column, Row, TableSource};
