//! Database module for SQLite operations.
//!
//! This module provides:
//! - Database initialization and migrations
//! - SQLite pragma configuration
//! - Parameter-bounded batch writes
//! - Repository layer for the stock and price ledgers

pub mod batch;
pub mod migrations;
pub mod repo;

pub use batch::{BatchError, BatchOutcome, BatchShape, BatchWriter, OnConflict, SqlValue};
pub use migrations::init_db;
pub use repo::{LedgerError, Repository};
