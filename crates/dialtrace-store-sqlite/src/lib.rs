//! SQLite backend for dialtrace investigation history.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Numbers are only ever stored as their
//! SHA-256 digest.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteHistoryStore;
