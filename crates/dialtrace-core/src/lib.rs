//! Core types and pure logic for dialtrace.
//!
//! This crate holds the merge engine, the history analysis, and the
//! pattern-analysis engine. It is deliberately free of HTTP and database
//! dependencies; storage backends implement [`store::HistoryStore`] and
//! adapters implement [`source::SourceAdapter`].

// Native `async fn` in traits; the store trait returns explicit `Send`
// futures where it matters.
#![allow(async_fn_in_trait)]

pub mod cache;
pub mod confidence;
pub mod error;
pub mod history;
pub mod identifier;
pub mod merge;
pub mod pattern;
pub mod registry;
pub mod snapshot;
pub mod source;
pub mod store;

pub use error::{Error, Result};
pub use identifier::{Identifier, IdentifierHash};
