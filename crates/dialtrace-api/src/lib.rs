//! JSON REST API for dialtrace.
//!
//! Exposes an axum [`Router`] backed by an [`Investigator`] over any
//! [`dialtrace_core::store::HistoryStore`]. Auth, TLS, and transport concerns
//! are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", dialtrace_api::api_router(investigator.clone()))
//! ```

pub mod error;
pub mod history;
pub mod investigations;
pub mod patterns;


use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use dialtrace_core::store::HistoryStore;
use dialtrace_engine::Investigator;

pub use error::ApiError;

/// Country context assumed when a request names none.
pub const DEFAULT_CONTEXT: &str = "IN";

/// Build a fully-materialised API router for `investigator`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(investigator: Arc<Investigator<S>>) -> Router<()>
where
  S: HistoryStore + 'static,
{
  Router::new()
    .route("/investigations", post(investigations::create::<S>))
    // History
    .route("/history/{identifier}", get(history::list::<S>))
    .route("/history/{identifier}/summary", get(history::summary::<S>))
    .route("/porting/{identifier}", get(history::porting::<S>))
    .route("/ownership/{identifier}", get(history::ownership::<S>))
    .route("/cleanup", post(history::cleanup::<S>))
    // Patterns
    .route("/patterns/{identifier}", get(patterns::report::<S>))
    .route("/relationship", get(patterns::relationship::<S>))
    .with_state(investigator)
}

fn default_context() -> String { DEFAULT_CONTEXT.to_owned() }
