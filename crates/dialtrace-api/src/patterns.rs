//! Handlers for pattern analysis.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/patterns/:identifier` | Optional `?context=` (default `IN`) |
//! | `GET`  | `/relationship` | `?a=&b=[&context=]` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use dialtrace_core::{pattern::PatternReport, store::HistoryStore};
use dialtrace_engine::Investigator;
use serde::{Deserialize, Serialize};

use crate::{default_context, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ContextParams {
  #[serde(default = "default_context")]
  pub context: String,
}

/// `GET /patterns/:identifier[?context=XX]`
pub async fn report<S>(
  State(investigator): State<Arc<Investigator<S>>>,
  Path(identifier): Path<String>,
  Query(params): Query<ContextParams>,
) -> Result<Json<PatternReport>, ApiError>
where
  S: HistoryStore,
{
  Ok(Json(investigator.analyze_patterns(&identifier, &params.context)?))
}

#[derive(Debug, Deserialize)]
pub struct RelationshipParams {
  pub a:       String,
  pub b:       String,
  #[serde(default = "default_context")]
  pub context: String,
}

#[derive(Debug, Serialize)]
pub struct Relationship {
  pub confidence: f64,
}

/// `GET /relationship?a=...&b=...[&context=XX]`
pub async fn relationship<S>(
  State(investigator): State<Arc<Investigator<S>>>,
  Query(params): Query<RelationshipParams>,
) -> Result<Json<Relationship>, ApiError>
where
  S: HistoryStore,
{
  let confidence =
    investigator.relationship_confidence(&params.a, &params.b, &params.context)?;
  Ok(Json(Relationship { confidence }))
}
