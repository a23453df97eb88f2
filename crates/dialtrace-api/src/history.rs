//! Handlers for history reads.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/history/:identifier` | Optional `?limit=`; newest first |
//! | `GET`  | `/history/:identifier/summary` | |
//! | `GET`  | `/porting/:identifier` | |
//! | `GET`  | `/ownership/:identifier` | |
//! | `POST` | `/cleanup` | Body: `{"retention_days":365}` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use dialtrace_core::{
  history::{
    CleanupReport, HistoricalRecord, HistorySummary, OwnershipAnalysis,
    PortingAnalysis,
  },
  store::HistoryStore,
};
use dialtrace_engine::Investigator;
use serde::Deserialize;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub limit: Option<usize>,
}

/// `GET /history/:identifier[?limit=N]`
pub async fn list<S>(
  State(investigator): State<Arc<Investigator<S>>>,
  Path(identifier): Path<String>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<HistoricalRecord>>, ApiError>
where
  S: HistoryStore,
{
  Ok(Json(investigator.history(&identifier, params.limit).await?))
}

/// `GET /history/:identifier/summary`
pub async fn summary<S>(
  State(investigator): State<Arc<Investigator<S>>>,
  Path(identifier): Path<String>,
) -> Result<Json<HistorySummary>, ApiError>
where
  S: HistoryStore,
{
  Ok(Json(investigator.history_summary(&identifier).await?))
}

/// `GET /porting/:identifier`
pub async fn porting<S>(
  State(investigator): State<Arc<Investigator<S>>>,
  Path(identifier): Path<String>,
) -> Result<Json<PortingAnalysis>, ApiError>
where
  S: HistoryStore,
{
  Ok(Json(investigator.detect_porting(&identifier).await?))
}

/// `GET /ownership/:identifier`
pub async fn ownership<S>(
  State(investigator): State<Arc<Investigator<S>>>,
  Path(identifier): Path<String>,
) -> Result<Json<OwnershipAnalysis>, ApiError>
where
  S: HistoryStore,
{
  Ok(Json(investigator.detect_ownership_change(&identifier).await?))
}

#[derive(Debug, Deserialize)]
pub struct CleanupBody {
  pub retention_days: u32,
}

/// `POST /cleanup`, body `{"retention_days":365}`
pub async fn cleanup<S>(
  State(investigator): State<Arc<Investigator<S>>>,
  Json(body): Json<CleanupBody>,
) -> Result<Json<CleanupReport>, ApiError>
where
  S: HistoryStore,
{
  let report = investigator
    .cleanup(body.retention_days)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(report))
}
