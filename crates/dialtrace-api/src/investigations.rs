//! Handler for `POST /investigations`.
//!
//! Body: [`InvestigationBody`]. Returns 201 with the snapshot, or with the
//! full history-aware report when `with_history` is set. Sequential mode
//! takes neither `sources` nor `with_history`.

use std::{
  sync::Arc,
  time::{Duration, Instant},
};

use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use dialtrace_core::{source::SourceId, store::HistoryStore};
use dialtrace_engine::{Investigator, RunOptions};
use serde::{Deserialize, Serialize};

use crate::{default_context, error::ApiError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
  /// One adapter at a time, in registry order.
  Sequential,
  /// Priority groups, adapters within a group concurrently.
  #[default]
  Concurrent,
}

#[derive(Debug, Deserialize)]
pub struct InvestigationBody {
  pub identifier:   String,
  #[serde(default = "default_context")]
  pub context:      String,
  #[serde(default)]
  pub mode:         Mode,
  /// Restrict to these sources. Not allowed in sequential mode.
  pub sources:      Option<Vec<SourceId>>,
  /// Skip priority groups not started within this many milliseconds.
  pub deadline_ms:  Option<u64>,
  #[serde(default)]
  pub with_history: bool,
}

/// `POST /investigations`
pub async fn create<S>(
  State(investigator): State<Arc<Investigator<S>>>,
  Json(body): Json<InvestigationBody>,
) -> Result<Response, ApiError>
where
  S: HistoryStore,
{
  if body.mode == Mode::Sequential {
    if body.with_history {
      return Err(ApiError::BadRequest(
        "with_history requires concurrent mode".into(),
      ));
    }
    if body.sources.is_some() {
      return Err(ApiError::BadRequest(
        "sources cannot be combined with sequential mode".into(),
      ));
    }
  }

  let options = RunOptions {
    deadline: body
      .deadline_ms
      .map(|ms| Instant::now() + Duration::from_millis(ms)),
    progress: None,
  };

  if body.with_history {
    let report = investigator
      .investigate_with_history(
        &body.identifier,
        &body.context,
        body.sources.as_deref(),
        options,
      )
      .await?;
    return Ok((StatusCode::CREATED, Json(report)).into_response());
  }

  let snapshot = match body.mode {
    Mode::Sequential => {
      investigator.investigate(&body.identifier, &body.context).await?
    }
    Mode::Concurrent => {
      investigator
        .investigate_async(
          &body.identifier,
          &body.context,
          body.sources.as_deref(),
          options,
        )
        .await?
    }
  };
  Ok((StatusCode::CREATED, Json(snapshot)).into_response())
}
