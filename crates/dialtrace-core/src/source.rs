//! Source identities, per-source results, and the adapter contracts.
//!
//! Each external data source is an opaque adapter. The engine only ever sees
//! an [`AdapterOutput`] or an [`AdapterError`], which it folds into an
//! immutable [`SourceResult`].

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::identifier::Identifier;

// ─── Source identity ─────────────────────────────────────────────────────────

/// Lowercase name of a data source, e.g. `"libphonenumber"`.
#[derive(
  Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
  pub const PATTERN_ANALYSIS: &'static str = "pattern_analysis";

  pub fn new(name: impl AsRef<str>) -> Self {
    Self(name.as_ref().trim().to_ascii_lowercase())
  }

  pub fn pattern_analysis() -> Self { Self::new(Self::PATTERN_ANALYSIS) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for SourceId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for SourceId {
  fn from(name: &str) -> Self { Self::new(name) }
}

impl AsRef<str> for SourceId {
  fn as_ref(&self) -> &str { &self.0 }
}

// ─── Adapter contract ────────────────────────────────────────────────────────

/// What a successful adapter call returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdapterOutput {
  pub fields:     Map<String, Value>,
  /// Self-reported confidence in `[0, 100]`.
  pub confidence: f64,
}

impl AdapterOutput {
  pub fn new(fields: Map<String, Value>, confidence: f64) -> Self {
    Self { fields, confidence }
  }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdapterError {
  /// Network blips, rate limits and the like. Safe to retry.
  #[error("transient failure: {0}")]
  Transient(String),

  /// The source used up its whole timeout window. Never retried.
  #[error("timed out after {0} ms")]
  Timeout(u64),

  #[error("source unavailable: {0}")]
  Unavailable(String),

  #[error("invalid response: {0}")]
  InvalidResponse(String),

  #[error("{0}")]
  Other(String),
}

impl AdapterError {
  pub fn is_retryable(&self) -> bool {
    matches!(self, Self::Transient(_))
  }
}

/// An async, I/O-bound source.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
  fn id(&self) -> SourceId;

  async fn query(
    &self,
    identifier: &Identifier,
    context: &str,
    timeout: Duration,
  ) -> Result<AdapterOutput, AdapterError>;
}

/// A synchronous source whose calls may block; dispatched to a worker pool.
pub trait BlockingSourceAdapter: Send + Sync {
  fn id(&self) -> SourceId;

  fn query(
    &self,
    identifier: &Identifier,
    context: &str,
    timeout: Duration,
  ) -> Result<AdapterOutput, AdapterError>;
}

/// Either flavour of adapter, as held by the engine.
#[derive(Clone)]
pub enum Adapter {
  Io(Arc<dyn SourceAdapter>),
  Blocking(Arc<dyn BlockingSourceAdapter>),
}

impl Adapter {
  pub fn io(adapter: impl SourceAdapter + 'static) -> Self {
    Self::Io(Arc::new(adapter))
  }

  pub fn blocking(adapter: impl BlockingSourceAdapter + 'static) -> Self {
    Self::Blocking(Arc::new(adapter))
  }

  pub fn id(&self) -> SourceId {
    match self {
      Self::Io(a) => a.id(),
      Self::Blocking(a) => a.id(),
    }
  }
}

impl fmt::Debug for Adapter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Io(a) => f.debug_tuple("Io").field(&a.id()).finish(),
      Self::Blocking(a) => f.debug_tuple("Blocking").field(&a.id()).finish(),
    }
  }
}

// ─── Results ─────────────────────────────────────────────────────────────────

/// The outcome of querying one source. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceResult {
  source:     SourceId,
  fields:     Map<String, Value>,
  confidence: f64,
  success:    bool,
  error:      Option<String>,
  timestamp:  DateTime<Utc>,
  latency_ms: u64,
}

impl SourceResult {
  pub fn succeeded(
    source: SourceId,
    output: AdapterOutput,
    latency: Duration,
  ) -> Self {
    Self {
      source,
      fields: output.fields,
      confidence: clamp_confidence(output.confidence),
      success: true,
      error: None,
      timestamp: Utc::now(),
      latency_ms: millis(latency),
    }
  }

  pub fn failed(
    source: SourceId,
    error: impl fmt::Display,
    latency: Duration,
  ) -> Self {
    Self {
      source,
      fields: Map::new(),
      confidence: 0.0,
      success: false,
      error: Some(error.to_string()),
      timestamp: Utc::now(),
      latency_ms: millis(latency),
    }
  }

  pub fn source(&self) -> &SourceId { &self.source }

  pub fn fields(&self) -> &Map<String, Value> { &self.fields }

  pub fn field(&self, name: &str) -> Option<&Value> { self.fields.get(name) }

  pub fn confidence(&self) -> f64 { self.confidence }

  pub fn success(&self) -> bool { self.success }

  pub fn error(&self) -> Option<&str> { self.error.as_deref() }

  pub fn timestamp(&self) -> DateTime<Utc> { self.timestamp }

  pub fn latency_ms(&self) -> u64 { self.latency_ms }
}

fn clamp_confidence(value: f64) -> f64 {
  if value.is_nan() { 0.0 } else { value.clamp(0.0, 100.0) }
}

pub(crate) fn millis(d: Duration) -> u64 {
  u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn source_ids_are_lowercased() {
    assert_eq!(SourceId::new(" Neutrino ").as_str(), "neutrino");
  }

  #[test]
  fn confidence_is_clamped() {
    let high = SourceResult::succeeded(
      "a".into(),
      AdapterOutput::new(Map::new(), 250.0),
      Duration::ZERO,
    );
    let nan = SourceResult::succeeded(
      "a".into(),
      AdapterOutput::new(Map::new(), f64::NAN),
      Duration::ZERO,
    );
    assert_eq!(high.confidence(), 100.0);
    assert_eq!(nan.confidence(), 0.0);
  }

  #[test]
  fn failed_results_carry_no_fields() {
    let r = SourceResult::failed(
      "whois".into(),
      AdapterError::Unavailable("down".into()),
      Duration::from_millis(12),
    );
    assert!(!r.success());
    assert_eq!(r.confidence(), 0.0);
    assert!(r.fields().is_empty());
    assert_eq!(r.error(), Some("source unavailable: down"));
    assert_eq!(r.latency_ms(), 12);
  }

  #[test]
  fn only_transient_errors_retry() {
    assert!(AdapterError::Transient("x".into()).is_retryable());
    assert!(!AdapterError::Timeout(5).is_retryable());
    assert!(!AdapterError::InvalidResponse("x".into()).is_retryable());
  }
}
