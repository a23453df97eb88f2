//! Built-in adapters: the local pattern-analysis source and canned fixture
//! sources for offline runs.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use dialtrace_core::{
  Identifier,
  pattern::PatternEngine,
  source::{
    Adapter, AdapterError, AdapterOutput, BlockingSourceAdapter,
    SourceAdapter, SourceId,
  },
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ─── Pattern analysis ────────────────────────────────────────────────────────

/// Exposes [`PatternEngine::analyze`] as the `pattern_analysis` source.
/// CPU-bound, so it runs on the worker pool.
pub struct PatternAdapter {
  engine: Arc<PatternEngine>,
}

impl PatternAdapter {
  pub fn new(engine: Arc<PatternEngine>) -> Self { Self { engine } }
}

impl BlockingSourceAdapter for PatternAdapter {
  fn id(&self) -> SourceId { SourceId::pattern_analysis() }

  fn query(
    &self,
    identifier: &Identifier,
    context: &str,
    _timeout: Duration,
  ) -> Result<AdapterOutput, AdapterError> {
    let report = self.engine.analyze(identifier, context);
    let fields = report
      .to_fields()
      .map_err(|e| AdapterError::InvalidResponse(e.to_string()))?;
    Ok(AdapterOutput::new(fields, report.source_confidence()))
  }
}

// ─── Static / fixture adapters ───────────────────────────────────────────────

/// Returns a canned response, optionally after a delay.
#[derive(Debug, Clone)]
pub struct StaticAdapter {
  id:       SourceId,
  response: Result<AdapterOutput, AdapterError>,
  delay:    Duration,
}

impl StaticAdapter {
  pub fn ok(id: impl AsRef<str>, fields: Map<String, Value>, confidence: f64) -> Self {
    Self {
      id:       SourceId::new(id),
      response: Ok(AdapterOutput::new(fields, confidence)),
      delay:    Duration::ZERO,
    }
  }

  pub fn failing(id: impl AsRef<str>, error: AdapterError) -> Self {
    Self { id: SourceId::new(id), response: Err(error), delay: Duration::ZERO }
  }

  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }
}

#[async_trait]
impl SourceAdapter for StaticAdapter {
  fn id(&self) -> SourceId { self.id.clone() }

  async fn query(
    &self,
    _identifier: &Identifier,
    _context: &str,
    _timeout: Duration,
  ) -> Result<AdapterOutput, AdapterError> {
    if !self.delay.is_zero() {
      tokio::time::sleep(self.delay).await;
    }
    self.response.clone()
  }
}

/// How a fixture source fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureErrorKind {
  Transient,
  Unavailable,
  InvalidResponse,
  #[default]
  Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureError {
  #[serde(default)]
  pub kind:    FixtureErrorKind,
  pub message: String,
}

/// One source's canned response in a fixture file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureSpec {
  #[serde(default)]
  pub fields:     Map<String, Value>,
  #[serde(default)]
  pub confidence: f64,
  #[serde(default)]
  pub error:      Option<FixtureError>,
  #[serde(default)]
  pub delay_ms:   u64,
}

/// A fixture file: source name to canned response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixtureSet {
  pub sources: BTreeMap<String, FixtureSpec>,
}

impl FixtureSet {
  pub fn from_json(json: &str) -> serde_json::Result<Self> {
    serde_json::from_str(json)
  }

  pub fn into_adapters(self) -> Vec<Adapter> {
    self
      .sources
      .into_iter()
      .map(|(name, spec)| {
        let adapter = match spec.error {
          Some(FixtureError { kind, message }) => {
            let error = match kind {
              FixtureErrorKind::Transient => AdapterError::Transient(message),
              FixtureErrorKind::Unavailable => AdapterError::Unavailable(message),
              FixtureErrorKind::InvalidResponse => {
                AdapterError::InvalidResponse(message)
              }
              FixtureErrorKind::Other => AdapterError::Other(message),
            };
            StaticAdapter::failing(&name, error)
          }
          None => StaticAdapter::ok(&name, spec.fields, spec.confidence),
        };
        Adapter::io(adapter.with_delay(Duration::from_millis(spec.delay_ms)))
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use dialtrace_core::pattern::PatternConfig;

  use super::*;

  #[test]
  fn pattern_adapter_reports_fields() {
    let adapter = PatternAdapter::new(Arc::new(PatternEngine::new(
      PatternConfig::default(),
    )));
    let id = Identifier::parse("9000000000").unwrap();
    let out = adapter.query(&id, "IN", Duration::from_secs(1)).unwrap();
    assert!(out.fields.contains_key("bulk_registration"));
    assert!(out.fields.contains_key("related_numbers"));
    assert!((50.0..=95.0).contains(&out.confidence));
  }

  #[test]
  fn fixtures_build_adapters() {
    let set = FixtureSet::from_json(
      r#"{
        "sources": {
          "neutrino": { "confidence": 80, "fields": { "carrier": "Jio" } },
          "whois": { "error": { "kind": "unavailable", "message": "down" } }
        }
      }"#,
    )
    .unwrap();
    let adapters = set.into_adapters();
    let ids: Vec<String> = adapters.iter().map(|a| a.id().to_string()).collect();
    assert_eq!(ids, ["neutrino", "whois"]);
  }

  #[tokio::test]
  async fn static_adapter_returns_its_response() {
    let adapter = StaticAdapter::failing("x", AdapterError::Transient("blip".into()));
    let id = Identifier::parse("9876543210").unwrap();
    let err = adapter.query(&id, "IN", Duration::from_secs(1)).await.unwrap_err();
    assert_eq!(err, AdapterError::Transient("blip".into()));
  }
}
