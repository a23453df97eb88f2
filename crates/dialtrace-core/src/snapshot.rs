//! The merged investigation result and its typed views.

use std::{collections::BTreeMap, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
  confidence::{ConfidenceLevel, overall_confidence},
  history::Projection,
  identifier::Identifier,
  merge::{MergedFields, Merger},
  registry::SourceRegistry,
  source::{SourceId, SourceResult, millis},
};

// ─── Snapshot ────────────────────────────────────────────────────────────────

/// One completed investigation. Built once by [`Snapshot::assemble`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
  identifier:         Identifier,
  context:            String,
  results:            Vec<SourceResult>,
  not_attempted:      Vec<SourceId>,
  merged:             MergedFields,
  overall_confidence: f64,
  confidence_level:   ConfidenceLevel,
  total_sources:      usize,
  successful_sources: usize,
  errors:             Vec<String>,
  processing_ms:      u64,
  created_at:         DateTime<Utc>,
}

impl Snapshot {
  /// Merge `results` and score them. Sources in `not_attempted` were
  /// skipped (e.g. past a deadline) and are not counted as failures.
  pub fn assemble(
    identifier: Identifier,
    context: &str,
    results: Vec<SourceResult>,
    not_attempted: Vec<SourceId>,
    registry: &SourceRegistry,
    processing: Duration,
  ) -> Self {
    let merged = Merger::new(registry).merge(&results);
    let overall = overall_confidence(registry, &results);
    let errors = results
      .iter()
      .filter(|r| !r.success())
      .map(|r| format!("{}: {}", r.source(), r.error().unwrap_or("unknown error")))
      .collect();

    Self {
      identifier,
      context: context.to_owned(),
      total_sources: results.len(),
      successful_sources: results.iter().filter(|r| r.success()).count(),
      results,
      not_attempted,
      merged,
      overall_confidence: overall,
      confidence_level: ConfidenceLevel::from_score(overall),
      errors,
      processing_ms: millis(processing),
      created_at: Utc::now(),
    }
  }

  /// The same snapshot with extra error lines, e.g. a persistence failure.
  pub fn with_error(mut self, error: impl Into<String>) -> Self {
    self.errors.push(error.into());
    self
  }

  pub fn identifier(&self) -> &Identifier { &self.identifier }

  pub fn context(&self) -> &str { &self.context }

  pub fn results(&self) -> &[SourceResult] { &self.results }

  pub fn not_attempted(&self) -> &[SourceId] { &self.not_attempted }

  pub fn merged(&self) -> &MergedFields { &self.merged }

  pub fn overall_confidence(&self) -> f64 { self.overall_confidence }

  pub fn confidence_level(&self) -> ConfidenceLevel { self.confidence_level }

  pub fn total_sources(&self) -> usize { self.total_sources }

  pub fn successful_sources(&self) -> usize { self.successful_sources }

  pub fn errors(&self) -> &[String] { &self.errors }

  pub fn processing_ms(&self) -> u64 { self.processing_ms }

  pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

  pub fn profile(&self) -> Profile { Profile::from_merged(&self.merged) }

  /// The reduced view persisted to history.
  pub fn projection(&self) -> Projection {
    let profile = self.profile();
    let reputation = profile.reputation_score();

    let mut social_presence = BTreeMap::new();
    if let Some(v) = profile.whatsapp_presence {
      social_presence.insert("whatsapp".to_owned(), v);
    }
    if let Some(v) = profile.telegram_presence {
      social_presence.insert("telegram".to_owned(), v);
    }

    Projection {
      is_mobile: profile
        .line_type
        .as_deref()
        .map(|t| t.eq_ignore_ascii_case("mobile")),
      carrier: profile.carrier,
      location: profile.location,
      number_type: profile.line_type,
      is_valid: profile.is_valid,
      country_code: profile.country_code,
      reputation_score: Some(reputation),
      social_presence,
      domains: profile.domains.into_iter().map(|d| d.domain).collect(),
      sources_used: self
        .results
        .iter()
        .filter(|r| r.success())
        .map(|r| r.source().clone())
        .collect(),
      confidence: self.overall_confidence / 100.0,
    }
  }
}

// ─── Profile ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainAssociation {
  pub domain: String,
  pub status: Option<String>,
}

impl DomainAssociation {
  pub fn is_active(&self) -> bool {
    self.status.as_deref().is_some_and(|s| s.eq_ignore_ascii_case("active"))
  }
}

/// Typed view over the merged fields the rest of the system cares about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
  pub carrier:              Option<String>,
  pub location:             Option<String>,
  pub line_type:            Option<String>,
  pub is_valid:             Option<bool>,
  pub country:              Option<String>,
  pub country_code:         Option<String>,
  pub whatsapp_presence:    Option<bool>,
  pub telegram_presence:    Option<bool>,
  pub domains:              Vec<DomainAssociation>,
  pub business_connections: Vec<Value>,
  /// Every merged field without a named slot above.
  pub extras:               Map<String, Value>,
}

const PROFILE_FIELDS: [&str; 10] = [
  "carrier",
  "location",
  "line_type",
  "is_valid",
  "country",
  "country_code",
  "whatsapp_presence",
  "telegram_presence",
  "domains_found",
  "business_connections",
];

impl Profile {
  pub fn from_merged(merged: &MergedFields) -> Self {
    let text = |name: &str| merged.value(name).and_then(value_text);
    let flag = |name: &str| merged.value(name).and_then(value_bool);

    let domains = match merged.value("domains_found") {
      Some(Value::Array(items)) => items.iter().filter_map(domain_entry).collect(),
      _ => Vec::new(),
    };
    let business_connections = match merged.value("business_connections") {
      Some(Value::Array(items)) => items.clone(),
      _ => Vec::new(),
    };
    let extras = merged
      .iter()
      .filter(|(name, _)| !PROFILE_FIELDS.contains(&name.as_str()))
      .map(|(name, field)| (name.clone(), field.value.clone()))
      .collect();

    Self {
      carrier: text("carrier"),
      location: text("location"),
      line_type: text("line_type"),
      is_valid: flag("is_valid"),
      country: text("country"),
      country_code: text("country_code"),
      whatsapp_presence: flag("whatsapp_presence"),
      telegram_presence: flag("telegram_presence"),
      domains,
      business_connections,
      extras,
    }
  }

  /// A coarse trust score in `[0, 1]`.
  pub fn reputation_score(&self) -> f64 {
    let mut score = 0.5;
    match self.is_valid {
      Some(true) => score += 0.2,
      _ => score -= 0.3,
    }
    if self.carrier.is_some() {
      score += 0.1;
    }
    score += (0.05 * self.business_connections.len() as f64).min(0.2);
    let active = self.domains.iter().filter(|d| d.is_active()).count();
    score += (0.03 * active as f64).min(0.15);
    score.clamp(0.0, 1.0)
  }
}

fn value_text(value: &Value) -> Option<String> {
  match value {
    Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(b.to_string()),
    _ => None,
  }
}

fn value_bool(value: &Value) -> Option<bool> {
  match value {
    Value::Bool(b) => Some(*b),
    Value::String(s) => match s.to_ascii_lowercase().as_str() {
      "true" | "yes" | "1" => Some(true),
      "false" | "no" | "0" => Some(false),
      _ => None,
    },
    Value::Number(n) => n.as_i64().map(|n| n != 0),
    _ => None,
  }
}

fn domain_entry(value: &Value) -> Option<DomainAssociation> {
  match value {
    Value::String(s) if !s.is_empty() => Some(DomainAssociation {
      domain: s.clone(),
      status: None,
    }),
    Value::Object(map) => Some(DomainAssociation {
      domain: map.get("domain").and_then(Value::as_str)?.to_owned(),
      status: map.get("status").and_then(Value::as_str).map(str::to_owned),
    }),
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::source::AdapterOutput;

  fn ok(source: &str, confidence: f64, fields: Value) -> SourceResult {
    let Value::Object(map) = fields else { panic!("fields must be an object") };
    SourceResult::succeeded(
      source.into(),
      AdapterOutput::new(map, confidence),
      Duration::ZERO,
    )
  }

  fn id() -> Identifier { Identifier::parse("9876543210").unwrap() }

  #[test]
  fn all_failures_give_empty_merge_and_zero_confidence() {
    let results = vec![
      SourceResult::failed("neutrino".into(), "down", Duration::ZERO),
      SourceResult::failed("whois".into(), "down", Duration::ZERO),
    ];
    let snap = Snapshot::assemble(
      id(),
      "IN",
      results,
      vec![],
      &SourceRegistry::default(),
      Duration::from_millis(3),
    );
    assert!(snap.merged().is_empty());
    assert_eq!(snap.overall_confidence(), 0.0);
    assert_eq!(snap.confidence_level(), ConfidenceLevel::Unreliable);
    assert_eq!(snap.total_sources(), 2);
    assert_eq!(snap.successful_sources(), 0);
    assert_eq!(snap.errors(), ["neutrino: down", "whois: down"]);
  }

  #[test]
  fn projection_maps_profile_fields() {
    let results = vec![
      ok(
        "neutrino",
        80.0,
        json!({
          "carrier": "Airtel",
          "location": "Delhi",
          "line_type": "Mobile",
          "is_valid": true,
          "country_code": 91,
          "whatsapp_presence": true,
        }),
      ),
      ok(
        "whois",
        70.0,
        json!({
          "domains_found": [
            {"domain": "a.example", "status": "active"},
            "b.example",
          ],
          "business_connections": [{"name": "Acme"}],
          "registrar": "Example Registrar",
        }),
      ),
    ];
    let snap = Snapshot::assemble(
      id(),
      "IN",
      results,
      vec![],
      &SourceRegistry::default(),
      Duration::ZERO,
    );

    let profile = snap.profile();
    assert_eq!(profile.extras.get("registrar"), Some(&json!("Example Registrar")));
    // 0.5 + 0.2 + 0.1 + 0.05 + 0.03
    assert!((profile.reputation_score() - 0.88).abs() < 1e-9);

    let p = snap.projection();
    assert_eq!(p.carrier.as_deref(), Some("Airtel"));
    assert_eq!(p.number_type.as_deref(), Some("Mobile"));
    assert_eq!(p.is_mobile, Some(true));
    assert_eq!(p.country_code.as_deref(), Some("91"));
    assert_eq!(p.social_presence.get("whatsapp"), Some(&true));
    assert_eq!(p.domains.len(), 2);
    assert_eq!(p.sources_used.len(), 2);
  }

  #[test]
  fn reputation_penalises_invalid_numbers() {
    let profile = Profile { is_valid: Some(false), ..Profile::default() };
    assert!((profile.reputation_score() - 0.2).abs() < 1e-9);
  }
}
