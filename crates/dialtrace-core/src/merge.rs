//! Confidence-weighted field resolution across source results.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
  registry::SourceRegistry,
  source::{SourceId, SourceResult},
};

/// Key every adapter may use for its own error text; never merged.
pub const RESERVED_ERROR_FIELD: &str = "error";

/// Fields whose runner-up candidates are retained for review.
pub const CRITICAL_FIELDS: [&str; 3] = ["is_valid", "country", "carrier"];

const MAX_ALTERNATIVES: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
  pub value:      Value,
  pub confidence: f64,
  pub source:     SourceId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedField {
  pub value:        Value,
  /// The weighted score that won.
  pub confidence:   f64,
  pub source:       SourceId,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub alternatives: Vec<Alternative>,
}

/// Field name to winning value, in name order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MergedFields(BTreeMap<String, MergedField>);

impl MergedFields {
  pub fn get(&self, field: &str) -> Option<&MergedField> { self.0.get(field) }

  pub fn value(&self, field: &str) -> Option<&Value> {
    self.0.get(field).map(|f| &f.value)
  }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &MergedField)> {
    self.0.iter()
  }
}

struct Candidate<'a> {
  value:    &'a Value,
  weighted: f64,
  source:   &'a SourceId,
  rank:     usize,
  position: usize,
}

pub struct Merger<'a> {
  registry: &'a SourceRegistry,
}

impl<'a> Merger<'a> {
  pub fn new(registry: &'a SourceRegistry) -> Self { Self { registry } }

  /// Resolve every field present in a successful result to a single value.
  ///
  /// The winner is the highest `confidence * weight + bonus`; ties go to the
  /// source listed first in the registry, then to the earlier result.
  pub fn merge(&self, results: &[SourceResult]) -> MergedFields {
    let successful: Vec<(usize, &SourceResult)> = results
      .iter()
      .enumerate()
      .filter(|(_, r)| r.success() && !r.fields().is_empty())
      .collect();

    let names: BTreeSet<&String> = successful
      .iter()
      .flat_map(|(_, r)| r.fields().keys())
      .filter(|k| k.as_str() != RESERVED_ERROR_FIELD)
      .collect();

    let mut merged = BTreeMap::new();
    for name in names {
      let mut candidates: Vec<Candidate<'_>> = successful
        .iter()
        .filter_map(|&(position, r)| {
          let value = r.field(name).filter(|v| !v.is_null())?;
          let weighted = r.confidence() * self.registry.weight(r.source())
            + self.registry.priority_bonus(name, r.source());
          Some(Candidate {
            value,
            weighted,
            source: r.source(),
            rank: self.registry.rank(r.source()),
            position,
          })
        })
        .collect();

      if candidates.is_empty() {
        continue;
      }

      candidates.sort_by(|a, b| {
        b.weighted
          .total_cmp(&a.weighted)
          .then(a.rank.cmp(&b.rank))
          .then(a.position.cmp(&b.position))
      });

      let alternatives = if CRITICAL_FIELDS.contains(&name.as_str()) {
        candidates
          .iter()
          .skip(1)
          .take(MAX_ALTERNATIVES)
          .map(|c| Alternative {
            value:      c.value.clone(),
            confidence: c.weighted,
            source:     c.source.clone(),
          })
          .collect()
      } else {
        Vec::new()
      };

      let winner = &candidates[0];
      merged.insert(name.clone(), MergedField {
        value: winner.value.clone(),
        confidence: winner.weighted,
        source: winner.source.clone(),
        alternatives,
      });
    }

    MergedFields(merged)
  }
}
