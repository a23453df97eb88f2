//! Overall confidence for a set of source results.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{registry::SourceRegistry, source::SourceResult};

const SUCCESS_RATE_BONUS: f64 = 10.0;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConfidenceLevel {
  Unreliable,
  VeryLow,
  Low,
  Medium,
  High,
  Critical,
}

impl ConfidenceLevel {
  pub fn from_score(score: f64) -> Self {
    match score {
      s if s >= 95.0 => Self::Critical,
      s if s >= 80.0 => Self::High,
      s if s >= 60.0 => Self::Medium,
      s if s >= 40.0 => Self::Low,
      s if s >= 20.0 => Self::VeryLow,
      _ => Self::Unreliable,
    }
  }
}

/// Weighted mean of successful confidences, nudged by the success rate and
/// penalised when fewer than three sources agreed to answer.
pub fn overall_confidence(
  registry: &SourceRegistry,
  results: &[SourceResult],
) -> f64 {
  let successes: Vec<&SourceResult> =
    results.iter().filter(|r| r.success()).collect();
  if successes.is_empty() {
    return 0.0;
  }

  let (weighted, weights) =
    successes.iter().fold((0.0, 0.0), |(sum, total), r| {
      let w = registry.weight(r.source());
      (sum + r.confidence() * w, total + w)
    });
  let base = if weights > 0.0 { weighted / weights } else { 0.0 };

  let success_rate = successes.len() as f64 / results.len() as f64;
  let penalty = match successes.len() {
    1 => 15.0,
    2 => 5.0,
    _ => 0.0,
  };

  (base + success_rate * SUCCESS_RATE_BONUS - penalty).clamp(0.0, 100.0)
}
