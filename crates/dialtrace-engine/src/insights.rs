//! Insights and follow-up advice for an investigation that has history.

use dialtrace_core::{
  history::{OwnershipAnalysis, PortingAnalysis, RiskLevel, StabilityAssessment},
  snapshot::Snapshot,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};

/// Coarse label used for both history depth and follow-up urgency.
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
pub enum Level {
  Low,
  Medium,
  High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedInsights {
  /// How much history backs the current answer.
  pub history_depth:          Level,
  pub risk_indicators:        Vec<String>,
  pub investigation_priority: Level,
  /// In `[0, 1]`.
  pub reliability_score:      f64,
}

impl EnhancedInsights {
  pub fn derive(
    snapshot: &Snapshot,
    total_investigations: u64,
    porting: &PortingAnalysis,
    ownership: &OwnershipAnalysis,
  ) -> Self {
    let history_depth = match total_investigations {
      n if n >= 5 => Level::High,
      n if n >= 2 => Level::Medium,
      _ => Level::Low,
    };

    let mut risk_indicators = Vec::new();
    let mut investigation_priority = Level::Medium;
    if porting.porting_detected {
      risk_indicators.push("Number porting detected".to_owned());
      investigation_priority = Level::High;
    }
    if ownership.detected {
      risk_indicators.push("Potential ownership changes".to_owned());
      investigation_priority = Level::High;
    }
    if snapshot.overall_confidence() < 50.0 {
      risk_indicators.push("Low confidence in current data".to_owned());
    }
    let (successes, total) = (snapshot.successful_sources(), snapshot.total_sources());
    if (successes as f64) < total as f64 * 0.5 {
      risk_indicators.push("High API failure rate".to_owned());
    }

    let history_factor = (total_investigations as f64 / 10.0).min(1.0);
    let success_ratio = successes as f64 / total.max(1) as f64;
    let reliability_score =
      (snapshot.overall_confidence() / 100.0 + history_factor + success_ratio) / 3.0;

    Self {
      history_depth,
      risk_indicators,
      investigation_priority,
      reliability_score: reliability_score.clamp(0.0, 1.0),
    }
  }
}

/// Advice for the investigator, most specific first.
pub fn recommendations(
  snapshot: &Snapshot,
  changes_detected: usize,
  porting: &PortingAnalysis,
  ownership: &OwnershipAnalysis,
  stability: &StabilityAssessment,
) -> Vec<String> {
  let mut out = Vec::new();
  if snapshot.overall_confidence() < 60.0 {
    out.push("Low confidence detected - verify through additional sources".to_owned());
  }
  if snapshot.successful_sources() < 3 {
    out.push("Limited source coverage - consider additional API sources".to_owned());
  }
  if changes_detected > 0 {
    out.push(format!(
      "Recent changes detected ({changes_detected}) - manual verification recommended"
    ));
  }
  if porting.porting_detected {
    out.push(
      "Number porting detected - verify current carrier through direct channels"
        .to_owned(),
    );
  }
  if ownership.detected {
    out.push(
      "Potential ownership changes - consider enhanced verification procedures"
        .to_owned(),
    );
  }
  if matches!(stability.risk_level, RiskLevel::High | RiskLevel::Medium) {
    out.push(format!(
      "Classified as {} risk - implement enhanced monitoring",
      stability.risk_level
    ));
  }
  if array_len(snapshot, "domains_found") > 10 {
    out.push(
      "High domain association count - investigate for bulk registration patterns"
        .to_owned(),
    );
  }
  if array_len(snapshot, "related_numbers") > 5 {
    out.push(
      "Multiple related numbers found - investigate for coordinated activities"
        .to_owned(),
    );
  }
  if out.is_empty() {
    out.push("No significant issues detected - continue standard monitoring".to_owned());
  }
  out
}

fn array_len(snapshot: &Snapshot, field: &str) -> usize {
  match snapshot.merged().value(field) {
    Some(Value::Array(items)) => items.len(),
    _ => 0,
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use dialtrace_core::{
    Identifier,
    history::{analyze_porting, assess_stability},
    registry::SourceRegistry,
    snapshot::Snapshot,
    source::{AdapterOutput, SourceId, SourceResult},
  };
  use serde_json::{Map, json};

  use super::*;

  fn snapshot(successes: usize, failures: usize) -> Snapshot {
    let registry = SourceRegistry::default();
    let mut results = Vec::new();
    for (i, name) in ["libphonenumber", "abstractapi", "neutrino", "whois"]
      .into_iter()
      .enumerate()
    {
      let source = SourceId::new(name);
      if i < successes {
        let mut fields = Map::new();
        fields.insert("carrier".into(), json!("Airtel"));
        results.push(SourceResult::succeeded(
          source,
          AdapterOutput::new(fields, 90.0),
          Duration::ZERO,
        ));
      } else if i < successes + failures {
        results.push(SourceResult::failed(source, "down", Duration::ZERO));
      }
    }
    let identifier = Identifier::parse("+91 98765 43210").unwrap();
    Snapshot::assemble(identifier, "IN", results, Vec::new(), &registry, Duration::ZERO)
  }

  #[test]
  fn failures_raise_risk_indicators() {
    let snap = snapshot(1, 3);
    let porting = analyze_porting(&[]);
    let ownership = OwnershipAnalysis::default();
    let insights = EnhancedInsights::derive(&snap, 1, &porting, &ownership);

    assert_eq!(insights.history_depth, Level::Low);
    assert_eq!(insights.investigation_priority, Level::Medium);
    assert!(insights.risk_indicators.contains(&"High API failure rate".to_owned()));
    assert!((0.0..=1.0).contains(&insights.reliability_score));
  }

  #[test]
  fn quiet_history_gets_default_recommendation() {
    let snap = snapshot(4, 0);
    assert!(snap.overall_confidence() >= 60.0);
    let porting = analyze_porting(&[]);
    let ownership = OwnershipAnalysis::default();
    let stability = assess_stability(0, 4, &porting, &ownership);

    let recs = recommendations(&snap, 0, &porting, &ownership, &stability);
    assert_eq!(recs, vec![
      "No significant issues detected - continue standard monitoring".to_owned()
    ]);
  }

  #[test]
  fn changes_are_counted_in_advice() {
    let snap = snapshot(4, 0);
    let porting = analyze_porting(&[]);
    let ownership = OwnershipAnalysis::default();
    let stability = assess_stability(1, 4, &porting, &ownership);

    let recs = recommendations(&snap, 2, &porting, &ownership, &stability);
    assert!(recs.iter().any(|r| r.starts_with("Recent changes detected (2)")));
  }
}
