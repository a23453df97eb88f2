//! Historical records and the pure analyses run over them.
//!
//! Every type here refers to the investigated number only through its
//! [`IdentifierHash`]. Records are append-only; change events and carrier
//! transitions are derived once, when a record is appended, by
//! [`detect_changes`] and [`carrier_transition`].

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{identifier::IdentifierHash, source::SourceId};

/// Attribution stamped on every detected change.
pub const AUTOMATED_DETECTION: &str = "automated_detection";

/// Confidence assigned to a detected carrier transition.
pub const TRANSITION_CONFIDENCE: f64 = 0.8;

// ─── Projection and records ──────────────────────────────────────────────────

/// The reduced view of a snapshot that is persisted per investigation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Projection {
  pub carrier:          Option<String>,
  pub location:         Option<String>,
  pub number_type:      Option<String>,
  pub is_valid:         Option<bool>,
  pub is_mobile:        Option<bool>,
  pub country_code:     Option<String>,
  /// In `[0, 1]`.
  pub reputation_score: Option<f64>,
  /// Platform name to presence.
  pub social_presence:  BTreeMap<String, bool>,
  pub domains:          BTreeSet<String>,
  pub sources_used:     Vec<SourceId>,
  /// Overall snapshot confidence divided by 100.
  pub confidence:       f64,
}

impl Projection {
  /// The monitored value for `change`, as a comparable string.
  ///
  /// Blank strings count as absent.
  pub fn monitored(&self, change: ChangeType) -> Option<String> {
    let text = |v: &Option<String>| {
      v.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
    };
    match change {
      ChangeType::CarrierChange => text(&self.carrier),
      ChangeType::LocationChange => text(&self.location),
      ChangeType::NumberTypeChange => text(&self.number_type),
      ChangeType::ValidityChange => self.is_valid.map(|v| v.to_string()),
      ChangeType::ReputationChange => {
        self.reputation_score.map(|v| v.to_string())
      }
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
  pub record_id:       Uuid,
  pub identifier_hash: IdentifierHash,
  pub projection:      Projection,
  pub recorded_at:     DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryMetadata {
  pub identifier_hash:      IdentifierHash,
  pub first_seen:           DateTime<Utc>,
  pub last_seen:            DateTime<Utc>,
  pub total_investigations: u64,
}

// ─── Change events ───────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChangeType {
  CarrierChange,
  LocationChange,
  NumberTypeChange,
  ValidityChange,
  ReputationChange,
}

impl ChangeType {
  pub const ALL: [Self; 5] = [
    Self::CarrierChange,
    Self::LocationChange,
    Self::NumberTypeChange,
    Self::ValidityChange,
    Self::ReputationChange,
  ];

  /// The projection field this change type monitors.
  pub fn field(self) -> &'static str {
    match self {
      Self::CarrierChange => "carrier",
      Self::LocationChange => "location",
      Self::NumberTypeChange => "number_type",
      Self::ValidityChange => "is_valid",
      Self::ReputationChange => "reputation_score",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
  pub change_id:       Uuid,
  pub identifier_hash: IdentifierHash,
  pub change_type:     ChangeType,
  pub field:           String,
  pub old_value:       String,
  pub new_value:       String,
  pub detected_at:     DateTime<Utc>,
  pub confidence:      f64,
  pub source:          String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarrierTransition {
  pub transition_id:    Uuid,
  pub identifier_hash:  IdentifierHash,
  pub from_carrier:     String,
  pub to_carrier:       String,
  pub transitioned_at:  DateTime<Utc>,
  pub confidence:       f64,
  pub porting_detected: bool,
}

/// What appending one projection produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordOutcome {
  pub record:     HistoricalRecord,
  pub changes:    Vec<ChangeEvent>,
  pub transition: Option<CarrierTransition>,
}

/// Compare `current` with the immediately preceding record.
///
/// A field is compared only when both sides carry a value.
pub fn detect_changes(
  current: &Projection,
  previous: &HistoricalRecord,
  detected_at: DateTime<Utc>,
) -> Vec<ChangeEvent> {
  ChangeType::ALL
    .into_iter()
    .filter_map(|change| {
      let new_value = current.monitored(change)?;
      let old_value = previous.projection.monitored(change)?;
      if new_value == old_value {
        return None;
      }
      Some(ChangeEvent {
        change_id: Uuid::new_v4(),
        identifier_hash: previous.identifier_hash.clone(),
        change_type: change,
        field: change.field().to_owned(),
        confidence: change_confidence(change, &old_value, &new_value),
        old_value,
        new_value,
        detected_at,
        source: AUTOMATED_DETECTION.to_owned(),
      })
    })
    .collect()
}

fn change_confidence(change: ChangeType, old: &str, new: &str) -> f64 {
  match change {
    ChangeType::CarrierChange => 0.9,
    ChangeType::NumberTypeChange => 0.8,
    ChangeType::LocationChange => 0.7,
    ChangeType::ValidityChange => 0.6,
    ChangeType::ReputationChange => {
      let delta = match (old.parse::<f64>(), new.parse::<f64>()) {
        (Ok(a), Ok(b)) => (a - b).abs(),
        _ => 0.0,
      };
      if delta > 0.3 {
        0.8
      } else if delta > 0.1 {
        0.6
      } else {
        0.4
      }
    }
  }
}

/// A transition is recorded only when both carriers are known and differ.
pub fn carrier_transition(
  current: &Projection,
  previous: &HistoricalRecord,
  at: DateTime<Utc>,
) -> Option<CarrierTransition> {
  let to = current.monitored(ChangeType::CarrierChange)?;
  let from = previous.projection.monitored(ChangeType::CarrierChange)?;
  (to != from).then(|| CarrierTransition {
    transition_id:    Uuid::new_v4(),
    identifier_hash:  previous.identifier_hash.clone(),
    from_carrier:     from,
    to_carrier:       to,
    transitioned_at:  at,
    confidence:       TRANSITION_CONFIDENCE,
    porting_detected: true,
  })
}

// ─── Timeline ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimelineEvent {
  Change(ChangeEvent),
  CarrierTransition(CarrierTransition),
}

impl TimelineEvent {
  pub fn at(&self) -> DateTime<Utc> {
    match self {
      Self::Change(c) => c.detected_at,
      Self::CarrierTransition(t) => t.transitioned_at,
    }
  }
}

/// Interleave changes and transitions, newest first.
pub fn timeline(
  changes: Vec<ChangeEvent>,
  transitions: Vec<CarrierTransition>,
) -> Vec<TimelineEvent> {
  let mut events: Vec<TimelineEvent> = changes
    .into_iter()
    .map(TimelineEvent::Change)
    .chain(transitions.into_iter().map(TimelineEvent::CarrierTransition))
    .collect();
  events.sort_by_key(|e| std::cmp::Reverse(e.at()));
  events
}

// ─── Porting ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortingStep {
  pub at:         DateTime<Utc>,
  pub from:       String,
  pub to:         String,
  pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortingAnalysis {
  pub total_transitions:  usize,
  pub porting_detected:   bool,
  pub porting_confidence: f64,
  pub current_carrier:    Option<String>,
  pub original_carrier:   Option<String>,
  /// Oldest first.
  pub timeline:           Vec<PortingStep>,
}

pub fn analyze_porting(transitions: &[CarrierTransition]) -> PortingAnalysis {
  if transitions.is_empty() {
    return PortingAnalysis::default();
  }

  let mut ordered: Vec<&CarrierTransition> = transitions.iter().collect();
  ordered.sort_by_key(|t| t.transitioned_at);

  let confidence = ordered.iter().map(|t| t.confidence).sum::<f64>()
    / ordered.len() as f64;

  PortingAnalysis {
    total_transitions:  ordered.len(),
    porting_detected:   ordered.iter().any(|t| t.porting_detected),
    porting_confidence: confidence.clamp(0.0, 1.0),
    current_carrier:    ordered.last().map(|t| t.to_carrier.clone()),
    original_carrier:   ordered.first().map(|t| t.from_carrier.clone()),
    timeline:           ordered
      .iter()
      .map(|t| PortingStep {
        at:         t.transitioned_at,
        from:       t.from_carrier.clone(),
        to:         t.to_carrier.clone(),
        confidence: t.confidence,
      })
      .collect(),
  }
}

// ─── Ownership ───────────────────────────────────────────────────────────────

/// Ownership analysis looks at no more than this many recent records.
pub const DEFAULT_OWNERSHIP_WINDOW: usize = 50;

const OWNERSHIP_THRESHOLD: f64 = 0.6;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IndicatorKind {
  ReputationChange,
  SocialPresenceChange,
  DomainAssociationChange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnershipIndicator {
  pub kind:        IndicatorKind,
  pub description: String,
  pub confidence:  f64,
  pub detail:      String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnershipAnalysis {
  pub detected:          bool,
  pub confidence:        f64,
  pub indicators:        Vec<OwnershipIndicator>,
  pub records_analyzed:  usize,
  pub summary:           String,
  pub recommendation:    String,
}

impl Default for OwnershipAnalysis {
  fn default() -> Self {
    Self {
      detected:         false,
      confidence:       0.0,
      indicators:       Vec::new(),
      records_analyzed: 0,
      summary:          "insufficient history for ownership analysis".into(),
      recommendation:   ownership_recommendation(0.0).into(),
    }
  }
}

/// Look for signs the number changed hands. `records` are newest first.
pub fn analyze_ownership(
  records: &[HistoricalRecord],
  window: usize,
) -> OwnershipAnalysis {
  let records = &records[..records.len().min(window)];
  if records.len() < 2 {
    return OwnershipAnalysis {
      records_analyzed: records.len(),
      ..OwnershipAnalysis::default()
    };
  }

  let mut indicators = Vec::new();

  let scores: Vec<f64> = records
    .iter()
    .filter_map(|r| r.projection.reputation_score)
    .collect();
  if scores.len() > 1 {
    let max = scores.iter().copied().fold(f64::MIN, f64::max);
    let min = scores.iter().copied().fold(f64::MAX, f64::min);
    let range = max - min;
    if range > 0.5 {
      indicators.push(OwnershipIndicator {
        kind:        IndicatorKind::ReputationChange,
        description: "significant reputation score changes".into(),
        confidence:  0.7,
        detail:      format!("reputation range {range:.2}"),
      });
    }
  }

  let pairs = || records.windows(2).map(|w| (&w[0].projection, &w[1].projection));

  let social = pairs().filter(|(a, b)| a.social_presence != b.social_presence).count();
  if social > 0 {
    indicators.push(OwnershipIndicator {
      kind:        IndicatorKind::SocialPresenceChange,
      description: format!("social presence changed {social} times"),
      confidence:  0.6,
      detail:      format!("changes across {social} investigations"),
    });
  }

  let domains = pairs().filter(|(a, b)| a.domains != b.domains).count();
  if domains > 0 {
    indicators.push(OwnershipIndicator {
      kind:        IndicatorKind::DomainAssociationChange,
      description: format!("domain associations changed {domains} times"),
      confidence:  0.8,
      detail:      format!("changes across {domains} investigations"),
    });
  }

  let confidence = if indicators.is_empty() {
    0.0
  } else {
    indicators.iter().map(|i| i.confidence).sum::<f64>() / indicators.len() as f64
  };

  OwnershipAnalysis {
    detected: confidence > OWNERSHIP_THRESHOLD,
    confidence,
    indicators,
    records_analyzed: records.len(),
    summary: format!("analyzed {} historical records", records.len()),
    recommendation: ownership_recommendation(confidence).into(),
  }
}

fn ownership_recommendation(confidence: f64) -> &'static str {
  if confidence > 0.8 {
    "High likelihood of ownership change - recommend manual verification"
  } else if confidence > 0.6 {
    "Moderate likelihood of ownership change - monitor for additional indicators"
  } else if confidence > 0.3 {
    "Low likelihood of ownership change - continue normal monitoring"
  } else {
    "No significant ownership change indicators detected"
  }
}

// ─── Stability ───────────────────────────────────────────────────────────────

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
pub enum RiskLevel {
  Minimal,
  Low,
  Medium,
  High,
}

impl RiskLevel {
  pub fn from_score(score: f64) -> Self {
    if score > 2.0 {
      Self::High
    } else if score > 1.0 {
      Self::Medium
    } else if score > 0.5 {
      Self::Low
    } else {
      Self::Minimal
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityAssessment {
  pub total_investigations: u64,
  pub total_changes:        usize,
  pub change_frequency:     f64,
  pub stability_score:      f64,
  pub porting_confidence:   f64,
  pub ownership_confidence: f64,
  pub overall_confidence:   f64,
  pub risk_level:           RiskLevel,
  pub recommendations:      Vec<String>,
}

pub fn assess_stability(
  total_changes: usize,
  total_investigations: u64,
  porting: &PortingAnalysis,
  ownership: &OwnershipAnalysis,
) -> StabilityAssessment {
  let (change_frequency, stability_score) = if total_investigations > 0 {
    let freq = total_changes as f64 / total_investigations as f64;
    (freq, (1.0 - freq * 2.0).max(0.0))
  } else {
    (0.0, 1.0)
  };

  let risk_score =
    (1.0 - stability_score) + change_frequency + ownership.confidence;

  let mut recommendations = Vec::new();
  if porting.porting_detected {
    recommendations.push("Verify current carrier through direct API calls".into());
  }
  if ownership.detected {
    recommendations.push(
      "Manual verification recommended due to ownership change indicators"
        .into(),
    );
  }
  if change_frequency > 0.5 {
    recommendations.push("High change frequency detected - monitor closely".into());
  }
  if recommendations.is_empty() {
    recommendations.push("No special verification requirements detected".into());
  }

  StabilityAssessment {
    total_investigations,
    total_changes,
    change_frequency,
    stability_score,
    porting_confidence: porting.porting_confidence,
    ownership_confidence: ownership.confidence,
    overall_confidence: ((stability_score + (1.0 - change_frequency)) / 2.0)
      .clamp(0.0, 1.0),
    risk_level: RiskLevel::from_score(risk_score),
    recommendations,
  }
}

// ─── Summary ─────────────────────────────────────────────────────────────────

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
pub enum DataQuality {
  Poor,
  Fair,
  Good,
  High,
}

impl DataQuality {
  pub fn from_record_count(records: usize) -> Self {
    match records {
      n if n >= 10 => Self::High,
      n if n >= 5 => Self::Good,
      n if n >= 2 => Self::Fair,
      _ => Self::Poor,
    }
  }
}

/// Everything known about one identifier's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySummary {
  pub identifier_hash: IdentifierHash,
  pub generated_at:    DateTime<Utc>,
  pub records:         Vec<HistoricalRecord>,
  pub metadata:        Option<HistoryMetadata>,
  pub timeline:        Vec<TimelineEvent>,
  pub porting:         PortingAnalysis,
  pub ownership:       OwnershipAnalysis,
  pub stability:       StabilityAssessment,
  pub quality:         DataQuality,
  pub recommendations: Vec<String>,
}

pub fn summary_recommendations(
  record_count: usize,
  porting: &PortingAnalysis,
  ownership: &OwnershipAnalysis,
  stability: &StabilityAssessment,
) -> Vec<String> {
  let mut out = Vec::new();
  if record_count < 3 {
    out.push(
      "Conduct additional investigations to build historical baseline".into(),
    );
  }
  if porting.porting_detected {
    out.push("Verify current carrier information through multiple sources".into());
  }
  if ownership.detected {
    out.push(
      "Consider manual verification due to potential ownership changes".into(),
    );
  }
  if matches!(stability.risk_level, RiskLevel::High | RiskLevel::Medium) {
    out.push(format!(
      "Enhanced monitoring recommended due to {} risk classification",
      stability.risk_level
    ));
  }
  if out.is_empty() {
    out.push("Continue standard monitoring and investigation procedures".into());
  }
  out
}

// ─── Retention ───────────────────────────────────────────────────────────────

/// Rows removed by a retention sweep, per table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanupReport {
  pub cutoff:              DateTime<Utc>,
  pub investigations:      usize,
  pub changes:             usize,
  pub transitions:         usize,
  pub orphaned_metadata:   usize,
}

impl CleanupReport {
  pub fn total(&self) -> usize {
    self.investigations + self.changes + self.transitions + self.orphaned_metadata
  }
}

/// The cutoff for a retention of `days` measured from `now`.
pub fn retention_cutoff(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
  now - Duration::days(i64::from(days))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn hash() -> IdentifierHash { IdentifierHash::from_hex("ab".repeat(32)) }

  fn record(projection: Projection, at: DateTime<Utc>) -> HistoricalRecord {
    HistoricalRecord {
      record_id: Uuid::new_v4(),
      identifier_hash: hash(),
      projection,
      recorded_at: at,
    }
  }

  fn carrier(name: &str) -> Projection {
    Projection {
      carrier: Some(name.into()),
      location: Some("Delhi".into()),
      is_valid: Some(true),
      reputation_score: Some(0.8),
      ..Projection::default()
    }
  }

  #[test]
  fn identical_projections_yield_no_changes() {
    let p = carrier("Airtel");
    let prev = record(p.clone(), Utc::now());
    assert!(detect_changes(&p, &prev, Utc::now()).is_empty());
    assert!(carrier_transition(&p, &prev, Utc::now()).is_none());
  }

  #[test]
  fn carrier_change_is_detected_with_transition() {
    let prev = record(carrier("Airtel"), Utc::now());
    let now = carrier("Jio");
    let changes = detect_changes(&now, &prev, Utc::now());
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].change_type, ChangeType::CarrierChange);
    assert_eq!(changes[0].old_value, "Airtel");
    assert_eq!(changes[0].new_value, "Jio");
    assert_eq!(changes[0].confidence, 0.9);
    assert_eq!(changes[0].source, AUTOMATED_DETECTION);

    let t = carrier_transition(&now, &prev, Utc::now()).unwrap();
    assert_eq!((t.from_carrier.as_str(), t.to_carrier.as_str()), ("Airtel", "Jio"));
    assert!(t.porting_detected);
  }

  #[test]
  fn absent_or_blank_fields_are_not_compared() {
    let prev = record(carrier("Airtel"), Utc::now());
    let mut now = carrier("  ");
    now.location = None;
    assert!(detect_changes(&now, &prev, Utc::now()).is_empty());
    assert!(carrier_transition(&now, &prev, Utc::now()).is_none());
  }

  #[test]
  fn reputation_confidence_scales_with_delta() {
    let prev = record(carrier("Airtel"), Utc::now());
    let mut now = carrier("Airtel");
    now.reputation_score = Some(0.2);
    let changes = detect_changes(&now, &prev, Utc::now());
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].change_type, ChangeType::ReputationChange);
    assert_eq!(changes[0].confidence, 0.8);

    now.reputation_score = Some(0.75);
    let changes = detect_changes(&now, &prev, Utc::now());
    assert_eq!(changes[0].confidence, 0.4);
  }

  #[test]
  fn porting_analysis_orders_oldest_first() {
    let t0 = Utc::now() - Duration::days(10);
    let mk = |from: &str, to: &str, at| CarrierTransition {
      transition_id:    Uuid::new_v4(),
      identifier_hash:  hash(),
      from_carrier:     from.into(),
      to_carrier:       to.into(),
      transitioned_at:  at,
      confidence:       0.8,
      porting_detected: true,
    };
    let transitions = [
      mk("Jio", "Vodafone", t0 + Duration::days(5)),
      mk("Airtel", "Jio", t0),
    ];
    let analysis = analyze_porting(&transitions);
    assert!(analysis.porting_detected);
    assert_eq!(analysis.total_transitions, 2);
    assert_eq!(analysis.original_carrier.as_deref(), Some("Airtel"));
    assert_eq!(analysis.current_carrier.as_deref(), Some("Vodafone"));
    assert_eq!(analysis.timeline[0].to, "Jio");
    assert!((analysis.porting_confidence - 0.8).abs() < 1e-9);

    assert_eq!(analyze_porting(&[]), PortingAnalysis::default());
  }

  #[test]
  fn ownership_needs_two_records() {
    let one = [record(carrier("Airtel"), Utc::now())];
    let analysis = analyze_ownership(&one, DEFAULT_OWNERSHIP_WINDOW);
    assert!(!analysis.detected);
    assert_eq!(analysis.confidence, 0.0);
    assert!(analysis.summary.contains("insufficient history"));
  }

  #[test]
  fn ownership_indicators_combine() {
    let mut newer = carrier("Airtel");
    newer.reputation_score = Some(0.1);
    newer.domains = BTreeSet::from(["example.com".to_owned()]);
    let older = carrier("Airtel");
    let records = [record(newer, Utc::now()), record(older, Utc::now())];

    let analysis = analyze_ownership(&records, DEFAULT_OWNERSHIP_WINDOW);
    assert_eq!(analysis.indicators.len(), 2);
    assert!((analysis.confidence - 0.75).abs() < 1e-9);
    assert!(analysis.detected);
    assert!(analysis.recommendation.starts_with("Moderate"));
  }

  #[test]
  fn stability_and_risk() {
    let porting = PortingAnalysis::default();
    let ownership = OwnershipAnalysis::default();

    let calm = assess_stability(0, 0, &porting, &ownership);
    assert_eq!(calm.stability_score, 1.0);
    assert_eq!(calm.risk_level, RiskLevel::Minimal);
    assert_eq!(calm.recommendations, ["No special verification requirements detected"]);

    let churn = assess_stability(4, 4, &porting, &ownership);
    assert_eq!(churn.change_frequency, 1.0);
    assert_eq!(churn.stability_score, 0.0);
    assert_eq!(churn.risk_level, RiskLevel::Medium);
    assert!(churn.recommendations.iter().any(|r| r.contains("High change frequency")));
  }

  #[test]
  fn timeline_is_newest_first() {
    let prev = record(carrier("Airtel"), Utc::now());
    let old = Utc::now() - Duration::days(3);
    let changes = detect_changes(&carrier("Jio"), &prev, old);
    let transition = carrier_transition(&carrier("Jio"), &prev, Utc::now()).unwrap();
    let events = timeline(changes, vec![transition]);
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], TimelineEvent::CarrierTransition(_)));
  }

  #[test]
  fn quality_labels() {
    assert_eq!(DataQuality::from_record_count(12), DataQuality::High);
    assert_eq!(DataQuality::from_record_count(5), DataQuality::Good);
    assert_eq!(DataQuality::from_record_count(2), DataQuality::Fair);
    assert_eq!(DataQuality::from_record_count(0), DataQuality::Poor);
  }
}
