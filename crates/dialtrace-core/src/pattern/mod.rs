//! Local heuristics over an identifier's digit structure.
//!
//! Nothing here performs I/O. The engine wraps [`PatternEngine::analyze`] as
//! the `pattern_analysis` source so its findings flow through the merger
//! like any other source's.

pub mod bulk;
pub mod carrier;
pub mod config;
pub mod related;
pub mod sequential;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumString};

pub use self::{
  bulk::{BulkBlock, BulkIndicator, BulkRegistration, BulkRisk, RangePattern},
  carrier::{AllocationType, CarrierBlockAnalysis},
  config::{CarrierPrefixes, CountryProfile, PatternConfig, RegionPrefixes},
  related::{RelatedNumber, Relationship},
  sequential::{SequenceKind, SequentialAnalysis, SequentialPattern},
};
use crate::{Result, identifier::Identifier};

/// Related numbers at or above this confidence warrant a follow-up.
pub const HIGH_CONFIDENCE_RELATED: f64 = 0.7;
const SOURCE_CONFIDENCE_BASE: f64 = 50.0;
const SOURCE_CONFIDENCE_CAP: f64 = 95.0;

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
pub enum Priority {
  #[default]
  Low,
  Medium,
  High,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
pub enum FollowUp {
  #[strum(to_string = "Bulk Registration Investigation")]
  BulkRegistration,
  #[strum(to_string = "Business Connection Investigation")]
  BusinessConnection,
  #[strum(to_string = "Related Number Investigation")]
  RelatedNumbers,
  #[strum(to_string = "Carrier Block Analysis")]
  CarrierBlock,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestigationPriority {
  pub priority:            Priority,
  pub follow_up:           FollowUp,
  pub description:         String,
  pub recommended_actions: Vec<String>,
}

/// Everything the engine derives from one number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternReport {
  pub context:                 String,
  pub related_numbers:         Vec<RelatedNumber>,
  pub bulk_registration:       BulkRegistration,
  pub sequential_patterns:     SequentialAnalysis,
  pub carrier_block:           CarrierBlockAnalysis,
  pub priorities:              Vec<InvestigationPriority>,
  pub high_confidence_related: usize,
}

impl PatternReport {
  /// Self-reported confidence when the report is used as a source result.
  pub fn source_confidence(&self) -> f64 {
    let related = if self.related_numbers.is_empty() {
      0.0
    } else {
      self.related_numbers.iter().map(|r| r.confidence).sum::<f64>()
        / self.related_numbers.len() as f64
    };
    let score = SOURCE_CONFIDENCE_BASE
      + self.bulk_registration.confidence * 0.3
      + self.sequential_patterns.confidence * 0.2
      + self.carrier_block.confidence * 0.2
      + related * 0.3;
    score.min(SOURCE_CONFIDENCE_CAP)
  }

  /// The report as a source field map.
  pub fn to_fields(&self) -> Result<Map<String, Value>> {
    let mut fields = Map::new();
    let mut put = |name: &str, value: Value| {
      fields.insert(name.to_owned(), value);
    };
    put("related_numbers", serde_json::to_value(&self.related_numbers)?);
    put("bulk_registration", serde_json::to_value(&self.bulk_registration)?);
    put("sequential_patterns", serde_json::to_value(&self.sequential_patterns)?);
    put("carrier_block", serde_json::to_value(&self.carrier_block)?);
    put(
      "pattern_intelligence",
      serde_json::json!({
        "priorities": serde_json::to_value(&self.priorities)?,
        "high_confidence_related": self.high_confidence_related,
        "total_related": self.related_numbers.len(),
      }),
    );
    Ok(fields)
  }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Pattern analysis with a fixed configuration. Unknown countries fall back
/// to an empty profile, so only the digit-shape heuristics apply to them.
#[derive(Debug, Clone, Default)]
pub struct PatternEngine {
  config:   PatternConfig,
  fallback: CountryProfile,
}

impl PatternEngine {
  pub fn new(config: PatternConfig) -> Self {
    Self { config, fallback: CountryProfile::default() }
  }

  pub fn config(&self) -> &PatternConfig { &self.config }

  pub fn country(&self, context: &str) -> &CountryProfile {
    self.config.country(context).unwrap_or(&self.fallback)
  }

  pub fn national_number<'a>(
    &self,
    identifier: &'a Identifier,
    context: &str,
  ) -> &'a str {
    self.country(context).national_number(identifier.digits())
  }

  pub fn find_related_numbers(
    &self,
    identifier: &Identifier,
    context: &str,
  ) -> Vec<RelatedNumber> {
    let national = self.national_number(identifier, context);
    related::find_related(national, self.country(context), &self.config)
  }

  pub fn detect_bulk_registration(
    &self,
    identifier: &Identifier,
    context: &str,
  ) -> BulkRegistration {
    let national = self.national_number(identifier, context);
    bulk::detect(national, self.country(context), &self.config)
  }

  pub fn analyze_sequential_patterns(
    &self,
    identifier: &Identifier,
    context: &str,
  ) -> SequentialAnalysis {
    sequential::analyze(self.national_number(identifier, context), &self.config)
  }

  pub fn analyze_carrier_block(
    &self,
    identifier: &Identifier,
    context: &str,
  ) -> CarrierBlockAnalysis {
    let national = self.national_number(identifier, context);
    carrier::analyze(national, self.country(context))
  }

  /// How likely two numbers are to belong together, in `[0, 1]`.
  pub fn relationship_confidence(
    &self,
    a: &Identifier,
    b: &Identifier,
    context: &str,
  ) -> f64 {
    let country = self.country(context);
    let (na, nb) = (
      country.national_number(a.digits()),
      country.national_number(b.digits()),
    );

    let mut score = 0.0;
    if let (Ok(x), Ok(y)) = (na.parse::<u64>(), nb.parse::<u64>())
      && x.abs_diff(y) <= self.config.sequential_window
    {
      score += 0.4;
    }
    if let (Some((ca, _)), Some((cb, _))) =
      (country.carrier_for(na), country.carrier_for(nb))
      && ca == cb
    {
      score += 0.2;
    }
    if let (Some(ra), Some(rb)) = (country.region_for(na), country.region_for(nb))
      && ra == rb
    {
      score += 0.15;
    }
    score += related::similarity(na, nb) * 0.25;
    score.clamp(0.0, 1.0)
  }

  pub fn analyze(&self, identifier: &Identifier, context: &str) -> PatternReport {
    let related_numbers = self.find_related_numbers(identifier, context);
    let bulk_registration = self.detect_bulk_registration(identifier, context);
    let sequential_patterns = self.analyze_sequential_patterns(identifier, context);
    let carrier_block = self.analyze_carrier_block(identifier, context);
    let high_confidence_related = related_numbers
      .iter()
      .filter(|r| r.confidence >= HIGH_CONFIDENCE_RELATED)
      .count();
    let priorities = investigation_priorities(
      &bulk_registration,
      &sequential_patterns,
      high_confidence_related,
      &carrier_block,
    );

    PatternReport {
      context: context.trim().to_ascii_uppercase(),
      related_numbers,
      bulk_registration,
      sequential_patterns,
      carrier_block,
      priorities,
      high_confidence_related,
    }
  }
}

/// Follow-up suggestions, highest priority first.
pub fn investigation_priorities(
  bulk: &BulkRegistration,
  sequential: &SequentialAnalysis,
  high_confidence_related: usize,
  carrier: &CarrierBlockAnalysis,
) -> Vec<InvestigationPriority> {
  let entry = |priority, follow_up, description: String, actions: [&str; 3]| {
    InvestigationPriority {
      priority,
      follow_up,
      description,
      recommended_actions: Vec::from(actions.map(str::to_owned)),
    }
  };

  let mut out = Vec::new();
  if bulk.detected && bulk.confidence >= 0.7 {
    out.push(entry(
      Priority::High,
      FollowUp::BulkRegistration,
      "Number appears to be part of a bulk registration block with high \
       confidence"
        .into(),
      [
        "Investigate other numbers in the same block",
        "Check for coordinated activities",
        "Analyze registration timing patterns",
      ],
    ));
  }
  if sequential.found && sequential.business_likelihood >= 0.6 {
    out.push(entry(
      Priority::Medium,
      FollowUp::BusinessConnection,
      "Sequential patterns suggest possible business or organizational \
       connection"
        .into(),
      [
        "Investigate related sequential numbers",
        "Check for business registration records",
        "Analyze usage patterns for business indicators",
      ],
    ));
  }
  if high_confidence_related > 0 {
    out.push(entry(
      Priority::Medium,
      FollowUp::RelatedNumbers,
      format!("Found {high_confidence_related} highly related numbers"),
      [
        "Investigate each related number individually",
        "Look for common usage patterns",
        "Check for shared metadata or registration info",
      ],
    ));
  }
  if carrier.detected {
    out.push(entry(
      Priority::Low,
      FollowUp::CarrierBlock,
      "Number belongs to specific carrier allocation block".into(),
      [
        "Research carrier allocation policies",
        "Check for other numbers in same block",
        "Analyze block characteristics",
      ],
    ));
  }
  out.sort_by(|a, b| b.priority.cmp(&a.priority));
  out
}

/// `national` moved by `offset`, keeping its digit count. `None` when the
/// result would gain or lose a digit.
pub(crate) fn shift(national: &str, offset: i64) -> Option<String> {
  let n = national.parse::<u64>().ok()?;
  let moved = n.checked_add_signed(offset)?;
  let text = format!("{moved:0width$}", width = national.len());
  let keeps_shape = text.len() == national.len()
    && (national.starts_with('0') || !text.starts_with('0'));
  keeps_shape.then_some(text)
}
