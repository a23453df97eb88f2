//! Bulk-registration heuristics.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::config::{CountryProfile, PatternConfig};

const BLOCK_WIDTH: u64 = 1_000;
const BLOCK_CONFIDENCE: f64 = 0.7;

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
pub enum BulkIndicator {
  /// The number sits on a round boundary at the start of a 1000-block.
  ConsecutiveSequence,
  CarrierBulkPattern,
  RangePattern,
}

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
pub enum RangePattern {
  AllSameDigits,
  Ascending,
  Descending,
}

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
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
pub enum BulkRisk {
  #[default]
  Low,
  Medium,
  High,
  Critical,
}

impl BulkRisk {
  pub fn from_confidence(confidence: f64) -> Self {
    match confidence {
      c if c >= 0.7 => Self::Critical,
      c if c >= 0.5 => Self::High,
      c if c >= 0.3 => Self::Medium,
      _ => Self::Low,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkBlock {
  pub start:      String,
  pub end:        String,
  pub size:       u64,
  pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkRegistration {
  pub detected:      bool,
  pub confidence:    f64,
  pub block:         Option<BulkBlock>,
  pub indicators:    Vec<BulkIndicator>,
  pub range_pattern: Option<RangePattern>,
  pub risk:          BulkRisk,
  pub notes:         Vec<String>,
}

pub fn detect(
  national: &str,
  country: &CountryProfile,
  config: &PatternConfig,
) -> BulkRegistration {
  let mut out = BulkRegistration::default();

  if let Some(block) = round_block(national) {
    out.block = Some(block);
    out.indicators.push(BulkIndicator::ConsecutiveSequence);
    out.confidence += 0.3;
  }

  if let Some((carrier, _)) = country.carrier_for(national)
    && country.is_bulk_prefix(national, config.bulk_prefix_len)
  {
    out.indicators.push(BulkIndicator::CarrierBulkPattern);
    out.confidence += 0.25;
    out.notes.push(format!("detected in {carrier} bulk allocation"));
  }

  if let Some(pattern) = range_pattern(national) {
    out.range_pattern = Some(pattern);
    out.indicators.push(BulkIndicator::RangePattern);
    out.confidence += 0.2;
    out.notes.push(format!("part of {pattern} range"));
  }

  out.confidence = out.confidence.min(1.0);
  // Monotonic digits alone are a shape, not an allocation.
  out.detected = out.indicators.iter().any(|i| {
    matches!(
      i,
      BulkIndicator::ConsecutiveSequence | BulkIndicator::CarrierBulkPattern
    )
  }) || out.range_pattern == Some(RangePattern::AllSameDigits);
  out.risk = BulkRisk::from_confidence(out.confidence);
  if out.detected {
    out.notes.push("Recommend checking related numbers in the same block".into());
    out.notes.push("Consider investigating for coordinated activities".into());
  }
  out
}

/// The 1000-block starting at `national` when its last three digits are a
/// multiple of ten below 100.
fn round_block(national: &str) -> Option<BulkBlock> {
  if national.len() < 4 {
    return None;
  }
  let n = national.parse::<u64>().ok()?;
  let last3 = n % BLOCK_WIDTH;
  if last3 >= 100 || last3 % 10 != 0 {
    return None;
  }
  let start = n - last3;
  let end = start.checked_add(BLOCK_WIDTH - 1)?;
  let width = national.len();
  Some(BulkBlock {
    start:      format!("{start:0width$}"),
    end:        format!("{end:0width$}"),
    size:       BLOCK_WIDTH,
    confidence: BLOCK_CONFIDENCE,
  })
}

/// All digits equal, or digits never decreasing, or never increasing.
pub fn range_pattern(national: &str) -> Option<RangePattern> {
  let digits = national.as_bytes();
  if digits.len() < 2 {
    return None;
  }
  if digits.iter().all(|d| *d == digits[0]) {
    Some(RangePattern::AllSameDigits)
  } else if digits.windows(2).all(|w| w[0] <= w[1]) {
    Some(RangePattern::Ascending)
  } else if digits.windows(2).all(|w| w[0] >= w[1]) {
    Some(RangePattern::Descending)
  } else {
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn run(national: &str) -> BulkRegistration {
    let cfg = PatternConfig::default();
    let india = cfg.country("IN").cloned().unwrap();
    detect(national, &india, &cfg)
  }

  #[test]
  fn round_vanity_number_is_critical() {
    let bulk = run("9000000000");
    assert!(bulk.detected);
    assert_eq!(bulk.indicators, [
      BulkIndicator::ConsecutiveSequence,
      BulkIndicator::CarrierBulkPattern,
      BulkIndicator::RangePattern,
    ]);
    assert!((bulk.confidence - 0.75).abs() < 1e-9);
    assert_eq!(bulk.risk, BulkRisk::Critical);
    let block = bulk.block.unwrap();
    assert_eq!(block.start, "9000000000");
    assert_eq!(block.end, "9000000999");
    assert_eq!(block.size, 1000);
  }

  #[test]
  fn ordinary_number_is_not_bulk() {
    let bulk = run("9812347561");
    assert!(!bulk.detected);
    assert_eq!(bulk.confidence, 0.0);
    assert_eq!(bulk.risk, BulkRisk::Low);
    assert!(bulk.notes.is_empty());
  }

  #[test]
  fn monotonic_digits_alone_are_not_bulk() {
    for national in ["1234567899", "9876543210"] {
      let bulk = run(national);
      assert_eq!(bulk.indicators, [BulkIndicator::RangePattern], "{national}");
      assert!(!bulk.detected, "{national}");
      assert_eq!(bulk.risk, BulkRisk::Low);
      assert!(!bulk.notes.iter().any(|n| n.starts_with("Recommend")));
    }
  }

  #[test]
  fn repeated_digit_is_bulk_on_its_own() {
    let bulk = run("5555555555");
    assert!(bulk.detected);
    assert_eq!(bulk.range_pattern, Some(RangePattern::AllSameDigits));
  }

  #[test]
  fn range_patterns() {
    assert_eq!(range_pattern("7777777777"), Some(RangePattern::AllSameDigits));
    assert_eq!(range_pattern("1123456789"), Some(RangePattern::Ascending));
    assert_eq!(range_pattern("9876543210"), Some(RangePattern::Descending));
    assert_eq!(range_pattern("9876543213"), None);
  }
}
