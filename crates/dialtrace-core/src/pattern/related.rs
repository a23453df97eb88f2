//! Numbers plausibly related to the investigated one.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::{
  Priority,
  config::{CountryProfile, PatternConfig},
  shift,
};

const SIMILAR_OFFSETS: [i64; 6] = [-5, -3, -1, 1, 3, 5];
const BLOCK_CONFIDENCE: f64 = 0.6;

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
pub enum Relationship {
  Sequential,
  CarrierBlock,
  PatternSimilar,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedNumber {
  pub number:       String,
  pub relationship: Relationship,
  pub confidence:   f64,
  pub evidence:     Vec<String>,
  pub priority:     Priority,
}

/// All related numbers, most confident first, truncated to
/// `config.max_related`.
pub fn find_related(
  national: &str,
  country: &CountryProfile,
  config: &PatternConfig,
) -> Vec<RelatedNumber> {
  let mut related = sequential(national, config);
  related.extend(carrier_block(national, country, config));
  related.extend(pattern_similar(national, config));
  related.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
  related.truncate(config.max_related);
  related
}

/// Neighbours within the sequential window, nearer ones scoring higher.
pub fn sequential(national: &str, config: &PatternConfig) -> Vec<RelatedNumber> {
  let window = i64::try_from(config.sequential_window).unwrap_or(i64::MAX);
  (-window..=window)
    .filter(|&offset| offset != 0)
    .filter_map(|offset| {
      let number = shift(national, offset)?;
      let distance = offset.unsigned_abs();
      Some(RelatedNumber {
        number,
        relationship: Relationship::Sequential,
        confidence: (1.0 - 0.1 * distance as f64).max(0.1),
        evidence: vec![format!("offset {offset:+} from the investigated number")],
        priority: if distance <= 5 { Priority::Medium } else { Priority::Low },
      })
    })
    .collect()
}

/// Numbers sharing the leading block prefix, stepped through the tail.
/// Empty unless the prefix table names a carrier.
pub fn carrier_block(
  national: &str,
  country: &CountryProfile,
  config: &PatternConfig,
) -> Vec<RelatedNumber> {
  let Some((carrier, _)) = country.carrier_for(national) else {
    return Vec::new();
  };
  if national.len() <= config.block_prefix_len {
    return Vec::new();
  }
  let (prefix, tail) = national.split_at(config.block_prefix_len);
  let Ok(base) = tail.parse::<u64>() else {
    return Vec::new();
  };

  (1..=config.block_steps)
    .filter_map(|step| {
      let next = base.checked_add(step * config.block_step_size)?;
      let tail = format!("{next:0width$}", width = tail.len());
      (tail.len() == national.len() - prefix.len()).then(|| RelatedNumber {
        number:       format!("{prefix}{tail}"),
        relationship: Relationship::CarrierBlock,
        confidence:   BLOCK_CONFIDENCE,
        evidence:     vec![format!("same {carrier} block prefix {prefix}")],
        priority:     Priority::Medium,
      })
    })
    .collect()
}

/// Nearby numbers whose digits mostly line up with `national`.
pub fn pattern_similar(
  national: &str,
  config: &PatternConfig,
) -> Vec<RelatedNumber> {
  SIMILAR_OFFSETS
    .iter()
    .filter_map(|&offset| {
      let number = shift(national, offset)?;
      let ratio = similarity(national, &number);
      (ratio > config.similarity_threshold).then(|| RelatedNumber {
        number,
        relationship: Relationship::PatternSimilar,
        confidence: ratio,
        evidence: vec![format!("digit similarity {ratio:.2}")],
        priority: Priority::Low,
      })
    })
    .take(config.max_similar)
    .collect()
}

/// Fraction of positions holding the same digit; zero for unequal lengths.
pub fn similarity(a: &str, b: &str) -> f64 {
  if a.len() != b.len() || a.is_empty() {
    return 0.0;
  }
  let matches = a.bytes().zip(b.bytes()).filter(|(x, y)| x == y).count();
  matches as f64 / a.len() as f64
}
