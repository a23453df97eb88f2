//! Sequential and business-style digit patterns.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::{Priority, config::PatternConfig, shift};

const INCREMENTS: [u64; 3] = [10, 100, 1_000];

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
pub enum SequenceKind {
  Consecutive,
  Increment,
  Alternating,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequentialPattern {
  pub kind:                SequenceKind,
  pub base_number:         String,
  /// Neighbouring numbers following the same pattern.
  pub numbers:             Vec<String>,
  pub increment:           Option<u64>,
  pub confidence:          f64,
  pub business_likelihood: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SequentialAnalysis {
  pub found:               bool,
  pub patterns:            Vec<SequentialPattern>,
  pub confidence:          f64,
  pub business_likelihood: f64,
  pub business_indicators: Vec<String>,
  pub priority:            Priority,
}

pub fn analyze(national: &str, config: &PatternConfig) -> SequentialAnalysis {
  let mut out = SequentialAnalysis::default();

  let consecutive = consecutive(national, config.min_consecutive_run);
  if !consecutive.is_empty() {
    out.patterns.extend(consecutive);
    out.confidence += 0.4;
  }

  let increments = increments(national);
  if !increments.is_empty() {
    out.patterns.extend(increments);
    out.confidence += 0.3;
  }

  let alternating = alternating(national);
  if !alternating.is_empty() {
    out.patterns.extend(alternating);
    out.confidence += 0.2;
  }

  out.confidence = out.confidence.min(1.0);
  out.found = !out.patterns.is_empty();
  if out.found {
    let (likelihood, indicators) = business_likelihood(national, &out.patterns);
    out.business_likelihood = likelihood;
    out.business_indicators = indicators;
    out.priority = if out.confidence >= 0.6 && likelihood >= 0.7 {
      Priority::High
    } else if out.confidence >= 0.4 {
      Priority::Medium
    } else {
      Priority::Low
    };
  }
  out
}

/// Length of the longest run of digits stepping by exactly one in a single
/// direction.
fn longest_run(national: &str) -> usize {
  let digits = national.as_bytes();
  let mut best = usize::from(!digits.is_empty());
  let (mut up, mut down) = (1, 1);
  for w in digits.windows(2) {
    let (a, b) = (i16::from(w[0]), i16::from(w[1]));
    up = if b - a == 1 { up + 1 } else { 1 };
    down = if a - b == 1 { down + 1 } else { 1 };
    best = best.max(up).max(down);
  }
  best
}

fn consecutive(national: &str, min_run: usize) -> Vec<SequentialPattern> {
  if longest_run(national) < min_run {
    return Vec::new();
  }
  let numbers = (-5..=4).filter_map(|o| shift(national, o)).collect();
  vec![SequentialPattern {
    kind:                SequenceKind::Consecutive,
    base_number:         national.to_owned(),
    numbers,
    increment:           Some(1),
    confidence:          0.8,
    business_likelihood: 0.6,
  }]
}

fn increments(national: &str) -> Vec<SequentialPattern> {
  let Ok(n) = national.parse::<u64>() else {
    return Vec::new();
  };
  if n == 0 {
    return Vec::new();
  }
  INCREMENTS
    .iter()
    .filter(|&&inc| n % inc == 0)
    .map(|&inc| {
      let step = i64::try_from(inc).unwrap_or(i64::MAX);
      SequentialPattern {
        kind:                SequenceKind::Increment,
        base_number:         national.to_owned(),
        numbers:             (-2..=2)
          .filter(|&i| i != 0)
          .filter_map(|i| shift(national, i * step))
          .collect(),
        increment:           Some(inc),
        confidence:          0.6,
        business_likelihood: 0.7,
      }
    })
    .collect()
}

/// Any `abab` window of two distinct digits.
fn alternating(national: &str) -> Vec<SequentialPattern> {
  let abab = national
    .as_bytes()
    .windows(4)
    .any(|w| w[0] == w[2] && w[1] == w[3] && w[0] != w[1]);
  if !abab {
    return Vec::new();
  }
  vec![SequentialPattern {
    kind:                SequenceKind::Alternating,
    base_number:         national.to_owned(),
    numbers:             Vec::new(),
    increment:           None,
    confidence:          0.5,
    business_likelihood: 0.3,
  }]
}

fn business_likelihood(
  national: &str,
  patterns: &[SequentialPattern],
) -> (f64, Vec<String>) {
  let mut score = 0.0;
  let mut indicators = Vec::new();

  if patterns.iter().any(|p| p.kind == SequenceKind::Consecutive) {
    score += 0.3;
    indicators.push("consecutive number block".to_owned());
  }
  if patterns.iter().any(|p| p.kind == SequenceKind::Increment) {
    score += 0.4;
    indicators.push("regular increment pattern".to_owned());
  }
  if national.ends_with("00") {
    score += 0.2;
    indicators.push("round number ending".to_owned());
  }
  let mut counts = [0usize; 10];
  for d in national.bytes().filter(u8::is_ascii_digit) {
    counts[usize::from(d - b'0')] += 1;
  }
  if counts.iter().any(|&c| c >= 4) {
    score += 0.1;
    indicators.push("repeated digits".to_owned());
  }

  (f64::min(score, 1.0), indicators)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn descending_run_is_consecutive() {
    let cfg = PatternConfig::default();
    let analysis = analyze("9876543210", &cfg);
    assert!(analysis.found);
    // consecutive + divisible by ten
    assert!((analysis.confidence - 0.7).abs() < 1e-9);
    assert_eq!(analysis.patterns[0].kind, SequenceKind::Consecutive);
    assert_eq!(analysis.patterns[0].numbers.len(), 10);
    // 0.3 + 0.4, no "00" ending, no digit repeated four times
    assert!((analysis.business_likelihood - 0.7).abs() < 1e-9);
    assert_eq!(analysis.priority, Priority::High);
  }

  #[test]
  fn round_number_hits_every_increment() {
    let cfg = PatternConfig::default();
    let analysis = analyze("9000000000", &cfg);
    let incs: Vec<u64> = analysis
      .patterns
      .iter()
      .filter(|p| p.kind == SequenceKind::Increment)
      .filter_map(|p| p.increment)
      .collect();
    assert_eq!(incs, [10, 100, 1000]);
    // 0.4 + 0.2 + 0.1
    assert!((analysis.business_likelihood - 0.7).abs() < 1e-9);
    assert_eq!(analysis.priority, Priority::Low);
  }

  #[test]
  fn alternating_digits() {
    let cfg = PatternConfig::default();
    let analysis = analyze("4545454545", &cfg);
    assert!(analysis.found);
    assert!(analysis.patterns.iter().any(|p| p.kind == SequenceKind::Alternating));
  }

  #[test]
  fn alternating_window_inside_number() {
    let cfg = PatternConfig::default();
    let analysis = analyze("9812121345", &cfg);
    assert!(analysis.found);
    assert!(analysis.patterns.iter().any(|p| p.kind == SequenceKind::Alternating));
    assert!(alternating("9812345670").is_empty());
  }

  #[test]
  fn plain_number_has_no_pattern() {
    let cfg = PatternConfig::default();
    let analysis = analyze("9813274659", &cfg);
    assert!(!analysis.found);
    assert_eq!(analysis.priority, Priority::Low);
    assert_eq!(analysis.business_likelihood, 0.0);
  }

  #[test]
  fn runs_are_measured_in_both_directions() {
    assert_eq!(longest_run("1234"), 4);
    assert_eq!(longest_run("9876012"), 4);
    assert_eq!(longest_run("1357"), 1);
  }
}
