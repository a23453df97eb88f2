//! The source registry: per-source weights, timeouts and priorities, plus
//! the per-field source preference lists used by the merger.

use std::{collections::BTreeMap, time::Duration};

use serde::{Deserialize, Serialize};

use crate::source::SourceId;

/// Weight applied to sources the registry does not know.
pub const DEFAULT_WEIGHT: f64 = 0.5;
/// Orchestrator priority for unknown sources.
pub const DEFAULT_PRIORITY: i32 = 1;
/// Points added per step of a field priority list.
pub const PRIORITY_STEP: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceProfile {
  pub id:         SourceId,
  /// Reliability multiplier in `[0, 1]`.
  pub weight:     f64,
  pub timeout_ms: u64,
  /// Higher runs earlier in the orchestrator.
  pub priority:   i32,
}

impl SourceProfile {
  pub fn new(id: &str, weight: f64, timeout_ms: u64, priority: i32) -> Self {
    Self { id: SourceId::new(id), weight, timeout_ms, priority }
  }
}

/// Immutable after construction; shared by the merger and both aggregators.
///
/// The order of `sources` is significant: it is the tie-break order for
/// merging and the execution order of the sequential aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceRegistry {
  pub sources:            Vec<SourceProfile>,
  pub field_priorities:   BTreeMap<String, Vec<SourceId>>,
  pub default_timeout_ms: u64,
}

impl SourceRegistry {
  pub fn profile(&self, id: &SourceId) -> Option<&SourceProfile> {
    self.sources.iter().find(|p| &p.id == id)
  }

  pub fn weight(&self, id: &SourceId) -> f64 {
    self
      .profile(id)
      .map(|p| p.weight.clamp(0.0, 1.0))
      .unwrap_or(DEFAULT_WEIGHT)
  }

  pub fn timeout(&self, id: &SourceId) -> Duration {
    let ms = self
      .profile(id)
      .map(|p| p.timeout_ms)
      .unwrap_or(self.default_timeout_ms);
    Duration::from_millis(ms)
  }

  pub fn priority(&self, id: &SourceId) -> i32 {
    self.profile(id).map(|p| p.priority).unwrap_or(DEFAULT_PRIORITY)
  }

  /// Position in the registry; unknown sources sort after every known one.
  pub fn rank(&self, id: &SourceId) -> usize {
    self
      .sources
      .iter()
      .position(|p| &p.id == id)
      .unwrap_or(usize::MAX)
  }

  /// `(len - index) * 5` when `source` is listed for `field`, else zero.
  pub fn priority_bonus(&self, field: &str, source: &SourceId) -> f64 {
    let Some(list) = self.field_priorities.get(field) else {
      return 0.0;
    };
    list
      .iter()
      .position(|s| s == source)
      .map(|idx| (list.len() - idx) as f64 * PRIORITY_STEP)
      .unwrap_or(0.0)
  }

  /// Sort ids into registry order; unknown ids last, by name.
  pub fn sort_ids(&self, ids: &mut [SourceId]) {
    ids.sort_by(|a, b| self.rank(a).cmp(&self.rank(b)).then_with(|| a.cmp(b)));
  }
}

impl Default for SourceRegistry {
  fn default() -> Self {
    let sources = vec![
      SourceProfile::new("libphonenumber", 0.95, 1_000, 10),
      SourceProfile::new(SourceId::PATTERN_ANALYSIS, 0.85, 5_000, 9),
      SourceProfile::new("abstractapi", 0.85, 10_000, 8),
      SourceProfile::new("neutrino", 0.80, 10_000, 7),
      SourceProfile::new("findandtrace", 0.70, 15_000, 6),
      SourceProfile::new("whois", 0.80, 30_000, 5),
      SourceProfile::new("telnyx", 0.85, 10_000, 1),
      SourceProfile::new("numverify", 0.75, 10_000, 1),
      SourceProfile::new("veriphone", 0.75, 10_000, 1),
    ];

    let list = |names: &[&str]| -> Vec<SourceId> {
      names.iter().map(SourceId::new).collect()
    };
    let pattern = [SourceId::PATTERN_ANALYSIS];

    let field_priorities = BTreeMap::from([
      ("is_valid".to_owned(), list(&["libphonenumber", "abstractapi", "telnyx"])),
      ("country".to_owned(), list(&["libphonenumber", "abstractapi", "neutrino"])),
      ("carrier".to_owned(), list(&["neutrino", "telnyx", "findandtrace"])),
      ("line_type".to_owned(), list(&["libphonenumber", "abstractapi", "neutrino"])),
      ("location".to_owned(), list(&["findandtrace", "neutrino", "abstractapi"])),
      ("operator".to_owned(), list(&["findandtrace", "neutrino", "abstractapi"])),
      ("circle".to_owned(), list(&["findandtrace", "libphonenumber"])),
      ("state".to_owned(), list(&["findandtrace", "neutrino"])),
      ("domains".to_owned(), list(&["whois"])),
      ("business_connections".to_owned(), list(&["whois"])),
      ("domain_count".to_owned(), list(&["whois"])),
      ("related_numbers".to_owned(), list(&pattern)),
      ("bulk_registration".to_owned(), list(&pattern)),
      ("sequential_patterns".to_owned(), list(&pattern)),
      ("carrier_block".to_owned(), list(&pattern)),
      ("pattern_intelligence".to_owned(), list(&pattern)),
    ]);

    Self { sources, field_priorities, default_timeout_ms: 30_000 }
  }
}
