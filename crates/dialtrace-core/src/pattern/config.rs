//! Prefix tables and thresholds for the pattern engine.
//!
//! Everything here deserialises from configuration; [`Default`] reproduces
//! the built-in tables for India and the United States.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarrierPrefixes {
  pub carrier:  String,
  pub prefixes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionPrefixes {
  pub region:   String,
  pub prefixes: Vec<String>,
}

/// Numbering-plan facts for one country.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CountryProfile {
  pub calling_code:       String,
  pub national_len:       Option<usize>,
  pub trunk_prefix:       Option<String>,
  /// Checked in order; the first carrier with a matching prefix wins.
  pub carriers:           Vec<CarrierPrefixes>,
  pub regions:            Vec<RegionPrefixes>,
  pub bulk_prefixes:      Vec<String>,
  pub toll_free_prefixes: Vec<String>,
  pub premium_prefixes:   Vec<String>,
  pub voip_prefixes:      Vec<String>,
}

impl CountryProfile {
  /// Strip the calling code or trunk prefix from a normalised number.
  pub fn national_number<'a>(&self, digits: &'a str) -> &'a str {
    let Some(len) = self.national_len else {
      return digits;
    };
    if !self.calling_code.is_empty()
      && digits.len() == self.calling_code.len() + len
      && let Some(rest) = digits.strip_prefix(self.calling_code.as_str())
    {
      return rest;
    }
    if let Some(trunk) = &self.trunk_prefix
      && digits.len() == trunk.len() + len
      && let Some(rest) = digits.strip_prefix(trunk.as_str())
    {
      return rest;
    }
    digits
  }

  /// The carrier and the prefix that matched, if any.
  pub fn carrier_for(&self, national: &str) -> Option<(&str, &str)> {
    self.carriers.iter().find_map(|c| {
      c.prefixes
        .iter()
        .find(|p| national.starts_with(p.as_str()))
        .map(|p| (c.carrier.as_str(), p.as_str()))
    })
  }

  pub fn region_for(&self, national: &str) -> Option<&str> {
    self
      .regions
      .iter()
      .find(|r| r.prefixes.iter().any(|p| national.starts_with(p.as_str())))
      .map(|r| r.region.as_str())
  }

  pub fn is_bulk_prefix(&self, national: &str, len: usize) -> bool {
    national.len() >= len
      && self.bulk_prefixes.iter().any(|p| p == &national[..len])
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
  /// Keyed by upper-case ISO country code.
  pub countries:            BTreeMap<String, CountryProfile>,
  /// Sequential neighbours are searched up to this distance either side.
  pub sequential_window:    u64,
  pub max_related:          usize,
  /// Digit-match ratio a neighbour must exceed to count as similar.
  pub similarity_threshold: f64,
  pub max_similar:          usize,
  pub block_prefix_len:     usize,
  pub block_steps:          u64,
  pub block_step_size:      u64,
  pub bulk_prefix_len:      usize,
  /// Shortest run of consecutive digits that counts as a sequence.
  pub min_consecutive_run:  usize,
}

impl PatternConfig {
  /// Case-insensitive; configuration layers may lowercase keys.
  pub fn country(&self, code: &str) -> Option<&CountryProfile> {
    let code = code.trim();
    self
      .countries
      .iter()
      .find(|(k, _)| k.eq_ignore_ascii_case(code))
      .map(|(_, profile)| profile)
  }
}

impl Default for PatternConfig {
  fn default() -> Self {
    Self {
      countries:            BTreeMap::from([
        ("IN".to_owned(), india()),
        ("US".to_owned(), united_states()),
      ]),
      sequential_window:    10,
      max_related:          20,
      similarity_threshold: 0.5,
      max_similar:          5,
      block_prefix_len:     6,
      block_steps:          5,
      block_step_size:      100,
      bulk_prefix_len:      4,
      min_consecutive_run:  4,
    }
  }
}

fn strings(items: &[&str]) -> Vec<String> {
  items.iter().map(|s| (*s).to_owned()).collect()
}

fn range(lo: u32, hi: u32) -> impl Iterator<Item = String> {
  (lo..=hi).map(|n| n.to_string())
}

fn carrier(
  name: &str,
  prefixes: impl IntoIterator<Item = String>,
) -> CarrierPrefixes {
  CarrierPrefixes {
    carrier:  name.to_owned(),
    prefixes: prefixes.into_iter().collect(),
  }
}

fn region(name: &str, prefixes: &[&str]) -> RegionPrefixes {
  RegionPrefixes { region: name.to_owned(), prefixes: strings(prefixes) }
}

fn india() -> CountryProfile {
  CountryProfile {
    calling_code:       "91".into(),
    national_len:       Some(10),
    trunk_prefix:       Some("0".into()),
    carriers:           vec![
      carrier("Airtel", std::iter::once("70".to_owned()).chain(range(80, 89))),
      carrier("Jio", range(60, 69)),
      carrier("Vodafone", range(90, 99)),
      carrier("BSNL", range(94, 99)),
      carrier("Idea", range(90, 99)),
    ],
    regions:            Vec::new(),
    bulk_prefixes:      strings(&["9000", "9001", "9002", "8000", "8001", "7000"]),
    toll_free_prefixes: strings(&["1800", "1860"]),
    premium_prefixes:   strings(&["900"]),
    voip_prefixes:      strings(&["560", "561", "562"]),
  }
}

fn united_states() -> CountryProfile {
  CountryProfile {
    calling_code:       "1".into(),
    national_len:       Some(10),
    trunk_prefix:       None,
    carriers:           vec![
      carrier(
        "Verizon",
        strings(&["201", "202", "203", "212", "213", "214", "215", "216"]),
      ),
      carrier(
        "AT&T",
        strings(&["214", "469", "972", "903", "430", "432", "409", "361"]),
      ),
      carrier(
        "T-Mobile",
        strings(&["206", "253", "360", "425", "509", "564"]),
      ),
    ],
    regions:            vec![
      region("New Jersey", &["201"]),
      region("District of Columbia", &["202"]),
      region("Connecticut", &["203"]),
      region("New York", &["212"]),
      region("Los Angeles", &["213"]),
      region("Dallas", &["214", "469", "972"]),
      region("Philadelphia", &["215"]),
      region("Cleveland", &["216"]),
      region("Seattle", &["206", "253", "360", "425", "564"]),
      region("East Texas", &["903", "430", "409"]),
      region("West Texas", &["432"]),
      region("Corpus Christi", &["361"]),
      region("Eastern Washington", &["509"]),
    ],
    bulk_prefixes:      Vec::new(),
    toll_free_prefixes: strings(&[
      "800", "888", "877", "866", "855", "844", "833",
    ]),
    premium_prefixes:   strings(&["900"]),
    voip_prefixes:      Vec::new(),
  }
}
