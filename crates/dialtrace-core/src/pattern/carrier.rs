//! Carrier allocation blocks and special number ranges.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::config::CountryProfile;

const PREFIX_MATCH_CONFIDENCE: f64 = 0.8;
const SPECIAL_ALLOCATION_BONUS: f64 = 0.3;

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
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
pub enum AllocationType {
  #[default]
  Standard,
  TollFree,
  Premium,
  Voip,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CarrierBlockAnalysis {
  pub detected:        bool,
  pub carrier:         Option<String>,
  pub prefix:          Option<String>,
  pub allocation_info: Option<String>,
  pub allocation:      AllocationType,
  pub characteristics: BTreeMap<String, String>,
  pub confidence:      f64,
}

pub fn analyze(national: &str, country: &CountryProfile) -> CarrierBlockAnalysis {
  let mut out = CarrierBlockAnalysis::default();

  if let Some((carrier, prefix)) = country.carrier_for(national) {
    out.detected = true;
    out.carrier = Some(carrier.to_owned());
    out.prefix = Some(prefix.to_owned());
    out.allocation_info = Some(format!("Standard {carrier} allocation"));
    out.confidence = PREFIX_MATCH_CONFIDENCE;
  }

  let (allocation, characteristics) = allocation(national, country);
  out.allocation = allocation;
  out.characteristics = characteristics;
  if allocation != AllocationType::Standard {
    out.detected = true;
    out.confidence += SPECIAL_ALLOCATION_BONUS;
  }

  out.confidence = out.confidence.min(1.0);
  out
}

/// VoIP ranges take precedence over toll-free, toll-free over premium.
pub fn allocation(
  national: &str,
  country: &CountryProfile,
) -> (AllocationType, BTreeMap<String, String>) {
  let matches = |prefixes: &[String]| {
    prefixes.iter().any(|p| national.starts_with(p.as_str()))
  };
  let mut characteristics = BTreeMap::new();

  let mut kind = AllocationType::Standard;
  if matches(&country.toll_free_prefixes) {
    kind = AllocationType::TollFree;
    characteristics.insert("cost".to_owned(), "free".to_owned());
  } else if matches(&country.premium_prefixes) {
    kind = AllocationType::Premium;
    characteristics.insert("cost".to_owned(), "premium_rate".to_owned());
  }
  if matches(&country.voip_prefixes) {
    kind = AllocationType::Voip;
    characteristics.insert("technology".to_owned(), "voice_over_ip".to_owned());
  }

  (kind, characteristics)
}
