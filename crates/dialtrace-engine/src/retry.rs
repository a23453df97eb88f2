//! Retry policy applied uniformly around adapter calls.

use std::{collections::BTreeMap, time::Duration};

use dialtrace_core::source::SourceId;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

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
pub enum RetryStrategy {
  #[default]
  Exponential,
  Linear,
  Fixed,
  Immediate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
  /// Total attempts, including the first.
  pub max_attempts:  u32,
  pub base_delay_ms: u64,
  pub max_delay_ms:  u64,
  pub strategy:      RetryStrategy,
  /// Growth factor for [`RetryStrategy::Exponential`].
  pub multiplier:    f64,
}

impl RetryPolicy {
  pub fn new(
    max_attempts: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
    strategy: RetryStrategy,
  ) -> Self {
    Self { max_attempts, base_delay_ms, max_delay_ms, strategy, multiplier: 2.0 }
  }

  /// A policy that never retries.
  pub fn once() -> Self { Self::new(1, 0, 0, RetryStrategy::Immediate) }

  /// Delay before retry number `retry` (1 for the first retry).
  pub fn delay(&self, retry: u32) -> Duration {
    let base = self.base_delay_ms as f64;
    let n = retry.max(1);
    let ms = match self.strategy {
      RetryStrategy::Exponential => {
        base * self.multiplier.max(1.0).powi(n.saturating_sub(1) as i32)
      }
      RetryStrategy::Linear => base * f64::from(n),
      RetryStrategy::Fixed => base,
      RetryStrategy::Immediate => 0.0,
    };
    Duration::from_millis(ms.min(self.max_delay_ms as f64) as u64)
  }
}

impl Default for RetryPolicy {
  fn default() -> Self { Self::new(3, 1_000, 30_000, RetryStrategy::Exponential) }
}

/// The default policy plus per-source overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
  pub default:    RetryPolicy,
  pub per_source: BTreeMap<SourceId, RetryPolicy>,
}

impl RetryConfig {
  pub fn policy_for(&self, source: &SourceId) -> &RetryPolicy {
    self.per_source.get(source).unwrap_or(&self.default)
  }

  /// Every source tried exactly once.
  pub fn disabled() -> Self {
    Self { default: RetryPolicy::once(), per_source: BTreeMap::new() }
  }
}

impl Default for RetryConfig {
  fn default() -> Self {
    use RetryStrategy::*;
    Self {
      default:    RetryPolicy::default(),
      per_source: BTreeMap::from([
        ("abstractapi".into(), RetryPolicy::new(3, 2_000, 30_000, Exponential)),
        ("neutrino".into(), RetryPolicy::new(2, 1_500, 20_000, Exponential)),
        ("findandtrace".into(), RetryPolicy::new(3, 1_000, 15_000, Linear)),
        ("whois".into(), RetryPolicy::new(2, 500, 10_000, Fixed)),
      ]),
    }
  }
}
