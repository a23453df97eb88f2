//! Engine configuration. Every field has a default, so an empty config
//! section yields a working engine.

use dialtrace_core::{
  history::DEFAULT_OWNERSHIP_WINDOW, pattern::PatternConfig,
  registry::SourceRegistry,
};
use serde::{Deserialize, Serialize};

use crate::retry::RetryConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
  /// Upper bound on concurrent I/O adapter calls, across investigations.
  pub max_concurrent:   usize,
  /// Worker slots for blocking adapters.
  pub worker_pool_size: usize,
}

impl Default for OrchestratorConfig {
  fn default() -> Self { Self { max_concurrent: 10, worker_pool_size: 5 } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  pub registry:         SourceRegistry,
  pub patterns:         PatternConfig,
  pub orchestrator:     OrchestratorConfig,
  pub retry:            RetryConfig,
  /// Lifetime of cached per-source results; zero disables caching.
  pub cache_ttl_secs:   u64,
  /// Records returned by history reads.
  pub history_limit:    usize,
  pub ownership_window: usize,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      registry:         SourceRegistry::default(),
      patterns:         PatternConfig::default(),
      orchestrator:     OrchestratorConfig::default(),
      retry:            RetryConfig::default(),
      cache_ttl_secs:   1_800,
      history_limit:    100,
      ownership_window: DEFAULT_OWNERSHIP_WINDOW,
    }
  }
}
