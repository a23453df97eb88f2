//! The public face of the engine.
//!
//! An [`Investigator`] owns everything one deployment needs: the registry,
//! the pattern engine, the adapter runner with its worker pool and cache,
//! the orchestrator with its I/O semaphore, and the history store. There is
//! no global state; two investigators never share resources unless the
//! caller hands them the same store.
//!
//! Only a malformed identifier is a hard error. Adapter failures land in the
//! snapshot, and persistence failures are logged, appended to the snapshot's
//! errors and otherwise ignored. History reads that fail return empty
//! analyses.

use std::{fmt, sync::Arc, time::Duration};

use chrono::Utc;
use dialtrace_core::{
  Identifier, IdentifierHash, Result,
  history::{
    self, CarrierTransition, ChangeEvent, CleanupReport, DataQuality,
    HistoricalRecord, HistorySummary, OwnershipAnalysis, PortingAnalysis,
    RecordOutcome, StabilityAssessment, TimelineEvent,
  },
  pattern::{PatternEngine, PatternReport},
  registry::SourceRegistry,
  snapshot::Snapshot,
  source::{Adapter, SourceId},
  store::HistoryStore,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
  adapters::PatternAdapter,
  cache::MemoryCache,
  config::EngineConfig,
  insights::{self, EnhancedInsights},
  orchestrator::{Orchestrator, RunOptions},
  runner::AdapterRunner,
  sequential::SequentialAggregator,
};

/// The result of [`Investigator::investigate_with_history`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestigationReport {
  pub snapshot:        Snapshot,
  pub changes:         Vec<ChangeEvent>,
  pub transition:      Option<CarrierTransition>,
  pub porting:         PortingAnalysis,
  pub ownership:       OwnershipAnalysis,
  pub stability:       StabilityAssessment,
  pub insights:        EnhancedInsights,
  pub recommendations: Vec<String>,
}

pub struct Investigator<S> {
  registry:     Arc<SourceRegistry>,
  patterns:     Arc<PatternEngine>,
  sequential:   SequentialAggregator,
  orchestrator: Orchestrator,
  adapters:     Vec<Adapter>,
  store:        S,
  config:       EngineConfig,
}

impl<S: HistoryStore> Investigator<S> {
  /// Build an investigator whose only adapter is the built-in pattern
  /// analysis. Add more with [`Investigator::with_adapters`].
  pub fn new(config: EngineConfig, store: S) -> Self {
    let registry = Arc::new(config.registry.clone());
    let patterns = Arc::new(PatternEngine::new(config.patterns.clone()));

    let mut runner = AdapterRunner::new(
      Arc::clone(&registry),
      config.retry.clone(),
      config.orchestrator.worker_pool_size,
    );
    if config.cache_ttl_secs > 0 {
      runner = runner.with_cache(
        Arc::new(MemoryCache::default()),
        Duration::from_secs(config.cache_ttl_secs),
      );
    }
    let runner = Arc::new(runner);

    Self {
      sequential: SequentialAggregator::new(Arc::clone(&runner)),
      orchestrator: Orchestrator::new(runner, config.orchestrator.max_concurrent),
      adapters: vec![Adapter::blocking(PatternAdapter::new(Arc::clone(&patterns)))],
      registry,
      patterns,
      store,
      config,
    }
  }

  /// Register additional adapters. An adapter whose id is already present
  /// replaces the earlier one.
  pub fn with_adapters(mut self, adapters: impl IntoIterator<Item = Adapter>) -> Self {
    for adapter in adapters {
      let id = adapter.id();
      self.adapters.retain(|a| a.id() != id);
      self.adapters.push(adapter);
    }
    self
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn registry(&self) -> &SourceRegistry { &self.registry }

  pub fn config(&self) -> &EngineConfig { &self.config }

  /// Ids of every registered adapter, in registry order.
  pub fn sources(&self) -> Vec<SourceId> {
    let mut ids: Vec<SourceId> = self.adapters.iter().map(Adapter::id).collect();
    self.registry.sort_ids(&mut ids);
    ids
  }

  // ─── Investigation ─────────────────────────────────────────────────────────

  /// Query every adapter one at a time, then record the result.
  pub async fn investigate(&self, raw: &str, context: &str) -> Result<Snapshot> {
    let identifier = Identifier::parse(raw)?;
    let snapshot = self
      .sequential
      .aggregate(&identifier, context, &self.adapters)
      .await;
    Ok(self.persist(snapshot).await.0)
  }

  /// Query adapters concurrently in priority groups, then record the result.
  /// `sources` restricts the run to the named adapters.
  pub async fn investigate_async(
    &self,
    raw: &str,
    context: &str,
    sources: Option<&[SourceId]>,
    options: RunOptions,
  ) -> Result<Snapshot> {
    let identifier = Identifier::parse(raw)?;
    let snapshot = self.run_concurrent(&identifier, context, sources, options).await;
    Ok(self.persist(snapshot).await.0)
  }

  /// Investigate, record, and analyse the result against prior history.
  /// `sources` filters adapters as for [`Self::investigate_async`].
  pub async fn investigate_with_history(
    &self,
    raw: &str,
    context: &str,
    sources: Option<&[SourceId]>,
    options: RunOptions,
  ) -> Result<InvestigationReport> {
    let identifier = Identifier::parse(raw)?;
    let hash = identifier.hash();
    let snapshot = self.run_concurrent(&identifier, context, sources, options).await;
    let (snapshot, outcome) = self.persist(snapshot).await;
    let (changes, transition) = match outcome {
      Some(RecordOutcome { changes, transition, .. }) => (changes, transition),
      None => (Vec::new(), None),
    };

    let porting = self.porting_for(&hash).await;
    let ownership = self.ownership_for(&hash).await;
    let stability = self.stability_for(&hash, &porting, &ownership).await;
    let total_investigations = self
      .read(&hash, "metadata", self.store.metadata(hash.clone()).await)
      .map_or(0, |m| m.total_investigations);

    let insights =
      EnhancedInsights::derive(&snapshot, total_investigations, &porting, &ownership);
    let recommendations = insights::recommendations(
      &snapshot,
      changes.len(),
      &porting,
      &ownership,
      &stability,
    );

    Ok(InvestigationReport {
      snapshot,
      changes,
      transition,
      porting,
      ownership,
      stability,
      insights,
      recommendations,
    })
  }

  async fn run_concurrent(
    &self,
    identifier: &Identifier,
    context: &str,
    sources: Option<&[SourceId]>,
    options: RunOptions,
  ) -> Snapshot {
    let adapters: Vec<Adapter> = match sources {
      Some(wanted) => self
        .adapters
        .iter()
        .filter(|a| wanted.contains(&a.id()))
        .cloned()
        .collect(),
      None => self.adapters.clone(),
    };
    self.orchestrator.run(identifier, context, &adapters, options).await
  }

  async fn persist(&self, snapshot: Snapshot) -> (Snapshot, Option<RecordOutcome>) {
    let hash = snapshot.identifier().hash();
    match self.store.record(hash.clone(), snapshot.projection()).await {
      Ok(outcome) => (snapshot, Some(outcome)),
      Err(e) => {
        warn!(hash = hash.short(), error = %e, "could not record investigation");
        (snapshot.with_error(format!("history: {e}")), None)
      }
    }
  }

  // ─── History ───────────────────────────────────────────────────────────────

  /// Up to `limit` records, newest first. `None` uses the configured limit.
  pub async fn history(
    &self,
    raw: &str,
    limit: Option<usize>,
  ) -> Result<Vec<HistoricalRecord>> {
    let hash = Identifier::parse(raw)?.hash();
    let limit = limit.unwrap_or(self.config.history_limit);
    Ok(self.read(&hash, "history", self.store.history(hash.clone(), limit).await))
  }

  pub async fn detect_porting(&self, raw: &str) -> Result<PortingAnalysis> {
    let hash = Identifier::parse(raw)?.hash();
    Ok(self.porting_for(&hash).await)
  }

  pub async fn detect_ownership_change(&self, raw: &str) -> Result<OwnershipAnalysis> {
    let hash = Identifier::parse(raw)?.hash();
    Ok(self.ownership_for(&hash).await)
  }

  pub async fn timeline(&self, raw: &str) -> Result<Vec<TimelineEvent>> {
    let hash = Identifier::parse(raw)?.hash();
    Ok(self.read(&hash, "timeline", self.store.timeline(hash.clone()).await))
  }

  pub async fn assess_stability(&self, raw: &str) -> Result<StabilityAssessment> {
    let hash = Identifier::parse(raw)?.hash();
    let porting = self.porting_for(&hash).await;
    let ownership = self.ownership_for(&hash).await;
    Ok(self.stability_for(&hash, &porting, &ownership).await)
  }

  pub async fn history_summary(&self, raw: &str) -> Result<HistorySummary> {
    let hash = Identifier::parse(raw)?.hash();
    let records = self.read(
      &hash,
      "history",
      self.store.history(hash.clone(), self.config.history_limit).await,
    );
    let metadata = self.read(&hash, "metadata", self.store.metadata(hash.clone()).await);
    let timeline = self.read(&hash, "timeline", self.store.timeline(hash.clone()).await);
    let porting = self.porting_for(&hash).await;
    let ownership = history::analyze_ownership(&records, self.config.ownership_window);
    let stability = self.stability_for(&hash, &porting, &ownership).await;
    let recommendations =
      history::summary_recommendations(records.len(), &porting, &ownership, &stability);

    Ok(HistorySummary {
      identifier_hash: hash,
      generated_at: Utc::now(),
      quality: DataQuality::from_record_count(records.len()),
      records,
      metadata,
      timeline,
      porting,
      ownership,
      stability,
      recommendations,
    })
  }

  /// Delete history older than `retention_days`.
  pub async fn cleanup(&self, retention_days: u32) -> Result<CleanupReport, S::Error> {
    let cutoff = history::retention_cutoff(Utc::now(), retention_days);
    self.store.cleanup(cutoff).await
  }

  async fn porting_for(&self, hash: &IdentifierHash) -> PortingAnalysis {
    let transitions =
      self.read(hash, "transitions", self.store.transitions(hash.clone()).await);
    history::analyze_porting(&transitions)
  }

  async fn ownership_for(&self, hash: &IdentifierHash) -> OwnershipAnalysis {
    let records = self.read(
      hash,
      "history",
      self.store.history(hash.clone(), self.config.ownership_window).await,
    );
    history::analyze_ownership(&records, self.config.ownership_window)
  }

  async fn stability_for(
    &self,
    hash: &IdentifierHash,
    porting: &PortingAnalysis,
    ownership: &OwnershipAnalysis,
  ) -> StabilityAssessment {
    // Field changes and carrier transitions both count.
    let timeline = self.read(hash, "timeline", self.store.timeline(hash.clone()).await);
    let investigations = self
      .read(hash, "metadata", self.store.metadata(hash.clone()).await)
      .map_or(0, |m| m.total_investigations);
    history::assess_stability(timeline.len(), investigations, porting, ownership)
  }

  fn read<T: Default>(
    &self,
    hash: &IdentifierHash,
    what: &str,
    result: Result<T, impl fmt::Display>,
  ) -> T {
    result.unwrap_or_else(|e| {
      warn!(hash = hash.short(), what, error = %e, "history read failed");
      T::default()
    })
  }

  // ─── Patterns ──────────────────────────────────────────────────────────────

  pub fn analyze_patterns(&self, raw: &str, context: &str) -> Result<PatternReport> {
    let identifier = Identifier::parse(raw)?;
    Ok(self.patterns.analyze(&identifier, context))
  }

  pub fn relationship_confidence(&self, a: &str, b: &str, context: &str) -> Result<f64> {
    let (a, b) = (Identifier::parse(a)?, Identifier::parse(b)?);
    Ok(self.patterns.relationship_confidence(&a, &b, context))
  }
}
