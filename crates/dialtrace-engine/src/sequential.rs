//! The deterministic, one-at-a-time aggregation path.

use std::{sync::Arc, time::Instant};

use dialtrace_core::{Identifier, snapshot::Snapshot, source::Adapter};
use tracing::info;

use crate::runner::{AdapterRunner, registry_order_adapters};

pub struct SequentialAggregator {
  runner: Arc<AdapterRunner>,
}

impl SequentialAggregator {
  pub fn new(runner: Arc<AdapterRunner>) -> Self { Self { runner } }

  /// Query every adapter in registry order, then merge.
  pub async fn aggregate(
    &self,
    identifier: &Identifier,
    context: &str,
    adapters: &[Adapter],
  ) -> Snapshot {
    let started = Instant::now();
    let registry = self.runner.registry();

    let mut ordered = adapters.to_vec();
    registry_order_adapters(registry, &mut ordered);

    let mut results = Vec::with_capacity(ordered.len());
    for adapter in &ordered {
      results.push(self.runner.run(adapter, identifier, context).await);
    }

    let snapshot = Snapshot::assemble(
      identifier.clone(),
      context,
      results,
      Vec::new(),
      registry,
      started.elapsed(),
    );
    info!(
      hash = identifier.hash().short(),
      sources = snapshot.total_sources(),
      successful = snapshot.successful_sources(),
      confidence = snapshot.overall_confidence(),
      "sequential investigation complete"
    );
    snapshot
  }
}
