//! Concurrent aggregation with priority staging.
//!
//! Adapters are grouped by registry priority and the groups run strictly one
//! after another, highest first. Within a group every adapter runs at once,
//! each under its own timeout. Once the optional deadline passes, groups that
//! have not started are skipped and reported as not attempted.

use std::{
  cmp::Reverse,
  collections::{BTreeMap, HashSet},
  fmt,
  sync::Arc,
  time::Instant,
};

use dialtrace_core::{
  Identifier,
  snapshot::Snapshot,
  source::{Adapter, SourceId, SourceResult},
};
use serde::{Deserialize, Serialize};
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{debug, info, warn};

use crate::runner::{AdapterRunner, registry_order};

/// Reported after each adapter resolves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
  pub completed: usize,
  pub total:     usize,
  pub source:    SourceId,
  pub success:   bool,
}

impl fmt::Display for Progress {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} of {} steps complete", self.completed, self.total)
  }
}

pub type ProgressFn = Arc<dyn Fn(&Progress) + Send + Sync>;

/// Per-call knobs for [`Orchestrator::run`].
#[derive(Clone, Default)]
pub struct RunOptions {
  pub deadline: Option<Instant>,
  pub progress: Option<ProgressFn>,
}

pub struct Orchestrator {
  runner: Arc<AdapterRunner>,
  io:     Arc<Semaphore>,
}

impl Orchestrator {
  pub fn new(runner: Arc<AdapterRunner>, max_concurrent: usize) -> Self {
    Self { runner, io: Arc::new(Semaphore::new(max_concurrent.max(1))) }
  }

  pub async fn run(
    &self,
    identifier: &Identifier,
    context: &str,
    adapters: &[Adapter],
    options: RunOptions,
  ) -> Snapshot {
    let started = Instant::now();
    let registry = self.runner.registry();
    let total = adapters.len();

    let mut groups: BTreeMap<Reverse<i32>, Vec<Adapter>> = BTreeMap::new();
    for adapter in adapters {
      let priority = registry.priority(&adapter.id());
      groups.entry(Reverse(priority)).or_default().push(adapter.clone());
    }

    let mut results: Vec<SourceResult> = Vec::with_capacity(total);
    let mut not_attempted: Vec<SourceId> = Vec::new();
    let mut completed = 0;

    for (Reverse(priority), group) in groups {
      if options.deadline.is_some_and(|d| Instant::now() >= d) {
        debug!(priority, skipped = group.len(), "deadline passed");
        not_attempted.extend(group.iter().map(Adapter::id));
        continue;
      }

      let mut pending: HashSet<SourceId> = group.iter().map(Adapter::id).collect();
      let mut tasks = JoinSet::new();
      for adapter in group {
        let runner = Arc::clone(&self.runner);
        let io = Arc::clone(&self.io);
        let identifier = identifier.clone();
        let context = context.to_owned();
        tasks.spawn(async move {
          // Blocking adapters are bounded by the runner's worker pool.
          let _permit = match &adapter {
            Adapter::Io(_) => io.acquire_owned().await.ok(),
            Adapter::Blocking(_) => None,
          };
          runner.run(&adapter, &identifier, &context).await
        });
      }

      while let Some(joined) = tasks.join_next().await {
        match joined {
          Ok(result) => {
            pending.remove(result.source());
            completed += 1;
            if let Some(progress) = &options.progress {
              progress(&Progress {
                completed,
                total,
                source: result.source().clone(),
                success: result.success(),
              });
            }
            results.push(result);
          }
          Err(e) => warn!(error = %e, "orchestrator task failed"),
        }
      }

      // Anything still pending lost its task outright.
      for source in pending {
        completed += 1;
        if let Some(progress) = &options.progress {
          progress(&Progress {
            completed,
            total,
            source: source.clone(),
            success: false,
          });
        }
        results.push(SourceResult::failed(
          source,
          "adapter task aborted",
          started.elapsed(),
        ));
      }
    }

    registry_order(registry, &mut results);
    registry.sort_ids(&mut not_attempted);

    let snapshot = Snapshot::assemble(
      identifier.clone(),
      context,
      results,
      not_attempted,
      registry,
      started.elapsed(),
    );
    info!(
      hash = identifier.hash().short(),
      sources = snapshot.total_sources(),
      successful = snapshot.successful_sources(),
      skipped = snapshot.not_attempted().len(),
      confidence = snapshot.overall_confidence(),
      elapsed_ms = snapshot.processing_ms(),
      "investigation complete"
    );
    snapshot
  }
}
