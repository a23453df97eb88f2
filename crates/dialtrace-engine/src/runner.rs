//! Invokes one adapter under its timeout, retry policy and the result cache,
//! always producing a [`SourceResult`].

use std::{
  sync::Arc,
  time::{Duration, Instant},
};

use dialtrace_core::{
  Identifier,
  cache::{Cache, result_key},
  registry::SourceRegistry,
  source::{Adapter, AdapterError, AdapterOutput, SourceId, SourceResult},
};
use tokio::{sync::Semaphore, task::JoinError};
use tracing::{debug, warn};

use crate::retry::RetryConfig;

pub struct AdapterRunner {
  registry:  Arc<SourceRegistry>,
  retry:     RetryConfig,
  cache:     Option<Arc<dyn Cache>>,
  cache_ttl: Duration,
  workers:   Arc<Semaphore>,
}

impl AdapterRunner {
  pub fn new(
    registry: Arc<SourceRegistry>,
    retry: RetryConfig,
    worker_pool_size: usize,
  ) -> Self {
    Self {
      registry,
      retry,
      cache: None,
      cache_ttl: Duration::ZERO,
      workers: Arc::new(Semaphore::new(worker_pool_size.max(1))),
    }
  }

  pub fn with_cache(mut self, cache: Arc<dyn Cache>, ttl: Duration) -> Self {
    self.cache = Some(cache);
    self.cache_ttl = ttl;
    self
  }

  pub fn registry(&self) -> &SourceRegistry { &self.registry }

  /// Run `adapter` to completion. Errors, timeouts and panics all become a
  /// failed result. Only transient errors are retried, so a source never
  /// runs past its timeout.
  pub async fn run(
    &self,
    adapter: &Adapter,
    identifier: &Identifier,
    context: &str,
  ) -> SourceResult {
    let source = adapter.id();
    let key = result_key(&source, context, &identifier.hash());

    if let Some(output) = self.cached(&key) {
      debug!(%source, "cache hit");
      return SourceResult::succeeded(source, output, Duration::ZERO);
    }

    let policy = self.retry.policy_for(&source);
    let timeout = self.registry.timeout(&source);
    let started = Instant::now();
    let mut attempt = 1;

    loop {
      match self.attempt(adapter, identifier, context, timeout).await {
        Ok(output) => {
          debug!(%source, attempt, "adapter succeeded");
          self.store(&key, &output);
          return SourceResult::succeeded(source, output, started.elapsed());
        }
        Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
          let delay = policy.delay(attempt);
          debug!(%source, attempt, ?delay, error = %err, "retrying adapter");
          tokio::time::sleep(delay).await;
          attempt += 1;
        }
        Err(err) => {
          warn!(%source, attempt, error = %err, "adapter failed");
          return SourceResult::failed(source, err, started.elapsed());
        }
      }
    }
  }

  async fn attempt(
    &self,
    adapter: &Adapter,
    identifier: &Identifier,
    context: &str,
    timeout: Duration,
  ) -> Result<AdapterOutput, AdapterError> {
    let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    let identifier = identifier.clone();
    let context = context.to_owned();

    match adapter {
      Adapter::Io(a) => {
        let a = Arc::clone(a);
        let handle = tokio::spawn(async move {
          a.query(&identifier, &context, timeout).await
        });
        let abort = handle.abort_handle();
        match tokio::time::timeout(timeout, handle).await {
          Ok(joined) => joined.unwrap_or_else(|e| Err(join_error(e))),
          Err(_) => {
            abort.abort();
            Err(AdapterError::Timeout(timeout_ms))
          }
        }
      }
      Adapter::Blocking(a) => {
        let a = Arc::clone(a);
        // The timeout starts once a worker is free.
        let permit = Arc::clone(&self.workers)
          .acquire_owned()
          .await
          .map_err(|_| AdapterError::Unavailable("worker pool closed".into()))?;
        // Blocking work cannot be cancelled, so a timed-out call keeps its
        // worker until the thread returns.
        let handle = tokio::task::spawn_blocking(move || {
          let _permit = permit;
          a.query(&identifier, &context, timeout)
        });
        match tokio::time::timeout(timeout, handle).await {
          Ok(joined) => joined.unwrap_or_else(|e| Err(join_error(e))),
          Err(_) => Err(AdapterError::Timeout(timeout_ms)),
        }
      }
    }
  }

  fn cached(&self, key: &str) -> Option<AdapterOutput> {
    let value = self.cache.as_ref()?.get(key)?;
    serde_json::from_value(value).ok()
  }

  fn store(&self, key: &str, output: &AdapterOutput) {
    let Some(cache) = &self.cache else { return };
    match serde_json::to_value(output) {
      Ok(value) => cache.put(key, value, self.cache_ttl),
      Err(e) => warn!(error = %e, "could not cache adapter output"),
    }
  }
}

fn join_error(e: JoinError) -> AdapterError {
  if e.is_panic() {
    AdapterError::Other("adapter panicked".into())
  } else {
    AdapterError::Other("adapter task cancelled".into())
  }
}

/// Sort results into registry order; unknown sources last, by name.
pub fn registry_order(registry: &SourceRegistry, results: &mut [SourceResult]) {
  results.sort_by(|a, b| {
    registry
      .rank(a.source())
      .cmp(&registry.rank(b.source()))
      .then_with(|| a.source().cmp(b.source()))
  });
}

/// Sort adapters the same way.
pub fn registry_order_adapters(registry: &SourceRegistry, adapters: &mut [Adapter]) {
  adapters.sort_by_cached_key(|a| {
    let id: SourceId = a.id();
    (registry.rank(&id), id)
  });
}
