//! End-to-end tests for the runner, both aggregators and the investigator.

use std::{
  collections::BTreeMap,
  sync::{
    Arc, Mutex,
    atomic::{AtomicU32, Ordering},
  },
  time::{Duration, Instant},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dialtrace_core::{
  Error, Identifier, IdentifierHash,
  history::{
    CarrierTransition, ChangeEvent, ChangeType, CleanupReport, HistoricalRecord,
    HistoryMetadata, Projection, RecordOutcome, TimelineEvent,
  },
  registry::{SourceProfile, SourceRegistry},
  source::{
    Adapter, AdapterError, AdapterOutput, BlockingSourceAdapter, SourceAdapter,
    SourceId,
  },
  store::HistoryStore,
};
use dialtrace_store_sqlite::SqliteHistoryStore;
use serde_json::{Map, Value, json};

use crate::{
  EngineConfig, Investigator, Progress, RunOptions,
  adapters::StaticAdapter,
  cache::MemoryCache,
  orchestrator::Orchestrator,
  retry::{RetryConfig, RetryPolicy, RetryStrategy},
  runner::AdapterRunner,
  sequential::SequentialAggregator,
};

// ─── Fixtures ────────────────────────────────────────────────────────────────

const NUMBER: &str = "+91 98765 43210";

fn identifier() -> Identifier { Identifier::parse(NUMBER).unwrap() }

fn fields(pairs: &[(&str, Value)]) -> Map<String, Value> {
  pairs.iter().map(|(k, v)| ((*k).to_owned(), v.clone())).collect()
}

fn ok(id: &str, carrier: &str, confidence: f64) -> Adapter {
  Adapter::io(StaticAdapter::ok(
    id,
    fields(&[("carrier", json!(carrier)), ("line_type", json!("mobile"))]),
    confidence,
  ))
}

fn failing(id: &str) -> Adapter {
  Adapter::io(StaticAdapter::failing(id, AdapterError::Unavailable("down".into())))
}

fn runner(registry: SourceRegistry, retry: RetryConfig) -> Arc<AdapterRunner> {
  Arc::new(AdapterRunner::new(Arc::new(registry), retry, 2))
}

fn test_config() -> EngineConfig {
  EngineConfig {
    cache_ttl_secs: 0,
    retry: RetryConfig::disabled(),
    ..EngineConfig::default()
  }
}

/// Counts calls and fails with `error` for the first `failures` of them.
struct Flaky {
  id:       &'static str,
  calls:    AtomicU32,
  failures: u32,
  error:    AdapterError,
}

impl Flaky {
  fn new(id: &'static str, failures: u32, error: AdapterError) -> Arc<Self> {
    Arc::new(Self { id, calls: AtomicU32::new(0), failures, error })
  }

  fn calls(&self) -> u32 { self.calls.load(Ordering::SeqCst) }
}

#[async_trait]
impl SourceAdapter for Flaky {
  fn id(&self) -> SourceId { SourceId::new(self.id) }

  async fn query(
    &self,
    _identifier: &Identifier,
    _context: &str,
    _timeout: Duration,
  ) -> Result<AdapterOutput, AdapterError> {
    let n = self.calls.fetch_add(1, Ordering::SeqCst);
    if n < self.failures {
      return Err(self.error.clone());
    }
    Ok(AdapterOutput::new(fields(&[("carrier", json!("Airtel"))]), 80.0))
  }
}

/// Reports whatever carrier it is currently set to.
struct Carrier {
  carrier: Mutex<String>,
}

impl Carrier {
  fn new(carrier: &str) -> Arc<Self> {
    Arc::new(Self { carrier: Mutex::new(carrier.to_owned()) })
  }

  fn set(&self, carrier: &str) { *self.carrier.lock().unwrap() = carrier.to_owned(); }
}

#[async_trait]
impl SourceAdapter for Carrier {
  fn id(&self) -> SourceId { SourceId::new("neutrino") }

  async fn query(
    &self,
    _identifier: &Identifier,
    _context: &str,
    _timeout: Duration,
  ) -> Result<AdapterOutput, AdapterError> {
    let carrier = self.carrier.lock().unwrap().clone();
    Ok(AdapterOutput::new(
      fields(&[
        ("carrier", json!(carrier)),
        ("location", json!("Delhi")),
        ("line_type", json!("mobile")),
        ("is_valid", json!(true)),
      ]),
      85.0,
    ))
  }
}

/// A store whose every call fails.
struct BrokenStore;

fn broken() -> std::io::Error { std::io::Error::other("disk on fire") }

impl HistoryStore for BrokenStore {
  type Error = std::io::Error;

  async fn record(
    &self,
    _hash: IdentifierHash,
    _projection: Projection,
  ) -> Result<RecordOutcome, Self::Error> {
    Err(broken())
  }

  async fn history(
    &self,
    _hash: IdentifierHash,
    _limit: usize,
  ) -> Result<Vec<HistoricalRecord>, Self::Error> {
    Err(broken())
  }

  async fn metadata(
    &self,
    _hash: IdentifierHash,
  ) -> Result<Option<HistoryMetadata>, Self::Error> {
    Err(broken())
  }

  async fn changes(
    &self,
    _hash: IdentifierHash,
  ) -> Result<Vec<ChangeEvent>, Self::Error> {
    Err(broken())
  }

  async fn transitions(
    &self,
    _hash: IdentifierHash,
  ) -> Result<Vec<CarrierTransition>, Self::Error> {
    Err(broken())
  }

  async fn timeline(
    &self,
    _hash: IdentifierHash,
  ) -> Result<Vec<TimelineEvent>, Self::Error> {
    Err(broken())
  }

  async fn cleanup(
    &self,
    _cutoff: DateTime<Utc>,
  ) -> Result<CleanupReport, Self::Error> {
    Err(broken())
  }
}

/// Never answers inside any sane timeout.
struct Stalled {
  calls: AtomicU32,
}

#[async_trait]
impl SourceAdapter for Stalled {
  fn id(&self) -> SourceId { SourceId::new("stalled") }

  async fn query(
    &self,
    _identifier: &Identifier,
    _context: &str,
    _timeout: Duration,
  ) -> Result<AdapterOutput, AdapterError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(60)).await;
    Ok(AdapterOutput::new(Map::new(), 90.0))
  }
}

/// Holds a worker thread for `delay`.
struct Sleeper {
  id:    &'static str,
  delay: Duration,
}

impl BlockingSourceAdapter for Sleeper {
  fn id(&self) -> SourceId { SourceId::new(self.id) }

  fn query(
    &self,
    _identifier: &Identifier,
    _context: &str,
    _timeout: Duration,
  ) -> Result<AdapterOutput, AdapterError> {
    std::thread::sleep(self.delay);
    Ok(AdapterOutput::new(fields(&[("line_type", json!("mobile"))]), 70.0))
  }
}

// ─── Runner ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn transient_errors_are_retried() {
  let flaky = Flaky::new("neutrino", 2, AdapterError::Transient("blip".into()));
  let retry = RetryConfig {
    default:    RetryPolicy::new(3, 1, 5, RetryStrategy::Fixed),
    per_source: BTreeMap::new(),
  };
  let runner = runner(SourceRegistry::default(), retry);

  let adapter = Adapter::Io(Arc::clone(&flaky) as Arc<dyn SourceAdapter>);
  let result = runner.run(&adapter, &identifier(), "IN").await;
  assert!(result.success());
  assert_eq!(flaky.calls(), 3);
}

#[tokio::test]
async fn permanent_errors_are_not_retried() {
  let flaky = Flaky::new("neutrino", 5, AdapterError::Unavailable("gone".into()));
  let retry = RetryConfig {
    default:    RetryPolicy::new(3, 1, 5, RetryStrategy::Fixed),
    per_source: BTreeMap::new(),
  };
  let runner = runner(SourceRegistry::default(), retry);

  let adapter = Adapter::Io(Arc::clone(&flaky) as Arc<dyn SourceAdapter>);
  let result = runner.run(&adapter, &identifier(), "IN").await;
  assert!(!result.success());
  assert_eq!(flaky.calls(), 1);
  assert!(result.error().unwrap().contains("gone"));
}

#[tokio::test]
async fn successful_results_are_cached() {
  let flaky = Flaky::new("neutrino", 0, AdapterError::Other("unused".into()));
  let runner = AdapterRunner::new(
    Arc::new(SourceRegistry::default()),
    RetryConfig::disabled(),
    2,
  )
  .with_cache(Arc::new(MemoryCache::default()), Duration::from_secs(60));

  let adapter = Adapter::Io(Arc::clone(&flaky) as Arc<dyn SourceAdapter>);
  let first = runner.run(&adapter, &identifier(), "IN").await;
  let second = runner.run(&adapter, &identifier(), "IN").await;
  assert_eq!(flaky.calls(), 1);
  assert_eq!(first.fields(), second.fields());

  // A different context is a different key.
  runner.run(&adapter, &identifier(), "US").await;
  assert_eq!(flaky.calls(), 2);
}

#[tokio::test]
async fn slow_adapters_time_out() {
  let mut registry = SourceRegistry::default();
  registry.sources.push(SourceProfile::new("slow", 0.5, 50, 1));
  let runner = runner(registry, RetryConfig::disabled());

  let slow = Adapter::io(
    StaticAdapter::ok("slow", Map::new(), 90.0).with_delay(Duration::from_secs(5)),
  );
  let started = Instant::now();
  let result = runner.run(&slow, &identifier(), "IN").await;
  assert!(started.elapsed() < Duration::from_secs(2));
  assert!(!result.success());
  assert!(result.error().unwrap().contains("timed out"));
}

#[tokio::test(start_paused = true)]
async fn timeouts_are_not_retried() {
  let mut registry = SourceRegistry::default();
  registry.sources.push(SourceProfile::new("stalled", 0.5, 50, 1));
  let retry = RetryConfig {
    default:    RetryPolicy::new(3, 1, 5, RetryStrategy::Fixed),
    per_source: BTreeMap::new(),
  };
  let runner = runner(registry, retry);

  let stalled = Arc::new(Stalled { calls: AtomicU32::new(0) });
  let adapter = Adapter::Io(Arc::clone(&stalled) as Arc<dyn SourceAdapter>);
  let started = tokio::time::Instant::now();
  let result = runner.run(&adapter, &identifier(), "IN").await;
  assert!(started.elapsed() <= Duration::from_millis(50));
  assert!(!result.success());
  assert!(result.error().unwrap().contains("timed out"));
  assert_eq!(stalled.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn waiting_for_a_worker_does_not_count_against_the_timeout() {
  let mut registry = SourceRegistry::default();
  registry.sources.push(SourceProfile::new("first", 0.5, 300, 1));
  registry.sources.push(SourceProfile::new("second", 0.5, 300, 1));
  // One worker: the second call queues behind the first.
  let runner = Arc::new(AdapterRunner::new(
    Arc::new(registry),
    RetryConfig::disabled(),
    1,
  ));

  let delay = Duration::from_millis(200);
  let first = Adapter::blocking(Sleeper { id: "first", delay });
  let second = Adapter::blocking(Sleeper { id: "second", delay });
  let id = identifier();
  let (a, b) = tokio::join!(
    runner.run(&first, &id, "IN"),
    runner.run(&second, &id, "IN"),
  );
  assert!(a.success(), "{:?}", a.error());
  assert!(b.success(), "{:?}", b.error());
}

// ─── Sequential ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn sequential_runs_are_repeatable() {
  let aggregator =
    SequentialAggregator::new(runner(SourceRegistry::default(), RetryConfig::disabled()));
  let adapters = [
    ok("whois", "Jio", 48.0),
    ok("neutrino", "Airtel", 90.0),
    ok("abstractapi", "Airtel", 85.0),
    failing("numverify"),
  ];

  let a = aggregator.aggregate(&identifier(), "IN", &adapters).await;
  let b = aggregator.aggregate(&identifier(), "IN", &adapters).await;
  assert_eq!(a.merged(), b.merged());
  assert_eq!(a.overall_confidence(), b.overall_confidence());
  assert_eq!(a.merged().value("carrier"), Some(&json!("Airtel")));

  // Results come back in registry order regardless of input order.
  let order: Vec<&str> = a.results().iter().map(|r| r.source().as_str()).collect();
  assert_eq!(order, ["abstractapi", "neutrino", "whois", "numverify"]);
  assert_eq!(a.total_sources(), 4);
  assert_eq!(a.successful_sources(), 3);
  assert_eq!(a.errors().len(), 1);
}

#[tokio::test]
async fn all_failures_produce_an_empty_snapshot() {
  let aggregator =
    SequentialAggregator::new(runner(SourceRegistry::default(), RetryConfig::disabled()));
  let adapters = [failing("neutrino"), failing("whois")];

  let snapshot = aggregator.aggregate(&identifier(), "IN", &adapters).await;
  assert!(snapshot.merged().is_empty());
  assert_eq!(snapshot.overall_confidence(), 0.0);
  assert_eq!(snapshot.successful_sources(), 0);
  assert_eq!(snapshot.errors().len(), 2);
}

// ─── Orchestrator ────────────────────────────────────────────────────────────

#[tokio::test]
async fn timeouts_do_not_block_siblings() {
  let mut registry = SourceRegistry::default();
  registry.sources.push(SourceProfile::new("slow", 0.5, 50, 1));
  let orchestrator =
    Orchestrator::new(runner(registry, RetryConfig::disabled()), 4);
  let adapters = [
    Adapter::io(
      StaticAdapter::ok("slow", Map::new(), 90.0).with_delay(Duration::from_secs(5)),
    ),
    ok("numverify", "Airtel", 80.0),
  ];

  let snapshot = orchestrator
    .run(&identifier(), "IN", &adapters, RunOptions::default())
    .await;
  assert_eq!(snapshot.total_sources(), 2);
  assert_eq!(snapshot.successful_sources(), 1);
  assert_eq!(snapshot.merged().value("carrier"), Some(&json!("Airtel")));
}

#[tokio::test]
async fn groups_past_the_deadline_are_not_attempted() {
  let mut registry = SourceRegistry::default();
  registry.sources.push(SourceProfile::new("first", 0.9, 1_000, 50));
  let orchestrator =
    Orchestrator::new(runner(registry, RetryConfig::disabled()), 4);
  let adapters = [
    Adapter::io(
      StaticAdapter::ok("first", fields(&[("carrier", json!("Airtel"))]), 90.0)
        .with_delay(Duration::from_millis(150)),
    ),
    ok("numverify", "Jio", 80.0),
    ok("veriphone", "Jio", 80.0),
  ];

  let options = RunOptions {
    deadline: Some(Instant::now() + Duration::from_millis(20)),
    progress: None,
  };
  let snapshot = orchestrator.run(&identifier(), "IN", &adapters, options).await;

  assert_eq!(snapshot.total_sources(), 1);
  let skipped: Vec<&str> = snapshot.not_attempted().iter().map(SourceId::as_str).collect();
  assert_eq!(skipped, ["numverify", "veriphone"]);
  assert_eq!(snapshot.merged().value("carrier"), Some(&json!("Airtel")));
  assert!(snapshot.errors().is_empty());
}

#[tokio::test]
async fn progress_is_reported_per_adapter() {
  let orchestrator = Orchestrator::new(
    runner(SourceRegistry::default(), RetryConfig::disabled()),
    4,
  );
  let adapters = [
    ok("libphonenumber", "Airtel", 95.0),
    ok("neutrino", "Airtel", 90.0),
    failing("whois"),
  ];

  let seen: Arc<Mutex<Vec<Progress>>> = Arc::default();
  let sink = Arc::clone(&seen);
  let options = RunOptions {
    deadline: None,
    progress: Some(Arc::new(move |p: &Progress| sink.lock().unwrap().push(p.clone()))),
  };
  orchestrator.run(&identifier(), "IN", &adapters, options).await;

  let seen = seen.lock().unwrap();
  let completed: Vec<usize> = seen.iter().map(|p| p.completed).collect();
  assert_eq!(completed, [1, 2, 3]);
  assert!(seen.iter().all(|p| p.total == 3));
  assert_eq!(seen.iter().filter(|p| !p.success).count(), 1);
  assert_eq!(seen[2].to_string(), "3 of 3 steps complete");
}

#[tokio::test]
async fn merge_ignores_completion_order() {
  let registry = SourceRegistry::default();
  let orchestrator = Orchestrator::new(runner(registry, RetryConfig::disabled()), 4);
  // Same priority group; the slower one finishes last.
  let fast_first = [
    Adapter::io(
      StaticAdapter::ok("telnyx", fields(&[("carrier", json!("Airtel"))]), 80.0)
        .with_delay(Duration::from_millis(30)),
    ),
    ok("numverify", "Jio", 80.0),
  ];
  let slow_first = [
    ok("telnyx", "Airtel", 80.0),
    Adapter::io(
      StaticAdapter::ok("numverify", fields(&[("carrier", json!("Jio"))]), 80.0)
        .with_delay(Duration::from_millis(30)),
    ),
  ];

  let a = orchestrator
    .run(&identifier(), "IN", &fast_first, RunOptions::default())
    .await;
  let b = orchestrator
    .run(&identifier(), "IN", &slow_first, RunOptions::default())
    .await;
  assert_eq!(a.merged().value("carrier"), b.merged().value("carrier"));
}

// ─── Investigator ────────────────────────────────────────────────────────────

async fn investigator(adapters: Vec<Adapter>) -> Investigator<SqliteHistoryStore> {
  let store = SqliteHistoryStore::open_in_memory().await.unwrap();
  Investigator::new(test_config(), store).with_adapters(adapters)
}

#[tokio::test]
async fn invalid_identifiers_are_rejected() {
  let inv = investigator(Vec::new()).await;
  let err = inv.investigate("call me", "IN").await.unwrap_err();
  assert!(matches!(err, Error::InvalidIdentifier { .. }));
  assert!(inv.history("12", None).await.is_err());
}

#[tokio::test]
async fn investigations_include_pattern_analysis() {
  let inv = investigator(vec![ok("neutrino", "Airtel", 90.0)]).await;
  let snapshot = inv.investigate(NUMBER, "IN").await.unwrap();

  let sources: Vec<&str> =
    snapshot.results().iter().map(|r| r.source().as_str()).collect();
  assert_eq!(sources, ["pattern_analysis", "neutrino"]);
  assert!(snapshot.merged().value("bulk_registration").is_some());
  assert_eq!(inv.history(NUMBER, None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn carrier_change_is_detected_as_porting() {
  let carrier = Carrier::new("Airtel");
  let inv = investigator(vec![Adapter::Io(
    Arc::clone(&carrier) as Arc<dyn SourceAdapter>
  )])
  .await;

  inv.investigate(NUMBER, "IN").await.unwrap();
  carrier.set("Jio");
  inv.investigate(NUMBER, "IN").await.unwrap();

  let porting = inv.detect_porting(NUMBER).await.unwrap();
  assert!(porting.porting_detected);
  assert_eq!(porting.total_transitions, 1);
  assert_eq!(porting.original_carrier.as_deref(), Some("Airtel"));
  assert_eq!(porting.current_carrier.as_deref(), Some("Jio"));

  let timeline = inv.timeline(NUMBER).await.unwrap();
  assert!(timeline.iter().any(|e| matches!(
    e,
    TimelineEvent::Change(c) if c.change_type == ChangeType::CarrierChange
  )));

  let summary = inv.history_summary(NUMBER).await.unwrap();
  assert_eq!(summary.records.len(), 2);
  assert_eq!(summary.metadata.map(|m| m.total_investigations), Some(2));
  assert!(summary.porting.porting_detected);
  // Carrier field change plus the carrier transition.
  assert!(timeline.iter().any(|e| matches!(e, TimelineEvent::CarrierTransition(_))));
  assert_eq!(summary.stability.total_changes, timeline.len());
  assert!(summary.stability.total_changes >= 2);
}

#[tokio::test]
async fn history_aware_investigation_reports_changes() {
  let carrier = Carrier::new("Airtel");
  let inv = investigator(vec![Adapter::Io(
    Arc::clone(&carrier) as Arc<dyn SourceAdapter>
  )])
  .await;

  let first = inv
    .investigate_with_history(NUMBER, "IN", None, RunOptions::default())
    .await
    .unwrap();
  assert!(first.changes.is_empty());
  assert!(!first.porting.porting_detected);

  carrier.set("Jio");
  let second = inv
    .investigate_with_history(NUMBER, "IN", None, RunOptions::default())
    .await
    .unwrap();
  assert_eq!(second.changes.len(), 1);
  assert_eq!(second.changes[0].old_value, "Airtel");
  assert_eq!(second.changes[0].new_value, "Jio");
  assert!(second.transition.is_some());
  assert!(second.porting.porting_detected);
  assert!(
    second
      .insights
      .risk_indicators
      .contains(&"Number porting detected".to_owned())
  );
  assert!(second.recommendations.iter().any(|r| r.starts_with("Number porting")));
}

#[tokio::test]
async fn source_filter_limits_the_run() {
  let inv = investigator(vec![
    ok("neutrino", "Airtel", 90.0),
    ok("whois", "Jio", 48.0),
  ])
  .await;
  let only = [SourceId::new("whois")];
  let snapshot = inv
    .investigate_async(NUMBER, "IN", Some(&only), RunOptions::default())
    .await
    .unwrap();
  assert_eq!(snapshot.total_sources(), 1);
  assert_eq!(snapshot.merged().value("carrier"), Some(&json!("Jio")));
}

#[tokio::test]
async fn persistence_failures_are_soft() {
  let inv = Investigator::new(test_config(), BrokenStore)
    .with_adapters([ok("neutrino", "Airtel", 90.0)]);

  let snapshot = inv.investigate(NUMBER, "IN").await.unwrap();
  assert!(snapshot.successful_sources() > 0);
  assert!(snapshot.errors().iter().any(|e| e.starts_with("history:")));

  assert!(inv.history(NUMBER, None).await.unwrap().is_empty());
  let ownership = inv.detect_ownership_change(NUMBER).await.unwrap();
  assert!(!ownership.detected);
  assert!(inv.cleanup(30).await.is_err());
}

#[tokio::test]
async fn relationship_confidence_via_investigator() {
  let inv = investigator(Vec::new()).await;
  let score = inv
    .relationship_confidence("9876543213", "9876543210", "IN")
    .unwrap();
  assert!((score - 0.825).abs() < 1e-9);
}
