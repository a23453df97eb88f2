//! The `HistoryStore` trait.
//!
//! Implemented by storage backends (e.g. `dialtrace-store-sqlite`). The
//! engine depends on this abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  history::{
    CarrierTransition, ChangeEvent, CleanupReport, HistoricalRecord,
    HistoryMetadata, Projection, RecordOutcome, TimelineEvent,
  },
  identifier::IdentifierHash,
};

/// Append-only investigation history keyed by identifier hash.
///
/// All methods return `Send` futures so the trait can be used from
/// multi-threaded runtimes (e.g. tokio with `axum`).
pub trait HistoryStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Append a record, bump metadata, and persist whatever changed relative
  /// to the previous record for the same hash.
  ///
  /// Concurrent calls for the same hash are serialised.
  fn record(
    &self,
    hash: IdentifierHash,
    projection: Projection,
  ) -> impl Future<Output = Result<RecordOutcome, Self::Error>> + Send + '_;

  /// Up to `limit` records, newest first.
  fn history(
    &self,
    hash: IdentifierHash,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<HistoricalRecord>, Self::Error>> + Send + '_;

  fn metadata(
    &self,
    hash: IdentifierHash,
  ) -> impl Future<Output = Result<Option<HistoryMetadata>, Self::Error>> + Send + '_;

  /// All change events, newest first.
  fn changes(
    &self,
    hash: IdentifierHash,
  ) -> impl Future<Output = Result<Vec<ChangeEvent>, Self::Error>> + Send + '_;

  /// All carrier transitions, newest first.
  fn transitions(
    &self,
    hash: IdentifierHash,
  ) -> impl Future<Output = Result<Vec<CarrierTransition>, Self::Error>> + Send + '_;

  /// Changes and transitions interleaved, newest first.
  fn timeline(
    &self,
    hash: IdentifierHash,
  ) -> impl Future<Output = Result<Vec<TimelineEvent>, Self::Error>> + Send + '_;

  /// Delete every row recorded before `cutoff`, then any metadata left
  /// without investigations.
  fn cleanup(
    &self,
    cutoff: DateTime<Utc>,
  ) -> impl Future<Output = Result<CleanupReport, Self::Error>> + Send + '_;
}
