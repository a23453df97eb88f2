//! [`SqliteHistoryStore`]: the SQLite implementation of [`HistoryStore`].

use std::{
  collections::HashMap,
  path::Path,
  sync::{Arc, Mutex, PoisonError},
};

use chrono::{DateTime, Utc};
use dialtrace_core::{
  IdentifierHash,
  history::{
    self, CarrierTransition, ChangeEvent, CleanupReport, HistoricalRecord,
    HistoryMetadata, Projection, RecordOutcome, TimelineEvent,
  },
  store::HistoryStore,
};
use rusqlite::OptionalExtension as _;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
  Result,
  encode::{
    CHANGE_COLUMNS, INVESTIGATION_COLUMNS, RawChange, RawInvestigation,
    RawMetadata, RawTransition, TRANSITION_COLUMNS, encode_dt,
  },
  schema::SCHEMA,
};

type HashLocks = Mutex<HashMap<IdentifierHash, Arc<tokio::sync::Mutex<()>>>>;

/// Held for the duration of one `record`. The last holder for a hash removes
/// its entry from the table.
struct WriteLock {
  locks: Arc<HashLocks>,
  hash:  IdentifierHash,
  guard: Option<tokio::sync::OwnedMutexGuard<()>>,
}

impl Drop for WriteLock {
  fn drop(&mut self) {
    drop(self.guard.take());
    let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
    if locks.get(&self.hash).is_some_and(|l| Arc::strong_count(l) == 1) {
      locks.remove(&self.hash);
    }
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// Investigation history backed by a single SQLite file.
///
/// Cloning is cheap; the connection and the lock table are shared.
#[derive(Clone)]
pub struct SqliteHistoryStore {
  conn:  tokio_rusqlite::Connection,
  locks: Arc<HashLocks>,
}

impl SqliteHistoryStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::with_connection(conn).await
  }

  /// Open an in-memory store; useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::with_connection(conn).await
  }

  async fn with_connection(conn: tokio_rusqlite::Connection) -> Result<Self> {
    conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(Self { conn, locks: Arc::default() })
  }

  /// Wait for exclusive write access to one hash.
  async fn write_lock(&self, hash: &IdentifierHash) -> WriteLock {
    let lock = {
      let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
      Arc::clone(locks.entry(hash.clone()).or_default())
    };
    let guard = lock.lock_owned().await;
    WriteLock {
      locks: Arc::clone(&self.locks),
      hash:  hash.clone(),
      guard: Some(guard),
    }
  }

  #[cfg(test)]
  pub(crate) fn conn_for_tests(&self) -> &tokio_rusqlite::Connection {
    &self.conn
  }

  #[cfg(test)]
  pub(crate) fn held_locks(&self) -> usize {
    self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
  }

  async fn latest(&self, hash: &IdentifierHash) -> Result<Option<HistoricalRecord>> {
    let mut records = self.history(hash.clone(), 1).await?;
    Ok(records.pop())
  }

  async fn insert_outcome(&self, outcome: &RecordOutcome) -> Result<()> {
    let investigation = RawInvestigation::from_record(&outcome.record)?;
    let changes: Vec<RawChange> =
      outcome.changes.iter().map(RawChange::from_event).collect();
    let transition = outcome.transition.as_ref().map(RawTransition::from_transition);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let r = &investigation;
        tx.execute(
          &format!(
            "INSERT INTO investigations ({INVESTIGATION_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
          ),
          rusqlite::params![
            r.record_id,
            r.identifier_hash,
            r.recorded_at,
            r.carrier,
            r.location,
            r.number_type,
            r.is_valid,
            r.is_mobile,
            r.country_code,
            r.reputation_score,
            r.social_presence,
            r.domains,
            r.sources_used,
            r.confidence,
          ],
        )?;

        tx.execute(
          "INSERT INTO metadata
             (identifier_hash, first_seen, last_seen, total_investigations)
           VALUES (?1, ?2, ?2, 1)
           ON CONFLICT (identifier_hash) DO UPDATE SET
             last_seen            = excluded.last_seen,
             total_investigations = total_investigations + 1",
          rusqlite::params![r.identifier_hash, r.recorded_at],
        )?;

        for c in &changes {
          tx.execute(
            &format!(
              "INSERT INTO changes ({CHANGE_COLUMNS})
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
            ),
            rusqlite::params![
              c.change_id,
              c.identifier_hash,
              c.change_type,
              c.field,
              c.old_value,
              c.new_value,
              c.detected_at,
              c.confidence,
              c.source,
            ],
          )?;
        }

        if let Some(t) = &transition {
          tx.execute(
            &format!(
              "INSERT INTO carrier_transitions ({TRANSITION_COLUMNS})
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
            ),
            rusqlite::params![
              t.transition_id,
              t.identifier_hash,
              t.from_carrier,
              t.to_carrier,
              t.transitioned_at,
              t.confidence,
              t.porting_detected,
            ],
          )?;
        }

        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── HistoryStore impl ───────────────────────────────────────────────────────

impl HistoryStore for SqliteHistoryStore {
  type Error = crate::Error;

  async fn record(
    &self,
    hash: IdentifierHash,
    projection: Projection,
  ) -> Result<RecordOutcome> {
    let _lock = self.write_lock(&hash).await;

    let previous = self.latest(&hash).await?;
    let now = Utc::now();
    let record = HistoricalRecord {
      record_id: Uuid::new_v4(),
      identifier_hash: hash,
      projection,
      recorded_at: now,
    };

    let (changes, transition) = match &previous {
      Some(prev) => (
        history::detect_changes(&record.projection, prev, now),
        history::carrier_transition(&record.projection, prev, now),
      ),
      None => (Vec::new(), None),
    };

    let outcome = RecordOutcome { record, changes, transition };
    self.insert_outcome(&outcome).await?;

    debug!(
      hash = outcome.record.identifier_hash.short(),
      changes = outcome.changes.len(),
      "recorded investigation"
    );
    if let Some(t) = &outcome.transition {
      info!(
        hash = t.identifier_hash.short(),
        from = %t.from_carrier,
        to = %t.to_carrier,
        "carrier transition recorded"
      );
    }
    Ok(outcome)
  }

  async fn history(
    &self,
    hash: IdentifierHash,
    limit: usize,
  ) -> Result<Vec<HistoricalRecord>> {
    let hash = hash.as_str().to_owned();
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let raws: Vec<RawInvestigation> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {INVESTIGATION_COLUMNS} FROM investigations
           WHERE identifier_hash = ?1
           ORDER BY recorded_at DESC, rowid DESC
           LIMIT ?2"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![hash, limit], RawInvestigation::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawInvestigation::into_record).collect()
  }

  async fn metadata(&self, hash: IdentifierHash) -> Result<Option<HistoryMetadata>> {
    let hash = hash.as_str().to_owned();

    let raw: Option<RawMetadata> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT identifier_hash, first_seen, last_seen, total_investigations
               FROM metadata WHERE identifier_hash = ?1",
              rusqlite::params![hash],
              |row| {
                Ok(RawMetadata {
                  identifier_hash:      row.get(0)?,
                  first_seen:           row.get(1)?,
                  last_seen:            row.get(2)?,
                  total_investigations: row.get(3)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawMetadata::into_metadata).transpose()
  }

  async fn changes(&self, hash: IdentifierHash) -> Result<Vec<ChangeEvent>> {
    let hash = hash.as_str().to_owned();

    let raws: Vec<RawChange> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CHANGE_COLUMNS} FROM changes
           WHERE identifier_hash = ?1
           ORDER BY detected_at DESC, rowid DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![hash], RawChange::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawChange::into_event).collect()
  }

  async fn transitions(
    &self,
    hash: IdentifierHash,
  ) -> Result<Vec<CarrierTransition>> {
    let hash = hash.as_str().to_owned();

    let raws: Vec<RawTransition> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {TRANSITION_COLUMNS} FROM carrier_transitions
           WHERE identifier_hash = ?1
           ORDER BY transitioned_at DESC, rowid DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![hash], RawTransition::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTransition::into_transition).collect()
  }

  async fn timeline(&self, hash: IdentifierHash) -> Result<Vec<TimelineEvent>> {
    let changes = self.changes(hash.clone()).await?;
    let transitions = self.transitions(hash).await?;
    Ok(history::timeline(changes, transitions))
  }

  async fn cleanup(&self, cutoff: DateTime<Utc>) -> Result<CleanupReport> {
    let cutoff_str = encode_dt(cutoff);

    let (investigations, changes, transitions, orphaned_metadata) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let investigations = tx.execute(
          "DELETE FROM investigations WHERE recorded_at < ?1",
          rusqlite::params![cutoff_str],
        )?;
        let changes = tx.execute(
          "DELETE FROM changes WHERE detected_at < ?1",
          rusqlite::params![cutoff_str],
        )?;
        let transitions = tx.execute(
          "DELETE FROM carrier_transitions WHERE transitioned_at < ?1",
          rusqlite::params![cutoff_str],
        )?;
        let orphaned = tx.execute(
          "DELETE FROM metadata WHERE identifier_hash NOT IN
             (SELECT DISTINCT identifier_hash FROM investigations)",
          [],
        )?;
        tx.commit()?;
        Ok((investigations, changes, transitions, orphaned))
      })
      .await?;

    let report = CleanupReport {
      cutoff,
      investigations,
      changes,
      transitions,
      orphaned_metadata,
    };
    info!(
      cutoff = %cutoff,
      removed = report.total(),
      "retention cleanup complete"
    );
    Ok(report)
  }
}
