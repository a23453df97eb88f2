//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings with a fixed microsecond width so that
//! lexical order matches time order. Maps and sets are compact JSON.

use chrono::{DateTime, SecondsFormat, Utc};
use dialtrace_core::{
  IdentifierHash,
  history::{
    CarrierTransition, ChangeEvent, ChangeType, HistoricalRecord,
    HistoryMetadata, Projection,
  },
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn decode_change_type(s: &str) -> Result<ChangeType> {
  s.parse().map_err(|_| {
    Error::Core(dialtrace_core::Error::UnknownDiscriminant {
      kind:  "change type",
      value: s.to_owned(),
    })
  })
}

// ─── Investigations ──────────────────────────────────────────────────────────

/// One `investigations` row, column for column.
pub struct RawInvestigation {
  pub record_id:        String,
  pub identifier_hash:  String,
  pub recorded_at:      String,
  pub carrier:          Option<String>,
  pub location:         Option<String>,
  pub number_type:      Option<String>,
  pub is_valid:         Option<bool>,
  pub is_mobile:        Option<bool>,
  pub country_code:     Option<String>,
  pub reputation_score: Option<f64>,
  pub social_presence:  String,
  pub domains:          String,
  pub sources_used:     String,
  pub confidence:       f64,
}

pub const INVESTIGATION_COLUMNS: &str = "record_id, identifier_hash, \
  recorded_at, carrier, location, number_type, is_valid, is_mobile, \
  country_code, reputation_score, social_presence, domains, sources_used, \
  confidence";

impl RawInvestigation {
  pub fn from_record(record: &HistoricalRecord) -> Result<Self> {
    let p = &record.projection;
    Ok(Self {
      record_id:        encode_uuid(record.record_id),
      identifier_hash:  record.identifier_hash.as_str().to_owned(),
      recorded_at:      encode_dt(record.recorded_at),
      carrier:          p.carrier.clone(),
      location:         p.location.clone(),
      number_type:      p.number_type.clone(),
      is_valid:         p.is_valid,
      is_mobile:        p.is_mobile,
      country_code:     p.country_code.clone(),
      reputation_score: p.reputation_score,
      social_presence:  serde_json::to_string(&p.social_presence)?,
      domains:          serde_json::to_string(&p.domains)?,
      sources_used:     serde_json::to_string(&p.sources_used)?,
      confidence:       p.confidence,
    })
  }

  /// Read a row selected with [`INVESTIGATION_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      record_id:        row.get(0)?,
      identifier_hash:  row.get(1)?,
      recorded_at:      row.get(2)?,
      carrier:          row.get(3)?,
      location:         row.get(4)?,
      number_type:      row.get(5)?,
      is_valid:         row.get(6)?,
      is_mobile:        row.get(7)?,
      country_code:     row.get(8)?,
      reputation_score: row.get(9)?,
      social_presence:  row.get(10)?,
      domains:          row.get(11)?,
      sources_used:     row.get(12)?,
      confidence:       row.get(13)?,
    })
  }

  pub fn into_record(self) -> Result<HistoricalRecord> {
    Ok(HistoricalRecord {
      record_id:       decode_uuid(&self.record_id)?,
      identifier_hash: IdentifierHash::from_hex(self.identifier_hash),
      recorded_at:     decode_dt(&self.recorded_at)?,
      projection:      Projection {
        carrier:          self.carrier,
        location:         self.location,
        number_type:      self.number_type,
        is_valid:         self.is_valid,
        is_mobile:        self.is_mobile,
        country_code:     self.country_code,
        reputation_score: self.reputation_score,
        social_presence:  serde_json::from_str(&self.social_presence)?,
        domains:          serde_json::from_str(&self.domains)?,
        sources_used:     serde_json::from_str(&self.sources_used)?,
        confidence:       self.confidence,
      },
    })
  }
}

// ─── Changes ─────────────────────────────────────────────────────────────────

pub struct RawChange {
  pub change_id:       String,
  pub identifier_hash: String,
  pub change_type:     String,
  pub field:           String,
  pub old_value:       String,
  pub new_value:       String,
  pub detected_at:     String,
  pub confidence:      f64,
  pub source:          String,
}

pub const CHANGE_COLUMNS: &str = "change_id, identifier_hash, change_type, \
  field, old_value, new_value, detected_at, confidence, source";

impl RawChange {
  pub fn from_event(event: &ChangeEvent) -> Self {
    Self {
      change_id:       encode_uuid(event.change_id),
      identifier_hash: event.identifier_hash.as_str().to_owned(),
      change_type:     event.change_type.as_ref().to_owned(),
      field:           event.field.clone(),
      old_value:       event.old_value.clone(),
      new_value:       event.new_value.clone(),
      detected_at:     encode_dt(event.detected_at),
      confidence:      event.confidence,
      source:          event.source.clone(),
    }
  }

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      change_id:       row.get(0)?,
      identifier_hash: row.get(1)?,
      change_type:     row.get(2)?,
      field:           row.get(3)?,
      old_value:       row.get(4)?,
      new_value:       row.get(5)?,
      detected_at:     row.get(6)?,
      confidence:      row.get(7)?,
      source:          row.get(8)?,
    })
  }

  pub fn into_event(self) -> Result<ChangeEvent> {
    Ok(ChangeEvent {
      change_id:       decode_uuid(&self.change_id)?,
      identifier_hash: IdentifierHash::from_hex(self.identifier_hash),
      change_type:     decode_change_type(&self.change_type)?,
      field:           self.field,
      old_value:       self.old_value,
      new_value:       self.new_value,
      detected_at:     decode_dt(&self.detected_at)?,
      confidence:      self.confidence,
      source:          self.source,
    })
  }
}

// ─── Carrier transitions ─────────────────────────────────────────────────────

pub struct RawTransition {
  pub transition_id:    String,
  pub identifier_hash:  String,
  pub from_carrier:     String,
  pub to_carrier:       String,
  pub transitioned_at:  String,
  pub confidence:       f64,
  pub porting_detected: bool,
}

pub const TRANSITION_COLUMNS: &str = "transition_id, identifier_hash, \
  from_carrier, to_carrier, transitioned_at, confidence, porting_detected";

impl RawTransition {
  pub fn from_transition(t: &CarrierTransition) -> Self {
    Self {
      transition_id:    encode_uuid(t.transition_id),
      identifier_hash:  t.identifier_hash.as_str().to_owned(),
      from_carrier:     t.from_carrier.clone(),
      to_carrier:       t.to_carrier.clone(),
      transitioned_at:  encode_dt(t.transitioned_at),
      confidence:       t.confidence,
      porting_detected: t.porting_detected,
    }
  }

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      transition_id:    row.get(0)?,
      identifier_hash:  row.get(1)?,
      from_carrier:     row.get(2)?,
      to_carrier:       row.get(3)?,
      transitioned_at:  row.get(4)?,
      confidence:       row.get(5)?,
      porting_detected: row.get(6)?,
    })
  }

  pub fn into_transition(self) -> Result<CarrierTransition> {
    Ok(CarrierTransition {
      transition_id:    decode_uuid(&self.transition_id)?,
      identifier_hash:  IdentifierHash::from_hex(self.identifier_hash),
      from_carrier:     self.from_carrier,
      to_carrier:       self.to_carrier,
      transitioned_at:  decode_dt(&self.transitioned_at)?,
      confidence:       self.confidence,
      porting_detected: self.porting_detected,
    })
  }
}

// ─── Metadata ────────────────────────────────────────────────────────────────

pub struct RawMetadata {
  pub identifier_hash:      String,
  pub first_seen:           String,
  pub last_seen:            String,
  pub total_investigations: i64,
}

impl RawMetadata {
  pub fn into_metadata(self) -> Result<HistoryMetadata> {
    Ok(HistoryMetadata {
      identifier_hash:      IdentifierHash::from_hex(self.identifier_hash),
      first_seen:           decode_dt(&self.first_seen)?,
      last_seen:            decode_dt(&self.last_seen)?,
      total_investigations: u64::try_from(self.total_investigations)
        .unwrap_or_default(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn timestamps_sort_lexically() {
    let a = encode_dt(DateTime::from_timestamp(1_700_000_000, 0).unwrap());
    let b =
      encode_dt(DateTime::from_timestamp(1_700_000_000, 500_000_000).unwrap());
    assert_eq!(a.len(), b.len());
    assert!(a < b);
    assert_eq!(decode_dt(&b).unwrap().timestamp_subsec_millis(), 500);
  }

  #[test]
  fn change_types_round_trip_through_text() {
    for ct in ChangeType::ALL {
      assert_eq!(decode_change_type(ct.as_ref()).unwrap(), ct);
    }
    assert!(decode_change_type("ownership_change").is_err());
  }
}
