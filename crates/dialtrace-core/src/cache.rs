//! The result-cache contract.

use std::time::Duration;

use serde_json::Value;

use crate::{identifier::IdentifierHash, source::SourceId};

/// A get/put key-value cache with per-entry time-to-live. Implementations
/// are internally synchronised.
pub trait Cache: Send + Sync {
  fn get(&self, key: &str) -> Option<Value>;

  fn put(&self, key: &str, value: Value, ttl: Duration);
}

/// `source:context:hash`, the key under which one source's answer is cached.
pub fn result_key(
  source: &SourceId,
  context: &str,
  hash: &IdentifierHash,
) -> String {
  format!("{source}:{}:{hash}", context.to_ascii_uppercase())
}
