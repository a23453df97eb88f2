//! In-process [`Cache`] backed by `moka`, with a TTL per entry.

use std::time::{Duration, Instant};

use dialtrace_core::cache::Cache;
use moka::{Expiry, sync::Cache as MokaCache};
use serde_json::Value;

#[derive(Clone)]
struct Entry {
  value: Value,
  ttl:   Duration,
}

struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
  fn expire_after_create(
    &self,
    _key: &String,
    entry: &Entry,
    _created_at: Instant,
  ) -> Option<Duration> {
    Some(entry.ttl)
  }
}

/// A bounded, thread-safe cache. Cloning shares the underlying store.
#[derive(Clone)]
pub struct MemoryCache {
  inner: MokaCache<String, Entry>,
}

impl MemoryCache {
  pub fn new(max_entries: u64) -> Self {
    let inner = MokaCache::builder()
      .max_capacity(max_entries)
      .expire_after(PerEntryTtl)
      .build();
    Self { inner }
  }
}

impl Default for MemoryCache {
  fn default() -> Self { Self::new(10_000) }
}

impl Cache for MemoryCache {
  fn get(&self, key: &str) -> Option<Value> {
    self.inner.get(key).map(|e| e.value)
  }

  fn put(&self, key: &str, value: Value, ttl: Duration) {
    if ttl.is_zero() {
      return;
    }
    self.inner.insert(key.to_owned(), Entry { value, ttl });
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn stores_and_returns_values() {
    let cache = MemoryCache::default();
    cache.put("neutrino:IN:abc", json!({"carrier": "Jio"}), Duration::from_secs(60));
    assert_eq!(cache.get("neutrino:IN:abc"), Some(json!({"carrier": "Jio"})));
    assert_eq!(cache.get("whois:IN:abc"), None);
  }

  #[test]
  fn entries_expire() {
    let cache = MemoryCache::default();
    cache.put("k", json!(1), Duration::from_millis(20));
    std::thread::sleep(Duration::from_millis(60));
    assert_eq!(cache.get("k"), None);
  }

  #[test]
  fn zero_ttl_is_not_stored() {
    let cache = MemoryCache::default();
    cache.put("k", json!(1), Duration::ZERO);
    assert_eq!(cache.get("k"), None);
  }
}
