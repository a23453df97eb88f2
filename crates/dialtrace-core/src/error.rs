//! Error types for `dialtrace-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The raw identifier could not be normalised into a dialable number.
  /// Raised before any source adapter runs.
  #[error("invalid identifier {input:?}: {reason}")]
  InvalidIdentifier { input: String, reason: String },

  #[error("unknown {kind} discriminant: {value:?}")]
  UnknownDiscriminant { kind: &'static str, value: String },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
