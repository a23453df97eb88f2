//! The investigated identifier and its privacy-preserving hash.
//!
//! Raw input is normalised to its digit string once, at the edge. Everything
//! persisted refers to the number only through [`IdentifierHash`].

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Shortest and longest digit strings accepted (E.164 caps numbers at 15).
const MIN_DIGITS: usize = 7;
const MAX_DIGITS: usize = 15;

/// A normalised phone number: ASCII digits only, no leading `+`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
  /// Normalise `raw` by stripping common punctuation and a leading `+`.
  ///
  /// Fails with [`Error::InvalidIdentifier`] when anything other than digits
  /// remains or the digit count is outside `7..=15`.
  pub fn parse(raw: &str) -> Result<Self> {
    let trimmed = raw.trim();
    let body = trimmed.strip_prefix('+').unwrap_or(trimmed);

    let mut digits = String::with_capacity(body.len());
    for c in body.chars() {
      match c {
        '0'..='9' => digits.push(c),
        ' ' | '-' | '(' | ')' | '.' => {}
        other => {
          return Err(Error::InvalidIdentifier {
            input:  raw.to_owned(),
            reason: format!("unexpected character {other:?}"),
          });
        }
      }
    }

    if !(MIN_DIGITS..=MAX_DIGITS).contains(&digits.len()) {
      return Err(Error::InvalidIdentifier {
        input:  raw.to_owned(),
        reason: format!(
          "expected {MIN_DIGITS}-{MAX_DIGITS} digits, found {}",
          digits.len()
        ),
      });
    }

    Ok(Self(digits))
  }

  pub fn digits(&self) -> &str { &self.0 }

  /// The stable one-way hash used as the storage key.
  pub fn hash(&self) -> IdentifierHash {
    let digest = Sha256::digest(self.0.as_bytes());
    IdentifierHash(hex::encode(digest))
  }
}

impl fmt::Display for Identifier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Lowercase hex SHA-256 of an [`Identifier`]'s digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentifierHash(String);

impl IdentifierHash {
  /// Wrap an already-computed digest, e.g. one read back from the store.
  pub fn from_hex(hex: impl Into<String>) -> Self { Self(hex.into()) }

  pub fn as_str(&self) -> &str { &self.0 }

  /// Twelve-character prefix; enough to correlate log lines.
  pub fn short(&self) -> &str { &self.0[..self.0.len().min(12)] }
}

impl fmt::Display for IdentifierHash {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}
