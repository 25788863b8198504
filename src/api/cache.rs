//! Caching implementations for pattern types.

use sha2::{Digest, Sha256};

use crate::cache::{Cacheable, QueryKey};

use super::types::ProxyPattern;

impl Cacheable for ProxyPattern {
  fn cache_key(&self) -> String {
    self.id.to_string()
  }

  fn entity_type() -> &'static str {
    "proxy_pattern"
  }
}

/// Query keys for pattern service calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PatternQueryKey {
  /// The full pattern list
  List,
}

impl QueryKey for PatternQueryKey {
  fn cache_hash(&self) -> String {
    let input = match self {
      Self::List => "proxy_patterns:list",
    };

    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }

  fn description(&self) -> String {
    match self {
      Self::List => "all proxy patterns".to_string(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_hash_is_stable_hex() {
    let list = PatternQueryKey::List.cache_hash();
    assert_eq!(list.len(), 64);
    assert_eq!(list, PatternQueryKey::List.cache_hash());
    assert!(list.chars().all(|c| c.is_ascii_hexdigit()));
  }

  #[test]
  fn test_cache_key_is_id() {
    assert_eq!(ProxyPattern::new(12, "x", true).cache_key(), "12");
  }
}
