//! Mapping cache abstraction
//!
//! Per-user store of confirmed column mappings keyed by preview signature.
//! The detector receives a cache as an explicit dependency; the database is
//! the persistent implementation and `InMemoryMappingCache` serves tests and
//! one-shot runs.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{Error, Result};
use crate::models::{ColumnMapping, Signature};

/// Store of confirmed mappings keyed by `(user_id, signature)`
pub trait MappingCache: Send + Sync {
    /// Look up a mapping; `Ok(None)` on a miss
    fn get(&self, user_id: i64, signature: &Signature) -> Result<Option<ColumnMapping>>;

    /// Insert or overwrite a mapping (last writer wins)
    fn upsert(&self, user_id: i64, signature: &Signature, mapping: &ColumnMapping) -> Result<()>;
}

/// Process-local mapping cache
#[derive(Debug, Default)]
pub struct InMemoryMappingCache {
    entries: RwLock<HashMap<(i64, Signature), ColumnMapping>>,
}

impl InMemoryMappingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> Error {
    Error::InvalidData("Mapping cache lock poisoned".into())
}

impl MappingCache for InMemoryMappingCache {
    fn get(&self, user_id: i64, signature: &Signature) -> Result<Option<ColumnMapping>> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.get(&(user_id, signature.clone())).cloned())
    }

    fn upsert(&self, user_id: i64, signature: &Signature, mapping: &ColumnMapping) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.insert((user_id, signature.clone()), mapping.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let cache = InMemoryMappingCache::new();
        let sig = Signature::new("abc");
        let mapping = ColumnMapping::new(2, "Net Amt", "Bill No");

        assert_eq!(cache.get(1, &sig).unwrap(), None);
        cache.upsert(1, &sig, &mapping).unwrap();
        assert_eq!(cache.get(1, &sig).unwrap(), Some(mapping));
    }

    #[test]
    fn test_scoped_per_user() {
        let cache = InMemoryMappingCache::new();
        let sig = Signature::new("abc");
        cache
            .upsert(1, &sig, &ColumnMapping::new(0, "Amount", "Bill"))
            .unwrap();
        assert_eq!(cache.get(2, &sig).unwrap(), None);
    }

    #[test]
    fn test_last_writer_wins() {
        let cache = InMemoryMappingCache::new();
        let sig = Signature::new("abc");
        cache
            .upsert(1, &sig, &ColumnMapping::new(0, "Amount", "Bill"))
            .unwrap();
        cache
            .upsert(1, &sig, &ColumnMapping::new(1, "Sales", "Invoice"))
            .unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.get(1, &sig).unwrap(),
            Some(ColumnMapping::new(1, "Sales", "Invoice"))
        );
    }
}
