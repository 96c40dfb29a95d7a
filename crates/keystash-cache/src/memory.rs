//! In-process cache backend.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::handler::{CacheHandler, SCALAR_FIELD};
use crate::iter::KeyIterator;
use crate::pattern::GlobPattern;
use crate::CacheResult;

type Record = BTreeMap<String, String>;

/// Cache backed by a map held in process memory.
///
/// Every operation takes one lock over the whole record table, so each call
/// (including wildcard destroys and renames) is atomic with respect to every
/// other call. The lock is never held across an `.await`.
#[derive(Debug, Default)]
pub struct MemoryCache {
    records: Mutex<HashMap<String, Record>>,
}

impl MemoryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Returns `true` if no records are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl CacheHandler for MemoryCache {
    async fn exists(&self, key: &str) -> CacheResult<bool> {
        Ok(self.records.lock().contains_key(key))
    }

    async fn field_exists(&self, key: &str, field: &str) -> CacheResult<bool> {
        Ok(self
            .records
            .lock()
            .get(key)
            .is_some_and(|record| record.contains_key(field)))
    }

    async fn read(&self, key: &str) -> CacheResult<String> {
        self.read_field(key, SCALAR_FIELD).await
    }

    async fn read_field(&self, key: &str, field: &str) -> CacheResult<String> {
        Ok(self
            .records
            .lock()
            .get(key)
            .and_then(|record| record.get(field))
            .cloned()
            .unwrap_or_default())
    }

    async fn write(&self, key: &str, value: &str) -> CacheResult<()> {
        self.write_field(key, SCALAR_FIELD, value).await
    }

    async fn write_field(&self, key: &str, field: &str, value: &str) -> CacheResult<()> {
        self.records
            .lock()
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn write_field_if_absent(
        &self,
        key: &str,
        field: &str,
        value: &str,
    ) -> CacheResult<bool> {
        let mut records = self.records.lock();
        let record = records.entry(key.to_string()).or_default();
        if record.contains_key(field) {
            return Ok(false);
        }
        record.insert(field.to_string(), value.to_string());
        Ok(true)
    }

    async fn destroy(&self, key: &str) -> CacheResult<()> {
        let pattern = GlobPattern::compile(key);
        let mut records = self.records.lock();
        if pattern.is_wildcard() {
            let before = records.len();
            records.retain(|k, _| !pattern.matches(k));
            tracing::debug!(pattern = %pattern, removed = before - records.len(), "wildcard destroy");
        } else {
            records.remove(key);
        }
        Ok(())
    }

    async fn destroy_field(&self, key: &str, field: &str) -> CacheResult<()> {
        if let Some(record) = self.records.lock().get_mut(key) {
            record.remove(field);
        }
        Ok(())
    }

    async fn rename(&self, old_key: &str, new_key: &str) -> CacheResult<bool> {
        let mut records = self.records.lock();
        match records.remove(old_key) {
            Some(record) => {
                records.insert(new_key.to_string(), record);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn keys(&self, pattern: &str) -> CacheResult<KeyIterator> {
        let pattern = GlobPattern::compile(pattern);
        let mut matched: Vec<String> = self
            .records
            .lock()
            .keys()
            .filter(|k| pattern.matches(k))
            .cloned()
            .collect();
        matched.sort_unstable();
        Ok(KeyIterator::new(matched))
    }

    async fn fields(&self, key: &str) -> CacheResult<KeyIterator> {
        let fields: Vec<String> = self
            .records
            .lock()
            .get(key)
            .map(|record| {
                record
                    .keys()
                    .filter(|f| f.as_str() != SCALAR_FIELD)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(KeyIterator::new(fields))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
