use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;

use crate::store::{CasOutcome, KvStore, Namespace, StoreError};

/// In-memory backend. Each key maps to a JSON value; the DashMap entry API
/// holds the shard lock across read-compare-write, so the conditional
/// operations are genuinely atomic here.
#[derive(Default)]
pub struct MemoryStore {
    data: DashMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn full_key(ns: Namespace, key: &str) -> String {
        format!("{}/{}", ns.prefix(), key)
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, ns: Namespace, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.data.get(&Self::full_key(ns, key)).map(|v| v.value().clone()))
    }

    async fn set(&self, ns: Namespace, key: &str, value: Value) -> Result<(), StoreError> {
        self.data.insert(Self::full_key(ns, key), value);
        Ok(())
    }

    async fn set_if_absent(
        &self,
        ns: Namespace,
        key: &str,
        value: Value,
    ) -> Result<bool, StoreError> {
        match self.data.entry(Self::full_key(ns, key)) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(e) => {
                e.insert(value);
                Ok(true)
            }
        }
    }

    async fn compare_and_swap(
        &self,
        ns: Namespace,
        key: &str,
        expected: Option<&Value>,
        new: Value,
    ) -> Result<CasOutcome, StoreError> {
        match self.data.entry(Self::full_key(ns, key)) {
            Entry::Occupied(mut e) => match expected {
                Some(want) if e.get() == want => {
                    e.insert(new);
                    Ok(CasOutcome::Written)
                }
                _ => Ok(CasOutcome::Conflict),
            },
            Entry::Vacant(e) => match expected {
                None => {
                    e.insert(new);
                    Ok(CasOutcome::Written)
                }
                Some(_) => Ok(CasOutcome::Conflict),
            },
        }
    }
}
