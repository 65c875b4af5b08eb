pub mod memory;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use memory::MemoryStore;

/// Logical key namespaces; a survey id is a valid key in all three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Surveys,
    Responses,
    Tracking,
}

impl Namespace {
    pub fn prefix(&self) -> &'static str {
        match self {
            Namespace::Surveys => "surveys",
            Namespace::Responses => "responses",
            Namespace::Tracking => "tracking",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("stored value under '{key}' could not be decoded: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("conditional write on '{0}' kept conflicting after retries")]
    Contended(String),
}

/// Result of a conditional write attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    Written,
    Conflict,
    /// The backend has no conditional primitive; callers fall back to a
    /// blind last-write-wins set.
    Unsupported,
}

/// The only contract the durable backend is assumed to offer: independent
/// get/set on opaque keys, last-write-wins per key, no cross-key atomicity.
/// The conditional operations are optional refinements a backend may provide.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, ns: Namespace, key: &str) -> Result<Option<Value>, StoreError>;

    async fn set(&self, ns: Namespace, key: &str, value: Value) -> Result<(), StoreError>;

    /// Write only if the key is currently absent. Returns false when the key
    /// already held a value. The default is get-then-set and therefore racy;
    /// backends with an atomic primitive should override it.
    async fn set_if_absent(
        &self,
        ns: Namespace,
        key: &str,
        value: Value,
    ) -> Result<bool, StoreError> {
        match self.get(ns, key).await? {
            Some(_) => Ok(false),
            None => {
                self.set(ns, key, value).await?;
                Ok(true)
            }
        }
    }

    /// Replace the value under `key` only if it currently equals `expected`
    /// (`None` meaning absent). Backends without a conditional primitive
    /// return `Unsupported`.
    async fn compare_and_swap(
        &self,
        _ns: Namespace,
        _key: &str,
        _expected: Option<&Value>,
        _new: Value,
    ) -> Result<CasOutcome, StoreError> {
        Ok(CasOutcome::Unsupported)
    }
}
