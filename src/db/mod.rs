pub mod responses;
pub mod schema;
pub mod surveys;
pub mod tracking;
pub mod user_index;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::store::StoreError;

/// Attempts for conditional-write retry loops. Every conflict implies some
/// other writer committed, so any realistic fan-in terminates well under
/// this bound.
pub(crate) const MAX_CAS_ATTEMPTS: usize = 16;

pub(crate) fn decode<T: DeserializeOwned>(key: &str, value: Value) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|source| StoreError::Corrupt {
        key: key.to_owned(),
        source,
    })
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).expect("model types serialize to JSON")
}
