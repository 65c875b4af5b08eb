use evlog::meta;
use sha2::{Digest, Sha256};

use crate::db::{decode, encode, MAX_CAS_ATTEMPTS};
use crate::runtime::get_logger;
use crate::store::{CasOutcome, KvStore, Namespace, StoreError};

/// One-way digest recording "this user already responded" without storing
/// identity. Keyed by the salt; membership testing is the only supported
/// operation on the stored set.
pub fn response_digest(salt: &str, survey_id: &str, user_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(survey_id.as_bytes());
    hasher.update(b":");
    hasher.update(user_id.as_bytes());
    hex::encode(hasher.finalize())
}

async fn digests<S: KvStore>(store: &S, survey_id: &str) -> Result<Vec<String>, StoreError> {
    match store.get(Namespace::Tracking, survey_id).await? {
        None => Ok(Vec::new()),
        Some(v) => decode(survey_id, v),
    }
}

pub async fn has_responded<S: KvStore>(
    store: &S,
    salt: &str,
    survey_id: &str,
    user_id: &str,
) -> Result<bool, StoreError> {
    let digest = response_digest(salt, survey_id, user_id);
    Ok(digests(store, survey_id).await?.iter().any(|d| d == &digest))
}

/// Insert the user's digest if absent. Idempotent: a digest already in the
/// set leaves it untouched. Uses the conditional-write retry loop so a
/// concurrent mark for a different user is never lost; on a backend with no
/// conditional primitive the fallback is blind set, and two simultaneous
/// first-time marks from the same user remain a documented best-effort gap.
pub async fn mark_responded<S: KvStore>(
    store: &S,
    salt: &str,
    survey_id: &str,
    user_id: &str,
) -> Result<(), StoreError> {
    let digest = response_digest(salt, survey_id, user_id);

    for attempt in 0..MAX_CAS_ATTEMPTS {
        let current = store.get(Namespace::Tracking, survey_id).await?;

        let mut set: Vec<String> = match &current {
            None => Vec::new(),
            Some(v) => decode(survey_id, v.clone())?,
        };
        if set.contains(&digest) {
            return Ok(());
        }
        set.push(digest.clone());
        let new = encode(&set);

        match store
            .compare_and_swap(Namespace::Tracking, survey_id, current.as_ref(), new.clone())
            .await?
        {
            CasOutcome::Written => return Ok(()),
            CasOutcome::Unsupported => {
                store.set(Namespace::Tracking, survey_id, new).await?;
                return Ok(());
            }
            CasOutcome::Conflict => {
                get_logger().debug("Tracking mark conflicted; rereading.", meta! {
                    "SurveyID" => survey_id,
                    "Attempt" => attempt,
                });
            }
        }
    }

    Err(StoreError::Contended(survey_id.to_owned()))
}

#[cfg(test)]
mod tests {
    use crate::store::MemoryStore;

    use super::*;

    const SALT: &str = "test-salt";

    #[tokio::test]
    async fn mark_then_check() {
        let store = MemoryStore::new();

        assert!(!has_responded(&store, SALT, "srv1", "U42").await.unwrap());

        mark_responded(&store, SALT, "srv1", "U42").await.unwrap();
        assert!(has_responded(&store, SALT, "srv1", "U42").await.unwrap());

        // Same user, different survey: independent.
        assert!(!has_responded(&store, SALT, "srv2", "U42").await.unwrap());
    }

    #[tokio::test]
    async fn second_mark_is_a_noop() {
        let store = MemoryStore::new();

        mark_responded(&store, SALT, "srv1", "U42").await.unwrap();
        mark_responded(&store, SALT, "srv1", "U42").await.unwrap();

        assert_eq!(digests(&store, "srv1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn digest_does_not_leak_identity() {
        let store = MemoryStore::new();
        mark_responded(&store, SALT, "srv1", "U424242").await.unwrap();

        let stored = digests(&store, "srv1").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert!(!stored[0].contains("U424242"));
        assert_eq!(stored[0].len(), 64);
        assert!(stored[0].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn digest_is_stable_and_keyed() {
        let a = response_digest("salt-a", "srv1", "U1");
        assert_eq!(a, response_digest("salt-a", "srv1", "U1"));

        // Different salt, survey, or user each produce a different digest.
        assert_ne!(a, response_digest("salt-b", "srv1", "U1"));
        assert_ne!(a, response_digest("salt-a", "srv2", "U1"));
        assert_ne!(a, response_digest("salt-a", "srv1", "U2"));
    }
}
