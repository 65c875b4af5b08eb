use evlog::meta;
use futures::future::join_all;

use crate::db::schema::Survey;
use crate::db::{decode, encode, surveys, MAX_CAS_ATTEMPTS};
use crate::runtime::get_logger;
use crate::store::{CasOutcome, KvStore, Namespace, StoreError};

fn index_key(user_id: &str) -> String {
    format!("user_{}", user_id)
}

/// Record a survey id in its creator's index. Idempotent; a lost race here
/// would at worst duplicate a list entry, so the blind fallback is fine.
pub async fn add<S: KvStore>(
    store: &S,
    user_id: &str,
    survey_id: &str,
) -> Result<(), StoreError> {
    let key = index_key(user_id);

    for attempt in 0..MAX_CAS_ATTEMPTS {
        let current = store.get(Namespace::Surveys, &key).await?;

        let mut ids: Vec<String> = match &current {
            None => Vec::new(),
            Some(v) => decode(&key, v.clone())?,
        };
        if ids.iter().any(|id| id == survey_id) {
            return Ok(());
        }
        ids.push(survey_id.to_owned());
        let new = encode(&ids);

        match store
            .compare_and_swap(Namespace::Surveys, &key, current.as_ref(), new.clone())
            .await?
        {
            CasOutcome::Written => return Ok(()),
            CasOutcome::Unsupported => {
                store.set(Namespace::Surveys, &key, new).await?;
                return Ok(());
            }
            CasOutcome::Conflict => {
                get_logger().debug("User index add conflicted; rereading.", meta! {
                    "UserID" => user_id,
                    "Attempt" => attempt,
                });
            }
        }
    }

    Err(StoreError::Contended(key))
}

pub async fn list_ids<S: KvStore>(store: &S, user_id: &str) -> Result<Vec<String>, StoreError> {
    let key = index_key(user_id);
    match store.get(Namespace::Surveys, &key).await? {
        None => Ok(Vec::new()),
        Some(v) => decode(&key, v),
    }
}

/// Resolve the user's surveys, newest first. Ids are fetched in parallel;
/// ones that no longer resolve are dropped. Equal timestamps keep their
/// index order (the sort is stable).
pub async fn list_surveys<S: KvStore>(
    store: &S,
    user_id: &str,
) -> Result<Vec<Survey>, StoreError> {
    let ids = list_ids(store, user_id).await?;

    let fetched = join_all(ids.iter().map(|id| surveys::get(store, id))).await;

    let mut result = Vec::with_capacity(ids.len());
    for item in fetched {
        if let Some(survey) = item? {
            result.push(survey);
        }
    }

    result.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(result)
}

#[cfg(test)]
mod tests {
    use crate::db::schema::{NewSurvey, SurveySettings};
    use crate::store::MemoryStore;

    use super::*;

    async fn seed(store: &MemoryStore, title: &str) -> Survey {
        surveys::create(
            store,
            NewSurvey {
                title: title.to_owned(),
                questions: Vec::new(),
                created_by: "U1".to_owned(),
                settings: SurveySettings::default(),
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn add_is_idempotent() {
        let store = MemoryStore::new();

        add(&store, "U1", "abc").await.unwrap();
        add(&store, "U1", "abc").await.unwrap();
        add(&store, "U1", "def").await.unwrap();

        assert_eq!(list_ids(&store, "U1").await.unwrap(), vec!["abc", "def"]);
    }

    #[tokio::test]
    async fn list_surveys_is_newest_first_and_drops_missing() {
        let store = MemoryStore::new();

        let first = seed(&store, "first").await;
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = seed(&store, "second").await;

        add(&store, "U1", &first.id).await.unwrap();
        add(&store, "U1", &second.id).await.unwrap();
        add(&store, "U1", "gone1234").await.unwrap();

        let listed = list_surveys(&store, "U1").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].title, "second");
        assert_eq!(listed[1].title, "first");
    }

    #[tokio::test]
    async fn empty_index_lists_nothing() {
        let store = MemoryStore::new();
        assert!(list_surveys(&store, "U9").await.unwrap().is_empty());
    }
}
