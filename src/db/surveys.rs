use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

use crate::db::schema::{NewSurvey, Survey, SurveyPatch, SurveyStatus};
use crate::db::{decode, encode};
use crate::store::{KvStore, Namespace, StoreError};

const ID_LEN: usize = 8;
const ID_ATTEMPTS: usize = 4;

fn generate_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}

pub async fn create<S: KvStore>(store: &S, spec: NewSurvey) -> Result<Survey, StoreError> {
    let mut survey = Survey {
        id: generate_id(),
        title: spec.title,
        questions: spec.questions,
        created_by: spec.created_by,
        status: SurveyStatus::Open,
        response_count: 0,
        settings: spec.settings,
        created_at: Utc::now(),
    };

    // Collisions in the 8-character id space are negligible, but
    // insert-if-absent makes detecting one cheap anyway.
    for _ in 0..ID_ATTEMPTS {
        if store
            .set_if_absent(Namespace::Surveys, &survey.id, encode(&survey))
            .await?
        {
            return Ok(survey);
        }
        survey.id = generate_id();
    }

    Err(StoreError::Contended(survey.id))
}

pub async fn get<S: KvStore>(store: &S, id: &str) -> Result<Option<Survey>, StoreError> {
    match store.get(Namespace::Surveys, id).await? {
        None => Ok(None),
        Some(v) => Ok(Some(decode(id, v)?)),
    }
}

/// Merge `patch` over the stored record. This is a read-modify-write without
/// conflict detection; last write wins, so only advisory fields (status and
/// the count cache) are routed through here.
pub async fn update<S: KvStore>(
    store: &S,
    id: &str,
    patch: SurveyPatch,
) -> Result<Option<Survey>, StoreError> {
    let mut survey = match get(store, id).await? {
        None => return Ok(None),
        Some(v) => v,
    };

    if let Some(status) = patch.status {
        survey.status = status;
    }
    if let Some(count) = patch.response_count {
        survey.response_count = count;
    }

    store.set(Namespace::Surveys, id, encode(&survey)).await?;

    Ok(Some(survey))
}

#[derive(Debug)]
pub enum CloseOutcome {
    Closed(Survey),
    /// Informational no-op; the survey was closed already.
    AlreadyClosed(Survey),
    NotFound,
}

pub async fn close<S: KvStore>(store: &S, id: &str) -> Result<CloseOutcome, StoreError> {
    let survey = match get(store, id).await? {
        None => return Ok(CloseOutcome::NotFound),
        Some(v) => v,
    };

    if !survey.is_open() {
        return Ok(CloseOutcome::AlreadyClosed(survey));
    }

    match update(
        store,
        id,
        SurveyPatch {
            status: Some(SurveyStatus::Closed),
            ..Default::default()
        },
    )
    .await?
    {
        None => Ok(CloseOutcome::NotFound),
        Some(v) => Ok(CloseOutcome::Closed(v)),
    }
}
