use evlog::meta;

use crate::config::Config;
use crate::db::schema::{NewSurvey, Question, Response, Survey, SurveyPatch};
use crate::db::surveys::CloseOutcome;
use crate::db::{responses, surveys, tracking, user_index};
use crate::error::{CoreError, CoreResult};
use crate::parser;
use crate::results::{self, SurveyResults, ViewerContext};
use crate::runtime::get_logger;
use crate::store::KvStore;

/// The contract the core exposes to the messaging boundary. The boundary
/// parses commands and renders output; everything here speaks plain model
/// types.
pub struct SurveyService<S> {
    store: S,
    config: Config,
}

pub fn ensure_creator(survey: &Survey, user_id: &str) -> CoreResult<()> {
    if survey.created_by != user_id {
        return Err(CoreError::Forbidden);
    }
    Ok(())
}

impl<S: KvStore> SurveyService<S> {
    pub fn new(store: S, config: Config) -> Self {
        Self { store, config }
    }

    pub fn parse_questions(&self, raw_lines: &str, raw_options: &str) -> Vec<Question> {
        parser::parse_questions(raw_lines, raw_options)
    }

    pub async fn create_survey(&self, spec: NewSurvey) -> CoreResult<Survey> {
        let survey = surveys::create(&self.store, spec).await?;
        user_index::add(&self.store, &survey.created_by, &survey.id).await?;

        get_logger().info("Survey created.", meta! {
            "SurveyID" => survey.id,
            "Questions" => survey.questions.len(),
        });

        Ok(survey)
    }

    pub async fn get_survey(&self, id: &str) -> CoreResult<Option<Survey>> {
        Ok(surveys::get(&self.store, id).await?)
    }

    pub async fn update_survey(&self, id: &str, patch: SurveyPatch) -> CoreResult<Option<Survey>> {
        Ok(surveys::update(&self.store, id, patch).await?)
    }

    /// Creator-only. Closing an already-closed survey is an informational
    /// no-op, not a failure.
    pub async fn close_survey(&self, id: &str, requested_by: &str) -> CoreResult<CloseOutcome> {
        let survey = match surveys::get(&self.store, id).await? {
            None => return Ok(CloseOutcome::NotFound),
            Some(v) => v,
        };
        ensure_creator(&survey, requested_by)?;

        let outcome = surveys::close(&self.store, id).await?;

        if let CloseOutcome::Closed(_) = &outcome {
            get_logger().info("Survey closed.", meta! { "SurveyID" => id });
        }

        Ok(outcome)
    }

    /// The full submission flow: dedup check, ledger append, dedup mark.
    /// Rejects before writing anything when the user already responded or
    /// the survey is closed or missing.
    pub async fn submit_response(
        &self,
        survey_id: &str,
        user_id: &str,
        response: Response,
    ) -> CoreResult<u32> {
        let survey = match surveys::get(&self.store, survey_id).await? {
            None => return Err(CoreError::NotFound),
            Some(v) => v,
        };
        if !survey.is_open() {
            return Err(CoreError::AlreadyClosed);
        }

        if self.has_user_responded(survey_id, user_id).await? {
            return Err(CoreError::AlreadyResponded);
        }

        let count = responses::append(&self.store, survey_id, response).await?;
        self.mark_user_responded(survey_id, user_id).await?;

        get_logger().info("Response recorded.", meta! {
            "SurveyID" => survey_id,
            "Count" => count,
        });

        Ok(count)
    }

    /// Ledger primitive; the dedup check is the caller's responsibility.
    /// Prefer `submit_response`.
    pub async fn add_response(&self, survey_id: &str, response: Response) -> CoreResult<u32> {
        Ok(responses::append(&self.store, survey_id, response).await?)
    }

    pub async fn get_responses(&self, survey_id: &str) -> CoreResult<Vec<Response>> {
        Ok(responses::list(&self.store, survey_id).await?)
    }

    pub async fn has_user_responded(&self, survey_id: &str, user_id: &str) -> CoreResult<bool> {
        Ok(tracking::has_responded(&self.store, &self.config.digest_salt, survey_id, user_id).await?)
    }

    pub async fn mark_user_responded(&self, survey_id: &str, user_id: &str) -> CoreResult<()> {
        Ok(tracking::mark_responded(&self.store, &self.config.digest_salt, survey_id, user_id).await?)
    }

    pub async fn add_survey_to_user_index(&self, user_id: &str, survey_id: &str) -> CoreResult<()> {
        Ok(user_index::add(&self.store, user_id, survey_id).await?)
    }

    /// The user's own surveys, newest first.
    pub async fn get_user_surveys(&self, user_id: &str) -> CoreResult<Vec<Survey>> {
        Ok(user_index::list_surveys(&self.store, user_id).await?)
    }

    /// Survey plus its responses, with the count cache resynchronized from
    /// the ledger when it has drifted.
    pub async fn get_survey_with_responses(
        &self,
        id: &str,
    ) -> CoreResult<Option<(Survey, Vec<Response>)>> {
        let mut survey = match surveys::get(&self.store, id).await? {
            None => return Ok(None),
            Some(v) => v,
        };

        let records = responses::list(&self.store, id).await?;
        let actual = records.len() as u32;

        if survey.response_count != actual {
            get_logger().debug("Response count cache drifted; resyncing.", meta! {
                "SurveyID" => id,
                "Cached" => survey.response_count,
                "Actual" => actual,
            });
            if let Some(fixed) = responses::sync_response_count(&self.store, id).await? {
                survey = fixed;
            }
        }

        Ok(Some((survey, records)))
    }

    pub async fn build_results(&self, id: &str, viewer: ViewerContext) -> CoreResult<SurveyResults> {
        let (survey, records) = self
            .get_survey_with_responses(id)
            .await?
            .ok_or(CoreError::NotFound)?;

        Ok(results::build_results_data(&survey, &records, viewer))
    }

    /// Creator-only CSV export of the raw (still anonymous) response rows.
    pub async fn export_csv(&self, id: &str, requested_by: &str) -> CoreResult<String> {
        let (survey, records) = self
            .get_survey_with_responses(id)
            .await?
            .ok_or(CoreError::NotFound)?;
        ensure_creator(&survey, requested_by)?;

        get_logger().info("CSV export built.", meta! {
            "SurveyID" => id,
            "Rows" => records.len(),
        });

        Ok(results::build_csv_export(&survey, &records))
    }
}
