use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Survey {
    pub id: String,
    pub title: String,
    pub questions: Vec<Question>,
    pub created_by: String,
    pub status: SurveyStatus,
    /// Denormalized cache of the response list's length. Advisory only; the
    /// response list is authoritative and this field is resynchronized from
    /// it lazily on read.
    pub response_count: u32,
    pub settings: SurveySettings,
    pub created_at: DateTime<Utc>,
}

impl Survey {
    pub fn is_open(&self) -> bool {
        self.status == SurveyStatus::Open
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurveyStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SurveySettings {
    /// Show aggregate results to a respondent right after they submit.
    pub show_results_after_submit: bool,
    /// Allow verbatim free-text answers in non-admin views. Never applies to
    /// public-share renderings.
    pub share_freetext: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub label: String,
    pub kind: QuestionKind,
    /// Populated for multi-select questions only; empty otherwise.
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Scale,
    MultiSelect,
    FreeText,
}

/// One respondent's complete answer set, keyed by 0-based question index.
/// Deliberately carries nothing that identifies the submitter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Response {
    pub answers: BTreeMap<usize, Answer>,
}

impl Response {
    pub fn answer(&self, index: usize) -> Option<&Answer> {
        self.answers.get(&index)
    }
}

/// Answer values are shaped by the owning question's kind; the survey's
/// question list is the schema used to resolve them at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Scale(i64),
    Selections(Vec<String>),
    Text(String),
}

/// Creation request; everything else on Survey is generated.
#[derive(Debug, Clone)]
pub struct NewSurvey {
    pub title: String,
    pub questions: Vec<Question>,
    pub created_by: String,
    pub settings: SurveySettings,
}

/// Partial update merged over the stored record. Only status and the count
/// cache mutate after creation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SurveyPatch {
    pub status: Option<SurveyStatus>,
    pub response_count: Option<u32>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn answer_shapes_deserialize_by_kind() {
        let raw = json!({"0": 4, "1": ["A", "C"], "2": "works fine"});
        let response: Response = serde_json::from_value(raw).unwrap();

        assert_eq!(response.answer(0), Some(&Answer::Scale(4)));
        assert_eq!(
            response.answer(1),
            Some(&Answer::Selections(vec!["A".to_owned(), "C".to_owned()]))
        );
        assert_eq!(response.answer(2), Some(&Answer::Text("works fine".to_owned())));
        assert_eq!(response.answer(3), None);
    }

    #[test]
    fn survey_status_serializes_lowercase() {
        assert_eq!(serde_json::to_value(SurveyStatus::Open).unwrap(), json!("open"));
        assert_eq!(serde_json::to_value(SurveyStatus::Closed).unwrap(), json!("closed"));
    }
}
