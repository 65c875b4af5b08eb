use std::collections::HashMap;

use itertools::Itertools;
use serde::Serialize;

use crate::db::schema::{Answer, QuestionKind, Response, Survey};

const BAR_FILLED: char = '█';
const BAR_EMPTY: char = '░';
const SCALE_BAR_SEGMENTS: usize = 5;
const OPTION_BAR_SEGMENTS: usize = 10;

/// Who the rendering is for. `is_share` marks a public-channel rendering;
/// verbatim free text is never emitted there, whatever the survey settings
/// say.
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewerContext {
    pub is_admin: bool,
    pub is_share: bool,
}

#[derive(Debug, Serialize)]
pub struct SurveyResults {
    pub survey_id: String,
    pub title: String,
    pub response_count: u32,
    pub questions: Vec<QuestionResults>,
}

#[derive(Debug, Serialize)]
pub struct QuestionResults {
    pub label: String,
    pub stats: QuestionStats,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuestionStats {
    Scale {
        /// Arithmetic mean over answered values, rounded to one decimal.
        mean: f64,
        answered: u32,
        /// Frequency of the exact values 1 through 5.
        buckets: [u32; 5],
        bar: String,
    },
    MultiSelect {
        respondents: u32,
        options: Vec<OptionCount>,
    },
    FreeText {
        count: u32,
        /// None when the viewer only gets the count.
        entries: Option<Vec<String>>,
    },
}

#[derive(Debug, Serialize)]
pub struct OptionCount {
    pub label: String,
    pub count: u32,
    /// Share of respondents (not of selections) who picked this option.
    pub percent: u32,
    pub bar: String,
}

/// Aggregate a survey's responses into per-question statistics. Pure and
/// deterministic given the inputs.
pub fn build_results_data(
    survey: &Survey,
    responses: &[Response],
    viewer: ViewerContext,
) -> SurveyResults {
    let questions = survey
        .questions
        .iter()
        .enumerate()
        .map(|(index, question)| {
            let stats = match question.kind {
                QuestionKind::Scale => scale_stats(index, responses),
                QuestionKind::MultiSelect => multi_select_stats(index, responses),
                QuestionKind::FreeText => free_text_stats(index, responses, survey, viewer),
            };
            QuestionResults {
                label: question.label.clone(),
                stats,
            }
        })
        .collect();

    SurveyResults {
        survey_id: survey.id.clone(),
        title: survey.title.clone(),
        response_count: responses.len() as u32,
        questions,
    }
}

fn scale_stats(index: usize, responses: &[Response]) -> QuestionStats {
    // Zero cannot be a legitimate rating on the 1-5 scale, so it is filtered
    // as "unanswered" along with missing and non-numeric values.
    let values: Vec<i64> = responses
        .iter()
        .filter_map(|r| match r.answer(index) {
            Some(Answer::Scale(v)) if *v != 0 => Some(*v),
            _ => None,
        })
        .collect();

    let mean = if values.is_empty() {
        0.0
    } else {
        round1(values.iter().sum::<i64>() as f64 / values.len() as f64)
    };

    let mut buckets = [0u32; 5];
    for v in &values {
        if (1..=5).contains(v) {
            buckets[(*v - 1) as usize] += 1;
        }
    }

    QuestionStats::Scale {
        mean,
        answered: values.len() as u32,
        buckets,
        bar: segment_bar(mean.round() as usize, SCALE_BAR_SEGMENTS),
    }
}

fn multi_select_stats(index: usize, responses: &[Response]) -> QuestionStats {
    let respondents = responses.len() as u32;

    // First-seen order is kept so equal counts sort stably.
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, u32> = HashMap::new();

    for response in responses {
        if let Some(Answer::Selections(selected)) = response.answer(index) {
            for option in selected {
                if !counts.contains_key(option) {
                    order.push(option.clone());
                }
                *counts.entry(option.clone()).or_insert(0) += 1;
            }
        }
    }

    let options = order
        .into_iter()
        .map(|label| {
            let count = counts[&label];
            let percent = if respondents == 0 {
                0
            } else {
                ((count as f64 / respondents as f64) * 100.0).round() as u32
            };
            OptionCount {
                label,
                count,
                percent,
                bar: segment_bar(
                    ((percent as f64) / 10.0).round() as usize,
                    OPTION_BAR_SEGMENTS,
                ),
            }
        })
        .sorted_by_key(|oc| std::cmp::Reverse(oc.count))
        .collect();

    QuestionStats::MultiSelect {
        respondents,
        options,
    }
}

fn free_text_stats(
    index: usize,
    responses: &[Response],
    survey: &Survey,
    viewer: ViewerContext,
) -> QuestionStats {
    let entries: Vec<String> = responses
        .iter()
        .filter_map(|r| match r.answer(index) {
            Some(Answer::Text(t)) if !t.trim().is_empty() => Some(t.clone()),
            _ => None,
        })
        .collect();

    // Privacy floor: a public-share rendering only ever gets a count.
    let verbatim = !viewer.is_share && (viewer.is_admin || survey.settings.share_freetext);

    QuestionStats::FreeText {
        count: entries.len() as u32,
        entries: if verbatim { Some(entries) } else { None },
    }
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn segment_bar(filled: usize, total: usize) -> String {
    let filled = filled.min(total);
    let mut bar = String::with_capacity(total * BAR_FILLED.len_utf8());
    for _ in 0..filled {
        bar.push(BAR_FILLED);
    }
    for _ in filled..total {
        bar.push(BAR_EMPTY);
    }
    bar
}

/// Render the survey's responses as CSV: one column per question in order,
/// one row per response. List answers are joined with ", " and always
/// quoted; any field containing a comma or double-quote is quoted with
/// internal quotes doubled; skipped answers are empty fields. Rows are
/// joined with `\n`, no trailing newline. Downstream spreadsheet tooling
/// depends on this exact shape.
pub fn build_csv_export(survey: &Survey, responses: &[Response]) -> String {
    let mut rows = Vec::with_capacity(responses.len() + 1);

    rows.push(
        survey
            .questions
            .iter()
            .map(|q| csv_field(&q.label, false))
            .join(","),
    );

    for response in responses {
        let row = (0..survey.questions.len())
            .map(|index| match response.answer(index) {
                None => String::new(),
                Some(Answer::Scale(v)) => v.to_string(),
                Some(Answer::Text(t)) => csv_field(t, false),
                Some(Answer::Selections(selected)) => csv_field(&selected.join(", "), true),
            })
            .join(",");
        rows.push(row);
    }

    rows.join("\n")
}

fn csv_field(value: &str, force_quote: bool) -> String {
    if force_quote || value.contains(',') || value.contains('"') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_owned()
    }
}
