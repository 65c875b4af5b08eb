use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::db::schema::{Question, QuestionKind};

static MULTI_SELECT_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\(multi-select\)").unwrap());
static FREE_TEXT_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\(free-text\)").unwrap());
static OPTION_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^q(\d+)\s*:\s*(.+)$").unwrap());

/// Substituted for a multi-select question with no option line, so the
/// question is never unusable.
pub const DEFAULT_OPTIONS: [&str; 3] = ["Option 1", "Option 2", "Option 3"];

/// Turn free-form question text plus an options blob into typed questions.
/// One non-blank line per question; `(multi-select)` and `(free-text)`
/// markers pick the kind and are stripped from the label, anything else is a
/// 1-5 scale question. Pure and total: malformed input degrades, it never
/// fails.
pub fn parse_questions(raw_lines: &str, raw_options: &str) -> Vec<Question> {
    let option_map = parse_option_lines(raw_options);

    raw_lines
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(i, line)| {
            // Option lines address questions by 1-based position.
            let number = i + 1;

            if MULTI_SELECT_MARKER.is_match(line) {
                let label = MULTI_SELECT_MARKER.replace_all(line, "").trim().to_owned();
                let options = option_map.get(&number).cloned().unwrap_or_else(|| {
                    DEFAULT_OPTIONS.iter().map(|s| s.to_string()).collect()
                });
                Question {
                    label,
                    kind: QuestionKind::MultiSelect,
                    options,
                }
            } else if FREE_TEXT_MARKER.is_match(line) {
                Question {
                    label: FREE_TEXT_MARKER.replace_all(line, "").trim().to_owned(),
                    kind: QuestionKind::FreeText,
                    options: Vec::new(),
                }
            } else {
                Question {
                    label: line.to_owned(),
                    kind: QuestionKind::Scale,
                    options: Vec::new(),
                }
            }
        })
        .collect()
}

/// Parse `Q<N>: opt1, opt2, ...` lines into a question-number → options map.
/// Later lines for the same number overwrite earlier ones; lines that don't
/// match the grammar are dropped.
fn parse_option_lines(raw: &str) -> HashMap<usize, Vec<String>> {
    let mut map = HashMap::new();

    for line in raw.lines() {
        let caps = match OPTION_LINE.captures(line.trim()) {
            None => continue,
            Some(v) => v,
        };

        let number: usize = match caps[1].parse() {
            Err(_) => continue,
            Ok(v) => v,
        };

        let options: Vec<String> = caps[2]
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect();

        if options.is_empty() {
            continue;
        }

        map.insert(number, options);
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines_become_scale_questions() {
        let questions = parse_questions("How was the sprint?\n\n  Rate the demo  \n", "");

        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].label, "How was the sprint?");
        assert_eq!(questions[0].kind, QuestionKind::Scale);
        assert!(questions[0].options.is_empty());
        assert_eq!(questions[1].label, "Rate the demo");
    }

    #[test]
    fn markers_pick_kind_and_are_stripped() {
        let questions = parse_questions(
            "Which days suit you? (Multi-Select)\nAnything else? (FREE-TEXT)",
            "Q1: Mon, Tue, Wed",
        );

        assert_eq!(questions[0].kind, QuestionKind::MultiSelect);
        assert_eq!(questions[0].label, "Which days suit you?");
        assert_eq!(questions[0].options, vec!["Mon", "Tue", "Wed"]);

        assert_eq!(questions[1].kind, QuestionKind::FreeText);
        assert_eq!(questions[1].label, "Anything else?");
    }

    #[test]
    fn multi_select_without_options_gets_placeholders() {
        let questions = parse_questions("Pick some (multi-select)", "");

        assert_eq!(questions[0].options, DEFAULT_OPTIONS.to_vec());
    }

    #[test]
    fn option_lines_map_by_position_and_later_lines_win() {
        let questions = parse_questions(
            "First (multi-select)\nSecond (multi-select)",
            "q2: A , B\nQ1: old\nQ1: X, Y, Z",
        );

        assert_eq!(questions[0].options, vec!["X", "Y", "Z"]);
        assert_eq!(questions[1].options, vec!["A", "B"]);
    }

    #[test]
    fn malformed_option_lines_are_ignored() {
        let questions = parse_questions(
            "Pick (multi-select)",
            "not an option line\nQzz: A, B\nQ1 A, B\nQ1: , ,",
        );

        // Every candidate line is dropped, so placeholders apply.
        assert_eq!(questions[0].options, DEFAULT_OPTIONS.to_vec());
    }

    #[test]
    fn parsing_is_deterministic() {
        let raw = "A\nB (multi-select)\nC (free-text)";
        let opts = "Q2: x, y";

        let a = parse_questions(raw, opts);
        let b = parse_questions(raw, opts);

        assert_eq!(serde_json::to_value(&a).unwrap(), serde_json::to_value(&b).unwrap());
    }

    #[test]
    fn empty_input_parses_to_nothing() {
        assert!(parse_questions("", "").is_empty());
        assert!(parse_questions("\n  \n", "Q1: a, b").is_empty());
    }
}
