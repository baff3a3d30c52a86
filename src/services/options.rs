// src/services/options.rs

//! Normalization of stored question options and of answer strings.
//!
//! Options reach the service in several shapes (a JSON array written by the
//! API, or an encoded string from a spreadsheet import). They are resolved once
//! into a `RawOptions` variant and then into a canonical `Vec<OptionItem>`.
//! Nothing in here fails: malformed input degrades to an empty list or to an
//! `Empty` answer.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::config::MULTI_ANSWER_DELIMITER;
use crate::models::question::{OptionItem, QuestionType};

/// `A. text`, `B) text`, `C、text`, `D：text`
static OPTION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z])\s*[.)、:：．]\s*(.*?)\s*$").expect("option line pattern")
});

/// Options as found at the ingestion boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum RawOptions {
    Structured(Vec<Value>),
    Encoded(String),
    Missing,
}

impl RawOptions {
    pub fn from_value(value: Option<Value>) -> Self {
        match value {
            Some(Value::Array(items)) => RawOptions::Structured(items),
            Some(Value::String(s)) => RawOptions::Encoded(s),
            _ => RawOptions::Missing,
        }
    }
}

/// Answer in comparable form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedAnswer {
    Choice(String),
    Choices(BTreeSet<String>),
    Boolean(bool),
    FreeText(String),
    Empty,
}

/// How a question should be presented to the grading/answering UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "options", rename_all = "snake_case")]
pub enum QuestionView {
    Choices(Vec<OptionItem>),
    FreeText,
}

/// Key for the n-th option when none is given: A, B, ..., Z, then AA, AB...
fn positional_key(index: usize) -> String {
    const COUNT: usize = 26;
    if index < COUNT {
        ((b'A' + index as u8) as char).to_string()
    } else {
        format!("{}{}", positional_key(index / COUNT - 1), positional_key(index % COUNT))
    }
}

fn from_json_items(items: &[Value]) -> Vec<OptionItem> {
    items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| match item {
            Value::String(text) => Some(OptionItem {
                key: positional_key(i),
                text: text.trim().to_string(),
            }),
            Value::Object(map) => {
                let text = map
                    .get("text")
                    .or_else(|| map.get("label"))
                    .or_else(|| map.get("value"))
                    .and_then(Value::as_str)?;
                let key = map
                    .get("key")
                    .and_then(Value::as_str)
                    .map(|k| k.trim().to_uppercase())
                    .filter(|k| !k.is_empty())
                    .unwrap_or_else(|| positional_key(i));
                Some(OptionItem {
                    key,
                    text: text.trim().to_string(),
                })
            }
            _ => None,
        })
        .collect()
}

fn from_encoded(raw: &str) -> Vec<OptionItem> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Array(items)) => return from_json_items(&items),
        Ok(Value::Object(map)) => {
            let mut options: Vec<OptionItem> = map
                .iter()
                .filter_map(|(k, v)| {
                    v.as_str().map(|text| OptionItem {
                        key: k.trim().to_uppercase(),
                        text: text.trim().to_string(),
                    })
                })
                .collect();
            options.sort_by(|a, b| a.key.cmp(&b.key));
            return options;
        }
        Ok(_) => return Vec::new(),
        Err(_) => {}
    }

    // Line-oriented text as typed into a spreadsheet cell.
    let mut options: Vec<OptionItem> = Vec::new();
    for line in trimmed.lines().filter(|l| !l.trim().is_empty()) {
        match OPTION_LINE.captures(line) {
            Some(caps) => options.push(OptionItem {
                key: caps[1].to_uppercase(),
                text: caps[2].to_string(),
            }),
            None => match options.last_mut() {
                // continuation of a wrapped option
                Some(last) => {
                    last.text.push(' ');
                    last.text.push_str(line.trim());
                }
                None => return Vec::new(),
            },
        }
    }
    options
}

/// Canonical ordered option list; empty on malformed input.
pub fn normalize_options(raw: &RawOptions) -> Vec<OptionItem> {
    match raw {
        RawOptions::Structured(items) => from_json_items(items),
        RawOptions::Encoded(s) => from_encoded(s),
        RawOptions::Missing => Vec::new(),
    }
}

/// Splits a multi-select answer into a sorted, de-duplicated set of keys.
pub fn split_answer_keys(raw: &str) -> BTreeSet<String> {
    raw.split([MULTI_ANSWER_DELIMITER, '，'])
        .map(|k| k.trim().to_uppercase())
        .filter(|k| !k.is_empty())
        .collect()
}

fn parse_boolean(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" | "对" | "正确" | "√" => Some(true),
        "false" | "f" | "0" | "no" | "n" | "错" | "错误" | "×" => Some(false),
        _ => None,
    }
}

/// Brings an answer (student's or key) into comparable form for its type.
pub fn normalize_answer(question_type: QuestionType, raw: Option<&str>) -> NormalizedAnswer {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return NormalizedAnswer::Empty;
    };

    match question_type {
        QuestionType::SingleChoice => NormalizedAnswer::Choice(raw.to_uppercase()),
        QuestionType::MultipleChoice => {
            let keys = split_answer_keys(raw);
            if keys.is_empty() {
                NormalizedAnswer::Empty
            } else {
                NormalizedAnswer::Choices(keys)
            }
        }
        QuestionType::TrueFalse => match parse_boolean(raw) {
            Some(b) => NormalizedAnswer::Boolean(b),
            None => NormalizedAnswer::Empty,
        },
        _ => NormalizedAnswer::FreeText(raw.to_string()),
    }
}

/// The string stored as an answer key: sorted keys for multiple choice,
/// `true`/`false` for true/false, trimmed text otherwise.
pub fn canonical_answer(question_type: QuestionType, raw: &str) -> String {
    match normalize_answer(question_type, Some(raw)) {
        NormalizedAnswer::Choice(key) => key,
        NormalizedAnswer::Choices(keys) => {
            let separator = MULTI_ANSWER_DELIMITER.to_string();
            keys.into_iter().collect::<Vec<_>>().join(separator.as_str())
        }
        NormalizedAnswer::Boolean(b) => b.to_string(),
        NormalizedAnswer::FreeText(text) => text,
        NormalizedAnswer::Empty => String::new(),
    }
}

pub fn question_view(question_type: QuestionType, options: &[OptionItem]) -> QuestionView {
    match question_type {
        QuestionType::SingleChoice | QuestionType::MultipleChoice => {
            QuestionView::Choices(options.to_vec())
        }
        QuestionType::TrueFalse => QuestionView::Choices(vec![
            OptionItem {
                key: "true".to_string(),
                text: "True".to_string(),
            },
            OptionItem {
                key: "false".to_string(),
                text: "False".to_string(),
            },
        ]),
        _ => QuestionView::FreeText,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keys(options: &[OptionItem]) -> Vec<&str> {
        options.iter().map(|o| o.key.as_str()).collect()
    }

    #[test]
    fn structured_strings_get_positional_keys() {
        let raw = RawOptions::from_value(Some(json!(["red", "green", "blue"])));
        let options = normalize_options(&raw);
        assert_eq!(keys(&options), vec!["A", "B", "C"]);
        assert_eq!(options[1].text, "green");
    }

    #[test]
    fn structured_objects_keep_their_keys() {
        let raw = RawOptions::from_value(Some(json!([
            {"key": "a", "text": "first"},
            {"key": "B", "text": "second"},
            42
        ])));
        let options = normalize_options(&raw);
        assert_eq!(keys(&options), vec!["A", "B"]);
    }

    #[test]
    fn encoded_json_array_is_decoded() {
        let raw = RawOptions::from_value(Some(json!("[{\"key\":\"A\",\"text\":\"x\"}]")));
        assert_eq!(normalize_options(&raw).len(), 1);
    }

    #[test]
    fn encoded_json_object_is_sorted_by_key() {
        let raw = RawOptions::Encoded("{\"B\":\"two\",\"A\":\"one\"}".to_string());
        let options = normalize_options(&raw);
        assert_eq!(keys(&options), vec!["A", "B"]);
        assert_eq!(options[0].text, "one");
    }

    #[test]
    fn encoded_lines_are_parsed() {
        let raw = RawOptions::Encoded("A. Stack\nB) Heap\nC、Register\n  spilled".to_string());
        let options = normalize_options(&raw);
        assert_eq!(keys(&options), vec!["A", "B", "C"]);
        assert_eq!(options[2].text, "Register spilled");
    }

    #[test]
    fn malformed_input_degrades_to_empty() {
        assert!(normalize_options(&RawOptions::Encoded("not options at all".into())).is_empty());
        assert!(normalize_options(&RawOptions::Encoded("   ".into())).is_empty());
        assert!(normalize_options(&RawOptions::Encoded("{\"A\": 3".into())).is_empty());
        assert!(normalize_options(&RawOptions::from_value(Some(json!(7)))).is_empty());
        assert!(normalize_options(&RawOptions::Missing).is_empty());
    }

    #[test]
    fn answer_keys_are_order_insensitive() {
        assert_eq!(split_answer_keys("B,A"), split_answer_keys("a, b"));
        assert_eq!(split_answer_keys("C，A,,A"), split_answer_keys("A,C"));
    }

    #[test]
    fn normalize_answer_by_type() {
        assert_eq!(
            normalize_answer(QuestionType::SingleChoice, Some(" b ")),
            NormalizedAnswer::Choice("B".into())
        );
        assert_eq!(
            normalize_answer(QuestionType::TrueFalse, Some("对")),
            NormalizedAnswer::Boolean(true)
        );
        assert_eq!(
            normalize_answer(QuestionType::TrueFalse, Some("maybe")),
            NormalizedAnswer::Empty
        );
        assert_eq!(
            normalize_answer(QuestionType::MultipleChoice, Some(",,")),
            NormalizedAnswer::Empty
        );
        assert_eq!(normalize_answer(QuestionType::Essay, None), NormalizedAnswer::Empty);
        assert_eq!(
            normalize_answer(QuestionType::Unknown, Some("whatever")),
            NormalizedAnswer::FreeText("whatever".into())
        );
    }

    #[test]
    fn canonical_answer_sorts_multi_select() {
        assert_eq!(canonical_answer(QuestionType::MultipleChoice, "d, a,c"), "A,C,D");
        assert_eq!(canonical_answer(QuestionType::TrueFalse, "T"), "true");
    }

    #[test]
    fn unknown_type_falls_back_to_free_text_view() {
        let options = vec![OptionItem {
            key: "A".into(),
            text: "x".into(),
        }];
        assert_eq!(question_view(QuestionType::Unknown, &options), QuestionView::FreeText);
        assert_eq!(
            question_view(QuestionType::SingleChoice, &options),
            QuestionView::Choices(options.clone())
        );
    }

    #[test]
    fn positional_keys_roll_over() {
        assert_eq!(positional_key(0), "A");
        assert_eq!(positional_key(25), "Z");
        assert_eq!(positional_key(26), "AA");
    }
}
