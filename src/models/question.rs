// src/models/question.rs

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::Validate;

use crate::services::options::{QuestionView, RawOptions, normalize_options, question_view};

/// Kind of a question in the bank.
///
/// Stored as snake_case text in the `questions.type` column. Anything the
/// service does not recognise becomes `Unknown` and is graded as free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    TrueFalse,
    FillBlank,
    Essay,
    Programming,
    #[serde(other)]
    Unknown,
}

impl QuestionType {
    /// Objective types are graded mechanically against the answer key.
    pub fn is_objective(self) -> bool {
        matches!(
            self,
            QuestionType::SingleChoice | QuestionType::MultipleChoice | QuestionType::TrueFalse
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "single_choice",
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::TrueFalse => "true_false",
            QuestionType::FillBlank => "fill_blank",
            QuestionType::Essay => "essay",
            QuestionType::Programming => "programming",
            QuestionType::Unknown => "unknown",
        }
    }

    /// Lenient parse used for stored values and spreadsheet imports.
    /// Accepts the canonical names, a few short aliases and the Chinese
    /// labels teachers use in their question-bank sheets.
    pub fn parse_lenient(raw: &str) -> Self {
        let normalized = raw.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "single_choice" | "single" | "单选" | "单选题" => QuestionType::SingleChoice,
            "multiple_choice" | "multiple" | "multi" | "多选" | "多选题" => {
                QuestionType::MultipleChoice
            }
            "true_false" | "judge" | "boolean" | "判断" | "判断题" => QuestionType::TrueFalse,
            "fill_blank" | "blank" | "填空" | "填空题" => QuestionType::FillBlank,
            "essay" | "short_answer" | "简答" | "简答题" | "问答题" => QuestionType::Essay,
            "programming" | "code" | "编程" | "编程题" => QuestionType::Programming,
            _ => QuestionType::Unknown,
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One selectable option of a choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionItem {
    pub key: String,
    pub text: String,
}

/// Represents a row of the 'questions' table.
///
/// `options` is whatever the column holds: a JSON array for questions created
/// through the API, but possibly a raw encoded string for imported ones. It is
/// resolved through `services::options` before anything reads it.
#[derive(Debug, Clone, FromRow)]
pub struct QuestionRow {
    pub id: i64,
    pub course_id: Option<i64>,
    #[sqlx(rename = "type")]
    pub question_type: String,
    pub content: String,
    pub options: Option<serde_json::Value>,
    pub answer: String,
    pub difficulty: i32,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// A question with its type and options resolved.
#[derive(Debug, Clone, Serialize)]
pub struct Question {
    pub id: i64,
    pub course_id: Option<i64>,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub content: String,
    pub options: Vec<OptionItem>,
    pub answer: String,
    pub difficulty: i32,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<QuestionRow> for Question {
    fn from(row: QuestionRow) -> Self {
        let question_type = QuestionType::parse_lenient(&row.question_type);
        let options = normalize_options(&RawOptions::from_value(row.options));
        Self {
            id: row.id,
            course_id: row.course_id,
            question_type,
            content: row.content,
            options,
            answer: row.answer,
            difficulty: row.difficulty,
            created_at: row.created_at,
        }
    }
}

/// DTO for sending a question to students (excludes the answer key).
///
/// `view` tells the client whether to render selectable options or a text box.
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub content: String,
    pub view: QuestionView,
}

impl From<Question> for PublicQuestion {
    fn from(q: Question) -> Self {
        Self {
            id: q.id,
            question_type: q.question_type,
            content: q.content,
            view: question_view(q.question_type, &q.options),
        }
    }
}

/// DTO for creating a new question.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    pub course_id: Option<i64>,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[validate(length(min = 1, max = 5000))]
    pub content: String,
    #[serde(default)]
    #[validate(custom(function = validate_options))]
    pub options: Vec<OptionItem>,
    #[validate(length(max = 5000))]
    pub answer: String,
    #[validate(range(min = 0, max = 5))]
    #[serde(default)]
    pub difficulty: i32,
}

/// DTO for updating a question. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    #[serde(rename = "type")]
    pub question_type: Option<QuestionType>,
    #[validate(length(min = 1, max = 5000))]
    pub content: Option<String>,
    #[validate(custom(function = validate_options))]
    pub options: Option<Vec<OptionItem>>,
    #[validate(length(max = 5000))]
    pub answer: Option<String>,
    #[validate(range(min = 0, max = 5))]
    pub difficulty: Option<i32>,
}

/// Query parameters for listing the question bank.
#[derive(Debug, Deserialize)]
pub struct QuestionListParams {
    #[serde(rename = "type")]
    pub question_type: Option<QuestionType>,
    pub course_id: Option<i64>,
    /// Keyword matched against the question content.
    pub q: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// One row of a question-bank spreadsheet, already read from the file by the
/// client. Every cell arrives as text.
#[derive(Debug, Serialize, Deserialize)]
pub struct ImportQuestionRow {
    #[serde(rename = "type")]
    pub question_type: String,
    pub content: String,
    pub options: Option<String>,
    pub answer: Option<String>,
    pub difficulty: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ImportQuestionsRequest {
    pub course_id: Option<i64>,
    #[validate(length(min = 1, max = 1000))]
    pub rows: Vec<ImportQuestionRow>,
}

/// Why an imported row was not stored. `row` is 1-based.
#[derive(Debug, Serialize)]
pub struct SkippedRow {
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub ids: Vec<i64>,
    pub skipped: Vec<SkippedRow>,
}

fn validate_options(options: &[OptionItem]) -> Result<(), validator::ValidationError> {
    for opt in options {
        if opt.key.trim().is_empty() {
            return Err(validator::ValidationError::new("option_key_empty"));
        }
        if opt.text.len() > 1000 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_lenient_accepts_aliases() {
        assert_eq!(QuestionType::parse_lenient("single_choice"), QuestionType::SingleChoice);
        assert_eq!(QuestionType::parse_lenient(" Multiple-Choice "), QuestionType::MultipleChoice);
        assert_eq!(QuestionType::parse_lenient("判断题"), QuestionType::TrueFalse);
        assert_eq!(QuestionType::parse_lenient("编程"), QuestionType::Programming);
        assert_eq!(QuestionType::parse_lenient("matching"), QuestionType::Unknown);
    }

    #[test]
    fn unknown_type_deserializes_to_unknown() {
        let t: QuestionType = serde_json::from_str("\"matching\"").unwrap();
        assert_eq!(t, QuestionType::Unknown);
        assert!(!t.is_objective());
    }

    #[test]
    fn public_question_hides_answer() {
        let question = Question {
            id: 1,
            course_id: None,
            question_type: QuestionType::TrueFalse,
            content: "The earth is round.".to_string(),
            options: vec![],
            answer: "true".to_string(),
            difficulty: 1,
            created_at: None,
        };
        let json = serde_json::to_value(PublicQuestion::from(question)).unwrap();
        assert!(json.get("answer").is_none());
        assert_eq!(json["view"]["kind"], "choices");
        assert_eq!(json["view"]["options"][0]["key"], "true");
    }

    #[test]
    fn import_request_needs_rows() {
        let empty: ImportQuestionsRequest =
            serde_json::from_value(serde_json::json!({"rows": []})).unwrap();
        assert!(empty.validate().is_err());

        let one: ImportQuestionsRequest = serde_json::from_value(serde_json::json!({
            "course_id": 3,
            "rows": [{"type": "essay", "content": "Explain."}]
        }))
        .unwrap();
        assert!(one.validate().is_ok());
    }

    #[test]
    fn objective_types() {
        assert!(QuestionType::SingleChoice.is_objective());
        assert!(QuestionType::TrueFalse.is_objective());
        assert!(!QuestionType::FillBlank.is_objective());
        assert!(!QuestionType::Essay.is_objective());
    }
}
