// src/models/submission.rs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::{assessment::AssessmentKind, question::QuestionType};

/// One answered question inside a submission.
///
/// Created with the submission; afterwards only `score` changes, and only
/// through grading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionDetail {
    pub detail_id: i64,
    pub question_id: i64,
    pub student_answer: Option<String>,
    /// `None` until graded.
    pub score: Option<f64>,
    pub max_score: f64,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
}

/// Row shape of `submission_details` joined with `detail_grades`.
#[derive(Debug, FromRow)]
pub struct SubmissionDetailRow {
    pub id: i64,
    pub question_id: i64,
    pub question_type: String,
    pub student_answer: Option<String>,
    pub max_score: f64,
    pub score: Option<f64>,
}

impl From<SubmissionDetailRow> for SubmissionDetail {
    fn from(row: SubmissionDetailRow) -> Self {
        Self {
            detail_id: row.id,
            question_id: row.question_id,
            student_answer: row.student_answer,
            score: row.score,
            max_score: row.max_score,
            question_type: QuestionType::parse_lenient(&row.question_type),
        }
    }
}

/// Represents the 'submissions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Submission {
    pub id: i64,
    pub student_id: i64,
    pub assessment_id: i64,
    #[sqlx(try_from = "String")]
    pub assessment_kind: AssessmentKind,
    /// 'submitted' until a teacher finalizes the grades, then 'graded'.
    pub status: String,
    /// Cached sum of detail scores, refreshed on every grade write.
    pub total_score: f64,
    pub submitted_at: Option<chrono::DateTime<chrono::Utc>>,
    pub graded_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for a student handing in an assignment or exam.
#[derive(Debug, Deserialize)]
pub struct SubmitAnswersRequest {
    /// User's answers map.
    /// Key: Question ID (i64)
    /// Value: the raw answer text ("A", "A,C", "true", free text...)
    pub answers: HashMap<i64, String>,
}

/// A teacher-entered score for one detail.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct GradeEntry {
    pub detail_id: i64,
    #[validate(range(min = 0.0))]
    pub score: f64,
}

/// DTO for persisting grades.
#[derive(Debug, Deserialize, Validate)]
pub struct GradeSubmissionRequest {
    #[validate(nested)]
    pub grades: Vec<GradeEntry>,
    /// Marks the submission as graded once the scores are stored.
    #[serde(default)]
    pub finalize: bool,
}

/// Listing row for the teacher's submissions table.
#[derive(Debug, Serialize, FromRow)]
pub struct SubmissionSummary {
    pub id: i64,
    pub student_id: i64,
    pub status: String,
    pub total_score: f64,
    pub submitted_at: Option<chrono::DateTime<chrono::Utc>>,
}
