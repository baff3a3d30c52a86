// src/models/assessment.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::question::PublicQuestion;

/// Assignments and exams share one table; `kind` tells them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentKind {
    Assignment,
    Exam,
}

impl AssessmentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AssessmentKind::Assignment => "assignment",
            AssessmentKind::Exam => "exam",
        }
    }
}

impl TryFrom<String> for AssessmentKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "assignment" => Ok(AssessmentKind::Assignment),
            "exam" => Ok(AssessmentKind::Exam),
            other => Err(format!("unknown assessment kind '{}'", other)),
        }
    }
}

/// Represents the 'assessments' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Assessment {
    pub id: i64,
    pub course_id: i64,
    #[sqlx(try_from = "String")]
    pub kind: AssessmentKind,
    pub title: String,
    /// Time limit for exams, 0 when unlimited.
    pub duration_minutes: i32,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// A question attached to an assessment with its point value.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct AssessmentQuestionInput {
    pub question_id: i64,
    #[validate(range(min = 0.0, max = 1000.0))]
    pub max_score: f64,
}

/// DTO for creating an assignment or exam.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateAssessmentRequest {
    pub kind: AssessmentKind,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    /// Free-form as typed into the form; unparseable values mean "no limit".
    pub duration_minutes: Option<String>,
    #[validate(length(min = 1, max = 200), nested)]
    pub questions: Vec<AssessmentQuestionInput>,
}

/// Student-facing view of an assessment: questions without answer keys.
#[derive(Debug, Serialize)]
pub struct AssessmentPaper {
    #[serde(flatten)]
    pub assessment: Assessment,
    pub questions: Vec<PaperQuestion>,
}

#[derive(Debug, Serialize)]
pub struct PaperQuestion {
    #[serde(flatten)]
    pub question: PublicQuestion,
    pub max_score: f64,
}
