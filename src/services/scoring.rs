// src/services/scoring.rs

//! Grading of submission details against the question answer keys.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::models::{
    question::QuestionType,
    submission::{GradeEntry, SubmissionDetail},
};
use crate::services::options::{NormalizedAnswer, normalize_answer};

/// The authoritative answer for one question.
#[derive(Debug, Clone)]
pub struct AnswerKey {
    pub question_type: QuestionType,
    pub answer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GradeStatus {
    /// Objective question scored from the answer key.
    Auto,
    /// Subjective question without a teacher score yet.
    Pending,
    /// Subjective question scored by a teacher.
    Graded,
    /// No question record and no teacher score yet.
    RequiresManualScore,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradedDetail {
    pub detail_id: i64,
    pub question_id: i64,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub student_answer: Option<String>,
    /// Only set for auto-graded objective questions.
    pub is_correct: Option<bool>,
    pub score: f64,
    pub max_score: f64,
    pub status: GradeStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradingReport {
    pub details: Vec<GradedDetail>,
    pub total_score: f64,
    pub max_total: f64,
    pub correct_count: usize,
    /// Details still waiting for a teacher.
    pub pending_count: usize,
}

impl GradingReport {
    pub fn is_complete(&self) -> bool {
        self.pending_count == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GradingError {
    UnknownDetail(i64),
    ScoreOutOfRange { detail_id: i64, score: f64, max_score: f64 },
}

impl fmt::Display for GradingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GradingError::UnknownDetail(id) => {
                write!(f, "Detail {} does not belong to this submission", id)
            }
            GradingError::ScoreOutOfRange {
                detail_id,
                score,
                max_score,
            } => write!(
                f,
                "Score {} for detail {} must be between 0 and {}",
                score, detail_id, max_score
            ),
        }
    }
}

impl std::error::Error for GradingError {}

/// Correctness of an objective answer. A blank or unparseable answer is
/// never correct, even against a blank key.
pub fn is_answer_correct(question_type: QuestionType, student: Option<&str>, key: &str) -> bool {
    let student = normalize_answer(question_type, student);
    if student == NormalizedAnswer::Empty {
        return false;
    }
    student == normalize_answer(question_type, Some(key))
}

fn grade_detail(detail: &SubmissionDetail, key: Option<&AnswerKey>) -> GradedDetail {
    let manual_score = detail.score.unwrap_or(0.0);

    let (question_type, is_correct, score, status) = match key {
        None => {
            let status = if detail.score.is_some() {
                GradeStatus::Graded
            } else {
                GradeStatus::RequiresManualScore
            };
            (detail.question_type, None, manual_score, status)
        }
        // Objectivity is fixed by the type recorded at submission time, and a
        // stored auto score wins over the current key.
        Some(_) if detail.question_type.is_objective() && detail.score.is_some() => (
            detail.question_type,
            Some(manual_score > 0.0),
            manual_score,
            GradeStatus::Auto,
        ),
        Some(key) if detail.question_type.is_objective() => {
            let correct = is_answer_correct(
                detail.question_type,
                detail.student_answer.as_deref(),
                &key.answer,
            );
            let score = if correct { detail.max_score } else { 0.0 };
            (detail.question_type, Some(correct), score, GradeStatus::Auto)
        }
        Some(_) => {
            let status = if detail.score.is_some() {
                GradeStatus::Graded
            } else {
                GradeStatus::Pending
            };
            (detail.question_type, None, manual_score, status)
        }
    };

    GradedDetail {
        detail_id: detail.detail_id,
        question_id: detail.question_id,
        question_type,
        student_answer: detail.student_answer.clone(),
        is_correct,
        score,
        max_score: detail.max_score,
        status,
    }
}

/// Grades every detail of a submission.
///
/// Objective details are scored all-or-nothing from the key unless a score
/// is already stored for them; subjective ones keep whatever score a teacher
/// entered (0 until then). Once every objective detail has its stored score,
/// `total_score` of the report equals `total_score(details)`.
pub fn grade_details(
    details: &[SubmissionDetail],
    keys: &HashMap<i64, AnswerKey>,
) -> GradingReport {
    let graded: Vec<GradedDetail> = details
        .iter()
        .map(|d| grade_detail(d, keys.get(&d.question_id)))
        .collect();

    let correct_count = graded.iter().filter(|d| d.is_correct == Some(true)).count();
    let pending_count = graded
        .iter()
        .filter(|d| {
            matches!(
                d.status,
                GradeStatus::Pending | GradeStatus::RequiresManualScore
            )
        })
        .count();

    let total_score = graded.iter().map(|d| d.score).sum();
    let max_total = graded.iter().map(|d| d.max_score).sum();

    GradingReport {
        details: graded,
        total_score,
        max_total,
        correct_count,
        pending_count,
    }
}

/// Sum of the current detail scores; ungraded details count as 0.
pub fn total_score(details: &[SubmissionDetail]) -> f64 {
    details.iter().map(|d| d.score.unwrap_or(0.0)).sum()
}

/// Writes teacher scores into the details, keyed by `detail_id`.
///
/// All entries are checked before anything changes, so a rejected batch
/// leaves `details` untouched. Applying the same batch twice yields the same
/// state. Returns the number of entries applied.
pub fn apply_grades(
    details: &mut [SubmissionDetail],
    grades: &[GradeEntry],
) -> Result<usize, GradingError> {
    let index: HashMap<i64, usize> = details
        .iter()
        .enumerate()
        .map(|(i, d)| (d.detail_id, i))
        .collect();

    for grade in grades {
        let Some(&i) = index.get(&grade.detail_id) else {
            return Err(GradingError::UnknownDetail(grade.detail_id));
        };
        let max_score = details[i].max_score;
        if !grade.score.is_finite() || grade.score < 0.0 || grade.score > max_score {
            return Err(GradingError::ScoreOutOfRange {
                detail_id: grade.detail_id,
                score: grade.score,
                max_score,
            });
        }
    }

    for grade in grades {
        if let Some(&i) = index.get(&grade.detail_id) {
            details[i].score = Some(grade.score);
        }
    }

    Ok(grades.len())
}
