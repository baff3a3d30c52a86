// src/handlers/submissions.rs

use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::{
        assessments::{fetch_assessment, fetch_assessment_questions},
        questions::fetch_questions_by_ids,
    },
    models::{
        question::{Question, QuestionType},
        submission::{
            GradeSubmissionRequest, SubmissionDetail, SubmissionDetailRow, Submission,
            SubmissionSummary, SubmitAnswersRequest,
        },
    },
    services::scoring::{AnswerKey, GradeStatus, GradingReport, apply_grades, grade_details, total_score},
    utils::jwt::Claims,
};

/// Grading view of one submission.
#[derive(Debug, Serialize)]
pub struct SubmissionView {
    pub submission: Submission,
    #[serde(flatten)]
    pub report: GradingReport,
}

fn answer_keys(questions: HashMap<i64, Question>) -> HashMap<i64, AnswerKey> {
    questions
        .into_iter()
        .map(|(id, q)| {
            (
                id,
                AnswerKey {
                    question_type: q.question_type,
                    answer: q.answer,
                },
            )
        })
        .collect()
}

async fn fetch_submission(pool: &PgPool, id: i64) -> Result<Submission, AppError> {
    sqlx::query_as::<_, Submission>(
        r#"
        SELECT s.id, s.student_id, s.assessment_id, a.kind AS assessment_kind,
               s.status, s.total_score, s.submitted_at, s.graded_at
        FROM submissions s
        JOIN assessments a ON s.assessment_id = a.id
        WHERE s.id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Submission not found".to_string()))
}

async fn fetch_details(pool: &PgPool, submission_id: i64) -> Result<Vec<SubmissionDetail>, AppError> {
    let rows = sqlx::query_as::<_, SubmissionDetailRow>(
        r#"
        SELECT d.id, d.question_id, d.question_type, d.student_answer, d.max_score, g.score
        FROM submission_details d
        LEFT JOIN detail_grades g ON g.detail_id = d.id
        WHERE d.submission_id = $1
        ORDER BY d.position, d.id
        "#,
    )
    .bind(submission_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(SubmissionDetail::from).collect())
}

/// Details plus the answer keys of the questions that still exist.
async fn load_grading_input(
    pool: &PgPool,
    submission_id: i64,
) -> Result<(Vec<SubmissionDetail>, HashMap<i64, AnswerKey>), AppError> {
    let details = fetch_details(pool, submission_id).await?;
    let ids: Vec<i64> = details.iter().map(|d| d.question_id).collect();
    let keys = answer_keys(fetch_questions_by_ids(pool, &ids).await?);
    Ok((details, keys))
}

/// Recomputes the cached total from the stored detail grades and returns it.
/// `finalize` also marks the submission as graded.
async fn refresh_total<'e, E>(executor: E, submission_id: i64, finalize: bool) -> Result<f64, sqlx::Error>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query_scalar(
        r#"
        UPDATE submissions
        SET total_score = (
                SELECT COALESCE(SUM(g.score), 0)::DOUBLE PRECISION
                FROM detail_grades g
                JOIN submission_details d ON d.id = g.detail_id
                WHERE d.submission_id = $1
            ),
            status = CASE WHEN $2 THEN 'graded' ELSE status END,
            graded_at = CASE WHEN $2 THEN CURRENT_TIMESTAMP ELSE graded_at END
        WHERE id = $1
        RETURNING total_score
        "#,
    )
    .bind(submission_id)
    .bind(finalize)
    .fetch_one(executor)
    .await
}

/// Hands in a student's answers for an assignment or exam.
///
/// * Creates one detail per question on the paper (unanswered ones stay empty).
/// * Scores objective questions right away.
/// * One submission per student and assessment.
/// Student only.
pub async fn submit_answers(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(assessment_id): Path<i64>,
    Json(req): Json<SubmitAnswersRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.answers.is_empty() {
        return Err(AppError::BadRequest("No answers submitted".to_string()));
    }
    let student_id = claims.user_id()?;

    let assessment = fetch_assessment(&pool, assessment_id).await?;
    let entries = fetch_assessment_questions(&pool, assessment_id).await?;
    let ids: Vec<i64> = entries.iter().map(|e| e.question_id).collect();
    let questions = fetch_questions_by_ids(&pool, &ids).await?;

    let stray = req
        .answers
        .keys()
        .filter(|id| !ids.contains(id))
        .count();
    if stray > 0 {
        tracing::warn!(
            "Submission by user {} for assessment {} ignored {} answer(s) to questions not on the paper",
            student_id,
            assessment_id,
            stray
        );
    }

    let mut tx = pool.begin().await?;

    let submission_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO submissions (student_id, assessment_id)
        VALUES ($1, $2)
        RETURNING id
        "#,
    )
    .bind(student_id)
    .bind(assessment_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
            AppError::Conflict("You have already submitted this assessment".to_string())
        } else {
            tracing::error!("Failed to create submission: {:?}", e);
            AppError::InternalServerError(e.to_string())
        }
    })?;

    let mut details = Vec::with_capacity(entries.len());
    for (position, entry) in entries.iter().enumerate() {
        let question_type = questions
            .get(&entry.question_id)
            .map_or(QuestionType::Unknown, |q| q.question_type);
        let student_answer = req
            .answers
            .get(&entry.question_id)
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());

        let detail_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO submission_details
            (submission_id, question_id, question_type, student_answer, max_score, position)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(submission_id)
        .bind(entry.question_id)
        .bind(question_type.as_str())
        .bind(&student_answer)
        .bind(entry.max_score)
        .bind(position as i32)
        .fetch_one(&mut *tx)
        .await?;

        details.push(SubmissionDetail {
            detail_id,
            question_id: entry.question_id,
            student_answer,
            score: None,
            max_score: entry.max_score,
            question_type,
        });
    }

    let report = grade_details(&details, &answer_keys(questions));

    for graded in report.details.iter().filter(|d| d.status == GradeStatus::Auto) {
        sqlx::query("INSERT INTO detail_grades (detail_id, score) VALUES ($1, $2)")
            .bind(graded.detail_id)
            .bind(graded.score)
            .execute(&mut *tx)
            .await?;
    }

    refresh_total(&mut *tx, submission_id, false).await?;

    tx.commit().await?;

    tracing::info!(
        "User {} submitted {} {} (auto score {}/{})",
        student_id,
        assessment.kind.as_str(),
        assessment_id,
        report.total_score,
        report.max_total
    );

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": submission_id,
            "auto_score": report.total_score,
            "correct_count": report.correct_count,
            "pending_count": report.pending_count,
            "total_questions": report.details.len(),
        })),
    ))
}

/// Lists the submissions of an assessment with their totals.
/// Staff only.
pub async fn list_submissions(
    State(pool): State<PgPool>,
    Path(assessment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    fetch_assessment(&pool, assessment_id).await?;

    let submissions = sqlx::query_as::<_, SubmissionSummary>(
        r#"
        SELECT id, student_id, status, total_score, submitted_at
        FROM submissions
        WHERE assessment_id = $1
        ORDER BY submitted_at
        "#,
    )
    .bind(assessment_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list submissions: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(submissions))
}

/// Grading view of a submission: every detail with correctness, score and
/// status, plus the running total.
/// Staff, or the student who handed it in.
pub async fn get_submission(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let submission = fetch_submission(&pool, id).await?;
    if !claims.is_staff() && submission.student_id != claims.user_id()? {
        return Err(AppError::Forbidden("Not your submission".to_string()));
    }

    let (details, keys) = load_grading_input(&pool, id).await?;
    let report = grade_details(&details, &keys);

    let stored = total_score(&details);
    if (stored - submission.total_score).abs() > f64::EPSILON {
        tracing::warn!(
            "Submission {} cached total {} differs from stored grades {}",
            id,
            submission.total_score,
            stored
        );
    }

    Ok(Json(SubmissionView { submission, report }))
}

/// Persists teacher scores for a submission.
///
/// Each grade is an upsert keyed by detail id, so sending the same grades
/// again leaves the stored state unchanged. Objective details are scored from
/// the answer key and cannot be overridden here. The cached total is summed
/// from the stored grades while the submission row is locked.
/// Staff only.
pub async fn grade_submission(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(req): Json<GradeSubmissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let grader_id = claims.user_id()?;

    fetch_submission(&pool, id).await?;
    let (mut details, keys) = load_grading_input(&pool, id).await?;

    let before = grade_details(&details, &keys);
    for grade in &req.grades {
        let auto = before
            .details
            .iter()
            .any(|d| d.detail_id == grade.detail_id && d.status == GradeStatus::Auto);
        if auto {
            return Err(AppError::BadRequest(format!(
                "Detail {} is graded automatically",
                grade.detail_id
            )));
        }
    }

    apply_grades(&mut details, &req.grades)?;
    let report = grade_details(&details, &keys);

    let mut tx = pool.begin().await?;

    // Serializes graders of the same submission; the total below is read
    // after any concurrent grading has committed.
    sqlx::query("SELECT id FROM submissions WHERE id = $1 FOR UPDATE")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    for grade in &req.grades {
        sqlx::query(
            r#"
            INSERT INTO detail_grades (detail_id, score, graded_by)
            VALUES ($1, $2, $3)
            ON CONFLICT (detail_id) DO UPDATE SET
                score = EXCLUDED.score,
                graded_by = EXCLUDED.graded_by,
                graded_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(grade.detail_id)
        .bind(grade.score)
        .bind(grader_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to upsert grade: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;
    }

    // Objective details without a stored score get one now, so the view and
    // the cached total read the same rows.
    let unstored = details
        .iter()
        .zip(&report.details)
        .filter(|(d, g)| d.score.is_none() && g.status == GradeStatus::Auto);
    for (_, graded) in unstored {
        sqlx::query(
            "INSERT INTO detail_grades (detail_id, score) VALUES ($1, $2) ON CONFLICT (detail_id) DO NOTHING",
        )
        .bind(graded.detail_id)
        .bind(graded.score)
        .execute(&mut *tx)
        .await?;
    }

    let total = refresh_total(&mut *tx, id, req.finalize).await?;

    tx.commit().await?;

    if req.finalize && !report.is_complete() {
        tracing::warn!(
            "Submission {} finalized with {} detail(s) still unscored",
            id,
            report.pending_count
        );
    }
    tracing::info!(
        "User {} graded submission {}: total {}/{}",
        grader_id,
        id,
        total,
        report.max_total
    );

    let submission = fetch_submission(&pool, id).await?;
    let (details, keys) = load_grading_input(&pool, id).await?;
    let report = grade_details(&details, &keys);
    Ok(Json(SubmissionView { submission, report }))
}
