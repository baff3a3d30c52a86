// src/handlers/assessments.rs

use std::collections::HashSet;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::{courses::fetch_course, questions::fetch_questions_by_ids},
    models::{
        assessment::{Assessment, AssessmentPaper, CreateAssessmentRequest, PaperQuestion},
        question::PublicQuestion,
    },
    utils::numeric::parse_int_or_zero,
};

/// Helper struct for the question list of an assessment.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct AssessmentQuestion {
    pub question_id: i64,
    pub max_score: f64,
}

pub(crate) async fn fetch_assessment(pool: &PgPool, id: i64) -> Result<Assessment, AppError> {
    sqlx::query_as::<_, Assessment>(
        "SELECT id, course_id, kind, title, duration_minutes, created_at FROM assessments WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Assessment not found".to_string()))
}

pub(crate) async fn fetch_assessment_questions(
    pool: &PgPool,
    assessment_id: i64,
) -> Result<Vec<AssessmentQuestion>, AppError> {
    let rows = sqlx::query_as::<_, AssessmentQuestion>(
        r#"
        SELECT question_id, max_score
        FROM assessment_questions
        WHERE assessment_id = $1
        ORDER BY position
        "#,
    )
    .bind(assessment_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Creates an assignment or exam in a course.
/// Staff only.
pub async fn create_assessment(
    State(pool): State<PgPool>,
    Path(course_id): Path<i64>,
    Json(payload): Json<CreateAssessmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut seen = HashSet::new();
    for q in &payload.questions {
        if !seen.insert(q.question_id) {
            return Err(AppError::BadRequest(format!(
                "Question {} is listed twice",
                q.question_id
            )));
        }
    }

    fetch_course(&pool, course_id).await?;

    let ids: Vec<i64> = payload.questions.iter().map(|q| q.question_id).collect();
    let found = fetch_questions_by_ids(&pool, &ids).await?;
    if let Some(missing) = ids.iter().find(|id| !found.contains_key(*id)) {
        return Err(AppError::BadRequest(format!("Question {} does not exist", missing)));
    }

    // Unparseable durations mean "no limit".
    let duration_minutes = parse_int_or_zero(payload.duration_minutes.as_deref()).max(0);

    let mut tx = pool.begin().await?;

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO assessments (course_id, kind, title, duration_minutes)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(course_id)
    .bind(payload.kind.as_str())
    .bind(payload.title.trim())
    .bind(duration_minutes)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create assessment: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    for (position, q) in payload.questions.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO assessment_questions (assessment_id, question_id, max_score, position)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(id)
        .bind(q.question_id)
        .bind(q.max_score)
        .bind(position as i32)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        "Created {} {} with {} question(s) in course {}",
        payload.kind.as_str(),
        id,
        payload.questions.len(),
        course_id
    );
    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id}))))
}

/// The paper of an assessment, without answer keys.
pub async fn get_assessment(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let assessment = fetch_assessment(&pool, id).await?;
    let entries = fetch_assessment_questions(&pool, id).await?;

    let ids: Vec<i64> = entries.iter().map(|e| e.question_id).collect();
    let mut questions = fetch_questions_by_ids(&pool, &ids).await?;

    let questions = entries
        .into_iter()
        .filter_map(|entry| {
            questions.remove(&entry.question_id).map(|q| PaperQuestion {
                question: PublicQuestion::from(q),
                max_score: entry.max_score,
            })
        })
        .collect();

    Ok(Json(AssessmentPaper {
        assessment,
        questions,
    }))
}
