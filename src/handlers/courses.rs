// src/handlers/courses.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::course::{
        Chapter, Course, CreateChapterRequest, CreateCourseRequest, CreateKnowledgePointRequest,
        KnowledgePoint,
    },
    utils::{html::clean_optional, jwt::Claims},
};

/// Lists all courses.
pub async fn list_courses(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let courses = sqlx::query_as::<_, Course>(
        r#"
        SELECT id, name, description, teacher_id, created_at
        FROM courses
        ORDER BY id
        "#,
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list courses: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(courses))
}

/// Retrieves a single course by ID.
pub async fn get_course(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let course = fetch_course(&pool, id).await?;
    Ok(Json(course))
}

pub(crate) async fn fetch_course(pool: &PgPool, id: i64) -> Result<Course, AppError> {
    sqlx::query_as::<_, Course>(
        "SELECT id, name, description, teacher_id, created_at FROM courses WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Course not found".to_string()))
}

/// Creates a course owned by the calling teacher.
/// Staff only.
pub async fn create_course(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let teacher_id = claims.user_id()?;

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO courses (name, description, teacher_id)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(payload.name.trim())
    .bind(clean_optional(payload.description))
    .bind(teacher_id)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create course: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    tracing::info!("Course {} created by user {}", id, teacher_id);
    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id}))))
}

/// Deletes a course with its chapters and knowledge points (cascade).
/// Admin only.
pub async fn delete_course(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM courses WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete course: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Course not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Lists the chapters of a course in display order.
pub async fn list_chapters(
    State(pool): State<PgPool>,
    Path(course_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let chapters = fetch_chapters(&pool, course_id).await?;
    Ok(Json(chapters))
}

pub(crate) async fn fetch_chapters(pool: &PgPool, course_id: i64) -> Result<Vec<Chapter>, AppError> {
    let chapters = sqlx::query_as::<_, Chapter>(
        r#"
        SELECT id, course_id, title, description, position
        FROM chapters
        WHERE course_id = $1
        ORDER BY position, id
        "#,
    )
    .bind(course_id)
    .fetch_all(pool)
    .await?;

    Ok(chapters)
}

/// Adds a chapter to a course.
/// Staff only.
pub async fn create_chapter(
    State(pool): State<PgPool>,
    Path(course_id): Path<i64>,
    Json(payload): Json<CreateChapterRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    fetch_course(&pool, course_id).await?;

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO chapters (course_id, title, description, position)
        VALUES (
            $1, $2, $3,
            COALESCE($4, (SELECT COALESCE(MAX(position), 0) + 1 FROM chapters WHERE course_id = $1))
        )
        RETURNING id
        "#,
    )
    .bind(course_id)
    .bind(payload.title.trim())
    .bind(clean_optional(payload.description))
    .bind(payload.position)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create chapter: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id}))))
}

/// Deletes a chapter and its knowledge points.
/// Staff only.
pub async fn delete_chapter(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM chapters WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Chapter not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Lists the knowledge points of one chapter.
pub async fn list_knowledge_points(
    State(pool): State<PgPool>,
    Path(chapter_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let points = sqlx::query_as::<_, KnowledgePoint>(
        "SELECT id, chapter_id, name, description FROM knowledge_points WHERE chapter_id = $1 ORDER BY id",
    )
    .bind(chapter_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(points))
}

/// Knowledge points of every chapter in a course, for graph composition.
pub(crate) async fn fetch_course_knowledge_points(
    pool: &PgPool,
    course_id: i64,
) -> Result<Vec<KnowledgePoint>, AppError> {
    let points = sqlx::query_as::<_, KnowledgePoint>(
        r#"
        SELECT k.id, k.chapter_id, k.name, k.description
        FROM knowledge_points k
        JOIN chapters c ON k.chapter_id = c.id
        WHERE c.course_id = $1
        ORDER BY c.position, c.id, k.id
        "#,
    )
    .bind(course_id)
    .fetch_all(pool)
    .await?;

    Ok(points)
}

/// Adds a knowledge point to a chapter.
/// Staff only.
pub async fn create_knowledge_point(
    State(pool): State<PgPool>,
    Path(chapter_id): Path<i64>,
    Json(payload): Json<CreateKnowledgePointRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM chapters WHERE id = $1")
        .bind(chapter_id)
        .fetch_optional(&pool)
        .await?;
    if exists.is_none() {
        return Err(AppError::NotFound("Chapter not found".to_string()));
    }

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO knowledge_points (chapter_id, name, description)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(chapter_id)
    .bind(payload.name.trim())
    .bind(clean_optional(payload.description))
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create knowledge point: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id}))))
}

/// Deletes a knowledge point.
/// Staff only.
pub async fn delete_knowledge_point(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM knowledge_points WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Knowledge point not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
