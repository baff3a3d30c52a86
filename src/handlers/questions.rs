// src/handlers/questions.rs

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    config::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE},
    error::AppError,
    models::question::{
        CreateQuestionRequest, ImportQuestionRow, ImportQuestionsRequest, ImportSummary,
        OptionItem, Question, QuestionListParams, QuestionRow, QuestionType, SkippedRow,
        UpdateQuestionRequest,
    },
    services::options::{RawOptions, canonical_answer, normalize_options, split_answer_keys},
    utils::{html::clean_html, numeric::parse_int_or_zero},
};

const QUESTION_COLUMNS: &str = "id, course_id, type, content, options, answer, difficulty, created_at";

/// A question ready to be inserted.
#[derive(Debug)]
struct NewQuestion {
    question_type: QuestionType,
    content: String,
    options: Vec<OptionItem>,
    answer: String,
    difficulty: i32,
}

/// Checks that an answer key fits its question and returns it in canonical
/// form. Choice keys must name existing options.
fn check_answer_key(
    question_type: QuestionType,
    options: &[OptionItem],
    answer: &str,
) -> Result<String, String> {
    let canonical = canonical_answer(question_type, answer);

    match question_type {
        QuestionType::SingleChoice | QuestionType::MultipleChoice => {
            if options.len() < 2 {
                return Err("choice questions need at least two options".to_string());
            }
            if canonical.is_empty() {
                return Err("missing answer key".to_string());
            }
            if question_type == QuestionType::SingleChoice && split_answer_keys(&canonical).len() != 1 {
                return Err("single choice questions take exactly one key".to_string());
            }
            for key in split_answer_keys(&canonical) {
                if !options.iter().any(|o| o.key == key) {
                    return Err(format!("answer key '{}' is not an option", key));
                }
            }
        }
        QuestionType::TrueFalse => {
            if canonical.is_empty() {
                return Err("true/false answer must be true or false".to_string());
            }
        }
        _ => {}
    }

    Ok(canonical)
}

/// Turns one spreadsheet row into an insertable question.
fn prepare_import_row(row: &ImportQuestionRow) -> Result<NewQuestion, String> {
    let question_type = QuestionType::parse_lenient(&row.question_type);
    if question_type == QuestionType::Unknown {
        return Err(format!("unrecognised question type '{}'", row.question_type.trim()));
    }

    let content = row.content.trim();
    if content.is_empty() {
        return Err("empty content".to_string());
    }

    let options = match question_type {
        QuestionType::SingleChoice | QuestionType::MultipleChoice => {
            let raw = RawOptions::Encoded(row.options.clone().unwrap_or_default());
            normalize_options(&raw)
        }
        _ => Vec::new(),
    };

    let answer = check_answer_key(question_type, &options, row.answer.as_deref().unwrap_or(""))?;
    let difficulty = parse_int_or_zero(row.difficulty.as_deref()).clamp(0, 5);

    Ok(NewQuestion {
        question_type,
        content: clean_html(content),
        options,
        answer,
        difficulty,
    })
}

async fn insert_question<'e, E>(
    executor: E,
    course_id: Option<i64>,
    question: &NewQuestion,
) -> Result<i64, sqlx::Error>
where
    E: sqlx::PgExecutor<'e>,
{
    let options = serde_json::to_value(&question.options).unwrap_or_default();
    sqlx::query_scalar(
        r#"
        INSERT INTO questions (course_id, type, content, options, answer, difficulty)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(course_id)
    .bind(question.question_type.as_str())
    .bind(&question.content)
    .bind(options)
    .bind(&question.answer)
    .bind(question.difficulty)
    .fetch_one(executor)
    .await
}

/// Loads questions by id, keyed by id. Missing ids are simply absent.
pub(crate) async fn fetch_questions_by_ids(
    pool: &PgPool,
    ids: &[i64],
) -> Result<HashMap<i64, Question>, AppError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query_as::<_, QuestionRow>(&format!(
        "SELECT {} FROM questions WHERE id = ANY($1)",
        QUESTION_COLUMNS
    ))
    .bind(ids)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(Question::from)
        .map(|q| (q.id, q))
        .collect())
}

fn push_question_filters(builder: &mut QueryBuilder<'_, Postgres>, params: &QuestionListParams) {
    builder.push(" WHERE TRUE");
    if let Some(question_type) = params.question_type {
        builder.push(" AND type = ");
        builder.push_bind(question_type.as_str());
    }
    if let Some(course_id) = params.course_id {
        builder.push(" AND course_id = ");
        builder.push_bind(course_id);
    }
    if let Some(q) = params.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        builder.push(" AND content ILIKE ");
        builder.push_bind(format!("%{}%", q));
    }
}

/// Lists the question bank, filtered by type, course and keyword.
/// Staff only.
pub async fn list_questions(
    State(pool): State<PgPool>,
    Query(params): Query<QuestionListParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = params.page.unwrap_or(1).max(1);
    let page_size = params
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let mut count_builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM questions");
    push_question_filters(&mut count_builder, &params);
    let total: i64 = count_builder
        .build_query_scalar()
        .fetch_one(&pool)
        .await?;

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {} FROM questions", QUESTION_COLUMNS));
    push_question_filters(&mut builder, &params);
    builder.push(" ORDER BY id DESC LIMIT ");
    builder.push_bind(page_size);
    builder.push(" OFFSET ");
    builder.push_bind((page - 1) * page_size);

    let rows: Vec<QuestionRow> = builder
        .build_query_as()
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list questions: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    let items: Vec<Question> = rows.into_iter().map(Question::from).collect();

    Ok(Json(json!({
        "items": items,
        "total": total,
        "page": page,
        "page_size": page_size,
    })))
}

/// Creates a new question.
/// Staff only.
pub async fn create_question(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    if payload.question_type == QuestionType::Unknown {
        return Err(AppError::BadRequest("Unsupported question type".to_string()));
    }

    let options = if matches!(
        payload.question_type,
        QuestionType::SingleChoice | QuestionType::MultipleChoice
    ) {
        payload
            .options
            .into_iter()
            .map(|o| OptionItem {
                key: o.key.trim().to_uppercase(),
                text: o.text,
            })
            .collect()
    } else {
        Vec::new()
    };

    let answer = check_answer_key(payload.question_type, &options, &payload.answer)
        .map_err(AppError::BadRequest)?;

    let question = NewQuestion {
        question_type: payload.question_type,
        content: clean_html(&payload.content),
        options,
        answer,
        difficulty: payload.difficulty,
    };

    let id = insert_question(&pool, payload.course_id, &question)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create question: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok((StatusCode::CREATED, Json(json!({"id": id}))))
}

/// Updates a question by ID.
///
/// The answer key is re-checked against the merged result, so changing only
/// the options cannot orphan the stored key.
/// Staff only.
pub async fn update_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let current: Question = sqlx::query_as::<_, QuestionRow>(&format!(
        "SELECT {} FROM questions WHERE id = $1",
        QUESTION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .map(Question::from)
    .ok_or(AppError::NotFound("Question not found".to_string()))?;

    let question_type = payload.question_type.unwrap_or(current.question_type);
    if question_type == QuestionType::Unknown {
        return Err(AppError::BadRequest("Unsupported question type".to_string()));
    }
    let options: Vec<OptionItem> = match payload.options {
        Some(options) => options
            .into_iter()
            .map(|o| OptionItem {
                key: o.key.trim().to_uppercase(),
                text: o.text,
            })
            .collect(),
        None => current.options,
    };
    let answer = check_answer_key(
        question_type,
        &options,
        payload.answer.as_deref().unwrap_or(&current.answer),
    )
    .map_err(AppError::BadRequest)?;
    let content = payload
        .content
        .map(|c| clean_html(&c))
        .unwrap_or(current.content);

    sqlx::query(
        r#"
        UPDATE questions
        SET type = $1, content = $2, options = $3, answer = $4, difficulty = $5
        WHERE id = $6
        "#,
    )
    .bind(question_type.as_str())
    .bind(content)
    .bind(serde_json::to_value(&options).unwrap_or_default())
    .bind(answer)
    .bind(payload.difficulty.unwrap_or(current.difficulty))
    .bind(id)
    .execute(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to update question: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(StatusCode::OK)
}

/// Deletes a question by ID.
/// Staff only. Submissions that referenced it keep their details and fall
/// back to manual scoring.
pub async fn delete_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM questions WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete question: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Imports rows of a question-bank spreadsheet.
///
/// Bad rows are reported and skipped; the good ones are inserted in a single
/// transaction.
/// Staff only.
pub async fn import_questions(
    State(pool): State<PgPool>,
    Json(payload): Json<ImportQuestionsRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut prepared = Vec::new();
    let mut skipped = Vec::new();
    for (i, row) in payload.rows.iter().enumerate() {
        match prepare_import_row(row) {
            Ok(question) => prepared.push(question),
            Err(reason) => skipped.push(SkippedRow { row: i + 1, reason }),
        }
    }

    let mut tx = pool.begin().await?;
    let mut ids = Vec::with_capacity(prepared.len());
    for question in &prepared {
        ids.push(insert_question(&mut *tx, payload.course_id, question).await?);
    }
    tx.commit().await?;

    tracing::info!(
        "Imported {} question(s), skipped {}",
        ids.len(),
        skipped.len()
    );

    Ok((
        StatusCode::CREATED,
        Json(ImportSummary {
            imported: ids.len(),
            ids,
            skipped,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(question_type: &str, options: Option<&str>, answer: Option<&str>) -> ImportQuestionRow {
        ImportQuestionRow {
            question_type: question_type.to_string(),
            content: "What is 2 + 2?".to_string(),
            options: options.map(str::to_string),
            answer: answer.map(str::to_string),
            difficulty: Some("3.0".to_string()),
        }
    }

    #[test]
    fn import_single_choice_row() {
        let q = prepare_import_row(&row("单选题", Some("A. 3\nB. 4"), Some("b"))).unwrap();
        assert_eq!(q.question_type, QuestionType::SingleChoice);
        assert_eq!(q.options.len(), 2);
        assert_eq!(q.answer, "B");
        assert_eq!(q.difficulty, 3);
    }

    #[test]
    fn import_multiple_choice_canonicalizes_key() {
        let q = prepare_import_row(&row(
            "multiple_choice",
            Some("[\"a\",\"b\",\"c\"]"),
            Some("C, A"),
        ))
        .unwrap();
        assert_eq!(q.answer, "A,C");
    }

    #[test]
    fn import_rejects_bad_rows() {
        assert!(prepare_import_row(&row("matching", None, Some("A"))).is_err());
        assert!(prepare_import_row(&row("single", Some("garbage"), Some("A"))).is_err());
        assert!(prepare_import_row(&row("single", Some("A. 1\nB. 2"), Some("E"))).is_err());
        assert!(prepare_import_row(&row("single", Some("A. 1\nB. 2"), Some("A,B"))).is_err());
        assert!(prepare_import_row(&row("true_false", None, Some("perhaps"))).is_err());

        let mut empty = row("essay", None, None);
        empty.content = "   ".to_string();
        assert_eq!(prepare_import_row(&empty).unwrap_err(), "empty content");
    }

    #[test]
    fn import_subjective_without_key() {
        let mut r = row("essay", Some("A. ignored"), None);
        r.difficulty = Some("hard".to_string());
        let q = prepare_import_row(&r).unwrap();
        assert!(q.options.is_empty());
        assert_eq!(q.answer, "");
        assert_eq!(q.difficulty, 0);
    }
}
