// tests/grading_tests.rs

//! Grading flows against a real Postgres (`DATABASE_URL`). Ignored by default:
//! run with `cargo test -- --ignored` once a database is available.

use classroom::{
    config::Config,
    routes,
    state::AppState,
    utils::jwt::{Role, sign_jwt},
};
use serde_json::json;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

const TEST_SECRET: &str = "test_secret_for_grading_tests";

async fn spawn_app() -> (String, PgPool) {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing. Make sure DATABASE_URL is set.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url,
        jwt_secret: TEST_SECRET.to_string(),
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        log_dir: "logs".to_string(),
    };

    let app = routes::create_router(AppState::new(pool.clone(), config));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let address = format!("http://127.0.0.1:{}", listener.local_addr().unwrap().port());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (address, pool)
}

/// Seeds a course with one exam of two essay questions and a submission with
/// one detail per question. Returns (submission id, detail ids).
async fn seed_essay_submission(pool: &PgPool) -> (i64, Vec<i64>) {
    let course_id: i64 = sqlx::query_scalar(
        "INSERT INTO courses (name, teacher_id) VALUES ('Literature', 2) RETURNING id",
    )
    .fetch_one(pool)
    .await
    .unwrap();

    let assessment_id: i64 = sqlx::query_scalar(
        "INSERT INTO assessments (course_id, kind, title) VALUES ($1, 'exam', 'Final') RETURNING id",
    )
    .bind(course_id)
    .fetch_one(pool)
    .await
    .unwrap();

    // Unique student per run so reruns do not hit the one-submission rule.
    let student_id: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(student_id), 1000) + 1 FROM submissions")
        .fetch_one(pool)
        .await
        .unwrap();

    let submission_id: i64 = sqlx::query_scalar(
        "INSERT INTO submissions (student_id, assessment_id) VALUES ($1, $2) RETURNING id",
    )
    .bind(student_id)
    .bind(assessment_id)
    .fetch_one(pool)
    .await
    .unwrap();

    let mut detail_ids = Vec::new();
    for position in 0..2 {
        let question_id: i64 = sqlx::query_scalar(
            "INSERT INTO questions (course_id, type, content) VALUES ($1, 'essay', 'Discuss.') RETURNING id",
        )
        .bind(course_id)
        .fetch_one(pool)
        .await
        .unwrap();

        let detail_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO submission_details
            (submission_id, question_id, question_type, student_answer, max_score, position)
            VALUES ($1, $2, 'essay', 'An answer', 10, $3)
            RETURNING id
            "#,
        )
        .bind(submission_id)
        .bind(question_id)
        .bind(position)
        .fetch_one(pool)
        .await
        .unwrap();
        detail_ids.push(detail_id);
    }

    (submission_id, detail_ids)
}

#[tokio::test]
#[ignore = "needs Postgres at DATABASE_URL"]
async fn concurrent_graders_keep_total_in_sync() {
    let (address, pool) = spawn_app().await;
    let (submission_id, details) = seed_essay_submission(&pool).await;
    let client = reqwest::Client::new();
    let url = format!("{}/api/submissions/{}/grades", address, submission_id);

    let first = client
        .put(&url)
        .bearer_auth(sign_jwt(2, Role::Teacher, TEST_SECRET, 600).unwrap())
        .json(&json!({"grades": [{"detail_id": details[0], "score": 5.0}]}))
        .send();
    let second = client
        .put(&url)
        .bearer_auth(sign_jwt(3, Role::Teacher, TEST_SECRET, 600).unwrap())
        .json(&json!({"grades": [{"detail_id": details[1], "score": 7.0}]}))
        .send();

    let (first, second) = tokio::join!(first, second);
    assert_eq!(first.unwrap().status().as_u16(), 200);
    assert_eq!(second.unwrap().status().as_u16(), 200);

    let total: f64 = sqlx::query_scalar("SELECT total_score FROM submissions WHERE id = $1")
        .bind(submission_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(total, 12.0);
}

#[tokio::test]
#[ignore = "needs Postgres at DATABASE_URL"]
async fn grading_view_total_matches_stored_total() {
    let (address, pool) = spawn_app().await;
    let (submission_id, details) = seed_essay_submission(&pool).await;
    let client = reqwest::Client::new();

    let response = client
        .put(format!("{}/api/submissions/{}/grades", address, submission_id))
        .bearer_auth(sign_jwt(2, Role::Teacher, TEST_SECRET, 600).unwrap())
        .json(&json!({
            "grades": [
                {"detail_id": details[0], "score": 4.0},
                {"detail_id": details[1], "score": 6.5}
            ],
            "finalize": true
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["submission"]["total_score"], body["total_score"]);
    assert_eq!(body["total_score"], 10.5);
    assert_eq!(body["submission"]["status"], "graded");
}
