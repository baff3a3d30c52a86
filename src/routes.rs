// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{assessments, courses, graph, questions, submissions},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware, staff_middleware, student_middleware},
};

/// Assembles the main application router.
///
/// * Every `/api` route requires a valid token; role checks sit on the
///   sub-routers (staff, admin, student) and run after authentication.
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (Database Pool, Config).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    // Any authenticated user.
    let read_routes = Router::new()
        .route("/courses", get(courses::list_courses))
        .route("/courses/{id}", get(courses::get_course))
        .route("/courses/{id}/chapters", get(courses::list_chapters))
        .route(
            "/chapters/{id}/knowledge-points",
            get(courses::list_knowledge_points),
        )
        .route("/courses/{id}/graph", get(graph::course_graph))
        .route("/graph/layout", post(graph::layout))
        .route("/assessments/{id}", get(assessments::get_assessment))
        // Ownership is checked in the handler.
        .route("/submissions/{id}", get(submissions::get_submission));

    let staff_routes = Router::new()
        .route("/courses", post(courses::create_course))
        .route("/courses/{id}/chapters", post(courses::create_chapter))
        .route("/chapters/{id}", delete(courses::delete_chapter))
        .route(
            "/chapters/{id}/knowledge-points",
            post(courses::create_knowledge_point),
        )
        .route(
            "/knowledge-points/{id}",
            delete(courses::delete_knowledge_point),
        )
        .route(
            "/questions",
            get(questions::list_questions).post(questions::create_question),
        )
        .route("/questions/import", post(questions::import_questions))
        .route(
            "/questions/{id}",
            put(questions::update_question).delete(questions::delete_question),
        )
        .route(
            "/courses/{id}/assessments",
            post(assessments::create_assessment),
        )
        .route(
            "/assessments/{id}/submissions",
            get(submissions::list_submissions),
        )
        .route(
            "/submissions/{id}/grades",
            put(submissions::grade_submission),
        )
        .route_layer(middleware::from_fn(staff_middleware));

    let admin_routes = Router::new()
        .route("/courses/{id}", delete(courses::delete_course))
        .route_layer(middleware::from_fn(admin_middleware));

    let student_routes = Router::new()
        .route(
            "/assessments/{id}/submissions",
            post(submissions::submit_answers),
        )
        .route_layer(middleware::from_fn(student_middleware));

    // Auth runs before the role checks above (outermost route layer).
    let api_routes = Router::new()
        .merge(read_routes)
        .merge(staff_routes)
        .merge(admin_routes)
        .merge(student_routes)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api", api_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
