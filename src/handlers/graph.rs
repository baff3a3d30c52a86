// src/handlers/graph.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use sqlx::PgPool;

use crate::{
    error::AppError,
    handlers::courses::{fetch_chapters, fetch_course, fetch_course_knowledge_points},
    models::course::{Chapter, KnowledgePoint},
    services::{
        graph::{CourseRef, compose_graph},
        layout::{Direction, LayoutOptions, layout_graph},
    },
};

#[derive(Debug, Deserialize)]
pub struct GraphParams {
    pub direction: Option<Direction>,
}

/// Knowledge graph of a stored course, laid out for rendering.
pub async fn course_graph(
    State(pool): State<PgPool>,
    Path(course_id): Path<i64>,
    Query(params): Query<GraphParams>,
) -> Result<impl IntoResponse, AppError> {
    let course = fetch_course(&pool, course_id).await?;
    let chapters = fetch_chapters(&pool, course_id).await?;
    let points = fetch_course_knowledge_points(&pool, course_id).await?;

    let course = CourseRef {
        id: course.id,
        name: course.name,
    };
    let graph = compose_graph(&course, &chapters, &points);
    let options = LayoutOptions {
        direction: params.direction.unwrap_or_default(),
        ..LayoutOptions::default()
    };

    tracing::debug!(
        "Laid out graph for course {}: {} nodes, {} edges",
        course_id,
        graph.nodes.len(),
        graph.edges.len()
    );
    Ok(Json(layout_graph(&graph, &options)))
}

/// Body for the stateless re-layout endpoint: the client sends the tree it
/// currently holds (possibly edited but unsaved).
#[derive(Debug, Deserialize)]
pub struct LayoutRequest {
    pub course: CourseRef,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
    #[serde(default)]
    pub knowledge_points: Vec<KnowledgePoint>,
    #[serde(default)]
    pub direction: Direction,
}

/// Composes and lays out a graph from the posted tree without touching the
/// database.
pub async fn layout(Json(req): Json<LayoutRequest>) -> Result<impl IntoResponse, AppError> {
    let graph = compose_graph(&req.course, &req.chapters, &req.knowledge_points);
    let options = LayoutOptions {
        direction: req.direction,
        ..LayoutOptions::default()
    };
    Ok(Json(layout_graph(&graph, &options)))
}
