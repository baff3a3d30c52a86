// src/models/course.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'courses' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub teacher_id: Option<i64>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Represents the 'chapters' table. `course_id` references `courses.id`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Chapter {
    pub id: i64,
    #[serde(default)]
    pub course_id: i64,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub position: i32,
}

/// Represents the 'knowledge_points' table. `chapter_id` references `chapters.id`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct KnowledgePoint {
    pub id: i64,
    pub chapter_id: i64,
    pub name: String,
    pub description: Option<String>,
}

/// DTO for creating a course.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCourseRequest {
    #[validate(length(min = 1, max = 100, message = "Course name must be between 1 and 100 chars"))]
    pub name: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
}

/// DTO for creating a chapter inside a course.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateChapterRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    /// Display order inside the course; appended last when omitted.
    pub position: Option<i32>,
}

/// DTO for creating a knowledge point inside a chapter.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateKnowledgePointRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
}
