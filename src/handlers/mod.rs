// src/handlers/mod.rs

pub mod assessments;
pub mod courses;
pub mod graph;
pub mod questions;
pub mod submissions;
