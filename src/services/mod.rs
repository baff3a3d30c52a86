// src/services/mod.rs

pub mod graph;
pub mod layout;
pub mod options;
pub mod scoring;
