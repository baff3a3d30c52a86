// src/services/graph.rs

//! Composition of a course, its chapters and knowledge points into a graph.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::models::course::{Chapter, KnowledgePoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Course,
    Chapter,
    KnowledgePoint,
}

impl NodeKind {
    fn prefix(self) -> &'static str {
        match self {
            NodeKind::Course => "course",
            NodeKind::Chapter => "chapter",
            NodeKind::KnowledgePoint => "kp",
        }
    }

    /// Stable id, namespaced by kind so ids never collide across kinds.
    pub fn node_id(self, id: i64) -> String {
        format!("{}-{}", self.prefix(), id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub kind: NodeKind,
    pub label: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
}

impl GraphEdge {
    fn between(source: &str, target: &str) -> Self {
        Self {
            id: format!("{}->{}", source, target),
            source: source.to_string(),
            target: target.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// The root of the tree. Only id and name are needed.
#[derive(Debug, Clone, Deserialize)]
pub struct CourseRef {
    pub id: i64,
    pub name: String,
}

/// Builds the course → chapter → knowledge point graph.
///
/// Knowledge points whose chapter is not in `chapters` are left out.
/// Repeated chapter or knowledge-point ids keep their first occurrence.
pub fn compose_graph(
    course: &CourseRef,
    chapters: &[Chapter],
    knowledge_points: &[KnowledgePoint],
) -> KnowledgeGraph {
    let root_id = NodeKind::Course.node_id(course.id);
    let mut graph = KnowledgeGraph {
        nodes: vec![GraphNode {
            id: root_id.clone(),
            kind: NodeKind::Course,
            label: course.name.clone(),
            description: None,
        }],
        edges: Vec::new(),
    };

    let mut chapter_ids: HashSet<i64> = HashSet::new();
    for chapter in chapters {
        if !chapter_ids.insert(chapter.id) {
            continue;
        }
        let id = NodeKind::Chapter.node_id(chapter.id);
        graph.edges.push(GraphEdge::between(&root_id, &id));
        graph.nodes.push(GraphNode {
            id,
            kind: NodeKind::Chapter,
            label: chapter.title.clone(),
            description: chapter.description.clone(),
        });
    }

    let mut seen_points: HashSet<i64> = HashSet::new();
    let mut dropped = 0usize;
    for point in knowledge_points {
        if !chapter_ids.contains(&point.chapter_id) {
            dropped += 1;
            continue;
        }
        if !seen_points.insert(point.id) {
            continue;
        }
        let parent = NodeKind::Chapter.node_id(point.chapter_id);
        let id = NodeKind::KnowledgePoint.node_id(point.id);
        graph.edges.push(GraphEdge::between(&parent, &id));
        graph.nodes.push(GraphNode {
            id,
            kind: NodeKind::KnowledgePoint,
            label: point.name.clone(),
            description: point.description.clone(),
        });
    }

    if dropped > 0 {
        tracing::debug!(
            "Course {}: {} knowledge point(s) reference unknown chapters and were left out",
            course.id,
            dropped
        );
    }

    graph
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course() -> CourseRef {
        CourseRef {
            id: 1,
            name: "Operating Systems".to_string(),
        }
    }

    fn chapter(id: i64, title: &str) -> Chapter {
        Chapter {
            id,
            course_id: 1,
            title: title.to_string(),
            description: None,
            position: 0,
        }
    }

    fn point(id: i64, chapter_id: i64, name: &str) -> KnowledgePoint {
        KnowledgePoint {
            id,
            chapter_id,
            name: name.to_string(),
            description: None,
        }
    }

    fn ids(graph: &KnowledgeGraph) -> HashSet<String> {
        graph.nodes.iter().map(|n| n.id.clone()).collect()
    }

    #[test]
    fn one_chapter_one_point() {
        let graph = compose_graph(&course(), &[chapter(1, "C1")], &[point(10, 1, "K1")]);
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.edges.len(), 2);
        assert_eq!(
            ids(&graph),
            HashSet::from(["course-1".to_string(), "chapter-1".to_string(), "kp-10".to_string()])
        );
        assert!(graph.edges.iter().any(|e| e.source == "course-1" && e.target == "chapter-1"));
        assert!(graph.edges.iter().any(|e| e.source == "chapter-1" && e.target == "kp-10"));
    }

    #[test]
    fn orphan_point_is_dropped() {
        let graph = compose_graph(&course(), &[], &[point(10, 99, "Orphan")]);
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes[0].kind, NodeKind::Course);
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn ids_are_namespaced_by_kind() {
        // chapter 5 and knowledge point 5 must not collide
        let graph = compose_graph(&course(), &[chapter(5, "C5")], &[point(5, 5, "K5")]);
        assert_eq!(ids(&graph).len(), 3);
    }

    #[test]
    fn composition_is_deterministic_up_to_order() {
        let chapters = vec![chapter(1, "C1"), chapter(2, "C2")];
        let points = vec![point(10, 1, "K1"), point(11, 2, "K2"), point(12, 2, "K3")];
        let first = compose_graph(&course(), &chapters, &points);

        let mut rev_chapters = chapters.clone();
        rev_chapters.reverse();
        let mut rev_points = points.clone();
        rev_points.reverse();
        let second = compose_graph(&course(), &rev_chapters, &rev_points);

        let nodes = |g: &KnowledgeGraph| g.nodes.iter().cloned().collect::<HashSet<_>>();
        let edges = |g: &KnowledgeGraph| g.edges.iter().cloned().collect::<HashSet<_>>();
        assert_eq!(nodes(&first), nodes(&second));
        assert_eq!(edges(&first), edges(&second));
    }

    #[test]
    fn duplicate_ids_keep_first() {
        let graph = compose_graph(
            &course(),
            &[chapter(1, "C1"), chapter(1, "again")],
            &[point(10, 1, "K1"), point(10, 1, "again")],
        );
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.nodes[1].label, "C1");
    }
}
