// src/services/layout.rs

//! Layered (hierarchical) placement of a composed knowledge graph.
//!
//! Ranks are longest-path depths from the sources, so the course sits on rank
//! 0, chapters on rank 1 and knowledge points on rank 2. Each rank is a row
//! (or a column when laid out left to right); nodes inside a rank are packed
//! with `node_sep` between them and the rank is centered on the widest one.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::services::graph::{GraphEdge, KnowledgeGraph, NodeKind};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    #[serde(rename = "TB", alias = "tb")]
    TopBottom,
    #[serde(rename = "LR", alias = "lr")]
    LeftRight,
}

#[derive(Debug, Clone, Copy)]
pub struct LayoutOptions {
    pub direction: Direction,
    /// Gap between neighbouring nodes of one rank.
    pub node_sep: f64,
    /// Gap between consecutive ranks.
    pub rank_sep: f64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            direction: Direction::TopBottom,
            node_sep: 40.0,
            rank_sep: 80.0,
        }
    }
}

/// Rendered size (width, height) of a node.
pub fn footprint(kind: NodeKind) -> (f64, f64) {
    match kind {
        NodeKind::Course => (220.0, 64.0),
        NodeKind::Chapter => (180.0, 52.0),
        NodeKind::KnowledgePoint => (140.0, 40.0),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionedNode {
    pub id: String,
    pub kind: NodeKind,
    pub label: String,
    pub description: Option<String>,
    pub rank: usize,
    /// Top-left corner.
    pub position: Position,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub direction: Direction,
    pub nodes: Vec<PositionedNode>,
    pub edges: Vec<GraphEdge>,
    /// Bounding box of the whole drawing.
    pub width: f64,
    pub height: f64,
}

/// Longest-path rank of every node, index-aligned with `graph.nodes`.
///
/// Edges naming unknown nodes are ignored. Nodes on a cycle cannot be
/// ranked this way and are put on rank 0.
pub fn assign_ranks(graph: &KnowledgeGraph) -> Vec<usize> {
    let n = graph.nodes.len();
    let index: HashMap<&str, usize> = graph
        .nodes
        .iter()
        .enumerate()
        .map(|(i, node)| (node.id.as_str(), i))
        .collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut indegree = vec![0usize; n];
    for edge in &graph.edges {
        if let (Some(&s), Some(&t)) = (
            index.get(edge.source.as_str()),
            index.get(edge.target.as_str()),
        ) {
            children[s].push(t);
            indegree[t] += 1;
        }
    }

    let mut ranks = vec![0usize; n];
    let mut done = vec![false; n];
    let mut queue: VecDeque<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
    while let Some(u) = queue.pop_front() {
        done[u] = true;
        for &v in &children[u] {
            ranks[v] = ranks[v].max(ranks[u] + 1);
            indegree[v] -= 1;
            if indegree[v] == 0 {
                queue.push_back(v);
            }
        }
    }

    let cyclic = done.iter().filter(|d| !**d).count();
    if cyclic > 0 {
        tracing::warn!("{} node(s) sit on a cycle; placing them on rank 0", cyclic);
        for (rank, _) in ranks.iter_mut().zip(&done).filter(|(_, d)| !**d) {
            *rank = 0;
        }
    }

    ranks
}

/// Orders the nodes of each rank: below their first parent's slot, ties
/// broken by input order.
fn order_layers(graph: &KnowledgeGraph, ranks: &[usize]) -> Vec<Vec<usize>> {
    let index: HashMap<&str, usize> = graph
        .nodes
        .iter()
        .enumerate()
        .map(|(i, node)| (node.id.as_str(), i))
        .collect();

    let mut first_parent: Vec<Option<usize>> = vec![None; graph.nodes.len()];
    for edge in &graph.edges {
        if let (Some(&s), Some(&t)) = (
            index.get(edge.source.as_str()),
            index.get(edge.target.as_str()),
        ) {
            if ranks[s] < ranks[t] && first_parent[t].is_none() {
                first_parent[t] = Some(s);
            }
        }
    }

    let depth = ranks.iter().copied().max().map_or(0, |m| m + 1);
    let mut layers: Vec<Vec<usize>> = vec![Vec::new(); depth];
    let mut slot: Vec<(usize, usize)> = vec![(0, 0); graph.nodes.len()];

    for (r, layer) in layers.iter_mut().enumerate() {
        let mut members: Vec<usize> = (0..graph.nodes.len()).filter(|&i| ranks[i] == r).collect();
        // parents always live on a lower, already ordered rank
        members.sort_by_key(|&i| {
            let parent_slot = first_parent[i].map_or((0, 0), |p| slot[p]);
            (parent_slot, i)
        });
        for (pos, &i) in members.iter().enumerate() {
            slot[i] = (r, pos);
        }
        *layer = members;
    }

    layers
}

/// Assigns every node a position. Same graph in, same layout out.
pub fn layout_graph(graph: &KnowledgeGraph, options: &LayoutOptions) -> Layout {
    let ranks = assign_ranks(graph);
    let layers = order_layers(graph, &ranks);

    // (cross, main) extents: cross runs along a rank, main across ranks.
    let extents: Vec<(f64, f64)> = graph
        .nodes
        .iter()
        .map(|node| {
            let (w, h) = footprint(node.kind);
            match options.direction {
                Direction::TopBottom => (w, h),
                Direction::LeftRight => (h, w),
            }
        })
        .collect();

    let layer_span = |layer: &[usize]| -> f64 {
        let sum: f64 = layer.iter().map(|&i| extents[i].0).sum();
        sum + options.node_sep * layer.len().saturating_sub(1) as f64
    };
    let widest = layers.iter().map(|l| layer_span(l.as_slice())).fold(0.0, f64::max);

    let mut cross_pos = vec![0.0; graph.nodes.len()];
    let mut main_pos = vec![0.0; graph.nodes.len()];
    let mut main_cursor = 0.0;
    for layer in &layers {
        let thickness = layer.iter().map(|&i| extents[i].1).fold(0.0, f64::max);
        let mut cursor = (widest - layer_span(layer.as_slice())) / 2.0;
        for &i in layer {
            cross_pos[i] = cursor;
            main_pos[i] = main_cursor + (thickness - extents[i].1) / 2.0;
            cursor += extents[i].0 + options.node_sep;
        }
        main_cursor += thickness + options.rank_sep;
    }
    let depth = if layers.is_empty() {
        0.0
    } else {
        main_cursor - options.rank_sep
    };

    let nodes = graph
        .nodes
        .iter()
        .enumerate()
        .map(|(i, node)| {
            let (width, height) = footprint(node.kind);
            let position = match options.direction {
                Direction::TopBottom => Position {
                    x: cross_pos[i],
                    y: main_pos[i],
                },
                Direction::LeftRight => Position {
                    x: main_pos[i],
                    y: cross_pos[i],
                },
            };
            PositionedNode {
                id: node.id.clone(),
                kind: node.kind,
                label: node.label.clone(),
                description: node.description.clone(),
                rank: ranks[i],
                position,
                width,
                height,
            }
        })
        .collect();

    let (width, height) = match options.direction {
        Direction::TopBottom => (widest, depth),
        Direction::LeftRight => (depth, widest),
    };

    Layout {
        direction: options.direction,
        nodes,
        edges: graph.edges.clone(),
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::course::{Chapter, KnowledgePoint};
    use crate::services::graph::{CourseRef, GraphNode, compose_graph};

    fn sample() -> KnowledgeGraph {
        let course = CourseRef {
            id: 1,
            name: "Networks".to_string(),
        };
        let chapters: Vec<Chapter> = (1..=3)
            .map(|id| Chapter {
                id,
                course_id: 1,
                title: format!("Chapter {}", id),
                description: None,
                position: id as i32,
            })
            .collect();
        let points: Vec<KnowledgePoint> = (10..16)
            .map(|id| KnowledgePoint {
                id,
                chapter_id: 1 + (id % 3),
                name: format!("Point {}", id),
                description: None,
            })
            .collect();
        compose_graph(&course, &chapters, &points)
    }

    fn node<'a>(layout: &'a Layout, id: &str) -> &'a PositionedNode {
        layout.nodes.iter().find(|n| n.id == id).unwrap()
    }

    #[test]
    fn ranks_follow_the_tree() {
        let layout = layout_graph(&sample(), &LayoutOptions::default());
        for n in &layout.nodes {
            let expected = match n.kind {
                NodeKind::Course => 0,
                NodeKind::Chapter => 1,
                NodeKind::KnowledgePoint => 2,
            };
            assert_eq!(n.rank, expected, "{}", n.id);
        }
    }

    #[test]
    fn same_rank_nodes_do_not_overlap() {
        let options = LayoutOptions::default();
        let layout = layout_graph(&sample(), &options);
        for rank in 0..3 {
            let mut row: Vec<&PositionedNode> =
                layout.nodes.iter().filter(|n| n.rank == rank).collect();
            row.sort_by(|a, b| a.position.x.total_cmp(&b.position.x));
            for pair in row.windows(2) {
                let gap = pair[1].position.x - (pair[0].position.x + pair[0].width);
                assert!(gap >= options.node_sep - 1e-9, "rank {} gap {}", rank, gap);
            }
        }
    }

    #[test]
    fn ranks_are_separated_top_down() {
        let options = LayoutOptions::default();
        let layout = layout_graph(&sample(), &options);
        let course = node(&layout, "course-1");
        let chapter = node(&layout, "chapter-1");
        let point = node(&layout, "kp-10");
        assert!(chapter.position.y >= course.position.y + course.height + options.rank_sep);
        assert!(point.position.y >= chapter.position.y + chapter.height + options.rank_sep);
    }

    #[test]
    fn children_follow_parent_order() {
        let layout = layout_graph(&sample(), &LayoutOptions::default());
        // kp-12 and kp-15 hang off chapter-1, kp-10 and kp-13 off chapter-2
        assert!(node(&layout, "kp-12").position.x < node(&layout, "kp-10").position.x);
        assert!(node(&layout, "kp-15").position.x < node(&layout, "kp-13").position.x);
    }

    #[test]
    fn relayout_is_idempotent() {
        let graph = sample();
        let options = LayoutOptions::default();
        assert_eq!(layout_graph(&graph, &options), layout_graph(&graph, &options));
    }

    #[test]
    fn left_right_swaps_axes() {
        let options = LayoutOptions {
            direction: Direction::LeftRight,
            ..LayoutOptions::default()
        };
        let layout = layout_graph(&sample(), &options);
        let course = node(&layout, "course-1");
        let chapter = node(&layout, "chapter-1");
        assert!(chapter.position.x >= course.position.x + course.width + options.rank_sep);
        assert!(layout.width > layout.height);
    }

    #[test]
    fn cycle_falls_back_to_rank_zero() {
        let graph = KnowledgeGraph {
            nodes: ["a", "b"]
                .iter()
                .map(|id| GraphNode {
                    id: id.to_string(),
                    kind: NodeKind::Chapter,
                    label: id.to_string(),
                    description: None,
                })
                .collect(),
            edges: vec![
                GraphEdge {
                    id: "a->b".into(),
                    source: "a".into(),
                    target: "b".into(),
                },
                GraphEdge {
                    id: "b->a".into(),
                    source: "b".into(),
                    target: "a".into(),
                },
            ],
        };
        assert_eq!(assign_ranks(&graph), vec![0, 0]);
        let layout = layout_graph(&graph, &LayoutOptions::default());
        assert_ne!(layout.nodes[0].position.x, layout.nodes[1].position.x);
    }

    #[test]
    fn empty_graph_has_empty_layout() {
        let layout = layout_graph(&KnowledgeGraph::default(), &LayoutOptions::default());
        assert!(layout.nodes.is_empty());
        assert_eq!(layout.width, 0.0);
        assert_eq!(layout.height, 0.0);
    }
}
