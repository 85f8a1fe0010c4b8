use itertools::Itertools as _;
use thiserror::Error;

use super::linear_node::{LinearBvhNode, NodeKind};
use crate::mesh::MeshTriangle;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("Node array is empty")]
    NoNodes,

    #[error("Inner node {0} has an invalid split axis")]
    InvalidAxis(usize),

    #[error("Node {node} references child {child} outside of the node array")]
    ChildOutOfRange { node: usize, child: usize },

    #[error("Second child of node {node} ({child}) doesn't come after its first child")]
    ChildOrder { node: usize, child: usize },

    #[error("Node {0} is reachable more than once")]
    SharedNode(usize),

    #[error("Node {0} is not reachable from the root")]
    OrphanedNode(usize),

    #[error("Bounds of node {child} are not contained in its parent {node}")]
    ChildNotContained { node: usize, child: usize },

    #[error("Leaf {node} references triangles {first}..{end} of {triangle_count}")]
    LeafOutOfRange {
        node: usize,
        first: usize,
        end: usize,
        triangle_count: usize,
    },

    #[error("Triangle {triangle} is outside of the bounds of leaf {node}")]
    TriangleOutside { node: usize, triangle: usize },

    #[error("Leaf ranges don't cover triangle {0} exactly once")]
    NotAPartition(usize),

    #[error("Node {node} is at depth {depth}, above the limit of {max_depth}")]
    TooDeep { node: usize, depth: u32, max_depth: u32 },
}

/// Checks the structural guarantees of a flattened hierarchy built over `triangles`:
/// every node is reachable exactly once, child bounds nest inside their parents,
/// leaves partition the triangle array and enclose their triangles.
pub fn validate_layout(
    nodes: &[LinearBvhNode],
    triangles: &[MeshTriangle],
    max_depth: u32,
) -> Result<(), LayoutError> {
    if nodes.is_empty() {
        return Err(LayoutError::NoNodes);
    }

    let mut visited = vec![false; nodes.len()];
    let mut leaf_ranges = Vec::new();
    let mut stack = vec![(0usize, 0u32)];

    while let Some((index, depth)) = stack.pop() {
        if std::mem::replace(&mut visited[index], true) {
            return Err(LayoutError::SharedNode(index));
        }
        if depth > max_depth {
            return Err(LayoutError::TooDeep {
                node: index,
                depth,
                max_depth,
            });
        }

        let node = &nodes[index];
        let bounds = node.bounds();

        let Some(kind) = node.kind() else {
            return Err(LayoutError::InvalidAxis(index));
        };

        match kind {
            NodeKind::Leaf { first, count } => {
                let first = first as usize;
                let end = first + count as usize;
                if end > triangles.len() {
                    return Err(LayoutError::LeafOutOfRange {
                        node: index,
                        first,
                        end,
                        triangle_count: triangles.len(),
                    });
                }

                if let Some(triangle) = (first..end)
                    .find(|i| !bounds.contains(&triangles[*i].bounding_box()))
                {
                    return Err(LayoutError::TriangleOutside {
                        node: index,
                        triangle,
                    });
                }

                leaf_ranges.push(first..end);
            }
            NodeKind::Inner { second_child, .. } => {
                let children = [index + 1, second_child as usize];
                for child in children {
                    if child >= nodes.len() {
                        return Err(LayoutError::ChildOutOfRange { node: index, child });
                    }
                }
                if children[1] <= children[0] {
                    return Err(LayoutError::ChildOrder {
                        node: index,
                        child: children[1],
                    });
                }
                for child in children {
                    if !bounds.contains(&nodes[child].bounds()) {
                        return Err(LayoutError::ChildNotContained { node: index, child });
                    }
                    stack.push((child, depth + 1));
                }
            }
        }
    }

    if let Some(orphan) = visited.iter().position(|v| !v) {
        return Err(LayoutError::OrphanedNode(orphan));
    }

    let mut covered = 0;
    for range in leaf_ranges.into_iter().sorted_by_key(|range| range.start) {
        if range.start != covered {
            return Err(LayoutError::NotAPartition(covered.min(range.start)));
        }
        covered = range.end;
    }
    if covered != triangles.len() {
        return Err(LayoutError::NotAPartition(covered));
    }

    Ok(())
}
