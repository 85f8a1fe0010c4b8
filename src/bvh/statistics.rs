use std::fmt::{self, Display};

use super::linear_node::{LinearBvhNode, NodeKind};
use crate::{geometry::FloatType, util::Summary};

/// Relative cost of visiting an inner node vs. intersecting a triangle, used by `sah_cost`.
const TRAVERSAL_COST: FloatType = 1.0;
const INTERSECTION_COST: FloatType = 1.0;

#[derive(Clone, Debug, PartialEq)]
pub struct BvhStatistics {
    pub node_count: usize,
    pub leaf_count: usize,
    /// Depth of leaves, root is at depth 0.
    pub leaf_depth: Summary,
    pub leaf_size: Summary,
    /// Expected cost of a random ray hitting the root box, according to the surface area heuristic.
    pub sah_cost: FloatType,
}

impl BvhStatistics {
    /// Walks a hierarchy as produced by a build or accepted by `validate_layout`.
    /// Nodes that don't decode and child links past the end of the array are not followed.
    pub fn new(nodes: &[LinearBvhNode]) -> BvhStatistics {
        let mut statistics = BvhStatistics {
            node_count: nodes.len(),
            leaf_count: 0,
            leaf_depth: Summary::default(),
            leaf_size: Summary::default(),
            sah_cost: 0.0,
        };

        let Some(root) = nodes.first() else {
            return statistics;
        };
        let root_area = root.bounds().surface_area();

        let mut stack = vec![(0usize, 0usize)];
        while let Some((index, depth)) = stack.pop() {
            let Some(node) = nodes.get(index) else {
                continue;
            };
            let relative_area = if root_area > 0.0 {
                node.bounds().surface_area() / root_area
            } else {
                1.0
            };

            match node.kind() {
                Some(NodeKind::Leaf { count, .. }) => {
                    statistics.leaf_count += 1;
                    statistics.leaf_depth.add(depth);
                    statistics.leaf_size.add(count as usize);
                    statistics.sah_cost += relative_area * INTERSECTION_COST * count as FloatType;
                }
                Some(NodeKind::Inner { second_child, .. }) => {
                    statistics.sah_cost += relative_area * TRAVERSAL_COST;
                    stack.push((second_child as usize, depth + 1));
                    stack.push((index + 1, depth + 1));
                }
                None => {}
            }
        }

        statistics
    }
}

impl Display for BvhStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Nodes: {} ({} leaves)", self.node_count, self.leaf_count)?;
        writeln!(f, "Leaf depth: {}", self.leaf_depth)?;
        writeln!(f, "Leaf size: {}", self.leaf_size)?;
        write!(f, "SAH cost: {:.2}", self.sah_cost)
    }
}

/// Indented listing of the whole hierarchy, one node per line.
pub struct TreeDump<'a>(pub &'a [LinearBvhNode]);

impl Display for TreeDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nodes = self.0;
        if nodes.is_empty() {
            return writeln!(f, "<not built>");
        }

        let mut stack = vec![(0usize, 0usize)];
        while let Some((index, indent)) = stack.pop() {
            let indent_str = "  ".repeat(indent);
            let Some(node) = nodes.get(index) else {
                writeln!(f, "{indent_str}- N{index}: missing")?;
                continue;
            };
            let bounds = node.bounds();
            match node.kind() {
                Some(NodeKind::Leaf { first, count }) => writeln!(
                    f,
                    "{indent_str}- L{index}: {:?}-{:?} triangles {first}..{}",
                    bounds.min,
                    bounds.max,
                    first as u64 + count as u64
                )?,
                Some(NodeKind::Inner { axis, second_child }) => {
                    writeln!(
                        f,
                        "{indent_str}- I{index}: {:?}-{:?} split {axis:?}",
                        bounds.min, bounds.max
                    )?;
                    stack.push((second_child as usize, indent + 1));
                    stack.push((index + 1, indent + 1));
                }
                None => writeln!(f, "{indent_str}- N{index}: invalid split axis")?,
            }
        }

        Ok(())
    }
}
