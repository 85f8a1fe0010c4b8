use assert2::debug_assert;
use index_vec::IndexVec;

use super::{
    BuildNodeIdx, BuildSettings,
    primitive_table::{PrimitiveRef, bounds_of, centroid_bounds},
    split::{SplitPolicy, split_at_median},
};
use crate::geometry::{Axis, WorldBox};

/// Construction-time node.
/// Children are owned by the arena of the `BuildTree` and referenced by index.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum BuildNode {
    Leaf {
        bounds: WorldBox,
        first: u32,
        count: u32,
    },
    Inner {
        bounds: WorldBox,
        axis: Axis,
        children: [BuildNodeIdx; 2],
    },
}

impl BuildNode {
    /// Stands in for a node whose range was not processed yet.
    fn placeholder() -> BuildNode {
        BuildNode::Leaf {
            bounds: WorldBox::empty(),
            first: 0,
            count: 0,
        }
    }

    #[cfg(test)]
    fn bounds(&self) -> &WorldBox {
        match self {
            BuildNode::Leaf { bounds, .. } | BuildNode::Inner { bounds, .. } => bounds,
        }
    }

    fn remapped(self, f: impl Fn(BuildNodeIdx) -> BuildNodeIdx) -> BuildNode {
        match self {
            BuildNode::Leaf { .. } => self,
            BuildNode::Inner {
                bounds,
                axis,
                children,
            } => BuildNode::Inner {
                bounds,
                axis,
                children: children.map(f),
            },
        }
    }
}

/// Binary tree over a range of the primitive table.
/// The root is always the first node of the arena.
#[derive(Clone, Debug)]
pub struct BuildTree {
    pub nodes: IndexVec<BuildNodeIdx, BuildNode>,
}

impl BuildTree {
    fn new() -> BuildTree {
        let mut nodes = IndexVec::new();
        nodes.push(BuildNode::placeholder());
        BuildTree { nodes }
    }

    pub fn root(&self) -> BuildNodeIdx {
        BuildNodeIdx::from_usize(0)
    }

    /// Replace the placeholder at `slot` with the root of `subtree`, appending the rest
    /// of its nodes.
    fn graft(&mut self, slot: BuildNodeIdx, subtree: BuildTree) {
        let base = self.nodes.len();
        let remap = |index: BuildNodeIdx| {
            debug_assert!(index.index() > 0);
            BuildNodeIdx::from_usize(base + index.index() - 1)
        };

        let mut nodes = subtree.nodes.into_iter();
        if let Some(root) = nodes.next() {
            self.nodes[slot] = root.remapped(remap);
        }
        self.nodes.extend(nodes.map(|node| node.remapped(remap)));
    }
}

/// Builds the hierarchy over `refs`, reordering them so that every leaf covers a contiguous
/// range. Leaf ranges are relative to the start of `refs`.
pub fn build_tree<S: SplitPolicy>(
    refs: &mut [PrimitiveRef],
    policy: &S,
    settings: &BuildSettings,
) -> BuildTree {
    let parallel_threshold = settings.parallel().then_some(settings.parallel_threshold());
    if parallel_threshold.is_some_and(|threshold| refs.len() >= threshold) {
        log::debug!(
            "Building {} triangles on up to {} threads",
            refs.len(),
            rayon::current_num_threads()
        );
    }

    let builder = Builder {
        policy,
        settings,
        parallel_threshold,
    };
    builder.build(refs, 0, 0)
}

struct Builder<'a, S> {
    policy: &'a S,
    settings: &'a BuildSettings,
    /// Ranges with at least this many primitives build their halves with `rayon::join`.
    parallel_threshold: Option<usize>,
}

/// Pending range of the primitive table, together with the arena slot it will fill.
struct Task<'r> {
    refs: &'r mut [PrimitiveRef],
    first: u32,
    depth: u32,
    slot: BuildNodeIdx,
}

impl<S: SplitPolicy> Builder<'_, S> {
    fn build(&self, refs: &mut [PrimitiveRef], first: u32, depth: u32) -> BuildTree {
        let mut tree = BuildTree::new();
        let mut stack = vec![Task {
            refs,
            first,
            depth,
            slot: tree.root(),
        }];

        while let Some(Task {
            refs,
            first,
            depth,
            slot,
        }) = stack.pop()
        {
            let count = refs.len();
            if count <= self.settings.max_leaf_size() as usize
                || depth >= self.settings.max_depth()
            {
                tree.nodes[slot] = BuildNode::Leaf {
                    bounds: bounds_of(refs),
                    first,
                    count: count as u32,
                };
                continue;
            }

            let bounds = bounds_of(refs);
            let (axis, mid) = self.split(refs, depth);
            let (left, right) = refs.split_at_mut(mid);
            let right_first = first + mid as u32;

            let children = [
                tree.nodes.push(BuildNode::placeholder()),
                tree.nodes.push(BuildNode::placeholder()),
            ];
            tree.nodes[slot] = BuildNode::Inner {
                bounds,
                axis,
                children,
            };

            if self.parallel_threshold.is_some_and(|threshold| count >= threshold) {
                let (left_tree, right_tree) = rayon::join(
                    || self.build(left, first, depth + 1),
                    || self.build(right, right_first, depth + 1),
                );
                tree.graft(children[0], left_tree);
                tree.graft(children[1], right_tree);
                continue;
            }

            // Left is pushed last to be processed first
            stack.push(Task {
                refs: right,
                first: right_first,
                depth: depth + 1,
                slot: children[1],
            });
            stack.push(Task {
                refs: left,
                first,
                depth: depth + 1,
                slot: children[0],
            });
        }

        tree
    }

    /// Reorders `refs` into two nonempty halves, returns the split axis and size of the first half.
    fn split(&self, refs: &mut [PrimitiveRef], depth: u32) -> (Axis, usize) {
        let centroid_bounds = centroid_bounds(refs);
        let axis = centroid_bounds.largest_axis();
        let count = refs.len();

        // Unbalanced splits are only allowed while there is enough depth left for
        // halving the largest possible child down to leaf size.
        let depth_left = self.settings.max_depth().saturating_sub(depth + 1);
        let policy_allowed = centroid_bounds.extent(axis) > 0.0
            && levels_needed(count, self.settings.max_leaf_size()) <= depth_left;

        if policy_allowed {
            let mid = self
                .policy
                .split(refs, axis, &centroid_bounds, self.settings)
                .filter(|mid| (1..count).contains(mid));
            if let Some(mid) = mid {
                return (axis, mid);
            }
        }

        (axis, split_at_median(refs, axis))
    }
}

/// Number of halvings needed to get `count` primitives into leaves of at most `max_leaf_size`.
fn levels_needed(count: usize, max_leaf_size: u32) -> u32 {
    ceil_log2(count.div_ceil(max_leaf_size as usize))
}

fn ceil_log2(n: usize) -> u32 {
    if n <= 1 {
        0
    } else {
        usize::BITS - (n - 1).leading_zeros()
    }
}
