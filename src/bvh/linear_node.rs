use bytemuck::{Pod, Zeroable};

use crate::geometry::{Axis, WorldBox, WorldPoint};

/// Node of the flattened hierarchy, as uploaded to the traversal kernel.
///
/// Nodes are stored in depth first order, the first child of an inner node always
/// directly follows its parent, the second child is addressed by `offset`.
/// For leaves `offset` is the index of the first triangle of the leaf in the
/// (reordered) triangle array.
///
/// `packed` layout: bits 0-1 split axis (inner nodes), bit 2 leaf flag,
/// bits 3-31 triangle count (leaves).
#[repr(C)]
#[derive(Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct LinearBvhNode {
    bounds_min: [f32; 3],
    offset: u32,
    bounds_max: [f32; 3],
    packed: u32,
}

const _: () = assert!(std::mem::size_of::<LinearBvhNode>() == 32);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Leaf { first: u32, count: u32 },
    Inner { axis: Axis, second_child: u32 },
}

impl LinearBvhNode {
    const AXIS_BITS: u32 = 2;
    const AXIS_MASK: u32 = (1 << Self::AXIS_BITS) - 1;
    const LEAF_BIT: u32 = 1 << Self::AXIS_BITS;
    const COUNT_SHIFT: u32 = Self::AXIS_BITS + 1;

    pub const MAX_PRIMITIVE_COUNT: u32 = u32::MAX >> Self::COUNT_SHIFT;

    /// Create a new leaf node, panics if count is out of range
    pub fn new_leaf(bounds: &WorldBox, first: u32, count: u32) -> Self {
        assert!(count <= Self::MAX_PRIMITIVE_COUNT);
        let (bounds_min, bounds_max) = Self::split_bounds(bounds);
        LinearBvhNode {
            bounds_min,
            offset: first,
            bounds_max,
            packed: (count << Self::COUNT_SHIFT) | Self::LEAF_BIT,
        }
    }

    /// Create a new inner node.
    /// Second child offset is usually not known at this point and gets patched in later.
    pub fn new_inner(bounds: &WorldBox, axis: Axis, second_child: u32) -> Self {
        let (bounds_min, bounds_max) = Self::split_bounds(bounds);
        LinearBvhNode {
            bounds_min,
            offset: second_child,
            bounds_max,
            packed: axis as u32,
        }
    }

    fn split_bounds(bounds: &WorldBox) -> ([f32; 3], [f32; 3]) {
        (bounds.min.coords.into(), bounds.max.coords.into())
    }

    pub fn bounds(&self) -> WorldBox {
        WorldBox::new(
            WorldPoint::from(self.bounds_min),
            WorldPoint::from(self.bounds_max),
        )
    }

    pub fn is_leaf(&self) -> bool {
        self.packed & Self::LEAF_BIT != 0
    }

    /// Decoded node, `None` if an inner node carries axis bits that don't name an axis.
    /// Nodes created by this crate always decode, arrays of other origin may not.
    pub fn kind(&self) -> Option<NodeKind> {
        if self.is_leaf() {
            Some(NodeKind::Leaf {
                first: self.offset,
                count: self.packed >> Self::COUNT_SHIFT,
            })
        } else {
            let axis = Axis::try_from_index((self.packed & Self::AXIS_MASK) as usize)?;
            Some(NodeKind::Inner {
                axis,
                second_child: self.offset,
            })
        }
    }

    /// Panics if called on a leaf.
    pub(super) fn set_second_child(&mut self, index: u32) {
        assert!(!self.is_leaf());
        self.offset = index;
    }
}

impl std::fmt::Debug for LinearBvhNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearBvhNode")
            .field("min", &self.bounds_min)
            .field("max", &self.bounds_max)
            .field("<decoded>", &self.kind())
            .finish()
    }
}
