mod building;
mod linear_node;
mod linearize;
mod primitive_table;
mod settings;
mod split;
mod statistics;
mod validation;

use std::{fmt::Display, str::FromStr, time::Instant};

use thiserror::Error;

use crate::{geometry::WorldBox, mesh::MeshTriangle, util::permute_in_place};

use building::build_tree;
use linearize::linearize;
use primitive_table::PrimitiveTable;

pub use linear_node::{LinearBvhNode, NodeKind};
pub use primitive_table::PrimitiveRef;
pub use settings::{
    BuildSettings, DEFAULT_MAX_DEPTH, DEFAULT_MAX_LEAF_SIZE, DEFAULT_PARALLEL_THRESHOLD,
    DEFAULT_SAH_BIN_COUNT, MAX_DEPTH_LIMIT, SettingsError,
};
pub use split::{MedianSplit, SahSplit, SplitPolicy, split_at_median};
pub use statistics::{BvhStatistics, TreeDump};
pub use validation::{LayoutError, validate_layout};

/// Largest mesh a hierarchy can be built over.
pub const MAX_TRIANGLE_COUNT: usize = LinearBvhNode::MAX_PRIMITIVE_COUNT as usize;

index_vec::define_index_type! {
    pub struct TriangleIdx = u32;
    MAX_INDEX = MAX_TRIANGLE_COUNT;
    IMPL_RAW_CONVERSIONS = true;
}

index_vec::define_index_type! {
    pub struct BuildNodeIdx = u32;
    IMPL_RAW_CONVERSIONS = true;
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Mesh has {count} triangles, at most {max} are supported", max = MAX_TRIANGLE_COUNT)]
    TooManyTriangles { count: usize },
}

/// Spatial index over a triangle mesh, stored as a flat array of nodes.
pub trait AccelerationStructure {
    /// Build the hierarchy over `triangles`, reordering them in place so that every leaf
    /// references a contiguous range of the slice.
    /// Replaces the result of any previous build. On error neither the structure nor
    /// the triangles are modified.
    fn build_cpu(&mut self, triangles: &mut [MeshTriangle]) -> Result<(), BuildError>;

    /// Nodes of the hierarchy in depth first order, root first.
    /// Empty until the first successful build, never empty afterwards.
    fn nodes(&self) -> &[LinearBvhNode];

    /// Bounds of all triangles, empty box if nothing was built yet.
    fn bounding_box(&self) -> WorldBox {
        self.nodes()
            .first()
            .map_or_else(WorldBox::empty, LinearBvhNode::bounds)
    }

    fn statistics(&self) -> BvhStatistics {
        BvhStatistics::new(self.nodes())
    }

    /// Raw node bytes, ready to be uploaded into a device buffer.
    fn nodes_as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.nodes())
    }
}

/// Bounding volume hierarchy with binary nodes, split according to `S`.
#[derive(Clone, Debug)]
pub struct Bvh<S> {
    policy: S,
    settings: BuildSettings,
    nodes: Vec<LinearBvhNode>,
    triangle_count: usize,
}

pub type MedianBvh = Bvh<MedianSplit>;
pub type SahBvh = Bvh<SahSplit>;

impl<S: SplitPolicy> Bvh<S> {
    pub fn new(policy: S, settings: BuildSettings) -> Self {
        Bvh {
            policy,
            settings,
            nodes: Vec::new(),
            triangle_count: 0,
        }
    }

    pub fn policy(&self) -> &S {
        &self.policy
    }

    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    /// Number of triangles covered by the last build.
    pub fn triangle_count(&self) -> usize {
        self.triangle_count
    }
}

impl<S: SplitPolicy + Default> Default for Bvh<S> {
    fn default() -> Self {
        Bvh::new(S::default(), BuildSettings::default())
    }
}

impl<S: SplitPolicy> AccelerationStructure for Bvh<S> {
    fn build_cpu(&mut self, triangles: &mut [MeshTriangle]) -> Result<(), BuildError> {
        check_triangle_count(triangles.len())?;

        let start = Instant::now();
        log::info!(
            "Building {} BVH over {} triangles",
            self.policy.name(),
            triangles.len()
        );

        let mut table = PrimitiveTable::new(triangles);
        let tree = build_tree(table.as_mut_slice(), &self.policy, &self.settings);
        let nodes = linearize(&tree);

        let mut order = table.into_order();
        permute_in_place(triangles, &mut order);

        if cfg!(debug_assertions) {
            if let Err(e) = validate_layout(&nodes, triangles, self.settings.max_depth()) {
                panic!("Invalid BVH layout: {e}");
            }
        }

        self.nodes = nodes;
        self.triangle_count = triangles.len();

        log::info!(
            "Built {} nodes ({} leaves) in {:.2?}",
            self.nodes.len(),
            self.nodes.iter().filter(|node| node.is_leaf()).count(),
            start.elapsed()
        );

        Ok(())
    }

    fn nodes(&self) -> &[LinearBvhNode] {
        &self.nodes
    }
}

fn check_triangle_count(count: usize) -> Result<(), BuildError> {
    if count > MAX_TRIANGLE_COUNT {
        Err(BuildError::TooManyTriangles { count })
    } else {
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SplitMethod {
    Median,
    Sah,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown split method {0:?}, expected \"median\" or \"sah\"")]
pub struct ParseSplitMethodError(String);

impl FromStr for SplitMethod {
    type Err = ParseSplitMethodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "median" => Ok(SplitMethod::Median),
            "sah" => Ok(SplitMethod::Sah),
            _ => Err(ParseSplitMethodError(s.to_owned())),
        }
    }
}

impl Display for SplitMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SplitMethod::Median => f.write_str(MedianSplit.name()),
            SplitMethod::Sah => f.write_str(SahSplit.name()),
        }
    }
}

/// Creates an empty hierarchy using the given split method.
pub fn new_acceleration_structure(
    method: SplitMethod,
    settings: BuildSettings,
) -> Box<dyn AccelerationStructure + Send + Sync> {
    match method {
        SplitMethod::Median => Box::new(MedianBvh::new(MedianSplit, settings)),
        SplitMethod::Sah => Box::new(SahBvh::new(SahSplit, settings)),
    }
}
