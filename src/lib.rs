pub mod bvh;
pub mod geometry;
pub mod intersection;
pub mod mesh;
mod util;

pub use bvh::{
    AccelerationStructure, BuildError, BuildSettings, Bvh, MedianBvh, SahBvh, SplitMethod,
    new_acceleration_structure,
};
pub use intersection::{HostIntersector, RayHit, RayIntersector, RayPayload};
pub use mesh::{Mesh, MeshTriangle};
pub use util::Summary;
