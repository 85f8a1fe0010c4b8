use arrayvec::ArrayVec;
use bytemuck::{Pod, Zeroable};
use thiserror::Error;

use crate::{
    bvh::{LinearBvhNode, MAX_DEPTH_LIMIT, NodeKind},
    geometry::{FloatType, Ray, RayIntersectionExt as _, WorldPoint, WorldVector},
    mesh::MeshTriangle,
};

/// Pending nodes of a traversal, at most one per level plus the one being split.
const TRAVERSAL_STACK_SIZE: usize = MAX_DEPTH_LIMIT as usize + 1;

/// Ray as stored in a ray buffer.
/// Distances are measured along the normalized direction.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct RayPayload {
    pub origin: [f32; 3],
    pub t_min: f32,
    pub direction: [f32; 3],
    pub t_max: f32,
}

impl RayPayload {
    pub fn new(ray: &Ray, t_min: FloatType, t_max: FloatType) -> RayPayload {
        RayPayload {
            origin: ray.origin.coords.into(),
            t_min,
            direction: ray.direction.into(),
            t_max,
        }
    }

    pub fn ray(&self) -> Ray {
        Ray::new(
            WorldPoint::from(self.origin),
            WorldVector::from(self.direction),
        )
    }
}

/// Result of intersecting a single ray, `primitive` is `RayHit::MISS` if nothing was hit.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct RayHit {
    pub t: f32,
    pub u: f32,
    pub v: f32,
    pub primitive: u32,
}

impl RayHit {
    pub const MISS: u32 = u32::MAX;

    pub fn miss() -> RayHit {
        RayHit {
            t: FloatType::INFINITY,
            u: 0.0,
            v: 0.0,
            primitive: Self::MISS,
        }
    }

    pub fn is_hit(&self) -> bool {
        self.primitive != Self::MISS
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntersectError {
    #[error("Ray counter buffer is empty")]
    MissingRayCounter,

    #[error("Ray buffer holds {available} rays, {required} requested")]
    RayBufferTooSmall { available: usize, required: usize },

    #[error("Hit buffer holds {available} records, {required} required")]
    HitBufferTooSmall { available: usize, required: usize },
}

/// Batched ray queries against a built hierarchy.
///
/// Buffers are owned by the backend, the host implementation uses plain vectors while
/// device backends use their own buffer handles.
pub trait RayIntersector {
    type Buffer<T: Pod + Send + Sync>;

    /// Intersect the first `min(ray_counter[0], max_ray_count)` rays and store one record
    /// per ray into `hits`.
    /// With `closest_hit` unset the traversal stops at the first hit found, which is
    /// enough for occlusion queries.
    fn intersect_rays(
        &self,
        rays: &Self::Buffer<RayPayload>,
        ray_counter: &Self::Buffer<u32>,
        max_ray_count: u32,
        hits: &mut Self::Buffer<RayHit>,
        closest_hit: bool,
    ) -> Result<(), IntersectError>;
}

/// Traverses the hierarchy on the calling thread.
#[derive(Copy, Clone, Debug)]
pub struct HostIntersector<'a> {
    nodes: &'a [LinearBvhNode],
    triangles: &'a [MeshTriangle],
}

impl<'a> HostIntersector<'a> {
    /// `triangles` must be the slice the hierarchy was built over, in the order the
    /// build left them in.
    ///
    /// `nodes` are expected to pass `validate_layout` with a depth of at most
    /// `MAX_DEPTH_LIMIT`. Traversal of other arrays doesn't panic, but nodes that don't
    /// decode, links outside of either slice and subtrees deeper than the traversal
    /// stack are skipped.
    pub fn new(nodes: &'a [LinearBvhNode], triangles: &'a [MeshTriangle]) -> Self {
        HostIntersector { nodes, triangles }
    }

    /// Closest hit within `t_min..=t_max`, or any hit if `closest_hit` is false.
    pub fn intersect(
        &self,
        ray: &Ray,
        t_min: FloatType,
        t_max: FloatType,
        closest_hit: bool,
    ) -> RayHit {
        let mut best = RayHit::miss();
        let mut t_max = t_max;

        if self.nodes.is_empty() {
            return best;
        }

        let mut stack = ArrayVec::<usize, TRAVERSAL_STACK_SIZE>::new();
        stack.push(0);

        while let Some(index) = stack.pop() {
            let Some(node) = self.nodes.get(index) else {
                continue;
            };
            let (t1, t2) = node.bounds().intersect(ray);
            if t1.max(t_min) > t2.min(t_max) {
                continue;
            }

            match node.kind() {
                Some(NodeKind::Leaf { first, count }) => {
                    let first = first as usize;
                    let Some(triangles) = self.triangles.get(first..first + count as usize)
                    else {
                        continue;
                    };
                    for (i, triangle) in triangles.iter().enumerate() {
                        let Some(hit) = triangle.positions().intersect(ray, t_min, t_max) else {
                            continue;
                        };
                        if hit.t >= best.t {
                            continue;
                        }

                        t_max = hit.t;
                        best = RayHit {
                            t: hit.t,
                            u: hit.uv.u,
                            v: hit.uv.v,
                            primitive: (first + i) as u32,
                        };
                        if !closest_hit {
                            return best;
                        }
                    }
                }
                Some(NodeKind::Inner { axis, second_child }) => {
                    let first_child = index + 1;
                    let second_child = second_child as usize;
                    let (near, far) = if ray.is_negative(axis) {
                        (second_child, first_child)
                    } else {
                        (first_child, second_child)
                    };
                    for child in [far, near] {
                        if stack.try_push(child).is_err() {
                            break;
                        }
                    }
                }
                None => {}
            }
        }

        best
    }
}

impl RayIntersector for HostIntersector<'_> {
    type Buffer<T: Pod + Send + Sync> = Vec<T>;

    fn intersect_rays(
        &self,
        rays: &Vec<RayPayload>,
        ray_counter: &Vec<u32>,
        max_ray_count: u32,
        hits: &mut Vec<RayHit>,
        closest_hit: bool,
    ) -> Result<(), IntersectError> {
        let counter = *ray_counter.first().ok_or(IntersectError::MissingRayCounter)?;
        let count = counter.min(max_ray_count) as usize;

        if rays.len() < count {
            return Err(IntersectError::RayBufferTooSmall {
                available: rays.len(),
                required: count,
            });
        }
        if hits.len() < count {
            return Err(IntersectError::HitBufferTooSmall {
                available: hits.len(),
                required: count,
            });
        }

        for (payload, hit) in rays[..count].iter().zip(hits.iter_mut()) {
            *hit = self.intersect(&payload.ray(), payload.t_min, payload.t_max, closest_hit);
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        bvh::{AccelerationStructure as _, BuildSettings, SplitMethod, new_acceleration_structure},
        geometry::Axis,
    };

    use assert2::{assert, let_assert};
    use rand::{Rng as _, SeedableRng as _, rngs::SmallRng};
    use test_case::test_case;

    fn random_point(rng: &mut SmallRng, extent: f32) -> WorldPoint {
        WorldPoint::new(
            rng.random_range(-extent..extent),
            rng.random_range(-extent..extent),
            rng.random_range(-extent..extent),
        )
    }

    fn random_mesh(rng: &mut SmallRng, count: usize) -> Vec<MeshTriangle> {
        (0..count)
            .map(|_| {
                let center = random_point(rng, 20.0);
                MeshTriangle::from_positions(
                    center + random_point(rng, 2.0).coords,
                    center + random_point(rng, 2.0).coords,
                    center + random_point(rng, 2.0).coords,
                )
            })
            .collect()
    }

    fn brute_force(triangles: &[MeshTriangle], ray: &Ray, t_max: FloatType) -> Option<FloatType> {
        triangles
            .iter()
            .filter_map(|t| t.positions().intersect(ray, 0.0, t_max))
            .map(|hit| hit.t)
            .min_by(FloatType::total_cmp)
    }

    #[test_case(SplitMethod::Median)]
    #[test_case(SplitMethod::Sah)]
    fn agrees_with_brute_force(method: SplitMethod) {
        let mut rng = SmallRng::seed_from_u64(42);
        let mut triangles = random_mesh(&mut rng, 500);
        let settings = BuildSettings::builder()
            .max_leaf_size(2)
            .parallel(false)
            .build()
            .unwrap();
        let mut bvh = new_acceleration_structure(method, settings);
        let_assert!(Ok(()) = bvh.build_cpu(&mut triangles));

        let intersector = HostIntersector::new(bvh.nodes(), &triangles);
        let mut hit_count = 0;
        for i in 0..2000 {
            let origin = random_point(&mut rng, 30.0);
            let direction = if i % 2 == 0 {
                // Aim at a triangle
                triangles[rng.random_range(0..triangles.len())].positions().centroid() - origin
            } else {
                random_point(&mut rng, 1.0).coords
            };
            if direction.norm_squared() == 0.0 {
                continue;
            }
            let ray = Ray::new(origin, direction);

            let hit = intersector.intersect(&ray, 0.0, FloatType::INFINITY, true);
            match brute_force(&triangles, &ray, FloatType::INFINITY) {
                Some(t) => {
                    hit_count += 1;
                    assert!(hit.is_hit());
                    assert!((hit.t - t).abs() <= 1e-4 * t.max(1.0));
                    let_assert!(
                        Some(own) = triangles[hit.primitive as usize]
                            .positions()
                            .intersect(&ray, 0.0, FloatType::INFINITY)
                    );
                    assert!(own.t == hit.t);
                }
                None => assert!(!hit.is_hit()),
            }
        }
        assert!(hit_count > 500);
    }

    fn single_triangle_scene() -> Vec<MeshTriangle> {
        vec![MeshTriangle::from_positions(
            WorldPoint::new(-1.0, -1.0, 5.0),
            WorldPoint::new(1.0, -1.0, 5.0),
            WorldPoint::new(0.0, 1.0, 5.0),
        )]
    }

    fn forward_ray(t_max: f32) -> RayPayload {
        RayPayload::new(
            &Ray::new(WorldPoint::origin(), WorldVector::new(0.0, 0.0, 1.0)),
            0.0,
            t_max,
        )
    }

    #[test]
    fn batch_respects_counter_and_limits() {
        let mut triangles = single_triangle_scene();
        let mut bvh = new_acceleration_structure(SplitMethod::Sah, BuildSettings::default());
        let_assert!(Ok(()) = bvh.build_cpu(&mut triangles));
        let intersector = HostIntersector::new(bvh.nodes(), &triangles);

        let rays = vec![forward_ray(10.0), forward_ray(2.0), forward_ray(10.0)];
        let mut hits = vec![RayHit::zeroed(); 3];
        let_assert!(Ok(()) = intersector.intersect_rays(&rays, &vec![5], 2, &mut hits, true));

        assert!(hits[0].is_hit());
        assert!(hits[0].primitive == 0);
        assert!((hits[0].t - 5.0).abs() < 1e-5);
        assert!(hits[1] == RayHit::miss());
        // Beyond the ray count, left untouched
        assert!(hits[2] == RayHit::zeroed());
    }

    #[test]
    fn any_hit_stops_early() {
        let mut triangles = single_triangle_scene();
        triangles.push(MeshTriangle::from_positions(
            WorldPoint::new(-1.0, -1.0, 3.0),
            WorldPoint::new(1.0, -1.0, 3.0),
            WorldPoint::new(0.0, 1.0, 3.0),
        ));
        let mut bvh = new_acceleration_structure(SplitMethod::Median, BuildSettings::default());
        let_assert!(Ok(()) = bvh.build_cpu(&mut triangles));
        let intersector = HostIntersector::new(bvh.nodes(), &triangles);
        let ray = forward_ray(10.0).ray();

        let closest = intersector.intersect(&ray, 0.0, 10.0, true);
        assert!((closest.t - 3.0).abs() < 1e-5);
        let any = intersector.intersect(&ray, 0.0, 10.0, false);
        assert!(any.is_hit());
    }

    #[test]
    fn unbuilt_hierarchy_misses() {
        let intersector = HostIntersector::new(&[], &[]);
        let ray = forward_ray(10.0).ray();
        assert!(intersector.intersect(&ray, 0.0, 10.0, true) == RayHit::miss());
    }

    #[test]
    fn malformed_nodes_do_not_panic() {
        let triangles = single_triangle_scene();
        let bounds = triangles[0].bounding_box();
        let ray = forward_ray(10.0).ray();

        let mut invalid_axis = [LinearBvhNode::new_inner(&bounds, Axis::X, 1)];
        let words: &mut [u32] = bytemuck::cast_slice_mut(&mut invalid_axis[..]);
        words[7] = 3;
        let intersector = HostIntersector::new(&invalid_axis, &triangles);
        assert!(intersector.intersect(&ray, 0.0, 10.0, true) == RayHit::miss());

        let dangling = [
            LinearBvhNode::new_inner(&bounds, Axis::X, 40),
            LinearBvhNode::new_leaf(&bounds, 0, 9),
        ];
        let intersector = HostIntersector::new(&dangling, &triangles);
        assert!(intersector.intersect(&ray, 0.0, 10.0, true) == RayHit::miss());
    }

    #[test]
    fn chain_deeper_than_stack_still_terminates() {
        // Every inner node has the next one as first child and the single leaf as second
        let triangles = single_triangle_scene();
        let bounds = triangles[0].bounding_box();
        let chain_length = 2 * TRAVERSAL_STACK_SIZE;
        let mut nodes: Vec<LinearBvhNode> = (0..chain_length)
            .map(|_| LinearBvhNode::new_inner(&bounds, Axis::X, chain_length as u32))
            .collect();
        nodes.push(LinearBvhNode::new_leaf(&bounds, 0, 1));

        let intersector = HostIntersector::new(&nodes, &triangles);
        let hit = intersector.intersect(&forward_ray(10.0).ray(), 0.0, 10.0, true);
        assert!(hit.primitive == 0);
    }

    #[test]
    fn buffer_errors() {
        let intersector = HostIntersector::new(&[], &[]);
        let rays = vec![forward_ray(1.0); 4];
        let mut hits = vec![RayHit::miss(); 2];

        assert!(
            intersector.intersect_rays(&rays, &vec![], 4, &mut hits, true)
                == Err(IntersectError::MissingRayCounter)
        );
        assert!(
            intersector.intersect_rays(&rays, &vec![4], 4, &mut hits, true)
                == Err(IntersectError::HitBufferTooSmall {
                    available: 2,
                    required: 4
                })
        );
        assert!(
            intersector.intersect_rays(&rays, &vec![8], 6, &mut vec![RayHit::miss(); 8], true)
                == Err(IntersectError::RayBufferTooSmall {
                    available: 4,
                    required: 6
                })
        );
    }

    #[test]
    fn payload_round_trip_keeps_ray() {
        let ray = Ray::new(WorldPoint::new(1.0, 2.0, 3.0), WorldVector::new(0.0, 3.0, 4.0));
        let payload = RayPayload::new(&ray, 0.5, 7.0);
        assert!(payload.direction == [0.0, 0.6, 0.8]);
        assert!(payload.ray().origin == ray.origin);
        let words: &[f32] = bytemuck::cast_slice(bytemuck::bytes_of(&payload));
        assert!(words[3] == 0.5);
        assert!(words[7] == 7.0);
    }
}
