use std::cmp::Ordering;

use index_vec::IndexVec;
use ordered_float::OrderedFloat;

use super::TriangleIdx;
use crate::{
    geometry::{Axis, WorldBox, WorldPoint},
    mesh::MeshTriangle,
};

/// Build-time stand-in for a triangle.
/// Splitting reorders these instead of the triangles themselves.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PrimitiveRef {
    pub triangle: TriangleIdx,
    pub centroid: WorldPoint,
    pub bounds: WorldBox,
}

impl PrimitiveRef {
    /// Total order of references, used when a range is split by count.
    /// Starts with the centroid coordinate along `axis`, ties are broken by the rest of
    /// the centroid and then by the bounds, so two references compare equal only if they
    /// are geometrically interchangeable.
    pub fn cmp_along(&self, other: &PrimitiveRef, axis: Axis) -> Ordering {
        let [second, third] = axis.others();
        let centroids = [axis, second, third]
            .into_iter()
            .map(|a| (self.centroid[a.index()], other.centroid[a.index()]));
        let corners = self
            .bounds
            .min
            .iter()
            .chain(self.bounds.max.iter())
            .zip(other.bounds.min.iter().chain(other.bounds.max.iter()))
            .map(|(a, b)| (*a, *b));

        centroids
            .chain(corners)
            .map(|(a, b)| OrderedFloat(a).cmp(&OrderedFloat(b)))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

#[derive(Clone, Debug, Default)]
pub struct PrimitiveTable {
    refs: IndexVec<TriangleIdx, PrimitiveRef>,
}

impl PrimitiveTable {
    /// Caller must make sure that the triangle count fits into `TriangleIdx`.
    pub fn new(triangles: &[MeshTriangle]) -> PrimitiveTable {
        PrimitiveTable {
            refs: triangles
                .iter()
                .enumerate()
                .map(|(i, triangle)| {
                    let positions = triangle.positions();
                    PrimitiveRef {
                        triangle: TriangleIdx::from_usize(i),
                        centroid: positions.centroid(),
                        bounds: positions.bounding_box(),
                    }
                })
                .collect(),
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [PrimitiveRef] {
        self.refs.as_raw_slice_mut()
    }

    /// Consumes the table, returning for each slot the index of the triangle that
    /// ended up in it.
    pub fn into_order(self) -> Vec<usize> {
        self.refs.iter().map(|r| r.triangle.index()).collect()
    }
}

/// Union of the bounds of all references.
pub fn bounds_of(refs: &[PrimitiveRef]) -> WorldBox {
    refs.iter()
        .fold(WorldBox::empty(), |acc, r| acc.union(&r.bounds))
}

/// Bounding box of reference centroids.
pub fn centroid_bounds(refs: &[PrimitiveRef]) -> WorldBox {
    WorldBox::from_points(refs.iter().map(|r| &r.centroid))
}

#[cfg(test)]
mod test {
    use super::*;

    use assert2::assert;

    fn triangles() -> Vec<MeshTriangle> {
        vec![
            MeshTriangle::from_positions(
                WorldPoint::new(0.0, 0.0, 0.0),
                WorldPoint::new(3.0, 0.0, 0.0),
                WorldPoint::new(0.0, 3.0, 0.0),
            ),
            MeshTriangle::from_positions(
                WorldPoint::new(-3.0, 1.0, 1.0),
                WorldPoint::new(-3.0, 1.0, 4.0),
                WorldPoint::new(-3.0, 4.0, 1.0),
            ),
        ]
    }

    #[test]
    fn table_caches_bounds_and_centroids() {
        let mut table = PrimitiveTable::new(&triangles());
        let refs = table.as_mut_slice();
        assert!(refs.len() == 2);

        assert!(refs[0].centroid == WorldPoint::new(1.0, 1.0, 0.0));
        assert!(refs[1].bounds.min == WorldPoint::new(-3.0, 1.0, 1.0));
        assert!(refs[1].bounds.max == WorldPoint::new(-3.0, 4.0, 4.0));

        assert!(bounds_of(refs).min == WorldPoint::new(-3.0, 0.0, 0.0));
        assert!(bounds_of(refs).max == WorldPoint::new(3.0, 4.0, 4.0));
        assert!(centroid_bounds(refs).min == WorldPoint::new(-3.0, 1.0, 0.0));
        assert!(bounds_of(&[]).is_empty());
    }

    #[test]
    fn order_follows_reordering() {
        let mut table = PrimitiveTable::new(&triangles());
        table.as_mut_slice().swap(0, 1);
        assert!(table.into_order() == vec![1, 0]);
    }

    #[test]
    fn order_starts_with_axis() {
        let table = PrimitiveTable::new(&triangles());
        let a = &table.refs[TriangleIdx::from_usize(0)];
        let b = &table.refs[TriangleIdx::from_usize(1)];
        assert!(b.cmp_along(a, Axis::Y) == Ordering::Greater);
        assert!(b.cmp_along(a, Axis::X) == Ordering::Less);
        assert!(a.cmp_along(b, Axis::X) == Ordering::Greater);
        assert!(a.cmp_along(a, Axis::Z) == Ordering::Equal);
    }

    #[test]
    fn equal_centroids_are_ordered_by_bounds() {
        let flat = MeshTriangle::from_positions(
            WorldPoint::new(-1.0, 1.0, 0.0),
            WorldPoint::new(3.0, 1.0, 0.0),
            WorldPoint::new(1.0, 1.0, 0.0),
        );
        let mut triangles = triangles();
        triangles.push(flat);
        // Same vertices in a different order
        triangles.push(MeshTriangle::from_positions(
            WorldPoint::new(0.0, 3.0, 0.0),
            WorldPoint::new(0.0, 0.0, 0.0),
            WorldPoint::new(3.0, 0.0, 0.0),
        ));
        let table = PrimitiveTable::new(&triangles);
        let original = &table.refs[TriangleIdx::from_usize(0)];
        let flat = &table.refs[TriangleIdx::from_usize(2)];
        let rotated = &table.refs[TriangleIdx::from_usize(3)];

        assert!(flat.centroid == original.centroid);
        assert!(flat.cmp_along(original, Axis::X) == Ordering::Less);
        assert!(original.cmp_along(flat, Axis::Y) == Ordering::Greater);
        assert!(rotated.cmp_along(original, Axis::Z) == Ordering::Equal);
    }
}
