use std::ops::{Add, Index, IndexMut, Mul};

use num_traits::One;

use super::{FloatType, WorldBox, WorldPoint, WorldVector};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Triangle<Point>([Point; 3]);

impl<Point> Triangle<Point> {
    pub fn new(a: Point, b: Point, c: Point) -> Triangle<Point> {
        Triangle([a, b, c])
    }

    pub fn iter<'a>(&'a self) -> impl Iterator<Item = &'a Point> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        3
    }

    pub fn map<Point2, F: FnMut(&Point) -> Point2>(&self, mut f: F) -> Triangle<Point2> {
        Triangle([f(&self[0]), f(&self[1]), f(&self[2])])
    }
}

impl<Point> Index<usize> for Triangle<Point> {
    type Output = Point;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl<Point> IndexMut<usize> for Triangle<Point> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0[index]
    }
}

impl Triangle<WorldPoint> {
    /// Average of the three vertices.
    pub fn centroid(&self) -> WorldPoint {
        WorldPoint::from(self.iter().map(|p| p.coords).sum::<WorldVector>() / (self.len() as FloatType))
    }

    /// Returns edge vectors, coming from self[0]
    pub fn edges(&self) -> [WorldVector; 2] {
        [self[1] - self[0], self[2] - self[0]]
    }

    /// Returns a normal vector of the triangle, not normalized.
    /// Zero for degenerate triangles.
    pub fn normal(&self) -> WorldVector {
        let [e1, e2] = self.edges();
        e1.cross(&e2)
    }

    pub fn bounding_box(&self) -> WorldBox {
        WorldBox::from_points(self.iter())
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct BarycentricCoordinates<T> {
    pub u: T,
    pub v: T,
}

impl<T> BarycentricCoordinates<T>
where
    T: One + Copy + std::ops::Sub<Output = T>,
{
    pub fn interpolate<T2>(&self, a: &T2, b: &T2, c: &T2) -> T2
    where
        for<'a> &'a T2: Mul<T, Output = T2>,
        T2: Add<Output = T2>,
    {
        let w = T::one() - self.u - self.v;
        a * w + b * self.u + c * self.v
    }

    pub fn interpolate_triangle<T2>(&self, triangle: &Triangle<T2>) -> T2
    where
        for<'a> &'a T2: Mul<T, Output = T2>,
        T2: Add<Output = T2>,
    {
        self.interpolate(&triangle[0], &triangle[1], &triangle[2])
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::test::triangle;

    use assert2::assert;
    use test_strategy::proptest;

    fn right_triangle() -> Triangle<WorldPoint> {
        Triangle::new(
            WorldPoint::new(0.0, 0.0, 0.0),
            WorldPoint::new(3.0, 0.0, 0.0),
            WorldPoint::new(0.0, 3.0, 0.0),
        )
    }

    #[test]
    fn centroid_and_normal() {
        let t = right_triangle();
        assert!(t.centroid() == WorldPoint::new(1.0, 1.0, 0.0));
        assert!(t.normal() == WorldVector::new(0.0, 0.0, 9.0));
    }

    #[test]
    fn degenerate_triangle_has_flat_box() {
        let p = WorldPoint::new(1.0, 2.0, 3.0);
        let t = Triangle::new(p, p, p);
        let b = t.bounding_box();
        assert!(b.min == p);
        assert!(b.max == p);
        assert!(t.normal() == WorldVector::zeros());
    }

    #[test]
    fn interpolate_vertices() {
        let t = right_triangle().map(|p| p.coords);
        let at_b = BarycentricCoordinates { u: 1.0f32, v: 0.0 }.interpolate_triangle(&t);
        let at_c = BarycentricCoordinates { u: 0.0f32, v: 1.0 }.interpolate_triangle(&t);
        assert!(at_b == WorldVector::new(3.0, 0.0, 0.0));
        assert!(at_c == WorldVector::new(0.0, 3.0, 0.0));
    }

    #[proptest]
    fn bounding_box_contains_vertices_and_centroid(#[strategy(triangle())] t: Triangle<WorldPoint>) {
        let b = t.bounding_box();
        for p in t.iter() {
            assert!(b.contains_point(p));
        }
        let c = t.centroid();
        let tolerance = 1e-3;
        for i in 0..3 {
            assert!(c[i] >= b.min[i] - tolerance && c[i] <= b.max[i] + tolerance);
        }
    }
}
