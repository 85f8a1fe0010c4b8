use num_traits::One;
use std::ops::Sub;

use nalgebra::{ClosedAddAssign, ClosedDivAssign, Point, Scalar};

use super::{Axis, FloatType, WorldBox, WorldPoint, WorldVector};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AABB<Point> {
    pub min: Point,
    pub max: Point,
}

impl<Point> AABB<Point> {
    pub fn new(min: Point, max: Point) -> AABB<Point> {
        AABB { min, max }
    }
}

impl<Point: Sub + Copy> AABB<Point> {
    pub fn size(&self) -> Point::Output {
        self.max - self.min
    }
}

impl<T: Scalar + ClosedAddAssign + ClosedDivAssign + One, const D: usize> AABB<Point<T, D>> {
    pub fn center(&self) -> Point<T, D> {
        let two = T::one() + T::one();
        let avg_coords = (&self.min.coords + &self.max.coords) / two;
        Point::from(avg_coords)
    }
}

impl WorldBox {
    /// Box that contains nothing. Identity element of `union`.
    pub fn empty() -> WorldBox {
        AABB {
            min: WorldPoint::from(WorldVector::repeat(FloatType::INFINITY)),
            max: WorldPoint::from(WorldVector::repeat(FloatType::NEG_INFINITY)),
        }
    }

    /// Smallest box containing all the points, empty box if there are none.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a WorldPoint>) -> WorldBox {
        points.into_iter().fold(WorldBox::empty(), |mut bounds, point| {
            bounds.grow(point);
            bounds
        })
    }

    pub fn is_empty(&self) -> bool {
        self.min
            .iter()
            .zip(self.max.iter())
            .any(|(min, max)| min > max)
    }

    pub fn grow(&mut self, point: &WorldPoint) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }

    pub fn union(&self, other: &WorldBox) -> WorldBox {
        AABB {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    pub fn contains_point(&self, point: &WorldPoint) -> bool {
        (0..3).all(|i| self.min[i] <= point[i] && point[i] <= self.max[i])
    }

    /// Empty boxes are contained in everything, an empty box contains only empty boxes.
    pub fn contains(&self, other: &WorldBox) -> bool {
        if other.is_empty() {
            return true;
        }
        self.contains_point(&other.min) && self.contains_point(&other.max)
    }

    /// True if the two boxes share at least one point (touching faces count).
    pub fn overlaps(&self, other: &WorldBox) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && (0..3).all(|i| self.min[i] <= other.max[i] && other.min[i] <= self.max[i])
    }

    pub fn surface_area(&self) -> FloatType {
        if self.is_empty() {
            return 0.0;
        }
        let size = self.size();
        2.0 * (size.x * size.y + size.y * size.z + size.z * size.x)
    }

    /// Axis along which the box is the longest. Ties go to the earlier axis.
    pub fn largest_axis(&self) -> Axis {
        let size = self.size();
        let mut best = Axis::X;
        for axis in [Axis::Y, Axis::Z] {
            if size[axis.index()] > size[best.index()] {
                best = axis;
            }
        }
        best
    }

    /// Extent of the box along a single axis, zero for empty boxes.
    pub fn extent(&self, axis: Axis) -> FloatType {
        if self.is_empty() {
            0.0
        } else {
            self.max[axis.index()] - self.min[axis.index()]
        }
    }
}
