mod aabb;
mod ray_box_intersection;
mod ray_triangle_intersection;
mod triangle;

pub use aabb::AABB;
pub use ray_box_intersection::RayIntersectionExt;
pub use ray_triangle_intersection::TriangleHit;
pub use triangle::{BarycentricCoordinates, Triangle};

pub type FloatType = f32;
pub const EPSILON: FloatType = 1e-6;

pub type WorldPoint = nalgebra::Point3<FloatType>;
pub type WorldVector = nalgebra::Vector3<FloatType>;
pub type WorldBox = AABB<WorldPoint>;
pub type TexturePoint = nalgebra::Point2<FloatType>;

/// One of the three coordinate axes of the world space.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Axis {
    X = 0,
    Y = 1,
    Z = 2,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn try_from_index(index: usize) -> Option<Axis> {
        Axis::ALL.get(index).copied()
    }

    /// Panics if the index is not 0, 1 or 2.
    pub fn from_index(index: usize) -> Axis {
        match Axis::try_from_index(index) {
            Some(axis) => axis,
            None => panic!("Axis index out of range: {index}"),
        }
    }

    /// The other two axes, in cyclic order.
    pub fn others(self) -> [Axis; 2] {
        [
            Axis::from_index((self.index() + 1) % 3),
            Axis::from_index((self.index() + 2) % 3),
        ]
    }
}

#[derive(Copy, Clone, Debug)]
pub struct Ray {
    pub origin: WorldPoint,
    /// Normalized direction of the ray
    pub direction: WorldVector,

    /// Componentwise inverse of the ray direction
    /// Zeros in direction get turned into positive infinity regardless of the sign of the zero
    pub inv_direction: WorldVector,
}

impl Ray {
    pub fn new(origin: WorldPoint, direction: WorldVector) -> Ray {
        let direction = direction.normalize();
        let inv_direction = direction.map(|x| if x == 0.0 { FloatType::INFINITY } else { 1.0 / x });

        Ray {
            origin,
            direction,
            inv_direction,
        }
    }

    #[cfg(test)]
    pub fn point_at(&self, distance: FloatType) -> WorldPoint {
        self.origin + self.direction * distance
    }

    /// True if the ray travels towards negative coordinates along the axis.
    pub fn is_negative(&self, axis: Axis) -> bool {
        self.inv_direction[axis.index()] < 0.0
    }
}
