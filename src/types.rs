//! Common geometry types and traits shared by the packing stages.
//!
//! All lengths are millimetres and all weights kilograms. The frame is
//! pallet-centric: `x` runs along the pallet width, `z` along the pallet
//! depth and `y` is vertical, measured from the floor.

use std::ops::{Add, Mul, Sub};

/// Global numerical tolerance for floating-point comparisons.
pub const EPSILON_GENERAL: f64 = 1e-6;

/// Tolerance for matching layer heights.
///
/// Slightly larger than [`EPSILON_GENERAL`] because heights accumulate
/// through the layer cursor.
pub const EPSILON_HEIGHT: f64 = 1e-3;

/// A 3D vector or point.
///
/// Used both for positions (minimum corner of a box) and for oriented
/// extents, where `x` is the footprint width, `y` the vertical height and
/// `z` the footprint depth.
///
/// # Examples
/// ```
/// use auto_pallet::types::Vec3;
///
/// let position = Vec3::new(-200.0, 150.0, -150.0);
/// let extents = Vec3::new(400.0, 200.0, 300.0);
/// let center = position + extents * 0.5;
/// assert_eq!(center, Vec3::new(0.0, 250.0, 0.0));
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Creates a new vector.
    ///
    /// # Parameters
    /// * `x` - width axis
    /// * `y` - vertical axis
    /// * `z` - depth axis
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The origin: pallet center at floor level.
    #[inline]
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Converts to tuple format for serialization.
    #[inline]
    pub const fn as_tuple(&self) -> (f64, f64, f64) {
        (self.x, self.y, self.z)
    }

    /// Product of all components.
    #[inline]
    pub fn volume(&self) -> f64 {
        self.x * self.y * self.z
    }

    /// Horizontal area (`x` × `z`).
    #[inline]
    pub fn footprint_area(&self) -> f64 {
        self.x * self.z
    }
}

impl Add for Vec3 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;

    #[inline]
    fn mul(self, scalar: f64) -> Self::Output {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

/// Objects with oriented 3D extents.
pub trait Dimensional {
    /// Returns the extents (`x` width, `y` height, `z` depth).
    fn dimensions(&self) -> Vec3;

    fn volume(&self) -> f64 {
        self.dimensions().volume()
    }
}

/// Objects with weight.
pub trait Weighted {
    /// Returns the weight in kg.
    fn weight(&self) -> f64;
}

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner (position)
    pub min: Vec3,
    /// Maximum corner (position + extents)
    pub max: Vec3,
}

impl BoundingBox {
    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Creates a bounding box from a minimum corner and extents.
    #[inline]
    pub fn from_position_and_dims(position: Vec3, dims: Vec3) -> Self {
        Self {
            min: position,
            max: position + dims,
        }
    }

    /// Checks whether the horizontal footprints (x and z ranges) overlap.
    ///
    /// Touching edges do not count as overlap.
    #[inline]
    pub fn footprints_overlap(&self, other: &Self, tolerance: f64) -> bool {
        !(self.max.x <= other.min.x + tolerance
            || other.max.x <= self.min.x + tolerance
            || self.max.z <= other.min.z + tolerance
            || other.max.z <= self.min.z + tolerance)
    }

    /// Overlap area in the horizontal plane.
    #[inline]
    pub fn overlap_area_xz(&self, other: &Self) -> f64 {
        let overlap_x = crate::geometry::overlap_1d(self.min.x, self.max.x, other.min.x, other.max.x);
        let overlap_z = crate::geometry::overlap_1d(self.min.z, self.max.z, other.min.z, other.max.z);
        overlap_x * overlap_z
    }

    /// Grows this box so that it also encloses `other`.
    #[inline]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: Vec3::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            max: Vec3::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        }
    }

    /// Returns the extents.
    #[inline]
    pub fn dimensions(&self) -> Vec3 {
        self.max - self.min
    }
}

/// Accumulates weighted horizontal positions for a center of mass.
#[derive(Clone, Debug, Default)]
pub struct CenterOfMassCalculator {
    weighted_x: f64,
    weighted_z: f64,
    total_weight: f64,
}

impl CenterOfMassCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a point with its weight.
    pub fn add_point(&mut self, x: f64, z: f64, weight: f64) {
        self.weighted_x += x * weight;
        self.weighted_z += z * weight;
        self.total_weight += weight;
    }

    /// Returns `Some((x, z))`, or `None` when no weight was added.
    pub fn compute(&self) -> Option<(f64, f64)> {
        if self.total_weight <= 0.0 {
            None
        } else {
            Some((
                self.weighted_x / self.total_weight,
                self.weighted_z / self.total_weight,
            ))
        }
    }

    /// Horizontal distance of the center of mass to a reference point.
    pub fn distance_to(&self, reference: (f64, f64)) -> f64 {
        match self.compute() {
            Some((cx, cz)) => {
                let dx = cx - reference.0;
                let dz = cz - reference.1;
                (dx * dx + dz * dz).sqrt()
            }
            None => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_operations() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);

        assert_eq!(a + b, Vec3::new(5.0, 7.0, 9.0));
        assert_eq!(b - a, Vec3::new(3.0, 3.0, 3.0));
        assert_eq!(a * 2.0, Vec3::new(2.0, 4.0, 6.0));
    }

    #[test]
    fn test_vec3_volume_and_footprint() {
        let dims = Vec3::new(400.0, 200.0, 300.0);
        assert!((dims.volume() - 24_000_000.0).abs() < EPSILON_GENERAL);
        assert!((dims.footprint_area() - 120_000.0).abs() < EPSILON_GENERAL);
    }

    #[test]
    fn test_footprints_overlap_ignores_height() {
        let a = BoundingBox::from_position_and_dims(Vec3::zero(), Vec3::new(10.0, 10.0, 10.0));
        let stacked = BoundingBox::from_position_and_dims(
            Vec3::new(5.0, 50.0, 5.0),
            Vec3::new(10.0, 10.0, 10.0),
        );
        let beside = BoundingBox::from_position_and_dims(
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(10.0, 10.0, 10.0),
        );

        assert!(a.footprints_overlap(&stacked, EPSILON_GENERAL));
        assert!(!a.footprints_overlap(&beside, EPSILON_GENERAL));
    }

    #[test]
    fn test_bounding_box_overlap_area() {
        let a = BoundingBox::from_position_and_dims(Vec3::zero(), Vec3::new(10.0, 10.0, 10.0));
        let b = BoundingBox::from_position_and_dims(
            Vec3::new(5.0, 0.0, 5.0),
            Vec3::new(10.0, 10.0, 10.0),
        );

        let overlap = a.overlap_area_xz(&b);
        assert!((overlap - 25.0).abs() < EPSILON_GENERAL); // 5x5 overlap
    }

    #[test]
    fn test_bounding_box_union() {
        let a = BoundingBox::from_position_and_dims(Vec3::zero(), Vec3::new(10.0, 10.0, 10.0));
        let b = BoundingBox::from_position_and_dims(
            Vec3::new(-5.0, 10.0, 2.0),
            Vec3::new(5.0, 5.0, 20.0),
        );
        let merged = a.union(&b);
        assert_eq!(merged.min, Vec3::new(-5.0, 0.0, 0.0));
        assert_eq!(merged.max, Vec3::new(10.0, 15.0, 22.0));
    }

    #[test]
    fn test_center_of_mass_calculator() {
        let mut calc = CenterOfMassCalculator::new();
        calc.add_point(0.0, 0.0, 10.0);
        calc.add_point(10.0, 0.0, 30.0);

        let center = calc.compute().unwrap();
        assert!((center.0 - 7.5).abs() < EPSILON_GENERAL);
        assert!((center.1 - 0.0).abs() < EPSILON_GENERAL);
        assert!((calc.distance_to((7.5, 4.0)) - 4.0).abs() < EPSILON_GENERAL);
    }

    #[test]
    fn test_center_of_mass_empty() {
        let calc = CenterOfMassCalculator::new();
        assert!(calc.compute().is_none());
        assert_eq!(calc.distance_to((1.0, 1.0)), 0.0);
    }
}
