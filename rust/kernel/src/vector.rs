// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Points and vectors in two and three dimensions.
//!
//! Points and vectors are distinct types: subtracting two points yields a
//! vector, adding a vector to a point yields a point. Equality is exact
//! floating-point comparison; tolerances belong to the predicates that need
//! them.

use std::ops::{Add, AddAssign, Div, Index, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// A point in the plane.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

/// A displacement in the plane.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector2 {
    pub x: f64,
    pub y: f64,
}

/// A point in space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// A displacement in space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Position vector from the origin.
    pub fn to_vector(self) -> Vector2 {
        Vector2::new(self.x, self.y)
    }

    /// Midpoint between `self` and `other`.
    pub fn midpoint(self, other: Point2) -> Point2 {
        Point2::new((self.x + other.x) * 0.5, (self.y + other.y) * 0.5)
    }
}

impl Vector2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn dot(self, other: Vector2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Z component of the 3D cross product; positive when `other` turns
    /// counter-clockwise from `self`.
    pub fn cross(self, other: Vector2) -> f64 {
        self.x * other.y - self.y * other.x
    }

    pub fn squared_length(self) -> f64 {
        self.dot(self)
    }

    pub fn length(self) -> f64 {
        self.squared_length().sqrt()
    }
}

impl Point3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Position vector from the origin.
    pub fn to_vector(self) -> Vector3 {
        Vector3::new(self.x, self.y, self.z)
    }

    pub fn midpoint(self, other: Point3) -> Point3 {
        Point3::new(
            (self.x + other.x) * 0.5,
            (self.y + other.y) * 0.5,
            (self.z + other.z) * 0.5,
        )
    }

    /// Returns a copy with coordinate `i` set to `value`.
    ///
    /// # Panics
    ///
    /// Panics if `i > 2`.
    pub fn with_coord(self, i: usize, value: f64) -> Point3 {
        let mut result = self;
        match i {
            0 => result.x = value,
            1 => result.y = value,
            2 => result.z = value,
            _ => panic!("Point3 coordinate index out of range: {}", i),
        }
        result
    }
}

impl Vector3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: Vector3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Vector3) -> Vector3 {
        Vector3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn squared_length(self) -> f64 {
        self.dot(self)
    }

    pub fn length(self) -> f64 {
        self.squared_length().sqrt()
    }

    /// Index of the component with the largest magnitude.
    pub fn largest_axis(self) -> usize {
        let (ax, ay, az) = (self.x.abs(), self.y.abs(), self.z.abs());
        if ax >= ay && ax >= az {
            0
        } else if ay >= az {
            1
        } else {
            2
        }
    }
}

impl Index<usize> for Point2 {
    type Output = f64;

    fn index(&self, i: usize) -> &f64 {
        match i {
            0 => &self.x,
            1 => &self.y,
            _ => panic!("Point2 coordinate index out of range: {}", i),
        }
    }
}

impl Index<usize> for Vector2 {
    type Output = f64;

    fn index(&self, i: usize) -> &f64 {
        match i {
            0 => &self.x,
            1 => &self.y,
            _ => panic!("Vector2 coordinate index out of range: {}", i),
        }
    }
}

impl Index<usize> for Point3 {
    type Output = f64;

    fn index(&self, i: usize) -> &f64 {
        match i {
            0 => &self.x,
            1 => &self.y,
            2 => &self.z,
            _ => panic!("Point3 coordinate index out of range: {}", i),
        }
    }
}

impl Index<usize> for Vector3 {
    type Output = f64;

    fn index(&self, i: usize) -> &f64 {
        match i {
            0 => &self.x,
            1 => &self.y,
            2 => &self.z,
            _ => panic!("Vector3 coordinate index out of range: {}", i),
        }
    }
}

// --- 2D arithmetic ---

impl Sub for Point2 {
    type Output = Vector2;

    fn sub(self, rhs: Point2) -> Vector2 {
        Vector2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Add<Vector2> for Point2 {
    type Output = Point2;

    fn add(self, rhs: Vector2) -> Point2 {
        Point2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub<Vector2> for Point2 {
    type Output = Point2;

    fn sub(self, rhs: Vector2) -> Point2 {
        Point2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Add for Vector2 {
    type Output = Vector2;

    fn add(self, rhs: Vector2) -> Vector2 {
        Vector2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vector2 {
    fn add_assign(&mut self, rhs: Vector2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vector2 {
    type Output = Vector2;

    fn sub(self, rhs: Vector2) -> Vector2 {
        Vector2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Vector2 {
    type Output = Vector2;

    fn neg(self) -> Vector2 {
        Vector2::new(-self.x, -self.y)
    }
}

impl Mul<f64> for Vector2 {
    type Output = Vector2;

    fn mul(self, rhs: f64) -> Vector2 {
        Vector2::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f64> for Vector2 {
    type Output = Vector2;

    fn div(self, rhs: f64) -> Vector2 {
        Vector2::new(self.x / rhs, self.y / rhs)
    }
}

// --- 3D arithmetic ---

impl Sub for Point3 {
    type Output = Vector3;

    fn sub(self, rhs: Point3) -> Vector3 {
        Vector3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Add<Vector3> for Point3 {
    type Output = Point3;

    fn add(self, rhs: Vector3) -> Point3 {
        Point3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub<Vector3> for Point3 {
    type Output = Point3;

    fn sub(self, rhs: Vector3) -> Point3 {
        Point3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Add for Vector3 {
    type Output = Vector3;

    fn add(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vector3 {
    fn add_assign(&mut self, rhs: Vector3) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl Sub for Vector3 {
    type Output = Vector3;

    fn sub(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Neg for Vector3 {
    type Output = Vector3;

    fn neg(self) -> Vector3 {
        Vector3::new(-self.x, -self.y, -self.z)
    }
}

impl Mul<f64> for Vector3 {
    type Output = Vector3;

    fn mul(self, rhs: f64) -> Vector3 {
        Vector3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Div<f64> for Vector3 {
    type Output = Vector3;

    fn div(self, rhs: f64) -> Vector3 {
        Vector3::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_difference_is_vector() {
        let v = Point3::new(3.0, 2.0, 1.0) - Point3::new(1.0, 1.0, 1.0);
        assert_eq!(v, Vector3::new(2.0, 1.0, 0.0));
        assert_eq!(Point3::new(1.0, 1.0, 1.0) + v, Point3::new(3.0, 2.0, 1.0));
    }

    #[test]
    fn cross_follows_right_hand_rule() {
        let x = Vector3::new(1.0, 0.0, 0.0);
        let y = Vector3::new(0.0, 1.0, 0.0);
        assert_eq!(x.cross(y), Vector3::new(0.0, 0.0, 1.0));
        assert_eq!(Vector2::new(1.0, 0.0).cross(Vector2::new(0.0, 1.0)), 1.0);
    }

    #[test]
    fn index_reads_coordinates() {
        let p = Point3::new(4.0, 5.0, 6.0);
        assert_eq!(p[0], 4.0);
        assert_eq!(p[2], 6.0);
        assert_eq!(Vector2::new(7.0, 8.0)[1], 8.0);
    }

    #[test]
    #[should_panic]
    fn index_out_of_range_panics() {
        let p = Point2::new(1.0, 2.0);
        let _ = p[2];
    }

    #[test]
    fn largest_axis_picks_magnitude() {
        assert_eq!(Vector3::new(0.1, -3.0, 2.0).largest_axis(), 1);
        assert_eq!(Vector3::new(0.0, 0.0, -1.0).largest_axis(), 2);
    }

    #[test]
    fn with_coord_replaces_one_axis() {
        let p = Point3::new(1.0, 2.0, 3.0).with_coord(1, 9.0);
        assert_eq!(p, Point3::new(1.0, 9.0, 3.0));
    }
}
