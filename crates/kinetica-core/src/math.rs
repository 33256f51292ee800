//! Planar math primitives.
//!
//! This module provides the 2D vector conventions used throughout the engine
//! plus the small set of operations nalgebra does not expose directly:
//! scalar cross products, perpendiculars, planar affine transforms, body
//! poses, and axis-aligned rectangles.
//!
//! Conventions: y increases upward, angles are in radians and increase
//! counter-clockwise.

use nalgebra::Matrix2;
use serde::{Deserialize, Serialize};

/// 2D vector of `f64` components.
pub type Vec2 = nalgebra::Vector2<f64>;

/// Scalar cross product of two planar vectors.
///
/// Equals the z component of the 3D cross product, positive when `b` is
/// counter-clockwise from `a`.
#[inline]
pub fn cross(a: Vec2, b: Vec2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Counter-clockwise perpendicular of a vector.
#[inline]
pub fn perp(v: Vec2) -> Vec2 {
    Vec2::new(-v.y, v.x)
}

/// Composable 2x3 planar affine transform.
///
/// Applies as `p' = L p + t` where `L` is the 2x2 linear part and `t` the
/// translation. Directions are transformed by the linear part only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    linear: Matrix2<f64>,
    translation: Vec2,
}

impl AffineTransform {
    /// The identity transform.
    pub fn identity() -> Self {
        Self {
            linear: Matrix2::identity(),
            translation: Vec2::zeros(),
        }
    }

    /// A pure translation.
    pub fn translation(t: Vec2) -> Self {
        Self {
            linear: Matrix2::identity(),
            translation: t,
        }
    }

    /// A counter-clockwise rotation about the origin.
    pub fn rotation(angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self {
            linear: Matrix2::new(cos, -sin, sin, cos),
            translation: Vec2::zeros(),
        }
    }

    /// A non-uniform scale about the origin.
    pub fn scale(sx: f64, sy: f64) -> Self {
        Self {
            linear: Matrix2::new(sx, 0.0, 0.0, sy),
            translation: Vec2::zeros(),
        }
    }

    /// Composes two transforms; the result applies `other` first, then `self`.
    pub fn concatenate(&self, other: &Self) -> Self {
        Self {
            linear: self.linear * other.linear,
            translation: self.linear * other.translation + self.translation,
        }
    }

    /// Transforms a point.
    #[inline]
    pub fn transform_point(&self, p: Vec2) -> Vec2 {
        self.linear * p + self.translation
    }

    /// Transforms a direction, ignoring the translation part.
    #[inline]
    pub fn transform_direction(&self, v: Vec2) -> Vec2 {
        self.linear * v
    }

    /// Inverse transform, or `None` when the linear part is singular.
    pub fn inverse(&self) -> Option<Self> {
        let inv = self.linear.try_inverse()?;
        Some(Self {
            linear: inv,
            translation: -(inv * self.translation),
        })
    }
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Position and orientation of a rigid body.
///
/// Caches the sine and cosine of the angle; rotation of a body-frame vector
/// into the world frame is two multiplies per component.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    position: Vec2,
    angle: f64,
    sin_angle: f64,
    cos_angle: f64,
}

impl Pose {
    /// Creates a pose from a world position and an angle in radians.
    pub fn new(position: Vec2, angle: f64) -> Self {
        let (sin_angle, cos_angle) = angle.sin_cos();
        Self {
            position,
            angle,
            sin_angle,
            cos_angle,
        }
    }

    /// The identity pose: origin, zero angle.
    pub fn identity() -> Self {
        Self::new(Vec2::zeros(), 0.0)
    }

    /// World position.
    #[inline]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Orientation angle in radians.
    #[inline]
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Rotates a body-frame vector into the world frame.
    #[inline]
    pub fn rotate(&self, v: Vec2) -> Vec2 {
        Vec2::new(
            self.cos_angle * v.x - self.sin_angle * v.y,
            self.sin_angle * v.x + self.cos_angle * v.y,
        )
    }

    /// Rotates a world-frame vector into the body frame.
    #[inline]
    pub fn inverse_rotate(&self, v: Vec2) -> Vec2 {
        Vec2::new(
            self.cos_angle * v.x + self.sin_angle * v.y,
            -self.sin_angle * v.x + self.cos_angle * v.y,
        )
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

/// Axis-aligned rectangle with `left <= right` and `bottom <= top`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Minimum x.
    pub left: f64,
    /// Minimum y.
    pub bottom: f64,
    /// Maximum x.
    pub right: f64,
    /// Maximum y.
    pub top: f64,
}

impl Rect {
    /// Creates a rectangle from its extents.
    pub fn new(left: f64, bottom: f64, right: f64, top: f64) -> Self {
        Self {
            left,
            bottom,
            right,
            top,
        }
    }

    /// The empty rectangle, identity for [`Rect::union`].
    pub fn empty() -> Self {
        Self {
            left: f64::INFINITY,
            bottom: f64::INFINITY,
            right: f64::NEG_INFINITY,
            top: f64::NEG_INFINITY,
        }
    }

    /// Smallest rectangle containing both points.
    pub fn from_points(a: Vec2, b: Vec2) -> Self {
        Self {
            left: a.x.min(b.x),
            bottom: a.y.min(b.y),
            right: a.x.max(b.x),
            top: a.y.max(b.y),
        }
    }

    /// Width of the rectangle.
    #[inline]
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    /// Height of the rectangle.
    #[inline]
    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }

    /// Smallest rectangle containing both operands.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            left: self.left.min(other.left),
            bottom: self.bottom.min(other.bottom),
            right: self.right.max(other.right),
            top: self.top.max(other.top),
        }
    }

    /// Grows the rectangle to include a point.
    pub fn expand_to(&self, p: Vec2) -> Self {
        Self {
            left: self.left.min(p.x),
            bottom: self.bottom.min(p.y),
            right: self.right.max(p.x),
            top: self.top.max(p.y),
        }
    }

    /// Inflates every side outward by `margin`.
    pub fn inflate(&self, margin: f64) -> Self {
        Self {
            left: self.left - margin,
            bottom: self.bottom - margin,
            right: self.right + margin,
            top: self.top + margin,
        }
    }

    /// Whether the two rectangles overlap, boundaries included.
    pub fn intersects(&self, other: &Self) -> bool {
        self.left <= other.right
            && other.left <= self.right
            && self.bottom <= other.top
            && other.bottom <= self.top
    }

    /// Whether the point lies inside, boundaries included.
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.left && p.x <= self.right && p.y >= self.bottom && p.y <= self.top
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_cross_sign() {
        let x = Vec2::new(1.0, 0.0);
        let y = Vec2::new(0.0, 1.0);
        assert_relative_eq!(cross(x, y), 1.0);
        assert_relative_eq!(cross(y, x), -1.0);
    }

    #[test]
    fn test_perp_is_ccw() {
        let v = Vec2::new(3.0, 1.0);
        let p = perp(v);
        assert_relative_eq!(v.dot(&p), 0.0);
        assert!(cross(v, p) > 0.0);
    }

    #[test]
    fn test_affine_rotation_point() {
        let t = AffineTransform::rotation(FRAC_PI_2);
        let p = t.transform_point(Vec2::new(1.0, 0.0));
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-15);
        assert_relative_eq!(p.y, 1.0, epsilon = 1e-15);
    }

    #[test]
    fn test_affine_concatenate_order() {
        // Rotate first, then translate.
        let t = AffineTransform::translation(Vec2::new(5.0, 0.0))
            .concatenate(&AffineTransform::rotation(PI));
        let p = t.transform_point(Vec2::new(1.0, 0.0));
        assert_relative_eq!(p.x, 4.0, epsilon = 1e-15);
        assert_relative_eq!(p.y, 0.0, epsilon = 1e-15);
    }

    #[test]
    fn test_affine_inverse_round_trip() {
        let t = AffineTransform::translation(Vec2::new(2.0, -3.0))
            .concatenate(&AffineTransform::rotation(0.7));
        let inv = t.inverse().unwrap();
        let p = Vec2::new(1.5, -0.25);
        let back = inv.transform_point(t.transform_point(p));
        assert_relative_eq!(back.x, p.x, epsilon = 1e-12);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-12);
    }

    #[test]
    fn test_pose_rotate_round_trip() {
        let pose = Pose::new(Vec2::new(10.0, 2.0), 1.2);
        let v = Vec2::new(0.3, -4.0);
        let back = pose.inverse_rotate(pose.rotate(v));
        assert_relative_eq!(back.x, v.x, epsilon = 1e-12);
        assert_relative_eq!(back.y, v.y, epsilon = 1e-12);
    }

    #[test]
    fn test_rect_union_intersects() {
        let a = Rect::new(0.0, 0.0, 1.0, 1.0);
        let b = Rect::new(2.0, 2.0, 3.0, 3.0);
        assert!(!a.intersects(&b));
        let u = a.union(&b);
        assert!(u.contains(Vec2::new(1.5, 1.5)));
        assert!(a.inflate(1.0).intersects(&b));
    }
}
