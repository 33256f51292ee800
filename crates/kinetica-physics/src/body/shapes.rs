//! Factory constructors for common body shapes.
//!
//! Each factory builds the outline in body coordinates with the center of
//! mass at the origin and computes the exact mass properties for a uniform
//! density body. Pass infinite mass for fixed scenery such as floors and
//! walls.

use kinetica_core::math::{cross, Vec2};

use crate::config::TINY_POSITIVE;
use crate::error::{SimError, SimResult};

use super::{PolygonBuilder, RigidBody};

/// Rectangular block of the given width and height, centered on its center
/// of mass. Moment of inertia: `m (w^2 + h^2) / 12`.
pub fn make_block(name: impl Into<String>, width: f64, height: f64, mass: f64) -> SimResult<RigidBody> {
    if width <= 0.0 || height <= 0.0 {
        return Err(SimError::geometry("block dimensions must be positive"));
    }
    let w = width / 2.0;
    let h = height / 2.0;
    make_polygon(
        name,
        &[
            Vec2::new(-w, -h),
            Vec2::new(w, -h),
            Vec2::new(w, h),
            Vec2::new(-w, h),
        ],
        mass,
    )
}

/// Circular disc of the given radius, centered on its center of mass.
/// Moment of inertia: `m r^2 / 2`.
pub fn make_ball(name: impl Into<String>, radius: f64, mass: f64) -> SimResult<RigidBody> {
    if radius <= 0.0 {
        return Err(SimError::geometry("ball radius must be positive"));
    }
    let mut builder = PolygonBuilder::new(name);
    builder.start_path(Vec2::new(radius, 0.0));
    builder.add_circular_edge_to(Vec2::new(radius, 0.0), Vec2::zeros(), false, true)?;
    let moment = if mass.is_finite() {
        mass * radius * radius / 2.0
    } else {
        f64::INFINITY
    };
    builder.finish(mass, Vec2::zeros(), moment)
}

/// Convex polygon from vertices in counter-clockwise winding order.
///
/// The outline is translated so the area centroid lands at the origin; the
/// moment of inertia is the exact uniform-density value. Outside-side
/// markers are derived from the winding: with counter-clockwise winding the
/// interior lies to the left of each edge.
pub fn make_polygon(
    name: impl Into<String>,
    points: &[Vec2],
    mass: f64,
) -> SimResult<RigidBody> {
    if points.len() < 3 {
        return Err(SimError::geometry("polygon needs at least three vertices"));
    }
    let (area, centroid, unit_moment) = polygon_mass_properties(points);
    if area <= 0.0 {
        return Err(SimError::geometry(
            "polygon must be wound counter-clockwise with positive area",
        ));
    }

    let mut builder = PolygonBuilder::new(name);
    builder.start_path(points[0] - centroid);
    for i in 1..=points.len() {
        let p = points[i % points.len()] - centroid;
        let prev = points[i - 1] - centroid;
        let d = p - prev;
        let outward = Vec2::new(d.y, -d.x);
        let outside_is_up = if d.x.abs() < TINY_POSITIVE {
            outward.x > 0.0
        } else {
            outward.y > 0.0
        };
        builder.add_straight_edge_to(p, outside_is_up)?;
    }
    let moment = if mass.is_finite() {
        mass * unit_moment
    } else {
        f64::INFINITY
    };
    builder.finish(mass, Vec2::zeros(), moment)
}

/// Area, centroid, and per-unit-mass moment of inertia about the centroid
/// of a simple polygon, by the shoelace formulas.
fn polygon_mass_properties(points: &[Vec2]) -> (f64, Vec2, f64) {
    let n = points.len();
    let mut area2 = 0.0;
    let mut centroid = Vec2::zeros();
    let mut j_origin = 0.0;
    for i in 0..n {
        let p = points[i];
        let q = points[(i + 1) % n];
        let c = cross(p, q);
        area2 += c;
        centroid += c * (p + q);
        j_origin += c * (p.dot(&p) + p.dot(&q) + q.dot(&q));
    }
    let area = area2 / 2.0;
    if area.abs() < TINY_POSITIVE {
        return (0.0, Vec2::zeros(), 0.0);
    }
    centroid /= 3.0 * area2;
    // Second moment per unit mass about the origin, then shift to centroid.
    let j = j_origin / (6.0 * area2);
    let unit_moment = j - centroid.norm_squared();
    (area, centroid, unit_moment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_block_mass_properties() {
        let block = make_block("b", 2.0, 1.0, 6.0).unwrap();
        assert_relative_eq!(block.get_mass(), 6.0);
        assert_relative_eq!(block.get_inertia(), 6.0 * (4.0 + 1.0) / 12.0);
        assert_relative_eq!(block.centroid_body().x, 0.0);
        assert_relative_eq!(block.centroid_body().y, 0.0);
    }

    #[test]
    fn test_ball_mass_properties() {
        let ball = make_ball("ball", 0.5, 2.0).unwrap();
        assert_relative_eq!(ball.get_inertia(), 2.0 * 0.25 / 2.0);
        // One endpoint vertex plus the decorated mid-points.
        assert!(ball.vertices().len() > 8);
    }

    #[test]
    fn test_polygon_centered_on_centroid() {
        // Off-center triangle: constructor recenters it.
        let tri = make_polygon(
            "tri",
            &[
                Vec2::new(1.0, 1.0),
                Vec2::new(3.0, 1.0),
                Vec2::new(1.0, 3.0),
            ],
            1.5,
        )
        .unwrap();
        let sum: Vec2 = tri
            .edges()
            .iter()
            .map(|e| e.endpoint1())
            .fold(Vec2::zeros(), |a, p| a + p);
        let mean = sum / 3.0;
        assert_relative_eq!(mean.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(mean.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_clockwise_winding_rejected() {
        let err = make_polygon(
            "cw",
            &[
                Vec2::new(0.0, 0.0),
                Vec2::new(0.0, 1.0),
                Vec2::new(1.0, 0.0),
            ],
            1.0,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_square_outside_markers() {
        let block = make_block("b", 2.0, 2.0, 1.0).unwrap();
        // Bottom edge: outside is below.
        let bottom = block.edges()[0].as_straight().unwrap();
        assert!(!bottom.outside_is_up());
        assert!(bottom.distance_to_line(Vec2::new(0.0, -2.0)) > 0.0);
        // Top edge: outside is above.
        let top = block.edges()[2].as_straight().unwrap();
        assert!(top.outside_is_up());
        assert!(top.distance_to_line(Vec2::new(0.0, 2.0)) > 0.0);
    }
}
