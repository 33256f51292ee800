//! Circular-arc polygon edges.
//!
//! An arc is defined by its two endpoint vertices, its center in body
//! coordinates, a direction of travel (clockwise or counter-clockwise from
//! start to finish) and which side of the arc is outside the body
//! (`outside_is_out`: true for a convex bump, false for a concave socket).
//!
//! "Edge coordinates" translate body coordinates so the arc center is at the
//! origin; there is no rotation involved.

use std::f64::consts::PI;

use kinetica_core::math::{Rect, Vec2};
use serde::{Deserialize, Serialize};

use crate::config::TINY_POSITIVE;
use crate::error::{SimError, SimResult};

use super::{EdgeIdx, VertexIdx};

/// Angular tolerance below which the start and finish angles coincide and
/// the edge is a complete circle.
const FULL_CIRCLE_TOL: f64 = 1e-8;

/// Relative tolerance for the endpoint equidistance check at construction.
const RADIUS_MATCH_TOL: f64 = 1e-6;

/// Target arc length between decorated mid-point vertices, in body lengths.
const DECORATION_ARC_LENGTH: f64 = 0.3;

/// A circular arc of a polygon outline, in body coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircularEdge {
    index: EdgeIdx,
    v1: VertexIdx,
    v2: VertexIdx,
    p1: Vec2,
    p2: Vec2,
    center: Vec2,
    radius: f64,
    clockwise: bool,
    outside_is_out: bool,
    start_angle: f64,
    finish_angle: f64,
    angle_low: f64,
    angle_high: f64,
    complete_circle: bool,
    decoration: Vec<VertexIdx>,
    decoration_angle: f64,
    centroid: Vec2,
    centroid_radius: f64,
}

impl CircularEdge {
    /// Creates a circular edge between two endpoint vertices.
    ///
    /// Returns the edge plus the body-coordinate positions where decorated
    /// mid-point vertices must be created; the caller materializes those
    /// vertices in the polygon arena and registers them with
    /// [`CircularEdge::set_decoration`].
    ///
    /// # Errors
    /// Returns [`SimError::InvalidGeometry`] when the endpoints are not
    /// equidistant from the center.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        index: EdgeIdx,
        v1: VertexIdx,
        v2: VertexIdx,
        p1: Vec2,
        p2: Vec2,
        center: Vec2,
        clockwise: bool,
        outside_is_out: bool,
    ) -> SimResult<(Self, Vec<Vec2>)> {
        let r1 = (p1 - center).norm();
        let r2 = (p2 - center).norm();
        if r1 < TINY_POSITIVE {
            return Err(SimError::geometry("arc endpoint coincides with center"));
        }
        if (r1 - r2).abs() > RADIUS_MATCH_TOL * r1.max(1.0) {
            return Err(SimError::geometry(format!(
                "arc endpoints not equidistant from center: {r1} vs {r2}"
            )));
        }
        let radius = r1;
        let start_angle = (p1.y - center.y).atan2(p1.x - center.x);
        let finish_angle = (p2.y - center.y).atan2(p2.x - center.x);

        let (angle_low, angle_high, complete_circle) =
            arc_range(start_angle, finish_angle, clockwise);

        let mut edge = Self {
            index,
            v1,
            v2,
            p1,
            p2,
            center,
            radius,
            clockwise,
            outside_is_out,
            start_angle,
            finish_angle,
            angle_low,
            angle_high,
            complete_circle,
            decoration: Vec::new(),
            decoration_angle: 0.0,
            centroid: Vec2::zeros(),
            centroid_radius: 0.0,
        };

        let positions = edge.decoration_positions();
        edge.compute_centroid();
        Ok((edge, positions))
    }

    /// Decorated vertex spacing: at least eight sectors per full turn, and
    /// at least one vertex per [`DECORATION_ARC_LENGTH`] of arc.
    fn decoration_positions(&mut self) -> Vec<Vec2> {
        let span = self.angle_high - self.angle_low;
        let spacing = (PI / 4.0).min(DECORATION_ARC_LENGTH / self.radius);
        let n = (span / spacing).ceil().max(1.0) as usize;
        let actual = span / n as f64;
        self.decoration_angle = actual;
        (1..n)
            .map(|i| self.point_at_angle(self.angle_low + actual * i as f64))
            .collect()
    }

    fn compute_centroid(&mut self) {
        let span = self.angle_high - self.angle_low;
        if span >= PI {
            self.centroid = self.center;
            self.centroid_radius = self.radius;
        } else {
            self.centroid = 0.5 * (self.p1 + self.p2);
            let apex = self.point_at_angle(0.5 * (self.angle_low + self.angle_high));
            self.centroid_radius = (self.p1 - self.centroid)
                .norm()
                .max((apex - self.centroid).norm());
        }
        if !self.outside_is_out {
            self.centroid_radius *= 1.2;
        }
    }

    /// Registers the decorated mid-point vertices created for this edge.
    pub fn set_decoration(&mut self, decoration: Vec<VertexIdx>) {
        self.decoration = decoration;
    }

    /// Index of this edge in its polygon.
    pub fn index(&self) -> EdgeIdx {
        self.index
    }

    /// Start vertex.
    pub fn vertex1(&self) -> VertexIdx {
        self.v1
    }

    /// End vertex.
    pub fn vertex2(&self) -> VertexIdx {
        self.v2
    }

    /// Start point in body coordinates.
    pub fn endpoint1(&self) -> Vec2 {
        self.p1
    }

    /// End point in body coordinates.
    pub fn endpoint2(&self) -> Vec2 {
        self.p2
    }

    /// Arc center in body coordinates.
    pub fn center(&self) -> Vec2 {
        self.center
    }

    /// Arc radius, always positive.
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Whether travel from start to finish is clockwise.
    pub fn is_clockwise(&self) -> bool {
        self.clockwise
    }

    /// Whether the region away from the center is outside the body.
    pub fn outside_is_out(&self) -> bool {
        self.outside_is_out
    }

    /// Start angle in math convention.
    pub fn start_angle(&self) -> f64 {
        self.start_angle
    }

    /// Finish angle in math convention.
    pub fn finish_angle(&self) -> f64 {
        self.finish_angle
    }

    /// Normalized low angle, in `[-pi, pi]`.
    pub fn angle_low(&self) -> f64 {
        self.angle_low
    }

    /// Normalized high angle, in `[angle_low, angle_low + 2*pi]`.
    pub fn angle_high(&self) -> f64 {
        self.angle_high
    }

    /// Whether the edge is a complete circle.
    pub fn is_complete_circle(&self) -> bool {
        self.complete_circle
    }

    /// Decorated mid-point vertices of this edge.
    pub fn decoration(&self) -> &[VertexIdx] {
        &self.decoration
    }

    /// Angular spacing of the decorated vertices.
    pub fn decoration_angle(&self) -> f64 {
        self.decoration_angle
    }

    /// Centroid of the edge: the arc center when the span reaches a half
    /// turn, the chord midpoint otherwise.
    pub fn centroid(&self) -> Vec2 {
        self.centroid
    }

    /// Max distance from the centroid to any point of the edge, scaled by
    /// 1.2 for concave edges.
    pub fn centroid_radius(&self) -> f64 {
        self.centroid_radius
    }

    /// Point on the circle at angle `a`, in body coordinates.
    pub fn point_at_angle(&self, a: f64) -> Vec2 {
        self.center + self.radius * Vec2::new(a.cos(), a.sin())
    }

    /// Translates a body-coordinate point into edge coordinates.
    #[inline]
    pub fn body_to_edge(&self, p: Vec2) -> Vec2 {
        p - self.center
    }

    /// Translates an edge-coordinate point into body coordinates.
    #[inline]
    pub fn edge_to_body(&self, p: Vec2) -> Vec2 {
        p + self.center
    }

    /// Whether the direction of `p_edge` (in edge coordinates) falls within
    /// the angular span of the arc.
    pub fn is_within_arc(&self, p_edge: Vec2) -> bool {
        if self.complete_circle {
            return true;
        }
        let mut a = p_edge.y.atan2(p_edge.x);
        if a < self.angle_low {
            a += 2.0 * PI;
        }
        a <= self.angle_high
    }

    /// Like [`CircularEdge::is_within_arc`] for the arc reflected through
    /// the center.
    pub fn is_within_reflected_arc(&self, p_edge: Vec2) -> bool {
        if self.complete_circle {
            return true;
        }
        let mut a = p_edge.y.atan2(p_edge.x) + PI;
        if a < self.angle_low {
            a += 2.0 * PI;
        } else if a >= self.angle_low + 2.0 * PI {
            a -= 2.0 * PI;
        }
        a <= self.angle_high
    }

    /// Signed distance from `p` (body coordinates) to the circle, positive
    /// on the outside of the body.
    pub fn distance_to_line(&self, p: Vec2) -> f64 {
        let d = (p - self.center).norm() - self.radius;
        if self.outside_is_out {
            d
        } else {
            -d
        }
    }

    /// Like [`CircularEdge::distance_to_line`], but positive infinity when
    /// the radial through `p` misses the angular span.
    pub fn distance_to_point(&self, p: Vec2) -> f64 {
        if self.is_within_arc(self.body_to_edge(p)) {
            self.distance_to_line(p)
        } else {
            f64::INFINITY
        }
    }

    /// Projects `p` (body coordinates) radially onto the circle, returning
    /// the circle point and the outward unit normal there.
    ///
    /// Returns `None` when `p` coincides with the center, where no radial
    /// direction exists.
    pub fn get_point_on_edge(&self, p: Vec2) -> Option<(Vec2, Vec2)> {
        let pe = p - self.center;
        let h = pe.norm();
        if h < TINY_POSITIVE {
            return None;
        }
        let u = pe / h;
        let point = self.center + self.radius * u;
        let normal = if self.outside_is_out { u } else { -u };
        Some((point, normal))
    }

    /// Signed radius of curvature: positive convex, negative concave.
    pub fn curvature(&self) -> f64 {
        if self.outside_is_out {
            self.radius
        } else {
            -self.radius
        }
    }

    /// Max deviation of the arc from its chord; caps believable penetration
    /// depth in edge/edge collisions.
    pub fn depth_of_arc(&self) -> f64 {
        let span = (self.angle_high - self.angle_low).min(2.0 * PI);
        self.radius * (1.0 - (span / 2.0).cos())
    }

    /// Max distance between the arc and the chords of its decorated
    /// vertices: `r (1 - sqrt(1 - a^2/4))` for decoration angle `a`.
    pub fn chord_error(&self) -> f64 {
        let a = self.decoration_angle;
        self.radius * (1.0 - (1.0 - a * a / 4.0).max(0.0).sqrt())
    }

    /// Bounding rectangle in body coordinates: the endpoints plus every
    /// axis-extreme direction the span covers.
    pub fn bounds(&self) -> Rect {
        let mut rect = Rect::from_points(self.p1, self.p2);
        for k in -2..=6 {
            let a = f64::from(k) * (PI / 2.0);
            if a >= self.angle_low && a <= self.angle_high {
                rect = rect.expand_to(self.point_at_angle(a));
            }
        }
        rect
    }
}

/// Normalized `[angle_low, angle_high]` range of an arc, with `angle_low`
/// in `[-pi, pi]`, `angle_high` in `[angle_low, angle_low + 2*pi]`, and
/// every point of the arc at an angle within the range.
fn arc_range(start: f64, finish: f64, clockwise: bool) -> (f64, f64, bool) {
    let diff = (start - finish).abs();
    if diff < FULL_CIRCLE_TOL {
        return (start, start + 2.0 * PI, true);
    }
    if (diff - 2.0 * PI).abs() < FULL_CIRCLE_TOL {
        let low = start.min(finish);
        return (low, low + 2.0 * PI, true);
    }
    let (low, high) = match (start > finish, clockwise) {
        (true, true) => (finish, start),
        (true, false) => (start, finish + 2.0 * PI),
        (false, true) => (finish, start + 2.0 * PI),
        (false, false) => (start, finish),
    };
    (low, high, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn arc(
        p1: Vec2,
        p2: Vec2,
        center: Vec2,
        clockwise: bool,
        outside_is_out: bool,
    ) -> CircularEdge {
        CircularEdge::new(
            EdgeIdx(0),
            VertexIdx(0),
            VertexIdx(1),
            p1,
            p2,
            center,
            clockwise,
            outside_is_out,
        )
        .unwrap()
        .0
    }

    #[test]
    fn test_unequal_radii_rejected() {
        let err = CircularEdge::new(
            EdgeIdx(0),
            VertexIdx(0),
            VertexIdx(1),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 2.0),
            Vec2::zeros(),
            false,
            true,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_full_circle_detected() {
        let p = Vec2::new(1.0, 0.0);
        let e = arc(p, p, Vec2::zeros(), false, true);
        assert!(e.is_complete_circle());
        assert_relative_eq!(e.angle_high() - e.angle_low(), 2.0 * PI);
        assert!(e.is_within_arc(Vec2::new(-0.3, -0.9)));
    }

    #[test]
    fn test_arc_range_table() {
        // start > finish, counter-clockwise: wraps through pi.
        let (low, high, full) = arc_range(FRAC_PI_2, -FRAC_PI_2, false);
        assert!(!full);
        assert_relative_eq!(low, FRAC_PI_2);
        assert_relative_eq!(high, -FRAC_PI_2 + 2.0 * PI);

        // start > finish, clockwise: direct interval.
        let (low, high, _) = arc_range(FRAC_PI_2, -FRAC_PI_2, true);
        assert_relative_eq!(low, -FRAC_PI_2);
        assert_relative_eq!(high, FRAC_PI_2);

        // start < finish, counter-clockwise: direct interval.
        let (low, high, _) = arc_range(-FRAC_PI_2, FRAC_PI_2, false);
        assert_relative_eq!(low, -FRAC_PI_2);
        assert_relative_eq!(high, FRAC_PI_2);

        // start < finish, clockwise: wraps.
        let (low, high, _) = arc_range(-FRAC_PI_2, FRAC_PI_2, true);
        assert_relative_eq!(low, FRAC_PI_2);
        assert_relative_eq!(high, -FRAC_PI_2 + 2.0 * PI);
    }

    #[test]
    fn test_range_invariants() {
        let (low, high, _) = arc_range(3.0, -3.0, false);
        assert!(low >= -PI && low <= PI);
        assert!(high >= low && high <= low + 2.0 * PI + 1e-12);
    }

    #[test]
    fn test_signed_distance() {
        // Convex upper half circle of radius 2.
        let e = arc(
            Vec2::new(2.0, 0.0),
            Vec2::new(-2.0, 0.0),
            Vec2::zeros(),
            false,
            true,
        );
        assert_relative_eq!(e.distance_to_line(Vec2::new(0.0, 3.0)), 1.0);
        assert_relative_eq!(e.distance_to_line(Vec2::new(0.0, 1.0)), -1.0);

        // The same arc as a concave socket flips the sign.
        let c = arc(
            Vec2::new(2.0, 0.0),
            Vec2::new(-2.0, 0.0),
            Vec2::zeros(),
            false,
            false,
        );
        assert_relative_eq!(c.distance_to_line(Vec2::new(0.0, 3.0)), -1.0);
    }

    #[test]
    fn test_distance_to_point_respects_span() {
        let e = arc(
            Vec2::new(2.0, 0.0),
            Vec2::new(-2.0, 0.0),
            Vec2::zeros(),
            false,
            true,
        );
        assert_relative_eq!(e.distance_to_point(Vec2::new(0.0, 3.0)), 1.0);
        // Below the diameter: outside the angular span.
        assert_eq!(e.distance_to_point(Vec2::new(0.0, -3.0)), f64::INFINITY);
    }

    #[test]
    fn test_point_projection_normal_unit() {
        let e = arc(
            Vec2::new(2.0, 0.0),
            Vec2::new(-2.0, 0.0),
            Vec2::zeros(),
            false,
            true,
        );
        let (point, normal) = e.get_point_on_edge(Vec2::new(0.5, 4.0)).unwrap();
        assert_relative_eq!((point - e.center()).norm(), e.radius(), epsilon = 1e-12);
        assert_relative_eq!(normal.norm(), 1.0, epsilon = 1e-12);
        assert!(e.get_point_on_edge(Vec2::zeros()).is_none());
    }

    #[test]
    fn test_within_arc_over_span() {
        let e = arc(
            Vec2::new(2.0, 0.0),
            Vec2::new(-2.0, 0.0),
            Vec2::zeros(),
            false,
            true,
        );
        let span = e.angle_high() - e.angle_low();
        for i in 0..=16 {
            let a = e.angle_low() + span * (i as f64) / 16.0;
            let p = e.body_to_edge(e.point_at_angle(a));
            assert!(e.is_within_arc(p), "angle {a} should be within arc");
        }
        assert!(!e.is_within_arc(Vec2::new(0.0, -1.0)));
    }

    #[test]
    fn test_reflected_arc() {
        let e = arc(
            Vec2::new(2.0, 0.0),
            Vec2::new(-2.0, 0.0),
            Vec2::zeros(),
            false,
            true,
        );
        assert!(e.is_within_reflected_arc(Vec2::new(0.0, -1.0)));
        assert!(!e.is_within_reflected_arc(Vec2::new(0.0, 1.0)));
    }

    #[test]
    fn test_decoration_on_arc_within_chord_error() {
        let (e, positions) = CircularEdge::new(
            EdgeIdx(0),
            VertexIdx(0),
            VertexIdx(1),
            Vec2::new(2.0, 0.0),
            Vec2::new(-2.0, 0.0),
            Vec2::zeros(),
            false,
            true,
        )
        .unwrap();
        assert!(!positions.is_empty());
        for p in &positions {
            let dev = ((p - e.center()).norm() - e.radius()).abs();
            assert!(dev <= e.chord_error().max(1e-12));
            assert!(e.is_within_arc(e.body_to_edge(*p)));
        }
    }

    #[test]
    fn test_curvature_sign() {
        let convex = arc(
            Vec2::new(1.0, 0.0),
            Vec2::new(-1.0, 0.0),
            Vec2::zeros(),
            false,
            true,
        );
        assert_relative_eq!(convex.curvature(), 1.0);
        let concave = arc(
            Vec2::new(1.0, 0.0),
            Vec2::new(-1.0, 0.0),
            Vec2::zeros(),
            false,
            false,
        );
        assert_relative_eq!(concave.curvature(), -1.0);
    }

    #[test]
    fn test_bounds_cover_apex() {
        let e = arc(
            Vec2::new(2.0, 0.0),
            Vec2::new(-2.0, 0.0),
            Vec2::zeros(),
            false,
            true,
        );
        let b = e.bounds();
        assert_relative_eq!(b.top, 2.0);
        assert_relative_eq!(b.left, -2.0);
        assert_relative_eq!(b.right, 2.0);
    }
}
