//! Straight polygon edges.

use kinetica_core::math::{cross, Rect, Vec2};
use serde::{Deserialize, Serialize};

use crate::config::{ENDPOINT_EXTENSION_TOL, PARALLEL_TOL, TINY_POSITIVE};
use crate::error::{SimError, SimResult};

use super::{EdgeIdx, VertexIdx};

/// A straight segment of a polygon outline, in body coordinates.
///
/// `outside_is_up` tells which side of the (extended) line is outside the
/// body: the region above for non-vertical edges, the region toward positive
/// x for vertical ones. Signed distances are positive on the outside.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StraightEdge {
    index: EdgeIdx,
    v1: VertexIdx,
    v2: VertexIdx,
    p1: Vec2,
    p2: Vec2,
    outside_is_up: bool,
    normal: Vec2,
    centroid: Vec2,
    centroid_radius: f64,
}

impl StraightEdge {
    /// Creates a straight edge between two endpoint vertices.
    ///
    /// # Errors
    /// Returns [`SimError::InvalidGeometry`] for a zero-length segment, which
    /// has no usable normal direction.
    pub fn new(
        index: EdgeIdx,
        v1: VertexIdx,
        v2: VertexIdx,
        p1: Vec2,
        p2: Vec2,
        outside_is_up: bool,
    ) -> SimResult<Self> {
        let d = p2 - p1;
        let len = d.norm();
        if len < TINY_POSITIVE {
            return Err(SimError::geometry(format!(
                "zero-length segment at ({}, {})",
                p1.x, p1.y
            )));
        }
        let normal = Self::compute_normal(p1, p2, outside_is_up);
        Ok(Self {
            index,
            v1,
            v2,
            p1,
            p2,
            outside_is_up,
            normal,
            centroid: 0.5 * (p1 + p2),
            centroid_radius: 0.5 * len,
        })
    }

    fn compute_normal(p1: Vec2, p2: Vec2, outside_is_up: bool) -> Vec2 {
        let n = if (p2.x - p1.x).abs() < TINY_POSITIVE {
            // Vertical: outside toward positive x when "up".
            Vec2::new(1.0, 0.0)
        } else if (p2.y - p1.y).abs() < TINY_POSITIVE {
            Vec2::new(0.0, 1.0)
        } else {
            let k = (p2.y - p1.y) / (p2.x - p1.x);
            Vec2::new(-k, 1.0) / (1.0 + k * k).sqrt()
        };
        if outside_is_up {
            n
        } else {
            -n
        }
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

    /// Which side of the line is outside the body.
    pub fn outside_is_up(&self) -> bool {
        self.outside_is_up
    }

    /// Outward unit normal, constant along the edge, in body coordinates.
    #[inline]
    pub fn outward_normal(&self) -> Vec2 {
        self.normal
    }

    /// Whether the edge is vertical within [`TINY_POSITIVE`].
    pub fn is_vertical(&self) -> bool {
        (self.p2.x - self.p1.x).abs() < TINY_POSITIVE
    }

    /// Whether the edge is horizontal within [`TINY_POSITIVE`].
    pub fn is_horizontal(&self) -> bool {
        (self.p2.y - self.p1.y).abs() < TINY_POSITIVE
    }

    /// Midpoint of the segment.
    pub fn centroid(&self) -> Vec2 {
        self.centroid
    }

    /// Half the segment length: max distance from centroid to edge points.
    pub fn centroid_radius(&self) -> f64 {
        self.centroid_radius
    }

    /// Signed perpendicular distance from `p` to the infinite line extending
    /// the edge; positive when `p` is on the outside.
    ///
    /// Vertical and horizontal edges use the axis-aligned coordinate
    /// difference directly for accuracy.
    pub fn distance_to_line(&self, p: Vec2) -> f64 {
        let r = if self.is_vertical() {
            p.x - self.p1.x
        } else if self.is_horizontal() {
            p.y - self.p1.y
        } else {
            let k = (self.p2.y - self.p1.y) / (self.p2.x - self.p1.x);
            (p.y - self.p1.y - k * (p.x - self.p1.x)) / (1.0 + k * k).sqrt()
        };
        if self.outside_is_up {
            r
        } else {
            -r
        }
    }

    /// Like [`StraightEdge::distance_to_line`], but positive infinity when
    /// the foot of the perpendicular falls outside the segment span.
    pub fn distance_to_point(&self, p: Vec2) -> f64 {
        let within = if self.is_vertical() {
            span_contains(self.p1.y, self.p2.y, p.y)
        } else if self.is_horizontal() {
            span_contains(self.p1.x, self.p2.x, p.x)
        } else {
            let k = (self.p2.y - self.p1.y) / (self.p2.x - self.p1.x);
            let xp = (p.x + k * (p.y - self.p1.y) + k * k * self.p1.x) / (1.0 + k * k);
            span_contains(self.p1.x, self.p2.x, xp)
        };
        if within {
            self.distance_to_line(p)
        } else {
            f64::INFINITY
        }
    }

    /// Projects `p` onto the line of the edge, returning the foot of the
    /// perpendicular and the outward unit normal, both in body coordinates.
    ///
    /// The foot may lie outside the segment span.
    pub fn get_point_on_edge(&self, p: Vec2) -> (Vec2, Vec2) {
        let foot = if self.is_vertical() {
            Vec2::new(self.p1.x, p.y)
        } else if self.is_horizontal() {
            Vec2::new(p.x, self.p1.y)
        } else {
            let k = (self.p2.y - self.p1.y) / (self.p2.x - self.p1.x);
            let xp = (p.x + k * (p.y - self.p1.y) + k * k * self.p1.x) / (1.0 + k * k);
            let yp = self.p1.y + k * (xp - self.p1.x);
            Vec2::new(xp, yp)
        };
        (foot, self.normal)
    }

    /// Intersection of the segment `q1`..`q2` with this edge.
    ///
    /// Segments are considered parallel when the determinant magnitude is
    /// below [`PARALLEL_TOL`]. Both segments are extended past their
    /// endpoints by [`ENDPOINT_EXTENSION_TOL`] in parameter space so that
    /// crossings that land exactly on a corner are not lost to floating
    /// error.
    pub fn intersection(&self, q1: Vec2, q2: Vec2) -> Option<Vec2> {
        let d1 = self.p2 - self.p1;
        let d2 = q2 - q1;
        let det = cross(d1, d2);
        if det.abs() < PARALLEL_TOL {
            return None;
        }
        let w = q1 - self.p1;
        let s = cross(w, d2) / det;
        let t = cross(w, d1) / det;
        let lo = -ENDPOINT_EXTENSION_TOL;
        let hi = 1.0 + ENDPOINT_EXTENSION_TOL;
        if s >= lo && s <= hi && t >= lo && t <= hi {
            Some(self.p1 + s * d1)
        } else {
            None
        }
    }

    /// Bounding rectangle in body coordinates.
    pub fn bounds(&self) -> Rect {
        Rect::from_points(self.p1, self.p2)
    }
}

fn span_contains(a: f64, b: f64, x: f64) -> bool {
    x >= a.min(b) && x <= a.max(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn edge(p1: Vec2, p2: Vec2, up: bool) -> StraightEdge {
        StraightEdge::new(EdgeIdx(0), VertexIdx(0), VertexIdx(1), p1, p2, up).unwrap()
    }

    #[test]
    fn test_zero_length_rejected() {
        let p = Vec2::new(1.0, 1.0);
        assert!(StraightEdge::new(EdgeIdx(0), VertexIdx(0), VertexIdx(1), p, p, true).is_err());
    }

    #[test]
    fn test_distance_to_line_matches_euclidean() {
        // A slanted edge; compare against the point-to-line formula.
        let e = edge(Vec2::new(0.0, 0.0), Vec2::new(2.0, 1.0), true);
        let p = Vec2::new(0.5, 2.0);
        let d = e.distance_to_line(p);
        let (foot, _) = e.get_point_on_edge(p);
        assert_relative_eq!(d.abs(), (p - foot).norm(), epsilon = 1e-12);
        assert!(d > 0.0, "point above edge is outside when outside_is_up");
        assert_relative_eq!(
            e.distance_to_line(Vec2::new(0.5, -2.0)),
            -(Vec2::new(0.5, -2.0) - e.get_point_on_edge(Vec2::new(0.5, -2.0)).0).norm(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_vertical_and_horizontal_cases() {
        let v = edge(Vec2::new(1.0, 0.0), Vec2::new(1.0, 3.0), true);
        assert!(v.is_vertical());
        assert_relative_eq!(v.distance_to_line(Vec2::new(2.5, 1.0)), 1.5);
        assert_eq!(v.outward_normal(), Vec2::new(1.0, 0.0));

        let h = edge(Vec2::new(0.0, 2.0), Vec2::new(4.0, 2.0), false);
        assert!(h.is_horizontal());
        assert_relative_eq!(h.distance_to_line(Vec2::new(1.0, 1.0)), 1.0);
        assert_eq!(h.outward_normal(), Vec2::new(0.0, -1.0));
    }

    #[test]
    fn test_distance_to_point_clips_to_span() {
        let e = edge(Vec2::new(0.0, 0.0), Vec2::new(2.0, 0.0), true);
        assert_relative_eq!(e.distance_to_point(Vec2::new(1.0, 0.5)), 0.5);
        assert_eq!(e.distance_to_point(Vec2::new(3.0, 0.5)), f64::INFINITY);
        assert_eq!(e.distance_to_point(Vec2::new(-0.5, 0.5)), f64::INFINITY);
    }

    #[test]
    fn test_normal_is_unit() {
        let e = edge(Vec2::new(0.0, 0.0), Vec2::new(3.0, -7.0), true);
        assert_relative_eq!(e.outward_normal().norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_intersection_basic() {
        let e = edge(Vec2::new(0.0, 0.0), Vec2::new(2.0, 0.0), true);
        let hit = e
            .intersection(Vec2::new(1.0, 1.0), Vec2::new(1.0, -1.0))
            .unwrap();
        assert_relative_eq!(hit.x, 1.0);
        assert_relative_eq!(hit.y, 0.0, epsilon = 1e-15);
        assert!(e
            .intersection(Vec2::new(3.0, 1.0), Vec2::new(3.0, -1.0))
            .is_none());
    }

    #[test]
    fn test_intersection_parallel_rejected() {
        let e = edge(Vec2::new(0.0, 0.0), Vec2::new(2.0, 0.0), true);
        assert!(e
            .intersection(Vec2::new(0.0, 1.0), Vec2::new(2.0, 1.0))
            .is_none());
    }

    #[test]
    fn test_intersection_accepts_exact_corner_crossing() {
        // Crossing that lands exactly on the edge endpoint: the endpoint
        // extension keeps acute-angle corner crossings detectable.
        let e = edge(Vec2::new(0.0, 0.0), Vec2::new(2.0, 0.0), true);
        let hit = e.intersection(Vec2::new(2.0, 1.0), Vec2::new(2.0, -1.0));
        assert!(hit.is_some());
    }
}
