//! Tagged edge variant dispatching to straight or circular geometry.

use kinetica_core::math::{Rect, Vec2};
use serde::{Deserialize, Serialize};

use super::{CircularEdge, EdgeIdx, StraightEdge, VertexIdx};

/// A polygon edge: either a straight segment or a circular arc.
///
/// The common geometry queries are methods on the variant so that edge
/// iteration stays monomorphic; there is no virtual dispatch in the hot
/// paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Edge {
    /// Straight segment.
    Straight(StraightEdge),
    /// Circular arc.
    Circular(CircularEdge),
}

impl Edge {
    /// Index of this edge in its polygon.
    pub fn index(&self) -> EdgeIdx {
        match self {
            Edge::Straight(e) => e.index(),
            Edge::Circular(e) => e.index(),
        }
    }

    /// Start vertex.
    pub fn vertex1(&self) -> VertexIdx {
        match self {
            Edge::Straight(e) => e.vertex1(),
            Edge::Circular(e) => e.vertex1(),
        }
    }

    /// End vertex.
    pub fn vertex2(&self) -> VertexIdx {
        match self {
            Edge::Straight(e) => e.vertex2(),
            Edge::Circular(e) => e.vertex2(),
        }
    }

    /// Start point in body coordinates.
    pub fn endpoint1(&self) -> Vec2 {
        match self {
            Edge::Straight(e) => e.endpoint1(),
            Edge::Circular(e) => e.endpoint1(),
        }
    }

    /// End point in body coordinates.
    pub fn endpoint2(&self) -> Vec2 {
        match self {
            Edge::Straight(e) => e.endpoint2(),
            Edge::Circular(e) => e.endpoint2(),
        }
    }

    /// Whether the edge is a straight segment.
    pub fn is_straight(&self) -> bool {
        matches!(self, Edge::Straight(_))
    }

    /// The straight variant, if any.
    pub fn as_straight(&self) -> Option<&StraightEdge> {
        match self {
            Edge::Straight(e) => Some(e),
            Edge::Circular(_) => None,
        }
    }

    /// The circular variant, if any.
    pub fn as_circular(&self) -> Option<&CircularEdge> {
        match self {
            Edge::Straight(_) => None,
            Edge::Circular(e) => Some(e),
        }
    }

    /// Signed distance from `p` to the line or circle extending the edge;
    /// positive on the outside of the body.
    pub fn distance_to_line(&self, p: Vec2) -> f64 {
        match self {
            Edge::Straight(e) => e.distance_to_line(p),
            Edge::Circular(e) => e.distance_to_line(p),
        }
    }

    /// Signed distance with endpoint clipping: positive infinity when the
    /// projection of `p` misses the edge span.
    pub fn distance_to_point(&self, p: Vec2) -> f64 {
        match self {
            Edge::Straight(e) => e.distance_to_point(p),
            Edge::Circular(e) => e.distance_to_point(p),
        }
    }

    /// Projects `p` onto the edge, returning the edge point and the outward
    /// unit normal there, both in body coordinates.
    ///
    /// Returns `None` only for a circular edge when `p` coincides with its
    /// center.
    pub fn get_point_on_edge(&self, p: Vec2) -> Option<(Vec2, Vec2)> {
        match self {
            Edge::Straight(e) => Some(e.get_point_on_edge(p)),
            Edge::Circular(e) => e.get_point_on_edge(p),
        }
    }

    /// Outward unit normal at the projection of `p`.
    pub fn normal_body(&self, p: Vec2) -> Option<Vec2> {
        match self {
            Edge::Straight(e) => Some(e.outward_normal()),
            Edge::Circular(e) => e.get_point_on_edge(p).map(|(_, n)| n),
        }
    }

    /// Signed radius of curvature: positive convex, negative concave,
    /// infinite for straight edges.
    pub fn curvature(&self) -> f64 {
        match self {
            Edge::Straight(_) => f64::INFINITY,
            Edge::Circular(e) => e.curvature(),
        }
    }

    /// Max deviation of the edge from the chords of its collision-sampling
    /// vertices: zero for straight edges.
    pub fn chord_error(&self) -> f64 {
        match self {
            Edge::Straight(_) => 0.0,
            Edge::Circular(e) => e.chord_error(),
        }
    }

    /// Bounding rectangle in body coordinates.
    pub fn bounds(&self) -> Rect {
        match self {
            Edge::Straight(e) => e.bounds(),
            Edge::Circular(e) => e.bounds(),
        }
    }

    /// Centroid of the edge in body coordinates.
    pub fn centroid(&self) -> Vec2 {
        match self {
            Edge::Straight(e) => e.centroid(),
            Edge::Circular(e) => e.centroid(),
        }
    }

    /// Max distance from the centroid to any point of the edge.
    pub fn centroid_radius(&self) -> f64 {
        match self {
            Edge::Straight(e) => e.centroid_radius(),
            Edge::Circular(e) => e.centroid_radius(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn straight() -> Edge {
        Edge::Straight(
            StraightEdge::new(
                EdgeIdx(0),
                VertexIdx(0),
                VertexIdx(1),
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                true,
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_dispatch_straight() {
        let e = straight();
        assert!(e.is_straight());
        assert!(e.as_straight().is_some());
        assert!(e.as_circular().is_none());
        assert_eq!(e.curvature(), f64::INFINITY);
        assert_eq!(e.chord_error(), 0.0);
        assert_eq!(
            e.normal_body(Vec2::new(0.5, 1.0)),
            Some(Vec2::new(0.0, 1.0))
        );
    }

    #[test]
    fn test_dispatch_circular() {
        let (c, _) = CircularEdge::new(
            EdgeIdx(1),
            VertexIdx(0),
            VertexIdx(1),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::zeros(),
            false,
            true,
        )
        .unwrap();
        let e = Edge::Circular(c);
        assert!(!e.is_straight());
        assert_eq!(e.curvature(), 1.0);
        assert!(e.chord_error() > 0.0);
        assert_eq!(e.index(), EdgeIdx(1));
    }
}
