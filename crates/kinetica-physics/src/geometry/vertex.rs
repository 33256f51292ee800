//! Vertices of a polygon in body coordinates.

use kinetica_core::math::Vec2;
use serde::{Deserialize, Serialize};

use super::EdgeIdx;

/// A point of a polygon outline, in body coordinates.
///
/// End-point vertices sit where two edges meet and reference both neighbors.
/// Decorated mid-point vertices are added along curved edges so that
/// vertex/edge collision testing can approximate edge/edge collisions; they
/// reference the same edge on both sides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vertex {
    id: usize,
    loc: Vec2,
    edge1: Option<EdgeIdx>,
    edge2: Option<EdgeIdx>,
    is_midpoint: bool,
}

impl Vertex {
    /// Creates an end-point vertex at `loc` in body coordinates.
    pub fn new(id: usize, loc: Vec2) -> Self {
        Self {
            id,
            loc,
            edge1: None,
            edge2: None,
            is_midpoint: false,
        }
    }

    /// Creates a decorated mid-point vertex on `edge`.
    pub fn midpoint(id: usize, loc: Vec2, edge: EdgeIdx) -> Self {
        Self {
            id,
            loc,
            edge1: Some(edge),
            edge2: Some(edge),
            is_midpoint: true,
        }
    }

    /// Integer identity of the vertex within its polygon.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Position in body coordinates.
    #[inline]
    pub fn loc(&self) -> Vec2 {
        self.loc
    }

    /// Previous edge, when assigned.
    pub fn edge1(&self) -> Option<EdgeIdx> {
        self.edge1
    }

    /// Next edge, when assigned.
    pub fn edge2(&self) -> Option<EdgeIdx> {
        self.edge2
    }

    /// Whether this is a decorated mid-point vertex.
    pub fn is_midpoint(&self) -> bool {
        self.is_midpoint
    }

    /// Assigns the previous edge.
    ///
    /// # Panics
    /// Panics if the previous edge was already assigned; each vertex joins
    /// exactly one incoming edge.
    pub fn set_edge1(&mut self, edge: EdgeIdx) {
        assert!(self.edge1.is_none(), "vertex edge1 assigned twice");
        self.edge1 = Some(edge);
    }

    /// Assigns the next edge.
    pub fn set_edge2(&mut self, edge: EdgeIdx) {
        self.edge2 = Some(edge);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midpoint_shares_edge() {
        let v = Vertex::midpoint(7, Vec2::new(1.0, 2.0), EdgeIdx(3));
        assert!(v.is_midpoint());
        assert_eq!(v.edge1(), v.edge2());
        assert_eq!(v.edge1(), Some(EdgeIdx(3)));
    }

    #[test]
    #[should_panic(expected = "assigned twice")]
    fn test_edge1_set_once() {
        let mut v = Vertex::new(0, Vec2::zeros());
        v.set_edge1(EdgeIdx(0));
        v.set_edge1(EdgeIdx(1));
    }
}
