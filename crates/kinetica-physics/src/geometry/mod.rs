//! Geometric primitive layer: vertices and edges in body coordinates.
//!
//! Polygons own their vertices and edges in arenas; cross-references between
//! them are the stable indices [`VertexIdx`] and [`EdgeIdx`] rather than
//! pointers. All geometry here is expressed in the owning polygon's body
//! frame; transformation into world coordinates is the polygon's job.

mod circular;
mod edge;
mod straight;
mod vertex;

pub use circular::CircularEdge;
pub use edge::Edge;
pub use straight::StraightEdge;
pub use vertex::Vertex;

use serde::{Deserialize, Serialize};

/// Stable index of a vertex within its polygon's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VertexIdx(pub usize);

/// Stable index of an edge within its polygon's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeIdx(pub usize);
