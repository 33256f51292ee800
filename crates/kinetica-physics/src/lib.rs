//! Kinetica Physics Engine
//!
//! A 2D rigid-body collision engine with continuous-time event detection:
//!
//! # Features
//!
//! - **Mixed geometry**: polygons built from straight segments and circular
//!   arcs, with decorated mid-point vertices sampling the curves
//! - **Continuous collision detection**: vertex/edge and edge/edge tests
//!   against both the current pose and the old-pose snapshot, so fast bodies
//!   cannot tunnel
//! - **Impulse solving**: simultaneous, hybrid, and serial strategies over a
//!   shared linear system, with stacked contacts and rank-deficient systems
//!   handled by the elimination kernel
//! - **Bilateral joints**: constraints expressed as zero-distance collisions,
//!   including joints tracking parameterized paths
//! - **Event bracketing**: binary search in time around each collision
//!   instant, with state save and restore between probes
//!
//! # Example
//!
//! ```rust,no_run
//! use kinetica_core::math::Vec2;
//! use kinetica_physics::prelude::*;
//!
//! let mut sim = ImpulseSim::new(SimConfig::default()).unwrap();
//! sim.set_gravity(10.0);
//!
//! let floor = shapes::make_block("floor", 20.0, 1.0, f64::INFINITY).unwrap();
//! let floor_id = sim.add_body(floor);
//! sim.body_mut(floor_id).set_position(Vec2::new(0.0, -0.5));
//! sim.initialize_from_body(floor_id);
//!
//! let block = shapes::make_block("block", 1.0, 1.0, 1.0).unwrap();
//! let id = sim.add_body(block);
//! sim.body_mut(id).set_position(Vec2::new(0.0, 2.0));
//! sim.initialize_from_body(id);
//!
//! let mut advance = CollisionAdvance::new();
//! for _ in 0..100 {
//!     advance.advance(&mut sim, 0.025).unwrap();
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod body;
pub mod collision;
pub mod config;
pub mod error;
pub mod force;
pub mod geometry;
pub mod joint;
pub mod sim;
pub mod solver;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::body::shapes;
    pub use crate::body::{PolygonBuilder, RigidBody};
    pub use crate::collision::{CollisionGeometry, RigidBodyCollision};
    pub use crate::config::{CollisionHandling, ExtraAccel, SimConfig};
    pub use crate::error::{SimError, SimResult};
    pub use crate::force::{BodyForce, ForceLaw, Spring};
    pub use crate::geometry::{CircularEdge, Edge, EdgeIdx, StraightEdge, Vertex, VertexIdx};
    pub use crate::joint::path::{CirclePath, ParametricPath, PathEndPoint, PathJoint};
    pub use crate::joint::{Connector, Joint, NormalFrame};
    pub use crate::sim::{AdvanceStats, BracketPolicy, CollisionAdvance, DiffEq, ImpulseSim, RungeKutta};
    pub use crate::solver::{ImpulseSolver, SolveStats};
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
