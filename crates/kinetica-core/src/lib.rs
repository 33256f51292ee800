//! Kinetica Core Library
//!
//! Shared kernel for the kinetica 2D physics engine. Provides the pieces
//! that every simulation needs regardless of its dynamics:
//!
//! - **Planar math**: 2D vectors, scalar cross products, affine transforms,
//!   body poses, axis-aligned rectangles
//! - **State variables**: the [`VarsList`] store with discontinuity
//!   sequence numbers
//! - **Object registry**: the [`SimList`] with typed, synchronously
//!   delivered observer events
//!
//! The conventions are the usual mathematical ones: y increases upward and
//! angles increase counter-clockwise.
//!
//! # Example
//!
//! ```rust
//! use kinetica_core::math::{Pose, Vec2};
//!
//! let pose = Pose::new(Vec2::new(2.0, 1.0), std::f64::consts::FRAC_PI_2);
//! let world = pose.position() + pose.rotate(Vec2::new(1.0, 0.0));
//! assert!((world.x - 2.0).abs() < 1e-12);
//! assert!((world.y - 2.0).abs() < 1e-12);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod math;
pub mod sim_list;
pub mod util;
pub mod vars;

pub use math::{AffineTransform, Pose, Rect, Vec2};
pub use sim_list::{SimEvent, SimList, SimListener, SimObjectInfo};
pub use vars::VarsList;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::math::{cross, perp, AffineTransform, Pose, Rect, Vec2};
    pub use crate::sim_list::{SimEvent, SimList, SimListener, SimObjectInfo};
    pub use crate::util::{limit_angle, very_different};
    pub use crate::vars::VarsList;
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
