//! Simulation core: the ODE-facing impulse simulation and its event-driven
//! advance driver.

pub mod advance;
pub mod impulse_sim;
pub mod ode;

pub use advance::{AdvanceStats, BracketPolicy, CollisionAdvance};
pub use impulse_sim::{ImpulseSim, VARS_PER_BODY};
pub use ode::{DiffEq, RungeKutta};
