//! Event-driven time stepping with collision bracketing.
//!
//! [`CollisionAdvance`] drives an [`ImpulseSim`] through macro-steps. Each
//! iteration integrates as far as the remaining budget allows, detects
//! collisions at the end state, and, when something interpenetrates, backs
//! up by bisecting the interval until every pending collision sits inside
//! its acceptance band. Accepted collisions are resolved with impulses and
//! integration resumes on the remaining budget.
//!
//! On bracketing failure the driver either proceeds with the penetrating
//! state and lets the solver cope (the default, matching impulse engines in
//! practice) or reports [`SimError::BisectionExhausted`] with the
//! pre-integration snapshot restored.

use tracing::{debug, warn};

use crate::collision::RigidBodyCollision;
use crate::error::{SimError, SimResult};
use crate::sim::impulse_sim::ImpulseSim;
use crate::sim::ode::RungeKutta;

/// Threshold below which an approach velocity still counts as "moving in".
const APPROACH_EPS: f64 = 1e-10;

/// What to do when bisection cannot bracket a collision in budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BracketPolicy {
    /// Accept the deepest state found and apply impulses anyway.
    AdvanceAnyway,
    /// Restore the pre-integration snapshot and report the failure.
    Fail,
}

/// Counters from one `advance` call.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdvanceStats {
    /// Accepted integration intervals.
    pub steps: usize,
    /// Impulse solves triggered.
    pub collision_events: usize,
    /// Bisection probes performed.
    pub bisections: usize,
}

/// Time-stepping driver with event bracketing and state restoration.
pub struct CollisionAdvance {
    ode: RungeKutta,
    max_bisections: usize,
    event_budget: usize,
    policy: BracketPolicy,
    records: Vec<RigidBodyCollision>,
}

impl Default for CollisionAdvance {
    fn default() -> Self {
        Self::new()
    }
}

impl CollisionAdvance {
    /// Creates a driver with the default budgets.
    pub fn new() -> Self {
        Self {
            ode: RungeKutta::new(),
            max_bisections: 24,
            event_budget: 1000,
            policy: BracketPolicy::AdvanceAnyway,
            records: Vec::new(),
        }
    }

    /// Sets the max bisection probes per bracketing search.
    pub fn set_max_bisections(&mut self, max: usize) {
        self.max_bisections = max;
    }

    /// Sets the max impulse solves per `advance` call.
    pub fn set_event_budget(&mut self, budget: usize) {
        self.event_budget = budget;
    }

    /// Sets the bracketing failure policy.
    pub fn set_policy(&mut self, policy: BracketPolicy) {
        self.policy = policy;
    }

    /// Collision records of the most recent detection pass, for observers.
    pub fn last_records(&self) -> &[RigidBodyCollision] {
        &self.records
    }

    /// Advances the simulation by `dt`, handling every collision event
    /// inside the interval.
    ///
    /// # Errors
    /// [`SimError::BisectionExhausted`] under [`BracketPolicy::Fail`];
    /// [`SimError::StallDetected`] when the event budget runs out or the
    /// driver stops making progress. In both cases the simulation is
    /// restored to the last fully-accepted snapshot.
    pub fn advance(&mut self, sim: &mut ImpulseSim, dt: f64) -> SimResult<AdvanceStats> {
        let mut stats = AdvanceStats::default();
        let mut remaining = dt;
        let mut tiny_steps = 0;
        while remaining > dt * 1e-12 {
            sim.save_state();
            let mut h = remaining;
            self.integrate_and_detect(sim, h)?;

            if self.records.iter().any(RigidBodyCollision::needs_bracketing) {
                h = self.bracket(sim, h, &mut stats)?;
            }

            if h <= remaining * 1e-9 {
                tiny_steps += 1;
                if tiny_steps > 3 {
                    sim.restore_state()?;
                    return Err(SimError::StallDetected {
                        iterations: stats.collision_events,
                    });
                }
            } else {
                tiny_steps = 0;
            }

            let velocity_tol = sim.config().velocity_tol;
            let joint_trigger = velocity_tol * 1e-2;
            let needs_solve = self.records.iter().any(|c| {
                if c.is_joint {
                    c.normal_velocity.abs() > joint_trigger
                } else {
                    c.distance <= c.distance_tol && c.normal_velocity < -APPROACH_EPS
                }
            });
            if needs_solve {
                stats.collision_events += 1;
                if stats.collision_events > self.event_budget {
                    sim.restore_state()?;
                    return Err(SimError::StallDetected {
                        iterations: stats.collision_events,
                    });
                }
                debug!(
                    time = sim.time(),
                    records = self.records.len(),
                    "resolving collision event"
                );
                if let Err(err) = sim.handle_collisions(&mut self.records) {
                    sim.restore_state()?;
                    return Err(err);
                }
            }

            stats.steps += 1;
            remaining -= h;
        }
        Ok(stats)
    }

    fn integrate_and_detect(&mut self, sim: &mut ImpulseSim, h: f64) -> SimResult<()> {
        self.ode.step(sim, h)?;
        self.records.clear();
        sim.find_collisions(&mut self.records, h);
        Ok(())
    }

    /// Bisects the interval `(0, h0]` until every pending collision lands
    /// inside its acceptance band; returns the accepted interval length with
    /// the simulation integrated to it.
    fn bracket(
        &mut self,
        sim: &mut ImpulseSim,
        h0: f64,
        stats: &mut AdvanceStats,
    ) -> SimResult<f64> {
        let mut lo = 0.0_f64;
        let mut hi = h0;
        for _ in 0..self.max_bisections {
            let mid = 0.5 * (lo + hi);
            if mid <= h0 * 1e-12 {
                break;
            }
            stats.bisections += 1;
            sim.restore_state()?;
            self.integrate_and_detect(sim, mid)?;
            if self.records.iter().any(RigidBodyCollision::needs_bracketing) {
                hi = mid;
            } else if self.records.iter().any(|c| {
                !c.is_joint && c.within_acceptance_band() && c.normal_velocity < -APPROACH_EPS
            }) {
                return Ok(mid);
            } else {
                // Nothing worth handling yet: the collision lies later in
                // the interval.
                lo = mid;
            }
        }

        match self.policy {
            BracketPolicy::Fail => {
                sim.restore_state()?;
                Err(SimError::BisectionExhausted {
                    steps: self.max_bisections,
                })
            }
            BracketPolicy::AdvanceAnyway => {
                warn!(
                    hi,
                    "bisection budget exhausted, advancing with penetration"
                );
                sim.restore_state()?;
                self.integrate_and_detect(sim, hi)?;
                Ok(hi)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::shapes;
    use crate::config::SimConfig;
    use approx::assert_relative_eq;
    use kinetica_core::math::Vec2;

    fn floor_sim(elasticity: f64) -> ImpulseSim {
        let mut sim = ImpulseSim::new(SimConfig::default()).unwrap();
        sim.set_gravity(10.0);
        let floor = shapes::make_block("floor", 20.0, 1.0, f64::INFINITY).unwrap();
        let fid = sim.add_body(floor);
        sim.body_mut(fid).set_position(Vec2::new(0.0, -0.5));
        sim.initialize_from_body(fid);
        sim.set_elasticity(elasticity);
        sim
    }

    #[test]
    fn test_free_flight_has_no_events() {
        let mut sim = floor_sim(1.0);
        let id = sim.add_body(shapes::make_block("b", 1.0, 1.0, 1.0).unwrap());
        sim.body_mut(id).set_position(Vec2::new(0.0, 5.0));
        sim.initialize_from_body(id);
        let mut advance = CollisionAdvance::new();
        let stats = advance.advance(&mut sim, 0.1).unwrap();
        assert_eq!(stats.collision_events, 0);
        assert_relative_eq!(sim.time(), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_block_bounces_elastically() {
        let mut sim = floor_sim(1.0);
        let id = sim.add_body(shapes::make_block("b", 1.0, 1.0, 1.0).unwrap());
        // Bottom face 1.0 above the floor plane.
        sim.body_mut(id).set_position(Vec2::new(0.0, 1.5));
        sim.initialize_from_body(id);
        let mut advance = CollisionAdvance::new();
        // Fall time to contact is sqrt(2 * 1 / 10) ~ 0.447.
        let mut t = 0.0;
        while t < 0.6 {
            advance.advance(&mut sim, 0.025).unwrap();
            t += 0.025;
        }
        // After the bounce the block moves upward at nearly the impact
        // speed sqrt(20).
        let v = sim.body(id).velocity().y;
        assert!(v > 0.0, "block should be moving up, got {v}");
        assert_relative_eq!(v, 20.0_f64.sqrt(), epsilon = 0.5);
    }

    #[test]
    fn test_inelastic_block_comes_to_rest() {
        let mut sim = floor_sim(0.0);
        let id = sim.add_body(shapes::make_block("b", 1.0, 1.0, 1.0).unwrap());
        sim.body_mut(id).set_position(Vec2::new(0.0, 0.7));
        sim.initialize_from_body(id);
        let mut advance = CollisionAdvance::new();
        for _ in 0..40 {
            advance.advance(&mut sim, 0.025).unwrap();
        }
        let body = sim.body(id);
        assert!(body.velocity().norm() <= sim.config().velocity_tol);
        // Resting just above the floor plane, inside the band.
        let gap = body.get_position().y - 0.5;
        assert!(gap >= -0.001 && gap <= 0.011, "gap {gap} outside band");
    }

    #[test]
    fn test_fail_policy_restores_snapshot() {
        let mut sim = floor_sim(1.0);
        let id = sim.add_body(shapes::make_block("b", 1.0, 1.0, 1.0).unwrap());
        // Start just above contact moving down fast: bracketing certain.
        sim.body_mut(id).set_position(Vec2::new(0.0, 0.52));
        sim.body_mut(id).set_velocity(Vec2::new(0.0, -5.0), 0.0);
        sim.initialize_from_body(id);
        let mut advance = CollisionAdvance::new();
        advance.set_policy(BracketPolicy::Fail);
        advance.set_max_bisections(0);
        let t0 = sim.time();
        let y0 = sim.body(id).get_position().y;
        let err = advance.advance(&mut sim, 0.025).unwrap_err();
        assert!(matches!(err, SimError::BisectionExhausted { .. }));
        assert_relative_eq!(sim.time(), t0, epsilon = 1e-12);
        assert_relative_eq!(sim.body(id).get_position().y, y0, epsilon = 1e-12);
    }
}
