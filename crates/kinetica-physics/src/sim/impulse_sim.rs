//! The impulse-based rigid body simulation.
//!
//! [`ImpulseSim`] owns the bodies, connectors, and force laws, exposes the
//! ODE derivative over its variable vector, and resolves collisions through
//! the impulse solver. Contacts never appear in the ODE: between collision
//! events the only forces are gravity, damping, and the attached force laws;
//! everything impulsive happens at step boundaries under the control of the
//! advance driver.
//!
//! Variable layout: body `i` owns variables `6i .. 6i+6` in the order
//! `x, vx, y, vy, angle, omega`; after all bodies come the time variable
//! and the kinetic, potential, and total energy trackers.

use kinetica_core::math::Vec2;
use kinetica_core::sim_list::SimList;
use kinetica_core::vars::VarsList;
use tracing::info;

use crate::body::RigidBody;
use crate::collision::{detect, CollisionGeometry, RigidBodyCollision};
use crate::config::SimConfig;
use crate::error::{SimError, SimResult};
use crate::force::{BodyForce, ForceLaw};
use crate::joint::Connector;
use crate::sim::ode::DiffEq;
use crate::solver::{ImpulseSolver, SolveStats};

/// Number of state variables per rigid body.
pub const VARS_PER_BODY: usize = 6;

/// Impulse-based rigid body simulation.
pub struct ImpulseSim {
    config: SimConfig,
    gravity: f64,
    damping: f64,
    bodies: Vec<RigidBody>,
    connectors: Vec<Box<dyn Connector>>,
    force_laws: Vec<Box<dyn ForceLaw>>,
    vars: VarsList,
    sim_list: SimList,
    solver: ImpulseSolver,
    force_buffer: Vec<BodyForce>,
    saved_vars: Option<Vec<f64>>,
}

impl ImpulseSim {
    /// Creates an empty simulation.
    ///
    /// # Errors
    /// Returns [`SimError::InvalidConfiguration`] for out-of-range settings.
    pub fn new(config: SimConfig) -> SimResult<Self> {
        config.validate()?;
        let vars = Self::build_vars(0);
        Ok(Self {
            config,
            gravity: 0.0,
            damping: 0.0,
            bodies: Vec::new(),
            connectors: Vec::new(),
            force_laws: Vec::new(),
            vars,
            sim_list: SimList::new(),
            solver: ImpulseSolver::new(0),
            force_buffer: Vec::new(),
            saved_vars: None,
        })
    }

    fn build_vars(num_bodies: usize) -> VarsList {
        let mut names = Vec::with_capacity(VARS_PER_BODY * num_bodies + 4);
        for i in 0..num_bodies {
            for suffix in ["x", "vx", "y", "vy", "angle", "omega"] {
                names.push(format!("{suffix}{i}"));
            }
        }
        let time_index = names.len();
        names.push("time".to_string());
        names.push("ke".to_string());
        names.push("pe".to_string());
        names.push("te".to_string());
        VarsList::new(names, time_index)
    }

    /// Engine configuration.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Current simulation time.
    pub fn time(&self) -> f64 {
        self.vars.time()
    }

    /// The variable list.
    pub fn vars(&self) -> &VarsList {
        &self.vars
    }

    /// The object registry; register listeners here.
    pub fn sim_list_mut(&mut self) -> &mut SimList {
        &mut self.sim_list
    }

    /// All bodies in id order.
    pub fn bodies(&self) -> &[RigidBody] {
        &self.bodies
    }

    /// Body by id.
    pub fn body(&self, id: usize) -> &RigidBody {
        &self.bodies[id]
    }

    /// Mutable body access for scene setup; call
    /// [`ImpulseSim::initialize_from_body`] afterwards so the variables
    /// match the body again.
    pub fn body_mut(&mut self, id: usize) -> &mut RigidBody {
        &mut self.bodies[id]
    }

    /// Downward gravitational acceleration.
    pub fn gravity(&self) -> f64 {
        self.gravity
    }

    /// Sets gravity, broadcasting the parameter change.
    pub fn set_gravity(&mut self, gravity: f64) {
        self.gravity = gravity;
        self.sim_list.parameter_changed("GRAVITY");
    }

    /// Sets the viscous damping coefficient.
    pub fn set_damping(&mut self, damping: f64) {
        self.damping = damping;
        self.sim_list.parameter_changed("DAMPING");
    }

    /// Sets the collision handling mode.
    pub fn set_collision_handling(&mut self, handling: crate::config::CollisionHandling) {
        self.config.collision_handling = handling;
        self.sim_list.parameter_changed("COLLISION_HANDLING");
    }

    /// Sets the canonical tolerances and propagates them to every body.
    pub fn set_tolerances(&mut self, distance_tol: f64, velocity_tol: f64, accuracy: f64) {
        self.config.distance_tol = distance_tol;
        self.config.velocity_tol = velocity_tol;
        self.config.accuracy = accuracy;
        for body in &mut self.bodies {
            body.set_tolerances(distance_tol, velocity_tol, accuracy);
        }
        self.sim_list.parameter_changed("TOLERANCES");
    }

    /// Sets every body's coefficient of restitution.
    pub fn set_elasticity(&mut self, elasticity: f64) {
        for body in &mut self.bodies {
            body.set_elasticity(elasticity);
        }
        self.sim_list.parameter_changed("ELASTICITY");
    }

    /// Adds a body, returning its id.
    pub fn add_body(&mut self, mut body: RigidBody) -> usize {
        let id = self.bodies.len();
        body.set_id(id);
        body.set_tolerances(
            self.config.distance_tol,
            self.config.velocity_tol,
            self.config.accuracy,
        );
        let name = body.name().to_string();
        self.bodies.push(body);
        self.rebuild_vars();
        self.sim_list.add(id, name);
        info!(id, "added body");
        id
    }

    /// Removes a body and every connector referencing it.
    ///
    /// Bodies after `id` shift down by one and are re-numbered; connectors
    /// and force laws referencing them must be re-created by the caller.
    pub fn remove_body(&mut self, id: usize) {
        self.connectors.retain(|c| {
            let (a, b) = c.bodies();
            a != id && b != id
        });
        self.bodies.remove(id);
        for (i, body) in self.bodies.iter_mut().enumerate() {
            body.set_id(i);
        }
        self.rebuild_vars();
        self.sim_list.remove(id);
        info!(id, "removed body");
    }

    /// Adds a connector; with `align` the constraint is zeroed by moving
    /// the attached bodies first.
    ///
    /// # Errors
    /// Returns [`SimError::CapabilityMismatch`] when the connector
    /// references a body that is not part of this simulation.
    pub fn add_connector(
        &mut self,
        mut connector: Box<dyn Connector>,
        align: bool,
    ) -> SimResult<usize> {
        let (a, b) = connector.bodies();
        if a >= self.bodies.len() || b >= self.bodies.len() {
            return Err(SimError::CapabilityMismatch {
                operation: "connecting a body outside the simulation",
            });
        }
        if align {
            connector.align(&mut self.bodies);
        }
        self.connectors.push(connector);
        self.initialize_from_bodies();
        Ok(self.connectors.len() - 1)
    }

    /// Reseeds the impulse solver's deterministic tie-breaking stream.
    pub fn set_solver_seed(&mut self, seed: u64) {
        self.solver = ImpulseSolver::new(seed);
    }

    /// Adds a force law.
    pub fn add_force_law(&mut self, law: Box<dyn ForceLaw>) -> usize {
        self.force_laws.push(law);
        self.force_laws.len() - 1
    }

    /// Copies one body's pose and velocities into the variables.
    pub fn initialize_from_body(&mut self, id: usize) {
        self.write_body_vars(id, false);
        self.update_energy_vars();
    }

    /// Copies every body's state into the variables.
    pub fn initialize_from_bodies(&mut self) {
        for id in 0..self.bodies.len() {
            self.write_body_vars(id, false);
        }
        self.update_energy_vars();
    }

    fn rebuild_vars(&mut self) {
        let time = self.vars.time();
        self.vars = Self::build_vars(self.bodies.len());
        let ti = self.vars.time_index();
        self.vars.set_value(ti, time);
        self.force_buffer
            .resize(self.bodies.len(), BodyForce::default());
        self.initialize_from_bodies();
    }

    fn write_body_vars(&mut self, id: usize, discontinuous: bool) {
        let body = &self.bodies[id];
        let base = VARS_PER_BODY * id;
        let values = [
            body.get_position().x,
            body.velocity().x,
            body.get_position().y,
            body.velocity().y,
            body.get_angle(),
            body.angular_velocity(),
        ];
        for (k, v) in values.into_iter().enumerate() {
            if discontinuous {
                self.vars.set_value_discontinuous(base + k, v);
            } else {
                self.vars.set_value(base + k, v);
            }
        }
    }

    fn sync_bodies_from(&mut self, vars: &[f64]) {
        for (i, body) in self.bodies.iter_mut().enumerate() {
            let base = VARS_PER_BODY * i;
            body.set_position(Vec2::new(vars[base], vars[base + 2]));
            body.set_angle(vars[base + 4]);
            body.set_velocity(Vec2::new(vars[base + 1], vars[base + 3]), vars[base + 5]);
        }
    }

    /// Propagates the variables into body poses and refreshes the energy
    /// trackers.
    pub fn modify_objects(&mut self) {
        let values: &[f64] = self.vars.values();
        let n = self.bodies.len();
        for i in 0..n {
            let base = VARS_PER_BODY * i;
            let x = values[base];
            let vx = values[base + 1];
            let y = values[base + 2];
            let vy = values[base + 3];
            let angle = values[base + 4];
            let omega = values[base + 5];
            let body = &mut self.bodies[i];
            body.set_position(Vec2::new(x, y));
            body.set_angle(angle);
            body.set_velocity(Vec2::new(vx, vy), omega);
        }
        self.update_energy_vars();
    }

    /// Total kinetic energy of the moveable bodies.
    pub fn kinetic_energy(&self) -> f64 {
        self.bodies.iter().map(RigidBody::kinetic_energy).sum()
    }

    /// Gravitational potential (zero level at `y = 0`) plus force law
    /// potentials.
    pub fn potential_energy(&self) -> f64 {
        let gravity: f64 = self
            .bodies
            .iter()
            .filter(|b| b.is_finite_mass())
            .map(|b| b.get_mass() * self.gravity * b.get_position().y)
            .sum();
        let laws: f64 = self
            .force_laws
            .iter()
            .map(|l| l.potential_energy(&self.bodies))
            .sum();
        gravity + laws
    }

    /// Kinetic plus potential energy.
    pub fn total_energy(&self) -> f64 {
        self.kinetic_energy() + self.potential_energy()
    }

    fn update_energy_vars(&mut self) {
        let ke = self.kinetic_energy();
        let pe = self.potential_energy();
        let ti = self.vars.time_index();
        self.vars.set_value(ti + 1, ke);
        self.vars.set_value(ti + 2, pe);
        self.vars.set_value(ti + 3, ke + pe);
    }

    /// Snapshots the variables and the bodies' old-pose copies.
    pub fn save_state(&mut self) {
        self.saved_vars = Some(self.vars.values().to_vec());
        for body in &mut self.bodies {
            body.save_old_copy();
        }
    }

    /// Restores the last saved snapshot. The bodies' old-pose copies are
    /// left at the snapshot pose so continuous detection still sees the
    /// interval start.
    ///
    /// # Errors
    /// Returns [`SimError::CapabilityMismatch`] when nothing was saved.
    pub fn restore_state(&mut self) -> SimResult<()> {
        let Some(saved) = self.saved_vars.take() else {
            return Err(SimError::CapabilityMismatch {
                operation: "restore without a saved state",
            });
        };
        self.vars.set_values(&saved);
        self.saved_vars = Some(saved);
        self.modify_objects();
        Ok(())
    }

    /// Runs the detector and the connectors, appending records to `out`.
    pub fn find_collisions(&mut self, out: &mut Vec<RigidBodyCollision>, step_size: f64) {
        let time = self.vars.time();
        detect::find_collisions(out, &self.bodies, time, step_size);
        for (i, connector) in self.connectors.iter_mut().enumerate() {
            connector.add_collision(out, &self.bodies, time, i);
        }
    }

    /// Refreshes every record from the current poses; records whose update
    /// degenerates are dropped.
    pub fn update_collisions(&mut self, records: &mut Vec<RigidBodyCollision>) {
        let time = self.vars.time();
        let bodies = &self.bodies;
        let connectors = &mut self.connectors;
        records.retain_mut(|record| match record.geometry {
            CollisionGeometry::Connector { connector } => connectors[connector]
                .update_collision(record, bodies, time)
                .is_ok(),
            _ => record.update_collision(time, bodies).is_ok(),
        });
    }

    /// Resolves the given records with the impulse solver and writes the
    /// resulting velocities back into the variables as discontinuous
    /// changes.
    pub fn handle_collisions(
        &mut self,
        records: &mut [RigidBodyCollision],
    ) -> SimResult<SolveStats> {
        let stats = self.solver.handle_collisions(
            records,
            &mut self.bodies,
            self.config.collision_handling,
            self.config.velocity_tol,
            self.config.extra_accel,
        )?;
        if stats.impulses_applied > 0 {
            for id in 0..self.bodies.len() {
                self.write_body_vars(id, true);
            }
            self.update_energy_vars();
        }
        Ok(stats)
    }
}

impl DiffEq for ImpulseSim {
    fn num_vars(&self) -> usize {
        self.vars.len()
    }

    fn var_values(&self) -> &[f64] {
        self.vars.values()
    }

    fn set_var_values(&mut self, values: &[f64]) {
        self.vars.set_values(values);
        self.modify_objects();
    }

    fn evaluate(&mut self, vars: &[f64], change: &mut [f64], _dt: f64) -> SimResult<()> {
        self.sync_bodies_from(vars);
        for f in &mut self.force_buffer {
            *f = BodyForce::default();
        }
        for law in &self.force_laws {
            law.apply(&self.bodies, &mut self.force_buffer);
        }

        change.fill(0.0);
        for (i, body) in self.bodies.iter().enumerate() {
            let base = VARS_PER_BODY * i;
            if !body.is_finite_mass() {
                continue;
            }
            let mass = body.get_mass();
            let moment = body.get_inertia();
            let vx = vars[base + 1];
            let vy = vars[base + 3];
            let omega = vars[base + 5];
            let accum = &self.force_buffer[i];
            let fx = accum.force.x - self.damping * vx;
            let fy = accum.force.y - self.damping * vy;
            let torque = accum.torque - self.damping * omega;
            change[base] = vx;
            change[base + 1] = fx / mass;
            change[base + 2] = vy;
            change[base + 3] = fy / mass - self.gravity;
            change[base + 4] = omega;
            change[base + 5] = torque / moment;
        }
        change[self.vars.time_index()] = 1.0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::shapes;
    use crate::config::SimConfig;
    use crate::sim::ode::RungeKutta;
    use approx::assert_relative_eq;

    fn sim_with_falling_block() -> ImpulseSim {
        let mut sim = ImpulseSim::new(SimConfig::default()).unwrap();
        sim.set_gravity(10.0);
        let block = shapes::make_block("b", 1.0, 1.0, 2.0).unwrap();
        let id = sim.add_body(block);
        sim.body_mut(id).set_position(Vec2::new(0.0, 5.0));
        sim.initialize_from_body(id);
        sim
    }

    #[test]
    fn test_var_layout() {
        let sim = sim_with_falling_block();
        assert_eq!(sim.vars().len(), 6 + 4);
        assert_eq!(sim.vars().time_index(), 6);
        assert_eq!(sim.vars().name(0), "x0");
        assert_eq!(sim.vars().name(4), "angle0");
        assert_relative_eq!(sim.vars().value(2), 5.0);
    }

    #[test]
    fn test_evaluate_layout_and_gravity() {
        let mut sim = sim_with_falling_block();
        let vars = sim.var_values().to_vec();
        let mut change = vec![0.0; vars.len()];
        sim.evaluate(&vars, &mut change, 0.0).unwrap();
        assert_relative_eq!(change[0], 0.0);
        assert_relative_eq!(change[3], -10.0);
        assert_relative_eq!(change[6], 1.0, epsilon = 1e-15);
    }

    #[test]
    fn test_infinite_mass_has_zero_derivatives() {
        let mut sim = ImpulseSim::new(SimConfig::default()).unwrap();
        sim.set_gravity(10.0);
        let floor = shapes::make_block("floor", 10.0, 1.0, f64::INFINITY).unwrap();
        sim.add_body(floor);
        let vars = sim.var_values().to_vec();
        let mut change = vec![0.0; vars.len()];
        sim.evaluate(&vars, &mut change, 0.0).unwrap();
        for c in &change[0..6] {
            assert_eq!(*c, 0.0);
        }
    }

    #[test]
    fn test_rk4_free_fall_through_sim() {
        let mut sim = sim_with_falling_block();
        let mut rk = RungeKutta::new();
        for _ in 0..100 {
            rk.step(&mut sim, 0.01).unwrap();
        }
        // y = 5 - 5 t^2 at t = 1.
        assert_relative_eq!(sim.body(0).get_position().y, 0.0, epsilon = 1e-9);
        assert_relative_eq!(sim.body(0).velocity().y, -10.0, epsilon = 1e-9);
        assert_relative_eq!(sim.time(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_save_restore_round_trip() {
        let mut sim = sim_with_falling_block();
        sim.save_state();
        let before = sim.var_values().to_vec();
        let mut rk = RungeKutta::new();
        for _ in 0..10 {
            rk.step(&mut sim, 0.01).unwrap();
        }
        assert!(sim.var_values() != before.as_slice());
        sim.restore_state().unwrap();
        assert_eq!(sim.var_values(), before.as_slice());
        assert_relative_eq!(sim.body(0).get_position().y, 5.0);
    }

    #[test]
    fn test_restore_without_save_fails() {
        let mut sim = sim_with_falling_block();
        assert!(matches!(
            sim.restore_state(),
            Err(SimError::CapabilityMismatch { .. })
        ));
    }

    #[test]
    fn test_energy_tracking() {
        let mut sim = sim_with_falling_block();
        sim.modify_objects();
        let ti = sim.vars().time_index();
        // At rest at height 5 with m = 2, g = 10: PE = 100, KE = 0.
        assert_relative_eq!(sim.vars().value(ti + 1), 0.0);
        assert_relative_eq!(sim.vars().value(ti + 2), 100.0);
        assert_relative_eq!(sim.vars().value(ti + 3), 100.0);
    }

    #[test]
    fn test_energy_conserved_in_free_fall() {
        let mut sim = sim_with_falling_block();
        let e0 = sim.total_energy();
        let mut rk = RungeKutta::new();
        for _ in 0..50 {
            rk.step(&mut sim, 0.01).unwrap();
        }
        assert_relative_eq!(sim.total_energy(), e0, epsilon = 1e-9);
    }

    #[test]
    fn test_damping_slows_body() {
        let mut sim = ImpulseSim::new(SimConfig::default()).unwrap();
        sim.set_damping(1.0);
        let block = shapes::make_block("b", 1.0, 1.0, 1.0).unwrap();
        let id = sim.add_body(block);
        sim.body_mut(id).set_velocity(Vec2::new(2.0, 0.0), 0.0);
        sim.initialize_from_body(id);
        let mut rk = RungeKutta::new();
        for _ in 0..100 {
            rk.step(&mut sim, 0.01).unwrap();
        }
        // v(t) = 2 e^{-t} with unit mass and damping.
        assert_relative_eq!(
            sim.body(id).velocity().x,
            2.0 * (-1.0_f64).exp(),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_sim_list_events_on_add() {
        use kinetica_core::sim_list::{SimEvent, SimListener};
        use std::cell::RefCell;
        use std::rc::Rc;

        struct Recorder(Rc<RefCell<Vec<String>>>);
        impl SimListener for Recorder {
            fn on_sim_event(&mut self, event: &SimEvent) {
                self.0.borrow_mut().push(event.name().to_string());
            }
        }

        let log = Rc::new(RefCell::new(Vec::new()));
        let mut sim = ImpulseSim::new(SimConfig::default()).unwrap();
        sim.sim_list_mut()
            .add_listener(Box::new(Recorder(log.clone())));
        let block = shapes::make_block("b", 1.0, 1.0, 1.0).unwrap();
        sim.add_body(block);
        sim.set_gravity(10.0);
        assert_eq!(
            log.borrow().as_slice(),
            ["OBJECT_ADDED", "PARAMETER_CHANGED"]
        );
    }
}
