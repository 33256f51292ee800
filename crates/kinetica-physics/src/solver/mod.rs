//! Impulse solver for collisions, contacts, and joints.
//!
//! Given the collision records of one step, the solver computes impulse
//! magnitudes such that each non-joint record leaves with normal velocity
//! `-e v` (elasticity `e` = min of the two bodies') and each joint leaves
//! with normal velocity zero, then applies those impulses to the body
//! velocities. The distribution strategy is selected by
//! [`CollisionHandling`]: one big linear system, per-component systems, or a
//! serial loop over randomly chosen focus collisions with an optional
//! zero-elasticity cleanup pass.

pub mod matrix;

use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

use crate::body::RigidBody;
use crate::collision::RigidBodyCollision;
use crate::config::{CollisionHandling, ExtraAccel, MATRIX_ZERO_TOL};
use crate::error::{SimError, SimResult};

/// Impulse magnitudes below this are treated as "nothing happened".
const SMALL_IMPULSE: f64 = 1e-12;

/// Rate (per second) at which the distance bias restores a slow contact
/// toward the middle of its distance band. Only applies under
/// [`ExtraAccel::VelocityAndDistance`], and only to contacts approaching
/// slower than the velocity tolerance; bounces keep pure restitution.
const CONTACT_BIAS_RATE: f64 = 50.0;

/// Active-set pruning iterations per group solve.
const MAX_PRUNE_ROUNDS: usize = 10;

/// Default budget for the serial ricochet loop.
const SERIAL_ITERATION_BUDGET: usize = 1000;

/// Deterministic linear congruential generator for serial focus selection.
///
/// Reproducibility given a seed is part of the engine contract; the stream
/// must not depend on platform or build.
#[derive(Debug, Clone)]
pub struct Lcg {
    state: u64,
}

impl Lcg {
    /// Creates a generator from a seed.
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.state >> 33) as u32
    }

    /// Uniform index in `0..n`.
    pub fn next_index(&mut self, n: usize) -> usize {
        debug_assert!(n > 0);
        ((u64::from(self.next_u32()) * n as u64) >> 32) as usize
    }
}

/// Outcome of one solver invocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolveStats {
    /// Number of group solves performed.
    pub solves: usize,
    /// Number of impulses whose magnitude exceeded the noise floor.
    pub impulses_applied: usize,
    /// Serial-loop iterations consumed.
    pub serial_iterations: usize,
}

/// Impulse solver with its deterministic tie-breaking stream.
#[derive(Debug)]
pub struct ImpulseSolver {
    rng: Lcg,
    serial_budget: usize,
}

impl ImpulseSolver {
    /// Creates a solver; `seed` fixes the serial focus-selection stream.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Lcg::new(seed),
            serial_budget: SERIAL_ITERATION_BUDGET,
        }
    }

    /// Resolves all records, applying impulses to the bodies.
    ///
    /// # Errors
    /// [`SimError::StallDetected`] when the serial loop exceeds its budget;
    /// [`SimError::SingularMatrix`] when even the serial fallback cannot
    /// produce a consistent solution.
    pub fn handle_collisions(
        &mut self,
        records: &mut [RigidBodyCollision],
        bodies: &mut [RigidBody],
        handling: CollisionHandling,
        velocity_tol: f64,
        extra_accel: ExtraAccel,
    ) -> SimResult<SolveStats> {
        let mut stats = SolveStats::default();
        if records.is_empty() {
            return Ok(stats);
        }
        refresh_velocities(records, bodies);
        let ke_before = total_kinetic_energy(bodies);

        match handling {
            CollisionHandling::Simultaneous => {
                let all: Vec<usize> = (0..records.len()).collect();
                self.solve_group(&all, records, bodies, false, extra_accel, velocity_tol, &mut stats)?;
            }
            CollisionHandling::Hybrid => {
                for component in connected_components(records, bodies) {
                    self.solve_group(
                        &component,
                        records,
                        bodies,
                        false,
                        extra_accel,
                        velocity_tol,
                        &mut stats,
                    )?;
                    refresh_velocities(records, bodies);
                }
            }
            _ => {
                self.solve_serial(records, bodies, handling, velocity_tol, extra_accel, &mut stats)?;
            }
        }

        refresh_velocities(records, bodies);
        let ke_after = total_kinetic_energy(bodies);
        debug!(
            ke_before,
            ke_after,
            solves = stats.solves,
            "impulse solve finished"
        );
        Ok(stats)
    }

    /// Serial loop: pick a random violating record, handle it (with the
    /// joints of its bodies when grouped), repeat until quiescent.
    fn solve_serial(
        &mut self,
        records: &mut [RigidBodyCollision],
        bodies: &mut [RigidBody],
        handling: CollisionHandling,
        velocity_tol: f64,
        extra_accel: ExtraAccel,
        stats: &mut SolveStats,
    ) -> SimResult<()> {
        // A focus is worth handling while its approach is beyond a small
        // fraction of the velocity tolerance; joints while off zero.
        let quiescent_tol = velocity_tol * 1e-2;
        loop {
            refresh_velocities(records, bodies);
            let violators: Vec<usize> = (0..records.len())
                .filter(|&i| {
                    let r = &records[i];
                    if r.is_joint {
                        r.normal_velocity.abs() > quiescent_tol
                    } else {
                        r.normal_velocity < -quiescent_tol
                    }
                })
                .collect();
            if violators.is_empty() {
                break;
            }
            stats.serial_iterations += 1;
            if stats.serial_iterations > self.serial_budget {
                return Err(SimError::StallDetected {
                    iterations: stats.serial_iterations,
                });
            }
            let focus = violators[self.rng.next_index(violators.len())];
            let group = if handling.is_grouped() {
                let fb = (records[focus].primary_body, records[focus].normal_body);
                let mut g = vec![focus];
                for (i, r) in records.iter().enumerate() {
                    if i != focus
                        && r.is_joint
                        && [r.primary_body, r.normal_body]
                            .iter()
                            .any(|b| *b == fb.0 || *b == fb.1)
                    {
                        g.push(i);
                    }
                }
                g
            } else {
                vec![focus]
            };
            self.solve_group(&group, records, bodies, false, extra_accel, velocity_tol, stats)?;
        }

        if handling.has_last_pass() {
            refresh_velocities(records, bodies);
            let all: Vec<usize> = (0..records.len()).collect();
            self.solve_group(&all, records, bodies, true, extra_accel, velocity_tol, stats)?;
        }
        Ok(())
    }

    /// Solves one group of records simultaneously and applies the impulses.
    ///
    /// Non-joint records may not pull, so candidates whose solved impulse
    /// comes out negative are pruned and the group re-solved. A singular
    /// group falls back to handling its records one at a time.
    #[allow(clippy::too_many_arguments)]
    fn solve_group(
        &mut self,
        group: &[usize],
        records: &mut [RigidBodyCollision],
        bodies: &mut [RigidBody],
        last_pass: bool,
        extra_accel: ExtraAccel,
        velocity_tol: f64,
        stats: &mut SolveStats,
    ) -> SimResult<()> {
        // Only joints and approaching records take part in a bounce solve;
        // the last pass additionally cleans slow residuals but leaves
        // freshly bounced, fast-separating contacts alone.
        let mut active: Vec<usize> = group
            .iter()
            .copied()
            .filter(|&i| {
                let r = &records[i];
                if r.is_joint || r.normal_velocity < 0.0 {
                    return true;
                }
                last_pass
                    && !matches!(extra_accel, ExtraAccel::None)
                    && r.normal_velocity.abs() <= velocity_tol
            })
            .collect();

        for _ in 0..MAX_PRUNE_ROUNDS {
            if active.is_empty() {
                return Ok(());
            }
            let solved =
                self.solve_active(&active, records, bodies, last_pass, extra_accel, velocity_tol);
            let x = match solved {
                Ok(x) => x,
                Err(SimError::SingularMatrix { row }) => {
                    warn!(row, "singular impulse system, falling back to serial");
                    return self.solve_one_at_a_time(&active, records, bodies, last_pass, stats);
                }
                Err(e) => return Err(e),
            };
            stats.solves += 1;

            // Prune the strongest pulling contact, if any, and re-solve.
            let worst = active
                .iter()
                .enumerate()
                .filter(|(k, &i)| !records[i].is_joint && x[*k] < -SMALL_IMPULSE)
                .min_by(|a, b| x[a.0].partial_cmp(&x[b.0]).unwrap());
            if let Some((k, _)) = worst {
                active.remove(k);
                continue;
            }

            for (k, &i) in active.iter().enumerate() {
                if x[k].abs() > SMALL_IMPULSE {
                    records[i].apply_impulse(x[k], bodies);
                    stats.impulses_applied += 1;
                }
            }
            return Ok(());
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn solve_active(
        &self,
        active: &[usize],
        records: &[RigidBodyCollision],
        bodies: &[RigidBody],
        last_pass: bool,
        extra_accel: ExtraAccel,
        velocity_tol: f64,
    ) -> SimResult<DVector<f64>> {
        let k = active.len();
        let mut a = DMatrix::zeros(k, k);
        let mut b = DVector::zeros(k);
        for (ii, &i) in active.iter().enumerate() {
            let ri = &records[i];
            for (jj, &j) in active.iter().enumerate() {
                a[(ii, jj)] = ri.influence(&records[j], bodies);
            }
            b[ii] = target_change(ri, last_pass, extra_accel, velocity_tol);
        }
        matrix::solve_linear(&a, &b, MATRIX_ZERO_TOL)
    }

    /// Last-resort path for singular groups: each record handled alone with
    /// its scalar equation.
    fn solve_one_at_a_time(
        &self,
        active: &[usize],
        records: &mut [RigidBodyCollision],
        bodies: &mut [RigidBody],
        last_pass: bool,
        stats: &mut SolveStats,
    ) -> SimResult<()> {
        for &i in active {
            records[i].normal_velocity = records[i].current_normal_velocity(bodies);
            let a = records[i].influence(&records[i], bodies);
            if a <= SMALL_IMPULSE {
                debug!(record = i, "skipping record with no effective mass");
                continue;
            }
            let b = target_change(&records[i], last_pass, ExtraAccel::None, 0.0);
            let x = b / a;
            if !records[i].is_joint && x < 0.0 {
                continue;
            }
            if x.abs() > SMALL_IMPULSE {
                records[i].apply_impulse(x, bodies);
                stats.impulses_applied += 1;
            }
            stats.solves += 1;
        }
        Ok(())
    }
}

/// Desired change in normal velocity for one record.
fn target_change(
    r: &RigidBodyCollision,
    last_pass: bool,
    extra_accel: ExtraAccel,
    velocity_tol: f64,
) -> f64 {
    if r.is_joint {
        return -r.normal_velocity;
    }
    let restitution = if last_pass {
        -r.normal_velocity
    } else {
        -(1.0 + r.elasticity) * r.normal_velocity
    };
    restitution + distance_bias(r, extra_accel, velocity_tol)
}

/// Separation bias restoring a slow contact toward the middle of its
/// distance band, so resting bodies neither sink through their support nor
/// wander out of contact between impulse events.
fn distance_bias(r: &RigidBodyCollision, extra_accel: ExtraAccel, velocity_tol: f64) -> f64 {
    if !matches!(extra_accel, ExtraAccel::VelocityAndDistance) {
        return 0.0;
    }
    if r.normal_velocity.abs() > velocity_tol {
        return 0.0;
    }
    let mid = 0.5 * (r.accept_distance_low() + r.distance_tol);
    (CONTACT_BIAS_RATE * (mid - r.distance)).clamp(0.0, 0.5 * velocity_tol)
}

fn refresh_velocities(records: &mut [RigidBodyCollision], bodies: &[RigidBody]) {
    for r in records.iter_mut() {
        r.normal_velocity = r.current_normal_velocity(bodies);
    }
}

fn total_kinetic_energy(bodies: &[RigidBody]) -> f64 {
    bodies.iter().map(RigidBody::kinetic_energy).sum()
}

/// Groups record indices into components connected through shared moveable
/// bodies; fixed scenery does not link components together.
fn connected_components(records: &[RigidBodyCollision], bodies: &[RigidBody]) -> Vec<Vec<usize>> {
    let n = records.len();
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut Vec<usize>, i: usize) -> usize {
        let mut root = i;
        while parent[root] != root {
            root = parent[root];
        }
        let mut cur = i;
        while parent[cur] != root {
            let next = parent[cur];
            parent[cur] = root;
            cur = next;
        }
        root
    }

    for i in 0..n {
        for j in (i + 1)..n {
            let shares = [records[i].primary_body, records[i].normal_body]
                .iter()
                .any(|&b| {
                    bodies[b].is_finite_mass()
                        && (records[j].primary_body == b || records[j].normal_body == b)
                });
            if shares {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    parent[ri] = rj;
                }
            }
        }
    }

    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut roots: Vec<usize> = Vec::new();
    for i in 0..n {
        let root = find(&mut parent, i);
        match roots.iter().position(|&r| r == root) {
            Some(g) => groups[g].push(i),
            None => {
                roots.push(root);
                groups.push(vec![i]);
            }
        }
    }
    groups
}
