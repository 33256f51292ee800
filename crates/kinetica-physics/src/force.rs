//! Force laws applied between collision events.
//!
//! Force laws contribute smooth forces to the equations of motion; they are
//! evaluated inside the ODE derivative and must not allocate. Gravity and
//! viscous damping are owned by the simulation itself; anything else (a
//! spring, a thruster) implements [`ForceLaw`] and accumulates into the
//! per-body buffers.

use kinetica_core::math::{cross, Vec2};

use crate::body::RigidBody;
use crate::config::TINY_POSITIVE;

/// Accumulated force and torque on one body for the current derivative
/// evaluation.
#[derive(Debug, Clone, Copy, Default)]
pub struct BodyForce {
    /// Net force on the center of mass.
    pub force: Vec2,
    /// Net torque about the center of mass.
    pub torque: f64,
}

impl BodyForce {
    /// Adds a force applied at the world point `at` on a body centered at
    /// `cm`.
    pub fn add_force_at(&mut self, force: Vec2, at: Vec2, cm: Vec2) {
        self.force += force;
        self.torque += cross(at - cm, force);
    }
}

/// A smooth force contribution to the equations of motion.
pub trait ForceLaw {
    /// Display name.
    fn name(&self) -> &str;

    /// Accumulates this law's forces into `accum`, one slot per body.
    fn apply(&self, bodies: &[RigidBody], accum: &mut [BodyForce]);

    /// Potential energy stored by this law, for the energy bookkeeping.
    fn potential_energy(&self, bodies: &[RigidBody]) -> f64 {
        let _ = bodies;
        0.0
    }
}

/// Linear spring between attachment points on two bodies.
#[derive(Debug, Clone)]
pub struct Spring {
    name: String,
    body1: usize,
    attach1: Vec2,
    body2: usize,
    attach2: Vec2,
    rest_length: f64,
    stiffness: f64,
}

impl Spring {
    /// Creates a spring between `attach1` on `body1` and `attach2` on
    /// `body2`, both in body coordinates.
    pub fn new(
        name: impl Into<String>,
        body1: usize,
        attach1: Vec2,
        body2: usize,
        attach2: Vec2,
        rest_length: f64,
        stiffness: f64,
    ) -> Self {
        Self {
            name: name.into(),
            body1,
            attach1,
            body2,
            attach2,
            rest_length,
            stiffness,
        }
    }

    fn stretch(&self, bodies: &[RigidBody]) -> (Vec2, f64) {
        let p1 = bodies[self.body1].body_to_world(self.attach1);
        let p2 = bodies[self.body2].body_to_world(self.attach2);
        let d = p2 - p1;
        (d, d.norm())
    }
}

impl ForceLaw for Spring {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, bodies: &[RigidBody], accum: &mut [BodyForce]) {
        let (d, len) = self.stretch(bodies);
        if len < TINY_POSITIVE {
            return;
        }
        let magnitude = self.stiffness * (len - self.rest_length);
        let f = (magnitude / len) * d;
        let p1 = bodies[self.body1].body_to_world(self.attach1);
        let p2 = bodies[self.body2].body_to_world(self.attach2);
        accum[self.body1].add_force_at(f, p1, bodies[self.body1].get_position());
        accum[self.body2].add_force_at(-f, p2, bodies[self.body2].get_position());
    }

    fn potential_energy(&self, bodies: &[RigidBody]) -> f64 {
        let (_, len) = self.stretch(bodies);
        let x = len - self.rest_length;
        0.5 * self.stiffness * x * x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::shapes;
    use approx::assert_relative_eq;

    #[test]
    fn test_spring_pulls_toward_anchor() {
        let mut anchor = shapes::make_block("anchor", 0.5, 0.5, f64::INFINITY).unwrap();
        let mut ball = shapes::make_ball("ball", 0.1, 1.0).unwrap();
        anchor.set_id(0);
        ball.set_id(1);
        ball.set_position(Vec2::new(3.0, 0.0));
        let bodies = vec![anchor, ball];

        let spring = Spring::new("s", 1, Vec2::zeros(), 0, Vec2::zeros(), 1.0, 10.0);
        let mut accum = vec![BodyForce::default(); 2];
        spring.apply(&bodies, &mut accum);

        // Stretched 2 beyond rest: force 20 toward the anchor.
        assert_relative_eq!(accum[1].force.x, -20.0, epsilon = 1e-12);
        assert_relative_eq!(accum[1].torque, 0.0, epsilon = 1e-12);
        assert_relative_eq!(accum[0].force.x, 20.0, epsilon = 1e-12);
        assert_relative_eq!(spring.potential_energy(&bodies), 0.5 * 10.0 * 4.0);
    }

    #[test]
    fn test_spring_at_rest_length_is_neutral() {
        let mut a = shapes::make_ball("a", 0.1, 1.0).unwrap();
        let mut b = shapes::make_ball("b", 0.1, 1.0).unwrap();
        a.set_id(0);
        b.set_id(1);
        b.set_position(Vec2::new(1.0, 0.0));
        let bodies = vec![a, b];
        let spring = Spring::new("s", 0, Vec2::zeros(), 1, Vec2::zeros(), 1.0, 50.0);
        let mut accum = vec![BodyForce::default(); 2];
        spring.apply(&bodies, &mut accum);
        assert_relative_eq!(accum[0].force.norm(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(spring.potential_energy(&bodies), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_off_center_attachment_produces_torque() {
        let mut a = shapes::make_block("a", 2.0, 2.0, 1.0).unwrap();
        let mut anchor = shapes::make_block("anchor", 0.5, 0.5, f64::INFINITY).unwrap();
        a.set_id(0);
        anchor.set_id(1);
        anchor.set_position(Vec2::new(5.0, 5.0));
        let bodies = vec![a, anchor];
        // Attached at the right edge of body a: pull has a lever arm.
        let spring = Spring::new("s", 0, Vec2::new(1.0, 0.0), 1, Vec2::zeros(), 0.0, 1.0);
        let mut accum = vec![BodyForce::default(); 2];
        spring.apply(&bodies, &mut accum);
        assert!(accum[0].torque > 0.0);
    }
}
