//! Bilateral joints and other connectors.
//!
//! Connectors inject collision records into the detection scan: a [`Joint`]
//! always emits exactly one bilateral record per scan whose distance is the
//! current constraint gap, so the impulse solver maintains the constraint by
//! driving its normal velocity to zero. Path-based connectors live in
//! [`path`].
//!
//! A joint removes one degree of freedom along a single normal direction;
//! pinning two bodies together takes two joints with independent normals.

pub mod path;

use kinetica_core::math::Vec2;
use serde::{Deserialize, Serialize};

use crate::body::RigidBody;
use crate::collision::{CollisionGeometry, RigidBodyCollision};
use crate::error::{SimError, SimResult};

/// Something that contributes collision records beyond the body-pair scan.
pub trait Connector {
    /// Display name.
    fn name(&self) -> &str;

    /// Bodies this connector constrains.
    fn bodies(&self) -> (usize, usize);

    /// Emits this connector's collision record(s) for the current scan.
    /// `index` is the connector's slot in the simulation, stamped into the
    /// record geometry so updates route back here.
    fn add_collision(
        &mut self,
        out: &mut Vec<RigidBodyCollision>,
        bodies: &[RigidBody],
        time: f64,
        index: usize,
    );

    /// Refreshes the geometric fields of a record this connector emitted.
    fn update_collision(
        &mut self,
        record: &mut RigidBodyCollision,
        bodies: &[RigidBody],
        time: f64,
    ) -> SimResult<()>;

    /// Moves the attached bodies so the constraint gap is zero, when the
    /// connector supports it. Used during scene setup.
    fn align(&mut self, bodies: &mut [RigidBody]) {
        let _ = bodies;
    }
}

/// Frame in which a joint's normal direction is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormalFrame {
    /// Fixed direction in world coordinates.
    World,
    /// Direction rotates with the second body.
    Body2,
}

/// Bilateral constraint holding two body attachment points together along
/// one normal direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Joint {
    name: String,
    body1: usize,
    attach1: Vec2,
    body2: usize,
    attach2: Vec2,
    normal: Vec2,
    frame: NormalFrame,
}

impl Joint {
    /// Creates a joint between `attach1` on `body1` (body coordinates) and
    /// `attach2` on `body2`, constraining motion along `normal`.
    ///
    /// # Errors
    /// Returns [`SimError::InvalidGeometry`] for a zero normal direction.
    pub fn new(
        name: impl Into<String>,
        body1: usize,
        attach1: Vec2,
        body2: usize,
        attach2: Vec2,
        normal: Vec2,
        frame: NormalFrame,
    ) -> SimResult<Self> {
        let len = normal.norm();
        if len < 1e-12 {
            return Err(SimError::geometry("joint normal must be non-zero"));
        }
        Ok(Self {
            name: name.into(),
            body1,
            attach1,
            body2,
            attach2,
            normal: normal / len,
            frame,
        })
    }

    fn world_normal(&self, bodies: &[RigidBody]) -> Vec2 {
        match self.frame {
            NormalFrame::World => self.normal,
            NormalFrame::Body2 => bodies[self.body2].rotate_body_to_world(self.normal),
        }
    }

    fn fill_record(&self, record: &mut RigidBodyCollision, bodies: &[RigidBody]) {
        let p1w = bodies[self.body1].body_to_world(self.attach1);
        let p2w = bodies[self.body2].body_to_world(self.attach2);
        let n = self.world_normal(bodies);
        record.impact1 = p1w;
        record.impact2 = Some(p2w);
        record.normal = n;
        record.distance = n.dot(&(p1w - p2w));
        record.refresh_derived(bodies);
    }
}

impl Connector for Joint {
    fn name(&self) -> &str {
        &self.name
    }

    fn bodies(&self) -> (usize, usize) {
        (self.body1, self.body2)
    }

    fn add_collision(
        &mut self,
        out: &mut Vec<RigidBodyCollision>,
        bodies: &[RigidBody],
        time: f64,
        index: usize,
    ) {
        let mut record = RigidBodyCollision::new(
            &bodies[self.body1],
            &bodies[self.body2],
            CollisionGeometry::Connector { connector: index },
            time,
            "Joint",
        );
        record.is_joint = true;
        record.radius1 = f64::NAN;
        record.radius2 = f64::NAN;
        self.fill_record(&mut record, bodies);
        record.update_time = Some(time);
        out.push(record);
    }

    fn update_collision(
        &mut self,
        record: &mut RigidBodyCollision,
        bodies: &[RigidBody],
        time: f64,
    ) -> SimResult<()> {
        self.fill_record(record, bodies);
        record.update_time = Some(time);
        Ok(())
    }

    fn align(&mut self, bodies: &mut [RigidBody]) {
        let p1w = bodies[self.body1].body_to_world(self.attach1);
        let p2w = bodies[self.body2].body_to_world(self.attach2);
        let gap = p2w - p1w;
        if bodies[self.body1].is_finite_mass() {
            let p = bodies[self.body1].get_position() + gap;
            bodies[self.body1].set_position(p);
        } else if bodies[self.body2].is_finite_mass() {
            let p = bodies[self.body2].get_position() - gap;
            bodies[self.body2].set_position(p);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::shapes;
    use approx::assert_relative_eq;

    fn scene() -> Vec<RigidBody> {
        let mut anchor = shapes::make_block("anchor", 0.5, 0.5, f64::INFINITY).unwrap();
        let mut bob = shapes::make_block("bob", 1.0, 1.0, 1.0).unwrap();
        anchor.set_id(0);
        bob.set_id(1);
        bob.set_position(Vec2::new(0.0, -2.0));
        vec![anchor, bob]
    }

    #[test]
    fn test_joint_distance_is_projected_gap() {
        let mut bodies = scene();
        bodies[1].set_position(Vec2::new(0.0, -2.25));
        let mut joint = Joint::new(
            "j",
            1,
            Vec2::new(0.0, 2.0),
            0,
            Vec2::zeros(),
            Vec2::new(0.0, 1.0),
            NormalFrame::World,
        )
        .unwrap();
        let mut out = Vec::new();
        joint.add_collision(&mut out, &bodies, 0.0, 0);
        assert_eq!(out.len(), 1);
        let c = &out[0];
        assert!(c.is_joint);
        assert_relative_eq!(c.distance, -0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_joint_zero_normal_rejected() {
        assert!(Joint::new(
            "j",
            0,
            Vec2::zeros(),
            1,
            Vec2::zeros(),
            Vec2::zeros(),
            NormalFrame::World
        )
        .is_err());
    }

    #[test]
    fn test_align_moves_finite_body() {
        let mut bodies = scene();
        bodies[1].set_position(Vec2::new(0.3, -2.25));
        let mut joint = Joint::new(
            "j",
            1,
            Vec2::new(0.0, 2.0),
            0,
            Vec2::zeros(),
            Vec2::new(0.0, 1.0),
            NormalFrame::World,
        )
        .unwrap();
        joint.align(&mut bodies);
        let p1w = bodies[1].body_to_world(Vec2::new(0.0, 2.0));
        assert_relative_eq!(p1w.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(p1w.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_joint_update_tracks_bodies() {
        let mut bodies = scene();
        let mut joint = Joint::new(
            "j",
            1,
            Vec2::new(0.0, 2.0),
            0,
            Vec2::zeros(),
            Vec2::new(0.0, 1.0),
            NormalFrame::World,
        )
        .unwrap();
        let mut out = Vec::new();
        joint.add_collision(&mut out, &bodies, 0.0, 0);
        let mut c = out.pop().unwrap();
        bodies[1].set_position(Vec2::new(0.0, -2.1));
        joint.update_collision(&mut c, &bodies, 0.5).unwrap();
        assert_relative_eq!(c.distance, -0.1, epsilon = 1e-12);
        assert_eq!(c.update_time, Some(0.5));
    }
}
