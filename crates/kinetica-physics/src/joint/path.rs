//! Connectors anchoring bodies to parameterized paths.
//!
//! The path itself is an external collaborator behind the
//! [`ParametricPath`] trait: it maps a scalar parameter to a world point,
//! unit tangent, and unit normal, and supports a local nearest-parameter
//! search seeded with the previous parameter value so tracking never jumps
//! between distant path sections.

use std::rc::Rc;

use kinetica_core::math::Vec2;
use kinetica_core::util::limit_angle;

use crate::body::RigidBody;
use crate::collision::{CollisionGeometry, RigidBodyCollision};
use crate::error::SimResult;

use super::Connector;

/// A parameterized planar curve in world coordinates.
pub trait ParametricPath {
    /// Point on the path at parameter `p`.
    fn point(&self, p: f64) -> Vec2;

    /// Unit tangent (direction of increasing `p`).
    fn tangent(&self, p: f64) -> Vec2;

    /// Unit normal, perpendicular to the tangent.
    fn normal(&self, p: f64) -> Vec2;

    /// Parameter of the path point nearest `target`, searched locally from
    /// `start`.
    fn nearest_param(&self, target: Vec2, start: f64) -> f64;
}

/// Circular path parameterized by angle in math convention.
#[derive(Debug, Clone)]
pub struct CirclePath {
    center: Vec2,
    radius: f64,
}

impl CirclePath {
    /// Creates a circle of the given center and radius.
    pub fn new(center: Vec2, radius: f64) -> Self {
        Self { center, radius }
    }

    /// Circle center.
    pub fn center(&self) -> Vec2 {
        self.center
    }

    /// Circle radius.
    pub fn radius(&self) -> f64 {
        self.radius
    }
}

impl ParametricPath for CirclePath {
    fn point(&self, p: f64) -> Vec2 {
        self.center + self.radius * Vec2::new(p.cos(), p.sin())
    }

    fn tangent(&self, p: f64) -> Vec2 {
        Vec2::new(-p.sin(), p.cos())
    }

    fn normal(&self, p: f64) -> Vec2 {
        Vec2::new(p.cos(), p.sin())
    }

    fn nearest_param(&self, target: Vec2, start: f64) -> f64 {
        let d = target - self.center;
        if d.norm() < 1e-12 {
            return start;
        }
        let angle = d.y.atan2(d.x);
        // Continuous tracking: unwind onto the turn nearest the seed.
        start + limit_angle(angle - start)
    }
}

/// Bilateral constraint anchoring a body attachment point to a path.
///
/// The record's `radius2` is NaN: contact-force machinery must use the
/// derivative of the path normal rather than a curvature radius.
pub struct PathJoint {
    name: String,
    body: usize,
    attach: Vec2,
    anchor_body: usize,
    path: Rc<dyn ParametricPath>,
    p_value: f64,
}

impl PathJoint {
    /// Creates a path joint for `attach` (body coordinates) on `body`.
    /// `anchor_body` is the fixed body the path is rigidly attached to.
    pub fn new(
        name: impl Into<String>,
        body: usize,
        attach: Vec2,
        anchor_body: usize,
        path: Rc<dyn ParametricPath>,
        start_param: f64,
    ) -> Self {
        Self {
            name: name.into(),
            body,
            attach,
            anchor_body,
            path,
            p_value: start_param,
        }
    }

    /// Latest path parameter of the tracked attachment point.
    pub fn path_param(&self) -> f64 {
        self.p_value
    }

    fn fill_record(&mut self, record: &mut RigidBodyCollision, bodies: &[RigidBody]) {
        let pw = bodies[self.body].body_to_world(self.attach);
        self.p_value = self.path.nearest_param(pw, self.p_value);
        let point = self.path.point(self.p_value);
        let n = self.path.normal(self.p_value);
        record.impact1 = pw;
        record.impact2 = Some(point);
        record.normal = n;
        record.distance = n.dot(&(pw - point));
        record.refresh_derived(bodies);
    }
}

impl Connector for PathJoint {
    fn name(&self) -> &str {
        &self.name
    }

    fn bodies(&self) -> (usize, usize) {
        (self.body, self.anchor_body)
    }

    fn add_collision(
        &mut self,
        out: &mut Vec<RigidBodyCollision>,
        bodies: &[RigidBody],
        time: f64,
        index: usize,
    ) {
        let mut record = RigidBodyCollision::new(
            &bodies[self.body],
            &bodies[self.anchor_body],
            CollisionGeometry::Connector { connector: index },
            time,
            "PathJoint",
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
        if !bodies[self.body].is_finite_mass() {
            return;
        }
        let pw = bodies[self.body].body_to_world(self.attach);
        self.p_value = self.path.nearest_param(pw, self.p_value);
        let target = self.path.point(self.p_value);
        let p = bodies[self.body].get_position() + (target - pw);
        bodies[self.body].set_position(p);
    }
}

/// Unilateral stop at a path parameter limit.
///
/// Emits a collision only when the tracked parameter crossed the limit
/// between the old-pose snapshot and the current pose; sitting beyond the
/// limit without having crossed this step produces nothing.
pub struct PathEndPoint {
    name: String,
    body: usize,
    attach: Vec2,
    anchor_body: usize,
    path: Rc<dyn ParametricPath>,
    limit: f64,
    upper: bool,
    p_value: f64,
}

impl PathEndPoint {
    /// Creates a stop at `limit`; `upper` selects which crossing direction
    /// (increasing parameter for upper limits) fires the collision.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        body: usize,
        attach: Vec2,
        anchor_body: usize,
        path: Rc<dyn ParametricPath>,
        limit: f64,
        upper: bool,
        start_param: f64,
    ) -> Self {
        Self {
            name: name.into(),
            body,
            attach,
            anchor_body,
            path,
            limit,
            upper,
            p_value: start_param,
        }
    }

    fn limit_normal(&self) -> Vec2 {
        // The stop acts like a wall across the path: its normal points back
        // toward the allowed side.
        let t = self.path.tangent(self.limit);
        if self.upper {
            -t
        } else {
            t
        }
    }

    fn fill_record(&self, record: &mut RigidBodyCollision, bodies: &[RigidBody]) {
        let pw = bodies[self.body].body_to_world(self.attach);
        let point = self.path.point(self.limit);
        let n = self.limit_normal();
        record.impact1 = pw;
        record.impact2 = Some(point);
        record.normal = n;
        record.distance = n.dot(&(pw - point));
        record.refresh_derived(bodies);
    }
}

impl Connector for PathEndPoint {
    fn name(&self) -> &str {
        &self.name
    }

    fn bodies(&self) -> (usize, usize) {
        (self.body, self.anchor_body)
    }

    fn add_collision(
        &mut self,
        out: &mut Vec<RigidBodyCollision>,
        bodies: &[RigidBody],
        time: f64,
        index: usize,
    ) {
        let body = &bodies[self.body];
        let pw = body.body_to_world(self.attach);
        let old_pw = body.old_body_to_world(self.attach);
        let p_old = self.path.nearest_param(old_pw, self.p_value);
        let p_cur = self.path.nearest_param(pw, p_old);
        self.p_value = p_cur;
        let crossed = if self.upper {
            p_old <= self.limit && p_cur > self.limit
        } else {
            p_old >= self.limit && p_cur < self.limit
        };
        if !crossed {
            return;
        }
        let mut record = RigidBodyCollision::new(
            body,
            &bodies[self.anchor_body],
            CollisionGeometry::Connector { connector: index },
            time,
            "PathEndPoint",
        );
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::shapes;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn scene(ball_pos: Vec2) -> Vec<RigidBody> {
        let mut anchor = shapes::make_block("anchor", 0.5, 0.5, f64::INFINITY).unwrap();
        let mut ball = shapes::make_ball("ball", 0.1, 1.0).unwrap();
        anchor.set_id(0);
        ball.set_id(1);
        ball.set_position(ball_pos);
        vec![anchor, ball]
    }

    #[test]
    fn test_circle_path_geometry() {
        let path = CirclePath::new(Vec2::new(1.0, 0.0), 2.0);
        let p = path.point(FRAC_PI_2);
        assert_relative_eq!(p.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 2.0, epsilon = 1e-12);
        assert_relative_eq!(path.tangent(FRAC_PI_2).x, -1.0, epsilon = 1e-12);
        assert_relative_eq!(path.normal(0.0).x, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_nearest_param_stays_continuous() {
        let path = CirclePath::new(Vec2::zeros(), 1.0);
        // Just past a full turn: the parameter must not snap back near zero.
        let p = path.nearest_param(Vec2::new(1.0, 0.1), 2.0 * PI);
        assert!(p > 6.0 && p < 7.0);
    }

    #[test]
    fn test_path_joint_distance() {
        let path: Rc<dyn ParametricPath> = Rc::new(CirclePath::new(Vec2::zeros(), 2.0));
        // Ball slightly outside the circle on the +x axis.
        let bodies = scene(Vec2::new(2.1, 0.0));
        let mut joint = PathJoint::new("pj", 1, Vec2::zeros(), 0, path, 0.0);
        let mut out = Vec::new();
        joint.add_collision(&mut out, &bodies, 0.0, 0);
        assert_eq!(out.len(), 1);
        let c = &out[0];
        assert!(c.is_joint);
        assert!(c.radius2.is_nan());
        assert_relative_eq!(c.distance, 0.1, epsilon = 1e-12);
        assert_relative_eq!(c.normal.x, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_path_joint_align() {
        let path: Rc<dyn ParametricPath> = Rc::new(CirclePath::new(Vec2::zeros(), 2.0));
        let mut bodies = scene(Vec2::new(2.5, 0.0));
        let mut joint = PathJoint::new("pj", 1, Vec2::zeros(), 0, path, 0.0);
        joint.align(&mut bodies);
        assert_relative_eq!(bodies[1].get_position().x, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_end_point_fires_only_on_crossing() {
        let path: Rc<dyn ParametricPath> = Rc::new(CirclePath::new(Vec2::zeros(), 2.0));
        let mut bodies = scene(Vec2::new(2.0 * FRAC_PI_2.cos(), 2.0 * FRAC_PI_2.sin()));
        let mut stop = PathEndPoint::new("stop", 1, Vec2::zeros(), 0, path, FRAC_PI_2, true, 0.0);

        // Sitting exactly at the limit with no old pose movement: no record.
        bodies[1].save_old_copy();
        let mut out = Vec::new();
        stop.add_collision(&mut out, &bodies, 0.0, 0);
        assert!(out.is_empty());

        // Now the body moves past the limit during the step.
        bodies[1].save_old_copy();
        let past: f64 = 1.8;
        bodies[1].set_position(Vec2::new(2.0 * past.cos(), 2.0 * past.sin()));
        stop.add_collision(&mut out, &bodies, 0.1, 0);
        assert_eq!(out.len(), 1);
        assert!(!out[0].is_joint);
        assert!(out[0].distance < 0.0, "beyond the stop counts as penetration");
    }
}
