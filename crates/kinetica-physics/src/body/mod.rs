//! Rigid polygon bodies.
//!
//! A [`RigidBody`] owns its vertices and edges in arenas, forming one closed
//! loop of straight and circular segments. Body-frame geometry is immutable
//! after construction; the dynamic state is the pose (position of the center
//! of mass in world coordinates plus orientation angle) and the velocities.
//!
//! Bodies with infinite mass are fixed scenery: they participate in
//! collisions but never move and contribute nothing to the equations of
//! motion.

pub mod shapes;

use kinetica_core::math::{perp, Pose, Rect, Vec2};
use serde::{Deserialize, Serialize};

use crate::config::{ACCURACY, DISTANCE_TOL, VELOCITY_TOL};
use crate::error::{SimError, SimResult};
use crate::geometry::{CircularEdge, Edge, EdgeIdx, StraightEdge, Vertex, VertexIdx};

/// A rigid body bounded by a closed loop of straight and circular edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RigidBody {
    id: usize,
    name: String,

    vertices: Vec<Vertex>,
    edges: Vec<Edge>,

    /// Centroid (center of mass) in body coordinates.
    cm_body: Vec2,

    /// Mass; infinite for fixed scenery.
    mass: f64,

    /// Moment of inertia about the center of mass.
    moment: f64,

    pose: Pose,
    velocity: Vec2,
    angular_velocity: f64,

    elasticity: f64,
    distance_tol: f64,
    velocity_tol: f64,
    accuracy: f64,

    /// Bodies this one never generates collisions with.
    non_collide: Vec<usize>,

    /// Pose at the start of the current accepted macro-step, for continuous
    /// collision detection.
    old_pose: Option<Pose>,

    /// Bounding rectangle of the outline in body coordinates.
    bounds_body: Rect,

    /// Max distance from the center of mass to the outline bounds.
    max_radius: f64,
}

impl RigidBody {
    pub(crate) fn from_parts(
        name: String,
        vertices: Vec<Vertex>,
        edges: Vec<Edge>,
        cm_body: Vec2,
        mass: f64,
        moment: f64,
    ) -> Self {
        let bounds_body = edges
            .iter()
            .fold(Rect::empty(), |acc, e| acc.union(&e.bounds()));
        let corners = [
            Vec2::new(bounds_body.left, bounds_body.bottom),
            Vec2::new(bounds_body.right, bounds_body.bottom),
            Vec2::new(bounds_body.right, bounds_body.top),
            Vec2::new(bounds_body.left, bounds_body.top),
        ];
        let max_radius = corners
            .iter()
            .map(|c| (c - cm_body).norm())
            .fold(0.0_f64, f64::max);
        Self {
            id: 0,
            name,
            vertices,
            edges,
            cm_body,
            mass,
            moment,
            pose: Pose::identity(),
            velocity: Vec2::zeros(),
            angular_velocity: 0.0,
            elasticity: 1.0,
            distance_tol: DISTANCE_TOL,
            velocity_tol: VELOCITY_TOL,
            accuracy: ACCURACY,
            non_collide: Vec::new(),
            old_pose: None,
            bounds_body,
            max_radius,
        }
    }

    /// Numeric id assigned by the simulation.
    pub fn id(&self) -> usize {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: usize) {
        self.id = id;
    }

    /// Human-readable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Vertex arena, end-point and decorated mid-point vertices together.
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Edge arena in outline order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Vertex by arena index.
    #[inline]
    pub fn vertex(&self, i: VertexIdx) -> &Vertex {
        &self.vertices[i.0]
    }

    /// Edge by arena index.
    #[inline]
    pub fn edge(&self, i: EdgeIdx) -> &Edge {
        &self.edges[i.0]
    }

    /// Smaller-magnitude signed radius of curvature of the edges meeting at
    /// a vertex; infinite when both neighbors are straight.
    pub fn vertex_curvature(&self, i: VertexIdx) -> f64 {
        let v = self.vertex(i);
        let mut best = f64::INFINITY;
        for e in [v.edge1(), v.edge2()].into_iter().flatten() {
            let c = self.edge(e).curvature();
            if c.abs() < best.abs() {
                best = c;
            }
        }
        best
    }

    /// Centroid in body coordinates.
    pub fn centroid_body(&self) -> Vec2 {
        self.cm_body
    }

    /// Mass of the body; infinite for fixed scenery.
    pub fn get_mass(&self) -> f64 {
        self.mass
    }

    /// Inverse mass; zero for fixed scenery.
    #[inline]
    pub fn inv_mass(&self) -> f64 {
        if self.mass.is_finite() {
            1.0 / self.mass
        } else {
            0.0
        }
    }

    /// Moment of inertia about the center of mass.
    pub fn get_inertia(&self) -> f64 {
        self.moment
    }

    /// Inverse moment of inertia; zero for fixed scenery.
    #[inline]
    pub fn inv_inertia(&self) -> f64 {
        if self.moment.is_finite() && self.moment > 0.0 {
            1.0 / self.moment
        } else {
            0.0
        }
    }

    /// Whether the body can move.
    #[inline]
    pub fn is_finite_mass(&self) -> bool {
        self.mass.is_finite()
    }

    /// Position of the center of mass in world coordinates.
    #[inline]
    pub fn get_position(&self) -> Vec2 {
        self.pose.position()
    }

    /// Orientation angle in radians.
    #[inline]
    pub fn get_angle(&self) -> f64 {
        self.pose.angle()
    }

    /// Current pose.
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Moves the center of mass; orientation unchanged.
    pub fn set_position(&mut self, position: Vec2) {
        self.pose = Pose::new(position, self.pose.angle());
    }

    /// Sets the orientation angle.
    pub fn set_angle(&mut self, angle: f64) {
        self.pose = Pose::new(self.pose.position(), angle);
    }

    /// Linear velocity of the center of mass.
    #[inline]
    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    /// Angular velocity, counter-clockwise positive.
    #[inline]
    pub fn angular_velocity(&self) -> f64 {
        self.angular_velocity
    }

    /// Sets both velocities.
    pub fn set_velocity(&mut self, velocity: Vec2, angular_velocity: f64) {
        self.velocity = velocity;
        self.angular_velocity = angular_velocity;
    }

    /// Coefficient of restitution in `[0, 1]`.
    pub fn elasticity(&self) -> f64 {
        self.elasticity
    }

    /// Sets the coefficient of restitution.
    pub fn set_elasticity(&mut self, elasticity: f64) {
        self.elasticity = elasticity.clamp(0.0, 1.0);
    }

    /// Contact distance tolerance, normally equal across the simulation.
    pub fn distance_tol(&self) -> f64 {
        self.distance_tol
    }

    /// Approach-speed tolerance, normally equal across the simulation.
    pub fn velocity_tol(&self) -> f64 {
        self.velocity_tol
    }

    /// Acceptance band fraction in `(0, 1]`.
    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    /// Propagates the simulation's canonical tolerances onto this body.
    pub fn set_tolerances(&mut self, distance_tol: f64, velocity_tol: f64, accuracy: f64) {
        self.distance_tol = distance_tol;
        self.velocity_tol = velocity_tol;
        self.accuracy = accuracy;
    }

    /// Forbids collision generation against the given bodies.
    pub fn add_non_collide(&mut self, ids: &[usize]) {
        for &id in ids {
            if id != self.id && !self.non_collide.contains(&id) {
                self.non_collide.push(id);
            }
        }
    }

    /// Whether collisions with `other` are suppressed.
    pub fn do_not_collide(&self, other: usize) -> bool {
        self.non_collide.contains(&other)
    }

    /// Transforms a body-coordinate point into world coordinates.
    #[inline]
    pub fn body_to_world(&self, p_body: Vec2) -> Vec2 {
        self.pose.position() + self.pose.rotate(p_body - self.cm_body)
    }

    /// Transforms a world-coordinate point into body coordinates.
    #[inline]
    pub fn world_to_body(&self, p_world: Vec2) -> Vec2 {
        self.cm_body + self.pose.inverse_rotate(p_world - self.pose.position())
    }

    /// Rotates a body-frame direction into the world frame.
    #[inline]
    pub fn rotate_body_to_world(&self, v: Vec2) -> Vec2 {
        self.pose.rotate(v)
    }

    /// Rotates a world-frame direction into the body frame.
    #[inline]
    pub fn rotate_world_to_body(&self, v: Vec2) -> Vec2 {
        self.pose.inverse_rotate(v)
    }

    /// Velocity of the body point `p_body`: the center-of-mass velocity plus
    /// the rotational contribution `w x r`.
    pub fn get_velocity(&self, p_body: Vec2) -> Vec2 {
        let r = self.body_to_world(p_body) - self.pose.position();
        self.velocity + self.angular_velocity * perp(r)
    }

    /// Velocity of a world-space point rigidly attached to the body.
    pub fn velocity_at_world_point(&self, p_world: Vec2) -> Vec2 {
        let r = p_world - self.pose.position();
        self.velocity + self.angular_velocity * perp(r)
    }

    /// Kinetic energy; zero for fixed scenery.
    pub fn kinetic_energy(&self) -> f64 {
        if !self.is_finite_mass() {
            return 0.0;
        }
        0.5 * self.mass * self.velocity.norm_squared()
            + 0.5 * self.moment * self.angular_velocity * self.angular_velocity
    }

    /// Snapshots the current pose for continuous collision detection.
    pub fn save_old_copy(&mut self) {
        self.old_pose = Some(self.pose);
    }

    /// Pose at the start of the current accepted macro-step, if saved.
    pub fn get_old_copy(&self) -> Option<&Pose> {
        self.old_pose.as_ref()
    }

    /// Clears the saved pose.
    pub fn erase_old_copy(&mut self) {
        self.old_pose = None;
    }

    fn old_pose_or_current(&self) -> &Pose {
        self.old_pose.as_ref().unwrap_or(&self.pose)
    }

    /// [`RigidBody::body_to_world`] using the saved old pose.
    pub fn old_body_to_world(&self, p_body: Vec2) -> Vec2 {
        let pose = self.old_pose_or_current();
        pose.position() + pose.rotate(p_body - self.cm_body)
    }

    /// [`RigidBody::world_to_body`] using the saved old pose.
    pub fn old_world_to_body(&self, p_world: Vec2) -> Vec2 {
        let pose = self.old_pose_or_current();
        self.cm_body + pose.inverse_rotate(p_world - pose.position())
    }

    /// Bounding rectangle of the outline in body coordinates.
    pub fn bounds_body(&self) -> Rect {
        self.bounds_body
    }

    /// Max distance from the center of mass to the outline bounds.
    pub fn max_radius(&self) -> f64 {
        self.max_radius
    }

    /// World-coordinate bounding rectangle at the current pose.
    pub fn world_bounds(&self) -> Rect {
        let b = &self.bounds_body;
        let corners = [
            Vec2::new(b.left, b.bottom),
            Vec2::new(b.right, b.bottom),
            Vec2::new(b.right, b.top),
            Vec2::new(b.left, b.top),
        ];
        let mut rect = Rect::empty();
        for c in corners {
            rect = rect.expand_to(self.body_to_world(c));
        }
        rect
    }

    /// Linear plus rotational speed bound, used for broad-phase swellage.
    pub fn speed_bound(&self) -> f64 {
        self.velocity.norm() + self.angular_velocity.abs() * self.max_radius
    }
}

/// Incremental builder walking the outline of a polygon.
///
/// Edges are appended head-to-tail; the walk closes automatically when an
/// edge ends at the starting point. Circular edges generate their decorated
/// mid-point vertices as they are added.
#[derive(Debug)]
pub struct PolygonBuilder {
    name: String,
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    first_vertex: Option<VertexIdx>,
    last_vertex: Option<VertexIdx>,
    closed: bool,
}

impl PolygonBuilder {
    /// Starts a builder for a polygon with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vertices: Vec::new(),
            edges: Vec::new(),
            first_vertex: None,
            last_vertex: None,
            closed: false,
        }
    }

    /// Starts the outline walk at `p` in body coordinates.
    pub fn start_path(&mut self, p: Vec2) {
        assert!(self.first_vertex.is_none(), "path already started");
        let idx = VertexIdx(self.vertices.len());
        self.vertices.push(Vertex::new(idx.0, p));
        self.first_vertex = Some(idx);
        self.last_vertex = Some(idx);
    }

    fn next_vertex(&mut self, p: Vec2) -> (VertexIdx, bool) {
        let first = self.first_vertex.expect("start_path not called");
        let first_loc = self.vertices[first.0].loc();
        if (p - first_loc).norm() < 1e-12 {
            (first, true)
        } else {
            let idx = VertexIdx(self.vertices.len());
            self.vertices.push(Vertex::new(idx.0, p));
            (idx, false)
        }
    }

    fn wire(&mut self, from: VertexIdx, to: VertexIdx, edge: EdgeIdx, closes: bool) {
        self.vertices[from.0].set_edge2(edge);
        self.vertices[to.0].set_edge1(edge);
        self.last_vertex = Some(to);
        if closes {
            self.closed = true;
        }
    }

    /// Appends a straight edge from the current walk position to `p`.
    ///
    /// `outside_is_up` marks which side of the edge is outside the body.
    pub fn add_straight_edge_to(&mut self, p: Vec2, outside_is_up: bool) -> SimResult<EdgeIdx> {
        let from = self.last_vertex.expect("start_path not called");
        let (to, closes) = self.next_vertex(p);
        let idx = EdgeIdx(self.edges.len());
        let edge = StraightEdge::new(
            idx,
            from,
            to,
            self.vertices[from.0].loc(),
            self.vertices[to.0].loc(),
            outside_is_up,
        )?;
        self.edges.push(Edge::Straight(edge));
        self.wire(from, to, idx, closes);
        Ok(idx)
    }

    /// Appends a circular edge from the current walk position to `p`,
    /// traveling around `center`. When `p` equals the walk start the edge is
    /// a complete circle.
    pub fn add_circular_edge_to(
        &mut self,
        p: Vec2,
        center: Vec2,
        clockwise: bool,
        outside_is_out: bool,
    ) -> SimResult<EdgeIdx> {
        let from = self.last_vertex.expect("start_path not called");
        let (to, closes) = self.next_vertex(p);
        let idx = EdgeIdx(self.edges.len());
        let (mut edge, positions) = CircularEdge::new(
            idx,
            from,
            to,
            self.vertices[from.0].loc(),
            self.vertices[to.0].loc(),
            center,
            clockwise,
            outside_is_out,
        )?;
        let decoration: Vec<VertexIdx> = positions
            .into_iter()
            .map(|loc| {
                let vi = VertexIdx(self.vertices.len());
                self.vertices.push(Vertex::midpoint(vi.0, loc, idx));
                vi
            })
            .collect();
        edge.set_decoration(decoration);
        self.edges.push(Edge::Circular(edge));
        self.wire(from, to, idx, closes);
        Ok(idx)
    }

    /// Finishes the outline, producing a body with the given mass
    /// properties.
    ///
    /// # Errors
    /// Returns [`SimError::InvalidGeometry`] when the outline is empty or
    /// not closed.
    pub fn finish(self, mass: f64, cm_body: Vec2, moment: f64) -> SimResult<RigidBody> {
        if self.edges.is_empty() {
            return Err(SimError::geometry("polygon has no edges"));
        }
        if !self.closed {
            return Err(SimError::geometry("polygon outline is not closed"));
        }
        Ok(RigidBody::from_parts(
            self.name,
            self.vertices,
            self.edges,
            cm_body,
            mass,
            moment,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::shapes;
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_block_outline_closed() {
        let block = shapes::make_block("b", 2.0, 1.0, 3.0).unwrap();
        assert_eq!(block.edges().len(), 4);
        assert_eq!(block.vertices().len(), 4);
        // Edges connect head-to-tail through shared vertices.
        for (i, e) in block.edges().iter().enumerate() {
            let next = block.edges()[(i + 1) % 4].vertex1();
            assert_eq!(e.vertex2(), next);
        }
    }

    #[test]
    fn test_body_world_round_trip() {
        let mut block = shapes::make_block("b", 2.0, 1.0, 3.0).unwrap();
        block.set_position(Vec2::new(5.0, -2.0));
        block.set_angle(0.8);
        let p = Vec2::new(0.3, 0.4);
        let back = block.world_to_body(block.body_to_world(p));
        assert_relative_eq!(back.x, p.x, epsilon = 1e-12);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-12);
    }

    #[test]
    fn test_velocity_of_body_point() {
        let mut block = shapes::make_block("b", 2.0, 2.0, 1.0).unwrap();
        block.set_velocity(Vec2::new(1.0, 0.0), 2.0);
        // Point one unit above the CM: rotation adds velocity -2 in x.
        let v = block.get_velocity(Vec2::new(0.0, 1.0));
        assert_relative_eq!(v.x, -1.0, epsilon = 1e-12);
        assert_relative_eq!(v.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_infinite_mass_body() {
        let floor = shapes::make_block("floor", 10.0, 1.0, f64::INFINITY).unwrap();
        assert!(!floor.is_finite_mass());
        assert_eq!(floor.inv_mass(), 0.0);
        assert_eq!(floor.inv_inertia(), 0.0);
        assert_eq!(floor.kinetic_energy(), 0.0);
    }

    #[test]
    fn test_old_copy_round_trip() {
        let mut block = shapes::make_block("b", 1.0, 1.0, 1.0).unwrap();
        block.set_position(Vec2::new(1.0, 1.0));
        block.save_old_copy();
        block.set_position(Vec2::new(2.0, 1.0));
        let p = Vec2::new(0.5, 0.5);
        let old_w = block.old_body_to_world(p);
        assert_relative_eq!(old_w.x, 1.0, epsilon = 1e-12);
        block.erase_old_copy();
        assert!(block.get_old_copy().is_none());
    }

    #[test]
    fn test_world_bounds_rotated() {
        let mut block = shapes::make_block("b", 2.0, 1.0, 1.0).unwrap();
        block.set_angle(FRAC_PI_2);
        let b = block.world_bounds();
        // A 2x1 block rotated a quarter turn becomes 1x2.
        assert_relative_eq!(b.width(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(b.height(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_non_collide_set() {
        let mut a = shapes::make_block("a", 1.0, 1.0, 1.0).unwrap();
        a.set_id(1);
        a.add_non_collide(&[2, 2, 1]);
        assert!(a.do_not_collide(2));
        assert!(!a.do_not_collide(1), "self is never in the set");
        assert!(!a.do_not_collide(3));
    }

    #[test]
    fn test_vertex_curvature_prefers_smaller_radius() {
        let ball = shapes::make_ball("ball", 0.5, 1.0).unwrap();
        // Every vertex of a ball lies on the single circular edge.
        for i in 0..ball.vertices().len() {
            assert_relative_eq!(ball.vertex_curvature(VertexIdx(i)), 0.5);
        }
        let block = shapes::make_block("b", 1.0, 1.0, 1.0).unwrap();
        assert_eq!(block.vertex_curvature(VertexIdx(0)), f64::INFINITY);
    }
}
