//! Collision and contact records between rigid bodies.
//!
//! A [`RigidBodyCollision`] is one candidate interaction between two bodies:
//! the geometry of the touch point, the outward normal, the signed gap, and
//! the relative normal velocity. Records are created by the detector, live
//! for one macro-step, and are consumed by the impulse solver. Whether a
//! record is a "contact" (small positive gap, slow approach) or a
//! "collision" (penetration or rapid approach) is decided by thresholds, not
//! by the detector.

pub mod detect;
pub mod edge_edge;

use kinetica_core::math::{cross, Vec2};
use serde::{Deserialize, Serialize};

use crate::body::RigidBody;
use crate::config::TINY_POSITIVE;
use crate::error::{SimError, SimResult};
use crate::geometry::{Edge, EdgeIdx, VertexIdx};

/// Normals more parallel than this dot-product magnitude can merge as
/// duplicates of one another.
const PARALLEL_NORMALS_DOT: f64 = 0.9;

/// Geometric flavor of a collision record: how its fields are refreshed
/// from current body poses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollisionGeometry {
    /// Two vertices near each other.
    CornerCorner {
        /// Vertex on the primary body.
        primary_vertex: VertexIdx,
        /// Vertex on the normal body.
        normal_vertex: VertexIdx,
    },
    /// A vertex of the primary body against an edge of the normal body.
    CornerEdge {
        /// Vertex on the primary body.
        primary_vertex: VertexIdx,
        /// Edge on the normal body supplying the normal.
        normal_edge: EdgeIdx,
    },
    /// Curved edge against straight or curved edge.
    EdgeEdge {
        /// Edge on the primary body.
        primary_edge: EdgeIdx,
        /// Edge on the normal body.
        normal_edge: EdgeIdx,
    },
    /// Produced by a connector (joint, path joint, path end point).
    Connector {
        /// Index of the connector in the simulation.
        connector: usize,
    },
}

/// One candidate contact or collision between two rigid bodies.
#[derive(Debug, Clone, Serialize)]
pub struct RigidBodyCollision {
    /// Body whose feature initiated the record.
    pub primary_body: usize,

    /// Body supplying the normal direction.
    pub normal_body: usize,

    /// How the geometric fields are refreshed.
    pub geometry: CollisionGeometry,

    /// Point of impact in world coordinates.
    pub impact1: Vec2,

    /// Second impact point (normal-body side), when distinct.
    pub impact2: Option<Vec2>,

    /// Unit normal in world coordinates, pointing away from the normal body.
    pub normal: Vec2,

    /// Signed gap: negative is penetration, positive is separation.
    pub distance: f64,

    /// Vector from the primary body's center of mass to the impact point.
    pub r1: Vec2,

    /// Vector from the normal body's center of mass to the impact point.
    pub r2: Vec2,

    /// Vector from the primary body's center of mass to its curvature
    /// center, when the primary side is curved.
    pub u1: Option<Vec2>,

    /// Vector from the normal body's center of mass to its curvature
    /// center, when the normal side is curved.
    pub u2: Option<Vec2>,

    /// Curvature radius at the contact on the primary side: positive
    /// convex, negative concave, infinite straight, NaN when the derivative
    /// of the normal must be used instead.
    pub radius1: f64,

    /// Curvature radius at the contact on the normal side.
    pub radius2: f64,

    /// Whether the primary side is a curved edge at the contact.
    pub ball_object: bool,

    /// Whether the normal side is a curved edge at the contact.
    pub ball_normal: bool,

    /// Bilateral joint rather than unilateral contact.
    pub is_joint: bool,

    /// Restitution used for this record: min of the two bodies'.
    pub elasticity: f64,

    /// Distance tolerance copied from the bodies at creation.
    pub distance_tol: f64,

    /// Acceptance band fraction copied from the bodies at creation.
    pub accuracy: f64,

    /// Simulation time at detection.
    pub detected_time: f64,

    /// Time of the latest geometric refresh.
    pub update_time: Option<f64>,

    /// Relative normal velocity `(v_primary - v_normal) . normal`;
    /// negative when approaching.
    pub normal_velocity: f64,

    /// Label of the code path that created the record.
    pub creator: &'static str,
}

impl RigidBodyCollision {
    /// Creates a record with geometry fields to be filled by the caller.
    pub fn new(
        primary_body: &RigidBody,
        normal_body: &RigidBody,
        geometry: CollisionGeometry,
        detected_time: f64,
        creator: &'static str,
    ) -> Self {
        Self {
            primary_body: primary_body.id(),
            normal_body: normal_body.id(),
            geometry,
            impact1: Vec2::zeros(),
            impact2: None,
            normal: Vec2::new(0.0, 1.0),
            distance: f64::INFINITY,
            r1: Vec2::zeros(),
            r2: Vec2::zeros(),
            u1: None,
            u2: None,
            radius1: f64::INFINITY,
            radius2: f64::INFINITY,
            ball_object: false,
            ball_normal: false,
            is_joint: false,
            elasticity: primary_body.elasticity().min(normal_body.elasticity()),
            distance_tol: primary_body.distance_tol(),
            accuracy: primary_body.accuracy(),
            detected_time,
            update_time: None,
            normal_velocity: 0.0,
            creator,
        }
    }

    /// Lower edge of the acceptance band for a bracketed collision.
    pub fn accept_distance_low(&self) -> f64 {
        self.accuracy * self.distance_tol
    }

    /// Whether the gap is inside the acceptance band
    /// `[accuracy * distance_tol, distance_tol]` (joints: within the band of
    /// zero on either side).
    pub fn within_acceptance_band(&self) -> bool {
        if self.is_joint {
            self.distance.abs() <= self.distance_tol
        } else {
            self.distance >= self.accept_distance_low() && self.distance <= self.distance_tol
        }
    }

    /// Whether the record is approaching fast enough to need a bounce
    /// impulse.
    pub fn is_colliding(&self, velocity_tol: f64) -> bool {
        if self.is_joint {
            self.normal_velocity.abs() > velocity_tol
        } else {
            self.distance <= self.distance_tol && self.normal_velocity < -velocity_tol
        }
    }

    /// Whether the interval must be bracketed back in time before this
    /// record can be handled: the bodies interpenetrate and are still
    /// approaching. A positive gap below the acceptance band does not
    /// re-bracket; resting stacks sit there legitimately between impulses.
    pub fn needs_bracketing(&self) -> bool {
        if self.is_joint {
            false
        } else {
            self.distance < 0.0 && self.normal_velocity < 0.0
        }
    }

    /// Refreshes every geometric field from the current body poses.
    ///
    /// Connector records are refreshed by their connector instead; calling
    /// this on one is a no-op.
    pub fn update_collision(&mut self, time: f64, bodies: &[RigidBody]) -> SimResult<()> {
        match self.geometry {
            CollisionGeometry::CornerCorner {
                primary_vertex,
                normal_vertex,
            } => {
                let primary = &bodies[self.primary_body];
                let normal_body = &bodies[self.normal_body];
                let pw = primary.body_to_world(primary.vertex(primary_vertex).loc());
                let nw = normal_body.body_to_world(normal_body.vertex(normal_vertex).loc());
                let diff = pw - nw;
                let len = diff.norm();
                if !len.is_finite() {
                    return Err(SimError::numerical(
                        "corner/corner update",
                        format!("non-finite vertex distance {len}"),
                    ));
                }
                if len < TINY_POSITIVE {
                    return Err(SimError::numerical(
                        "corner/corner update",
                        "degenerate normal direction between coincident vertices",
                    ));
                }
                self.impact1 = nw;
                self.impact2 = None;
                self.normal = diff / len;
                self.distance = len;
            }
            CollisionGeometry::CornerEdge {
                primary_vertex,
                normal_edge,
            } => {
                let primary = &bodies[self.primary_body];
                let normal_body = &bodies[self.normal_body];
                let vw = primary.body_to_world(primary.vertex(primary_vertex).loc());
                let p_body = normal_body.world_to_body(vw);
                let edge = normal_body.edge(normal_edge);
                let (point, n) = edge.get_point_on_edge(p_body).ok_or_else(|| {
                    SimError::numerical("corner/edge update", "projection has no radial direction")
                })?;
                self.impact1 = normal_body.body_to_world(point);
                self.impact2 = None;
                self.normal = normal_body.rotate_body_to_world(n);
                self.distance = edge.distance_to_line(p_body);
            }
            CollisionGeometry::EdgeEdge {
                primary_edge,
                normal_edge,
            } => {
                edge_edge::improve_accuracy(self, primary_edge, normal_edge, bodies)?;
            }
            CollisionGeometry::Connector { .. } => {}
        }
        self.refresh_derived(bodies);
        self.update_time = Some(time);
        Ok(())
    }

    /// Recomputes the moment arms, curvature-center offsets, and relative
    /// normal velocity from the geometric fields.
    pub fn refresh_derived(&mut self, bodies: &[RigidBody]) {
        let primary = &bodies[self.primary_body];
        let normal_body = &bodies[self.normal_body];
        let impact2 = self.impact2.unwrap_or(self.impact1);
        self.r1 = self.impact1 - primary.get_position();
        self.r2 = impact2 - normal_body.get_position();
        self.u1 = self
            .curvature_center_body(primary, self.primary_edge())
            .map(|c| primary.body_to_world(c) - primary.get_position());
        self.u2 = self
            .curvature_center_body(normal_body, self.normal_edge())
            .map(|c| normal_body.body_to_world(c) - normal_body.get_position());
        let v1 = primary.velocity_at_world_point(self.impact1);
        let v2 = normal_body.velocity_at_world_point(impact2);
        self.normal_velocity = (v1 - v2).dot(&self.normal);
    }

    fn primary_edge(&self) -> Option<EdgeIdx> {
        match self.geometry {
            CollisionGeometry::EdgeEdge { primary_edge, .. } => Some(primary_edge),
            _ => None,
        }
    }

    fn normal_edge(&self) -> Option<EdgeIdx> {
        match self.geometry {
            CollisionGeometry::CornerEdge { normal_edge, .. }
            | CollisionGeometry::EdgeEdge { normal_edge, .. } => Some(normal_edge),
            _ => None,
        }
    }

    fn curvature_center_body(&self, body: &RigidBody, edge: Option<EdgeIdx>) -> Option<Vec2> {
        match body.edge(edge?) {
            Edge::Circular(c) => Some(c.center()),
            Edge::Straight(_) => None,
        }
    }

    /// Relative normal velocity evaluated directly from the given bodies,
    /// without refreshing the stored field.
    pub fn current_normal_velocity(&self, bodies: &[RigidBody]) -> f64 {
        let primary = &bodies[self.primary_body];
        let normal_body = &bodies[self.normal_body];
        let impact2 = self.impact2.unwrap_or(self.impact1);
        let v1 = primary.velocity_at_world_point(self.impact1);
        let v2 = normal_body.velocity_at_world_point(impact2);
        (v1 - v2).dot(&self.normal)
    }

    /// Change in this record's normal velocity per unit impulse applied
    /// along `other`'s normal, through the bodies the two records share.
    pub fn influence(&self, other: &RigidBodyCollision, bodies: &[RigidBody]) -> f64 {
        let mut sum = 0.0;
        let sides_i = [(self.primary_body, 1.0, self.r1), (self.normal_body, -1.0, self.r2)];
        let sides_j = [
            (other.primary_body, 1.0, other.r1),
            (other.normal_body, -1.0, other.r2),
        ];
        for &(bi, sign_i, ri) in &sides_i {
            for &(bj, sign_j, rj) in &sides_j {
                if bi != bj {
                    continue;
                }
                let body = &bodies[bi];
                if !body.is_finite_mass() {
                    continue;
                }
                let linear = self.normal.dot(&other.normal) * body.inv_mass();
                let angular = cross(ri, self.normal)
                    * cross(rj, other.normal)
                    * body.inv_inertia();
                sum += sign_i * sign_j * (linear + angular);
            }
        }
        sum
    }

    /// Whether `self` and `other` describe the same physical contact.
    ///
    /// True when the records involve the same two bodies and either share a
    /// vertex, involve the same two edges, or sit within a curvature-derived
    /// nearness distance of each other with nearly parallel normals.
    pub fn similar_to(&self, other: &RigidBodyCollision) -> bool {
        let same_order =
            self.primary_body == other.primary_body && self.normal_body == other.normal_body;
        let swapped =
            self.primary_body == other.normal_body && self.normal_body == other.primary_body;
        if !same_order && !swapped {
            return false;
        }
        // Connector records only ever duplicate the same connector; they
        // never merge with detector-produced contacts.
        match (self.geometry, other.geometry) {
            (
                CollisionGeometry::Connector { connector: a },
                CollisionGeometry::Connector { connector: b },
            ) => return a == b,
            (CollisionGeometry::Connector { .. }, _) | (_, CollisionGeometry::Connector { .. }) => {
                return false;
            }
            _ => {}
        }
        if self.shares_vertex(other) {
            return true;
        }
        if let (
            CollisionGeometry::EdgeEdge {
                primary_edge: pe1,
                normal_edge: ne1,
            },
            CollisionGeometry::EdgeEdge {
                primary_edge: pe2,
                normal_edge: ne2,
            },
        ) = (self.geometry, other.geometry)
        {
            let same = same_order && pe1 == pe2 && ne1 == ne2;
            let crossed = swapped && pe1 == ne2 && ne1 == pe2;
            if same || crossed {
                return true;
            }
        }
        let near = nearness(self.radius1, self.radius2, self.distance_tol);
        (self.impact1 - other.impact1).norm() < near
            && self.normal.dot(&other.normal).abs() >= PARALLEL_NORMALS_DOT
    }

    fn vertex_features(&self) -> [Option<(usize, VertexIdx)>; 2] {
        match self.geometry {
            CollisionGeometry::CornerCorner {
                primary_vertex,
                normal_vertex,
            } => [
                Some((self.primary_body, primary_vertex)),
                Some((self.normal_body, normal_vertex)),
            ],
            CollisionGeometry::CornerEdge { primary_vertex, .. } => {
                [Some((self.primary_body, primary_vertex)), None]
            }
            _ => [None, None],
        }
    }

    fn shares_vertex(&self, other: &RigidBodyCollision) -> bool {
        let mine = self.vertex_features();
        let theirs = other.vertex_features();
        mine.iter()
            .flatten()
            .any(|f| theirs.iter().flatten().any(|g| f == g))
    }

    /// Applies an impulse of the given magnitude along this record's normal:
    /// positive on the primary body, negative on the normal body.
    pub fn apply_impulse(&self, magnitude: f64, bodies: &mut [RigidBody]) {
        if magnitude == 0.0 {
            return;
        }
        {
            let body = &mut bodies[self.primary_body];
            if body.is_finite_mass() {
                let dv = magnitude * body.inv_mass() * self.normal;
                let dw = magnitude * cross(self.r1, self.normal)
                    * body.inv_inertia();
                body.set_velocity(body.velocity() + dv, body.angular_velocity() + dw);
            }
        }
        {
            let body = &mut bodies[self.normal_body];
            if body.is_finite_mass() {
                let dv = -magnitude * body.inv_mass() * self.normal;
                let dw = -magnitude
                    * cross(self.r2, self.normal)
                    * body.inv_inertia();
                body.set_velocity(body.velocity() + dv, body.angular_velocity() + dw);
            }
        }
    }
}

/// How close two contacts between the same bodies may be before they merge
/// as duplicates, as a function of the smallest radius of curvature at the
/// contact.
///
/// Two convex arcs can distinguish contacts `2 r sqrt(2 tol / r)` apart for
/// the smaller radius `r`; a concave side dominates with its own radius; two
/// straight sides fall back to the distance tolerance.
pub fn nearness(radius1: f64, radius2: f64, distance_tol: f64) -> f64 {
    let mut convex_min = f64::INFINITY;
    let mut concave_max: f64 = 0.0;
    for r in [radius1, radius2] {
        if !r.is_finite() || r == 0.0 {
            continue;
        }
        if r > 0.0 {
            convex_min = convex_min.min(r);
        } else {
            concave_max = concave_max.max(-r);
        }
    }
    let r = if concave_max > 0.0 {
        concave_max
    } else if convex_min.is_finite() {
        convex_min
    } else {
        return distance_tol;
    };
    2.0 * r * (2.0 * distance_tol / r).sqrt()
}

/// Removes records that duplicate an earlier record of the same contact,
/// keeping the later of each similar pair.
pub fn merge_similar(records: &mut Vec<RigidBodyCollision>) {
    let mut keep = vec![true; records.len()];
    for i in 0..records.len() {
        for j in (i + 1)..records.len() {
            if keep[i] && keep[j] && records[i].similar_to(&records[j]) {
                keep[i] = false;
            }
        }
    }
    let mut it = keep.iter();
    records.retain(|_| *it.next().unwrap());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::shapes;
    use approx::assert_relative_eq;

    fn two_blocks() -> Vec<RigidBody> {
        let mut a = shapes::make_block("a", 1.0, 1.0, 1.0).unwrap();
        let mut b = shapes::make_block("b", 1.0, 1.0, 1.0).unwrap();
        a.set_id(0);
        b.set_id(1);
        b.set_position(Vec2::new(1.005, 0.0));
        vec![a, b]
    }

    #[test]
    fn test_corner_edge_update() {
        let bodies = two_blocks();
        // Vertex 1 of body a is its lower-right corner (0.5, -0.5); body b's
        // left edge is edge 3.
        let mut c = RigidBodyCollision::new(
            &bodies[0],
            &bodies[1],
            CollisionGeometry::CornerEdge {
                primary_vertex: VertexIdx(1),
                normal_edge: EdgeIdx(3),
            },
            0.0,
            "test",
        );
        c.update_collision(0.0, &bodies).unwrap();
        assert_relative_eq!(c.distance, 0.005, epsilon = 1e-12);
        assert_relative_eq!(c.normal.x, -1.0, epsilon = 1e-12);
        assert_relative_eq!(c.normal.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_normal_velocity_sign() {
        let mut bodies = two_blocks();
        bodies[0].set_velocity(Vec2::new(1.0, 0.0), 0.0);
        let mut c = RigidBodyCollision::new(
            &bodies[0],
            &bodies[1],
            CollisionGeometry::CornerEdge {
                primary_vertex: VertexIdx(1),
                normal_edge: EdgeIdx(3),
            },
            0.0,
            "test",
        );
        c.update_collision(0.0, &bodies).unwrap();
        // Primary moves toward the normal body: approaching, negative.
        assert!(c.normal_velocity < 0.0);
        assert_relative_eq!(c.normal_velocity, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_impulse_reverses_approach() {
        let mut bodies = two_blocks();
        bodies[0].set_velocity(Vec2::new(1.0, 0.0), 0.0);
        let mut c = RigidBodyCollision::new(
            &bodies[0],
            &bodies[1],
            CollisionGeometry::CornerEdge {
                primary_vertex: VertexIdx(1),
                normal_edge: EdgeIdx(3),
            },
            0.0,
            "test",
        );
        c.update_collision(0.0, &bodies).unwrap();
        let a = c.influence(&c, &bodies);
        assert!(a > 0.0);
        // Impulse that exactly reverses the approach velocity (e = 1).
        let x = -(1.0 + 1.0) * c.normal_velocity / a;
        c.apply_impulse(x, &mut bodies);
        let v_after = c.current_normal_velocity(&bodies);
        assert_relative_eq!(v_after, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_nearness_fallbacks() {
        // Two straight sides: falls back to the distance tolerance.
        assert_relative_eq!(nearness(f64::INFINITY, f64::INFINITY, 0.01), 0.01);
        // Convex pair uses the smaller radius.
        let n = nearness(1.0, 2.0, 0.01);
        assert_relative_eq!(n, 2.0 * (2.0 * 0.01_f64).sqrt(), epsilon = 1e-12);
        // A concave side dominates.
        let n = nearness(-4.0, 1.0, 0.01);
        assert_relative_eq!(n, 2.0 * 4.0 * (2.0 * 0.01_f64 / 4.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_merge_similar_keeps_later() {
        let bodies = two_blocks();
        let mut c1 = RigidBodyCollision::new(
            &bodies[0],
            &bodies[1],
            CollisionGeometry::CornerEdge {
                primary_vertex: VertexIdx(1),
                normal_edge: EdgeIdx(3),
            },
            0.0,
            "first",
        );
        c1.update_collision(0.0, &bodies).unwrap();
        let mut c2 = c1.clone();
        c2.creator = "second";
        let mut records = vec![c1, c2];
        merge_similar(&mut records);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].creator, "second");
    }

    #[test]
    fn test_acceptance_band() {
        let bodies = two_blocks();
        let mut c = RigidBodyCollision::new(
            &bodies[0],
            &bodies[1],
            CollisionGeometry::CornerEdge {
                primary_vertex: VertexIdx(1),
                normal_edge: EdgeIdx(3),
            },
            0.0,
            "test",
        );
        c.distance = 0.005;
        assert!(c.within_acceptance_band());
        c.distance = 0.0005;
        assert!(!c.within_acceptance_band());
        c.normal_velocity = -1.0;
        assert!(!c.needs_bracketing(), "positive gap never re-brackets");
        c.distance = -0.001;
        assert!(c.needs_bracketing());
    }
}
