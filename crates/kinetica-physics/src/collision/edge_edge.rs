//! Static collision tests between edges when at least one is curved.
//!
//! Straight/straight pairs never produce edge/edge records: they are covered
//! by corner/edge tests against endpoint and decorated vertices. The two
//! routines here handle circle-against-straight and circle-against-circle,
//! both for proximity contacts and for penetrating collisions detected with
//! the old-pose snapshot.

use kinetica_core::math::Vec2;
use tracing::debug;

use crate::body::RigidBody;
use crate::config::TINY_POSITIVE;
use crate::error::{SimError, SimResult};
use crate::geometry::{CircularEdge, Edge, EdgeIdx, StraightEdge};

use super::{CollisionGeometry, RigidBodyCollision};

/// Whether the world point lies within the angular span of a circular edge.
pub fn within_arc_world(edge: &CircularEdge, body: &RigidBody, p_world: Vec2) -> bool {
    edge.is_within_arc(edge.body_to_edge(body.world_to_body(p_world)))
}

fn within_reflected_arc_world(edge: &CircularEdge, body: &RigidBody, p_world: Vec2) -> bool {
    edge.is_within_reflected_arc(edge.body_to_edge(body.world_to_body(p_world)))
}

/// Tests one edge pair, appending at most one record to `out`.
///
/// Dispatches on the variant combination; straight/straight pairs
/// short-circuit to nothing.
#[allow(clippy::too_many_arguments)]
pub fn test_edge_edge(
    out: &mut Vec<RigidBodyCollision>,
    bodies: &[RigidBody],
    body_a: usize,
    edge_a: EdgeIdx,
    body_b: usize,
    edge_b: EdgeIdx,
    time: f64,
) {
    let ea = bodies[body_a].edge(edge_a);
    let eb = bodies[body_b].edge(edge_b);
    match (ea, eb) {
        (Edge::Straight(_), Edge::Straight(_)) => {}
        (Edge::Circular(ce), Edge::Straight(se)) => {
            test_circle_straight(out, bodies, body_a, ce, body_b, se, time);
        }
        (Edge::Straight(se), Edge::Circular(ce)) => {
            test_circle_straight(out, bodies, body_b, ce, body_a, se, time);
        }
        (Edge::Circular(c1), Edge::Circular(c2)) => {
            test_circle_circle(out, bodies, body_a, c1, body_b, c2, time);
        }
    }
}

/// Circle against straight edge.
///
/// Works with the offset point `pb = center - r n`: the point of the circle
/// nearest the edge plane. A positive offset distance within tolerance is a
/// contact; a non-positive one is a collision provided the old pose shows
/// the circle crossed from the outside during this step.
fn test_circle_straight(
    out: &mut Vec<RigidBodyCollision>,
    bodies: &[RigidBody],
    circle_body: usize,
    circle: &CircularEdge,
    straight_body: usize,
    straight: &StraightEdge,
    time: f64,
) {
    // A concave arc cannot touch a straight edge with its hollow side; the
    // corner logic covers whatever contact exists there.
    if !circle.outside_is_out() {
        return;
    }
    let cbody = &bodies[circle_body];
    let sbody = &bodies[straight_body];
    let dist_tol = cbody.distance_tol();
    let r = circle.radius();

    let cw = cbody.body_to_world(circle.center());
    let cb = sbody.world_to_body(cw);
    let n = straight.outward_normal();
    let pb = cb - r * n;
    let d = straight.distance_to_line(pb);
    if d > dist_tol {
        return;
    }

    let mut record = RigidBodyCollision::new(
        cbody,
        sbody,
        CollisionGeometry::EdgeEdge {
            primary_edge: circle.index(),
            normal_edge: straight.index(),
        },
        time,
        "CircleStraight",
    );
    record.ball_object = true;
    record.radius2 = f64::INFINITY;

    if d > 0.0 {
        // Contact: the circle's closest point must project onto the edge
        // span and lie within the arc.
        if straight.distance_to_point(pb).is_infinite() {
            return;
        }
        let (proj, _) = straight.get_point_on_edge(pb);
        let impact_world = sbody.body_to_world(proj);
        if !within_arc_world(circle, cbody, impact_world) {
            return;
        }
        record.impact1 = impact_world;
        record.normal = sbody.rotate_body_to_world(n);
        record.distance = d;
        record.radius1 = r + d;
    } else {
        // Collision: replay the offset point at the old poses; if it was
        // already on the wrong side the circle did not cross this step.
        let ocw = cbody.old_body_to_world(circle.center());
        let ocb = sbody.old_world_to_body(ocw);
        let opb = ocb - r * n;
        if straight.distance_to_line(opb) < 0.0 {
            return;
        }
        let Some(ix) = straight.intersection(opb, pb) else {
            debug!("circle/straight crossing without segment intersection, dropping");
            return;
        };
        let impact_world = sbody.body_to_world(ix);
        if !within_arc_world(circle, cbody, impact_world) {
            return;
        }
        record.impact1 = impact_world;
        record.normal = sbody.rotate_body_to_world(n);
        record.distance = d;
        record.radius1 = r;
    }
    record.refresh_derived(bodies);
    out.push(record);
}

/// Circle against circle, convex/convex or convex within concave.
fn test_circle_circle(
    out: &mut Vec<RigidBodyCollision>,
    bodies: &[RigidBody],
    body1: usize,
    c1: &CircularEdge,
    body2: usize,
    c2: &CircularEdge,
    time: f64,
) {
    match (c1.outside_is_out(), c2.outside_is_out()) {
        (false, false) => {}
        (true, true) => {
            test_convex_convex(out, bodies, body1, c1, body2, c2, time);
        }
        (true, false) => {
            test_convex_in_concave(out, bodies, body1, c1, body2, c2, time);
        }
        (false, true) => {
            test_convex_in_concave(out, bodies, body2, c2, body1, c1, time);
        }
    }
}

fn test_convex_convex(
    out: &mut Vec<RigidBodyCollision>,
    bodies: &[RigidBody],
    body1: usize,
    c1: &CircularEdge,
    body2: usize,
    c2: &CircularEdge,
    time: f64,
) {
    let b1 = &bodies[body1];
    let b2 = &bodies[body2];
    let dist_tol = b1.distance_tol();
    let c1w = b1.body_to_world(c1.center());
    let c2w = b2.body_to_world(c2.center());

    // Each arc must face the other circle's center, else the surfaces that
    // would touch are outside the angular spans.
    if !within_arc_world(c1, b1, c2w) || !within_arc_world(c2, b2, c1w) {
        return;
    }

    let len = (c2w - c1w).norm();
    if len < TINY_POSITIVE {
        return;
    }
    let d = len - (c1.radius() + c2.radius());
    let is_contact = d > 0.0 && d <= dist_tol;
    let max_depth = c1.depth_of_arc().max(c2.depth_of_arc());
    let is_collision = d < 0.0 && d >= -max_depth;
    if !is_contact && !is_collision {
        return;
    }

    let u = (c2w - c1w) / len;
    let mut record = RigidBodyCollision::new(
        b1,
        b2,
        CollisionGeometry::EdgeEdge {
            primary_edge: c1.index(),
            normal_edge: c2.index(),
        },
        time,
        "CircleCircle",
    );
    record.ball_object = true;
    record.ball_normal = true;
    record.impact1 = c1w + (c1.radius() + d / 2.0) * u;
    record.normal = -u;
    record.distance = d;
    if is_contact {
        record.radius1 = c1.radius() + d / 2.0;
        record.radius2 = c2.radius() + d / 2.0;
    } else {
        record.radius1 = c1.radius();
        record.radius2 = c2.radius();
    }
    record.refresh_derived(bodies);
    out.push(record);
}

fn test_convex_in_concave(
    out: &mut Vec<RigidBodyCollision>,
    bodies: &[RigidBody],
    convex_body: usize,
    convex: &CircularEdge,
    concave_body: usize,
    concave: &CircularEdge,
    time: f64,
) {
    // A socket can only cradle a strictly smaller circle.
    if concave.radius() <= convex.radius() {
        return;
    }
    let vb = &bodies[convex_body];
    let cb = &bodies[concave_body];
    let dist_tol = vb.distance_tol();
    let cvw = vb.body_to_world(convex.center());
    let ccw = cb.body_to_world(concave.center());

    // The touching region of the convex arc faces away from the socket
    // center, hence the reflected arc test on the convex side.
    if !within_reflected_arc_world(convex, vb, ccw) || !within_arc_world(concave, cb, cvw) {
        return;
    }

    let len = (cvw - ccw).norm();
    if len < TINY_POSITIVE {
        return;
    }
    let d = concave.radius() - convex.radius() - len;
    let is_contact = d > 0.0 && d <= dist_tol;
    let is_collision = d < 0.0 && d >= -convex.depth_of_arc();
    if !is_contact && !is_collision {
        return;
    }

    let w = (cvw - ccw) / len;
    let mut record = RigidBodyCollision::new(
        vb,
        cb,
        CollisionGeometry::EdgeEdge {
            primary_edge: convex.index(),
            normal_edge: concave.index(),
        },
        time,
        "CircleCircle",
    );
    record.ball_object = true;
    record.ball_normal = true;
    record.impact1 = cvw + (convex.radius() + d / 2.0) * w;
    record.normal = -w;
    record.distance = d;
    if is_contact {
        record.radius1 = convex.radius() + d / 2.0;
        record.radius2 = -(concave.radius() - d / 2.0);
    } else {
        record.radius1 = convex.radius();
        record.radius2 = -concave.radius();
    }
    record.refresh_derived(bodies);
    out.push(record);
}

/// Refreshes the geometric fields of an edge/edge record from the current
/// body poses, using the formulas of the routine that created it.
pub fn improve_accuracy(
    record: &mut RigidBodyCollision,
    primary_edge: EdgeIdx,
    normal_edge: EdgeIdx,
    bodies: &[RigidBody],
) -> SimResult<()> {
    let primary = &bodies[record.primary_body];
    let normal_body = &bodies[record.normal_body];
    match (primary.edge(primary_edge), normal_body.edge(normal_edge)) {
        (Edge::Circular(circle), Edge::Straight(straight)) => {
            let cw = primary.body_to_world(circle.center());
            let cb = normal_body.world_to_body(cw);
            let n = straight.outward_normal();
            let pb = cb - circle.radius() * n;
            let d = straight.distance_to_line(pb);
            if !d.is_finite() {
                return Err(SimError::numerical(
                    "circle/straight update",
                    format!("non-finite offset distance {d}"),
                ));
            }
            let (proj, _) = straight.get_point_on_edge(pb);
            record.impact1 = normal_body.body_to_world(proj);
            record.normal = normal_body.rotate_body_to_world(n);
            record.distance = d;
            record.radius1 = if d > 0.0 {
                circle.radius() + d
            } else {
                circle.radius()
            };
            Ok(())
        }
        (Edge::Circular(c1), Edge::Circular(c2)) => {
            let c1w = primary.body_to_world(c1.center());
            let c2w = normal_body.body_to_world(c2.center());
            let len = (c2w - c1w).norm();
            if len < TINY_POSITIVE {
                return Err(SimError::numerical(
                    "circle/circle update",
                    "coincident circle centers",
                ));
            }
            let u = (c2w - c1w) / len;
            if c1.outside_is_out() && c2.outside_is_out() {
                let d = len - (c1.radius() + c2.radius());
                record.impact1 = c1w + (c1.radius() + d / 2.0) * u;
                record.normal = -u;
                record.distance = d;
                if d > 0.0 {
                    record.radius1 = c1.radius() + d / 2.0;
                    record.radius2 = c2.radius() + d / 2.0;
                }
            } else {
                // Convex primary inside concave normal-side socket.
                let d = c2.radius() - c1.radius() - len;
                let w = -u;
                record.impact1 = c1w + (c1.radius() + d / 2.0) * w;
                record.normal = -w;
                record.distance = d;
                if d > 0.0 {
                    record.radius1 = c1.radius() + d / 2.0;
                    record.radius2 = -(c2.radius() - d / 2.0);
                }
            }
            Ok(())
        }
        _ => Err(SimError::numerical(
            "edge/edge update",
            "record does not reference a curved edge",
        )),
    }
}
