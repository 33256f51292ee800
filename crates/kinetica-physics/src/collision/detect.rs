//! Pairwise collision detection across all rigid bodies.
//!
//! For every body pair that may interact, the detector runs three phases:
//! a bounding-box rejection inflated by the per-step "swellage", vertex
//! against edge tests in both directions (endpoint and decorated mid-point
//! vertices alike), and edge/edge tests whenever at least one edge is
//! curved. Produced records are deduplicated with the later record of each
//! similar pair winning.
//!
//! Penetrations that jump past the contact band within one step are caught
//! by checking the vertex's old-pose to current-pose travel against the
//! edge; this is what makes detection continuous in time.

use kinetica_core::math::{Rect, Vec2};
use tracing::debug;

use crate::body::RigidBody;
use crate::config::{CORNER_CONTACT_FACTOR, NEAR_VERTEX_TOL};
use crate::geometry::{Edge, EdgeIdx, VertexIdx};

use super::{edge_edge, merge_similar, CollisionGeometry, RigidBodyCollision};

/// Scans all body pairs, appending collision records to `out`.
///
/// `step_size` is the ODE step length; together with the bodies' speed it
/// bounds how far anything can have moved, which sizes the bounding-box
/// inflation.
pub fn find_collisions(
    out: &mut Vec<RigidBodyCollision>,
    bodies: &[RigidBody],
    time: f64,
    step_size: f64,
) {
    let start = out.len();
    for i in 0..bodies.len() {
        for j in (i + 1)..bodies.len() {
            let a = &bodies[i];
            let b = &bodies[j];
            if !a.is_finite_mass() && !b.is_finite_mass() {
                continue;
            }
            if a.do_not_collide(b.id()) || b.do_not_collide(a.id()) {
                continue;
            }
            let swellage = a
                .distance_tol()
                .max(step_size * (a.speed_bound() + b.speed_bound()));
            if !a
                .world_bounds()
                .inflate(swellage)
                .intersects(&b.world_bounds())
            {
                continue;
            }
            test_body_pair(out, bodies, i, j, swellage, time);
        }
    }
    if out.len() > start {
        merge_similar(out);
    }
}

fn test_body_pair(
    out: &mut Vec<RigidBodyCollision>,
    bodies: &[RigidBody],
    a: usize,
    b: usize,
    swellage: f64,
    time: f64,
) {
    test_vertices_against_edges(out, bodies, a, b, swellage, time);
    test_vertices_against_edges(out, bodies, b, a, swellage, time);

    // Edge/edge only matters when a curved edge is involved; straight pairs
    // are fully covered by the vertex passes.
    let body_a = &bodies[a];
    let body_b = &bodies[b];
    for ea in body_a.edges() {
        for eb in body_b.edges() {
            if ea.is_straight() && eb.is_straight() {
                continue;
            }
            if !edges_near(body_a, ea, body_b, eb, swellage) {
                continue;
            }
            edge_edge::test_edge_edge(out, bodies, a, ea.index(), b, eb.index(), time);
        }
    }
}

fn edges_near(
    body_a: &RigidBody,
    ea: &Edge,
    body_b: &RigidBody,
    eb: &Edge,
    swellage: f64,
) -> bool {
    let ca = body_a.body_to_world(ea.centroid());
    let cb = body_b.body_to_world(eb.centroid());
    (ca - cb).norm() <= ea.centroid_radius() + eb.centroid_radius() + swellage
}

/// Tests every vertex of `primary` against the nearby edges of `normal`.
fn test_vertices_against_edges(
    out: &mut Vec<RigidBodyCollision>,
    bodies: &[RigidBody],
    primary: usize,
    normal: usize,
    swellage: f64,
    time: f64,
) {
    let pbody = &bodies[primary];
    let nbody = &bodies[normal];
    for (vi, v) in pbody.vertices().iter().enumerate() {
        let vw = pbody.body_to_world(v.loc());
        let p_b = nbody.world_to_body(vw);
        let old_vw = pbody.old_body_to_world(v.loc());
        let old_p_b = nbody.old_world_to_body(old_vw);
        let travel = Rect::from_points(p_b, old_p_b).inflate(swellage);
        for edge in nbody.edges() {
            if !edge.bounds().intersects(&travel) {
                continue;
            }
            find_vertex_contact(
                out,
                bodies,
                primary,
                VertexIdx(vi),
                normal,
                edge.index(),
                p_b,
                old_p_b,
                time,
            );
        }
    }
}

/// Primary detection routine for one vertex against one edge.
///
/// Emits a corner/edge contact when the vertex sits in the contact band of
/// the edge, a corner/edge collision when the vertex crossed the edge during
/// this step, and otherwise falls back to corner/corner checks against the
/// edge endpoints with the reduced `0.6 * dist_tol` threshold.
#[allow(clippy::too_many_arguments)]
fn find_vertex_contact(
    out: &mut Vec<RigidBodyCollision>,
    bodies: &[RigidBody],
    primary: usize,
    vertex: VertexIdx,
    normal: usize,
    edge_idx: EdgeIdx,
    p_b: Vec2,
    old_p_b: Vec2,
    time: f64,
) {
    let pbody = &bodies[primary];
    let nbody = &bodies[normal];
    let edge = nbody.edge(edge_idx);
    let dist_tol = pbody.distance_tol();

    match edge {
        Edge::Straight(se) => {
            let dist = se.distance_to_point(p_b);
            if dist.is_finite() && (0.0..=dist_tol).contains(&dist) {
                push_corner_edge(out, bodies, primary, vertex, normal, edge_idx, time);
                return;
            }
            // Crossing test: the travel segment of the vertex against the
            // edge segment catches penetrations that skipped the band.
            if se.distance_to_line(p_b) < 0.0 && se.intersection(old_p_b, p_b).is_some() {
                push_corner_edge(out, bodies, primary, vertex, normal, edge_idx, time);
                return;
            }
            // Corner against corner near the edge endpoints.
            for endpoint in [se.vertex1(), se.vertex2()] {
                let gap = (p_b - nbody.vertex(endpoint).loc()).norm();
                if gap >= NEAR_VERTEX_TOL && gap <= CORNER_CONTACT_FACTOR * dist_tol {
                    push_corner_corner(out, bodies, primary, vertex, normal, endpoint, time);
                }
            }
        }
        Edge::Circular(ce) => {
            let pe = ce.body_to_edge(p_b);
            if !ce.is_within_arc(pe) {
                return;
            }
            let dist = ce.distance_to_line(p_b);
            if (0.0..=dist_tol).contains(&dist) {
                push_corner_arc(out, bodies, primary, vertex, normal, edge_idx, dist, time);
                return;
            }
            if dist < 0.0 {
                let old_dist = ce.distance_to_line(old_p_b);
                if old_dist > 0.0 {
                    push_corner_arc(out, bodies, primary, vertex, normal, edge_idx, dist, time);
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn push_corner_edge(
    out: &mut Vec<RigidBodyCollision>,
    bodies: &[RigidBody],
    primary: usize,
    vertex: VertexIdx,
    normal: usize,
    edge: EdgeIdx,
    time: f64,
) {
    let pbody = &bodies[primary];
    let nbody = &bodies[normal];
    let mut record = RigidBodyCollision::new(
        pbody,
        nbody,
        CollisionGeometry::CornerEdge {
            primary_vertex: vertex,
            normal_edge: edge,
        },
        time,
        "vertex/edge",
    );
    record.radius1 = pbody.vertex_curvature(vertex);
    record.radius2 = nbody.edge(edge).curvature();
    record.ball_normal = !nbody.edge(edge).is_straight();
    match record.update_collision(time, bodies) {
        Ok(()) => out.push(record),
        Err(err) => debug!("dropping degenerate vertex/edge record: {err}"),
    }
}

#[allow(clippy::too_many_arguments)]
fn push_corner_arc(
    out: &mut Vec<RigidBodyCollision>,
    bodies: &[RigidBody],
    primary: usize,
    vertex: VertexIdx,
    normal: usize,
    edge: EdgeIdx,
    dist: f64,
    time: f64,
) {
    let pbody = &bodies[primary];
    let nbody = &bodies[normal];
    let mut record = RigidBodyCollision::new(
        pbody,
        nbody,
        CollisionGeometry::CornerEdge {
            primary_vertex: vertex,
            normal_edge: edge,
        },
        time,
        "vertex/arc",
    );
    record.radius1 = pbody.vertex_curvature(vertex);
    // Half the gap moves into the arc's effective radius, which keeps the
    // contact stable in the impulse equations.
    record.radius2 = nbody.edge(edge).curvature() + if dist > 0.0 { dist / 2.0 } else { 0.0 };
    record.ball_normal = true;
    match record.update_collision(time, bodies) {
        Ok(()) => out.push(record),
        Err(err) => debug!("dropping degenerate vertex/arc record: {err}"),
    }
}

fn push_corner_corner(
    out: &mut Vec<RigidBodyCollision>,
    bodies: &[RigidBody],
    primary: usize,
    primary_vertex: VertexIdx,
    normal: usize,
    normal_vertex: VertexIdx,
    time: f64,
) {
    let pbody = &bodies[primary];
    let nbody = &bodies[normal];
    let mut record = RigidBodyCollision::new(
        pbody,
        nbody,
        CollisionGeometry::CornerCorner {
            primary_vertex,
            normal_vertex,
        },
        time,
        "vertex/vertex",
    );
    record.radius1 = pbody.vertex_curvature(primary_vertex);
    record.radius2 = nbody.vertex_curvature(normal_vertex);
    match record.update_collision(time, bodies) {
        Ok(()) => out.push(record),
        Err(err) => debug!("dropping degenerate vertex/vertex record: {err}"),
    }
}
