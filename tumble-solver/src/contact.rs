//! Contact rows: one unilateral normal row plus two coupled friction rows.

use nalgebra::{Point3, Vector3};
use tumble_dynamics::RigidBody;
use tumble_geometry::Material;

use crate::constraint::{Coupling, NcpConstraint};

/// Fraction of the penetration depth corrected per step.
const DEPTH_CORRECTION_FACTOR: f64 = 0.2;

/// Penetration correction clamp, in units of velocity.
const DEPTH_CORRECTION_LIMIT: f64 = 7.0;

/// A single contact between two bodies, as produced by a collision query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactPoint {
    /// Contact location in world space.
    pub point: Point3<f64>,
    /// Unit contact normal, pointing from the second body toward the first.
    pub normal: Vector3<f64>,
    /// Penetration depth; negative when the bodies are separated.
    pub depth: f64,
    /// Combined surface material at the contact.
    pub material: Material,
}

/// Builds the three NCP rows for one contact point.
pub struct ContactConstraint;

impl ContactConstraint {
    /// Two unit vectors spanning the plane orthogonal to `normal`.
    fn perpendicular_axes(normal: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
        let seed = if normal.x.abs() > 0.9 {
            Vector3::y()
        } else {
            Vector3::x()
        };
        let t1 = (seed - normal * normal.dot(&seed)).normalize();
        let t2 = normal.cross(&t1);
        (t1, t2)
    }

    /// Append the normal and friction rows for `contact` to `out`.
    ///
    /// `slot1`/`slot2` are the bodies' positions in the dense slice, and
    /// `base_index` is the index the normal row will occupy in the fully
    /// assembled row list; the friction rows couple to it there. The normal
    /// row is restitution-aware: an approaching contact rebounds with the
    /// material's restitution, and penetration deeper than zero is pushed
    /// out by a clamped correction velocity.
    pub fn build_rows(
        contact: &ContactPoint,
        bodies: &[RigidBody],
        slot1: usize,
        slot2: usize,
        dt: f64,
        base_index: usize,
        out: &mut Vec<NcpConstraint>,
    ) {
        let first = &bodies[slot1];
        let second = &bodies[slot2];
        let r1 = contact.point - first.state.position;
        let r2 = contact.point - second.state.position;
        let u = (first.state.velocity + first.state.angular_velocity.cross(&r1))
            - (second.state.velocity + second.state.angular_velocity.cross(&r2));

        let n = contact.normal;
        let un = u.dot(&n);
        let correction = (contact.depth.max(0.0) * DEPTH_CORRECTION_FACTOR / dt)
            .min(DEPTH_CORRECTION_LIMIT);

        let mut normal_row = NcpConstraint::new(slot1, slot2);
        normal_row.j1 = n;
        normal_row.j2 = r1.cross(&n);
        normal_row.j3 = -n;
        normal_row.j4 = -(r2.cross(&n));
        normal_row.b = un + contact.material.restitution * un.min(0.0) - correction;
        normal_row.lower = 0.0;
        normal_row.precondition(bodies);
        out.push(normal_row);

        let mu = contact.material.friction;
        let (t1, t2) = Self::perpendicular_axes(&n);
        for tangent in [t1, t2] {
            let mut row = NcpConstraint::new(slot1, slot2);
            row.j1 = tangent;
            row.j2 = r1.cross(&tangent);
            row.j3 = -tangent;
            row.j4 = -(r2.cross(&tangent));
            row.b = u.dot(&tangent);
            // bounds are recomputed by the solver from the normal multiplier
            row.lower = 0.0;
            row.upper = 0.0;
            row.coupling = Some(Coupling {
                index: base_index,
                mu,
            });
            row.precondition(bodies);
            out.push(row);
        }
    }
}
