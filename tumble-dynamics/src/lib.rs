//! Rigid-body dynamics: bodies, mass aggregation, explicit integration, and
//! a hysteresis-based deactivation policy.
//!
//! A [`RigidBody`] owns its kinematic state and a list of box geometries.
//! After attaching geometry, [`RigidBody::finalize_mass`] aggregates mass,
//! centre of mass, and inertia over all attached shapes using the
//! parallel-axis theorem, and re-expresses the geometry frames relative to
//! the computed centre of mass.
//!
//! Bodies accumulate velocity changes rather than forces: external influences
//! (gravity, user pushes) land in the external delta channels via
//! [`RigidBody::apply_force`], while the constraint solver writes into the
//! internal channels. The two are only merged into the actual velocities at
//! the end of a step, which lets the solver and the deactivation policy see
//! them separately.

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn)]

mod body;
mod body_set;
mod deactivation;

pub use body::RigidBody;
pub use body_set::BodySet;
pub use deactivation::DeactivationPolicy;
