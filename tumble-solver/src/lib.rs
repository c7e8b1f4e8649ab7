//! Velocity-level constraint solving for rigid-body dynamics.
//!
//! Constraints are expressed as rows of a nonlinear complementarity problem
//! (NCP): each row carries a Jacobian split across two bodies, a bias, force
//! bounds, and an optional friction coupling that ties its bounds to another
//! row's multiplier. [`NonsmoothCg`] solves the assembled rows with a
//! projected Gauss-Seidel sweep accelerated by nonsmooth nonlinear conjugate
//! gradient directions, writing velocity changes directly into the bodies'
//! solver delta channels.
//!
//! Row factories for the two supported constraint kinds live in
//! [`BallJoint`] (an attachment point shared by two bodies, with a force
//! limit and error correction) and [`ContactConstraint`] (a unilateral
//! normal row with two coupled friction rows).

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn)]

mod ball;
mod constraint;
mod contact;
mod merit;
mod solver;

pub use ball::BallJoint;
pub use constraint::{Coupling, NcpConstraint};
pub use contact::{ContactConstraint, ContactPoint};
pub use merit::merit;
pub use solver::{NonsmoothCg, SolverStats};
