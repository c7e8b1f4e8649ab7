//! Core state, configuration and error types for the tumble dynamics crates.
//!
//! This crate holds the data structures shared by the rest of the workspace:
//! body identifiers, the kinematic/inertial state block of a rigid body,
//! solver and deactivation configuration, and the error taxonomy.
//!
//! # Layering
//!
//! `tumble-types` sits at the bottom of the workspace and depends only on
//! `nalgebra` and `thiserror`. Geometry, dynamics and solver crates build on
//! top of it.

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn)]

mod body;
mod config;
mod error;

pub use body::{BodyId, BodyState, JointId};
pub use config::{DeactivationConfig, FrictionBoundPolicy, SolverConfig};
pub use error::{DynamicsError, Result};
