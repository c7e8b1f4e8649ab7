//! Scene orchestration and direct manipulation of simulated bodies.
//!
//! A [`Scene`] owns bodies and joints and advances them in fixed steps;
//! [`BasicScene`] is the bundled implementation wiring together the body
//! set, the constraint solver, and the deactivation policy. Scenes are
//! shared between a simulation thread and input threads through the
//! coarse-grained [`SharedScene`] lock.
//!
//! [`InteractionController`] implements mouse-style grabbing: a press picks
//! the nearest body under a ray, pins it to an invisible fixed controller
//! body with a force-limited ball joint, and drags it along a movement
//! plane until release.

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn)]

mod controller;
mod ray;
mod scene;

pub use controller::InteractionController;
pub use ray::{BoxRayCaster, Ray, RayCaster, RayHit};
pub use scene::{BasicScene, Scene, SharedScene, StepStats};
