//! Support-mapped convex geometry.
//!
//! The central abstraction is the [`SupportMap`] capability trait: a function
//! from a world-space direction to the farthest point of a convex shape along
//! that direction. Narrow-phase collision and ray queries (external to this
//! workspace) are written against that trait rather than against concrete
//! shapes.
//!
//! [`BoxGeometry`] is the one concrete shape. It carries a local frame
//! relative to its owning body, a collision envelope, material coefficients
//! and a mass proportional to its volume. A geometry does not hold a
//! reference to its body; queries take the body's [`BodyState`] as an
//! argument and ownership is recorded as a [`BodyId`] handle set by the
//! body's finalize step.
//!
//! [`BodyState`]: tumble_types::BodyState
//! [`BodyId`]: tumble_types::BodyId

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn)]

mod box_geometry;
mod material;
mod support;

pub use box_geometry::BoxGeometry;
pub use material::Material;
pub use support::{SupportFeature, SupportMap, FEATURE_TOLERANCE};
