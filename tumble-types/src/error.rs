//! Error types for dynamics operations.

use thiserror::Error;

use crate::body::{BodyId, JointId};

/// Errors that can occur in the dynamics core.
///
/// Two failure classes deliberately do *not* appear here: solver
/// non-convergence (the solver always returns a best-effort answer within its
/// iteration budget) and interaction misuse (dragging or releasing while not
/// grabbing is a no-op).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DynamicsError {
    /// A body ID was not found in the body set.
    #[error("invalid body ID: {0}")]
    InvalidBodyId(BodyId),

    /// A joint ID was not found in the scene.
    #[error("invalid joint ID: {0}")]
    InvalidJointId(JointId),

    /// Invalid mass properties.
    #[error("invalid mass properties: {reason}")]
    InvalidMassProperties {
        /// Description of what's wrong.
        reason: String,
    },

    /// Invalid timestep.
    #[error("invalid timestep: {0} (must be positive and finite)")]
    InvalidTimestep(f64),

    /// A support-feature query landed on all three box axes at once.
    ///
    /// This cannot happen for a nondegenerate box and indicates corrupted
    /// geometry or a zero direction vector.
    #[error("degenerate support direction: all three box axes within tolerance")]
    DegenerateSupportDirection,

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// Simulation diverged (`NaN` or `Inf` detected).
    #[error("simulation diverged: {reason}")]
    Diverged {
        /// Description of what went wrong.
        reason: String,
    },
}

impl DynamicsError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an invalid mass properties error.
    #[must_use]
    pub fn invalid_mass(reason: impl Into<String>) -> Self {
        Self::InvalidMassProperties {
            reason: reason.into(),
        }
    }

    /// Create a diverged error.
    #[must_use]
    pub fn diverged(reason: impl Into<String>) -> Self {
        Self::Diverged {
            reason: reason.into(),
        }
    }

    /// Check if this is a divergence error.
    #[must_use]
    pub fn is_diverged(&self) -> bool {
        matches!(self, Self::Diverged { .. })
    }
}

/// Result alias for dynamics operations.
pub type Result<T> = std::result::Result<T, DynamicsError>;
