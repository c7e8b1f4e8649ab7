//! Surface material coefficients.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Restitution and friction coefficients of a geometry's surface.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Material {
    /// Coefficient of restitution (0 = perfectly inelastic, 1 = elastic).
    pub restitution: f64,
    /// Coulomb friction coefficient.
    pub friction: f64,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            restitution: 0.7,
            friction: 0.5,
        }
    }
}

impl Material {
    /// Create a material with the given coefficients.
    ///
    /// Both coefficients are clamped to be non-negative.
    #[must_use]
    pub fn new(restitution: f64, friction: f64) -> Self {
        Self {
            restitution: restitution.max(0.0),
            friction: friction.max(0.0),
        }
    }

    /// A frictionless, inelastic material.
    #[must_use]
    pub fn frictionless() -> Self {
        Self {
            restitution: 0.0,
            friction: 0.0,
        }
    }
}
