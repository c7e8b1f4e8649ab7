//! Configuration for the constraint solver and the deactivation policy.

use crate::error::{DynamicsError, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How friction bounds are recomputed from the coupled normal multiplier.
///
/// A friction row is bounded by `±|λ_n|·μ` where `λ_n` is the coupled normal
/// row's multiplier. The two policies differ in how those bounds evolve
/// during the iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FrictionBoundPolicy {
    /// Bounds track the coupled multiplier exactly each pass.
    ///
    /// Friction can both grow and shrink with the normal force within a
    /// single solve. This is the default.
    #[default]
    Instantaneous,
    /// Bounds only ever widen during a solve.
    ///
    /// More forgiving on cycling normal forces at the cost of occasionally
    /// overestimating friction within a single solve.
    Growing,
}

/// Configuration for the nonsmooth conjugate-gradient constraint solver.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SolverConfig {
    /// Maximum number of PGS sweeps per solve.
    pub max_iterations: usize,
    /// Convergence threshold on the squared multiplier-delta norm.
    pub epsilon: f64,
    /// Stagnation threshold: stop when successive residual norms differ by
    /// less than this.
    pub stagnation: f64,
    /// Friction bound recomputation policy.
    pub friction_bounds: FrictionBoundPolicy,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            epsilon: 1e-7,
            stagnation: 1e-6,
            friction_bounds: FrictionBoundPolicy::default(),
        }
    }
}

impl SolverConfig {
    /// High-accuracy configuration for offline or verification runs.
    #[must_use]
    pub fn high_accuracy() -> Self {
        Self {
            max_iterations: 500,
            epsilon: 1e-12,
            stagnation: 1e-10,
            ..Default::default()
        }
    }

    /// Fast configuration for interactive simulation.
    #[must_use]
    pub fn realtime() -> Self {
        Self {
            max_iterations: 15,
            epsilon: 1e-5,
            ..Default::default()
        }
    }

    /// Set the iteration cap.
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the friction bound policy.
    #[must_use]
    pub const fn with_friction_bounds(mut self, policy: FrictionBoundPolicy) -> Self {
        self.friction_bounds = policy;
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DynamicsError::InvalidConfig`] if any value is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(DynamicsError::invalid_config(
                "max_iterations must be at least 1",
            ));
        }
        if !(self.epsilon > 0.0 && self.epsilon.is_finite()) {
            return Err(DynamicsError::invalid_config(
                "epsilon must be positive and finite",
            ));
        }
        if !(self.stagnation > 0.0 && self.stagnation.is_finite()) {
            return Err(DynamicsError::invalid_config(
                "stagnation must be positive and finite",
            ));
        }
        Ok(())
    }
}

/// Thresholds for putting resting bodies to sleep and waking them again.
///
/// The two thresholds are deliberately far apart (hysteresis) so a body
/// hovering around the sleep threshold does not flicker between states.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeactivationConfig {
    /// A body whose combined kinetic/acceleration measure falls below this
    /// becomes a sleep candidate.
    pub sleep_threshold: f64,
    /// A sleeping body whose measure exceeds this is woken.
    pub wake_threshold: f64,
}

impl Default for DeactivationConfig {
    fn default() -> Self {
        Self {
            sleep_threshold: 1e-3,
            wake_threshold: 1e-1,
        }
    }
}

impl DeactivationConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DynamicsError::InvalidConfig`] if the thresholds are not
    /// positive or do not leave a hysteresis band.
    pub fn validate(&self) -> Result<()> {
        if !(self.sleep_threshold > 0.0 && self.sleep_threshold.is_finite()) {
            return Err(DynamicsError::invalid_config(
                "sleep_threshold must be positive and finite",
            ));
        }
        if self.wake_threshold <= self.sleep_threshold {
            return Err(DynamicsError::invalid_config(
                "wake_threshold must exceed sleep_threshold",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solver_config_validation() {
        assert!(SolverConfig::default().validate().is_ok());
        assert!(SolverConfig::high_accuracy().validate().is_ok());
        assert!(SolverConfig::realtime().validate().is_ok());

        let bad = SolverConfig {
            max_iterations: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());

        let bad = SolverConfig {
            epsilon: -1.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_deactivation_config_requires_hysteresis() {
        assert!(DeactivationConfig::default().validate().is_ok());

        let inverted = DeactivationConfig {
            sleep_threshold: 1e-1,
            wake_threshold: 1e-3,
        };
        assert!(inverted.validate().is_err());
    }
}
