//! Hysteresis-based sleeping for near-resting bodies.

use nalgebra::Vector3;
use tracing::debug;
use tumble_types::{BodyId, DeactivationConfig};

use crate::body::RigidBody;

/// Decides when bodies fall asleep and when they wake back up.
///
/// The motion measure is the unweighted kinetic measure `½(v·v + ω·ω)` plus
/// the squared magnitude of all pending velocity changes, so a body being pushed this
/// step cannot sleep even if it is momentarily still. Separate sleep and
/// wake thresholds form a hysteresis band that prevents flickering near
/// either threshold.
#[derive(Debug, Clone)]
pub struct DeactivationPolicy {
    config: DeactivationConfig,
    forced: Vec<BodyId>,
}

impl DeactivationPolicy {
    /// Create a policy with the given thresholds.
    #[must_use]
    pub fn new(config: DeactivationConfig) -> Self {
        Self {
            config,
            forced: Vec::new(),
        }
    }

    /// The configured thresholds.
    #[must_use]
    pub fn config(&self) -> &DeactivationConfig {
        &self.config
    }

    /// Motion measure used against both thresholds.
    fn measure(body: &RigidBody) -> f64 {
        let dv: Vector3<f64> = body.delta_velocity + body.external_delta_velocity;
        let dw: Vector3<f64> = body.delta_omega + body.external_delta_omega;
        body.total_scaled_kinetic() + dv.norm_squared() + dw.norm_squared()
    }

    /// Whether an active body should go to sleep this step.
    #[must_use]
    pub fn should_deactivate(&self, body: &RigidBody) -> bool {
        if body.is_fixed() || body.is_deactivated() {
            return false;
        }
        Self::measure(body) < self.config.sleep_threshold
    }

    /// Whether a sleeping body should wake this step.
    ///
    /// A forced activation (see [`Self::force_activate`]) is consumed here
    /// and wakes the body exactly once regardless of its energy.
    pub fn should_activate(&mut self, body: &RigidBody) -> bool {
        if let Some(pos) = self.forced.iter().position(|&id| id == body.id()) {
            self.forced.swap_remove(pos);
            return body.is_deactivated();
        }
        if body.is_fixed() || !body.is_deactivated() {
            return false;
        }
        Self::measure(body) > self.config.wake_threshold
    }

    /// Put a body to sleep, zeroing its velocities so it stays put.
    pub fn deactivate(&self, body: &mut RigidBody) {
        debug!(body = %body.id(), "deactivating body");
        body.set_deactivated(true);
        body.state.velocity = Vector3::zeros();
        body.state.angular_velocity = Vector3::zeros();
    }

    /// Wake a body.
    pub fn activate(&self, body: &mut RigidBody) {
        debug!(body = %body.id(), "activating body");
        body.set_deactivated(false);
    }

    /// Queue a one-shot wake-up for a body, bypassing the energy check on
    /// the next pass.
    pub fn force_activate(&mut self, id: BodyId) {
        if !self.forced.contains(&id) {
            self.forced.push(id);
        }
    }
}
