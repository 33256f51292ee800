//! Engine configuration and contractual numerical constants.
//!
//! The engine has no runtime parameter registry; every tunable is a field of
//! [`SimConfig`] with a documented effect. The numerical constants below are
//! part of the engine contract: collision detection and the impulse solver
//! are calibrated against them and tests rely on their exact values.

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Default distance tolerance: gaps in `(0, DISTANCE_TOL]` count as contact.
pub const DISTANCE_TOL: f64 = 0.01;

/// Default velocity tolerance: approach speeds below this are "slow enough"
/// for a contact to be left to the next step.
pub const VELOCITY_TOL: f64 = 0.5;

/// Default accuracy, as a fraction of the distance tolerance. A handled
/// collision must end up with distance in `[ACCURACY * dist_tol, dist_tol]`.
pub const ACCURACY: f64 = 0.1;

/// Below this, a line is treated as exactly vertical or horizontal so the
/// axis-aligned distance formulas apply.
pub const TINY_POSITIVE: f64 = 1e-10;

/// Determinant magnitude below which two segments are considered parallel.
pub const PARALLEL_TOL: f64 = 1e-16;

/// Parameter-space extension past segment endpoints accepted by segment
/// intersection. Required so acute-angle corner/corner collisions are found
/// despite floating-point error.
pub const ENDPOINT_EXTENSION_TOL: f64 = 1e-14;

/// Zero tolerance of the Gaussian elimination kernel.
pub const MATRIX_ZERO_TOL: f64 = 1e-10;

/// Vertices closer than this are considered coincident; no corner/corner
/// contact is generated between them.
pub const NEAR_VERTEX_TOL: f64 = 1e-6;

/// Fraction of the distance tolerance used for vertex/vertex proximity when
/// the perpendicular foot falls outside a straight edge. Chosen empirically
/// to suppress spurious contacts in near-vertex geometry.
pub const CORNER_CONTACT_FACTOR: f64 = 0.6;

/// How simultaneous collisions are distributed into impulse solves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollisionHandling {
    /// Solve every collision of the step in one linear system.
    Simultaneous,
    /// Partition collisions into connected components (linked through shared
    /// moveable bodies, joints attached); solve each component at once.
    Hybrid,
    /// Handle one randomly chosen focus collision at a time together with the
    /// joints on its two bodies; loop until quiescent.
    SerialGrouped,
    /// [`CollisionHandling::SerialGrouped`], then a final zero-elasticity
    /// simultaneous solve to remove residual drift and jitter.
    SerialGroupedLastPass,
    /// Handle one randomly chosen focus collision at a time, joints included
    /// individually; loop until quiescent.
    SerialSeparate,
    /// [`CollisionHandling::SerialSeparate`] with the final zero-elasticity
    /// cleanup solve.
    SerialSeparateLastPass,
}

impl CollisionHandling {
    /// Stable string identifier of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simultaneous => "SIMULTANEOUS",
            Self::Hybrid => "HYBRID",
            Self::SerialGrouped => "SERIAL_GROUPED",
            Self::SerialGroupedLastPass => "SERIAL_GROUPED_LASTPASS",
            Self::SerialSeparate => "SERIAL_SEPARATE",
            Self::SerialSeparateLastPass => "SERIAL_SEPARATE_LASTPASS",
        }
    }

    /// Parses a stable string identifier.
    pub fn from_str_id(s: &str) -> Option<Self> {
        match s {
            "SIMULTANEOUS" => Some(Self::Simultaneous),
            "HYBRID" => Some(Self::Hybrid),
            "SERIAL_GROUPED" => Some(Self::SerialGrouped),
            "SERIAL_GROUPED_LASTPASS" => Some(Self::SerialGroupedLastPass),
            "SERIAL_SEPARATE" => Some(Self::SerialSeparate),
            "SERIAL_SEPARATE_LASTPASS" => Some(Self::SerialSeparateLastPass),
            _ => None,
        }
    }

    /// Whether collisions are handled one focus at a time.
    pub fn is_serial(&self) -> bool {
        matches!(
            self,
            Self::SerialGrouped
                | Self::SerialGroupedLastPass
                | Self::SerialSeparate
                | Self::SerialSeparateLastPass
        )
    }

    /// Whether joints attached to the focus bodies are solved with the focus.
    pub fn is_grouped(&self) -> bool {
        matches!(self, Self::SerialGrouped | Self::SerialGroupedLastPass)
    }

    /// Whether a final zero-elasticity cleanup solve runs after the serial
    /// loop.
    pub fn has_last_pass(&self) -> bool {
        matches!(
            self,
            Self::SerialGroupedLastPass | Self::SerialSeparateLastPass
        )
    }
}

/// Extra impulse bias applied to slow contacts.
///
/// Bounces approaching faster than the velocity tolerance always get pure
/// restitution; this setting decides what happens to the slow contacts that
/// carry resting stacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtraAccel {
    /// No bias: contacts get exactly `-e v` like everything else.
    None,
    /// Remove residual approach velocity; contacts settle wherever they are.
    Velocity,
    /// Additionally restore slow contacts toward the middle of the distance
    /// band, so resting bodies neither sink through their support nor drift
    /// out of contact between impulse events.
    VelocityAndDistance,
}

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Contact distance tolerance; gaps in `(0, distance_tol]` are contacts.
    pub distance_tol: f64,

    /// Approach speeds below this need no bounce impulse.
    pub velocity_tol: f64,

    /// Acceptance band fraction, in `(0, 1]`: a bracketed collision is
    /// accepted when its distance lies in `[accuracy * distance_tol,
    /// distance_tol]`.
    pub accuracy: f64,

    /// Impulse distribution mode.
    pub collision_handling: CollisionHandling,

    /// Last-pass residual treatment.
    pub extra_accel: ExtraAccel,

    /// Record applied forces for display layers.
    pub show_forces: bool,

    /// Record handled collisions for display layers.
    pub show_collisions: bool,
}

impl SimConfig {
    /// Validates the configuration ranges.
    pub fn validate(&self) -> SimResult<()> {
        if !(self.distance_tol > 0.0 && self.distance_tol.is_finite()) {
            return Err(SimError::InvalidConfiguration {
                parameter: "distance_tol",
                constraint: "0 < distance_tol < inf",
            });
        }
        if !(self.velocity_tol > 0.0 && self.velocity_tol.is_finite()) {
            return Err(SimError::InvalidConfiguration {
                parameter: "velocity_tol",
                constraint: "0 < velocity_tol < inf",
            });
        }
        if !(self.accuracy > 0.0 && self.accuracy <= 1.0) {
            return Err(SimError::InvalidConfiguration {
                parameter: "accuracy",
                constraint: "0 < accuracy <= 1",
            });
        }
        Ok(())
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            distance_tol: DISTANCE_TOL,
            velocity_tol: VELOCITY_TOL,
            accuracy: ACCURACY,
            collision_handling: CollisionHandling::SerialGroupedLastPass,
            extra_accel: ExtraAccel::VelocityAndDistance,
            show_forces: false,
            show_collisions: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn test_accuracy_range_enforced() {
        let mut config = SimConfig::default();
        config.accuracy = 0.0;
        assert!(config.validate().is_err());
        config.accuracy = 1.5;
        assert!(config.validate().is_err());
        config.accuracy = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_handling_string_round_trip() {
        for mode in [
            CollisionHandling::Simultaneous,
            CollisionHandling::Hybrid,
            CollisionHandling::SerialGrouped,
            CollisionHandling::SerialGroupedLastPass,
            CollisionHandling::SerialSeparate,
            CollisionHandling::SerialSeparateLastPass,
        ] {
            assert_eq!(CollisionHandling::from_str_id(mode.as_str()), Some(mode));
        }
    }

    #[test]
    fn test_serial_classification() {
        assert!(!CollisionHandling::Simultaneous.is_serial());
        assert!(CollisionHandling::SerialSeparate.is_serial());
        assert!(CollisionHandling::SerialGroupedLastPass.is_grouped());
        assert!(!CollisionHandling::SerialSeparateLastPass.is_grouped());
        assert!(CollisionHandling::SerialSeparateLastPass.has_last_pass());
        assert!(!CollisionHandling::SerialGrouped.has_last_pass());
    }
}
