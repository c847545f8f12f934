//! Rate units: leaky current integration and the rectifying transfer function

use crate::error::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Parameters of the current/rate integrator
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RateParams {
    /// Current time constant `τ_I` (s)
    pub tau_i: f64,
    /// Transfer gain `a`
    pub gain: f64,
    /// Rate threshold `ε` (Hz)
    pub epsilon: f64,
    /// Rate ceiling (Hz)
    pub max_rate: f64,
}

impl Default for RateParams {
    fn default() -> Self {
        Self {
            tau_i: 0.05,    // 50ms current time constant
            gain: 1.0,
            epsilon: 2.0,   // 2Hz threshold
            max_rate: 100.0,
        }
    }
}

impl RateParams {
    /// Create new rate parameters with validation
    pub fn new(tau_i: f64, gain: f64, epsilon: f64, max_rate: f64) -> Result<Self> {
        require_positive("tau_i", tau_i)?;
        if !(gain.is_finite() && gain >= 0.0) {
            return Err(RuntimeError::invalid_parameter(
                "gain",
                gain.to_string(),
                ">= 0.0",
            ));
        }
        require_positive("max_rate", max_rate)?;
        if !epsilon.is_finite() {
            return Err(RuntimeError::invalid_parameter(
                "epsilon",
                epsilon.to_string(),
                "finite",
            ));
        }
        Ok(Self {
            tau_i,
            gain,
            epsilon,
            max_rate,
        })
    }

    /// Validate parameters
    pub fn validate(&self) -> Result<()> {
        Self::new(self.tau_i, self.gain, self.epsilon, self.max_rate)?;
        Ok(())
    }

    /// Rectified, saturating transfer `clamp(a·(I − ε), 0, max_rate)`
    pub fn transfer(&self, current: f64) -> f64 {
        (self.gain * (current - self.epsilon)).clamp(0.0, self.max_rate)
    }

    /// One Euler step of the current
    ///
    /// `recurrent` is the already gain-scaled recurrent drive, or `None` in
    /// explore mode where the term is not part of the equation.
    pub fn integrate(
        &self,
        current: f64,
        recurrent: Option<f64>,
        inhibition: f64,
        external: f64,
        dt: f64,
    ) -> f64 {
        let mut drive = -current - inhibition + external;
        if let Some(r) = recurrent {
            drive += r;
        }
        current + dt / self.tau_i * drive
    }
}
