//! Global inhibition: one leaky accumulator of total population activity

use crate::error::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Parameters of the global inhibitory feedback
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InhibitionParams {
    /// Time constant `τ_inh` (s)
    pub tau_inh: f64,
    /// Coupling `w_inh` from summed rate
    pub w_inh: f64,
}

impl Default for InhibitionParams {
    fn default() -> Self {
        Self {
            tau_inh: 0.05,
            w_inh: 0.1,
        }
    }
}

impl InhibitionParams {
    /// Validate parameters
    pub fn validate(&self) -> Result<()> {
        require_positive("tau_inh", self.tau_inh)?;
        if !(self.w_inh.is_finite() && self.w_inh >= 0.0) {
            return Err(RuntimeError::invalid_parameter(
                "w_inh",
                self.w_inh.to_string(),
                ">= 0.0",
            ));
        }
        Ok(())
    }

    /// Next inhibition level given the summed population rate
    pub fn step(&self, inhibition: f64, total_rate: f64, dt: f64) -> f64 {
        inhibition + dt * (-inhibition / self.tau_inh + self.w_inh * total_rate)
    }

    /// Fixed point for a constant population rate
    pub fn steady_state(&self, total_rate: f64) -> f64 {
        self.w_inh * self.tau_inh * total_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation() {
        assert!(InhibitionParams::default().validate().is_ok());
        let bad = InhibitionParams {
            tau_inh: 0.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_decays_without_activity() {
        let params = InhibitionParams::default();
        let next = params.step(10.0, 0.0, 0.01);
        assert!((next - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_converges_to_steady_state() {
        let params = InhibitionParams::default();
        let mut inh = 0.0;
        for _ in 0..500 {
            inh = params.step(inh, 200.0, 0.01);
        }
        assert!((inh - params.steady_state(200.0)).abs() < 1e-9);
        assert!((inh - 1.0).abs() < 1e-9);
    }
}
