//! Per-unit plasticity: short-term depression/facilitation and intrinsic excitability

use crate::error::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Parameters for the short-term plasticity rule
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StpParams {
    /// Depression recovery time constant `τ_d` (s)
    pub tau_d: f64,
    /// Facilitation decay time constant `τ_f` (s)
    pub tau_f: f64,
    /// Facilitation baseline / utilisation `U`
    pub u: f64,
}

impl Default for StpParams {
    fn default() -> Self {
        Self {
            tau_d: 1.5,
            tau_f: 1.0,
            u: 0.6,
        }
    }
}

impl StpParams {
    /// Create new STP parameters with validation
    pub fn new(tau_d: f64, tau_f: f64, u: f64) -> Result<Self> {
        require_positive("tau_d", tau_d)?;
        require_positive("tau_f", tau_f)?;
        if !(0.0..=1.0).contains(&u) {
            return Err(RuntimeError::invalid_parameter(
                "u",
                u.to_string(),
                "in [0, 1]",
            ));
        }
        Ok(Self { tau_d, tau_f, u })
    }

    /// Validate parameters
    pub fn validate(&self) -> Result<()> {
        Self::new(self.tau_d, self.tau_f, self.u)?;
        Ok(())
    }

    /// Advance `(D, F)` by one step given the unit's rate.
    ///
    /// The result is not clamped; callers decide what to do with excursions
    /// outside `[0, 1]`.
    pub fn step(&self, depression: f64, facilitation: f64, rate: f64, dt: f64) -> (f64, f64) {
        let d = depression
            + dt * ((1.0 - depression) / self.tau_d - rate * depression * facilitation);
        let f = facilitation
            + dt * ((self.u - facilitation) / self.tau_f + self.u * (1.0 - facilitation) * rate);
        (d, f)
    }
}

/// Parameters for intrinsic excitability (homeostatic gain)
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IntrinsicParams {
    /// Gain time constant `τ_e` (s)
    pub tau_e: f64,
    /// Baseline gain `σ_ss`
    pub sigma_ss: f64,
    /// Maximum gain `σ_max`
    pub sigma_max: f64,
    /// Sigmoid midpoint `r_σ` (Hz)
    pub r_sigma: f64,
    /// Sigmoid slope `β`
    pub beta: f64,
}

impl Default for IntrinsicParams {
    fn default() -> Self {
        Self {
            tau_e: 10.0,
            sigma_ss: 0.1,
            sigma_max: 4.0,
            r_sigma: 10.0,
            beta: 1.0,
        }
    }
}

impl IntrinsicParams {
    /// Create new intrinsic-excitability parameters with validation
    pub fn new(tau_e: f64, sigma_ss: f64, sigma_max: f64, r_sigma: f64, beta: f64) -> Result<Self> {
        require_positive("tau_e", tau_e)?;
        if !sigma_ss.is_finite() || !sigma_max.is_finite() {
            return Err(RuntimeError::invalid_parameter(
                "sigma_ss/sigma_max",
                format!("{}/{}", sigma_ss, sigma_max),
                "finite",
            ));
        }
        if sigma_max <= sigma_ss {
            return Err(RuntimeError::invalid_parameter(
                "sigma_max",
                format!("{} (with sigma_ss={})", sigma_max, sigma_ss),
                "> sigma_ss",
            ));
        }
        if !beta.is_finite() || !r_sigma.is_finite() {
            return Err(RuntimeError::invalid_parameter(
                "beta/r_sigma",
                format!("{}/{}", beta, r_sigma),
                "finite",
            ));
        }
        Ok(Self {
            tau_e,
            sigma_ss,
            sigma_max,
            r_sigma,
            beta,
        })
    }

    /// Validate parameters
    pub fn validate(&self) -> Result<()> {
        Self::new(self.tau_e, self.sigma_ss, self.sigma_max, self.r_sigma, self.beta)?;
        Ok(())
    }

    /// Activity-dependent potentiation term
    pub fn sigmoid(&self, rate: f64) -> f64 {
        (self.sigma_max - 1.0) / (1.0 + (-self.beta * (rate - self.r_sigma)).exp())
    }

    /// Unclamped next gain
    pub fn step_unclamped(&self, gain: f64, rate: f64, dt: f64) -> f64 {
        gain + dt * ((self.sigma_ss - gain) / self.tau_e + self.sigmoid(rate))
    }

    /// Next gain, clamped from above at `σ_max` only
    pub fn step(&self, gain: f64, rate: f64, dt: f64) -> f64 {
        self.step_clamped(gain, rate, dt).0
    }

    /// Next gain together with the raw value when it overshot `σ_max`
    pub fn step_clamped(&self, gain: f64, rate: f64, dt: f64) -> (f64, Option<f64>) {
        let raw = self.step_unclamped(gain, rate, dt);
        if raw > self.sigma_max {
            (self.sigma_max, Some(raw))
        } else {
            (raw, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stp_params_validation() {
        assert!(StpParams::default().validate().is_ok());
        assert!(StpParams::new(0.0, 1.0, 0.6).is_err());
        assert!(StpParams::new(1.5, -1.0, 0.6).is_err());
        assert!(StpParams::new(1.5, 1.0, 1.5).is_err());
    }

    #[test]
    fn test_stp_rest_is_fixed_point() {
        let params = StpParams::default();
        let (d, f) = params.step(1.0, 0.6, 0.0, 0.01);
        assert_eq!(d, 1.0);
        assert!((f - 0.6).abs() < 1e-15);
    }

    #[test]
    fn test_stp_activity_depresses_and_facilitates() {
        let params = StpParams::default();
        let (d, f) = params.step(1.0, 0.6, 20.0, 0.01);
        // D: 1 + 0.01 * (0 - 20*1*0.6) = 0.88
        assert!((d - 0.88).abs() < 1e-12);
        // F: 0.6 + 0.01 * (0 + 0.6*0.4*20) = 0.648
        assert!((f - 0.648).abs() < 1e-12);
    }

    #[test]
    fn test_stp_is_not_clamped() {
        let params = StpParams::default();
        // Saturated rate drives D negative in one step
        let (d, _) = params.step(1.0, 1.0, 100.0, 0.02);
        assert!(d < 0.0);
    }

    #[test]
    fn test_intrinsic_params_validation() {
        assert!(IntrinsicParams::default().validate().is_ok());
        assert!(IntrinsicParams::new(0.0, 0.1, 4.0, 10.0, 1.0).is_err());
        assert!(IntrinsicParams::new(10.0, 4.0, 0.1, 10.0, 1.0).is_err());
        assert!(IntrinsicParams::new(10.0, f64::NAN, 4.0, 10.0, 1.0).is_err());
        assert!(IntrinsicParams::new(10.0, 0.1, f64::INFINITY, 10.0, 1.0).is_err());
        let nan_baseline = IntrinsicParams {
            sigma_ss: f64::NAN,
            ..IntrinsicParams::default()
        };
        assert!(nan_baseline.validate().is_err());
    }

    #[test]
    fn test_intrinsic_sigmoid_midpoint() {
        let params = IntrinsicParams::default();
        assert!((params.sigmoid(10.0) - 1.5).abs() < 1e-12);
        assert!(params.sigmoid(100.0) > 2.99);
        assert!(params.sigmoid(0.0) < 0.001);
    }

    #[test]
    fn test_intrinsic_gain_clamped_above_only() {
        let params = IntrinsicParams::default();
        let high = params.step(3.99, 100.0, 0.1);
        assert_eq!(high, 4.0);
        assert!(params.step_unclamped(3.99, 100.0, 0.1) > 4.0);

        // No lower clamp: a gain below baseline relaxes upward but is not forced
        let low = params.step(-1.0, 0.0, 0.01);
        assert!(low < 0.0);
    }

    #[test]
    fn test_intrinsic_step_clamped_reports_overshoot() {
        let params = IntrinsicParams::default();
        let raw = params.step_unclamped(3.99, 100.0, 0.1);
        assert_eq!(params.step_clamped(3.99, 100.0, 0.1), (4.0, Some(raw)));

        let (gain, overshoot) = params.step_clamped(0.1, 0.0, 0.01);
        assert_eq!(gain, params.step_unclamped(0.1, 0.0, 0.01));
        assert_eq!(overshoot, None);
    }

    #[test]
    fn test_intrinsic_gain_grows_with_activity() {
        let params = IntrinsicParams::default();
        let mut gain = params.sigma_ss;
        for _ in 0..100 {
            gain = params.step(gain, 50.0, 0.01);
        }
        assert!(gain > 2.5);
        assert!(gain <= params.sigma_max);
    }
}
