//! Error types for the place-cell runtime

use thiserror::Error;

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors that can occur in the place-cell runtime
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// Invalid network configuration
    #[error("Invalid network configuration: {reason}")]
    InvalidConfiguration {
        /// Reason for invalid configuration
        reason: String,
    },

    /// Invalid parameter value
    #[error("Invalid parameter {parameter}: {value} (expected {constraint})")]
    InvalidParameter {
        /// Parameter name
        parameter: String,
        /// Invalid value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// Readout matrix does not match the network size
    #[error("Readout matrix shape {rows}x{cols} does not match expected {expected_rows}x{expected_cols}")]
    ReadoutShape {
        /// Expected number of rows (action cells)
        expected_rows: usize,
        /// Expected number of columns (place units)
        expected_cols: usize,
        /// Rows supplied
        rows: usize,
        /// Columns supplied (of the first mismatching row)
        cols: usize,
    },

    /// Input or state vector has the wrong length
    #[error("Dimension mismatch for {what}: got {actual}, expected {expected}")]
    DimensionMismatch {
        /// What was being sized
        what: String,
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Simulation step failed
    #[error("Simulation step failed at t={time_s:.3}s: {reason}")]
    SimulationStep {
        /// Simulation time when the step failed
        time_s: f64,
        /// Reason for failure
        reason: String,
    },

    /// Numerical anomaly rejected under the strict policy
    #[error("Numerical error: {reason}")]
    NumericalError {
        /// Reason for numerical error
        reason: String,
    },
}

impl RuntimeError {
    /// Create an invalid configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(
        parameter: impl Into<String>,
        value: impl Into<String>,
        constraint: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.into(),
            constraint: constraint.into(),
        }
    }

    /// Create a dimension mismatch error
    pub fn dimension_mismatch(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }

    /// Create a simulation step error
    pub fn simulation_step(time_s: f64, reason: impl Into<String>) -> Self {
        Self::SimulationStep {
            time_s,
            reason: reason.into(),
        }
    }

    /// Create a numerical error
    pub fn numerical_error(reason: impl Into<String>) -> Self {
        Self::NumericalError {
            reason: reason.into(),
        }
    }
}

/// Check that a time constant or step is strictly positive and finite.
pub(crate) fn require_positive(parameter: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(RuntimeError::invalid_parameter(
            parameter,
            value.to_string(),
            "> 0.0",
        ))
    }
}
