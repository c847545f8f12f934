//! Numeric anomaly reporting
//!
//! Excursions of the STP variables outside `[0, 1]` and intrinsic gains that
//! overshoot `σ_max` before their clamp are not errors. They are recorded per
//! tick, counted, and by default the simulation carries on with the computed
//! values.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What went out of range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AnomalyKind {
    /// Depression variable left `[0, 1]`
    StpDepression,
    /// Facilitation variable left `[0, 1]`
    StpFacilitation,
    /// Intrinsic gain exceeded its maximum before clamping
    GainOverflow,
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnomalyKind::StpDepression => f.write_str("stp_depression"),
            AnomalyKind::StpFacilitation => f.write_str("stp_facilitation"),
            AnomalyKind::GainOverflow => f.write_str("gain_overflow"),
        }
    }
}

/// One out-of-range value observed during a tick
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Anomaly {
    /// Offending unit
    pub unit: usize,
    /// Variable concerned
    pub kind: AnomalyKind,
    /// Value computed for the unit
    pub value: f64,
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {:.6} at unit {}", self.kind, self.value, self.unit)
    }
}

/// How the transition treats anomalies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AnomalyPolicy {
    /// Record and keep the computed values
    #[default]
    Record,
    /// Record, then clamp STP variables into `[0, 1]`
    Clamp,
    /// Reject the tick
    Fail,
}

/// Running totals of anomalies by kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AnomalyCounters {
    /// Depression excursions
    pub stp_depression: u64,
    /// Facilitation excursions
    pub stp_facilitation: u64,
    /// Gain overshoots
    pub gain_overflow: u64,
    /// Ticks with at least one anomaly
    pub ticks_affected: u64,
}

impl AnomalyCounters {
    /// Fold one tick's anomalies into the totals
    pub fn record(&mut self, anomalies: &[Anomaly]) {
        if anomalies.is_empty() {
            return;
        }
        self.ticks_affected += 1;
        for a in anomalies {
            match a.kind {
                AnomalyKind::StpDepression => self.stp_depression += 1,
                AnomalyKind::StpFacilitation => self.stp_facilitation += 1,
                AnomalyKind::GainOverflow => self.gain_overflow += 1,
            }
        }
    }

    /// Total anomalies recorded
    pub fn total(&self) -> u64 {
        self.stp_depression + self.stp_facilitation + self.gain_overflow
    }
}

/// Whether an STP variable sits inside its nominal range
pub(crate) fn stp_in_range(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}
