//! Scripted trajectories and reward schedules
//!
//! Stands in for the navigation collaborator when running offline: the agent
//! follows straight segments between waypoints and the reward signal is a
//! set of `(start, end]` intervals.

use placenet_runtime::{ExternalInputSnapshot, Position};
use serde::{Deserialize, Serialize};

use crate::error::{CliError, CliResult};

/// Pose the agent holds at time `t` (s)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    /// Time (s)
    pub t: f64,
    /// x (m)
    pub x: f64,
    /// y (m)
    pub y: f64,
}

/// Reward `value` delivered over `(start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardInterval {
    /// Exclusive start (s)
    pub start: f64,
    /// Inclusive end (s)
    pub end: f64,
    /// Reward value
    pub value: u8,
}

/// Offline input script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Trajectory, sorted by time
    pub waypoints: Vec<Waypoint>,
    /// Reward schedule
    pub rewards: Vec<RewardInterval>,
}

impl Default for Scenario {
    fn default() -> Self {
        let waypoint = |t, x, y| Waypoint { t, x, y };
        Self {
            waypoints: vec![
                waypoint(0.0, 0.3, 1.0),
                waypoint(2.0, 0.7, 1.4),
                waypoint(4.0, 1.3, 1.4),
                waypoint(6.0, 1.5, 0.8),
                waypoint(8.0, 1.1, 0.5),
            ],
            rewards: vec![RewardInterval {
                start: 8.0,
                end: 18.0,
                value: 1,
            }],
        }
    }
}

impl Scenario {
    /// Check ordering and interval bounds
    pub fn validate(&self) -> CliResult<()> {
        for pair in self.waypoints.windows(2) {
            if !(pair[1].t > pair[0].t) {
                return Err(CliError::config(format!(
                    "scenario waypoints must have increasing times ({} then {})",
                    pair[0].t, pair[1].t
                )));
            }
        }
        if let Some(w) = self
            .waypoints
            .iter()
            .find(|w| !(w.t.is_finite() && w.x.is_finite() && w.y.is_finite()))
        {
            return Err(CliError::config(format!("non-finite waypoint {:?}", w)));
        }
        if let Some(r) = self.rewards.iter().find(|r| !(r.end > r.start)) {
            return Err(CliError::config(format!(
                "reward interval ({}, {}] is empty",
                r.start, r.end
            )));
        }
        Ok(())
    }

    /// Position at `t`, holding the end points outside the trajectory
    pub fn position_at(&self, t: f64) -> Position {
        let home = ExternalInputSnapshot::default().position;
        let (first, last) = match (self.waypoints.first(), self.waypoints.last()) {
            (Some(f), Some(l)) => (f, l),
            _ => return home,
        };
        if t <= first.t {
            return Position::new(first.x, first.y);
        }
        if t >= last.t {
            return Position::new(last.x, last.y);
        }
        let i = self.waypoints.partition_point(|w| w.t <= t);
        let (a, b) = (&self.waypoints[i - 1], &self.waypoints[i]);
        let s = (t - a.t) / (b.t - a.t);
        Position::new(a.x + s * (b.x - a.x), a.y + s * (b.y - a.y))
    }

    /// Direction of travel at `t`; zero when standing still
    pub fn heading_at(&self, t: f64) -> f64 {
        let i = self.waypoints.partition_point(|w| w.t <= t);
        if i == 0 || i >= self.waypoints.len() {
            return 0.0;
        }
        let (a, b) = (&self.waypoints[i - 1], &self.waypoints[i]);
        (b.y - a.y).atan2(b.x - a.x)
    }

    /// Reward at `t`
    pub fn reward_at(&self, t: f64) -> u8 {
        self.rewards
            .iter()
            .find(|r| t > r.start && t <= r.end)
            .map_or(0, |r| r.value)
    }

    /// Input snapshot the collaborator would publish at `t`
    pub fn input_at(&self, t: f64) -> ExternalInputSnapshot {
        ExternalInputSnapshot::new(self.position_at(t), self.heading_at(t), self.reward_at(t))
    }

    /// Time the script ends
    pub fn end_time(&self) -> f64 {
        let trajectory = self.waypoints.last().map_or(0.0, |w| w.t);
        self.rewards
            .iter()
            .map(|r| r.end)
            .fold(trajectory, f64::max)
    }
}
