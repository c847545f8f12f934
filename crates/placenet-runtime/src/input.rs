//! External input snapshot and the latest-value handoff used to deliver it

use parking_lot::Mutex;
use std::f64::consts::TAU;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Planar position in metres
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Position {
    /// x coordinate (m)
    pub x: f64,
    /// y coordinate (m)
    pub y: f64,
}

impl Position {
    /// Create a new position
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`
    pub fn distance(&self, other: &Position) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Map any angle into `[0, 2π)`
pub fn normalize_heading(theta: f64) -> f64 {
    let wrapped = theta.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

/// Latest known sensor state, read once per tick
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExternalInputSnapshot {
    /// Agent position
    pub position: Position,
    /// Heading in radians, `[0, 2π)`
    pub heading: f64,
    /// Reward signal, 0 = none
    pub reward: u8,
}

impl ExternalInputSnapshot {
    /// Create a snapshot, normalizing the heading
    pub fn new(position: Position, heading: f64, reward: u8) -> Self {
        Self {
            position,
            heading: normalize_heading(heading),
            reward,
        }
    }

    /// Same snapshot with a different reward
    pub fn with_reward(mut self, reward: u8) -> Self {
        self.reward = reward;
        self
    }
}

impl Default for ExternalInputSnapshot {
    /// The agent's home pose, no reward
    fn default() -> Self {
        Self::new(Position::new(-0.7, 0.0), 0.0, 0)
    }
}

/// Last-write-wins cell shared between the input producer and the tick loop.
///
/// Producers overwrite the stored value; the loop copies it out at tick start.
/// Nothing is queued, so a slow loop only ever sees the newest value and a
/// silent producer leaves the previous value in place.
#[derive(Debug, Clone, Default)]
pub struct SharedInput {
    inner: Arc<Mutex<InputSlot>>,
}

#[derive(Debug, Default)]
struct InputSlot {
    snapshot: ExternalInputSnapshot,
    version: u64,
}

impl SharedInput {
    /// Create a cell holding `initial`
    pub fn new(initial: ExternalInputSnapshot) -> Self {
        Self {
            inner: Arc::new(Mutex::new(InputSlot {
                snapshot: initial,
                version: 0,
            })),
        }
    }

    /// Replace the stored snapshot
    pub fn publish(&self, snapshot: ExternalInputSnapshot) {
        let mut slot = self.inner.lock();
        slot.snapshot = snapshot;
        slot.version = slot.version.wrapping_add(1);
    }

    /// Update only the position and heading, keeping the reward
    pub fn publish_pose(&self, position: Position, heading: f64) {
        let mut slot = self.inner.lock();
        slot.snapshot.position = position;
        slot.snapshot.heading = normalize_heading(heading);
        slot.version = slot.version.wrapping_add(1);
    }

    /// Update only the reward, keeping the pose
    pub fn publish_reward(&self, reward: u8) {
        let mut slot = self.inner.lock();
        slot.snapshot.reward = reward;
        slot.version = slot.version.wrapping_add(1);
    }

    /// Copy of the latest snapshot
    pub fn latest(&self) -> ExternalInputSnapshot {
        self.inner.lock().snapshot
    }

    /// Latest snapshot together with its write counter
    pub fn latest_versioned(&self) -> (ExternalInputSnapshot, u64) {
        let slot = self.inner.lock();
        (slot.snapshot, slot.version)
    }
}
