//! Read-only state export
//!
//! Observers never see the live state. After each committed tick the engine
//! builds a [`NetworkSnapshot`] and offers it to every registered
//! [`SnapshotSink`]; sinks must not block the loop.

use crate::{
    action::ACTION_CELLS,
    network::{NetworkState, TickOutput},
    replay::{Mode, ReplayEpisode},
};
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use parking_lot::RwLock;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Copy of the observable network state at a tick boundary
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NetworkSnapshot {
    /// Tick index
    pub tick: u64,
    /// Simulation time (s)
    pub time: f64,
    /// Operating mode on this tick
    pub mode: Mode,
    /// Episode progress
    pub episode: ReplayEpisode,
    /// Lattice side length
    pub side: usize,
    /// Firing rates, row-major
    pub rates: Vec<f64>,
    /// Intrinsic gains, row-major
    pub gains: Vec<f64>,
    /// Global inhibition
    pub inhibition: f64,
    /// Action cells `[E, N, W, S]`
    pub action_cells: [f64; ACTION_CELLS],
}

impl NetworkSnapshot {
    /// Capture state and outputs of a committed tick
    pub fn capture(state: &NetworkState, output: &TickOutput, side: usize) -> Self {
        Self {
            tick: state.tick,
            time: state.time,
            mode: output.mode,
            episode: output.episode,
            side,
            rates: state.rates(),
            gains: state.gains(),
            inhibition: state.inhibition,
            action_cells: output.action_cells,
        }
    }

    /// Rates as an `L x L` grid, `grid[row][col]`
    pub fn rate_grid(&self) -> Vec<Vec<f64>> {
        self.rates.chunks(self.side.max(1)).map(<[f64]>::to_vec).collect()
    }

    /// Unit with the highest rate, if any unit is active
    pub fn peak_unit(&self) -> Option<usize> {
        self.rates
            .iter()
            .enumerate()
            .filter(|(_, &r)| r > 0.0)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
    }
}

/// Consumer of per-tick snapshots
pub trait SnapshotSink: Send {
    /// Accept a snapshot; must return without waiting on the consumer
    fn publish(&mut self, snapshot: &NetworkSnapshot);
}

/// Keeps only the most recent snapshot, readable from other threads
#[derive(Debug, Clone, Default)]
pub struct LatestSnapshot {
    slot: Arc<RwLock<Option<NetworkSnapshot>>>,
}

impl LatestSnapshot {
    /// Create an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest published snapshot
    pub fn get(&self) -> Option<NetworkSnapshot> {
        self.slot.read().clone()
    }
}

impl SnapshotSink for LatestSnapshot {
    fn publish(&mut self, snapshot: &NetworkSnapshot) {
        *self.slot.write() = Some(snapshot.clone());
    }
}

/// Bounded channel sink; snapshots are dropped while the receiver lags
#[derive(Debug)]
pub struct ChannelSink {
    tx: Sender<NetworkSnapshot>,
    dropped: u64,
}

impl ChannelSink {
    /// Create a sink and its receiving end
    pub fn bounded(capacity: usize) -> (Self, Receiver<NetworkSnapshot>) {
        let (tx, rx) = channel::bounded(capacity);
        (Self { tx, dropped: 0 }, rx)
    }

    /// Snapshots dropped because the channel was full or closed
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl SnapshotSink for ChannelSink {
    fn publish(&mut self, snapshot: &NetworkSnapshot) {
        match self.tx.try_send(snapshot.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
            }
            Err(TrySendError::Disconnected(_)) => {
                if self.dropped == 0 {
                    log::debug!("Snapshot receiver disconnected");
                }
                self.dropped += 1;
            }
        }
    }
}
