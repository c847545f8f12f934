//! Place-cell attractor network runtime
//!
//! A rate-based model of hippocampal place cells on a square lattice with
//! short-term synaptic plasticity, intrinsic excitability and global
//! inhibition. Exploration drives the lattice from Gaussian place fields; a
//! reward switches it into a replay mode where recurrent activity propagates
//! from periodically re-injected cues. Four action cells read the population
//! out as a heading.
//!
//! The core is [`PlaceCellNetwork::step`], a pure transition from one
//! [`NetworkState`] to the next. [`SimulationEngine`] wraps it with an input
//! handoff, snapshot export and trace recording.

#![deny(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod action;
pub mod diagnostics;
pub mod error;
pub mod inhibition;
pub mod input;
pub mod network;
pub mod neuron;
pub mod place_field;
pub mod plasticity;
pub mod replay;
pub mod simulation;
pub mod snapshot;
pub mod topology;
pub mod weights;

// Re-export essential types
pub use action::{ActionDecoder, ActionDirection, DecoderParams, ReadoutMatrix};
pub use diagnostics::{Anomaly, AnomalyCounters, AnomalyKind, AnomalyPolicy};
pub use error::{Result, RuntimeError};
pub use inhibition::InhibitionParams;
pub use input::{ExternalInputSnapshot, Position, SharedInput};
pub use network::{
    NavigationRequest, NetworkBuilder, NetworkConfig, NetworkState, PlaceCellNetwork, Tick,
    TickOutput, UnitState,
};
pub use neuron::RateParams;
pub use place_field::{FieldAxes, PlaceFieldGenerator, PlaceFieldParams};
pub use plasticity::{IntrinsicParams, StpParams};
pub use replay::{CueWindow, Mode, ReplayController, ReplayEpisode, ReplayEvent, ReplayParams};
pub use simulation::{SimulationEngine, SimulationParams, SimulationResult, TraceRecorder};
pub use snapshot::{ChannelSink, LatestSnapshot, NetworkSnapshot, SnapshotSink};
pub use topology::{Direction, Topology};
pub use weights::WeightTable;

/// Default number of place units (10 x 10 lattice)
pub const DEFAULT_UNITS: usize = 100;

/// Default simulation time step (s)
pub const DEFAULT_DT: f64 = 0.01;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_integration() {
        let network = NetworkBuilder::new().build().unwrap();
        assert_eq!(network.units(), DEFAULT_UNITS);
        assert_eq!(network.config().dt, DEFAULT_DT);

        let mut engine =
            SimulationEngine::new(network, SimulationParams::default(), SharedInput::default())
                .unwrap();
        let output = engine.tick().unwrap();
        assert_eq!(output.mode, Mode::Explore);
        assert_eq!(engine.state().rates().len(), DEFAULT_UNITS);
    }
}
