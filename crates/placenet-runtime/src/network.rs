//! Place-cell network: immutable structure plus a pure per-tick transition
//!
//! [`PlaceCellNetwork`] owns everything fixed at start-up (topology, weights,
//! place fields, readout, parameters). [`NetworkState`] holds everything that
//! evolves. [`PlaceCellNetwork::step`] maps a state and one input snapshot to
//! the next state without touching the previous one, so a caller can drop a
//! failed or unwanted tick without any partial mutation becoming visible.

use crate::{
    action::{ActionDecoder, DecoderParams, ReadoutMatrix, ACTION_CELLS},
    diagnostics::{stp_in_range, Anomaly, AnomalyKind, AnomalyPolicy},
    error::*,
    inhibition::InhibitionParams,
    input::{ExternalInputSnapshot, Position},
    neuron::RateParams,
    place_field::{PlaceFieldGenerator, PlaceFieldParams},
    plasticity::{IntrinsicParams, StpParams},
    replay::{Mode, ReplayController, ReplayEpisode, ReplayEvent, ReplayParams},
    topology::Topology,
    weights::WeightTable,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Network configuration parameters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NetworkConfig {
    /// Number of place units (perfect square)
    pub units: usize,
    /// Simulation time step (s)
    pub dt: f64,
    /// Current/rate integrator
    pub rate: RateParams,
    /// Short-term plasticity
    pub stp: StpParams,
    /// Intrinsic excitability
    pub intrinsic: IntrinsicParams,
    /// Global inhibition
    pub inhibition: InhibitionParams,
    /// Place-field input
    pub place_field: PlaceFieldParams,
    /// Replay schedule
    pub replay: ReplayParams,
    /// Action-cell sigmoid
    pub decoder: DecoderParams,
    /// Displacement per tick above which the agent counts as moving (m)
    pub movement_threshold: f64,
    /// Treatment of STP excursions
    pub anomaly_policy: AnomalyPolicy,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            units: crate::DEFAULT_UNITS,
            dt: crate::DEFAULT_DT,
            rate: RateParams::default(),
            stp: StpParams::default(),
            intrinsic: IntrinsicParams::default(),
            inhibition: InhibitionParams::default(),
            place_field: PlaceFieldParams::default(),
            replay: ReplayParams::default(),
            decoder: DecoderParams::default(),
            movement_threshold: 0.0,
            anomaly_policy: AnomalyPolicy::Record,
        }
    }
}

impl NetworkConfig {
    /// Validate every parameter group
    pub fn validate(&self) -> Result<()> {
        require_positive("dt", self.dt)?;
        self.rate.validate()?;
        self.stp.validate()?;
        self.intrinsic.validate()?;
        self.inhibition.validate()?;
        self.place_field.validate()?;
        self.replay.validate()?;
        if !(self.movement_threshold.is_finite() && self.movement_threshold >= 0.0) {
            return Err(RuntimeError::invalid_parameter(
                "movement_threshold",
                self.movement_threshold.to_string(),
                ">= 0.0",
            ));
        }
        Ok(())
    }
}

/// Dynamic variables of one place unit
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UnitState {
    /// Input current
    pub current: f64,
    /// Firing rate (Hz), always in `[0, max_rate]`
    pub rate: f64,
    /// Intrinsic excitability gain
    pub intrinsic_gain: f64,
    /// STP depression `D`
    pub stp_depression: f64,
    /// STP facilitation `F`
    pub stp_facilitation: f64,
}

/// Complete evolving state of the network
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NetworkState {
    /// Per-unit variables, row-major lattice order
    pub units: Vec<UnitState>,
    /// Global inhibition level
    pub inhibition: f64,
    /// Ticks executed
    pub tick: u64,
    /// Simulation time (s)
    pub time: f64,
    /// Place-field drive applied on the next explore tick; frozen during replay
    pub place_drive: Vec<f64>,
    /// Position seen on the previous tick
    pub last_position: Option<Position>,
    /// Replay state machine
    pub controller: ReplayController,
}

impl NetworkState {
    /// Rates in unit order
    pub fn rates(&self) -> Vec<f64> {
        self.units.iter().map(|u| u.rate).collect()
    }

    /// Intrinsic gains in unit order
    pub fn gains(&self) -> Vec<f64> {
        self.units.iter().map(|u| u.intrinsic_gain).collect()
    }

    /// Summed population rate
    pub fn total_rate(&self) -> f64 {
        self.units.iter().map(|u| u.rate).sum()
    }

    /// Current operating mode
    pub fn mode(&self) -> Mode {
        self.controller.mode()
    }
}

/// Request to the navigation collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum NavigationRequest {
    /// Stop moving; a replay episode started
    Halt,
    /// Replay finished; drive back to the home pose
    ReturnToBase,
}

/// Per-tick outputs for collaborators
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TickOutput {
    /// Tick index after this step
    pub tick: u64,
    /// Simulation time after this step (s)
    pub time: f64,
    /// Dynamics that ran this tick
    pub mode: Mode,
    /// Episode progress
    pub episode: ReplayEpisode,
    /// Whether the cue was injected
    pub cue_active: bool,
    /// Action-cell values `[E, N, W, S]`
    pub action_cells: [f64; ACTION_CELLS],
    /// Controller transitions
    pub events: Vec<ReplayEvent>,
    /// Navigation request, if any
    pub navigation: Option<NavigationRequest>,
}

/// Result of one transition
#[derive(Debug, Clone)]
pub struct Tick {
    /// Next state
    pub state: NetworkState,
    /// Outputs
    pub output: TickOutput,
    /// Anomalies observed while computing `state`
    pub anomalies: Vec<Anomaly>,
}

/// Place-cell attractor network
#[derive(Debug, Clone)]
pub struct PlaceCellNetwork {
    /// Network configuration
    config: NetworkConfig,
    topology: Topology,
    weights: WeightTable,
    place_fields: PlaceFieldGenerator,
    decoder: ActionDecoder,
}

impl PlaceCellNetwork {
    /// Create a network; fails on invalid configuration or readout shape
    pub fn new(config: NetworkConfig, readout: ReadoutMatrix) -> Result<Self> {
        config.validate()?;
        let topology = Topology::new(config.units)?;
        let weights = WeightTable::uniform(&topology);
        let place_fields = PlaceFieldGenerator::new(topology.side(), config.place_field.clone())?;
        let decoder = ActionDecoder::new(config.units, readout, config.decoder.clone())?;

        log::debug!(
            "Built {}x{} place-cell lattice (dt={}s)",
            topology.side(),
            topology.side(),
            config.dt
        );

        Ok(Self {
            config,
            topology,
            weights,
            place_fields,
            decoder,
        })
    }

    /// Configuration
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Lattice topology
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Recurrent weight table
    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    /// Place-field generator
    pub fn place_fields(&self) -> &PlaceFieldGenerator {
        &self.place_fields
    }

    /// Action decoder
    pub fn decoder(&self) -> &ActionDecoder {
        &self.decoder
    }

    /// Number of units
    pub fn units(&self) -> usize {
        self.topology.len()
    }

    /// Start-up state: silent units, baseline gain, recovered synapses
    pub fn initial_state(&self) -> NetworkState {
        let unit = UnitState {
            current: 0.0,
            rate: 0.0,
            intrinsic_gain: self.config.intrinsic.sigma_ss,
            stp_depression: 1.0,
            stp_facilitation: self.config.stp.u,
        };
        NetworkState {
            units: vec![unit; self.units()],
            inhibition: 0.0,
            tick: 0,
            time: 0.0,
            place_drive: vec![0.0; self.units()],
            last_position: None,
            controller: ReplayController::new(),
        }
    }

    /// Plasticity-modulated input to `unit` from its lattice neighbours
    pub fn recurrent_input(&self, state: &NetworkState, unit: usize) -> f64 {
        self.topology
            .neighbours(unit)
            .map(|(dir, k)| {
                let pre = &state.units[k];
                self.weights.get(unit, dir) * pre.rate * pre.stp_depression * pre.stp_facilitation
            })
            .sum()
    }

    fn check_state(&self, state: &NetworkState) -> Result<()> {
        let n = self.units();
        if state.units.len() != n {
            return Err(RuntimeError::dimension_mismatch("state.units", n, state.units.len()));
        }
        if state.place_drive.len() != n {
            return Err(RuntimeError::dimension_mismatch(
                "state.place_drive",
                n,
                state.place_drive.len(),
            ));
        }
        Ok(())
    }

    /// Compute the next state from `prev` and the latest input.
    ///
    /// All right-hand sides read `prev` only: the recurrent sum, STP,
    /// intrinsic gain and inhibition use the previous tick's rates.
    pub fn step(&self, prev: &NetworkState, input: &ExternalInputSnapshot) -> Result<Tick> {
        self.check_state(prev)?;
        let cfg = &self.config;
        let dt = cfg.dt;

        let mut controller = prev.controller;
        let plan = controller.advance(input.reward, &cfg.replay, dt);
        let replay = plan.mode == Mode::Replay;
        // Explore always applies last tick's drive; replay only inside cue windows
        let inject = !replay || plan.cue_active;

        let mut anomalies = Vec::new();
        let mut units = Vec::with_capacity(prev.units.len());

        for (i, u) in prev.units.iter().enumerate() {
            let recurrent = if replay {
                Some(u.intrinsic_gain * self.recurrent_input(prev, i))
            } else {
                None
            };
            let external = if inject { prev.place_drive[i] } else { 0.0 };

            let current = cfg
                .rate
                .integrate(u.current, recurrent, prev.inhibition, external, dt);
            let rate = cfg.rate.transfer(current);

            let (intrinsic_gain, overshoot) =
                cfg.intrinsic.step_clamped(u.intrinsic_gain, u.rate, dt);
            if let Some(raw) = overshoot {
                anomalies.push(Anomaly {
                    unit: i,
                    kind: AnomalyKind::GainOverflow,
                    value: raw,
                });
            }

            let (mut d, mut f) = cfg
                .stp
                .step(u.stp_depression, u.stp_facilitation, u.rate, dt);
            if !stp_in_range(d) {
                anomalies.push(Anomaly {
                    unit: i,
                    kind: AnomalyKind::StpDepression,
                    value: d,
                });
            }
            if !stp_in_range(f) {
                anomalies.push(Anomaly {
                    unit: i,
                    kind: AnomalyKind::StpFacilitation,
                    value: f,
                });
            }
            if cfg.anomaly_policy == AnomalyPolicy::Clamp {
                d = d.clamp(0.0, 1.0);
                f = f.clamp(0.0, 1.0);
            }

            units.push(UnitState {
                current,
                rate,
                intrinsic_gain,
                stp_depression: d,
                stp_facilitation: f,
            });
        }

        if cfg.anomaly_policy == AnomalyPolicy::Fail {
            if let Some(a) = anomalies
                .iter()
                .find(|a| a.kind != AnomalyKind::GainOverflow)
            {
                return Err(RuntimeError::numerical_error(format!(
                    "{} at tick {}",
                    a,
                    prev.tick + 1
                )));
            }
        }

        let inhibition = cfg
            .inhibition
            .step(prev.inhibition, prev.total_rate(), dt);

        let place_drive = if replay {
            prev.place_drive.clone()
        } else {
            let moving = prev
                .last_position
                .map_or(false, |p| p.distance(&input.position) > cfg.movement_threshold);
            self.place_fields
                .drive(input.position, moving || input.reward != 0)
        };

        if plan.completed() {
            for u in units.iter_mut() {
                u.intrinsic_gain = cfg.intrinsic.sigma_ss;
            }
            log::info!(
                "Replay episode completed at t={:.2}s; gains reset",
                prev.time + dt
            );
        } else if plan.started() {
            log::info!("Running reverse replay event at t={:.2}s", prev.time + dt);
        }

        let navigation = if plan.completed() {
            Some(NavigationRequest::ReturnToBase)
        } else if plan.started() {
            Some(NavigationRequest::Halt)
        } else {
            None
        };

        let tick = prev.tick + 1;
        let time = tick as f64 * dt;
        let rates: Vec<f64> = units.iter().map(|u| u.rate).collect();
        let action_cells = self.decoder.decode(&rates);

        let state = NetworkState {
            units,
            inhibition,
            tick,
            time,
            place_drive,
            last_position: Some(input.position),
            controller,
        };
        let output = TickOutput {
            tick,
            time,
            mode: plan.mode,
            episode: plan.episode,
            cue_active: replay && plan.cue_active,
            action_cells,
            events: plan.events,
            navigation,
        };

        Ok(Tick {
            state,
            output,
            anomalies,
        })
    }
}

/// Builder for place-cell networks
#[derive(Debug, Clone, Default)]
pub struct NetworkBuilder {
    config: NetworkConfig,
    readout: Option<ReadoutMatrix>,
}

impl NetworkBuilder {
    /// Create a builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an explicit configuration
    pub fn with_config(mut self, config: NetworkConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the number of units
    pub fn units(mut self, units: usize) -> Self {
        self.config.units = units;
        self
    }

    /// Set the time step (s)
    pub fn dt(mut self, dt: f64) -> Self {
        self.config.dt = dt;
        self
    }

    /// Set the anomaly policy
    pub fn anomaly_policy(mut self, policy: AnomalyPolicy) -> Self {
        self.config.anomaly_policy = policy;
        self
    }

    /// Inject the readout matrix (defaults to all zeros)
    pub fn readout(mut self, readout: ReadoutMatrix) -> Self {
        self.readout = Some(readout);
        self
    }

    /// Build the network
    pub fn build(self) -> Result<PlaceCellNetwork> {
        let readout = self
            .readout
            .unwrap_or_else(|| ReadoutMatrix::zeros(self.config.units));
        PlaceCellNetwork::new(self.config, readout)
    }
}
