//! Simulation engine for place-cell networks
//!
//! The engine owns the committed [`NetworkState`] and advances it one tick at
//! a time: read the latest input snapshot, compute the next state with the
//! pure network transition, and only then commit, record and export.

use crate::{
    action::ACTION_CELLS,
    diagnostics::{AnomalyCounters, AnomalyKind},
    error::*,
    input::{ExternalInputSnapshot, SharedInput},
    network::{NetworkState, PlaceCellNetwork, TickOutput},
    replay::{Mode, ReplayEvent},
    snapshot::{NetworkSnapshot, SnapshotSink},
};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Simulation parameters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimulationParams {
    /// Length of the recorded trace window (s)
    pub trace_window: f64,
    /// Record every n-th tick
    pub trace_stride: u64,
    /// Running-average window for the reward (ticks)
    pub reward_window: f64,
    /// Publish to sinks every n-th tick
    pub publish_every: u64,
    /// Enable performance sampling
    pub perf_enabled: bool,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            trace_window: 60.0,
            trace_stride: 1,
            reward_window: 100.0,
            publish_every: 1,
            perf_enabled: false,
        }
    }
}

impl SimulationParams {
    /// Create parameters with validation
    pub fn new(trace_window: f64, trace_stride: u64, reward_window: f64) -> Result<Self> {
        if !(trace_window.is_finite() && trace_window >= 0.0) {
            return Err(RuntimeError::invalid_parameter(
                "trace_window",
                trace_window.to_string(),
                ">= 0.0",
            ));
        }
        if trace_stride == 0 {
            return Err(RuntimeError::invalid_parameter("trace_stride", "0", "> 0"));
        }
        if !(reward_window.is_finite() && reward_window >= 1.0) {
            return Err(RuntimeError::invalid_parameter(
                "reward_window",
                reward_window.to_string(),
                ">= 1.0",
            ));
        }
        Ok(Self {
            trace_window,
            trace_stride,
            reward_window,
            ..Default::default()
        })
    }

    /// Set the snapshot publication interval
    pub fn with_publish_every(mut self, ticks: u64) -> Self {
        self.publish_every = ticks;
        self
    }

    /// Enable or disable performance sampling
    pub fn with_perf(mut self, enabled: bool) -> Self {
        self.perf_enabled = enabled;
        self
    }

    /// Validate parameters
    pub fn validate(&self) -> Result<()> {
        Self::new(self.trace_window, self.trace_stride, self.reward_window)?;
        if self.publish_every == 0 {
            return Err(RuntimeError::invalid_parameter("publish_every", "0", "> 0"));
        }
        Ok(())
    }
}

/// One recorded tick
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TraceSample {
    /// Simulation time (s)
    pub time: f64,
    /// Operating mode
    pub mode: Mode,
    /// Reward seen on this tick
    pub reward: u8,
    /// Firing rates
    pub rates: Vec<f64>,
    /// Intrinsic gains
    pub gains: Vec<f64>,
    /// Action cells `[E, N, W, S]`
    pub action_cells: [f64; ACTION_CELLS],
}

/// Sliding window of recent samples
#[derive(Debug, Clone)]
pub struct TraceRecorder {
    capacity: usize,
    stride: u64,
    samples: VecDeque<TraceSample>,
}

impl TraceRecorder {
    /// Recorder holding `window` seconds of ticks of length `dt`, keeping
    /// every `stride`-th tick
    pub fn new(window: f64, dt: f64, stride: u64) -> Self {
        let stride = stride.max(1);
        let capacity = (window / (dt * stride as f64)).round() as usize;
        Self {
            capacity,
            stride,
            samples: VecDeque::with_capacity(capacity.min(1 << 16)),
        }
    }

    /// Maximum number of samples kept
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record a committed tick if it falls on the stride
    pub fn record(&mut self, state: &NetworkState, output: &TickOutput, reward: u8) {
        if self.capacity == 0 || state.tick % self.stride != 0 {
            return;
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(TraceSample {
            time: state.time,
            mode: output.mode,
            reward,
            rates: state.rates(),
            gains: state.gains(),
            action_cells: output.action_cells,
        });
    }

    /// Recorded samples, oldest first
    pub fn samples(&self) -> impl Iterator<Item = &TraceSample> {
        self.samples.iter()
    }

    /// Most recent sample
    pub fn latest(&self) -> Option<&TraceSample> {
        self.samples.back()
    }

    /// Number of samples held
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Drop all samples
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Copy samples out, oldest first
    pub fn to_vec(&self) -> Vec<TraceSample> {
        self.samples.iter().cloned().collect()
    }
}

/// Exponential running average of the reward signal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardTracker {
    window: f64,
    average: f64,
}

impl RewardTracker {
    /// Tracker averaging over roughly `window` ticks
    pub fn new(window: f64) -> Self {
        Self {
            window: window.max(1.0),
            average: 0.0,
        }
    }

    /// Fold in one tick's reward and return the new average
    pub fn update(&mut self, reward: u8) -> f64 {
        let m = self.window;
        self.average = (1.0 - 1.0 / m) * self.average + f64::from(reward) / m;
        self.average
    }

    /// Current average
    pub fn average(&self) -> f64 {
        self.average
    }
}

/// Counters accumulated over a run
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EngineStats {
    /// Ticks committed
    pub ticks: u64,
    /// Ticks run in replay mode
    pub replay_ticks: u64,
    /// Episodes started
    pub episodes_started: u64,
    /// Episodes that ran to completion
    pub episodes_completed: u64,
    /// Episodes aborted by reward withdrawal
    pub episodes_aborted: u64,
    /// Anomaly totals
    pub anomalies: AnomalyCounters,
}

impl EngineStats {
    fn record(&mut self, output: &TickOutput) {
        self.ticks += 1;
        if output.mode == Mode::Replay {
            self.replay_ticks += 1;
        }
        for event in &output.events {
            match event {
                ReplayEvent::Started => self.episodes_started += 1,
                ReplayEvent::Aborted { .. } => self.episodes_aborted += 1,
                ReplayEvent::Completed { .. } => self.episodes_completed += 1,
            }
        }
    }
}

/// Performance metrics collected during simulation steps.
/// Present when `SimulationParams::with_perf(true)` is used.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PerfReport {
    /// Average tick time in nanoseconds
    pub avg_tick_ns: u64,
    /// Max tick time in nanoseconds
    pub max_tick_ns: u64,
    /// Ticks sampled
    pub ticks: usize,
}

/// Running tick-time totals; constant size however long the run
#[derive(Debug, Clone, Copy, Default)]
struct PerfAccumulator {
    sum_ns: u128,
    max_ns: u64,
    ticks: usize,
}

impl PerfAccumulator {
    fn record(&mut self, ns: u64) {
        self.sum_ns += u128::from(ns);
        self.max_ns = self.max_ns.max(ns);
        self.ticks += 1;
    }

    fn report(&self) -> Option<PerfReport> {
        (self.ticks > 0).then(|| PerfReport {
            avg_tick_ns: (self.sum_ns / self.ticks as u128) as u64,
            max_tick_ns: self.max_ns,
            ticks: self.ticks,
        })
    }
}

/// Outcome of [`SimulationEngine::run`]
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimulationResult {
    /// Ticks executed by this call
    pub ticks_executed: u64,
    /// Simulation time at the end (s)
    pub final_time: f64,
    /// Whether the shutdown flag stopped the run
    pub interrupted: bool,
    /// Totals since the engine was created or reset
    pub stats: EngineStats,
    /// Optional performance report
    pub perf: Option<PerfReport>,
}

/// Simulation engine
pub struct SimulationEngine {
    /// Network being simulated
    network: PlaceCellNetwork,
    params: SimulationParams,
    /// Last committed state
    state: NetworkState,
    input: SharedInput,
    sinks: Vec<Box<dyn SnapshotSink>>,
    recorder: TraceRecorder,
    reward: RewardTracker,
    stats: EngineStats,
    last_output: Option<TickOutput>,
    shutdown: Arc<AtomicBool>,
    /// Tick timings, captured when perf_enabled
    perf: PerfAccumulator,
}

impl fmt::Debug for SimulationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationEngine")
            .field("tick", &self.state.tick)
            .field("mode", &self.state.mode())
            .field("sinks", &self.sinks.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl SimulationEngine {
    /// Create an engine reading from `input`
    pub fn new(network: PlaceCellNetwork, params: SimulationParams, input: SharedInput) -> Result<Self> {
        params.validate()?;
        let dt = network.config().dt;
        let state = network.initial_state();
        Ok(Self {
            recorder: TraceRecorder::new(params.trace_window, dt, params.trace_stride),
            reward: RewardTracker::new(params.reward_window),
            network,
            params,
            state,
            input,
            sinks: Vec::new(),
            stats: EngineStats::default(),
            last_output: None,
            shutdown: Arc::new(AtomicBool::new(false)),
            perf: PerfAccumulator::default(),
        })
    }

    /// Register a snapshot sink
    pub fn add_sink(&mut self, sink: Box<dyn SnapshotSink>) {
        self.sinks.push(sink);
    }

    /// Input cell the collaborator publishes into
    pub fn input(&self) -> &SharedInput {
        &self.input
    }

    /// Flag that stops [`run`](Self::run) between ticks once set
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// The network
    pub fn network(&self) -> &PlaceCellNetwork {
        &self.network
    }

    /// Last committed state
    pub fn state(&self) -> &NetworkState {
        &self.state
    }

    /// Outputs of the last committed tick
    pub fn last_output(&self) -> Option<&TickOutput> {
        self.last_output.as_ref()
    }

    /// Trace recorder
    pub fn recorder(&self) -> &TraceRecorder {
        &self.recorder
    }

    /// Running average reward
    pub fn reward_average(&self) -> f64 {
        self.reward.average()
    }

    /// Run totals
    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Snapshot of the last committed tick
    pub fn export_snapshot(&self) -> Option<NetworkSnapshot> {
        let side = self.network.topology().side();
        self.last_output
            .as_ref()
            .map(|output| NetworkSnapshot::capture(&self.state, output, side))
    }

    /// Return to the start-up state, keeping sinks and the input cell
    pub fn reset(&mut self) {
        self.state = self.network.initial_state();
        self.recorder.clear();
        self.reward = RewardTracker::new(self.params.reward_window);
        self.stats = EngineStats::default();
        self.last_output = None;
        self.perf = PerfAccumulator::default();
    }

    /// Execute one tick against the latest input and commit it
    pub fn tick(&mut self) -> Result<TickOutput> {
        let input = self.input.latest();
        self.tick_with(&input)
    }

    fn tick_with(&mut self, input: &ExternalInputSnapshot) -> Result<TickOutput> {
        let start = self.params.perf_enabled.then(Instant::now);

        let tick = self.network.step(&self.state, input).map_err(|e| match e {
            RuntimeError::NumericalError { .. } => e,
            other => RuntimeError::simulation_step(self.state.time, other.to_string()),
        })?;

        if !tick.anomalies.is_empty() {
            self.stats.anomalies.record(&tick.anomalies);
            let stp = tick
                .anomalies
                .iter()
                .filter(|a| a.kind != AnomalyKind::GainOverflow)
                .count();
            if stp > 0 {
                log::warn!(
                    "{} STP anomalies at t={:.2}s (first: {})",
                    stp,
                    tick.state.time,
                    tick.anomalies[0]
                );
            } else {
                log::debug!(
                    "{} gain overflows clamped at t={:.2}s",
                    tick.anomalies.len(),
                    tick.state.time
                );
            }
        }

        // Commit
        self.state = tick.state;
        self.stats.record(&tick.output);
        self.recorder.record(&self.state, &tick.output, input.reward);
        self.reward.update(input.reward);

        if !self.sinks.is_empty() && self.state.tick % self.params.publish_every == 0 {
            let snapshot =
                NetworkSnapshot::capture(&self.state, &tick.output, self.network.topology().side());
            for sink in self.sinks.iter_mut() {
                sink.publish(&snapshot);
            }
        }

        if let Some(start) = start {
            let ns = u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX);
            self.perf.record(ns);
        }

        self.last_output = Some(tick.output.clone());
        Ok(tick.output)
    }

    /// Run up to `ticks` ticks against whatever the collaborator publishes
    pub fn run(&mut self, ticks: u64) -> Result<SimulationResult> {
        self.run_with(ticks, |_, _| {})
    }

    /// Run up to `ticks` ticks, calling `feed` with the upcoming tick time
    /// before each tick so a script can publish inputs
    pub fn run_with<F>(&mut self, ticks: u64, mut feed: F) -> Result<SimulationResult>
    where
        F: FnMut(f64, &SharedInput),
    {
        let dt = self.network.config().dt;
        log::info!(
            "Starting simulation: {} ticks of {}s from t={:.2}s",
            ticks,
            dt,
            self.state.time
        );

        let progress_every = (ticks / 10).max(1);
        let mut executed = 0;
        let mut interrupted = false;

        while executed < ticks {
            if self.shutdown.load(Ordering::Relaxed) {
                interrupted = true;
                log::info!("Shutdown requested at t={:.2}s", self.state.time);
                break;
            }
            let upcoming = (self.state.tick + 1) as f64 * dt;
            feed(upcoming, &self.input);
            self.tick()?;
            executed += 1;

            if executed % progress_every == 0 {
                log::debug!(
                    "Simulation progress: {:.1}%",
                    executed as f64 / ticks as f64 * 100.0
                );
            }
        }

        log::info!(
            "Simulation completed: {} ticks, {} replay episodes ({} completed, {} aborted)",
            executed,
            self.stats.episodes_started,
            self.stats.episodes_completed,
            self.stats.episodes_aborted
        );

        Ok(SimulationResult {
            ticks_executed: executed,
            final_time: self.state.time,
            interrupted,
            stats: self.stats,
            perf: self.perf_report(),
        })
    }

    fn perf_report(&self) -> Option<PerfReport> {
        if !self.params.perf_enabled {
            return None;
        }
        self.perf.report()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        diagnostics::AnomalyPolicy,
        input::Position,
        network::NetworkBuilder,
        snapshot::{ChannelSink, LatestSnapshot},
    };

    fn engine() -> SimulationEngine {
        let network = NetworkBuilder::new().build().unwrap();
        SimulationEngine::new(network, SimulationParams::default(), SharedInput::default()).unwrap()
    }

    #[test]
    fn test_params_validation() {
        assert!(SimulationParams::default().validate().is_ok());
        assert!(SimulationParams::new(60.0, 0, 100.0).is_err());
        assert!(SimulationParams::new(-1.0, 1, 100.0).is_err());
        assert!(SimulationParams::new(60.0, 1, 0.5).is_err());
        assert!(SimulationParams::default()
            .with_publish_every(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_reward_tracker() {
        let mut tracker = RewardTracker::new(100.0);
        assert!((tracker.update(1) - 0.01).abs() < 1e-12);
        assert!((tracker.update(1) - 0.0199).abs() < 1e-12);
        assert!((tracker.update(0) - 0.019701).abs() < 1e-12);
    }

    #[test]
    fn test_trace_recorder_window() {
        let mut e = engine();
        e.recorder = TraceRecorder::new(0.5, 0.01, 1);
        assert_eq!(e.recorder().capacity(), 50);
        e.run(80).unwrap();
        assert_eq!(e.recorder().len(), 50);
        let first = e.recorder().samples().next().unwrap();
        assert!((first.time - 0.31).abs() < 1e-9);
        assert!((e.recorder().latest().unwrap().time - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_trace_stride() {
        let mut recorder = TraceRecorder::new(60.0, 0.01, 10);
        assert_eq!(recorder.capacity(), 600);
        let network = NetworkBuilder::new().build().unwrap();
        let mut state = network.initial_state();
        let input = ExternalInputSnapshot::default();
        for _ in 0..25 {
            let tick = network.step(&state, &input).unwrap();
            recorder.record(&tick.state, &tick.output, 0);
            state = tick.state;
        }
        assert_eq!(recorder.len(), 2);
    }

    #[test]
    fn test_latest_input_is_used() {
        let mut e = engine();
        e.input().publish(ExternalInputSnapshot::new(Position::new(0.0, 0.0), 0.0, 1));
        let out = e.tick().unwrap();
        assert_eq!(out.mode, Mode::Replay);
        // no new input: previous value persists
        let out = e.tick().unwrap();
        assert_eq!(out.mode, Mode::Replay);
        e.input().publish_reward(0);
        let out = e.tick().unwrap();
        assert_eq!(out.mode, Mode::Explore);
        assert_eq!(e.stats().episodes_started, 1);
        assert_eq!(e.stats().episodes_aborted, 1);
    }

    #[test]
    fn test_shutdown_stops_between_ticks() {
        let mut e = engine();
        let flag = e.shutdown_handle();
        let result = e
            .run_with(1000, |t, _| {
                if t > 0.095 {
                    flag.store(true, Ordering::Relaxed);
                }
            })
            .unwrap();
        assert!(result.interrupted);
        assert_eq!(result.ticks_executed, 10);
        assert_eq!(e.state().tick, 10);
    }

    #[test]
    fn test_sinks_receive_committed_ticks() {
        let mut e = engine();
        let latest = LatestSnapshot::new();
        let (channel, rx) = ChannelSink::bounded(100);
        e.add_sink(Box::new(latest.clone()));
        e.add_sink(Box::new(channel));
        e.run(5).unwrap();
        assert_eq!(latest.get().map(|s| s.tick), Some(5));
        assert_eq!(rx.try_iter().count(), 5);
        assert_eq!(e.export_snapshot().map(|s| s.tick), Some(5));
    }

    #[test]
    fn test_failed_tick_does_not_commit() {
        let network = NetworkBuilder::new()
            .dt(0.02)
            .anomaly_policy(AnomalyPolicy::Fail)
            .build()
            .unwrap();
        let mut e =
            SimulationEngine::new(network, SimulationParams::default(), SharedInput::default())
                .unwrap();
        e.state.units[0].rate = 100.0;
        e.state.units[0].stp_facilitation = 1.0;
        let before = e.state().clone();
        assert!(e.tick().is_err());
        assert_eq!(e.state(), &before);
        assert_eq!(e.stats().ticks, 0);
    }

    #[test]
    fn test_perf_report() {
        let network = NetworkBuilder::new().build().unwrap();
        let params = SimulationParams::default().with_perf(true);
        let mut e = SimulationEngine::new(network, params, SharedInput::default()).unwrap();
        let result = e.run(20).unwrap();
        let perf = result.perf.unwrap();
        assert_eq!(perf.ticks, 20);
        assert!(perf.max_tick_ns >= perf.avg_tick_ns);

        // Totals keep accumulating across run calls and clear on reset
        let perf = e.run(30).unwrap().perf.unwrap();
        assert_eq!(perf.ticks, 50);
        e.reset();
        assert_eq!(e.run(0).unwrap().perf, None);
    }

    #[test]
    fn test_perf_accumulator_totals() {
        let mut acc = PerfAccumulator::default();
        assert_eq!(acc.report(), None);
        for ns in [300, 100, 200] {
            acc.record(ns);
        }
        assert_eq!(
            acc.report(),
            Some(PerfReport {
                avg_tick_ns: 200,
                max_tick_ns: 300,
                ticks: 3,
            })
        );
        acc.record(u64::MAX);
        acc.record(u64::MAX);
        let report = acc.report().unwrap();
        assert_eq!(report.max_tick_ns, u64::MAX);
        assert_eq!(report.ticks, 5);
    }

    #[test]
    fn test_reset() {
        let mut e = engine();
        e.input().publish_reward(1);
        e.run(30).unwrap();
        e.reset();
        assert_eq!(e.state().tick, 0);
        assert_eq!(e.state().mode(), Mode::Explore);
        assert!(e.recorder().is_empty());
        assert_eq!(e.stats().ticks, 0);
        assert!(e.export_snapshot().is_none());
    }
}
