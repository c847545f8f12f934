//! Configuration management for the placenet CLI

use anyhow::Context;
use std::path::{Path, PathBuf};

use placenet_runtime::{
    AnomalyPolicy, DecoderParams, InhibitionParams, IntrinsicParams, NetworkConfig,
    PlaceFieldParams, RateParams, ReadoutMatrix, ReplayParams, SimulationParams, StpParams,
};
use serde::{Deserialize, Serialize};

use crate::error::{CliError, CliResult};
use crate::scenario::Scenario;

/// Default config file name inside the workspace
pub const CONFIG_FILE: &str = "placenet.toml";

/// Full run configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacenetConfig {
    /// Lattice and integration settings
    pub network: NetworkSection,
    /// Per-mechanism parameters
    pub dynamics: DynamicsSection,
    /// Replay schedule
    pub replay: ReplayParams,
    /// Action-cell readout
    pub readout: ReadoutSection,
    /// Recording
    pub simulation: SimulationSection,
    /// Offline input script
    pub scenario: Scenario,
}

/// `[network]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSection {
    /// Number of place units (perfect square)
    pub units: usize,
    /// Time step (s)
    pub dt: f64,
    /// Displacement per tick counted as movement (m)
    pub movement_threshold: f64,
    /// `record`, `clamp` or `fail`
    pub anomaly_policy: AnomalyPolicy,
}

impl Default for NetworkSection {
    fn default() -> Self {
        let defaults = NetworkConfig::default();
        Self {
            units: defaults.units,
            dt: defaults.dt,
            movement_threshold: defaults.movement_threshold,
            anomaly_policy: defaults.anomaly_policy,
        }
    }
}

/// `[dynamics]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicsSection {
    /// Current and rate
    pub rate: RateParams,
    /// Short-term plasticity
    pub stp: StpParams,
    /// Intrinsic excitability
    pub intrinsic: IntrinsicParams,
    /// Global inhibition
    pub inhibition: InhibitionParams,
    /// Place-field input
    pub place_field: PlaceFieldParams,
}

/// Where the readout matrix comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadoutSource {
    /// All zeros
    #[default]
    Zeros,
    /// Uniform `[0, 1)` from `seed`
    Seeded,
    /// JSON file with four rows
    File,
}

/// `[readout]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadoutSection {
    /// Source of the weights
    pub source: ReadoutSource,
    /// Seed for `seeded`
    pub seed: u64,
    /// Path for `file`, relative to the config file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Sigmoid parameters
    pub decoder: DecoderParams,
}

impl Default for ReadoutSection {
    fn default() -> Self {
        Self {
            source: ReadoutSource::default(),
            seed: 42,
            path: None,
            decoder: DecoderParams::default(),
        }
    }
}

/// `[simulation]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSection {
    /// Run length when `--duration` is not given (s)
    pub duration: f64,
    /// Trace window kept in memory (s)
    pub trace_window: f64,
    /// Record every n-th tick
    pub trace_stride: u64,
    /// Reward running-average window (ticks)
    pub reward_window: f64,
}

impl Default for SimulationSection {
    fn default() -> Self {
        let defaults = SimulationParams::default();
        Self {
            duration: 20.0,
            trace_window: defaults.trace_window,
            trace_stride: defaults.trace_stride,
            reward_window: defaults.reward_window,
        }
    }
}

impl PlacenetConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load_from_file(path: &Path) -> CliResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            config.scenario.validate()?;
            Ok(config)
        } else {
            tracing::info!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: &Path) -> CliResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| CliError::config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Config path for a workspace, unless one was given explicitly
    pub fn resolve_path(workspace: &Path, explicit: Option<&Path>) -> PathBuf {
        explicit.map_or_else(|| workspace.join(CONFIG_FILE), Path::to_path_buf)
    }

    /// Runtime network configuration
    pub fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            units: self.network.units,
            dt: self.network.dt,
            rate: self.dynamics.rate.clone(),
            stp: self.dynamics.stp.clone(),
            intrinsic: self.dynamics.intrinsic.clone(),
            inhibition: self.dynamics.inhibition.clone(),
            place_field: self.dynamics.place_field.clone(),
            replay: self.replay.clone(),
            decoder: self.readout.decoder.clone(),
            movement_threshold: self.network.movement_threshold,
            anomaly_policy: self.network.anomaly_policy,
        }
    }

    /// Runtime simulation parameters
    pub fn simulation_params(&self) -> CliResult<SimulationParams> {
        let s = &self.simulation;
        Ok(SimulationParams::new(
            s.trace_window,
            s.trace_stride,
            s.reward_window,
        )?)
    }

    /// Build the readout matrix; `base` resolves a relative file path
    pub fn readout_matrix(&self, base: &Path) -> CliResult<ReadoutMatrix> {
        let units = self.network.units;
        match self.readout.source {
            ReadoutSource::Zeros => Ok(ReadoutMatrix::zeros(units)),
            ReadoutSource::Seeded => Ok(ReadoutMatrix::seeded_uniform(units, self.readout.seed)),
            ReadoutSource::File => {
                let path = self.readout.path.as_ref().ok_or_else(|| {
                    CliError::config("readout.source = \"file\" requires readout.path")
                })?;
                let path = base.join(path);
                if !path.exists() {
                    return Err(CliError::missing_resource(path.display().to_string()));
                }
                Ok(ReadoutMatrix::from_rows(units, read_readout_rows(&path)?)?)
            }
        }
    }
}

/// Read a JSON readout table, one row per action cell
fn read_readout_rows(path: &Path) -> anyhow::Result<Vec<Vec<f64>>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading readout weights from {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("parsing readout weights in {}", path.display()))
}
