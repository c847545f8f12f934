//! Simulation run command

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use placenet_runtime::{
    simulation::{EngineStats, TraceSample},
    LatestSnapshot, NavigationRequest, PlaceCellNetwork, ReplayEvent, SharedInput,
    SimulationEngine,
};

use crate::config::PlacenetConfig;
use crate::error::{CliError, CliResult};

/// Run the network against the configured scenario
#[derive(Args, Debug)]
pub struct RunCommand {
    /// Simulated duration in seconds (defaults to [simulation].duration)
    #[arg(long)]
    pub duration: Option<f64>,

    /// Write the recorded trace and run summary to this JSON file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Pace ticks at wall-clock rate
    #[arg(long)]
    pub realtime: bool,

    /// Write the final network snapshot to this JSON file
    #[arg(long)]
    pub snapshot: Option<PathBuf>,
}

/// Controller transition seen during the run
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    /// Simulation time (s)
    pub time: f64,
    /// Transition
    pub event: ReplayEvent,
    /// Request sent to navigation on the same tick
    pub navigation: Option<NavigationRequest>,
}

/// Contents of `--output`
#[derive(Debug, Serialize)]
pub struct RunReport {
    /// Ticks executed
    pub ticks: u64,
    /// Simulation time reached (s)
    pub final_time: f64,
    /// Stopped by Ctrl-C
    pub interrupted: bool,
    /// Running average of the reward at the end
    pub reward_average: f64,
    /// Totals
    pub stats: EngineStats,
    /// Replay transitions in order
    pub events: Vec<EventRecord>,
    /// Recorded window, oldest first
    pub trace: Vec<TraceSample>,
}

impl RunCommand {
    pub async fn execute(self, workspace: PathBuf, config: Option<PathBuf>) -> CliResult<()> {
        let config_path = PlacenetConfig::resolve_path(&workspace, config.as_deref());
        let config = PlacenetConfig::load_from_file(&config_path)?;
        let base = config_path.parent().unwrap_or(Path::new("."));

        let duration = self.duration.unwrap_or(config.simulation.duration);
        if !(duration.is_finite() && duration > 0.0) {
            return Err(CliError::invalid_args(format!(
                "--duration must be positive, got {}",
                duration
            )));
        }

        let network = PlaceCellNetwork::new(config.network_config(), config.readout_matrix(base)?)?;
        let dt = network.config().dt;
        let ticks = (duration / dt).round() as u64;
        let params = config.simulation_params()?;
        let scenario = config.scenario;

        let input = SharedInput::new(scenario.input_at(0.0));
        let mut engine = SimulationEngine::new(network, params, input)?;
        let latest = LatestSnapshot::new();
        if self.snapshot.is_some() {
            engine.add_sink(Box::new(latest.clone()));
        }

        let shutdown = engine.shutdown_handle();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.store(true, Ordering::Relaxed);
            }
        });

        info!(
            "Running {} ticks ({:.2}s){}",
            ticks,
            duration,
            if self.realtime { " in real time" } else { "" }
        );

        let progress = ProgressBar::new(ticks);
        progress.set_style(
            ProgressStyle::with_template("{bar:40} {pos}/{len} ticks {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let mut pacer = self.realtime.then(|| {
            let mut interval = tokio::time::interval(Duration::from_secs_f64(dt));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });

        let stop = engine.shutdown_handle();
        let mut events = Vec::new();
        let mut interrupted = false;
        for _ in 0..ticks {
            if let Some(interval) = pacer.as_mut() {
                interval.tick().await;
            }
            if stop.load(Ordering::Relaxed) {
                interrupted = true;
                warn!("Interrupted at t={:.2}s", engine.state().time);
                break;
            }

            let t = (engine.state().tick + 1) as f64 * dt;
            engine.input().publish(scenario.input_at(t));
            let output = engine.tick()?;

            for event in &output.events {
                events.push(EventRecord {
                    time: output.time,
                    event: *event,
                    navigation: output.navigation,
                });
            }
            if let Some(request) = output.navigation {
                progress.set_message(format!("{:?} at t={:.2}s", request, output.time));
            }
            progress.inc(1);
        }
        progress.finish_and_clear();

        let stats = *engine.stats();
        info!(
            "Finished at t={:.2}s: {} replay episodes ({} completed, {} aborted), {} anomalies",
            engine.state().time,
            stats.episodes_started,
            stats.episodes_completed,
            stats.episodes_aborted,
            stats.anomalies.total()
        );

        if let Some(path) = &self.snapshot {
            match latest.get() {
                Some(snapshot) => {
                    write_json(path, &snapshot)?;
                    info!("Snapshot written to {}", path.display());
                }
                None => warn!("No ticks executed; snapshot not written"),
            }
        }

        if let Some(path) = &self.output {
            let report = RunReport {
                ticks: engine.state().tick,
                final_time: engine.state().time,
                interrupted,
                reward_average: engine.reward_average(),
                stats,
                events,
                trace: engine.recorder().to_vec(),
            };
            write_json(path, &report)?;
            info!("Trace written to {}", path.display());
        }

        Ok(())
    }
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> CliResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    Ok(())
}
