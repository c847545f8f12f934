//! Topology and weight export command

use clap::Args;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use placenet_runtime::PlaceCellNetwork;

use super::run::write_json;
use crate::config::PlacenetConfig;
use crate::error::CliResult;

/// Export the lattice topology and weights
#[derive(Args, Debug)]
pub struct TopologyCommand {
    /// Write JSON here instead of printing a summary
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// One outgoing slot of a unit
#[derive(Debug, Serialize)]
pub struct NeighbourRecord {
    /// Neighbour unit index
    pub unit: usize,
    /// Recurrent weight
    pub weight: f64,
}

/// One unit of the exported table
#[derive(Debug, Serialize)]
pub struct UnitRecord {
    /// Unit index
    pub unit: usize,
    /// Lattice row
    pub row: usize,
    /// Lattice column
    pub col: usize,
    /// Field centre in world coordinates `[x, y]`
    pub centre: [f64; 2],
    /// Neighbours keyed by direction name
    pub neighbours: BTreeMap<String, NeighbourRecord>,
    /// Readout preferred direction `[w_E - w_W, w_N - w_S]`
    pub preferred_direction: [f64; 2],
}

/// Contents of `--output`
#[derive(Debug, Serialize)]
pub struct TopologyReport {
    /// Lattice side
    pub side: usize,
    /// Units in row-major order
    pub units: Vec<UnitRecord>,
}

impl TopologyReport {
    /// Collect the table from a built network
    pub fn from_network(network: &PlaceCellNetwork) -> Self {
        let topology = network.topology();
        let weights = network.weights();
        let preferred = network.decoder().readout().preferred_directions();

        let units = (0..topology.len())
            .map(|unit| {
                let (row, col) = topology.coordinates(unit);
                let centre = network.place_fields().centre(unit);
                let neighbours = topology
                    .neighbours(unit)
                    .map(|(dir, k)| {
                        (
                            dir.to_string(),
                            NeighbourRecord {
                                unit: k,
                                weight: weights.get(unit, dir),
                            },
                        )
                    })
                    .collect();
                let (px, py) = preferred[unit];
                UnitRecord {
                    unit,
                    row,
                    col,
                    centre: [centre.x, centre.y],
                    neighbours,
                    preferred_direction: [px, py],
                }
            })
            .collect();

        Self {
            side: topology.side(),
            units,
        }
    }
}

impl TopologyCommand {
    pub async fn execute(self, workspace: PathBuf, config: Option<PathBuf>) -> CliResult<()> {
        let config_path = PlacenetConfig::resolve_path(&workspace, config.as_deref());
        let config = PlacenetConfig::load_from_file(&config_path)?;
        let base = config_path.parent().unwrap_or(Path::new("."));
        let network = PlaceCellNetwork::new(config.network_config(), config.readout_matrix(base)?)?;
        let report = TopologyReport::from_network(&network);

        match &self.output {
            Some(path) => {
                write_json(path, &report)?;
                info!("Topology of {} units written to {}", report.units.len(), path.display());
            }
            None => {
                let topology = network.topology();
                println!("Lattice: {0}x{0} ({1} units)", report.side, report.units.len());
                for unit in [0, report.side - 1, report.units.len() / 2] {
                    println!(
                        "  unit {:>4}: degree {}, row sum {:.3}",
                        unit,
                        topology.degree(unit),
                        network.weights().row_sum(unit)
                    );
                }
            }
        }

        Ok(())
    }
}
