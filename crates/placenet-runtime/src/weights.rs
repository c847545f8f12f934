//! Fixed recurrent weight table

use crate::topology::{Direction, Topology, SLOTS};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Sum every row of the table is normalized to
pub const TARGET_ROW_SUM: f64 = 8.0;

/// Incoming weights per unit, aligned with the topology's direction slots.
///
/// Row `i` holds the strength of the connection from each valid neighbour
/// onto unit `i`; invalid slots are zero. Units on edges and corners have
/// fewer neighbours and therefore larger per-connection weights.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WeightTable {
    rows: Vec<[f64; SLOTS]>,
}

impl WeightTable {
    /// Build the uniform, row-normalized table for `topology`
    pub fn uniform(topology: &Topology) -> Self {
        let rows = (0..topology.len())
            .map(|unit| {
                let mut row = [0.0; SLOTS];
                for (dir, _) in topology.neighbours(unit) {
                    row[dir.slot()] = 1.0;
                }
                let sum: f64 = row.iter().sum();
                if sum > 0.0 {
                    for w in row.iter_mut() {
                        *w = *w / sum * TARGET_ROW_SUM;
                    }
                }
                row
            })
            .collect();
        Self { rows }
    }

    /// Number of rows (units)
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Weight onto `unit` from its neighbour in `dir`
    pub fn get(&self, unit: usize, dir: Direction) -> f64 {
        self.rows[unit][dir.slot()]
    }

    /// Full row for `unit`
    pub fn row(&self, unit: usize) -> &[f64; SLOTS] {
        &self.rows[unit]
    }

    /// All rows, for export
    pub fn rows(&self) -> &[[f64; SLOTS]] {
        &self.rows
    }

    /// Sum of a row
    pub fn row_sum(&self, unit: usize) -> f64 {
        self.rows[unit].iter().sum()
    }
}
