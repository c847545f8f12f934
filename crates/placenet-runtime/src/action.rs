//! Action-cell readout
//!
//! Four directional action cells `[E, N, W, S]` read the place-cell rates
//! through a linear map followed by a sigmoid. The readout matrix is not
//! learned here; callers inject it.

use crate::{error::*, input::normalize_heading};
use rand::{rngs::StdRng, Rng, SeedableRng};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of action cells
pub const ACTION_CELLS: usize = 4;

/// Direction of an action cell, in output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ActionDirection {
    /// East (+x)
    East,
    /// North (+y)
    North,
    /// West (-x)
    West,
    /// South (-y)
    South,
}

impl ActionDirection {
    /// Output order
    pub const ALL: [ActionDirection; ACTION_CELLS] = [
        ActionDirection::East,
        ActionDirection::North,
        ActionDirection::West,
        ActionDirection::South,
    ];

    /// Index in the output vector
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Place → action readout weights, 4 rows of `units` columns
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReadoutMatrix {
    units: usize,
    rows: Vec<Vec<f64>>,
}

impl ReadoutMatrix {
    /// All-zero readout
    pub fn zeros(units: usize) -> Self {
        Self {
            units,
            rows: vec![vec![0.0; units]; ACTION_CELLS],
        }
    }

    /// Readout from explicit rows, checked against `units`
    pub fn from_rows(units: usize, rows: Vec<Vec<f64>>) -> Result<Self> {
        let shape_error = |cols: usize| RuntimeError::ReadoutShape {
            expected_rows: ACTION_CELLS,
            expected_cols: units,
            rows: rows.len(),
            cols,
        };
        if rows.len() != ACTION_CELLS {
            return Err(shape_error(rows.first().map_or(0, Vec::len)));
        }
        if let Some(bad) = rows.iter().find(|r| r.len() != units) {
            return Err(shape_error(bad.len()));
        }
        if rows.iter().flatten().any(|w| !w.is_finite()) {
            return Err(RuntimeError::invalid_parameter(
                "readout",
                "non-finite entry",
                "finite weights",
            ));
        }
        Ok(Self { units, rows })
    }

    /// Uniform `[0, 1)` weights from a seeded generator
    pub fn seeded_uniform(units: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let rows = (0..ACTION_CELLS)
            .map(|_| (0..units).map(|_| rng.gen::<f64>()).collect())
            .collect();
        Self { units, rows }
    }

    /// Number of place units (columns)
    pub fn units(&self) -> usize {
        self.units
    }

    /// Row for one action cell
    pub fn row(&self, direction: ActionDirection) -> &[f64] {
        &self.rows[direction.index()]
    }

    /// `W · rates`
    pub fn project(&self, rates: &[f64]) -> [f64; ACTION_CELLS] {
        let mut out = [0.0; ACTION_CELLS];
        for (o, row) in out.iter_mut().zip(&self.rows) {
            *o = row.iter().zip(rates).map(|(w, r)| w * r).sum();
        }
        out
    }

    /// Per-unit preferred direction `(w_E − w_W, w_N − w_S)`
    pub fn preferred_directions(&self) -> Vec<(f64, f64)> {
        let [e, n, w, s] = [
            self.row(ActionDirection::East),
            self.row(ActionDirection::North),
            self.row(ActionDirection::West),
            self.row(ActionDirection::South),
        ];
        (0..self.units)
            .map(|i| (e[i] - w[i], n[i] - s[i]))
            .collect()
    }
}

/// Sigmoid readout parameters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DecoderParams {
    /// Sigmoid slope `c1`
    pub c1: f64,
    /// Sigmoid midpoint `c2`
    pub c2: f64,
}

impl Default for DecoderParams {
    fn default() -> Self {
        Self { c1: 1.0, c2: 1.0 }
    }
}

/// Stateless action-cell decoder
#[derive(Debug, Clone)]
pub struct ActionDecoder {
    readout: ReadoutMatrix,
    params: DecoderParams,
}

impl ActionDecoder {
    /// Create a decoder for a network of `units` place cells
    pub fn new(units: usize, readout: ReadoutMatrix, params: DecoderParams) -> Result<Self> {
        if readout.units() != units {
            return Err(RuntimeError::ReadoutShape {
                expected_rows: ACTION_CELLS,
                expected_cols: units,
                rows: ACTION_CELLS,
                cols: readout.units(),
            });
        }
        if !(params.c1.is_finite() && params.c2.is_finite()) {
            return Err(RuntimeError::invalid_parameter(
                "decoder",
                format!("c1={}, c2={}", params.c1, params.c2),
                "finite",
            ));
        }
        Ok(Self { readout, params })
    }

    /// Readout matrix in use
    pub fn readout(&self) -> &ReadoutMatrix {
        &self.readout
    }

    /// `sigmoid(c1·(W·rates − c2))` per direction, order `[E, N, W, S]`
    pub fn decode(&self, rates: &[f64]) -> [f64; ACTION_CELLS] {
        let mut out = self.readout.project(rates);
        for v in out.iter_mut() {
            *v = 1.0 / (1.0 + (-self.params.c1 * (*v - self.params.c2)).exp());
        }
        out
    }
}

/// Decompose a heading into non-negative `[E, N, W, S]` components
pub fn heading_to_action_cells(theta: f64) -> [f64; ACTION_CELLS] {
    let (ns, ew) = theta.sin_cos();
    [ew.max(0.0), ns.max(0.0), (-ew).max(0.0), (-ns).max(0.0)]
}

/// Heading in `[0, 2π)` pointed to by action-cell values, `None` if they cancel
pub fn action_cells_to_heading(cells: &[f64; ACTION_CELLS]) -> Option<f64> {
    let north_south = cells[ActionDirection::North.index()] - cells[ActionDirection::South.index()];
    let east_west = cells[ActionDirection::East.index()] - cells[ActionDirection::West.index()];
    if north_south == 0.0 && east_west == 0.0 {
        return None;
    }
    Some(normalize_heading(north_south.atan2(east_west)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_from_rows_shape_checks() {
        assert!(ReadoutMatrix::from_rows(3, vec![vec![0.0; 3]; 4]).is_ok());
        let err = ReadoutMatrix::from_rows(3, vec![vec![0.0; 3]; 3]).unwrap_err();
        assert!(matches!(err, RuntimeError::ReadoutShape { rows: 3, .. }));
        let mut rows = vec![vec![0.0; 3]; 4];
        rows[2].push(1.0);
        let err = ReadoutMatrix::from_rows(3, rows).unwrap_err();
        assert!(matches!(err, RuntimeError::ReadoutShape { cols: 4, .. }));
        assert!(ReadoutMatrix::from_rows(1, vec![vec![f64::NAN]; 4]).is_err());
    }

    #[test]
    fn test_decoder_rejects_wrong_width() {
        let readout = ReadoutMatrix::zeros(50);
        assert!(ActionDecoder::new(100, readout, DecoderParams::default()).is_err());
    }

    #[test]
    fn test_zero_readout_decodes_to_sigmoid_of_minus_c2() {
        let decoder =
            ActionDecoder::new(4, ReadoutMatrix::zeros(4), DecoderParams::default()).unwrap();
        let out = decoder.decode(&[10.0, 20.0, 30.0, 40.0]);
        let expected = 1.0 / (1.0 + 1f64.exp());
        for v in out {
            assert!((v - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_decode_direction_order() {
        let rows = vec![
            vec![1.0, 0.0], // E
            vec![0.0, 1.0], // N
            vec![0.0, 0.0], // W
            vec![0.0, 0.0], // S
        ];
        let readout = ReadoutMatrix::from_rows(2, rows).unwrap();
        let decoder = ActionDecoder::new(2, readout, DecoderParams::default()).unwrap();
        let out = decoder.decode(&[1.0, 5.0]);
        assert!((out[0] - 0.5).abs() < 1e-12);
        assert!(out[1] > 0.98);
        assert!(out[2] < 0.5);
    }

    #[test]
    fn test_seeded_uniform_is_reproducible() {
        let a = ReadoutMatrix::seeded_uniform(100, 7);
        let b = ReadoutMatrix::seeded_uniform(100, 7);
        let c = ReadoutMatrix::seeded_uniform(100, 8);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a
            .row(ActionDirection::West)
            .iter()
            .all(|w| (0.0..1.0).contains(w)));
    }

    #[test]
    fn test_preferred_directions() {
        let rows = vec![vec![0.5], vec![0.25], vec![0.125], vec![1.0]];
        let readout = ReadoutMatrix::from_rows(1, rows).unwrap();
        assert_eq!(readout.preferred_directions(), vec![(0.375, -0.75)]);
    }

    #[test]
    fn test_heading_to_action_cells() {
        let east = heading_to_action_cells(0.0);
        assert!((east[0] - 1.0).abs() < 1e-12);
        assert_eq!(east[2], 0.0);

        let south = heading_to_action_cells(1.5 * PI);
        assert!((south[3] - 1.0).abs() < 1e-12);
        assert_eq!(south[1], 0.0);
    }

    #[test]
    fn test_heading_round_trip_across_quadrants() {
        for theta in [0.3, FRAC_PI_2 + 0.4, PI + 0.2, 1.5 * PI + 0.7] {
            let cells = heading_to_action_cells(theta);
            let back = action_cells_to_heading(&cells).unwrap();
            assert!((back - theta).abs() < 1e-9, "{} -> {}", theta, back);
        }
        assert_eq!(action_cells_to_heading(&[0.5, 0.5, 0.5, 0.5]), None);
    }
}
