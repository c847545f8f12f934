//! Gaussian place-field drive
//!
//! Maps the agent's position to an external input vector, one Gaussian bump
//! per lattice unit. Fields tile a `L/cells_per_meter` square arena. By
//! default unit `r·L + c` is centred at `(r/cpm + offset, c/cpm + offset)`
//! and positions are compared as given; [`FieldAxes::XColumns`] together with
//! `arena_offset` selects an arena centred on the world origin with x running
//! along columns.

use crate::{error::*, input::Position};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which lattice index the x coordinate follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FieldAxes {
    /// x along rows, y along columns
    #[default]
    XRows,
    /// x along columns, y along rows
    XColumns,
}

/// Parameters of the place-field input
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlaceFieldParams {
    /// Peak drive while moving or rewarded (Hz)
    pub amplitude: f64,
    /// Gaussian width `d` (m)
    pub width: f64,
    /// Offset of the first field centre from the arena corner (m)
    pub field_offset: f64,
    /// World-to-arena translation added to positions (m)
    pub arena_offset: (f64, f64),
    /// Axis convention
    pub axes: FieldAxes,
}

impl Default for PlaceFieldParams {
    fn default() -> Self {
        Self {
            amplitude: 50.0,
            width: 0.1,
            field_offset: 0.1,
            arena_offset: (0.0, 0.0),
            axes: FieldAxes::XRows,
        }
    }
}

impl PlaceFieldParams {
    /// Origin-centred arena with x along columns, as driven by the robot stack
    pub fn centred_arena() -> Self {
        Self {
            arena_offset: (1.0, 1.0),
            axes: FieldAxes::XColumns,
            ..Self::default()
        }
    }

    /// Validate parameters
    pub fn validate(&self) -> Result<()> {
        require_positive("place_field.width", self.width)?;
        if !(self.amplitude.is_finite() && self.amplitude >= 0.0) {
            return Err(RuntimeError::invalid_parameter(
                "place_field.amplitude",
                self.amplitude.to_string(),
                ">= 0.0",
            ));
        }
        let (ox, oy) = self.arena_offset;
        if !(self.field_offset.is_finite() && ox.is_finite() && oy.is_finite()) {
            return Err(RuntimeError::invalid_parameter(
                "place_field.offsets",
                format!("field_offset={}, arena_offset=({}, {})", self.field_offset, ox, oy),
                "finite",
            ));
        }
        Ok(())
    }
}

/// Place-field drive generator for an `L x L` lattice
#[derive(Debug, Clone)]
pub struct PlaceFieldGenerator {
    params: PlaceFieldParams,
    /// Field centres in arena coordinates, indexed by unit
    centres: Vec<(f64, f64)>,
}

impl PlaceFieldGenerator {
    /// Precompute field centres for a lattice of side `side`
    pub fn new(side: usize, params: PlaceFieldParams) -> Result<Self> {
        params.validate()?;
        let cells_per_meter = side as f64 / 2.0;
        let mut centres = Vec::with_capacity(side * side);
        for row in 0..side {
            for col in 0..side {
                let r = row as f64 / cells_per_meter + params.field_offset;
                let c = col as f64 / cells_per_meter + params.field_offset;
                centres.push(match params.axes {
                    FieldAxes::XRows => (r, c),
                    FieldAxes::XColumns => (c, r),
                });
            }
        }
        Ok(Self { params, centres })
    }

    /// Parameters in use
    pub fn params(&self) -> &PlaceFieldParams {
        &self.params
    }

    /// Field centre of `unit` in world coordinates
    pub fn centre(&self, unit: usize) -> Position {
        let (cx, cy) = self.centres[unit];
        Position::new(cx - self.params.arena_offset.0, cy - self.params.arena_offset.1)
    }

    /// Drive vector for `position`; all zeros when `drive_active` is false
    pub fn drive(&self, position: Position, drive_active: bool) -> Vec<f64> {
        let mut out = vec![0.0; self.centres.len()];
        self.drive_into(position, drive_active, &mut out);
        out
    }

    /// Write the drive vector into `out`
    pub fn drive_into(&self, position: Position, drive_active: bool, out: &mut [f64]) {
        if !drive_active {
            out.iter_mut().for_each(|v| *v = 0.0);
            return;
        }
        let amplitude = self.params.amplitude;
        let denom = 2.0 * self.params.width * self.params.width;
        let px = position.x + self.params.arena_offset.0;
        let py = position.y + self.params.arena_offset.1;
        for (v, &(cx, cy)) in out.iter_mut().zip(&self.centres) {
            let dist_sq = (px - cx).powi(2) + (py - cy).powi(2);
            *v = amplitude * (-dist_sq / denom).exp();
        }
    }
}
