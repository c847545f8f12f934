//! Square-lattice topology resolver
//!
//! Units are laid out row-major on an `L x L` grid. Every unit has eight
//! direction slots ordered `[W, NW, N, NE, E, SE, S, SW]` (clockwise from
//! west); slots that would leave the grid are absent. The table is built once
//! and read on every tick, so the validity predicates are never re-evaluated
//! inside the integrator.

use crate::error::*;
use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of direction slots per unit
pub const SLOTS: usize = 8;

/// Compass direction of an incoming lattice connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Direction {
    /// West
    W,
    /// North-west
    NW,
    /// North
    N,
    /// North-east
    NE,
    /// East
    E,
    /// South-east
    SE,
    /// South
    S,
    /// South-west
    SW,
}

impl Direction {
    /// All directions in slot order
    pub const ALL: [Direction; SLOTS] = [
        Direction::W,
        Direction::NW,
        Direction::N,
        Direction::NE,
        Direction::E,
        Direction::SE,
        Direction::S,
        Direction::SW,
    ];

    /// Slot index of this direction
    pub const fn slot(self) -> usize {
        self as usize
    }

    /// Direction for a raw slot index, `None` when out of range
    pub fn from_slot(slot: usize) -> Option<Self> {
        Self::ALL.get(slot).copied()
    }

    /// Geometrically opposite direction (slot + 4 mod 8)
    pub fn opposite(self) -> Self {
        Self::ALL[(self.slot() + SLOTS / 2) % SLOTS]
    }

    /// Signed (row, column) offset of the neighbour in this direction
    pub const fn offset(self) -> (isize, isize) {
        match self {
            Direction::W => (0, -1),
            Direction::NW => (-1, -1),
            Direction::N => (-1, 0),
            Direction::NE => (-1, 1),
            Direction::E => (0, 1),
            Direction::SE => (1, 1),
            Direction::S => (1, 0),
            Direction::SW => (1, -1),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::W => "W",
            Direction::NW => "NW",
            Direction::N => "N",
            Direction::NE => "NE",
            Direction::E => "E",
            Direction::SE => "SE",
            Direction::S => "S",
            Direction::SW => "SW",
        };
        f.write_str(name)
    }
}

/// Integer square root, `None` when `n` is not a perfect square
pub fn exact_sqrt(n: usize) -> Option<usize> {
    let square = |k: usize| k.checked_mul(k);
    let mut side = (n as f64).sqrt() as usize;
    // Float sqrt can land one off for large inputs
    while square(side).map_or(true, |sq| sq > n) {
        side -= 1;
    }
    while side
        .checked_add(1)
        .and_then(square)
        .map_or(false, |sq| sq <= n)
    {
        side += 1;
    }
    (square(side) == Some(n)).then_some(side)
}

/// Immutable adjacency table of an `L x L` lattice
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Topology {
    side: usize,
    slots: Vec<[Option<usize>; SLOTS]>,
}

impl Topology {
    /// Build the topology for `units` cells; `units` must be a non-zero perfect square
    pub fn new(units: usize) -> Result<Self> {
        if units == 0 {
            return Err(RuntimeError::invalid_config("unit count must be non-zero"));
        }
        let side = exact_sqrt(units).ok_or_else(|| {
            RuntimeError::invalid_config(format!("unit count {} is not a perfect square", units))
        })?;

        let slots = (0..units)
            .map(|unit| {
                let mut row = [None; SLOTS];
                for dir in Direction::ALL {
                    row[dir.slot()] = Self::neighbour_of(side, unit, dir);
                }
                row
            })
            .collect();

        Ok(Self { side, slots })
    }

    /// Apply the boundary rules and index formulas for one slot
    fn neighbour_of(side: usize, unit: usize, dir: Direction) -> Option<usize> {
        let units = side * side;
        let left = unit % side == 0;
        let top = unit < side;
        let right = (unit + 1) % side == 0;
        let bottom = unit >= units - side;

        let blocked = match dir {
            Direction::W => left,
            Direction::NW => left || top,
            Direction::N => top,
            Direction::NE => top || right,
            Direction::E => right,
            Direction::SE => right || bottom,
            Direction::S => bottom,
            Direction::SW => bottom || left,
        };
        if blocked {
            return None;
        }

        let neighbour = match dir {
            Direction::W => unit - 1,
            Direction::NW => unit - (side + 1),
            Direction::N => unit - side,
            Direction::NE => unit - (side - 1),
            Direction::E => unit + 1,
            Direction::SE => unit + (side + 1),
            Direction::S => unit + side,
            Direction::SW => unit + (side - 1),
        };
        Some(neighbour)
    }

    /// Number of units
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the lattice is empty (never true for a constructed topology)
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Grid side length `L`
    pub fn side(&self) -> usize {
        self.side
    }

    /// `(row, column)` of a unit
    pub fn coordinates(&self, unit: usize) -> (usize, usize) {
        (unit / self.side, unit % self.side)
    }

    /// Neighbour of `unit` in direction `dir`, if it exists
    ///
    /// # Panics
    /// Panics if `unit` is out of range.
    pub fn resolve(&self, unit: usize, dir: Direction) -> Option<usize> {
        self.slots[unit][dir.slot()]
    }

    /// Raw slot row for `unit`, aligned with [`Direction::ALL`]
    pub fn slots(&self, unit: usize) -> &[Option<usize>; SLOTS] {
        &self.slots[unit]
    }

    /// Valid `(direction, neighbour)` pairs of `unit`
    pub fn neighbours(&self, unit: usize) -> impl Iterator<Item = (Direction, usize)> + '_ {
        self.slots[unit]
            .iter()
            .enumerate()
            .filter_map(|(slot, n)| n.map(|k| (Direction::ALL[slot], k)))
    }

    /// Number of valid neighbours of `unit`
    pub fn degree(&self, unit: usize) -> usize {
        self.slots[unit].iter().filter(|n| n.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_rejects_non_square() {
        assert!(Topology::new(0).is_err());
        assert!(Topology::new(99).is_err());
        assert!(Topology::new(2).is_err());
        assert!(Topology::new(100).is_ok());
        assert!(Topology::new(1).is_ok());
    }

    #[test]
    fn test_exact_sqrt() {
        assert_eq!(exact_sqrt(0), Some(0));
        assert_eq!(exact_sqrt(100), Some(10));
        assert_eq!(exact_sqrt(101), None);
        assert_eq!(exact_sqrt(1 << 40), Some(1 << 20));
    }

    #[test]
    fn test_exact_sqrt_near_usize_max() {
        assert_eq!(exact_sqrt(usize::MAX), None);
        assert_eq!(exact_sqrt(usize::MAX - 1), None);
        let root = (1usize << (usize::BITS / 2)) - 1;
        assert_eq!(exact_sqrt(root * root), Some(root));
        assert!(Topology::new(usize::MAX).is_err());
    }

    #[test]
    fn test_direction_slots() {
        for (i, dir) in Direction::ALL.iter().enumerate() {
            assert_eq!(dir.slot(), i);
            assert_eq!(Direction::from_slot(i), Some(*dir));
            assert_eq!(dir.opposite().opposite(), *dir);
        }
        assert_eq!(Direction::from_slot(8), None);
        assert_eq!(Direction::W.opposite(), Direction::E);
        assert_eq!(Direction::NW.opposite(), Direction::SE);
    }

    #[test]
    fn test_corner_and_edge_degrees() {
        let topo = Topology::new(100).unwrap();
        assert_eq!(topo.side(), 10);
        // corners
        for unit in [0, 9, 90, 99] {
            assert_eq!(topo.degree(unit), 3, "corner {}", unit);
        }
        // edges
        for unit in [5, 40, 49, 95] {
            assert_eq!(topo.degree(unit), 5, "edge {}", unit);
        }
        assert_eq!(topo.degree(55), 8);
    }

    #[test]
    fn test_index_formulas() {
        let topo = Topology::new(100).unwrap();
        let i = 55;
        assert_eq!(topo.resolve(i, Direction::W), Some(54));
        assert_eq!(topo.resolve(i, Direction::NW), Some(44));
        assert_eq!(topo.resolve(i, Direction::N), Some(45));
        assert_eq!(topo.resolve(i, Direction::NE), Some(46));
        assert_eq!(topo.resolve(i, Direction::E), Some(56));
        assert_eq!(topo.resolve(i, Direction::SE), Some(66));
        assert_eq!(topo.resolve(i, Direction::S), Some(65));
        assert_eq!(topo.resolve(i, Direction::SW), Some(64));

        assert_eq!(topo.resolve(0, Direction::W), None);
        assert_eq!(topo.resolve(0, Direction::N), None);
        assert_eq!(topo.resolve(0, Direction::SE), Some(11));
        assert_eq!(topo.resolve(9, Direction::E), None);
        assert_eq!(topo.resolve(9, Direction::SW), Some(18));
    }

    #[test]
    fn test_single_unit_has_no_neighbours() {
        let topo = Topology::new(1).unwrap();
        assert_eq!(topo.degree(0), 0);
    }

    #[test]
    fn test_neighbours_are_adjacent_cells() {
        let topo = Topology::new(49).unwrap();
        for unit in 0..topo.len() {
            let (r, c) = topo.coordinates(unit);
            for (dir, k) in topo.neighbours(unit) {
                let (dr, dc) = dir.offset();
                let (kr, kc) = topo.coordinates(k);
                assert_eq!(kr as isize, r as isize + dr);
                assert_eq!(kc as isize, c as isize + dc);
            }
        }
    }

    proptest! {
        #[test]
        fn prop_topology_symmetry(side in 1usize..16) {
            let topo = Topology::new(side * side).unwrap();
            for unit in 0..topo.len() {
                for (dir, k) in topo.neighbours(unit) {
                    prop_assert_eq!(topo.resolve(k, dir.opposite()), Some(unit));
                }
            }
        }
    }
}
