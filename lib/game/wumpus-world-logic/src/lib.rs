/*
 * Copyright (C) 2023 Asim Ihsan
 * SPDX-License-Identifier: AGPL-3.0-only
 *
 * This program is free software: you can redistribute it and/or modify it under
 * the terms of the GNU Affero General Public License as published by the Free
 * Software Foundation, version 3.
 *
 * This program is distributed in the hope that it will be useful, but WITHOUT ANY
 * WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A
 * PARTICULAR PURPOSE. See the GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License along
 * with this program. If not, see <https://www.gnu.org/licenses/>
 */

#![warn(missing_docs)]

//! Wumpus World grid logic.
//!
//! Cells, grid bounds, and the adjacency rule that ties breezes to pits.
//!
//! See:
//! -  Chapter 7: Logical Agents, section 7.2 The Wumpus World, page 210

use std::num::ParseIntError;
use std::str::FromStr;

/// Error parsing coordinates from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseCoordinatesError {
    /// Input is not of the form `x,y`.
    #[error("expected x,y but got: {0}")]
    MissingComma(String),

    /// One of the components is not an integer.
    #[error("invalid coordinate {0}: {1}")]
    InvalidInteger(String, #[source] ParseIntError),
}

/// A cell of the grid. Signed so that positions off the grid can still be expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coordinates {
    /// Column, 0 is the left edge.
    pub x: i32,

    /// Row, 0 is the bottom edge.
    pub y: i32,
}

impl Coordinates {
    /// Create new coordinates.
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Name of the cell as a network state, e.g. `1_0`.
    pub fn node_name(&self) -> String {
        format!("{}_{}", self.x, self.y)
    }

    /// Manhattan (city block) distance.
    pub fn manhattan_distance(&self, other: &Coordinates) -> i64 {
        (i64::from(self.x) - i64::from(other.x)).abs()
            + (i64::from(self.y) - i64::from(other.y)).abs()
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// parses "x,y", whitespace around either component is ignored.
impl FromStr for Coordinates {
    type Err = ParseCoordinatesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, y) = s
            .split_once(',')
            .ok_or_else(|| ParseCoordinatesError::MissingComma(s.to_string()))?;
        let parse = |component: &str| {
            let component = component.trim();
            component
                .parse::<i32>()
                .map_err(|e| ParseCoordinatesError::InvalidInteger(component.to_string(), e))
        };
        Ok(Self {
            x: parse(x)?,
            y: parse(y)?,
        })
    }
}

/// Bounds of a Wumpus World cave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Grid {
    /// Number of columns.
    pub width: i32,

    /// Number of rows.
    pub height: i32,
}

impl Default for Grid {
    fn default() -> Self {
        Self::new(4, 4)
    }
}

impl Grid {
    /// Create a new grid.
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Whether the cell is inside the grid.
    pub fn contains(&self, location: &Coordinates) -> bool {
        (0..self.width).contains(&location.x) && (0..self.height).contains(&location.y)
    }

    /// In-grid cells at Manhattan distance exactly one, x ascending then y ascending.
    ///
    /// The location itself need not be on the grid. A location just off an edge still has the
    /// adjacent edge cell as a neighbor; one further away has none.
    pub fn neighbors(&self, location: &Coordinates) -> Vec<Coordinates> {
        let mut neighbors = Vec::with_capacity(4);
        for dx in -1..=1 {
            for dy in -1..=1 {
                let (Some(x), Some(y)) = (location.x.checked_add(dx), location.y.checked_add(dy))
                else {
                    continue;
                };
                let candidate = Coordinates { x, y };
                if self.contains(&candidate) && location.manhattan_distance(&candidate) == 1 {
                    neighbors.push(candidate);
                }
            }
        }
        neighbors
    }
}

/// A cell is breezy exactly when at least one neighbor has a pit.
pub fn is_breezy(neighbor_pits: &[bool]) -> bool {
    neighbor_pits.iter().any(|&pit| pit)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_neighbors_of_bottom_edge_cell() {
        let grid = Grid::new(4, 4);
        assert_eq!(
            grid.neighbors(&Coordinates::new(1, 0)),
            vec![
                Coordinates::new(0, 0),
                Coordinates::new(1, 1),
                Coordinates::new(2, 0),
            ]
        );
    }

    #[test]
    fn test_neighbors_of_corner() {
        let grid = Grid::new(4, 4);
        assert_eq!(
            grid.neighbors(&Coordinates::new(3, 3)),
            vec![Coordinates::new(2, 3), Coordinates::new(3, 2)]
        );
    }

    #[test]
    fn test_neighbors_of_interior_cell() {
        let grid = Grid::new(4, 4);
        assert_eq!(
            grid.neighbors(&Coordinates::new(1, 1)),
            vec![
                Coordinates::new(0, 1),
                Coordinates::new(1, 0),
                Coordinates::new(1, 2),
                Coordinates::new(2, 1),
            ]
        );
    }

    #[test]
    fn test_single_cell_grid_has_no_neighbors() {
        let grid = Grid::new(1, 1);
        assert!(grid.neighbors(&Coordinates::new(0, 0)).is_empty());
    }

    #[test]
    fn test_location_just_off_grid_sees_edge_cell() {
        let grid = Grid::new(4, 4);
        assert_eq!(
            grid.neighbors(&Coordinates::new(-1, 0)),
            vec![Coordinates::new(0, 0)]
        );
    }

    #[test]
    fn test_location_far_off_grid_has_no_neighbors() {
        let grid = Grid::new(4, 4);
        assert!(grid.neighbors(&Coordinates::new(10, 10)).is_empty());
        assert!(grid
            .neighbors(&Coordinates::new(i32::MAX, i32::MIN))
            .is_empty());
    }

    #[test]
    fn test_node_name() {
        assert_eq!(Coordinates::new(2, 0).node_name(), "2_0");
        assert_eq!(Coordinates::new(-1, 3).node_name(), "-1_3");
    }

    #[test]
    fn test_parse_coordinates() {
        assert_eq!("1,0".parse::<Coordinates>(), Ok(Coordinates::new(1, 0)));
        assert_eq!(" 3 , -2 ".parse::<Coordinates>(), Ok(Coordinates::new(3, -2)));
        assert_eq!(
            "10".parse::<Coordinates>(),
            Err(ParseCoordinatesError::MissingComma("10".to_string()))
        );
        assert!(matches!(
            "a,1".parse::<Coordinates>(),
            Err(ParseCoordinatesError::InvalidInteger(ref s, _)) if s == "a"
        ));
    }

    #[test]
    fn test_is_breezy() {
        assert!(!is_breezy(&[]));
        assert!(!is_breezy(&[false, false, false]));
        assert!(is_breezy(&[false, true, false]));
    }

    proptest! {
        #[test]
        fn test_neighbors_are_adjacent_and_on_grid(
            width in 1..8i32,
            height in 1..8i32,
            x in -2..10i32,
            y in -2..10i32,
        ) {
            let grid = Grid::new(width, height);
            let location = Coordinates::new(x, y);
            let neighbors = grid.neighbors(&location);
            prop_assert!(neighbors.len() <= 4);
            for neighbor in &neighbors {
                prop_assert!(grid.contains(neighbor));
                prop_assert_eq!(location.manhattan_distance(neighbor), 1);
            }
            let mut sorted = neighbors.clone();
            sorted.sort();
            prop_assert_eq!(sorted, neighbors);
        }

        #[test]
        fn test_neighbor_relation_is_symmetric_on_grid(
            x in 0..6i32,
            y in 0..6i32,
        ) {
            let grid = Grid::new(6, 6);
            let location = Coordinates::new(x, y);
            for neighbor in grid.neighbors(&location) {
                prop_assert!(grid.neighbors(&neighbor).contains(&location));
            }
        }
    }
}
