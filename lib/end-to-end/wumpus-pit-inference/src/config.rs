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

use std::path::Path;

use bayesian_network::Float;
use serde::{Deserialize, Serialize};
use wumpus_world_logic::Grid;

use crate::PitInferenceError;

/// More decimals than an f64 can hold are meaningless.
pub const MAX_DECIMALS: u32 = 15;

/// Settings shared by every neighborhood query. Missing fields in a JSON file fall back to the
/// defaults: a 4x4 cave, pit prior 0.2, probabilities rounded to 2 decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InferenceConfig {
    /// Number of columns of the cave.
    pub grid_width: i32,

    /// Number of rows of the cave.
    pub grid_height: i32,

    /// Prior probability that any single cell holds a pit.
    pub pit_probability: Float,

    /// Decimals kept when rounding posteriors.
    pub decimals: u32,
}

impl InferenceConfig {
    /// Create a new config. Not validated until [`InferenceConfig::validate`].
    pub fn new(grid_width: i32, grid_height: i32, pit_probability: Float, decimals: u32) -> Self {
        Self {
            grid_width,
            grid_height,
            pit_probability,
            decimals,
        }
    }

    /// Parse and validate a config from JSON text.
    pub fn from_json(json: &str) -> Result<Self, PitInferenceError> {
        let config: InferenceConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, PitInferenceError> {
        let json = std::fs::read_to_string(path).map_err(|source| PitInferenceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Grid bounds of the cave.
    pub fn grid(&self) -> Grid {
        Grid::new(self.grid_width, self.grid_height)
    }

    /// Check that the grid is non-empty, the prior is a probability, and the decimals fit an f64.
    pub fn validate(&self) -> Result<(), PitInferenceError> {
        if self.grid_width <= 0 || self.grid_height <= 0 {
            return Err(PitInferenceError::InvalidGrid {
                width: self.grid_width,
                height: self.grid_height,
            });
        }
        if !(self.pit_probability.is_finite() && (0.0..=1.0).contains(&self.pit_probability)) {
            return Err(PitInferenceError::InvalidPitProbability(
                self.pit_probability,
            ));
        }
        if self.decimals > MAX_DECIMALS {
            return Err(PitInferenceError::TooManyDecimals(self.decimals));
        }
        Ok(())
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self::new(4, 4, 0.2, 2)
    }
}
