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

//! Wumpus World pit probabilities from breezes.
//!
//! Builds a small Bayesian network over the neighbors of the agent's cell and queries it for the
//! posterior probability of a pit in each neighbor.
//!
//! See:
//! -  Chapter 12: Quantifying Uncertainty, section 12.7 The Wumpus World Revisited, page 407

use std::path::PathBuf;

use bayesian_network::{
    BakedNetwork, BayesianNetwork, ConditionalProbabilityTable, DiscreteDistribution, Evidence,
    Float, NetworkError, Node, MAX_PARENTS,
};
use serde::ser::{Serialize, SerializeMap};
use tracing::debug;
use wumpus_world_logic::{is_breezy, Coordinates};

mod config;

pub use config::{InferenceConfig, MAX_DECIMALS};

/// Pit inference error.
#[derive(Debug, thiserror::Error)]
pub enum PitInferenceError {
    /// Grid width or height is not positive.
    #[error("invalid grid size: {width}x{height}")]
    InvalidGrid {
        /// Configured width.
        width: i32,
        /// Configured height.
        height: i32,
    },

    /// Pit prior is not a finite number in [0, 1].
    #[error("pit probability out of range: {0}")]
    InvalidPitProbability(Float),

    /// More rounding decimals than [`MAX_DECIMALS`].
    #[error("too many decimals: {0}")]
    TooManyDecimals(u32),

    /// The breeze observation cannot happen given the known safe cells.
    #[error("breeze = {breeze} at {position} is impossible given the known safe locations")]
    ContradictoryEvidence {
        /// Agent position.
        position: Coordinates,
        /// Observed breeze.
        breeze: bool,
    },

    /// Building or querying the network failed.
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Config file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Config is not valid JSON, or output could not be serialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Posterior probability of a pit in one neighboring cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborPitProbability {
    /// The neighboring cell.
    pub location: Coordinates,

    /// P(pit | evidence), rounded.
    pub probability: Float,
}

// Serialized as a one entry map, e.g. {"1_1": 0.56}.
impl Serialize for NeighborPitProbability {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.location.node_name(), &self.probability)?;
        map.end()
    }
}

impl std::fmt::Display for NeighborPitProbability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.location.node_name(), self.probability)
    }
}

/// Deterministic breeze table for a cell with `neighbors` neighbors.
///
/// Enumerates all `2^(neighbors + 1)` assignments of (pit bits, breeze bit) in binary counting
/// order. A row has probability 1 when the breeze bit equals the OR of the pit bits, else 0.
pub fn breeze_cpt(neighbors: usize) -> Result<ConditionalProbabilityTable, NetworkError> {
    if neighbors > MAX_PARENTS {
        return Err(NetworkError::TooManyParents(neighbors));
    }
    let columns = neighbors + 1;
    let rows = (0..(1usize << columns))
        .map(|row| {
            let bits: Vec<bool> = (0..columns)
                .rev()
                .map(|shift| (row >> shift) & 1 == 1)
                .collect();
            let (pits, breeze) = bits.split_at(neighbors);
            let breeze = breeze[0];
            let probability = if is_breezy(pits) ^ breeze { 0.0 } else { 1.0 };
            (pits.to_vec(), breeze, probability)
        })
        .collect();
    ConditionalProbabilityTable::new(neighbors, rows)
}

/// Two layer network: one pit node per neighbor, each feeding the breeze node of `position`.
///
/// Pit nodes are named after their cell and come first, in `neighbors` order. The breeze node is
/// named after `position` and comes last.
pub fn build_neighborhood_network(
    position: &Coordinates,
    neighbors: &[Coordinates],
    pit_probability: Float,
) -> Result<BakedNetwork, NetworkError> {
    let mut network = BayesianNetwork::new("pits and breezes");
    let pit_prior = DiscreteDistribution::new(pit_probability)?;

    let pits = neighbors
        .iter()
        .map(|neighbor| network.add_state(Node::new(neighbor.node_name(), pit_prior)))
        .collect::<Result<Vec<_>, _>>()?;
    let breeze = network.add_state(Node::new(
        position.node_name(),
        breeze_cpt(neighbors.len())?,
    ))?;
    for pit in pits {
        network.add_edge(pit, breeze)?;
    }

    network.bake()
}

fn round_to(value: Float, decimals: u32) -> Float {
    let factor = Float::powi(10.0, decimals as i32);
    (value * factor).round() / factor
}

/// Posterior pit probability of every in-grid neighbor of `position`, given whether a breeze is
/// felt there and which cells are already known to be pit free.
///
/// Safe locations outside the neighborhood are ignored, as is `position` itself if listed. A
/// neighbor known to be safe is reported with probability 0. A position with no neighbors on the
/// grid yields an empty list.
pub fn get_neighborhood_percepts(
    position: &Coordinates,
    safe_locations: &[Coordinates],
    breeze: bool,
    config: &InferenceConfig,
) -> Result<Vec<NeighborPitProbability>, PitInferenceError> {
    config.validate()?;

    let neighbors = config.grid().neighbors(position);
    if neighbors.is_empty() {
        debug!(%position, "no neighbors on the grid");
        return Ok(Vec::new());
    }

    let network = build_neighborhood_network(position, &neighbors, config.pit_probability)?;

    let position_name = position.node_name();
    let mut evidence = Evidence::default();
    for safe in safe_locations {
        let name = safe.node_name();
        if name != position_name && network.states().contains(&name) {
            evidence.insert(name, false);
        }
    }
    evidence.insert(position_name, breeze);
    debug!(%position, breeze, ?evidence, "querying neighborhood");

    let posteriors = network.predict_proba(&evidence).map_err(|e| match e {
        NetworkError::ImpossibleEvidence => PitInferenceError::ContradictoryEvidence {
            position: *position,
            breeze,
        },
        e => PitInferenceError::Network(e),
    })?;
    debug!(?posteriors, "posteriors");

    Ok(neighbors
        .iter()
        .zip(posteriors.iter())
        .map(|(location, posterior)| NeighborPitProbability {
            location: *location,
            probability: round_to(posterior.p_true(), config.decimals),
        })
        .collect())
}
