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

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use wumpus_pit_inference::{
    get_neighborhood_percepts, InferenceConfig, NeighborPitProbability, PitInferenceError,
};
use wumpus_world_logic::Coordinates;

// With no arguments this runs the first move of the book example: the agent has stepped from
// (0, 0) to (1, 0) on a 4x4 cave and feels a breeze.

/// Posterior pit probabilities for the neighbors of the agent's cell.
#[derive(Parser, Debug)]
#[command(name = "wumpus-pit-inference")]
struct Args {
    /// Agent position as x,y
    #[arg(long, default_value = "1,0", allow_hyphen_values = true)]
    position: Coordinates,

    /// Cell known to be pit free, as x,y. Repeat for more cells
    #[arg(long, default_value = "0,0", allow_hyphen_values = true)]
    safe: Vec<Coordinates>,

    /// Ignore the default safe cell
    #[arg(long, conflicts_with = "safe")]
    no_safe: bool,

    /// Whether a breeze is felt at the agent position
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    breeze: bool,

    /// JSON file with grid_width, grid_height, pit_probability and decimals
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    grid_width: Option<i32>,

    #[arg(long)]
    grid_height: Option<i32>,

    /// Prior probability of a pit in any cell
    #[arg(long)]
    pit_probability: Option<f64>,

    /// Decimals kept when rounding posteriors
    #[arg(long)]
    decimals: Option<u32>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

impl Args {
    fn inference_config(&self) -> Result<InferenceConfig, PitInferenceError> {
        let mut config = match &self.config {
            Some(path) => InferenceConfig::from_json_file(path)?,
            None => InferenceConfig::default(),
        };
        if let Some(grid_width) = self.grid_width {
            config.grid_width = grid_width;
        }
        if let Some(grid_height) = self.grid_height {
            config.grid_height = grid_height;
        }
        if let Some(pit_probability) = self.pit_probability {
            config.pit_probability = pit_probability;
        }
        if let Some(decimals) = self.decimals {
            config.decimals = decimals;
        }
        config.validate()?;
        Ok(config)
    }

    fn safe_locations(&self) -> Vec<Coordinates> {
        if self.no_safe {
            Vec::new()
        } else {
            self.safe.clone()
        }
    }
}

fn run(args: &Args) -> Result<Vec<NeighborPitProbability>, PitInferenceError> {
    let config = args.inference_config()?;
    let safe_locations = args.safe_locations();
    info!(
        position = %args.position,
        breeze = args.breeze,
        safe = ?safe_locations,
        grid_width = config.grid_width,
        grid_height = config.grid_height,
        pit_probability = config.pit_probability,
        "inferring neighborhood pit probabilities"
    );
    get_neighborhood_percepts(&args.position, &safe_locations, args.breeze, &config)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let result = run(&args).and_then(|probabilities| {
        if args.json {
            println!("{}", serde_json::to_string_pretty(&probabilities)?);
        } else {
            for probability in &probabilities {
                println!("{}", probability);
            }
        }
        Ok(())
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "pit inference failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
