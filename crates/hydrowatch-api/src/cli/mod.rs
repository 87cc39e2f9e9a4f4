//! CLI command definitions for the `hwatch` binary.
//!
//! Uses clap derive macros for argument parsing. `serve` runs the control
//! service, `station` runs a station agent, the rest are one-shot RPCs
//! against a running control service.

pub mod station;
pub mod stations;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use hydrowatch_types::config::{AgentConfig, ControlConfig};

/// Water-quality station network: control service and station agents.
#[derive(Parser)]
#[command(name = "hwatch", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (default: $HYDROWATCH_CONFIG, then ~/.hydrowatch/config.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Also export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    /// Control service base URL (overrides `agent.control_url`).
    #[arg(long, global = true, env = "HYDROWATCH_URL")]
    pub url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Default tracing directive for the chosen verbosity.
    pub fn log_directive(&self) -> &'static str {
        match self.verbose {
            0 if self.quiet => "error",
            0 => "warn,hydrowatch=info,hwatch=info",
            1 => "info,hydrowatch=debug,hwatch=debug",
            _ => "trace",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the control service.
    Serve {
        /// Port to listen on.
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to.
        #[arg(long)]
        host: Option<String>,
    },

    /// Run a station agent.
    Station {
        /// Station id, e.g. "Station1".
        id: String,

        /// Neighbor to link on startup (repeatable).
        #[arg(short, long = "neighbor")]
        neighbors: Vec<String>,

        /// Number of simulated sensors.
        #[arg(long)]
        sensors: Option<usize>,

        /// Seconds between sampling ticks.
        #[arg(long)]
        interval: Option<u64>,
    },

    /// List every registered station.
    #[command(alias = "ls")]
    Stations,

    /// Show quality data of a station.
    Show {
        /// Station id to display.
        id: String,
    },

    /// Inspect or change the neighbor graph.
    Neighbors {
        #[command(subcommand)]
        command: NeighborsCommand,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum NeighborsCommand {
    /// List the neighbors of a station.
    List { id: String },

    /// Link two stations (both directions).
    Add { id: String, neighbor: String },
}

/// Apply `serve` flags over the `[control]` section.
pub fn apply_serve_overrides(config: &mut ControlConfig, host: Option<String>, port: Option<u16>) {
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }
}

/// Apply global and `station` flags over the `[agent]` section.
pub fn apply_agent_overrides(
    config: &mut AgentConfig,
    url: Option<String>,
    neighbors: Vec<String>,
    sensors: Option<usize>,
    interval: Option<u64>,
) {
    if let Some(url) = url {
        config.control_url = url;
    }
    for neighbor in neighbors {
        if !config.neighbors.contains(&neighbor) {
            config.neighbors.push(neighbor);
        }
    }
    if let Some(sensors) = sensors {
        config.sensor_count = sensors;
    }
    if let Some(interval) = interval {
        config.sample_interval_secs = interval.max(1);
    }
}
