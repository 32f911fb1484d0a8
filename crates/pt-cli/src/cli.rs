//! Command-line arguments
//!
//! Flags override values from the config file, which override defaults.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use pt_core::config::{self, ExperimentConfig, FeasibilityCheck};
use pt_core::Side;

#[derive(Parser, Debug)]
#[command(name = "pantheon-test")]
#[command(author, version, about = "Run multi-flow congestion-control experiments through emulated tunnels")]
pub struct Args {
    /// Congestion-control scheme to test
    pub cc: String,

    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of concurrent flows
    #[arg(short, long)]
    pub flows: Option<u32>,

    /// Total run time in seconds
    #[arg(short, long)]
    pub runtime: Option<u64>,

    /// Seconds between the starts of consecutive flows
    #[arg(long)]
    pub interval: Option<u64>,

    /// Run number used in log file names
    #[arg(long)]
    pub run_id: Option<u32>,

    /// Remote host, `[user@]host:<pantheon dir>`
    #[arg(long)]
    pub remote: Option<String>,

    /// Host running the tunnel servers (local or remote)
    #[arg(long)]
    pub server_side: Option<Side>,

    /// Host running the senders (local or remote)
    #[arg(long)]
    pub sender_side: Option<Side>,

    /// Address of this host reachable from the remote host
    #[arg(long)]
    pub local_addr: Option<String>,

    /// Interface for local tunnel endpoints
    #[arg(long)]
    pub local_if: Option<String>,

    /// Interface for remote tunnel endpoints
    #[arg(long)]
    pub remote_if: Option<String>,

    /// NTP server used to measure clock offsets
    #[arg(long)]
    pub ntp_addr: Option<String>,

    /// Root of the pantheon checkout
    #[arg(long)]
    pub pantheon_dir: Option<PathBuf>,

    /// Directory for raw per-flow logs
    #[arg(long)]
    pub tmp_dir: Option<PathBuf>,

    /// Directory for merged logs and stats
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Python interpreter used for schemes and tunnel managers
    #[arg(long)]
    pub python: Option<String>,

    /// Datalink trace, relative to the test directory
    #[arg(long)]
    pub uplink_trace: Option<String>,

    /// Acklink trace, relative to the test directory
    #[arg(long)]
    pub downlink_trace: Option<String>,

    /// Commands placed before mm-link
    #[arg(long)]
    pub prepend_mm_cmds: Option<String>,

    /// Commands placed after mm-link
    #[arg(long)]
    pub append_mm_cmds: Option<String>,

    /// Extra mm-link arguments
    #[arg(long, allow_hyphen_values = true)]
    pub extra_mm_link_args: Option<String>,

    /// When to check that all flow starts fit in the runtime (before or after)
    #[arg(long)]
    pub feasibility: Option<FeasibilityCheck>,

    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Log level implied by `--quiet` / `-v`
    pub fn log_level(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "error",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        }
    }

    /// Configuration file contents with these flags applied
    pub fn load_config(&self) -> Result<ExperimentConfig> {
        let mut cfg = match &self.config {
            Some(path) => config::load_config(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => {
                let path = config::default_config_path();
                if path.exists() {
                    config::load_config(&path)
                        .with_context(|| format!("Failed to load config from {}", path.display()))?
                } else {
                    ExperimentConfig::default()
                }
            }
        };
        self.apply(&mut cfg);
        Ok(cfg)
    }

    /// Override config values with the flags that were given
    pub fn apply(&self, cfg: &mut ExperimentConfig) {
        cfg.cc = self.cc.clone();

        if let Some(flows) = self.flows {
            cfg.flows = flows;
        }
        if let Some(secs) = self.runtime {
            cfg.runtime = Duration::from_secs(secs);
        }
        if let Some(secs) = self.interval {
            cfg.interval = Duration::from_secs(secs);
        }
        if let Some(run_id) = self.run_id {
            cfg.run_id = run_id;
        }
        if let Some(side) = self.server_side {
            cfg.server_side = side;
        }
        if let Some(side) = self.sender_side {
            cfg.sender_side = side;
        }
        if let Some(dir) = &self.pantheon_dir {
            cfg.pantheon_dir = dir.clone();
        }
        if let Some(python) = &self.python {
            cfg.python = python.clone();
        }
        if let Some(trace) = &self.uplink_trace {
            cfg.link.datalink_trace = trace.clone();
        }
        if let Some(trace) = &self.downlink_trace {
            cfg.link.acklink_trace = trace.clone();
        }
        if let Some(feasibility) = self.feasibility {
            cfg.schedule.feasibility = feasibility;
        }

        let overrides = [
            (&self.remote, &mut cfg.remote),
            (&self.local_addr, &mut cfg.local_addr),
            (&self.local_if, &mut cfg.local_if),
            (&self.remote_if, &mut cfg.remote_if),
            (&self.ntp_addr, &mut cfg.ntp_addr),
            (&self.prepend_mm_cmds, &mut cfg.link.prepend_mm_cmds),
            (&self.append_mm_cmds, &mut cfg.link.append_mm_cmds),
            (&self.extra_mm_link_args, &mut cfg.link.extra_mm_link_args),
        ];
        for (flag, value) in overrides {
            if flag.is_some() {
                *value = flag.clone();
            }
        }

        if self.tmp_dir.is_some() {
            cfg.tmp_dir = self.tmp_dir.clone();
        }
        if self.data_dir.is_some() {
            cfg.data_dir = self.data_dir.clone();
        }
    }
}
