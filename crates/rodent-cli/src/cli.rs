use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "rodent", about = "Physical disk inventory and health administration", version)]
pub struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, env = "RODENT_CONFIG", default_value = "/etc/rodent/config.yaml", global = true)]
    pub config_path: PathBuf,

    /// Path to the JSON state file.
    #[arg(long, env = "RODENT_STATE", default_value = "/var/lib/rodent/state.json", global = true)]
    pub state_path: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the manager in the foreground: initial discovery, scheduled
    /// jobs, and hotplug detection, until interrupted.
    Start,

    /// List cached disks, optionally filtered.
    Inventory {
        #[arg(long, value_enum)]
        state: Option<StateArg>,
        /// Restrict to disks not already claimed by a pool.
        #[arg(long)]
        available_only: bool,
    },

    /// Show one disk's full record.
    Show { device_id: String },

    /// Run a discovery pass immediately.
    Discover,

    /// Run a health sweep immediately.
    HealthCheck,

    /// Move a freshly discovered disk through validation into Available.
    Validate { device_id: String },

    #[command(subcommand)]
    Probe(ProbeCommand),

    #[command(subcommand)]
    Schedule(ScheduleCommand),

    /// Transition a disk's lifecycle state.
    SetState {
        device_id: String,
        #[arg(value_enum)]
        state: StateArg,
        #[arg(long, default_value = "operator requested")]
        reason: String,
    },

    /// Quarantine a disk.
    Quarantine {
        device_id: String,
        #[arg(long, default_value = "operator requested")]
        reason: String,
    },

    /// Set a tag on a disk.
    Tag { device_id: String, key: String, value: String },

    /// Show the derived controller/enclosure topology.
    Topology,

    /// Show aggregate statistics.
    Stats,

    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
pub enum ProbeCommand {
    /// Trigger a probe against a disk.
    Trigger {
        device_id: String,
        #[arg(value_enum, default_value = "quick")]
        probe_type: ProbeTypeArg,
    },
    /// Cancel a running probe.
    Cancel { probe_id: String },
    /// Show one probe execution's record.
    Show { probe_id: String },
    /// List currently active probes.
    Active,
    /// Show a disk's probe history.
    History {
        device_id: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[derive(Debug, Subcommand)]
pub enum ScheduleCommand {
    List,
    Enable { schedule_id: String },
    Disable { schedule_id: String },
    Delete { schedule_id: String },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    Show,
    Reload,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StateArg {
    Discovered,
    Validating,
    Available,
    Online,
    Degraded,
    Faulted,
    Quarantined,
    Removing,
    Offline,
    Retired,
    Unauthorized,
}

impl From<StateArg> for rodent_domain::DiskState {
    fn from(value: StateArg) -> Self {
        use rodent_domain::DiskState::*;
        match value {
            StateArg::Discovered => Discovered,
            StateArg::Validating => Validating,
            StateArg::Available => Available,
            StateArg::Online => Online,
            StateArg::Degraded => Degraded,
            StateArg::Faulted => Faulted,
            StateArg::Quarantined => Quarantined,
            StateArg::Removing => Removing,
            StateArg::Offline => Offline,
            StateArg::Retired => Retired,
            StateArg::Unauthorized => Unauthorized,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ProbeTypeArg {
    Quick,
    Extensive,
}

impl From<ProbeTypeArg> for rodent_domain::ProbeType {
    fn from(value: ProbeTypeArg) -> Self {
        match value {
            ProbeTypeArg::Quick => rodent_domain::ProbeType::Quick,
            ProbeTypeArg::Extensive => rodent_domain::ProbeType::Extensive,
        }
    }
}
