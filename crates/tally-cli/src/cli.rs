use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tally_core::models::RunnerStatus;
use tally_core::resolution::Choice;
use tally_core::RaceId;

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Record checkpoint sightings and reconcile them at the base station")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage races
    Race {
        #[command(subcommand)]
        command: RaceCommands,
    },
    /// Record or correct a runner's sighting at a checkpoint
    Record {
        #[command(flatten)]
        at: CheckpointArgs,
        /// Runner number
        runner: u32,
        /// Runner status
        #[arg(short, long, default_value = "passed")]
        status: RunnerStatus,
        /// Mark-off time (RFC 3339 or `YYYY-MM-DD HH:MM`, UTC); defaults to now for passed runners
        #[arg(long, value_name = "TIME")]
        time: Option<String>,
        /// Free-form note
        #[arg(long)]
        notes: Option<String>,
    },
    /// Remove a runner's sighting
    #[command(alias = "rm")]
    Remove {
        #[command(flatten)]
        at: CheckpointArgs,
        /// Runner number
        runner: u32,
    },
    /// List a checkpoint's sightings
    List {
        #[command(flatten)]
        at: CheckpointArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show passed runners grouped into time segments
    Segments {
        #[command(flatten)]
        at: CheckpointArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark every runner of a segment as called in
    CallIn {
        #[command(flatten)]
        at: CheckpointArgs,
        /// Segment label as shown by `tally segments`
        label: String,
    },
    /// Export checkpoint results, or consolidated race results without --checkpoint
    Export {
        /// Race id
        #[arg(short, long)]
        race: RaceId,
        /// Checkpoint number
        #[arg(short, long)]
        checkpoint: Option<u32>,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Import an export package at the base station
    Import {
        /// Package file
        file: PathBuf,
        /// Race the package is expected to belong to
        #[arg(short, long)]
        race: RaceId,
        /// Resolve every conflict with this choice instead of prompting
        #[arg(long, value_enum)]
        prefer: Option<PreferArg>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the runner by checkpoint matrix of imported results
    Matrix {
        /// Race id
        #[arg(short, long)]
        race: RaceId,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the raw records of one imported checkpoint
    Drilldown {
        #[command(flatten)]
        at: CheckpointArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show archived values replaced by corrections and resolutions
    Audit {
        /// Race id
        #[arg(short, long)]
        race: RaceId,
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or change engine settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(clap::Args, Clone, Debug)]
pub struct CheckpointArgs {
    /// Race id
    #[arg(short, long)]
    pub race: RaceId,
    /// Checkpoint number
    #[arg(short, long)]
    pub checkpoint: u32,
}

#[derive(Subcommand)]
pub enum RaceCommands {
    /// Register a race
    Add {
        /// Race id (letters, digits, `-` and `_`)
        id: RaceId,
        /// Display name
        name: String,
        /// Start time (RFC 3339 or `YYYY-MM-DD HH:MM`, UTC); segments are anchored here
        #[arg(long, value_name = "TIME")]
        start: String,
    },
    /// List races
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum SettingsCommands {
    /// Show current settings
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update settings
    Set {
        /// Segment width in minutes
        #[arg(long, value_name = "MINUTES")]
        bucket_width: Option<u32>,
        /// Comma-separated fields compared on import (status, mark-off-time, call-in-time, notes, called-in)
        #[arg(long, value_name = "FIELDS")]
        comparable_fields: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum PreferArg {
    Existing,
    Incoming,
}

impl From<PreferArg> for Choice {
    fn from(value: PreferArg) -> Self {
        match value {
            PreferArg::Existing => Self::Existing,
            PreferArg::Incoming => Self::Incoming,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
