// RDB - Replay Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! RDB - Replay Debugger
//!
//! Records the execution of a program line by line, then lets the operator move
//! forwards and backwards through the recording.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use eyre::{Result, WrapErr};
use rdb_common::logging;
use rdb_engine::{sim::Program, EngineConfig, SessionMode};
use tracing::Level;

mod input;
mod presenter;
mod run;

/// Command-line interface for RDB
#[derive(Debug, Parser)]
#[command(name = "rdb")]
#[command(about = "Replay Debugger - record a program, then step through it in both directions")]
#[command(version)]
pub struct Cli {
    /// Engine configuration file (default: ~/.rdb.toml)
    #[arg(long, env = "RDB_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// How results are written to stdout
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Only log to stderr, without the rolling log file
    #[arg(long, global = true)]
    pub no_file_log: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable console output
    Text,
    /// One JSON object per line
    Json,
}

/// Options shared by every subcommand
#[derive(Debug, Clone, clap::Args)]
pub struct TargetArgs {
    /// Program to debug, as a TOML file (default: the built-in demo)
    #[arg(long)]
    pub program: Option<PathBuf>,

    /// Entry routine the program starts from, and recording with it
    #[arg(long)]
    pub entry_method: Option<String>,

    /// Class declaring the entry routine
    #[arg(long)]
    pub entry_class: Option<String>,

    /// Maximum depth of captured variable trees
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Maximum number of children captured per variable
    #[arg(long)]
    pub max_width: Option<usize>,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Debug a program interactively, stopping at breakpoints
    Run {
        /// Target options
        #[command(flatten)]
        target: TargetArgs,

        /// Breakpoint armed before the program starts (repeatable)
        #[arg(long = "break", value_name = "FILE:LINE")]
        breakpoints: Vec<String>,

        /// Do not stop when the entry routine is entered
        #[arg(long)]
        no_stop_on_entry: bool,
    },
    /// Record every executed line of a program, then replay the recording
    Record {
        /// Target options
        #[command(flatten)]
        target: TargetArgs,
    },
}

impl Cli {
    /// Builds the engine configuration: file values first, then command-line overrides.
    fn engine_config(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::load(path)?,
            None => EngineConfig::load_default()?,
        };

        let target = match &self.command {
            Commands::Run { target, breakpoints, no_stop_on_entry } => {
                config.initial_breakpoints.extend(breakpoints.iter().cloned());
                if *no_stop_on_entry {
                    config.stop_on_entry = false;
                }
                target
            }
            Commands::Record { target } => target,
        };
        if let Some(depth) = target.max_depth {
            config.max_variable_depth = depth;
        }
        if let Some(width) = target.max_width {
            config.max_variable_width = width;
        }
        Ok(config)
    }

    fn target(&self) -> &TargetArgs {
        match &self.command {
            Commands::Run { target, .. } | Commands::Record { target } => target,
        }
    }

    fn session_mode(&self) -> SessionMode {
        match self.command {
            Commands::Run { .. } => SessionMode::Interactive,
            Commands::Record { .. } => SessionMode::Record,
        }
    }
}

fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Keep the guard alive so buffered log lines reach the file
    let _log_guard = logging::init_logging("rdb", !cli.no_file_log, Level::WARN)?;

    let config = cli.engine_config()?;
    let mut program = match &cli.target().program {
        Some(path) => Program::load(path)?,
        None => Program::demo().wrap_err("Built-in demo program is invalid")?,
    };
    if let Some(method) = &cli.target().entry_method {
        program.entry_method = method.clone();
    }
    if let Some(class) = &cli.target().entry_class {
        program.entry_class = class.clone();
    }
    // Recording starts where the program starts.
    let config = EngineConfig {
        entry_method: program.entry_method.clone(),
        entry_class: Some(program.entry_class.clone()),
        ..config
    };
    tracing::info!(entry = %program.entry_class, mode = ?cli.session_mode(), "Starting RDB");

    run::run_session(program, config, cli.session_mode(), cli.format)
}
