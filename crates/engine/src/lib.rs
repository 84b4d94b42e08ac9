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

//! RDB Engine - Recording and replay core of the debugger
//!
//! The engine attaches to a debuggee through a [`ControlInterface`], records one
//! [`Snapshot`](rdb_common::types::Snapshot) per executed line while the entry routine
//! runs, and then lets the operator move freely through the recorded history. The same
//! command set also drives a live, suspended debuggee.
//!
//! The main pieces are:
//! - [`Session`] - the event-driven control loop
//! - [`EventDispatcher`] - reactions to debuggee events per mode
//! - [`CommandInterpreter`] - operator command parsing and registry
//! - [`ExecutionStrategy`] - live versus replay semantics of navigation commands
//! - [`SnapshotRecorder`] - bounded capture of thread state
//! - [`sim`] - an in-process debuggee

pub mod breakpoints;
pub use breakpoints::*;

pub mod capture;
pub use capture::*;

pub mod command;
pub use command::{
    Command, CommandCategory, CommandFactory, CommandInterpreter, CommandPayload, CommandResult,
    HelpCommand,
};

pub mod config;
pub use config::*;

pub mod control;
pub use control::*;

pub mod dispatch;
pub use dispatch::*;

pub mod error;
pub use error::*;

pub mod history;
pub use history::*;

pub mod present;
pub use present::*;

pub mod session;
pub use session::*;

pub mod sim;

pub mod state;
pub use state::*;

pub mod strategy;
pub use strategy::*;

#[cfg(test)]
mod test_utils;
