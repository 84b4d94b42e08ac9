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

//! Operator commands.
//!
//! A [`Command`] is a single operation against the [`DebuggerState`] producing a
//! [`CommandResult`]. Commands never fail with an error: whatever goes wrong is folded
//! into an unsuccessful result so every front end can present failures the same way.
//!
//! Commands are grouped by concern:
//! - [`navigation`] - stepping, continuing and history movement
//! - [`inspection`] - frames, variables and debuggee output at the current position
//! - [`breakpoints`] - line and method breakpoint management

use std::{fmt, sync::Arc};

use rdb_common::types::{Breakpoint, Snapshot, StackFrameSnapshot, VariableSnapshot};
use serde::Serialize;
use tracing::debug;

use crate::{ControlInterface, DebuggerError, DebuggerResult, DebuggerState};

pub mod breakpoints;
pub mod inspection;
pub mod interpreter;
pub mod navigation;

pub use interpreter::*;

/// Structured data attached to a command result.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum CommandPayload {
    /// The debuggee must be resumed; the outcome arrives later as an event.
    Resume,
    /// The debuggee was lost while the command ran.
    Disconnected,
    /// The step now under the cursor.
    Snapshot(Arc<Snapshot>),
    /// A single stack frame.
    Frame(StackFrameSnapshot),
    /// A call stack.
    Frames(Vec<StackFrameSnapshot>),
    /// A list of variables.
    Variables(Vec<VariableSnapshot>),
    /// A single variable tree.
    Variable(VariableSnapshot),
    /// Registered breakpoints.
    Breakpoints(Vec<Breakpoint>),
    /// History position.
    History {
        /// Cursor position
        cursor: Option<usize>,
        /// Number of recorded steps
        len: usize,
    },
}

/// Outcome of a command.
#[derive(Debug, Clone, Serialize)]
pub struct CommandResult {
    /// Whether the command succeeded.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
    /// Optional structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<CommandPayload>,
}

impl CommandResult {
    /// A successful result without payload.
    pub fn ok(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into(), payload: None }
    }

    /// A successful result carrying a payload.
    pub fn with_payload(message: impl Into<String>, payload: CommandPayload) -> Self {
        Self { success: true, message: message.into(), payload: Some(payload) }
    }

    /// A failed result.
    pub fn failure(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into(), payload: None }
    }

    /// The failed result representing an error.
    pub fn from_error(error: &DebuggerError) -> Self {
        let result = Self::failure(error.to_string());
        if error.is_disconnect() {
            Self { payload: Some(CommandPayload::Disconnected), ..result }
        } else {
            result
        }
    }

    /// Whether the debuggee was found gone while the command ran.
    pub fn disconnects(&self) -> bool {
        matches!(self.payload, Some(CommandPayload::Disconnected))
    }

    /// Whether the control loop must resume the debuggee.
    pub fn resumes(&self) -> bool {
        matches!(self.payload, Some(CommandPayload::Resume))
    }

    /// The snapshot payload, if any.
    pub fn snapshot(&self) -> Option<&Arc<Snapshot>> {
        match &self.payload {
            Some(CommandPayload::Snapshot(snapshot)) => Some(snapshot),
            _ => None,
        }
    }
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.success {
            write!(f, "{}", self.message)
        } else {
            write!(f, "Error: {}", self.message)
        }
    }
}

/// A single operator operation.
pub trait Command: Send + fmt::Debug {
    /// Name the command was registered under.
    fn name(&self) -> &'static str;

    /// Runs the command. Errors are turned into a failed result by [`Command::execute`].
    fn run(
        &self,
        state: &mut DebuggerState,
        control: &mut dyn ControlInterface,
    ) -> DebuggerResult<CommandResult>;

    /// Runs the command, folding any error into a failed result.
    fn execute(
        &self,
        state: &mut DebuggerState,
        control: &mut dyn ControlInterface,
    ) -> CommandResult {
        self.run(state, control).unwrap_or_else(|e| {
            debug!(command = self.name(), "Command failed: {e}");
            CommandResult::from_error(&e)
        })
    }
}

/// The control interface to use for breakpoint operations: none in replay mode, where
/// breakpoints are logical.
pub(crate) fn live_control<'a>(
    state: &DebuggerState,
    control: &'a mut dyn ControlInterface,
) -> Option<&'a mut dyn ControlInterface> {
    (!state.is_replay()).then_some(control)
}

/// The snapshot inspection commands read from.
pub(crate) fn current_view(state: &DebuggerState) -> DebuggerResult<Arc<Snapshot>> {
    state.current_view().cloned().ok_or_else(|| {
        DebuggerError::illegal_state("No current execution state. The program is running.")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ControlError;

    #[test]
    fn test_result_display() {
        assert_eq!(CommandResult::ok("done").to_string(), "done");
        let unknown = CommandResult::from_error(&DebuggerError::user_input("Unknown command: x"));
        assert_eq!(unknown.to_string(), "Error: Unknown command: x");
        assert!(!unknown.disconnects());
        assert!(CommandResult::with_payload("", CommandPayload::Resume).resumes());
        assert!(!CommandResult::ok("").resumes());
    }

    #[test]
    fn test_lost_debuggee_result() {
        let result = CommandResult::from_error(&ControlError::TargetExited.into());
        assert!(!result.success);
        assert!(result.disconnects());
        assert_eq!(result.to_string(), "Error: control interface error: target process has exited");

        let rejected = ControlError::Rejected("busy".into()).into();
        assert!(!CommandResult::from_error(&rejected).disconnects());
    }
}
