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

//! Inspection commands.
//!
//! These read the current position view (see [`DebuggerState::current_view`]), so
//! they behave identically on a suspended live debuggee and on a replay cursor.

use itertools::Itertools;
use rdb_common::types::{StackFrameSnapshot, VariableSnapshot};

use crate::{
    command::current_view, Command, CommandPayload, CommandResult, ControlInterface,
    DebuggerError, DebuggerResult, DebuggerState,
};

fn top_frame(state: &DebuggerState) -> DebuggerResult<StackFrameSnapshot> {
    current_view(state)?
        .top_frame()
        .cloned()
        .ok_or_else(|| DebuggerError::illegal_state("No frame available at the current position."))
}

fn variables_result(
    title: &str,
    variables: Vec<VariableSnapshot>,
    empty: &str,
) -> CommandResult {
    let body = if variables.is_empty() {
        format!("  {empty}\n")
    } else {
        variables.iter().map(|v| v.render_tree(2)).join("")
    };
    CommandResult::with_payload(format!("{title}:\n{body}"), CommandPayload::Variables(variables))
}

/// `frame`: detailed view of the current position.
#[derive(Debug, Default)]
pub struct FrameCommand;

impl Command for FrameCommand {
    fn name(&self) -> &'static str {
        "frame"
    }

    fn run(
        &self,
        state: &mut DebuggerState,
        _control: &mut dyn ControlInterface,
    ) -> DebuggerResult<CommandResult> {
        let snapshot = current_view(state)?;
        Ok(CommandResult::with_payload(snapshot.detailed(), CommandPayload::Snapshot(snapshot)))
    }
}

/// `stack`: the call stack.
#[derive(Debug, Default)]
pub struct StackCommand;

impl Command for StackCommand {
    fn name(&self) -> &'static str {
        "stack"
    }

    fn run(
        &self,
        state: &mut DebuggerState,
        _control: &mut dyn ControlInterface,
    ) -> DebuggerResult<CommandResult> {
        let snapshot = current_view(state)?;
        let lines = snapshot.frames.iter().map(|f| format!("  {f}")).join("\n");
        Ok(CommandResult::with_payload(
            format!("Call stack ({} frames):\n{lines}", snapshot.depth()),
            CommandPayload::Frames(snapshot.frames.clone()),
        ))
    }
}

/// `temporaries`: local variables of the current frame that are not arguments.
#[derive(Debug, Default)]
pub struct TemporariesCommand;

impl Command for TemporariesCommand {
    fn name(&self) -> &'static str {
        "temporaries"
    }

    fn run(
        &self,
        state: &mut DebuggerState,
        _control: &mut dyn ControlInterface,
    ) -> DebuggerResult<CommandResult> {
        let frame = top_frame(state)?;
        let temporaries = frame.temporaries().cloned().collect();
        Ok(variables_result("Temporaries", temporaries, "(none)"))
    }
}

/// `arguments`: arguments of the current method.
#[derive(Debug, Default)]
pub struct ArgumentsCommand;

impl Command for ArgumentsCommand {
    fn name(&self) -> &'static str {
        "arguments"
    }

    fn run(
        &self,
        state: &mut DebuggerState,
        _control: &mut dyn ControlInterface,
    ) -> DebuggerResult<CommandResult> {
        let frame = top_frame(state)?;
        let arguments = frame.arguments().cloned().collect();
        Ok(variables_result(
            &format!("Arguments of {}()", frame.method_name),
            arguments,
            "(no arguments)",
        ))
    }
}

/// `receiver`: the object executing the current method.
#[derive(Debug, Default)]
pub struct ReceiverCommand;

impl Command for ReceiverCommand {
    fn name(&self) -> &'static str {
        "receiver"
    }

    fn run(
        &self,
        state: &mut DebuggerState,
        _control: &mut dyn ControlInterface,
    ) -> DebuggerResult<CommandResult> {
        let frame = top_frame(state)?;
        Ok(match frame.receiver {
            Some(receiver) => CommandResult::with_payload(
                format!("Receiver: {} ({})", receiver.value, receiver.type_name),
                CommandPayload::Variable(receiver),
            ),
            None => CommandResult::ok("Receiver: static context"),
        })
    }
}

/// `receiver-variables`: instance variables of the receiver.
#[derive(Debug, Default)]
pub struct ReceiverVariablesCommand;

impl Command for ReceiverVariablesCommand {
    fn name(&self) -> &'static str {
        "receiver-variables"
    }

    fn run(
        &self,
        state: &mut DebuggerState,
        _control: &mut dyn ControlInterface,
    ) -> DebuggerResult<CommandResult> {
        let frame = top_frame(state)?;
        let Some(receiver) = frame.receiver else {
            return Err(DebuggerError::illegal_state("No receiver in static context."));
        };
        let title = format!("Instance variables of {}", receiver.value);
        Ok(variables_result(&title, receiver.children, "(no fields)"))
    }
}

/// `sender`: the calling frame.
#[derive(Debug, Default)]
pub struct SenderCommand;

impl Command for SenderCommand {
    fn name(&self) -> &'static str {
        "sender"
    }

    fn run(
        &self,
        state: &mut DebuggerState,
        _control: &mut dyn ControlInterface,
    ) -> DebuggerResult<CommandResult> {
        let snapshot = current_view(state)?;
        let Some(sender) = snapshot.frame(1).cloned() else {
            return Err(DebuggerError::not_found("No sender frame (top-level method)."));
        };
        Ok(CommandResult::with_payload(
            format!("Sender: {sender}\nReceiver: {}", sender.receiver_label()),
            CommandPayload::Frame(sender),
        ))
    }
}

/// `method`: the method executing at the current position.
#[derive(Debug, Default)]
pub struct MethodCommand;

impl Command for MethodCommand {
    fn name(&self) -> &'static str {
        "method"
    }

    fn run(
        &self,
        state: &mut DebuggerState,
        _control: &mut dyn ControlInterface,
    ) -> DebuggerResult<CommandResult> {
        let frame = top_frame(state)?;
        let signature = frame
            .arguments()
            .map(|a| format!("{} {}", a.type_name, a.name))
            .join(", ");
        let message = format!(
            "Method: {}.{}({signature})\nLocation: {}:{}",
            frame.class_name, frame.method_name, frame.file, frame.line
        );
        Ok(CommandResult::with_payload(message, CommandPayload::Frame(frame)))
    }
}

/// `print-var <name>`: a variable of the current frame, or a field of its receiver.
#[derive(Debug)]
pub struct PrintVarCommand {
    /// Variable to print
    pub name: String,
}

impl Command for PrintVarCommand {
    fn name(&self) -> &'static str {
        "print-var"
    }

    fn run(
        &self,
        state: &mut DebuggerState,
        _control: &mut dyn ControlInterface,
    ) -> DebuggerResult<CommandResult> {
        let frame = top_frame(state)?;
        let variable = frame.find_variable(&self.name).cloned().ok_or_else(|| {
            DebuggerError::not_found(format!("Variable '{}' not found in current frame", self.name))
        })?;
        Ok(CommandResult::with_payload(
            variable.render_tree(0).trim_end().to_string(),
            CommandPayload::Variable(variable),
        ))
    }
}

/// `output`: debuggee output produced up to the current position.
#[derive(Debug, Default)]
pub struct OutputCommand;

impl Command for OutputCommand {
    fn name(&self) -> &'static str {
        "output"
    }

    fn run(
        &self,
        state: &mut DebuggerState,
        _control: &mut dyn ControlInterface,
    ) -> DebuggerResult<CommandResult> {
        let output = state.visible_output();
        if output.is_empty() {
            return Ok(CommandResult::ok("(no output)"));
        }
        Ok(CommandResult::ok(output.trim_end().to_string()))
    }
}
