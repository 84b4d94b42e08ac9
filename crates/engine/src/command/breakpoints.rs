//! Breakpoint management commands.
//!
//! With a debuggee attached, breakpoints are resolved and armed through the control
//! interface. In replay they are logical and matched against recorded locations.

use itertools::Itertools;
use rdb_common::types::{BreakpointKind, BreakpointLocation};

use crate::{
    command::live_control, Command, CommandPayload, CommandResult, ControlInterface,
    DebuggerResult, DebuggerState,
};

/// `break`, `break-once`, `break-on-count`: creates a breakpoint.
#[derive(Debug)]
pub struct BreakCommand {
    /// Where to stop
    pub location: BreakpointLocation,
    /// Stop condition
    pub kind: BreakpointKind,
}

impl Command for BreakCommand {
    fn name(&self) -> &'static str {
        match self.kind {
            BreakpointKind::Normal => "break",
            BreakpointKind::Once => "break-once",
            BreakpointKind::OnCount(_) => "break-on-count",
        }
    }

    fn run(
        &self,
        state: &mut DebuggerState,
        control: &mut dyn ControlInterface,
    ) -> DebuggerResult<CommandResult> {
        let control = live_control(state, control);
        let logical = control.is_none();
        let bp = state.breakpoints.create(
            &self.location.file,
            self.location.line,
            self.kind,
            control,
        )?;
        let mut message = format!("Breakpoint set at {} [{}]", bp.location, bp.kind);
        if logical {
            message.push_str(" (replay)");
        }
        Ok(CommandResult::with_payload(message, CommandPayload::Breakpoints(vec![bp.clone()])))
    }
}

/// `remove-break <file> <line>`
#[derive(Debug)]
pub struct RemoveBreakCommand {
    /// Breakpoint to remove
    pub location: BreakpointLocation,
}

impl Command for RemoveBreakCommand {
    fn name(&self) -> &'static str {
        "remove-break"
    }

    fn run(
        &self,
        state: &mut DebuggerState,
        control: &mut dyn ControlInterface,
    ) -> DebuggerResult<CommandResult> {
        let location = self.location.normalized(&state.config.source_extension);
        let control = live_control(state, control);
        if state.breakpoints.remove(&self.location.file, self.location.line, control) {
            Ok(CommandResult::ok(format!("Breakpoint removed at {location}")))
        } else {
            Ok(CommandResult::failure(format!("No breakpoint at {location}")))
        }
    }
}

/// `clear-breaks`
#[derive(Debug, Default)]
pub struct ClearBreaksCommand;

impl Command for ClearBreaksCommand {
    fn name(&self) -> &'static str {
        "clear-breaks"
    }

    fn run(
        &self,
        state: &mut DebuggerState,
        control: &mut dyn ControlInterface,
    ) -> DebuggerResult<CommandResult> {
        let control = live_control(state, control);
        let removed = state.breakpoints.clear_all(control);
        Ok(CommandResult::ok(format!("Cleared {removed} breakpoint(s)")))
    }
}

/// `breakpoints`: lists line and method breakpoints.
#[derive(Debug, Default)]
pub struct ListBreakpointsCommand;

impl Command for ListBreakpointsCommand {
    fn name(&self) -> &'static str {
        "breakpoints"
    }

    fn run(
        &self,
        state: &mut DebuggerState,
        _control: &mut dyn ControlInterface,
    ) -> DebuggerResult<CommandResult> {
        let registry = &state.breakpoints;
        if registry.is_empty() {
            return Ok(CommandResult::with_payload(
                "No breakpoints set",
                CommandPayload::Breakpoints(Vec::new()),
            ));
        }

        let mut message = String::from("Breakpoints:\n");
        for (i, bp) in registry.iter().enumerate() {
            message.push_str(&format!("  {}. {bp}\n", i + 1));
        }
        let methods = registry.method_breakpoints().join(", ");
        if !methods.is_empty() {
            message.push_str(&format!("Method entry: {methods}\n"));
        }
        Ok(CommandResult::with_payload(
            message,
            CommandPayload::Breakpoints(registry.iter().cloned().collect()),
        ))
    }
}

/// `break-before-method-call <method>`: stops on entry into a method.
#[derive(Debug)]
pub struct BreakBeforeMethodCommand {
    /// Method name
    pub method: String,
}

impl Command for BreakBeforeMethodCommand {
    fn name(&self) -> &'static str {
        "break-before-method-call"
    }

    fn run(
        &self,
        state: &mut DebuggerState,
        control: &mut dyn ControlInterface,
    ) -> DebuggerResult<CommandResult> {
        let control = live_control(state, control);
        state.breakpoints.add_method_breakpoint(&self.method, control)?;
        Ok(CommandResult::ok(format!("Will stop before calls to {}()", self.method)))
    }
}
