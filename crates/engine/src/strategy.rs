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

//! Execution strategies.
//!
//! The step/step-over/step-back/continue vocabulary has two implementations:
//!
//! - [`LiveStrategy`] arms requests on the control interface and asks the control loop
//!   to resume; the resulting suspension arrives later as an event.
//! - [`ReplayStrategy`] moves the history cursor synchronously.
//!
//! Both return the same [`CommandResult`] contract, so commands and presenters do not
//! care which one is active. [`select_strategy`] picks the applicable one.

use rdb_common::types::{StepDepth, StepRequest, ThreadId};
use tracing::debug;

use crate::{
    breakpoints::release, CommandPayload, CommandResult, ControlInterface, DebuggerError,
    DebuggerResult, DebuggerState, History, Mode,
};

/// Mode-specific implementation of the execution commands.
pub trait ExecutionStrategy: Sync {
    /// Whether the strategy applies to the state.
    fn is_applicable(&self, state: &DebuggerState) -> bool;

    /// Moves to the next line, entering calls.
    fn step(&self, state: &mut DebuggerState, control: &mut dyn ControlInterface)
        -> DebuggerResult<CommandResult>;

    /// Moves to the next line at the same or a shallower stack depth.
    fn step_over(
        &self,
        state: &mut DebuggerState,
        control: &mut dyn ControlInterface,
    ) -> DebuggerResult<CommandResult>;

    /// Moves to the previous line at the same or a shallower stack depth.
    fn step_back(
        &self,
        state: &mut DebuggerState,
        control: &mut dyn ControlInterface,
    ) -> DebuggerResult<CommandResult>;

    /// Runs until the next qualifying breakpoint.
    fn continue_execution(
        &self,
        state: &mut DebuggerState,
        control: &mut dyn ControlInterface,
    ) -> DebuggerResult<CommandResult>;
}

/// Returns the strategy applicable to the state: replay when in replay mode with a
/// non-empty history, live otherwise.
pub fn select_strategy(state: &DebuggerState) -> &'static dyn ExecutionStrategy {
    if ReplayStrategy.is_applicable(state) {
        &ReplayStrategy
    } else {
        &LiveStrategy
    }
}

/// Drives a running debuggee.
#[derive(Debug, Default, Clone, Copy)]
pub struct LiveStrategy;

impl LiveStrategy {
    fn arm_step(
        state: &mut DebuggerState,
        control: &mut dyn ControlInterface,
        depth: StepDepth,
    ) -> DebuggerResult<CommandResult> {
        let thread = Self::suspended_thread(state)?;
        if let Some(previous) = state.active_step.take() {
            release(control, previous);
        }
        let exclusions = state.config.step_exclusions.clone();
        let request = StepRequest { thread, depth, exclusions };
        state.active_step = Some(control.arm_step(request)?);
        debug!(%thread, ?depth, "Step request armed");
        Ok(CommandResult::with_payload("Stepping...", CommandPayload::Resume))
    }

    fn suspended_thread(state: &DebuggerState) -> DebuggerResult<ThreadId> {
        if state.is_recording() {
            return Err(DebuggerError::illegal_state("Recording in progress"));
        }
        state.context.as_ref().map(|c| c.thread).ok_or_else(|| {
            DebuggerError::illegal_state("No suspended thread. The program is running.")
        })
    }
}

impl ExecutionStrategy for LiveStrategy {
    fn is_applicable(&self, state: &DebuggerState) -> bool {
        !ReplayStrategy.is_applicable(state)
    }

    fn step(
        &self,
        state: &mut DebuggerState,
        control: &mut dyn ControlInterface,
    ) -> DebuggerResult<CommandResult> {
        Self::arm_step(state, control, StepDepth::Into)
    }

    fn step_over(
        &self,
        state: &mut DebuggerState,
        control: &mut dyn ControlInterface,
    ) -> DebuggerResult<CommandResult> {
        Self::arm_step(state, control, StepDepth::Over)
    }

    fn step_back(
        &self,
        _state: &mut DebuggerState,
        _control: &mut dyn ControlInterface,
    ) -> DebuggerResult<CommandResult> {
        Err(DebuggerError::illegal_state(
            "Step back is not available in live mode. Record the program to navigate backwards.",
        ))
    }

    fn continue_execution(
        &self,
        state: &mut DebuggerState,
        _control: &mut dyn ControlInterface,
    ) -> DebuggerResult<CommandResult> {
        Self::suspended_thread(state)?;
        Ok(CommandResult::with_payload("Continuing execution...", CommandPayload::Resume))
    }
}

/// Navigates a recorded history.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReplayStrategy;

impl ReplayStrategy {
    fn at_cursor(history: &History, prefix: &str) -> DebuggerResult<CommandResult> {
        let snapshot = history
            .current()
            .cloned()
            .ok_or_else(|| DebuggerError::illegal_state("No current execution state."))?;
        let message = format!("{prefix}{}", snapshot.detailed());
        Ok(CommandResult::with_payload(message, CommandPayload::Snapshot(snapshot)))
    }

    fn current_depth(history: &History) -> DebuggerResult<usize> {
        history
            .current()
            .map(|s| s.depth())
            .ok_or_else(|| DebuggerError::illegal_state("No current execution state."))
    }

    /// Whether the step at `index` is the entry into a method with an entry breakpoint.
    fn enters_watched_method(state: &DebuggerState, index: usize) -> bool {
        let Some(snapshot) = state.history.get(index) else {
            return false;
        };
        if !state.breakpoints.has_method_breakpoint(&snapshot.method_name) {
            return false;
        }
        match index.checked_sub(1).and_then(|prev| state.history.get(prev)) {
            Some(previous) => previous.depth() < snapshot.depth(),
            None => true,
        }
    }
}

impl ExecutionStrategy for ReplayStrategy {
    fn is_applicable(&self, state: &DebuggerState) -> bool {
        state.mode == Mode::Replay && !state.history.is_empty()
    }

    fn step(
        &self,
        state: &mut DebuggerState,
        _control: &mut dyn ControlInterface,
    ) -> DebuggerResult<CommandResult> {
        if !state.history.forward() {
            return Err(DebuggerError::illegal_state("Already at the end of execution history."));
        }
        Self::at_cursor(&state.history, "")
    }

    fn step_over(
        &self,
        state: &mut DebuggerState,
        _control: &mut dyn ControlInterface,
    ) -> DebuggerResult<CommandResult> {
        let history = &mut state.history;
        let origin = Self::current_depth(history)?;
        if !history.has_next() {
            return Err(DebuggerError::illegal_state("Already at the end of execution history."));
        }
        while history.forward() {
            if Self::current_depth(history)? <= origin {
                return Self::at_cursor(history, "");
            }
        }
        Self::at_cursor(history, "Reached end of execution\n")
    }

    fn step_back(
        &self,
        state: &mut DebuggerState,
        _control: &mut dyn ControlInterface,
    ) -> DebuggerResult<CommandResult> {
        let history = &mut state.history;
        let origin = Self::current_depth(history)?;
        if !history.has_previous() {
            return Err(DebuggerError::illegal_state(
                "Already at the beginning of execution history.",
            ));
        }
        while history.back() {
            if Self::current_depth(history)? <= origin {
                return Self::at_cursor(history, "");
            }
        }
        Self::at_cursor(history, "Reached start of execution\n")
    }

    fn continue_execution(
        &self,
        state: &mut DebuggerState,
        control: &mut dyn ControlInterface,
    ) -> DebuggerResult<CommandResult> {
        Self::current_depth(&state.history)?;
        if !state.history.has_next() {
            return Err(DebuggerError::illegal_state("Already at the end of execution history."));
        }

        while state.history.forward() {
            let Some(snapshot) = state.history.current().cloned() else {
                break;
            };
            let index = snapshot.seq;

            let mut stopped = false;
            let mut notes = String::new();
            if let Some(key) =
                state.breakpoints.lookup_key(&snapshot.location.file, snapshot.location.line)
            {
                if let Some(hit) = state.breakpoints.hit(&key) {
                    stopped = hit.stopped;
                    if let Some(removed) = hit.removed {
                        if let Some(request) = removed.request {
                            release(control, request);
                        }
                        notes.push_str("One-time breakpoint removed\n");
                    }
                }
            }
            if Self::enters_watched_method(state, index) {
                stopped = true;
                notes.push_str(&format!("Method entry: {}\n", snapshot.method_name));
            }

            if stopped {
                debug!(step = index, location = %snapshot.location, "Replay stopped at breakpoint");
                let prefix = format!("Hit breakpoint at {}\n{notes}", snapshot.location);
                return Self::at_cursor(&state.history, &prefix);
            }
        }

        Self::at_cursor(&state.history, "Reached end of execution (no breakpoint hit)\n")
    }
}
