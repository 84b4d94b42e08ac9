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

//! Event dispatch.
//!
//! Maps every [`DebugEvent`] to an [`EventAction`] telling the control loop what to do
//! next. While recording, handlers capture a snapshot per suspension and immediately
//! re-arm a step request, so the debuggee is driven to completion without operator
//! involvement. Interactively, breakpoint hits, completed steps and watched method
//! entries suspend the loop until the operator resumes it.

use std::sync::Arc;

use chrono::Utc;
use rdb_common::{
    types::{
        BreakpointKind, BreakpointLocation, CodeLocation, DebugEvent, RequestId, Snapshot,
        SourceLocation, StepDepth, StepRequest, ThreadId,
    },
    ProgressMessage,
};
use tracing::{debug, info, warn};

use crate::{
    breakpoints::release, ControlInterface, DebuggerResult, DebuggerState, ExecutionContext,
    Mode, SnapshotRecorder,
};

/// What the control loop does after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    /// Keep the debuggee running.
    Continue,
    /// Keep the debuggee suspended until the operator resumes it.
    WaitForCommand,
    /// End the session.
    Stop,
    /// The recording is complete; hand over to replay navigation.
    EnterReplay,
}

/// Result of dispatching one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventOutcome {
    /// Next action of the control loop
    pub action: EventAction,
    /// Text for the operator
    pub message: Option<String>,
    /// Recording progress notice
    pub progress: Option<ProgressMessage>,
}

impl EventOutcome {
    fn new(action: EventAction) -> Self {
        Self { action, message: None, progress: None }
    }

    /// Resume silently.
    pub fn proceed() -> Self {
        Self::new(EventAction::Continue)
    }

    /// Suspend and tell the operator why.
    pub fn wait(message: impl Into<String>) -> Self {
        Self::new(EventAction::WaitForCommand).with_message(message)
    }

    /// Attaches an operator message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Whether the loop must keep the debuggee suspended.
    pub fn waits(&self) -> bool {
        self.action == EventAction::WaitForCommand
    }
}

/// Event handlers of a session.
#[derive(Debug, Default)]
pub struct EventDispatcher {
    /// Method-entry request watching for the entry routine while recording
    entry_request: Option<RequestId>,
    /// Whether the initial instrumentation was armed
    instrumented: bool,
}

impl EventDispatcher {
    /// Creates a dispatcher for a fresh session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles a single event.
    ///
    /// Only control-interface failures are returned as errors; the caller treats those
    /// that mean the debuggee is gone as a disconnect.
    pub fn dispatch(
        &mut self,
        event: &DebugEvent,
        state: &mut DebuggerState,
        control: &mut dyn ControlInterface,
    ) -> DebuggerResult<EventOutcome> {
        debug!(kind = event.kind(), mode = %state.mode, "Dispatching event");
        match (event, state.mode) {
            (DebugEvent::Disconnected, Mode::Recording) => Ok(self.finish_recording(state)),
            (DebugEvent::Disconnected, _) => {
                state.context = None;
                state.active_step = None;
                state.breakpoints.detach_requests();
                info!("Debuggee terminated");
                Ok(EventOutcome::new(EventAction::Stop).with_message("=== Program terminated ==="))
            }
            // Nothing is attached during replay; late events are stale.
            (_, Mode::Replay) => Ok(EventOutcome::proceed()),
            (DebugEvent::ClassLoaded { class_name }, Mode::Recording) => {
                self.instrument_recording(class_name, state, control)
            }
            (DebugEvent::ClassLoaded { class_name }, Mode::Live) => {
                Ok(self.instrument_live(class_name, state, control))
            }
            (
                DebugEvent::BreakpointHit { thread, .. } | DebugEvent::StepCompleted { thread, .. },
                Mode::Recording,
            ) => self.record_step(*thread, state, control),
            (DebugEvent::MethodEntered { thread, location, request }, Mode::Recording) => {
                self.enter_recording(*thread, location, *request, state, control)
            }
            (DebugEvent::BreakpointHit { thread, location, request }, Mode::Live) => {
                Self::breakpoint_hit(*thread, location, *request, state, control)
            }
            (DebugEvent::StepCompleted { thread, location, .. }, Mode::Live) => {
                state.active_step = None;
                if !suspend(*thread, location, state, control)? {
                    return Ok(EventOutcome::new(EventAction::WaitForCommand));
                }
                Ok(EventOutcome::wait(format!("Stepped to: {location}")))
            }
            (DebugEvent::MethodEntered { thread, location, .. }, Mode::Live) => {
                if !state.breakpoints.has_method_breakpoint(&location.method_name) {
                    return Ok(EventOutcome::proceed());
                }
                if !suspend(*thread, location, state, control)? {
                    return Ok(EventOutcome::new(EventAction::WaitForCommand));
                }
                Ok(EventOutcome::wait(format!(
                    "=== Method entry: {}() ===\nClass: {}\nLocation: {}:{}",
                    location.method_name, location.class_name, location.source_file, location.line
                )))
            }
        }
    }

    fn instrument_recording(
        &mut self,
        class_name: &str,
        state: &DebuggerState,
        control: &mut dyn ControlInterface,
    ) -> DebuggerResult<EventOutcome> {
        if self.instrumented {
            return Ok(EventOutcome::proceed());
        }
        let filter = state.config.entry_class.as_deref().unwrap_or(class_name);
        self.entry_request = Some(control.arm_method_entry(Some(filter))?);
        self.instrumented = true;
        info!(class = filter, method = %state.config.entry_method, "Watching for entry routine");
        Ok(EventOutcome::proceed().with_message(format!("Class loaded: {class_name}")))
    }

    fn instrument_live(
        &mut self,
        class_name: &str,
        state: &mut DebuggerState,
        control: &mut dyn ControlInterface,
    ) -> EventOutcome {
        if self.instrumented {
            return EventOutcome::proceed();
        }
        self.instrumented = true;

        let mut message = format!("Class loaded: {class_name}");
        for raw in state.config.initial_breakpoints.clone() {
            match arm_initial_breakpoint(&raw, state, &mut *control) {
                Ok(location) => message.push_str(&format!("\nBreakpoint set at {location}")),
                Err(e) => {
                    warn!(%raw, "Initial breakpoint not set: {e}");
                    message.push_str(&format!("\nCould not set breakpoint {raw}: {e}"));
                }
            }
        }

        if state.config.stop_on_entry {
            let entry = state.config.entry_method.clone();
            if let Err(e) = state.breakpoints.add_method_breakpoint(&entry, Some(control)) {
                warn!(%entry, "Entry breakpoint not set: {e}");
            }
        }
        EventOutcome::proceed().with_message(message)
    }

    fn enter_recording(
        &mut self,
        thread: ThreadId,
        location: &CodeLocation,
        request: RequestId,
        state: &mut DebuggerState,
        control: &mut dyn ControlInterface,
    ) -> DebuggerResult<EventOutcome> {
        if self.entry_request != Some(request) || location.method_name != state.config.entry_method
        {
            return Ok(EventOutcome::proceed());
        }
        if let Some(entry) = self.entry_request.take() {
            release(control, entry);
        }
        info!(%location, "Entry routine reached, recording");
        let mut outcome = self.record_step(thread, state, control)?;
        outcome.message = Some(format!(
            "Starting auto-recording from {}() entry...",
            state.config.entry_method
        ));
        Ok(outcome)
    }

    fn record_step(
        &mut self,
        thread: ThreadId,
        state: &mut DebuggerState,
        control: &mut dyn ControlInterface,
    ) -> DebuggerResult<EventOutcome> {
        let seq = state.history.next_seq();
        let limits = state.config.capture_limits();
        match SnapshotRecorder::new(&mut *control, limits).capture(thread, seq, String::new()) {
            Ok(mut snapshot) => {
                snapshot.output = state.output.take();
                state.history.add(snapshot)?;
            }
            Err(e) if e.is_disconnect() => return Err(e),
            Err(e) => warn!(seq, "Step not recorded: {e}"),
        }

        let request = StepRequest {
            thread,
            depth: StepDepth::Into,
            exclusions: state.config.step_exclusions.clone(),
        };
        state.active_step = Some(control.arm_step(request)?);

        let recorded = state.history.len();
        let interval = state.config.progress_interval.max(1);
        let mut outcome = EventOutcome::proceed();
        if recorded > 0 && recorded % interval == 0 {
            outcome.progress = Some(ProgressMessage::with_count("Recording execution", recorded));
        }
        Ok(outcome)
    }

    fn finish_recording(&mut self, state: &mut DebuggerState) -> EventOutcome {
        state.history.complete_recording();
        state.mode = Mode::Replay;
        state.context = None;
        state.active_step = None;
        state.breakpoints.detach_requests();
        self.entry_request = None;

        let total = state.history.len();
        info!(steps = total, "Recording complete, entering replay");
        let mut message = format!(
            "=== Program terminated ===\n\n=== RECORDING COMPLETE ===\n\
             Total steps recorded: {total}\n"
        );
        match state.history.current() {
            Some(first) => {
                message.push_str(
                    "Replay mode: navigate with step, step-over, step-back, continue, back, \
                     forward and goto <n>. Type 'help' for all commands.\n\n",
                );
                message.push_str(&first.detailed());
            }
            None => {
                message.push_str("Nothing was recorded; the entry routine was never reached.\n")
            }
        }
        EventOutcome::new(EventAction::EnterReplay).with_message(message)
    }

    fn breakpoint_hit(
        thread: ThreadId,
        location: &CodeLocation,
        request: RequestId,
        state: &mut DebuggerState,
        control: &mut dyn ControlInterface,
    ) -> DebuggerResult<EventOutcome> {
        let key = state
            .breakpoints
            .key_for_request(request)
            .or_else(|| state.breakpoints.lookup_key(&location.source_file, location.line));
        let Some(hit) = key.and_then(|key| state.breakpoints.hit(&key)) else {
            debug!(%request, "Stale breakpoint request, ignoring");
            return Ok(EventOutcome::proceed());
        };
        if !hit.stopped {
            debug!(key = %hit.key, hits = hit.hit_count, "Breakpoint condition not met");
            return Ok(EventOutcome::proceed());
        }
        if let Some(request) = hit.removed.as_ref().and_then(|bp| bp.request) {
            release(control, request);
        }
        if let Some(step) = state.active_step.take() {
            release(control, step);
        }

        if !suspend(thread, location, state, control)? {
            return Ok(EventOutcome::new(EventAction::WaitForCommand));
        }
        let mut message = format!("=== Breakpoint hit ===\n{location} (hit {})", hit.hit_count);
        if hit.removed.is_some() {
            message.push_str("\nOne-time breakpoint removed");
        }
        Ok(EventOutcome::wait(message))
    }
}

fn arm_initial_breakpoint(
    raw: &str,
    state: &mut DebuggerState,
    control: &mut dyn ControlInterface,
) -> eyre::Result<String> {
    let location = raw.parse::<BreakpointLocation>()?;
    let bp = state.breakpoints.create(
        &location.file,
        location.line,
        BreakpointKind::Normal,
        Some(control),
    )?;
    Ok(bp.location.to_string())
}

/// Records where the live debuggee stopped so inspection commands can read it.
///
/// Returns `false` without capturing when an earlier event of the same batch already
/// suspended `thread`.
fn suspend(
    thread: ThreadId,
    location: &CodeLocation,
    state: &mut DebuggerState,
    control: &mut dyn ControlInterface,
) -> DebuggerResult<bool> {
    if state.context.as_ref().is_some_and(|ctx| ctx.thread == thread) {
        debug!(%location, "Thread already suspended in this batch");
        return Ok(false);
    }
    let seq = state.stops;
    let limits = state.config.capture_limits();
    let captured = SnapshotRecorder::new(control, limits).capture(thread, seq, String::new());
    let snapshot = match captured {
        Ok(snapshot) => snapshot,
        Err(e) if e.is_disconnect() => return Err(e),
        Err(e) => {
            warn!(%location, "Could not capture suspended thread: {e}");
            Snapshot {
                seq,
                location: SourceLocation::new(&location.source_file, location.line),
                class_name: location.class_name.clone(),
                method_name: location.method_name.clone(),
                frames: Vec::new(),
                output: String::new(),
                captured_at: Utc::now(),
            }
        }
    };
    state.stops += 1;
    state.context = Some(ExecutionContext { thread, snapshot: Arc::new(snapshot) });
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeControl;
    use crate::EngineConfig;
    use rdb_common::types::{Binding, FrameInfo, RemoteValue};

    fn location(line: u32) -> CodeLocation {
        CodeLocation::new("Main", "main", "Main.java", line)
    }

    fn frames_at(line: u32) -> Vec<FrameInfo> {
        vec![FrameInfo {
            location: location(line),
            this_object: None,
            bindings: vec![Binding {
                name: "x".into(),
                type_name: "int".into(),
                value: RemoteValue::primitive("int", line),
                is_argument: false,
            }],
        }]
    }

    fn step_event(line: u32) -> DebugEvent {
        DebugEvent::StepCompleted {
            thread: ThreadId(1),
            location: location(line),
            request: RequestId(99),
        }
    }

    #[test]
    fn test_recording_lifecycle() {
        let mut state = DebuggerState::new(Mode::Recording, EngineConfig::default());
        let mut control = FakeControl::default();
        let mut dispatcher = EventDispatcher::new();

        let loaded = DebugEvent::ClassLoaded { class_name: "Main".into() };
        let outcome = dispatcher.dispatch(&loaded, &mut state, &mut control).unwrap();
        assert_eq!(outcome.action, EventAction::Continue);
        assert_eq!(control.method_entries, 1);

        control.frames = frames_at(3);
        let entry = DebugEvent::MethodEntered {
            thread: ThreadId(1),
            location: location(3),
            request: RequestId(1),
        };
        let outcome = dispatcher.dispatch(&entry, &mut state, &mut control).unwrap();
        assert_eq!(outcome.action, EventAction::Continue);
        assert!(outcome.message.unwrap().contains("Starting auto-recording from main()"));
        assert_eq!(control.disarmed, vec![RequestId(1)]);
        assert_eq!(state.history.len(), 1);

        for line in 4..6 {
            control.frames = frames_at(line);
            state.output.append("tick\n");
            let outcome = dispatcher.dispatch(&step_event(line), &mut state, &mut control).unwrap();
            assert_eq!(outcome.action, EventAction::Continue);
        }
        assert_eq!(state.history.len(), 3);
        assert_eq!(control.steps.len(), 3);
        assert!(control.steps.iter().all(|s| s.depth == StepDepth::Into));
        assert_eq!(state.history.get(2).unwrap().output, "tick\n");

        let outcome =
            dispatcher.dispatch(&DebugEvent::Disconnected, &mut state, &mut control).unwrap();
        assert_eq!(outcome.action, EventAction::EnterReplay);
        let message = outcome.message.unwrap();
        assert!(message.contains("=== RECORDING COMPLETE ==="));
        assert!(message.contains("Total steps recorded: 3"));
        assert!(state.is_replay());
        assert!(state.history.is_recording_complete());
        assert_eq!(state.history.cursor(), Some(0));
    }

    #[test]
    fn test_recording_progress_notice() {
        let config = EngineConfig::default().with_progress_interval(2);
        let mut state = DebuggerState::new(Mode::Recording, config);
        let mut control = FakeControl::default();
        let mut dispatcher = EventDispatcher::new();
        control.frames = frames_at(1);

        let first = dispatcher.dispatch(&step_event(1), &mut state, &mut control).unwrap();
        assert!(first.progress.is_none());
        let second = dispatcher.dispatch(&step_event(1), &mut state, &mut control).unwrap();
        assert_eq!(second.progress.unwrap().count, Some(2));
    }

    #[test]
    fn test_recording_skips_unreadable_step() {
        let mut state = DebuggerState::new(Mode::Recording, EngineConfig::default());
        let mut control = FakeControl::default();
        let mut dispatcher = EventDispatcher::new();

        // No frames: the capture fails but recording carries on.
        let outcome = dispatcher.dispatch(&step_event(1), &mut state, &mut control).unwrap();
        assert_eq!(outcome.action, EventAction::Continue);
        assert!(state.history.is_empty());
        assert_eq!(control.steps.len(), 1);

        control.exited = true;
        let err = dispatcher.dispatch(&step_event(2), &mut state, &mut control).unwrap_err();
        assert!(err.is_disconnect());
    }

    #[test]
    fn test_live_breakpoint_conditions() {
        let mut state = DebuggerState::new(Mode::Live, EngineConfig::default());
        let mut control = FakeControl::with_lines("Main.java", &[5, 6]);
        let mut dispatcher = EventDispatcher::new();
        control.frames = frames_at(5);

        let request = state
            .breakpoints
            .create("Main", 5, BreakpointKind::OnCount(2), Some(&mut control))
            .unwrap()
            .request
            .unwrap();
        let hit = DebugEvent::BreakpointHit { thread: ThreadId(1), location: location(5), request };

        let first = dispatcher.dispatch(&hit, &mut state, &mut control).unwrap();
        assert_eq!(first.action, EventAction::Continue);
        assert!(state.context.is_none());

        let second = dispatcher.dispatch(&hit, &mut state, &mut control).unwrap();
        assert!(second.waits());
        assert!(second.message.unwrap().starts_with("=== Breakpoint hit ==="));
        assert_eq!(state.context.as_ref().unwrap().snapshot.location.line, 5);
    }

    #[test]
    fn test_live_once_breakpoint_is_released() {
        let mut state = DebuggerState::new(Mode::Live, EngineConfig::default());
        let mut control = FakeControl::with_lines("Main.java", &[6]);
        let mut dispatcher = EventDispatcher::new();
        control.frames = frames_at(6);

        let request = state
            .breakpoints
            .create("Main.java", 6, BreakpointKind::Once, Some(&mut control))
            .unwrap()
            .request
            .unwrap();
        let hit = DebugEvent::BreakpointHit { thread: ThreadId(1), location: location(6), request };
        let outcome = dispatcher.dispatch(&hit, &mut state, &mut control).unwrap();
        assert!(outcome.waits());
        assert!(outcome.message.unwrap().contains("One-time breakpoint removed"));
        assert!(state.breakpoints.is_empty());
        assert!(control.disarmed.contains(&request));
    }

    #[test]
    fn test_live_class_load_arms_initial_instrumentation() {
        let config = EngineConfig::default()
            .with_initial_breakpoint("Main.java:5")
            .with_initial_breakpoint("Main.java:7");
        let mut state = DebuggerState::new(Mode::Live, config);
        let mut control = FakeControl::with_lines("Main.java", &[5]);
        let mut dispatcher = EventDispatcher::new();

        let loaded = DebugEvent::ClassLoaded { class_name: "Main".into() };
        let outcome = dispatcher.dispatch(&loaded, &mut state, &mut control).unwrap();
        let message = outcome.message.unwrap();
        assert!(message.contains("Breakpoint set at Main.java:5"));
        assert!(message.contains("Could not set breakpoint Main.java:7"));
        assert!(state.breakpoints.has_method_breakpoint("main"));
        assert_eq!(control.method_entries, 1);

        control.frames = frames_at(3);
        let entry = DebugEvent::MethodEntered {
            thread: ThreadId(1),
            location: location(3),
            request: RequestId(2),
        };
        let outcome = dispatcher.dispatch(&entry, &mut state, &mut control).unwrap();
        assert!(outcome.waits());
        assert!(outcome.message.unwrap().starts_with("=== Method entry: main() ==="));
    }

    #[test]
    fn test_live_batch_suspends_once() {
        let mut state = DebuggerState::new(Mode::Live, EngineConfig::default());
        let mut control = FakeControl::with_lines("Main.java", &[5]);
        let mut dispatcher = EventDispatcher::new();
        control.frames = frames_at(5);

        let request = state
            .breakpoints
            .create("Main.java", 5, BreakpointKind::Normal, Some(&mut control))
            .unwrap()
            .request
            .unwrap();
        state.active_step = Some(RequestId(7));
        let hit = DebugEvent::BreakpointHit { thread: ThreadId(1), location: location(5), request };

        let first = dispatcher.dispatch(&hit, &mut state, &mut control).unwrap();
        assert!(first.waits());
        assert!(first.message.unwrap().starts_with("=== Breakpoint hit ==="));

        let second = dispatcher.dispatch(&step_event(5), &mut state, &mut control).unwrap();
        assert!(second.waits());
        assert!(second.message.is_none());
        assert!(state.active_step.is_none());
        assert_eq!(state.stops, 1);
        assert_eq!(state.context.as_ref().unwrap().snapshot.seq, 0);
    }

    #[test]
    fn test_live_step_and_disconnect() {
        let mut state = DebuggerState::new(Mode::Live, EngineConfig::default());
        let mut control = FakeControl::default();
        let mut dispatcher = EventDispatcher::new();
        control.frames = frames_at(4);
        state.active_step = Some(RequestId(7));

        let outcome = dispatcher.dispatch(&step_event(4), &mut state, &mut control).unwrap();
        assert!(outcome.waits());
        assert!(state.active_step.is_none());
        assert_eq!(state.stops, 1);

        let outcome =
            dispatcher.dispatch(&DebugEvent::Disconnected, &mut state, &mut control).unwrap();
        assert_eq!(outcome.action, EventAction::Stop);
        assert!(state.context.is_none());
    }
}
