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

//! The control loop.
//!
//! A [`Session`] owns the control interface and the debugger state and moves through
//! the [`LoopState`] machine:
//!
//! ```text
//! AwaitingEvent -> Dispatching -> Resumed -----------------> AwaitingEvent
//!                              -> WaitingForUserCommand ---> Resumed
//!                              -> Replaying (recording complete)
//!                              -> Terminated
//! ```
//!
//! Three threads take part: the loop itself, blocking on the control interface or on
//! operator input; the operator-input thread feeding the command channel; and a drain
//! thread copying debuggee stdout into the shared output buffer. Only the loop thread
//! mutates the state.

use std::{
    io::{BufRead, BufReader, Read},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{Receiver, RecvTimeoutError},
        Arc,
    },
    thread::{self, JoinHandle},
};

use eyre::{Result, WrapErr};
use rdb_common::types::DebugEvent;
use tracing::{debug, error, info, warn};

use crate::{
    CommandInterpreter, CommandResult, ControlInterface, DebuggerState, EngineConfig, EventAction,
    EventDispatcher, EventOutcome, Mode, OutputBuffer, ResultPresenter,
};

/// States of the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Blocked on the next event batch.
    AwaitingEvent,
    /// Handling an event batch.
    Dispatching,
    /// The debuggee was resumed.
    Resumed,
    /// The debuggee is suspended until the operator resumes it.
    WaitingForUserCommand,
    /// Navigating a completed recording.
    Replaying,
    /// The session is over.
    Terminated,
}

/// How a session treats the debuggee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Stop at breakpoints and let the operator drive.
    Interactive,
    /// Record every step to completion, then replay.
    Record,
}

/// A debugging session over one debuggee.
pub struct Session<C: ControlInterface> {
    control: C,
    state: DebuggerState,
    dispatcher: EventDispatcher,
    interpreter: CommandInterpreter,
    commands: Receiver<String>,
    cancel: Arc<AtomicBool>,
    loop_state: LoopState,
    drain: Option<JoinHandle<()>>,
}

impl<C: ControlInterface> std::fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("mode", &self.state.mode)
            .field("loop_state", &self.loop_state)
            .finish_non_exhaustive()
    }
}

impl<C: ControlInterface> Session<C> {
    /// Creates a session reading operator commands from `commands`.
    pub fn new(
        control: C,
        config: EngineConfig,
        mode: SessionMode,
        commands: Receiver<String>,
    ) -> Self {
        let mode = match mode {
            SessionMode::Interactive => Mode::Live,
            SessionMode::Record => Mode::Recording,
        };
        Self {
            control,
            state: DebuggerState::new(mode, config),
            dispatcher: EventDispatcher::new(),
            interpreter: CommandInterpreter::new(),
            commands,
            cancel: Arc::new(AtomicBool::new(false)),
            loop_state: LoopState::AwaitingEvent,
            drain: None,
        }
    }

    /// Replaces the command interpreter.
    pub fn with_interpreter(mut self, interpreter: CommandInterpreter) -> Self {
        self.interpreter = interpreter;
        self
    }

    /// Flag that ends the session at the next opportunity when set.
    ///
    /// A recording in progress is not interrupted.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// The debugger state.
    pub fn state(&self) -> &DebuggerState {
        &self.state
    }

    /// Current state of the control loop.
    pub fn loop_state(&self) -> LoopState {
        self.loop_state
    }

    /// Consumes the session, returning its state.
    pub fn into_state(self) -> DebuggerState {
        self.state
    }

    /// Runs the control loop until the session terminates.
    pub fn run(&mut self, presenter: &mut dyn ResultPresenter) -> Result<()> {
        self.start_output_drain()?;
        info!(mode = %self.state.mode, "Session started");

        loop {
            let next = match self.loop_state {
                LoopState::AwaitingEvent => {
                    if self.cancelled() && !self.state.is_recording() {
                        self.detach();
                        LoopState::Terminated
                    } else {
                        let batch = self.control.next_event_batch().unwrap_or_else(|e| {
                            error!("Control interface failed: {e}");
                            vec![DebugEvent::Disconnected]
                        });
                        self.loop_state = LoopState::Dispatching;
                        self.dispatch_batch(batch, presenter)
                    }
                }
                LoopState::Resumed => LoopState::AwaitingEvent,
                LoopState::WaitingForUserCommand | LoopState::Replaying => {
                    self.handle_operator(presenter)
                }
                LoopState::Dispatching => {
                    warn!("Dispatch interrupted, waiting for the next event");
                    LoopState::AwaitingEvent
                }
                LoopState::Terminated => break,
            };
            if next != self.loop_state {
                debug!(from = ?self.loop_state, to = ?next, "Loop transition");
            }
            self.loop_state = next;
        }

        self.join_output_drain();
        if !self.state.is_replay() {
            self.flush_output(presenter);
        }
        info!("Session ended");
        Ok(())
    }

    fn dispatch_batch(
        &mut self,
        batch: Vec<DebugEvent>,
        presenter: &mut dyn ResultPresenter,
    ) -> LoopState {
        let mut wait = false;
        for event in batch {
            let outcome = match self.dispatcher.dispatch(&event, &mut self.state, &mut self.control)
            {
                Ok(outcome) => outcome,
                Err(e) if e.is_disconnect() => {
                    warn!(event = event.kind(), "Debuggee lost while handling event: {e}");
                    self.disconnect()
                }
                Err(e) => {
                    error!(event = event.kind(), "Event handling failed: {e}");
                    presenter.error(&e.to_string());
                    EventOutcome::proceed()
                }
            };

            if let Some(progress) = &outcome.progress {
                presenter.progress(progress);
            }
            if outcome.action == EventAction::EnterReplay {
                self.enter_replay();
            }
            if !self.state.is_recording() {
                self.flush_output(presenter);
            }
            if let Some(message) = &outcome.message {
                presenter.info(message);
            }
            match outcome.action {
                EventAction::Continue => {}
                EventAction::WaitForCommand => wait = true,
                EventAction::Stop => return LoopState::Terminated,
                EventAction::EnterReplay => return LoopState::Replaying,
            }
        }

        if wait {
            return LoopState::WaitingForUserCommand;
        }
        self.resume(presenter)
    }

    fn resume(&mut self, presenter: &mut dyn ResultPresenter) -> LoopState {
        self.state.context = None;
        match self.control.resume() {
            Ok(()) => LoopState::Resumed,
            Err(e) => {
                warn!("Resume failed: {e}");
                self.dispatch_batch(vec![DebugEvent::Disconnected], presenter)
            }
        }
    }

    fn handle_operator(&mut self, presenter: &mut dyn ResultPresenter) -> LoopState {
        presenter.prompt(self.state.mode);
        let Some(line) = self.next_command() else {
            debug!("Operator input closed");
            self.detach();
            return LoopState::Terminated;
        };
        let line = line.trim();
        if line.is_empty() {
            return self.loop_state;
        }
        if matches!(line, "quit" | "exit") {
            self.detach();
            return LoopState::Terminated;
        }

        let result = match self.interpreter.parse(line) {
            Ok(command) => command.execute(&mut self.state, &mut self.control),
            Err(e) => CommandResult::from_error(&e),
        };
        presenter.present(&result);

        if result.disconnects() && !self.state.is_replay() {
            warn!("Debuggee lost while running `{line}`");
            return self.dispatch_batch(vec![DebugEvent::Disconnected], presenter);
        }
        if result.resumes() && !self.state.is_replay() {
            return self.resume(presenter);
        }
        self.loop_state
    }

    /// Blocks for the next operator command, staying responsive to cancellation.
    ///
    /// Returns `None` once input is closed or the session is cancelled.
    fn next_command(&self) -> Option<String> {
        let poll = self.state.config.command_poll_interval();
        loop {
            if self.cancelled() {
                return None;
            }
            match self.commands.recv_timeout(poll) {
                Ok(line) => return Some(line),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    fn disconnect(&mut self) -> EventOutcome {
        self.dispatcher
            .dispatch(&DebugEvent::Disconnected, &mut self.state, &mut self.control)
            .unwrap_or_else(|e| {
                error!("Failed to handle disconnect: {e}");
                EventOutcome { action: EventAction::Stop, message: None, progress: None }
            })
    }

    fn enter_replay(&mut self) {
        self.join_output_drain();
        let rest = self.state.output.take();
        self.state.output_log.push_str(&rest);
        info!(steps = self.state.history.len(), "Replay started");
    }

    fn detach(&mut self) {
        if self.state.is_replay() {
            return;
        }
        if let Err(e) = self.control.detach() {
            debug!("Detach failed: {e}");
        }
    }

    fn flush_output(&mut self, presenter: &mut dyn ResultPresenter) {
        let text = self.state.output.take();
        if !text.is_empty() {
            self.state.output_log.push_str(&text);
            presenter.output(&text);
        }
    }

    fn start_output_drain(&mut self) -> Result<()> {
        let Some(stream) = self.control.take_output() else {
            return Ok(());
        };
        let buffer = self.state.output.clone();
        let handle = thread::Builder::new()
            .name("rdb-output".into())
            .spawn(move || drain_output(stream, &buffer))
            .wrap_err("Failed to spawn the output drain thread")?;
        self.drain = Some(handle);
        Ok(())
    }

    fn join_output_drain(&mut self) {
        if let Some(handle) = self.drain.take() {
            if handle.join().is_err() {
                warn!("Output drain thread panicked");
            }
        }
    }
}

fn drain_output(stream: Box<dyn Read + Send>, buffer: &OutputBuffer) {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => buffer.append(&line),
            Err(e) => {
                warn!("Debuggee output stream failed: {e}");
                break;
            }
        }
    }
    debug!("Debuggee output closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeControl;
    use crate::TranscriptPresenter;
    use rdb_common::types::{Binding, CodeLocation, FrameInfo, RemoteValue, RequestId, ThreadId};
    use std::sync::mpsc;

    fn frames(line: u32) -> Vec<FrameInfo> {
        vec![FrameInfo {
            location: CodeLocation::new("Main", "main", "Main.java", line),
            this_object: None,
            bindings: vec![Binding {
                name: "i".into(),
                type_name: "int".into(),
                value: RemoteValue::primitive("int", line),
                is_argument: false,
            }],
        }]
    }

    fn session(
        control: FakeControl,
        mode: SessionMode,
        input: &[&str],
    ) -> Session<FakeControl> {
        let (tx, rx) = mpsc::channel();
        for line in input {
            tx.send(line.to_string()).unwrap();
        }
        Session::new(control, EngineConfig::default(), mode, rx)
    }

    #[test]
    fn test_disconnect_without_recording_terminates() {
        let mut session = session(FakeControl::default(), SessionMode::Interactive, &[]);
        let mut presenter = TranscriptPresenter::default();
        session.run(&mut presenter).unwrap();
        assert_eq!(session.loop_state(), LoopState::Terminated);
        assert!(presenter.saw_info("=== Program terminated ==="));
    }

    #[test]
    fn test_wait_then_continue() {
        let mut control = FakeControl::default();
        control.frames = frames(3);
        control.events.push_back(vec![DebugEvent::ClassLoaded { class_name: "Main".into() }]);
        control.events.push_back(vec![DebugEvent::MethodEntered {
            thread: ThreadId(1),
            location: CodeLocation::new("Main", "main", "Main.java", 3),
            request: RequestId(1),
        }]);

        let input = ["", "temporaries", "continue"];
        let mut session = session(control, SessionMode::Interactive, &input);
        let mut presenter = TranscriptPresenter::default();
        session.run(&mut presenter).unwrap();

        assert!(presenter.saw_info("=== Method entry: main() ==="));
        assert_eq!(presenter.results.len(), 2);
        assert!(presenter.results[0].message.contains("i (int) = 3"));
        assert!(presenter.results[1].resumes());
        // class load, then continue
        assert_eq!(session.control.resumed, 2);
    }

    #[test]
    fn test_closed_input_detaches() {
        let mut control = FakeControl::with_lines("Main.java", &[3]);
        control.frames = frames(3);
        control.events.push_back(vec![DebugEvent::ClassLoaded { class_name: "Main".into() }]);
        control.events.push_back(vec![DebugEvent::MethodEntered {
            thread: ThreadId(1),
            location: CodeLocation::new("Main", "main", "Main.java", 3),
            request: RequestId(1),
        }]);
        let mut session = session(control, SessionMode::Interactive, &["bogus"]);
        let mut presenter = TranscriptPresenter::default();
        session.run(&mut presenter).unwrap();

        assert!(!presenter.results[0].success);
        assert_eq!(session.loop_state(), LoopState::Terminated);
    }

    #[test]
    fn test_command_on_lost_debuggee_ends_session() {
        let mut control = FakeControl::with_lines("Main.java", &[3, 5]);
        control.frames = frames(3);
        control.events.push_back(vec![DebugEvent::ClassLoaded { class_name: "Main".into() }]);
        control.events.push_back(vec![DebugEvent::MethodEntered {
            thread: ThreadId(1),
            location: CodeLocation::new("Main", "main", "Main.java", 3),
            request: RequestId(1),
        }]);
        control.exit_on_resolve = true;

        let mut session =
            session(control, SessionMode::Interactive, &["break Main.java 5", "frame"]);
        let mut presenter = TranscriptPresenter::default();
        session.run(&mut presenter).unwrap();

        assert_eq!(session.loop_state(), LoopState::Terminated);
        assert_eq!(presenter.results.len(), 1);
        assert!(!presenter.results[0].success);
        assert!(presenter.results[0].disconnects());
        assert!(presenter.saw_info("=== Program terminated ==="));
        // only the class load resumed the debuggee
        assert_eq!(session.control.resumed, 1);
    }

    #[test]
    fn test_cancel_ends_session() {
        let mut control = FakeControl::default();
        control.frames = frames(3);
        control.events.push_back(vec![DebugEvent::ClassLoaded { class_name: "Main".into() }]);
        control.events.push_back(vec![DebugEvent::MethodEntered {
            thread: ThreadId(1),
            location: CodeLocation::new("Main", "main", "Main.java", 3),
            request: RequestId(1),
        }]);
        let (_tx, rx) = mpsc::channel::<String>();
        let mut session = Session::new(
            control,
            EngineConfig::default()
                .with_command_poll_interval(std::time::Duration::from_millis(5)),
            SessionMode::Interactive,
            rx,
        );
        session.cancel_handle().store(true, Ordering::Relaxed);
        let mut presenter = TranscriptPresenter::default();
        session.run(&mut presenter).unwrap();
        assert_eq!(session.loop_state(), LoopState::Terminated);
    }
}
