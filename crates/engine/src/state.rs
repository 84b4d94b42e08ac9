//! Mutable session state shared by commands, strategies and event handlers.

use std::{fmt, sync::Arc};

use parking_lot::Mutex;
use rdb_common::types::{RequestId, Snapshot, ThreadId};
use serde::{Deserialize, Serialize};

use crate::{BreakpointRegistry, EngineConfig, History};

/// What commands act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// Commands drive a running debuggee.
    Live,
    /// The debuggee is being auto-stepped and every step is recorded.
    Recording,
    /// Commands navigate a frozen history.
    Replay,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::Recording => write!(f, "recording"),
            Self::Replay => write!(f, "replay"),
        }
    }
}

/// Where a live debuggee is currently suspended.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Suspended thread
    pub thread: ThreadId,
    /// State of the thread captured at suspension
    pub snapshot: Arc<Snapshot>,
}

/// Debuggee stdout collected by the drain thread.
///
/// The drain thread only appends; the control loop takes what has accumulated.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer {
    inner: Arc<Mutex<String>>,
}

impl OutputBuffer {
    /// Appends text.
    pub fn append(&self, text: &str) {
        self.inner.lock().push_str(text);
    }

    /// Takes everything accumulated so far.
    pub fn take(&self) -> String {
        std::mem::take(&mut *self.inner.lock())
    }
}

/// State of a debugging session.
#[derive(Debug)]
pub struct DebuggerState {
    /// Current mode
    pub mode: Mode,
    /// Session configuration
    pub config: EngineConfig,
    /// Line and method breakpoints
    pub breakpoints: BreakpointRegistry,
    /// Recorded steps
    pub history: History,
    /// Suspension point of the live debuggee, only meaningful in live mode
    pub context: Option<ExecutionContext>,
    /// Pending single-step request
    pub active_step: Option<RequestId>,
    /// Debuggee stdout not yet consumed
    pub output: OutputBuffer,
    /// Output consumed in live mode, or produced after the last recorded step
    pub output_log: String,
    /// Number of live suspensions so far
    pub stops: usize,
}

impl DebuggerState {
    /// Creates the state of a new session.
    pub fn new(mode: Mode, config: EngineConfig) -> Self {
        let breakpoints = BreakpointRegistry::new(config.source_extension.clone());
        Self {
            mode,
            config,
            breakpoints,
            history: History::new(),
            context: None,
            active_step: None,
            output: OutputBuffer::default(),
            output_log: String::new(),
            stops: 0,
        }
    }

    /// Whether the session is in replay mode.
    pub fn is_replay(&self) -> bool {
        self.mode == Mode::Replay
    }

    /// Whether the session is recording.
    pub fn is_recording(&self) -> bool {
        self.mode == Mode::Recording
    }

    /// The step inspection commands read from: the history cursor in replay, the
    /// suspension snapshot otherwise.
    pub fn current_view(&self) -> Option<&Arc<Snapshot>> {
        match self.mode {
            Mode::Replay => self.history.current(),
            Mode::Live | Mode::Recording => self.context.as_ref().map(|c| &c.snapshot),
        }
    }

    /// Debuggee output visible from the current position.
    pub fn visible_output(&self) -> String {
        match self.mode {
            Mode::Replay => {
                let mut output = self.history.output_until_cursor();
                if !self.history.has_next() {
                    output.push_str(&self.output_log);
                }
                output
            }
            Mode::Live | Mode::Recording => self.output_log.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::snapshot_at;

    #[test]
    fn test_output_buffer_take() {
        let buffer = OutputBuffer::default();
        let writer = buffer.clone();
        writer.append("a");
        writer.append("b");
        assert_eq!(buffer.take(), "ab");
        assert_eq!(buffer.take(), "");
    }

    #[test]
    fn test_current_view_follows_mode() {
        let mut state = DebuggerState::new(Mode::Live, EngineConfig::default());
        assert!(state.current_view().is_none());

        let snapshot = Arc::new(snapshot_at(0, "A.java", 3, 1));
        state.context = Some(ExecutionContext { thread: ThreadId(1), snapshot });
        assert_eq!(state.current_view().unwrap().location.line, 3);

        state.history.add(snapshot_at(0, "A.java", 9, 1)).unwrap();
        state.history.complete_recording();
        state.mode = Mode::Replay;
        assert_eq!(state.current_view().unwrap().location.line, 9);
    }

    #[test]
    fn test_visible_output_in_replay() {
        let mut state = DebuggerState::new(Mode::Recording, EngineConfig::default());
        let mut first = snapshot_at(0, "A.java", 1, 1);
        first.output = "one\n".into();
        state.history.add(first).unwrap();
        state.history.add(snapshot_at(1, "A.java", 2, 1)).unwrap();
        state.output_log = "tail\n".into();
        state.history.complete_recording();
        state.mode = Mode::Replay;

        assert_eq!(state.visible_output(), "one\n");
        state.history.go_to_end();
        assert_eq!(state.visible_output(), "one\ntail\n");
    }
}
