//! Error taxonomy of the debugger core.
//!
//! [`ControlError`] is what the control interface reports when it rejects an
//! operation; [`DebuggerError`] is the error type of every engine operation.
//! Command-level failures never escape as errors: they are folded into an
//! unsuccessful [`CommandResult`](crate::CommandResult).

use rdb_common::types::{ObjectId, ThreadId};
use thiserror::Error;

/// Failures reported by the debug control interface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    /// The debuggee has terminated.
    #[error("target process has exited")]
    TargetExited,
    /// The session was detached from the debuggee.
    #[error("control interface is detached")]
    Detached,
    /// The control interface refused the operation.
    #[error("request rejected: {0}")]
    Rejected(String),
    /// The thread does not exist or is not suspended.
    #[error("thread {0} is not suspended")]
    InvalidThread(ThreadId),
    /// The object has been collected or never existed.
    #[error("object {0} is no longer available")]
    InvalidObject(ObjectId),
}

impl ControlError {
    /// Whether the error means the debuggee is gone.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::TargetExited | Self::Detached)
    }
}

/// Errors produced by debugger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DebuggerError {
    /// Unknown or malformed operator input.
    #[error("{0}")]
    UserInput(String),
    /// A breakpoint target has no executable location.
    #[error("{0}")]
    NotFound(String),
    /// The operation is not valid in the current state.
    #[error("{0}")]
    IllegalState(String),
    /// The control interface rejected an operation.
    #[error("control interface error: {0}")]
    Control(#[from] ControlError),
    /// A snapshot could not be built for part of the target state.
    #[error("recording integrity: {0}")]
    RecordingIntegrity(String),
}

impl DebuggerError {
    /// Shorthand for [`DebuggerError::UserInput`].
    pub fn user_input(msg: impl Into<String>) -> Self {
        Self::UserInput(msg.into())
    }

    /// Shorthand for [`DebuggerError::NotFound`].
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Shorthand for [`DebuggerError::IllegalState`].
    pub fn illegal_state(msg: impl Into<String>) -> Self {
        Self::IllegalState(msg.into())
    }

    /// Whether the error means the debuggee is gone.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Control(e) if e.is_disconnect())
    }
}

/// Result alias used throughout the engine.
pub type DebuggerResult<T> = Result<T, DebuggerError>;
