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

//! The debug control interface.
//!
//! The engine never talks to a debuggee directly. Everything it needs (resolving
//! source lines, arming requests, receiving suspension events, reading thread state)
//! goes through [`ControlInterface`], so the same core drives a real debug agent or
//! the in-process simulator in [`crate::sim`].
//!
//! # Request lifecycle
//!
//! Every `arm_*` call returns a [`RequestId`]. Step requests are single-shot: once the
//! matching [`DebugEvent::StepCompleted`] has been delivered the request is gone and
//! disarming it again is a no-op. Breakpoint and method-entry requests stay armed until
//! [`ControlInterface::disarm`] is called.

use std::io::Read;

use rdb_common::types::{
    CodeLocation, DebugEvent, FrameInfo, ObjectContents, ObjectId, RequestId, StepRequest,
    ThreadId,
};

use crate::ControlError;

/// Capabilities of a debug agent attached to a single debuggee.
pub trait ControlInterface: Send {
    /// Resolves a source line to an executable location.
    ///
    /// Returns `Ok(None)` when the line carries no code.
    fn resolve(&mut self, file: &str, line: u32) -> Result<Option<CodeLocation>, ControlError>;

    /// Arms a breakpoint at a resolved location.
    fn arm_breakpoint(&mut self, location: &CodeLocation) -> Result<RequestId, ControlError>;

    /// Arms a single-shot, line-granularity step request.
    fn arm_step(&mut self, request: StepRequest) -> Result<RequestId, ControlError>;

    /// Arms a request reporting every method entry, optionally restricted to one class.
    fn arm_method_entry(&mut self, class_filter: Option<&str>) -> Result<RequestId, ControlError>;

    /// Releases a request. Releasing an unknown or already consumed request succeeds.
    fn disarm(&mut self, request: RequestId) -> Result<(), ControlError>;

    /// Blocks until the debuggee produces the next batch of events.
    ///
    /// Every suspending event in a batch leaves the debuggee suspended until
    /// [`ControlInterface::resume`] is called.
    fn next_event_batch(&mut self) -> Result<Vec<DebugEvent>, ControlError>;

    /// Resumes the debuggee.
    fn resume(&mut self) -> Result<(), ControlError>;

    /// Detaches from the debuggee, letting it run to completion.
    fn detach(&mut self) -> Result<(), ControlError>;

    /// Call stack of a suspended thread, innermost frame first.
    fn thread_frames(&mut self, thread: ThreadId) -> Result<Vec<FrameInfo>, ControlError>;

    /// Reads the contents of an object or array, returning at most `limit` entries.
    fn inspect_object(&mut self, id: ObjectId, limit: usize)
        -> Result<ObjectContents, ControlError>;

    /// Takes the debuggee's stdout stream. Returns `None` once taken.
    fn take_output(&mut self) -> Option<Box<dyn Read + Send>>;
}
