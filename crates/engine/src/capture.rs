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

//! Snapshot capture.
//!
//! Builds a [`Snapshot`] from a suspended thread: the location of the innermost frame,
//! the whole call stack, and for every frame the receiver and visible bindings rendered
//! into bounded variable trees.
//!
//! # Bounds
//!
//! - Depth: top-level variables are at depth 0 and children are only produced while the
//!   parent's depth is below `max_depth`.
//! - Width: at most `max_width` children are kept, followed by one `... (N more)` marker.
//! - Cycles: an object already being expanded on the current path is rendered without
//!   children, so reference cycles terminate regardless of the depth limit.
//!
//! # Failures
//!
//! A field the target cannot read renders as `<inaccessible>`, and so does a variable
//! whose object can no longer be inspected. Every frame of the stack is kept. Only a
//! lost debuggee aborts the capture.

use std::collections::HashSet;

use chrono::Utc;
use rdb_common::types::{
    Binding, FrameInfo, ObjectContents, ObjectId, RemoteValue, Snapshot, SourceLocation,
    StackFrameSnapshot, ThreadId, VariableSnapshot,
};
use tracing::{trace, warn};

use crate::{CaptureLimits, ControlError, ControlInterface, DebuggerError, DebuggerResult};

/// Rendered value of a field the target could not read.
pub const INACCESSIBLE: &str = "<inaccessible>";

/// Captures snapshots of suspended threads.
pub struct SnapshotRecorder<'a> {
    control: &'a mut dyn ControlInterface,
    limits: CaptureLimits,
}

impl<'a> SnapshotRecorder<'a> {
    /// Creates a recorder reading through `control`.
    pub fn new(control: &'a mut dyn ControlInterface, limits: CaptureLimits) -> Self {
        Self { control, limits }
    }

    /// Captures the state of a suspended thread as snapshot number `seq`.
    pub fn capture(
        &mut self,
        thread: ThreadId,
        seq: usize,
        output: String,
    ) -> DebuggerResult<Snapshot> {
        let frames = self.control.thread_frames(thread)?;
        let Some(top) = frames.first() else {
            return Err(DebuggerError::RecordingIntegrity(format!(
                "{thread} has no frames to capture"
            )));
        };
        let location = SourceLocation::new(&top.location.source_file, top.location.line);
        let class_name = top.location.class_name.clone();
        let method_name = top.location.method_name.clone();

        let captured = frames
            .iter()
            .enumerate()
            .map(|(index, frame)| self.capture_frame(index, frame))
            .collect::<DebuggerResult<Vec<_>>>()?;

        trace!(seq, %location, frames = captured.len(), "Captured snapshot");
        Ok(Snapshot {
            seq,
            location,
            class_name,
            method_name,
            frames: captured,
            output,
            captured_at: Utc::now(),
        })
    }

    fn capture_frame(
        &mut self,
        index: usize,
        frame: &FrameInfo,
    ) -> DebuggerResult<StackFrameSnapshot> {
        let receiver = match &frame.this_object {
            Some(this) => Some(self.capture_value("this", this.type_name(), this, index, 0)?),
            None => None,
        };
        let variables = frame
            .bindings
            .iter()
            .map(|binding| self.capture_binding(binding, index))
            .collect::<DebuggerResult<Vec<_>>>()?;

        Ok(StackFrameSnapshot {
            index,
            class_name: frame.location.class_name.clone(),
            method_name: frame.location.method_name.clone(),
            file: frame.location.source_file.clone(),
            line: frame.location.line,
            receiver,
            variables,
        })
    }

    fn capture_binding(
        &mut self,
        binding: &Binding,
        frame: usize,
    ) -> DebuggerResult<VariableSnapshot> {
        let var =
            self.capture_value(&binding.name, &binding.type_name, &binding.value, frame, 0)?;
        Ok(if binding.is_argument { var.as_argument() } else { var })
    }

    fn capture_value(
        &mut self,
        name: &str,
        type_name: &str,
        value: &RemoteValue,
        frame: usize,
        depth: usize,
    ) -> DebuggerResult<VariableSnapshot> {
        let mut path = HashSet::new();
        self.expand(name, type_name, value, frame, depth, &mut path)
    }

    /// Renders `value` with its children. Fails only when the debuggee is gone.
    fn expand(
        &mut self,
        name: &str,
        type_name: &str,
        value: &RemoteValue,
        frame: usize,
        depth: usize,
        path: &mut HashSet<ObjectId>,
    ) -> DebuggerResult<VariableSnapshot> {
        let var = VariableSnapshot::new(name, type_name, value.render(), frame);
        let Some(id) = value.expandable_id() else {
            return Ok(var);
        };
        if depth >= self.limits.max_depth || !path.insert(id) {
            return Ok(var);
        }

        let children = self.expand_children(id, frame, depth, path);
        path.remove(&id);
        match children {
            Ok(children) => Ok(var.with_children(children)),
            Err(e) if e.is_disconnect() => Err(e),
            Err(e) => {
                warn!(variable = name, frame, "Unreadable variable: {e}");
                Ok(VariableSnapshot::new(name, type_name, INACCESSIBLE, frame))
            }
        }
    }

    fn expand_children(
        &mut self,
        id: ObjectId,
        frame: usize,
        depth: usize,
        path: &mut HashSet<ObjectId>,
    ) -> DebuggerResult<Vec<VariableSnapshot>> {
        let width = self.limits.max_width;
        let contents = self.control.inspect_object(id, width).map_err(|e| match e {
            ControlError::InvalidObject(_) | ControlError::Rejected(_) => {
                DebuggerError::RecordingIntegrity(format!("cannot expand object {id}: {e}"))
            }
            other => other.into(),
        })?;

        let mut children = Vec::new();
        let total = match contents {
            ObjectContents::Fields(fields) => {
                let total = fields.len();
                for field in fields.into_iter().take(width) {
                    let child = match &field.value {
                        Ok(value) => self.expand(
                            &field.name,
                            &field.type_name,
                            value,
                            frame,
                            depth + 1,
                            path,
                        )?,
                        Err(reason) => {
                            trace!(field = %field.name, "Unreadable field: {reason}");
                            VariableSnapshot::new(
                                &field.name,
                                &field.type_name,
                                INACCESSIBLE,
                                frame,
                            )
                        }
                    };
                    children.push(child);
                }
                total
            }
            ObjectContents::Elements { total, items } => {
                for (i, item) in items.iter().take(width).enumerate() {
                    let name = format!("[{i}]");
                    let child =
                        self.expand(&name, item.type_name(), item, frame, depth + 1, path)?;
                    children.push(child);
                }
                total
            }
        };

        if total > children.len() {
            children.push(VariableSnapshot::truncation(frame, total - children.len()));
        }
        Ok(children)
    }
}
