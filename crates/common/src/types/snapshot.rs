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

//! Execution snapshots.
//!
//! A [`Snapshot`] is the immutable capture of one execution step: where the thread
//! was suspended, its whole call stack, the variables visible in every frame and the
//! stdout produced since the previous step. Snapshots are created by the recorder and
//! only ever read afterwards.

use std::fmt::{self, Display, Write as _};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A `file:line` position in source code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Source file name (e.g. `Main.java`)
    pub file: String,
    /// Line number (1-based)
    pub line: u32,
}

impl SourceLocation {
    /// Creates a new source location.
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self { file: file.into(), line }
    }
}

impl Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Captured value of a variable, with its expanded children for composite values.
///
/// Trees are bounded by the capture limits; an elided tail of children is represented
/// by a single truncation marker (see [`VariableSnapshot::truncation`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSnapshot {
    /// Variable, field or element name (`[i]` for array elements)
    pub name: String,
    /// Declared type name
    pub type_name: String,
    /// Rendered value
    pub value: String,
    /// Index of the owning stack frame
    pub frame_index: usize,
    /// Whether this is a method argument of the owning frame
    pub is_argument: bool,
    /// Expanded children (fields or elements)
    pub children: Vec<VariableSnapshot>,
}

/// Name used by truncation markers.
const TRUNCATION_NAME: &str = "...";

impl VariableSnapshot {
    /// Creates a variable without children.
    pub fn new(
        name: impl Into<String>,
        type_name: impl Into<String>,
        value: impl Into<String>,
        frame_index: usize,
    ) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            value: value.into(),
            frame_index,
            is_argument: false,
            children: Vec::new(),
        }
    }

    /// Marks the variable as a method argument.
    pub fn as_argument(mut self) -> Self {
        self.is_argument = true;
        self
    }

    /// Replaces the children of the variable.
    pub fn with_children(mut self, children: Vec<Self>) -> Self {
        self.children = children;
        self
    }

    /// Creates the synthetic marker standing for `remaining` elided children.
    pub fn truncation(frame_index: usize, remaining: usize) -> Self {
        Self::new(TRUNCATION_NAME, "", format!("({remaining} more)"), frame_index)
    }

    /// Whether this entry is a truncation marker rather than a real variable.
    pub fn is_truncation(&self) -> bool {
        self.name == TRUNCATION_NAME && self.type_name.is_empty()
    }

    /// Finds a direct child by name.
    pub fn child(&self, name: &str) -> Option<&Self> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Renders the variable and its children as an indented tree.
    pub fn render_tree(&self, indent: usize) -> String {
        let mut out = String::new();
        self.write_tree(&mut out, indent);
        out
    }

    fn write_tree(&self, out: &mut String, indent: usize) {
        let _ = writeln!(out, "{:width$}{self}", "", width = indent);
        for child in &self.children {
            child.write_tree(out, indent + 2);
        }
    }
}

impl Display for VariableSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_truncation() {
            write!(f, "{} {}", self.name, self.value)
        } else {
            write!(f, "{} ({}) = {}", self.name, self.type_name, self.value)
        }
    }
}

/// One frame of a captured call stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrameSnapshot {
    /// Frame index, 0 being the innermost frame
    pub index: usize,
    /// Declaring class of the executing method
    pub class_name: String,
    /// Executing method
    pub method_name: String,
    /// Source file of the frame's location
    pub file: String,
    /// Line of the frame's location
    pub line: u32,
    /// Receiver (`this`) with its fields, absent in static context
    pub receiver: Option<VariableSnapshot>,
    /// Visible local variables, arguments included
    pub variables: Vec<VariableSnapshot>,
}

impl StackFrameSnapshot {
    /// Method arguments of the frame.
    pub fn arguments(&self) -> impl Iterator<Item = &VariableSnapshot> {
        self.variables.iter().filter(|v| v.is_argument)
    }

    /// Local variables of the frame that are not arguments.
    pub fn temporaries(&self) -> impl Iterator<Item = &VariableSnapshot> {
        self.variables.iter().filter(|v| !v.is_argument)
    }

    /// Looks a name up in the frame locals first, then in the receiver's fields.
    pub fn find_variable(&self, name: &str) -> Option<&VariableSnapshot> {
        self.variables
            .iter()
            .find(|v| v.name == name)
            .or_else(|| self.receiver.as_ref().and_then(|r| r.child(name)))
    }

    /// Rendered receiver, or `static context` when the frame has none.
    pub fn receiver_label(&self) -> &str {
        self.receiver.as_ref().map(|r| r.value.as_str()).unwrap_or("static context")
    }
}

impl Display for StackFrameSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {}.{}() at {}:{}",
            self.index, self.class_name, self.method_name, self.file, self.line
        )
    }
}

/// Immutable capture of one execution step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Position of the snapshot in its history (0-based)
    pub seq: usize,
    /// Location of the innermost frame
    pub location: SourceLocation,
    /// Declaring class of the executing method
    pub class_name: String,
    /// Executing method
    pub method_name: String,
    /// Call stack, innermost frame first
    pub frames: Vec<StackFrameSnapshot>,
    /// Stdout produced by the debuggee since the previous snapshot
    pub output: String,
    /// Wall-clock time of the capture
    pub captured_at: DateTime<Utc>,
}

impl Snapshot {
    /// Stack depth at this step.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Innermost frame, if the stack could be captured.
    pub fn top_frame(&self) -> Option<&StackFrameSnapshot> {
        self.frames.first()
    }

    /// Frame at the given index.
    pub fn frame(&self, index: usize) -> Option<&StackFrameSnapshot> {
        self.frames.get(index)
    }

    /// Detailed multi-line rendering used by the `frame` command.
    pub fn detailed(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== Step #{} ===", self.seq);
        let _ = writeln!(out, "Location: {}", self.location);
        let _ = writeln!(out, "Method: {}.{}()", self.class_name, self.method_name);
        let receiver = self.top_frame().map(|f| f.receiver_label()).unwrap_or("static context");
        let _ = writeln!(out, "Receiver: {receiver}");
        let _ = writeln!(out, "Captured: {}", self.captured_at.format("%H:%M:%S%.3f"));

        out.push_str("\nLocal Variables:\n");
        match self.top_frame() {
            Some(frame) if !frame.variables.is_empty() => {
                for var in &frame.variables {
                    out.push_str(&var.render_tree(2));
                }
            }
            _ => out.push_str("  (none)\n"),
        }

        out.push_str("\nCall Stack:\n");
        for frame in &self.frames {
            let _ = writeln!(out, "  {frame}");
        }

        if !self.output.is_empty() {
            out.push_str("\nOutput:\n");
            for line in self.output.lines() {
                let _ = writeln!(out, "  {line}");
            }
        }
        out
    }
}

impl Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Step #{}: {} - {}.{}() [{} frames]",
            self.seq,
            self.location,
            self.class_name,
            self.method_name,
            self.frames.len()
        )
    }
}
