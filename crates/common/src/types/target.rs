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

//! Data exchanged with the debug control interface.
//!
//! These types describe what a debuggee looks like from the outside: where a
//! thread is suspended, which values its frames can see, and which suspension
//! events the control interface delivers. They carry no behavior beyond simple
//! projections; the engine crate owns the logic that consumes them.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Identity of a debuggee thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ThreadId(pub u64);

/// Identity of a heap object inside the debuggee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

/// Handle of an event request (breakpoint, step, method entry) armed on the control interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread-{}", self.0)
    }
}

impl Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An executable location reported by the control interface.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodeLocation {
    /// Fully qualified name of the declaring class
    pub class_name: String,
    /// Name of the method containing the location
    pub method_name: String,
    /// Source file name as reported by the target (e.g. `Main.java`)
    pub source_file: String,
    /// Line number (1-based)
    pub line: u32,
}

impl CodeLocation {
    /// Creates a new code location.
    pub fn new(
        class_name: impl Into<String>,
        method_name: impl Into<String>,
        source_file: impl Into<String>,
        line: u32,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
            source_file: source_file.into(),
            line,
        }
    }

    /// Returns the `file:line` key of this location.
    pub fn key(&self) -> String {
        format!("{}:{}", self.source_file, self.line)
    }
}

impl Display for CodeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}() at {}:{}",
            self.class_name, self.method_name, self.source_file, self.line
        )
    }
}

/// A value as seen through the control interface.
///
/// Composite values (objects, arrays) are identity references; their contents are
/// fetched separately so that arbitrarily large or cyclic graphs never have to be
/// materialized at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteValue {
    /// The null reference
    Null,
    /// A primitive value rendered as a literal by the target
    Primitive {
        /// Primitive type name (e.g. `int`)
        type_name: String,
        /// Literal rendering (e.g. `42`)
        literal: String,
    },
    /// A string object
    Str {
        /// Identity of the string object
        id: ObjectId,
        /// String contents
        value: String,
    },
    /// A field-bearing object
    Object {
        /// Identity of the object
        id: ObjectId,
        /// Runtime type name
        type_name: String,
    },
    /// An array or collection
    Array {
        /// Identity of the array
        id: ObjectId,
        /// Runtime type name (e.g. `int[]`)
        type_name: String,
        /// Number of elements
        length: usize,
    },
}

impl RemoteValue {
    /// Convenience constructor for primitive values.
    pub fn primitive(type_name: impl Into<String>, literal: impl Display) -> Self {
        Self::Primitive { type_name: type_name.into(), literal: literal.to_string() }
    }

    /// Identity of the value if its contents can be expanded.
    pub fn expandable_id(&self) -> Option<ObjectId> {
        match self {
            Self::Object { id, .. } | Self::Array { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Runtime type name of the value.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Null => "null",
            Self::Primitive { type_name, .. } => type_name,
            Self::Str { .. } => "String",
            Self::Object { type_name, .. } | Self::Array { type_name, .. } => type_name,
        }
    }

    /// Renders the value for display.
    ///
    /// Primitives render as literals, strings are quoted and object-like values
    /// render as `type@identity`.
    pub fn render(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Primitive { literal, .. } => literal.clone(),
            Self::Str { value, .. } => format!("\"{value}\""),
            Self::Object { id, type_name } | Self::Array { id, type_name, .. } => {
                format!("{type_name}@{id}")
            }
        }
    }
}

/// A variable binding visible in a frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    /// Variable name
    pub name: String,
    /// Declared type name
    pub type_name: String,
    /// Current value
    pub value: RemoteValue,
    /// Whether the binding is a method argument
    pub is_argument: bool,
}

/// One frame of a suspended thread's call stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameInfo {
    /// Current location of the frame
    pub location: CodeLocation,
    /// The receiver (`this`), absent in static context
    pub this_object: Option<RemoteValue>,
    /// Visible local bindings, arguments included
    pub bindings: Vec<Binding>,
}

/// One field of an object, as returned by the control interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSlot {
    /// Field name
    pub name: String,
    /// Declared type name
    pub type_name: String,
    /// Field value, or the reason it could not be read
    pub value: Result<RemoteValue, String>,
}

/// Contents of an expandable value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectContents {
    /// Field-bearing object
    Fields(Vec<FieldSlot>),
    /// Array elements, possibly truncated to the requested limit
    Elements {
        /// Total number of elements in the array
        total: usize,
        /// The first elements, up to the requested limit
        items: Vec<RemoteValue>,
    },
}

/// Depth policy of a single-step request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepDepth {
    /// Stop at the next line, entering calls
    Into,
    /// Stop at the next line at the same or a shallower stack depth
    Over,
}

/// A line-granularity, single-shot step request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRequest {
    /// Thread to step
    pub thread: ThreadId,
    /// Step depth policy
    pub depth: StepDepth,
    /// Class patterns (`java.*` style) whose code must never be stopped in
    pub exclusions: Vec<String>,
}

impl StepRequest {
    /// Returns whether the given class is excluded by this request's filters.
    pub fn excludes(&self, class_name: &str) -> bool {
        self.exclusions.iter().any(|pattern| match pattern.strip_suffix('*') {
            Some(prefix) => class_name.starts_with(prefix),
            None => class_name == pattern,
        })
    }
}

/// Suspension and lifecycle events delivered by the control interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DebugEvent {
    /// A class of the target was loaded
    ClassLoaded {
        /// Name of the loaded class
        class_name: String,
    },
    /// A thread reached an armed breakpoint
    BreakpointHit {
        /// Suspended thread
        thread: ThreadId,
        /// Breakpoint location
        location: CodeLocation,
        /// Request that fired
        request: RequestId,
    },
    /// A single-step request completed
    StepCompleted {
        /// Suspended thread
        thread: ThreadId,
        /// Location reached
        location: CodeLocation,
        /// Request that fired
        request: RequestId,
    },
    /// A thread entered a method matched by a method-entry request
    MethodEntered {
        /// Suspended thread
        thread: ThreadId,
        /// Location of the method entry
        location: CodeLocation,
        /// Request that fired
        request: RequestId,
    },
    /// The debuggee terminated or the connection was lost
    Disconnected,
}

impl DebugEvent {
    /// Short name of the event kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ClassLoaded { .. } => "class-loaded",
            Self::BreakpointHit { .. } => "breakpoint-hit",
            Self::StepCompleted { .. } => "step-completed",
            Self::MethodEntered { .. } => "method-entered",
            Self::Disconnected => "disconnected",
        }
    }

    /// The suspended thread, if the event suspends one.
    pub fn thread(&self) -> Option<ThreadId> {
        match self {
            Self::BreakpointHit { thread, .. }
            | Self::StepCompleted { thread, .. }
            | Self::MethodEntered { thread, .. } => Some(*thread),
            _ => None,
        }
    }
}
