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

use std::{fmt::Display, str::FromStr};

use eyre::{bail, eyre, Error, Result};
use serde::{Deserialize, Serialize};

use crate::types::RequestId;

/// Stop policy of a breakpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BreakpointKind {
    /// Stops on every hit.
    Normal,
    /// Stops on the first hit, then removes itself.
    Once,
    /// Stops once the hit counter reaches the threshold, and on every hit after.
    OnCount(u32),
}

impl Display for BreakpointKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Once => write!(f, "once"),
            Self::OnCount(threshold) => write!(f, "on-count({threshold})"),
        }
    }
}

/// A source position a breakpoint is attached to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BreakpointLocation {
    /// Source file name.
    pub file: String,
    /// Line number in the source file (1-based).
    pub line: u32,
}

impl BreakpointLocation {
    /// Creates a new location.
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self { file: file.into(), line }
    }

    /// Returns the location with `.{extension}` appended to the file name when missing.
    ///
    /// Operators commonly type `Main` where the target reports `Main.java`.
    pub fn normalized(&self, extension: &str) -> Self {
        let suffix = format!(".{extension}");
        if self.file.ends_with(&suffix) {
            self.clone()
        } else {
            Self { file: format!("{}{suffix}", self.file), line: self.line }
        }
    }

    /// Returns the location with the `.{extension}` suffix removed from the file name.
    pub fn stripped(&self, extension: &str) -> Self {
        let suffix = format!(".{extension}");
        match self.file.strip_suffix(&suffix) {
            Some(stem) => Self { file: stem.to_string(), line: self.line },
            None => self.clone(),
        }
    }

    /// The `file:line` registry key of this location.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl Display for BreakpointLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

impl FromStr for BreakpointLocation {
    type Err = Error;

    /// Parses a location in the format `<file>:<line>`.
    fn from_str(s: &str) -> Result<Self> {
        let Some((file, line)) = s.trim().rsplit_once(':') else {
            bail!("Invalid breakpoint location format. Expected: <file>:<line>, got: {s}");
        };
        if file.is_empty() {
            bail!("Missing file name in breakpoint location: {s}");
        }
        let line = line.parse::<u32>().map_err(|e| eyre!("Invalid line number: {e}"))?;
        Ok(Self::new(file, line))
    }
}

/// A stop condition attached to a source location.
///
/// In live mode the breakpoint owns the request armed on the control interface; in
/// replay mode it is purely logical and `request` is `None`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Breakpoint {
    /// Normalized location of the breakpoint.
    pub location: BreakpointLocation,
    /// Stop policy.
    pub kind: BreakpointKind,
    /// Number of times execution reached the location. Never decreases.
    pub hit_count: u32,
    /// Live request backing the breakpoint, if any.
    pub request: Option<RequestId>,
}

impl Breakpoint {
    /// Creates a breakpoint with a zero hit counter.
    pub fn new(
        location: BreakpointLocation,
        kind: BreakpointKind,
        request: Option<RequestId>,
    ) -> Self {
        Self { location, kind, hit_count: 0, request }
    }

    /// Registers one more hit.
    pub fn record_hit(&mut self) {
        self.hit_count = self.hit_count.saturating_add(1);
    }

    /// Whether the current hit count qualifies for a stop.
    pub fn should_stop(&self) -> bool {
        match self.kind {
            BreakpointKind::Normal | BreakpointKind::Once => self.hit_count > 0,
            BreakpointKind::OnCount(threshold) => self.hit_count >= threshold,
        }
    }

    /// Whether the breakpoint removes itself after its first qualifying stop.
    pub fn is_once(&self) -> bool {
        self.kind == BreakpointKind::Once
    }
}

impl Display for Breakpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{} [{}] hits={}", self.location, self.kind, self.hit_count)?;
        if self.request.is_none() {
            write!(f, " (logical)")?;
        }
        Ok(())
    }
}
