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

//! Execution history.
//!
//! [`History`] is the ordered sequence of recorded [`Snapshot`]s plus a cursor. While
//! recording it is append-only and the cursor follows the last snapshot; once
//! [`History::complete_recording`] has been called it is frozen and the cursor becomes
//! the replay position.
//!
//! Snapshots are stored behind [`Arc`] so results and presenters can keep a reference
//! to a step without copying its variable trees.

use std::{fmt, sync::Arc};

use rdb_common::types::Snapshot;
use tracing::debug;

use crate::{DebuggerError, DebuggerResult};

/// Number of steps shown on each side of the cursor by the window rendering.
const WINDOW_RADIUS: usize = 5;

/// Ordered, navigable collection of snapshots.
#[derive(Debug, Clone, Default)]
pub struct History {
    snapshots: Vec<Arc<Snapshot>>,
    /// Always a valid index when `snapshots` is non-empty.
    cursor: usize,
    recording_complete: bool,
}

impl History {
    /// Creates an empty history open for recording.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a snapshot and moves the cursor onto it.
    ///
    /// Fails once the recording has been completed.
    pub fn add(&mut self, snapshot: Snapshot) -> DebuggerResult<()> {
        if self.recording_complete {
            return Err(DebuggerError::illegal_state("Recording is complete; history is frozen"));
        }
        debug_assert_eq!(snapshot.seq, self.snapshots.len());
        self.snapshots.push(Arc::new(snapshot));
        self.cursor = self.snapshots.len() - 1;
        Ok(())
    }

    /// Sequence number the next recorded snapshot must carry.
    pub fn next_seq(&self) -> usize {
        self.snapshots.len()
    }

    /// Freezes the history and rewinds the cursor to the first step.
    pub fn complete_recording(&mut self) {
        self.recording_complete = true;
        self.cursor = 0;
        debug!(steps = self.snapshots.len(), "Recording completed");
    }

    /// Whether recording has been completed.
    pub fn is_recording_complete(&self) -> bool {
        self.recording_complete
    }

    /// Moves the cursor one step forward. Returns whether it moved.
    pub fn forward(&mut self) -> bool {
        if self.has_next() {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    /// Moves the cursor one step back. Returns whether it moved.
    pub fn back(&mut self) -> bool {
        if self.has_previous() {
            self.cursor -= 1;
            true
        } else {
            false
        }
    }

    /// Moves the cursor to step `n`. Returns `false` and leaves the cursor untouched
    /// when `n` is out of range.
    pub fn go_to_step(&mut self, n: usize) -> bool {
        if n < self.snapshots.len() {
            self.cursor = n;
            true
        } else {
            false
        }
    }

    /// Moves the cursor to the first step.
    pub fn go_to_start(&mut self) {
        self.cursor = 0;
    }

    /// Moves the cursor to the last step.
    pub fn go_to_end(&mut self) {
        self.cursor = self.snapshots.len().saturating_sub(1);
    }

    /// Whether a step exists after the cursor.
    pub fn has_next(&self) -> bool {
        self.cursor + 1 < self.snapshots.len()
    }

    /// Whether a step exists before the cursor.
    pub fn has_previous(&self) -> bool {
        self.cursor > 0 && !self.snapshots.is_empty()
    }

    /// Snapshot under the cursor.
    pub fn current(&self) -> Option<&Arc<Snapshot>> {
        self.snapshots.get(self.cursor)
    }

    /// Cursor position, `None` when the history is empty.
    pub fn cursor(&self) -> Option<usize> {
        (!self.snapshots.is_empty()).then_some(self.cursor)
    }

    /// Snapshot at step `n`.
    pub fn get(&self, n: usize) -> Option<&Arc<Snapshot>> {
        self.snapshots.get(n)
    }

    /// Iterates over all steps in order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Snapshot>> {
        self.snapshots.iter()
    }

    /// Number of recorded steps.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Debuggee output produced up to and including the cursor step.
    pub fn output_until_cursor(&self) -> String {
        match self.cursor() {
            Some(cursor) => self.snapshots[..=cursor].iter().map(|s| s.output.as_str()).collect(),
            None => String::new(),
        }
    }
}

impl fmt::Display for History {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.snapshots.is_empty() {
            return writeln!(f, "No execution history recorded");
        }

        writeln!(f, "=== Execution History ===")?;
        writeln!(f, "Total steps: {}", self.snapshots.len())?;
        writeln!(f, "Current position: {}", self.cursor)?;
        let status = if self.recording_complete { "Complete" } else { "In progress" };
        writeln!(f, "Recording: {status}")?;
        writeln!(f)?;

        let start = self.cursor.saturating_sub(WINDOW_RADIUS);
        let end = (self.cursor + WINDOW_RADIUS + 1).min(self.snapshots.len());
        for (i, snapshot) in self.snapshots[start..end].iter().enumerate() {
            let marker = if start + i == self.cursor { " >>> " } else { "     " };
            writeln!(f, "{marker}{snapshot}")?;
        }
        if end < self.snapshots.len() {
            writeln!(f, "     ... ({} more steps)", self.snapshots.len() - end)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::snapshot_at;

    fn recorded(n: usize) -> History {
        let mut history = History::new();
        for i in 0..n {
            history.add(snapshot_at(i, "A.java", 10 + i as u32, 1)).unwrap();
        }
        history
    }

    #[test]
    fn test_add_tracks_size_and_cursor() {
        let mut history = History::new();
        assert_eq!(history.cursor(), None);
        for i in 0..7 {
            history.add(snapshot_at(i, "A.java", 1, 1)).unwrap();
            assert_eq!(history.len(), i + 1);
            assert_eq!(history.cursor(), Some(i));
        }
    }

    #[test]
    fn test_complete_recording_freezes() {
        let mut history = recorded(3);
        history.complete_recording();
        assert!(history.is_recording_complete());
        assert_eq!(history.cursor(), Some(0));
        assert!(matches!(
            history.add(snapshot_at(3, "A.java", 1, 1)),
            Err(DebuggerError::IllegalState(_))
        ));
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_bounds_are_idempotent() {
        let mut history = recorded(4);
        history.complete_recording();
        assert!(!history.back());
        assert_eq!(history.cursor(), Some(0));

        history.go_to_end();
        assert!(!history.forward());
        assert_eq!(history.cursor(), Some(3));
    }

    #[test]
    fn test_go_to_step_range() {
        let mut history = recorded(5);
        history.complete_recording();
        assert!(history.go_to_step(4));
        assert_eq!(history.cursor(), Some(4));
        assert!(!history.go_to_step(5));
        assert_eq!(history.cursor(), Some(4));
        assert!(history.go_to_step(0));
    }

    #[test]
    fn test_forward_reaches_end() {
        let n = 9;
        let mut history = recorded(n);
        history.complete_recording();
        for _ in 0..n - 1 {
            assert!(history.forward());
        }
        let walked = history.current().cloned();
        history.go_to_start();
        history.go_to_end();
        assert_eq!(history.current().cloned(), walked);
        assert!(!history.has_next());
        assert!(history.has_previous());
    }

    #[test]
    fn test_empty_navigation() {
        let mut history = History::new();
        assert!(!history.forward());
        assert!(!history.back());
        assert!(!history.go_to_step(0));
        history.go_to_end();
        assert!(history.current().is_none());
        assert_eq!(history.to_string(), "No execution history recorded\n");
    }

    #[test]
    fn test_window_rendering() {
        let mut history = recorded(20);
        history.complete_recording();
        history.go_to_step(2);
        let text = history.to_string();
        assert!(text.contains("Total steps: 20"));
        assert!(text.contains("Recording: Complete"));
        assert!(text.contains(" >>> Step #2: A.java:12"));
        assert!(text.contains("     Step #7: A.java:17"));
        assert!(!text.contains("Step #8:"));
        assert!(text.contains("... (12 more steps)"));
    }

    #[test]
    fn test_output_until_cursor() {
        let mut history = History::new();
        for i in 0..3 {
            let mut s = snapshot_at(i, "A.java", 1, 1);
            s.output = format!("line{i}\n");
            history.add(s).unwrap();
        }
        history.complete_recording();
        history.forward();
        assert_eq!(history.output_until_cursor(), "line0\nline1\n");
    }
}
