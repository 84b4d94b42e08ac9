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

//! Breakpoint registry.
//!
//! Breakpoints are keyed by their normalized `file:line`. A breakpoint created while a
//! debuggee is attached is backed by a request armed on the control interface; one
//! created during replay is purely logical and matched by comparing keys against the
//! recorded snapshot locations.
//!
//! The registry also tracks method-entry breakpoints (`break-before-method-call`),
//! which share a single method-entry request on the control interface.

use std::collections::{BTreeMap, BTreeSet};

use rdb_common::types::{Breakpoint, BreakpointKind, BreakpointLocation, RequestId};
use tracing::{debug, warn};

use crate::{ControlInterface, DebuggerError, DebuggerResult};

/// Outcome of registering a hit on a breakpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointHit {
    /// Key of the breakpoint that was hit.
    pub key: String,
    /// Hit count after this hit.
    pub hit_count: u32,
    /// Whether execution stops here.
    pub stopped: bool,
    /// The breakpoint if it removed itself (ONCE after its qualifying stop).
    pub removed: Option<Breakpoint>,
}

/// Location-keyed set of stop conditions.
#[derive(Debug, Clone)]
pub struct BreakpointRegistry {
    entries: BTreeMap<String, Breakpoint>,
    methods: BTreeSet<String>,
    method_request: Option<RequestId>,
    extension: String,
}

impl BreakpointRegistry {
    /// Creates an empty registry normalizing file names with the given extension.
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            entries: BTreeMap::new(),
            methods: BTreeSet::new(),
            method_request: None,
            extension: extension.into(),
        }
    }

    /// Creates a breakpoint, replacing any existing one at the same location.
    ///
    /// With a control interface, the location is resolved and a live request is armed;
    /// the call fails with [`DebuggerError::NotFound`] when the line has no code. Without
    /// one, the breakpoint is logical.
    pub fn create(
        &mut self,
        file: &str,
        line: u32,
        kind: BreakpointKind,
        control: Option<&mut dyn ControlInterface>,
    ) -> DebuggerResult<&Breakpoint> {
        let raw = BreakpointLocation::new(file, line);
        let location = raw.normalized(&self.extension);
        let key = location.key();

        let request = match control {
            Some(control) => {
                let resolved = match control.resolve(&location.file, line)? {
                    Some(resolved) => Some(resolved),
                    None if raw != location => control.resolve(&raw.file, line)?,
                    None => None,
                };
                let Some(resolved) = resolved else {
                    return Err(DebuggerError::not_found(format!(
                        "No executable code found at {key}"
                    )));
                };
                let request = control.arm_breakpoint(&resolved)?;
                if let Some(previous) = self.entries.get(&key).and_then(|bp| bp.request) {
                    release(control, previous);
                }
                Some(request)
            }
            None => None,
        };

        debug!(%key, %kind, live = request.is_some(), "Breakpoint created");
        self.entries.insert(key.clone(), Breakpoint::new(location, kind, request));
        Ok(&self.entries[&key])
    }

    /// Removes the breakpoint at a location, releasing its live request.
    ///
    /// Returns whether a breakpoint was removed.
    pub fn remove(
        &mut self,
        file: &str,
        line: u32,
        control: Option<&mut dyn ControlInterface>,
    ) -> bool {
        let Some(key) = self.lookup_key(file, line) else {
            return false;
        };
        let Some(bp) = self.entries.remove(&key) else {
            return false;
        };
        if let (Some(request), Some(control)) = (bp.request, control) {
            release(control, request);
        }
        debug!(%key, "Breakpoint removed");
        true
    }

    /// Removes every line and method breakpoint, releasing live requests.
    ///
    /// Returns the number of breakpoints removed.
    pub fn clear_all(&mut self, mut control: Option<&mut dyn ControlInterface>) -> usize {
        let removed = self.entries.len() + self.methods.len();
        for bp in std::mem::take(&mut self.entries).into_values() {
            if let (Some(request), Some(control)) = (bp.request, control.as_deref_mut()) {
                release(control, request);
            }
        }
        self.methods.clear();
        if let (Some(request), Some(control)) = (self.method_request.take(), control) {
            release(control, request);
        }
        removed
    }

    /// Finds the registry key matching a location.
    ///
    /// Recorded locations and operator input do not always agree on file naming, so the
    /// raw name, the name with the source extension and the name without it are tried.
    pub fn lookup_key(&self, file: &str, line: u32) -> Option<String> {
        let raw = BreakpointLocation::new(file, line);
        [raw.clone(), raw.normalized(&self.extension), raw.stripped(&self.extension)]
            .into_iter()
            .map(|loc| loc.key())
            .find(|key| self.entries.contains_key(key))
    }

    /// Finds the breakpoint matching a location.
    pub fn lookup(&self, file: &str, line: u32) -> Option<&Breakpoint> {
        self.lookup_key(file, line).and_then(|key| self.entries.get(&key))
    }

    /// Finds the key of the breakpoint backed by a live request.
    pub fn key_for_request(&self, request: RequestId) -> Option<String> {
        self.entries.iter().find(|(_, bp)| bp.request == Some(request)).map(|(k, _)| k.clone())
    }

    /// Registers a hit on the breakpoint at `key`.
    ///
    /// A ONCE breakpoint that stops is removed from the registry and handed back in
    /// [`BreakpointHit::removed`]; releasing its live request is up to the caller.
    pub fn hit(&mut self, key: &str) -> Option<BreakpointHit> {
        let bp = self.entries.get_mut(key)?;
        bp.record_hit();
        let stopped = bp.should_stop();
        let hit_count = bp.hit_count;
        let removed = if stopped && bp.is_once() { self.entries.remove(key) } else { None };
        Some(BreakpointHit { key: key.to_string(), hit_count, stopped, removed })
    }

    /// Adds a method-entry breakpoint.
    ///
    /// With a control interface, the shared method-entry request is armed on first use.
    pub fn add_method_breakpoint(
        &mut self,
        method: &str,
        control: Option<&mut dyn ControlInterface>,
    ) -> DebuggerResult<()> {
        if let (None, Some(control)) = (self.method_request, control) {
            self.method_request = Some(control.arm_method_entry(None)?);
        }
        self.methods.insert(method.to_string());
        Ok(())
    }

    /// Whether entry into `method` is a stop condition.
    pub fn has_method_breakpoint(&self, method: &str) -> bool {
        self.methods.contains(method)
    }

    /// Names of methods with an entry breakpoint.
    pub fn method_breakpoints(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().map(String::as_str)
    }

    /// Line breakpoints ordered by key.
    pub fn iter(&self) -> impl Iterator<Item = &Breakpoint> {
        self.entries.values()
    }

    /// Number of line breakpoints.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no line or method breakpoints.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.methods.is_empty()
    }

    /// Forgets every live request. Called once the debuggee is gone, making all
    /// breakpoints logical.
    pub fn detach_requests(&mut self) {
        for bp in self.entries.values_mut() {
            bp.request = None;
        }
        self.method_request = None;
    }
}

/// Releases a live request, logging failures. A request that cannot be released is
/// left to die with the debuggee.
pub(crate) fn release(control: &mut dyn ControlInterface, request: RequestId) {
    if let Err(e) = control.disarm(request) {
        warn!(%request, "Failed to release request: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeControl;

    #[test]
    fn test_logical_breakpoint() {
        let mut registry = BreakpointRegistry::new("java");
        let bp = registry.create("A", 15, BreakpointKind::Normal, None).unwrap();
        assert_eq!(bp.location.key(), "A.java:15");
        assert!(bp.request.is_none());
        assert!(registry.lookup("A.java", 15).is_some());
        assert!(registry.lookup("A", 15).is_some());
        assert!(registry.lookup("A.java", 16).is_none());
    }

    #[test]
    fn test_live_breakpoint_resolves_and_arms() {
        let mut control = FakeControl::with_lines("A.java", &[10, 11]);
        let mut registry = BreakpointRegistry::new("java");

        let bp = registry.create("A", 10, BreakpointKind::Normal, Some(&mut control)).unwrap();
        assert!(bp.request.is_some());
        assert_eq!(control.armed_breakpoints.len(), 1);

        let err = registry.create("A.java", 12, BreakpointKind::Normal, Some(&mut control));
        assert!(matches!(err, Err(DebuggerError::NotFound(_))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_replacing_releases_previous_request() {
        let mut control = FakeControl::with_lines("A.java", &[10]);
        let mut registry = BreakpointRegistry::new("java");
        let first = registry
            .create("A.java", 10, BreakpointKind::Normal, Some(&mut control))
            .unwrap()
            .request
            .unwrap();
        registry.create("A.java", 10, BreakpointKind::Once, Some(&mut control)).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup("A.java", 10).unwrap().kind, BreakpointKind::Once);
        assert_eq!(control.disarmed, vec![first]);
    }

    #[test]
    fn test_remove_and_clear_release_requests() {
        let mut control = FakeControl::with_lines("A.java", &[1, 2, 3]);
        let mut registry = BreakpointRegistry::new("java");
        for line in 1..=3 {
            registry.create("A.java", line, BreakpointKind::Normal, Some(&mut control)).unwrap();
        }
        registry.add_method_breakpoint("run", Some(&mut control)).unwrap();

        assert!(registry.remove("A", 1, Some(&mut control)));
        assert!(!registry.remove("A", 1, Some(&mut control)));
        assert_eq!(control.disarmed.len(), 1);

        assert_eq!(registry.clear_all(Some(&mut control)), 3);
        assert!(registry.is_empty());
        assert_eq!(control.disarmed.len(), 4);
    }

    #[test]
    fn test_once_removes_itself() {
        let mut registry = BreakpointRegistry::new("java");
        registry.create("A.java", 5, BreakpointKind::Once, None).unwrap();
        let key = registry.lookup_key("A.java", 5).unwrap();

        let hit = registry.hit(&key).unwrap();
        assert!(hit.stopped);
        assert!(hit.removed.is_some());
        assert!(registry.lookup("A.java", 5).is_none());
        assert!(registry.hit(&key).is_none());
    }

    #[test]
    fn test_on_count_hits() {
        let mut registry = BreakpointRegistry::new("java");
        registry.create("A.java", 5, BreakpointKind::OnCount(3), None).unwrap();
        let key = registry.lookup_key("A.java", 5).unwrap();
        let stops: Vec<bool> = (0..4).map(|_| registry.hit(&key).unwrap().stopped).collect();
        assert_eq!(stops, vec![false, false, true, true]);
        assert_eq!(registry.lookup("A.java", 5).unwrap().hit_count, 4);
    }

    #[test]
    fn test_method_breakpoints_share_request() {
        let mut control = FakeControl::default();
        let mut registry = BreakpointRegistry::new("java");
        registry.add_method_breakpoint("a", Some(&mut control)).unwrap();
        registry.add_method_breakpoint("b", Some(&mut control)).unwrap();
        assert_eq!(control.method_entries, 1);
        assert!(registry.has_method_breakpoint("b"));
        assert_eq!(registry.method_breakpoints().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
