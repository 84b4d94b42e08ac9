//! Test helpers shared by the engine's unit tests.

use std::{
    collections::{HashMap, VecDeque},
    io::Read,
};

use chrono::Utc;
use rdb_common::types::{
    CodeLocation, DebugEvent, FrameInfo, ObjectContents, ObjectId, RequestId, Snapshot,
    SourceLocation, StackFrameSnapshot, StepRequest, ThreadId,
};

use crate::{ControlError, ControlInterface, DebuggerState, EngineConfig, Mode};

/// Builds a snapshot at `file:line` with `depth` frames of class `A`, method `run`.
pub(crate) fn snapshot_at(seq: usize, file: &str, line: u32, depth: usize) -> Snapshot {
    let frames = (0..depth)
        .map(|index| StackFrameSnapshot {
            index,
            class_name: "A".into(),
            method_name: if index + 1 == depth { "main".into() } else { format!("run{index}") },
            file: file.into(),
            line: if index == 0 { line } else { 1 },
            receiver: None,
            variables: Vec::new(),
        })
        .collect::<Vec<_>>();
    let method_name = frames.first().map(|f| f.method_name.clone()).unwrap_or_default();
    Snapshot {
        seq,
        location: SourceLocation::new(file, line),
        class_name: "A".into(),
        method_name,
        frames,
        output: String::new(),
        captured_at: Utc::now(),
    }
}

/// A completed recording in replay mode, one snapshot per `(line, depth)` pair.
pub(crate) fn replay_state(steps: &[(u32, usize)]) -> DebuggerState {
    let mut state = DebuggerState::new(Mode::Recording, EngineConfig::default());
    for (seq, (line, depth)) in steps.iter().enumerate() {
        state.history.add(snapshot_at(seq, "A.java", *line, *depth)).unwrap();
    }
    state.history.complete_recording();
    state.mode = Mode::Replay;
    state
}

/// Control interface double that records every request.
#[derive(Debug, Default)]
pub(crate) struct FakeControl {
    pub lines: HashMap<String, Vec<u32>>,
    pub armed_breakpoints: Vec<CodeLocation>,
    pub steps: Vec<StepRequest>,
    pub method_entries: usize,
    pub disarmed: Vec<RequestId>,
    pub frames: Vec<FrameInfo>,
    pub objects: HashMap<ObjectId, ObjectContents>,
    pub inspections: usize,
    pub events: VecDeque<Vec<DebugEvent>>,
    pub resumed: usize,
    pub exited: bool,
    /// The target exits as soon as a source line is resolved.
    pub exit_on_resolve: bool,
    next_id: u64,
}

impl FakeControl {
    pub(crate) fn with_lines(file: &str, lines: &[u32]) -> Self {
        let mut control = Self::default();
        control.lines.insert(file.to_string(), lines.to_vec());
        control
    }

    fn next_request(&mut self) -> RequestId {
        self.next_id += 1;
        RequestId(self.next_id)
    }

    fn alive(&self) -> Result<(), ControlError> {
        if self.exited {
            Err(ControlError::TargetExited)
        } else {
            Ok(())
        }
    }
}

impl ControlInterface for FakeControl {
    fn resolve(&mut self, file: &str, line: u32) -> Result<Option<CodeLocation>, ControlError> {
        if self.exit_on_resolve {
            self.exited = true;
        }
        self.alive()?;
        let found = self.lines.get(file).is_some_and(|lines| lines.contains(&line));
        Ok(found.then(|| CodeLocation::new("A", "run", file, line)))
    }

    fn arm_breakpoint(&mut self, location: &CodeLocation) -> Result<RequestId, ControlError> {
        self.alive()?;
        self.armed_breakpoints.push(location.clone());
        Ok(self.next_request())
    }

    fn arm_step(&mut self, request: StepRequest) -> Result<RequestId, ControlError> {
        self.alive()?;
        self.steps.push(request);
        Ok(self.next_request())
    }

    fn arm_method_entry(&mut self, _class_filter: Option<&str>) -> Result<RequestId, ControlError> {
        self.alive()?;
        self.method_entries += 1;
        Ok(self.next_request())
    }

    fn disarm(&mut self, request: RequestId) -> Result<(), ControlError> {
        self.disarmed.push(request);
        Ok(())
    }

    fn next_event_batch(&mut self) -> Result<Vec<DebugEvent>, ControlError> {
        Ok(self.events.pop_front().unwrap_or_else(|| vec![DebugEvent::Disconnected]))
    }

    fn resume(&mut self) -> Result<(), ControlError> {
        self.alive()?;
        self.resumed += 1;
        Ok(())
    }

    fn detach(&mut self) -> Result<(), ControlError> {
        Ok(())
    }

    fn thread_frames(&mut self, _thread: ThreadId) -> Result<Vec<FrameInfo>, ControlError> {
        self.alive()?;
        Ok(self.frames.clone())
    }

    fn inspect_object(
        &mut self,
        id: ObjectId,
        limit: usize,
    ) -> Result<ObjectContents, ControlError> {
        self.alive()?;
        self.inspections += 1;
        match self.objects.get(&id) {
            Some(ObjectContents::Elements { total, items }) => Ok(ObjectContents::Elements {
                total: *total,
                items: items.iter().take(limit).cloned().collect(),
            }),
            Some(contents) => Ok(contents.clone()),
            None => Err(ControlError::InvalidObject(id)),
        }
    }

    fn take_output(&mut self) -> Option<Box<dyn Read + Send>> {
        None
    }
}
