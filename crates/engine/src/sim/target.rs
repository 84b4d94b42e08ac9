//! The simulated debuggee.

use std::{
    collections::HashMap,
    io::{self, Read},
    sync::mpsc::{self, Receiver, Sender},
};

use eyre::Result;
use rdb_common::types::{
    Binding, CodeLocation, DebugEvent, FieldSlot, FrameInfo, ObjectContents, ObjectId,
    RemoteValue, RequestId, StepDepth, StepRequest, ThreadId,
};
use tracing::{debug, trace, warn};

use super::program::{ClassDef, Expr, MethodDef, Op, Program};
use crate::{ControlError, ControlInterface};

/// The only thread of a simulated program.
pub const MAIN_THREAD: ThreadId = ThreadId(1);

const MAX_FRAMES: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Null,
    Int(i64),
    Bool(bool),
    Ref(ObjectId),
    Opaque,
}

#[derive(Debug)]
enum HeapObject {
    Instance { class: String, fields: Vec<(String, Value)> },
    Array { element_type: String, items: Vec<Value> },
    Str(String),
}

#[derive(Debug)]
struct Frame {
    class: usize,
    method: usize,
    pc: usize,
    this: Option<ObjectId>,
    params: usize,
    locals: Vec<(String, Value)>,
    /// Whether events for the current position were already delivered
    reported: bool,
    /// Whether the frame was just pushed and method-entry events are pending
    entering: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Fresh,
    Running,
    Exited,
}

#[derive(Debug)]
struct ActiveStep {
    id: RequestId,
    request: StepRequest,
    origin_depth: usize,
}

/// A runtime fault that terminates the simulated program.
#[derive(Debug)]
struct Fault(String);

/// Stdout of the simulated program, readable from another thread.
#[derive(Debug)]
pub struct ChannelReader {
    rx: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    pos: usize,
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos >= self.pending.len() {
            match self.rx.recv() {
                Ok(chunk) => {
                    self.pending = chunk;
                    self.pos = 0;
                }
                Err(_) => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len() - self.pos);
        buf[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// In-process implementation of [`ControlInterface`] executing a [`Program`].
#[derive(Debug)]
pub struct SimTarget {
    program: Program,
    phase: Phase,
    suspended: bool,
    frames: Vec<Frame>,
    heap: HashMap<ObjectId, HeapObject>,
    next_object: u64,
    next_request: u64,
    breakpoints: HashMap<RequestId, CodeLocation>,
    method_entries: HashMap<RequestId, Option<String>>,
    step: Option<ActiveStep>,
    executed: usize,
    detached: bool,
    stdout: Option<Sender<Vec<u8>>>,
    output: Option<ChannelReader>,
}

impl SimTarget {
    /// Creates a target that will run `program` from its entry routine.
    pub fn new(program: Program) -> Result<Self> {
        program.validate()?;
        let (tx, rx) = mpsc::channel();
        Ok(Self {
            program,
            phase: Phase::Fresh,
            suspended: false,
            frames: Vec::new(),
            heap: HashMap::new(),
            next_object: 0,
            next_request: 0,
            breakpoints: HashMap::new(),
            method_entries: HashMap::new(),
            step: None,
            executed: 0,
            detached: false,
            stdout: Some(tx),
            output: Some(ChannelReader { rx, pending: Vec::new(), pos: 0 }),
        })
    }

    /// Number of statements executed so far.
    pub fn executed(&self) -> usize {
        self.executed
    }

    /// Whether the program has terminated.
    pub fn has_exited(&self) -> bool {
        self.phase == Phase::Exited
    }

    fn class_index(&self, name: &str) -> Option<usize> {
        self.program.classes.iter().position(|c| c.name == name)
    }

    fn class_def(&self, frame: &Frame) -> &ClassDef {
        &self.program.classes[frame.class]
    }

    fn method_def(&self, frame: &Frame) -> &MethodDef {
        &self.program.classes[frame.class].methods[frame.method]
    }

    fn location(&self, frame: &Frame) -> CodeLocation {
        let class = self.class_def(frame);
        let method = self.method_def(frame);
        let line = method
            .body
            .get(frame.pc)
            .or_else(|| method.body.last())
            .map_or(0, |stmt| stmt.line);
        CodeLocation::new(&class.name, &method.name, &class.source_file, line)
    }

    fn request_id(&mut self) -> RequestId {
        self.next_request += 1;
        RequestId(self.next_request)
    }

    fn alloc(&mut self, object: HeapObject) -> ObjectId {
        self.next_object += 1;
        let id = ObjectId(self.next_object);
        self.heap.insert(id, object);
        id
    }

    fn ensure_alive(&self) -> Result<(), ControlError> {
        if self.detached {
            return Err(ControlError::Detached);
        }
        match self.phase {
            Phase::Exited => Err(ControlError::TargetExited),
            _ => Ok(()),
        }
    }

    fn ensure_suspended(&self, thread: ThreadId) -> Result<(), ControlError> {
        self.ensure_alive()?;
        if thread != MAIN_THREAD {
            return Err(ControlError::InvalidThread(thread));
        }
        if !self.suspended {
            return Err(ControlError::Rejected(format!("{thread} is not suspended")));
        }
        Ok(())
    }

    fn start(&mut self) -> Vec<DebugEvent> {
        let entry_class = self.program.entry_class.clone();
        let mut events = vec![DebugEvent::ClassLoaded { class_name: entry_class.clone() }];
        events.extend(
            self.program
                .classes
                .iter()
                .filter(|c| c.name != entry_class)
                .map(|c| DebugEvent::ClassLoaded { class_name: c.name.clone() }),
        );

        let class = self.class_index(&entry_class).unwrap_or_default();
        let method = self.program.classes[class]
            .methods
            .iter()
            .position(|m| m.name == self.program.entry_method)
            .unwrap_or_default();
        self.frames.push(Frame {
            class,
            method,
            pc: 0,
            this: None,
            params: 0,
            locals: Vec::new(),
            reported: false,
            entering: true,
        });
        self.phase = Phase::Running;
        debug!(class = %entry_class, "Simulated program started");
        events
    }

    /// Runs until the next batch of events, or until the program ends.
    fn advance(&mut self) -> Vec<DebugEvent> {
        loop {
            let Some(top) = self.frames.last() else {
                self.exit();
                return vec![DebugEvent::Disconnected];
            };
            if top.pc >= self.method_def(top).body.len() {
                self.frames.pop();
                continue;
            }
            if !top.reported {
                let events = self.arrival_events();
                if let Some(top) = self.frames.last_mut() {
                    top.reported = true;
                    top.entering = false;
                }
                if !events.is_empty() {
                    return events;
                }
            }
            if self.executed >= self.program.max_steps {
                warn!(limit = self.program.max_steps, "Simulated program hit its step limit");
                self.exit();
                return vec![DebugEvent::Disconnected];
            }
            if let Err(Fault(message)) = self.execute() {
                self.print(&format!("Exception in thread \"main\" {message}"));
                self.exit();
                return vec![DebugEvent::Disconnected];
            }
        }
    }

    /// Events raised by arriving at the top frame's current position.
    fn arrival_events(&mut self) -> Vec<DebugEvent> {
        let Some(top) = self.frames.last() else {
            return Vec::new();
        };
        let location = self.location(top);
        let depth = self.frames.len();
        let mut events = Vec::new();

        if top.entering {
            let mut entries = self
                .method_entries
                .iter()
                .filter(|(_, filter)| filter.as_deref().is_none_or(|c| c == location.class_name))
                .map(|(id, _)| *id)
                .collect::<Vec<_>>();
            entries.sort();
            events.extend(entries.into_iter().map(|request| DebugEvent::MethodEntered {
                thread: MAIN_THREAD,
                location: location.clone(),
                request,
            }));
        }

        let mut hits = self
            .breakpoints
            .iter()
            .filter(|(_, at)| at.source_file == location.source_file && at.line == location.line)
            .map(|(id, _)| *id)
            .collect::<Vec<_>>();
        hits.sort();
        events.extend(hits.into_iter().map(|request| DebugEvent::BreakpointHit {
            thread: MAIN_THREAD,
            location: location.clone(),
            request,
        }));

        let step_fires = self.step.as_ref().is_some_and(|step| {
            let deep_enough = match step.request.depth {
                StepDepth::Into => true,
                StepDepth::Over => depth <= step.origin_depth,
            };
            deep_enough && !step.request.excludes(&location.class_name)
        });
        if step_fires {
            if let Some(step) = self.step.take() {
                events.push(DebugEvent::StepCompleted {
                    thread: MAIN_THREAD,
                    location: location.clone(),
                    request: step.id,
                });
            }
        }

        if !events.is_empty() {
            trace!(%location, count = events.len(), "Suspending");
        }
        events
    }

    fn execute(&mut self) -> Result<(), Fault> {
        let frame_index = self.frames.len() - 1;
        let (class, method, pc) = {
            let top = &self.frames[frame_index];
            (top.class, top.method, top.pc)
        };
        let op = self.program.classes[class].methods[method].body[pc].op.clone();
        {
            let top = &mut self.frames[frame_index];
            top.pc += 1;
            top.reported = false;
        }
        self.executed += 1;

        match op {
            Op::Let { var, value } => {
                let value = self.eval(&value)?;
                self.assign(&var, value);
            }
            Op::New { var, class } => {
                let Some(def) = self.program.class(&class) else {
                    return Err(Fault(format!("NoClassDefFoundError: {class}")));
                };
                let fields = def
                    .fields
                    .iter()
                    .map(|f| (f.name.clone(), default_value(&f.type_name)))
                    .collect();
                let id = self.alloc(HeapObject::Instance { class, fields });
                self.assign(&var, Value::Ref(id));
            }
            Op::Array { var, element_type, items } => {
                let items = items.iter().map(|e| self.eval(e)).collect::<Result<Vec<_>, _>>()?;
                let id = self.alloc(HeapObject::Array { element_type, items });
                self.assign(&var, Value::Ref(id));
            }
            Op::Set { object, field, value } => {
                let target = self.object_ref(&object)?;
                let value = self.eval(&value)?;
                match self.heap.get_mut(&target) {
                    Some(HeapObject::Instance { fields, .. }) => {
                        match fields.iter_mut().find(|(name, _)| *name == field) {
                            Some(slot) => slot.1 = value,
                            None => return Err(Fault(format!("NoSuchFieldError: {field}"))),
                        }
                    }
                    _ => return Err(Fault(format!("NoSuchFieldError: {field}"))),
                }
            }
            Op::Call { method, receiver, class, args } => {
                let args = args.iter().map(|e| self.eval(e)).collect::<Result<Vec<_>, _>>()?;
                self.call(&method, receiver.as_deref(), class.as_deref(), args)?;
            }
            Op::Print(expr) => {
                let value = self.eval(&expr)?;
                let text = self.display(&value);
                self.print(&text);
            }
        }
        Ok(())
    }

    fn call(
        &mut self,
        method: &str,
        receiver: Option<&str>,
        class: Option<&str>,
        args: Vec<Value>,
    ) -> Result<(), Fault> {
        if self.frames.len() >= MAX_FRAMES {
            return Err(Fault("java.lang.StackOverflowError".into()));
        }
        let (class_name, this) = match receiver {
            Some(var) => {
                let id = self.object_ref(var)?;
                match self.heap.get(&id) {
                    Some(HeapObject::Instance { class, .. }) => (class.clone(), Some(id)),
                    _ => return Err(Fault(format!("{var} has no method {method}"))),
                }
            }
            None => {
                let current = self.frames.last().map(|f| self.class_def(f).name.clone());
                match class.map(str::to_string).or(current) {
                    Some(name) => (name, None),
                    None => return Err(Fault(format!("No class for call to {method}"))),
                }
            }
        };

        let class_index = self
            .class_index(&class_name)
            .ok_or_else(|| Fault(format!("NoClassDefFoundError: {class_name}")))?;
        let def = &self.program.classes[class_index];
        let method_index = def
            .methods
            .iter()
            .position(|m| m.name == method)
            .ok_or_else(|| Fault(format!("NoSuchMethodError: {class_name}.{method}")))?;
        let params = &def.methods[method_index].params;
        if params.len() != args.len() {
            return Err(Fault(format!(
                "IllegalArgumentException: {class_name}.{method} takes {} arguments",
                params.len()
            )));
        }
        let locals = params.iter().cloned().zip(args).collect::<Vec<_>>();

        self.frames.push(Frame {
            class: class_index,
            method: method_index,
            pc: 0,
            this,
            params: locals.len(),
            locals,
            reported: false,
            entering: true,
        });
        Ok(())
    }

    fn assign(&mut self, var: &str, value: Value) {
        let Some(top) = self.frames.last_mut() else {
            return;
        };
        match top.locals.iter_mut().find(|(name, _)| name == var) {
            Some(slot) => slot.1 = value,
            None => top.locals.push((var.to_string(), value)),
        }
    }

    fn lookup(&self, var: &str) -> Result<Value, Fault> {
        let Some(top) = self.frames.last() else {
            return Err(Fault(format!("Unknown variable {var}")));
        };
        if var == "this" {
            return top
                .this
                .map(Value::Ref)
                .ok_or_else(|| Fault("Cannot use this in a static context".into()));
        }
        top.locals
            .iter()
            .find(|(name, _)| name == var)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| Fault(format!("Unknown variable {var}")))
    }

    fn object_ref(&self, var: &str) -> Result<ObjectId, Fault> {
        match self.lookup(var)? {
            Value::Ref(id) => Ok(id),
            _ => Err(Fault(format!("java.lang.NullPointerException: {var} is not an object"))),
        }
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, Fault> {
        Ok(match expr {
            Expr::Int(n) => Value::Int(*n),
            Expr::Bool(b) => Value::Bool(*b),
            Expr::Str(s) => Value::Ref(self.alloc(HeapObject::Str(s.clone()))),
            Expr::Var(name) => self.lookup(name)?,
            Expr::Field(var, field) => {
                let id = self.object_ref(var)?;
                match self.heap.get(&id) {
                    Some(HeapObject::Instance { fields, .. }) => fields
                        .iter()
                        .find(|(name, _)| name == field)
                        .map(|(_, value)| value.clone())
                        .ok_or_else(|| Fault(format!("NoSuchFieldError: {field}")))?,
                    _ => return Err(Fault(format!("NoSuchFieldError: {field}"))),
                }
            }
            Expr::Add(lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                match (&lhs, &rhs) {
                    (Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_add(*b)),
                    _ if self.is_string(&lhs) || self.is_string(&rhs) => {
                        let text = format!("{}{}", self.display(&lhs), self.display(&rhs));
                        Value::Ref(self.alloc(HeapObject::Str(text)))
                    }
                    _ => return Err(Fault("ArithmeticException: operands are not numbers".into())),
                }
            }
            Expr::Null => Value::Null,
            Expr::Opaque => Value::Opaque,
        })
    }

    fn is_string(&self, value: &Value) -> bool {
        matches!(value, Value::Ref(id) if matches!(self.heap.get(id), Some(HeapObject::Str(_))))
    }

    /// Text of a value as the program prints it.
    fn display(&self, value: &Value) -> String {
        match value {
            Value::Ref(id) => match self.heap.get(id) {
                Some(HeapObject::Str(s)) => s.clone(),
                _ => self.remote(value).render(),
            },
            _ => self.remote(value).render(),
        }
    }

    fn remote(&self, value: &Value) -> RemoteValue {
        match value {
            Value::Null => RemoteValue::Null,
            Value::Int(n) => RemoteValue::primitive("int", n),
            Value::Bool(b) => RemoteValue::primitive("boolean", b),
            Value::Opaque => RemoteValue::primitive("?", "?"),
            Value::Ref(id) => match self.heap.get(id) {
                Some(HeapObject::Str(s)) => RemoteValue::Str { id: *id, value: s.clone() },
                Some(HeapObject::Instance { class, .. }) => {
                    RemoteValue::Object { id: *id, type_name: class.clone() }
                }
                Some(HeapObject::Array { element_type, items }) => RemoteValue::Array {
                    id: *id,
                    type_name: format!("{element_type}[]"),
                    length: items.len(),
                },
                None => RemoteValue::Null,
            },
        }
    }

    fn frame_info(&self, frame: &Frame) -> FrameInfo {
        FrameInfo {
            location: self.location(frame),
            this_object: frame.this.map(|id| self.remote(&Value::Ref(id))),
            bindings: frame
                .locals
                .iter()
                .enumerate()
                .map(|(i, (name, value))| {
                    let value = self.remote(value);
                    Binding {
                        name: name.clone(),
                        type_name: value.type_name().to_string(),
                        value,
                        is_argument: i < frame.params,
                    }
                })
                .collect(),
        }
    }

    fn print(&mut self, line: &str) {
        if let Some(stdout) = &self.stdout {
            let _ = stdout.send(format!("{line}\n").into_bytes());
        }
    }

    fn exit(&mut self) {
        if self.phase != Phase::Exited {
            debug!(executed = self.executed, "Simulated program exited");
        }
        self.phase = Phase::Exited;
        self.suspended = false;
        self.frames.clear();
        self.step = None;
        // Closing stdout ends the reader side.
        self.stdout = None;
    }
}

fn default_value(type_name: &str) -> Value {
    match type_name {
        "int" | "long" | "short" | "byte" => Value::Int(0),
        "boolean" => Value::Bool(false),
        _ => Value::Null,
    }
}

impl ControlInterface for SimTarget {
    fn resolve(&mut self, file: &str, line: u32) -> Result<Option<CodeLocation>, ControlError> {
        Ok(self
            .program
            .classes
            .iter()
            .filter(|c| c.source_file == file)
            .find_map(|c| {
                c.method_at(line)
                    .map(|m| CodeLocation::new(&c.name, &m.name, &c.source_file, line))
            }))
    }

    fn arm_breakpoint(&mut self, location: &CodeLocation) -> Result<RequestId, ControlError> {
        self.ensure_alive()?;
        let id = self.request_id();
        self.breakpoints.insert(id, location.clone());
        Ok(id)
    }

    fn arm_step(&mut self, request: StepRequest) -> Result<RequestId, ControlError> {
        self.ensure_alive()?;
        if request.thread != MAIN_THREAD {
            return Err(ControlError::InvalidThread(request.thread));
        }
        let id = self.request_id();
        self.step = Some(ActiveStep { id, request, origin_depth: self.frames.len() });
        Ok(id)
    }

    fn arm_method_entry(&mut self, class_filter: Option<&str>) -> Result<RequestId, ControlError> {
        self.ensure_alive()?;
        let id = self.request_id();
        self.method_entries.insert(id, class_filter.map(str::to_string));
        Ok(id)
    }

    fn disarm(&mut self, request: RequestId) -> Result<(), ControlError> {
        self.breakpoints.remove(&request);
        self.method_entries.remove(&request);
        if self.step.as_ref().is_some_and(|s| s.id == request) {
            self.step = None;
        }
        Ok(())
    }

    fn next_event_batch(&mut self) -> Result<Vec<DebugEvent>, ControlError> {
        if self.suspended {
            return Err(ControlError::Rejected("the target is suspended".into()));
        }
        let events = match self.phase {
            Phase::Exited => return Ok(vec![DebugEvent::Disconnected]),
            Phase::Fresh => self.start(),
            Phase::Running => self.advance(),
        };
        self.suspended = self.phase == Phase::Running;
        Ok(events)
    }

    fn resume(&mut self) -> Result<(), ControlError> {
        self.ensure_alive()?;
        self.suspended = false;
        Ok(())
    }

    fn detach(&mut self) -> Result<(), ControlError> {
        self.breakpoints.clear();
        self.method_entries.clear();
        self.step = None;
        self.suspended = false;
        self.detached = true;
        if self.phase == Phase::Fresh {
            self.start();
        }
        while self.phase == Phase::Running {
            self.advance();
        }
        Ok(())
    }

    fn thread_frames(&mut self, thread: ThreadId) -> Result<Vec<FrameInfo>, ControlError> {
        self.ensure_suspended(thread)?;
        Ok(self.frames.iter().rev().map(|f| self.frame_info(f)).collect())
    }

    fn inspect_object(
        &mut self,
        id: ObjectId,
        limit: usize,
    ) -> Result<ObjectContents, ControlError> {
        self.ensure_alive()?;
        if !self.suspended {
            return Err(ControlError::Rejected("the target is running".into()));
        }
        let Some(object) = self.heap.get(&id) else {
            return Err(ControlError::InvalidObject(id));
        };
        Ok(match object {
            HeapObject::Instance { class, fields } => {
                let declared =
                    self.program.class(class).map(|c| c.fields.as_slice()).unwrap_or_default();
                ObjectContents::Fields(
                    fields
                        .iter()
                        .map(|(name, value)| FieldSlot {
                            name: name.clone(),
                            type_name: declared
                                .iter()
                                .find(|f| f.name == *name)
                                .map_or_else(|| "Object".to_string(), |f| f.type_name.clone()),
                            value: match value {
                                Value::Opaque => Err("value not readable".to_string()),
                                other => Ok(self.remote(other)),
                            },
                        })
                        .collect(),
                )
            }
            HeapObject::Array { items, .. } => ObjectContents::Elements {
                total: items.len(),
                items: items.iter().take(limit).map(|v| self.remote(v)).collect(),
            },
            HeapObject::Str(_) => ObjectContents::Fields(Vec::new()),
        })
    }

    fn take_output(&mut self) -> Option<Box<dyn Read + Send>> {
        self.output.take().map(|reader| Box::new(reader) as Box<dyn Read + Send>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo() -> SimTarget {
        SimTarget::new(Program::demo().unwrap()).unwrap()
    }

    fn step(target: &mut SimTarget, depth: StepDepth) -> Vec<DebugEvent> {
        target
            .arm_step(StepRequest { thread: MAIN_THREAD, depth, exclusions: Vec::new() })
            .unwrap();
        target.resume().unwrap();
        target.next_event_batch().unwrap()
    }

    fn line_of(events: &[DebugEvent]) -> Option<(String, u32)> {
        events.iter().find_map(|e| match e {
            DebugEvent::StepCompleted { location, .. }
            | DebugEvent::BreakpointHit { location, .. }
            | DebugEvent::MethodEntered { location, .. } => {
                Some((location.method_name.clone(), location.line))
            }
            _ => None,
        })
    }

    fn enter_main(target: &mut SimTarget) {
        let loaded = target.next_event_batch().unwrap();
        assert_eq!(loaded[0], DebugEvent::ClassLoaded { class_name: "Main".into() });
        assert_eq!(loaded.len(), 3);
        target.arm_method_entry(Some("Main")).unwrap();
        target.resume().unwrap();
        let entered = target.next_event_batch().unwrap();
        assert_eq!(line_of(&entered), Some(("main".into(), 3)));
    }

    #[test]
    fn test_step_into_and_over() {
        let mut target = demo();
        enter_main(&mut target);
        assert_eq!(line_of(&step(&mut target, StepDepth::Into)), Some(("main".into(), 4)));
        step(&mut target, StepDepth::Into);
        assert_eq!(line_of(&step(&mut target, StepDepth::Into)), Some(("main".into(), 6)));
        // into add()
        assert_eq!(line_of(&step(&mut target, StepDepth::Into)), Some(("add".into(), 4)));
        assert_eq!(target.thread_frames(MAIN_THREAD).unwrap().len(), 2);
        // over the rest of add() and back in main
        step(&mut target, StepDepth::Over);
        step(&mut target, StepDepth::Over);
        assert_eq!(line_of(&step(&mut target, StepDepth::Over)), Some(("main".into(), 7)));
        assert_eq!(line_of(&step(&mut target, StepDepth::Over)), Some(("main".into(), 8)));
    }

    #[test]
    fn test_step_exclusions() {
        let mut target = demo();
        enter_main(&mut target);
        for _ in 0..3 {
            step(&mut target, StepDepth::Into);
        }
        target
            .arm_step(StepRequest {
                thread: MAIN_THREAD,
                depth: StepDepth::Into,
                exclusions: vec!["Count*".into()],
            })
            .unwrap();
        target.resume().unwrap();
        let events = target.next_event_batch().unwrap();
        assert_eq!(line_of(&events), Some(("main".into(), 7)));
    }

    #[test]
    fn test_breakpoints_and_frames() {
        let mut target = demo();
        let location = target.resolve("Counter.java", 5).unwrap().unwrap();
        assert_eq!(location.method_name, "add");
        assert!(target.resolve("Counter.java", 1).unwrap().is_none());
        let request = target.arm_breakpoint(&location).unwrap();

        target.next_event_batch().unwrap();
        target.resume().unwrap();
        let events = target.next_event_batch().unwrap();
        assert!(matches!(
            &events[0],
            DebugEvent::BreakpointHit { request: r, .. } if *r == request
        ));

        let frames = target.thread_frames(MAIN_THREAD).unwrap();
        assert_eq!(frames[0].location.line, 5);
        assert_eq!(frames[1].location.method_name, "main");
        let this = frames[0].this_object.clone().unwrap();
        assert_eq!(this.type_name(), "Counter");
        let amount = &frames[0].bindings[0];
        assert_eq!((amount.name.as_str(), amount.is_argument), ("amount", true));
        assert_eq!(amount.value.render(), "5");

        let Some(id) = this.expandable_id() else { panic!("counter is an object") };
        let ObjectContents::Fields(fields) = target.inspect_object(id, 10).unwrap() else {
            panic!("counter has fields");
        };
        assert_eq!(fields[0].name, "count");
        let label = RemoteValue::Str { id: ObjectId(2), value: "clicks".into() };
        assert_eq!(fields[1].value, Ok(label));

        target.resume().unwrap();
        let again = target.next_event_batch().unwrap();
        assert!(matches!(again[0], DebugEvent::BreakpointHit { .. }));
    }

    #[test]
    fn test_suspension_rules() {
        let mut target = demo();
        assert!(matches!(
            target.thread_frames(MAIN_THREAD),
            Err(ControlError::Rejected(_))
        ));
        target.next_event_batch().unwrap();
        assert!(matches!(target.next_event_batch(), Err(ControlError::Rejected(_))));
        assert!(matches!(
            target.thread_frames(ThreadId(9)),
            Err(ControlError::InvalidThread(_))
        ));
        assert!(matches!(
            target.inspect_object(ObjectId(77), 5),
            Err(ControlError::InvalidObject(_))
        ));
    }

    #[test]
    fn test_detach_runs_to_completion() {
        let mut target = demo();
        let mut output = target.take_output().unwrap();
        assert!(target.take_output().is_none());
        target.next_event_batch().unwrap();
        target.detach().unwrap();
        assert!(target.has_exited());
        assert_eq!(target.next_event_batch().unwrap(), vec![DebugEvent::Disconnected]);
        assert!(matches!(target.resume(), Err(ControlError::Detached)));

        let mut text = String::new();
        output.read_to_string(&mut text).unwrap();
        assert_eq!(text, "added 5\nadded 7\nadded 9\nTotal: 21\n");
    }

    #[test]
    fn test_runtime_fault_terminates() {
        let program = Program::from_toml(
            r#"
            entry_class = "App"
            [[classes]]
            name = "App"
            source_file = "App.java"
            [[classes.methods]]
            name = "main"
            body = [
                { line = 2, print = { var = "missing" } },
                { line = 3, print = { int = 1 } },
            ]
            "#,
        )
        .unwrap();
        let mut target = SimTarget::new(program).unwrap();
        let mut output = target.take_output().unwrap();
        target.detach().unwrap();
        let mut text = String::new();
        output.read_to_string(&mut text).unwrap();
        assert_eq!(text, "Exception in thread \"main\" Unknown variable missing\n");
    }

    #[test]
    fn test_step_limit() {
        let mut program = Program::demo().unwrap();
        program.max_steps = 4;
        let mut target = SimTarget::new(program).unwrap();
        target.detach().unwrap();
        assert_eq!(target.executed(), 4);
    }
}
