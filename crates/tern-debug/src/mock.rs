//! Deterministic in-memory doubles for the VM boundary.
//!
//! Exported unconditionally so downstream crates can drive the engine without
//! a real VM. Every constructor returns an `Arc` because that is the only
//! shape the boundary traits accept.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use tern_jdwp::{TypeTag, VariableTable};

use crate::suspend::EventSink;
use crate::vm::{
    InstructionKind, ObjectKind, VmClassLoader, VmField, VmFrame, VmInstruction, VmMethod,
    VmObject, VmReferenceType, VmScheduler, VmThread,
};

pub struct MockObject {
    kind: ObjectKind,
    thread: Mutex<Option<Arc<MockThread>>>,
    class: Mutex<Option<Arc<MockType>>>,
    loader: Mutex<Option<Arc<MockClassLoader>>>,
}

impl MockObject {
    pub fn new(kind: ObjectKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            thread: Mutex::new(None),
            class: Mutex::new(None),
            loader: Mutex::new(None),
        })
    }

    /// Attaches a thread control block, modelling the VM publishing it some
    /// time after the object itself became visible.
    pub fn attach_thread(&self, name: &str) -> Arc<MockThread> {
        let thread = Arc::new(MockThread {
            name: name.to_string(),
            frames: Mutex::new(Vec::new()),
        });
        *self.thread.lock() = Some(thread.clone());
        thread
    }

    pub fn attach_class(&self, ty: &Arc<MockType>) {
        *self.class.lock() = Some(ty.clone());
    }

    pub fn attach_loader(&self, name: &str) -> Arc<MockClassLoader> {
        let loader = Arc::new(MockClassLoader {
            name: name.to_string(),
        });
        *self.loader.lock() = Some(loader.clone());
        loader
    }
}

impl VmObject for MockObject {
    fn kind(&self) -> ObjectKind {
        self.kind
    }

    fn thread_meta(&self) -> Option<Arc<dyn VmThread>> {
        self.thread
            .lock()
            .clone()
            .map(|t| t as Arc<dyn VmThread>)
    }

    fn class_meta(&self) -> Option<Arc<dyn VmReferenceType>> {
        self.class
            .lock()
            .clone()
            .map(|c| c as Arc<dyn VmReferenceType>)
    }

    fn loader_meta(&self) -> Option<Arc<dyn VmClassLoader>> {
        self.loader
            .lock()
            .clone()
            .map(|l| l as Arc<dyn VmClassLoader>)
    }
}

pub struct MockThread {
    name: String,
    frames: Mutex<Vec<Arc<dyn VmFrame>>>,
}

impl MockThread {
    pub fn set_frames(&self, frames: Vec<Arc<dyn VmFrame>>) {
        *self.frames.lock() = frames;
    }
}

impl VmThread for MockThread {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn frames(&self) -> Vec<Arc<dyn VmFrame>> {
        self.frames.lock().clone()
    }
}

pub struct MockType {
    type_tag: TypeTag,
    name: String,
    signature: String,
}

impl MockType {
    fn build(type_tag: TypeTag, name: &str) -> Arc<Self> {
        let signature = match type_tag {
            TypeTag::Array => name.to_string(),
            _ => format!("L{};", name.replace('.', "/")),
        };
        Arc::new(Self {
            type_tag,
            name: name.to_string(),
            signature,
        })
    }

    pub fn class(name: &str) -> Arc<Self> {
        Self::build(TypeTag::Class, name)
    }

    pub fn interface(name: &str) -> Arc<Self> {
        Self::build(TypeTag::Interface, name)
    }

    /// `signature` is the array descriptor itself, e.g. `[I`.
    pub fn array(signature: &str) -> Arc<Self> {
        Self::build(TypeTag::Array, signature)
    }
}

impl VmReferenceType for MockType {
    fn type_tag(&self) -> TypeTag {
        self.type_tag
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn signature(&self) -> String {
        self.signature.clone()
    }
}

pub struct MockClassLoader {
    name: String,
}

impl VmClassLoader for MockClassLoader {
    fn name(&self) -> String {
        self.name.clone()
    }
}

pub struct MockMethod {
    global_id: u64,
    declaring_type: Arc<MockType>,
    name: String,
    is_native: bool,
    instruction_count: u64,
    lines: Option<Vec<(u64, u32)>>,
    variable_table: Mutex<Option<VariableTable>>,
}

impl MockMethod {
    /// A bytecode method with line info; the instruction count is derived from
    /// the last `(code_index, line)` row.
    pub fn new(
        global_id: u64,
        declaring_type: &Arc<MockType>,
        name: &str,
        lines: Vec<(u64, u32)>,
    ) -> Arc<Self> {
        let instruction_count = lines.last().map_or(0, |(index, _)| index + 1);
        Arc::new(Self {
            global_id,
            declaring_type: declaring_type.clone(),
            name: name.to_string(),
            is_native: false,
            instruction_count,
            lines: Some(lines),
            variable_table: Mutex::new(None),
        })
    }

    /// A bytecode method compiled without debug info.
    pub fn without_lines(
        global_id: u64,
        declaring_type: &Arc<MockType>,
        name: &str,
        instruction_count: u64,
    ) -> Arc<Self> {
        Arc::new(Self {
            global_id,
            declaring_type: declaring_type.clone(),
            name: name.to_string(),
            is_native: false,
            instruction_count,
            lines: None,
            variable_table: Mutex::new(None),
        })
    }

    pub fn native(global_id: u64, declaring_type: &Arc<MockType>, name: &str) -> Arc<Self> {
        Arc::new(Self {
            global_id,
            declaring_type: declaring_type.clone(),
            name: name.to_string(),
            is_native: true,
            instruction_count: 0,
            lines: None,
            variable_table: Mutex::new(None),
        })
    }

    pub fn set_variable_table(&self, table: VariableTable) {
        *self.variable_table.lock() = Some(table);
    }
}

impl VmMethod for MockMethod {
    fn global_id(&self) -> u64 {
        self.global_id
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn signature(&self) -> String {
        "()V".to_string()
    }

    fn declaring_type(&self) -> Arc<dyn VmReferenceType> {
        self.declaring_type.clone()
    }

    fn is_native(&self) -> bool {
        self.is_native
    }

    fn instruction_count(&self) -> u64 {
        self.instruction_count
    }

    fn instruction_lines(&self) -> Option<Vec<(u64, u32)>> {
        self.lines.clone()
    }

    fn variable_table(&self) -> Option<VariableTable> {
        self.variable_table.lock().clone()
    }
}

pub struct MockInstruction {
    method: Arc<MockMethod>,
    index: u64,
    line: Option<u32>,
    kind: InstructionKind,
}

impl MockInstruction {
    fn build(
        method: &Arc<MockMethod>,
        index: u64,
        line: u32,
        kind: InstructionKind,
    ) -> Arc<Self> {
        Arc::new(Self {
            method: method.clone(),
            index,
            line: Some(line),
            kind,
        })
    }

    pub fn plain(method: &Arc<MockMethod>, index: u64, line: u32) -> Arc<Self> {
        Self::build(method, index, line, InstructionKind::Plain)
    }

    pub fn invoke(method: &Arc<MockMethod>, index: u64, line: u32) -> Arc<Self> {
        Self::build(method, index, line, InstructionKind::Invoke)
    }

    pub fn native_invoke(method: &Arc<MockMethod>, index: u64, line: u32) -> Arc<Self> {
        Self::build(method, index, line, InstructionKind::NativeInvoke)
    }
}

impl VmInstruction for MockInstruction {
    fn index(&self) -> u64 {
        self.index
    }

    fn line(&self) -> Option<u32> {
        self.line
    }

    fn kind(&self) -> InstructionKind {
        self.kind
    }

    fn method(&self) -> Arc<dyn VmMethod> {
        self.method.clone()
    }
}

pub struct MockFrame {
    pc: Arc<MockInstruction>,
    synthetic: bool,
}

impl MockFrame {
    pub fn new(pc: Arc<MockInstruction>) -> Arc<Self> {
        Arc::new(Self {
            pc,
            synthetic: false,
        })
    }

    pub fn synthetic(pc: Arc<MockInstruction>) -> Arc<Self> {
        Arc::new(Self {
            pc,
            synthetic: true,
        })
    }
}

impl VmFrame for MockFrame {
    fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    fn pc(&self) -> Arc<dyn VmInstruction> {
        self.pc.clone()
    }

    fn method(&self) -> Arc<dyn VmMethod> {
        self.pc.method()
    }
}

pub struct MockField {
    global_id: u64,
    declaring_type: Arc<MockType>,
    name: String,
}

impl MockField {
    pub fn new(global_id: u64, declaring_type: &Arc<MockType>, name: &str) -> Arc<Self> {
        Arc::new(Self {
            global_id,
            declaring_type: declaring_type.clone(),
            name: name.to_string(),
        })
    }
}

impl VmField for MockField {
    fn global_id(&self) -> u64 {
        self.global_id
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn declaring_type(&self) -> Arc<dyn VmReferenceType> {
        self.declaring_type.clone()
    }
}

/// One scheduler call, as recorded by [`RecordingScheduler`]. Per-thread
/// directives carry the thread name for assertion convenience.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Directive {
    SuspendAll,
    ResumeAll,
    SuspendThread(String),
    ResumeThread(String),
}

fn thread_name(thread: &Arc<dyn VmObject>) -> String {
    thread
        .thread_meta()
        .map(|t| t.name())
        .unwrap_or_else(|| "<no thread meta>".to_string())
}

fn thread_key(thread: &Arc<dyn VmObject>) -> usize {
    Arc::as_ptr(thread) as *const () as usize
}

/// Records every directive and tracks the resulting cooperative-suspension
/// state, the way a real scheduler's flags would.
#[derive(Default)]
pub struct RecordingScheduler {
    directives: Mutex<Vec<Directive>>,
    all_suspended: Mutex<bool>,
    suspended: Mutex<HashSet<usize>>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn directives(&self) -> Vec<Directive> {
        self.directives.lock().clone()
    }
}

impl VmScheduler for RecordingScheduler {
    fn suspend_all(&self) {
        self.directives.lock().push(Directive::SuspendAll);
        *self.all_suspended.lock() = true;
    }

    fn resume_all(&self) {
        self.directives.lock().push(Directive::ResumeAll);
        *self.all_suspended.lock() = false;
        self.suspended.lock().clear();
    }

    fn suspend_thread(&self, thread: &Arc<dyn VmObject>) {
        self.directives
            .lock()
            .push(Directive::SuspendThread(thread_name(thread)));
        self.suspended.lock().insert(thread_key(thread));
    }

    fn resume_thread(&self, thread: &Arc<dyn VmObject>) {
        self.directives
            .lock()
            .push(Directive::ResumeThread(thread_name(thread)));
        self.suspended.lock().remove(&thread_key(thread));
    }

    fn is_thread_suspended(&self, thread: &Arc<dyn VmObject>) -> bool {
        *self.all_suspended.lock() || self.suspended.lock().contains(&thread_key(thread))
    }
}

/// Captures every packet handed to the transport.
#[derive(Default)]
pub struct RecordingSink {
    packets: Mutex<Vec<Vec<u8>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn packets(&self) -> Vec<Vec<u8>> {
        self.packets.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.packets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.lock().is_empty()
    }
}

impl EventSink for RecordingSink {
    fn send(&self, packet: Vec<u8>) {
        self.packets.lock().push(packet);
    }
}
