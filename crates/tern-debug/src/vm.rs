//! The collaborator-VM boundary.
//!
//! The debuggee runs inside an external virtual machine; the engine only sees
//! it through these traits. Entities are handed over as `Arc` trait objects
//! owned by the VM — the engine (notably the identifier registry) holds weak
//! references and never extends entity lifetime.

use std::sync::Arc;

use tern_jdwp::{TypeTag, VariableTable};

/// Runtime classification of a heap object, produced by a single
/// [`VmObject::kind`] call at identifier-creation time and never re-derived.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Array,
    Thread,
    ThreadGroup,
    ClassLoader,
    ClassObject,
    String,
    Plain,
}

/// A heap object of the debuggee.
///
/// Objects that pair wire-visible state with VM-internal metadata (thread
/// objects, class objects, classloader objects) expose that metadata through
/// the `*_meta` accessors. The metadata may not exist yet when the object
/// first crosses the wire; callers re-query lazily and report `InvalidObject`
/// when it cannot be located.
pub trait VmObject: Send + Sync {
    fn kind(&self) -> ObjectKind;

    /// Thread control block, for objects classified [`ObjectKind::Thread`].
    fn thread_meta(&self) -> Option<Arc<dyn VmThread>> {
        None
    }

    /// Class descriptor, for objects classified [`ObjectKind::ClassObject`].
    fn class_meta(&self) -> Option<Arc<dyn VmReferenceType>> {
        None
    }

    /// Loader descriptor, for objects classified [`ObjectKind::ClassLoader`].
    fn loader_meta(&self) -> Option<Arc<dyn VmClassLoader>> {
        None
    }
}

/// A thread control block: the VM-internal side of a thread object.
pub trait VmThread: Send + Sync {
    fn name(&self) -> String;

    /// The thread's call stack, innermost frame first, synthetic frames
    /// included (callers filter on [`VmFrame::is_synthetic`]).
    fn frames(&self) -> Vec<Arc<dyn VmFrame>>;
}

pub trait VmFrame: Send + Sync {
    /// Frames injected by the runtime that have no source counterpart; the
    /// stepping logic skips them entirely.
    fn is_synthetic(&self) -> bool;
    fn pc(&self) -> Arc<dyn VmInstruction>;
    fn method(&self) -> Arc<dyn VmMethod>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstructionKind {
    Plain,
    /// A call instruction targeting a bytecode method.
    Invoke,
    /// A call instruction targeting a native method (no frame to step into).
    NativeInvoke,
}

impl InstructionKind {
    pub fn is_invoke(self) -> bool {
        matches!(self, InstructionKind::Invoke | InstructionKind::NativeInvoke)
    }
}

pub trait VmInstruction: Send + Sync {
    /// Position within the owning method; monotonically increasing.
    fn index(&self) -> u64;
    fn line(&self) -> Option<u32>;
    fn kind(&self) -> InstructionKind;
    fn method(&self) -> Arc<dyn VmMethod>;
}

/// Instruction identity: same owning method, same index.
pub fn same_instruction(a: &dyn VmInstruction, b: &dyn VmInstruction) -> bool {
    a.index() == b.index() && a.method().global_id() == b.method().global_id()
}

pub trait VmMethod: Send + Sync {
    /// Globally unique id assigned by the VM; doubles as the wire method id.
    fn global_id(&self) -> u64;
    fn name(&self) -> String;
    fn signature(&self) -> String;
    fn declaring_type(&self) -> Arc<dyn VmReferenceType>;
    fn is_native(&self) -> bool;
    /// Number of instructions; the valid instruction indexes are
    /// `0..instruction_count()`.
    fn instruction_count(&self) -> u64;
    /// Per-instruction `(code_index, line)` rows in execution order, or `None`
    /// when the method carries no line information.
    fn instruction_lines(&self) -> Option<Vec<(u64, u32)>>;
    /// Local-variable debug information, or `None` when absent.
    fn variable_table(&self) -> Option<VariableTable>;
}

pub trait VmReferenceType: Send + Sync {
    fn type_tag(&self) -> TypeTag;
    /// Binary name (`com.example.Foo`), the form class filters match against.
    fn name(&self) -> String;
    fn signature(&self) -> String;
}

pub trait VmClassLoader: Send + Sync {
    fn name(&self) -> String;
}

pub trait VmField: Send + Sync {
    fn global_id(&self) -> u64;
    fn name(&self) -> String;
    fn declaring_type(&self) -> Arc<dyn VmReferenceType>;
}

/// Suspend/resume directives the engine issues to the VM.
///
/// Suspension is cooperative: the VM checks its suspended flags at instruction
/// boundaries and parks itself; these calls only flip the flags.
pub trait VmScheduler: Send + Sync {
    fn suspend_all(&self);
    fn resume_all(&self);
    fn suspend_thread(&self, thread: &Arc<dyn VmObject>);
    fn resume_thread(&self, thread: &Arc<dyn VmObject>);
    fn is_thread_suspended(&self, thread: &Arc<dyn VmObject>) -> bool;
}

/// A typed notification raised by the VM.
///
/// Instruction boundaries feed both the breakpoint and the single-step
/// request tables; every other variant maps to exactly one event kind.
#[derive(Clone)]
pub enum VmEvent {
    VmStart {
        thread: Arc<dyn VmObject>,
    },
    VmDeath,
    ThreadStart {
        thread: Arc<dyn VmObject>,
    },
    ThreadDeath {
        thread: Arc<dyn VmObject>,
    },
    ClassLoad {
        thread: Arc<dyn VmObject>,
        class: Arc<dyn VmReferenceType>,
    },
    ClassPrepare {
        thread: Arc<dyn VmObject>,
        class: Arc<dyn VmReferenceType>,
    },
    ClassUnload {
        signature: String,
    },
    MethodEntry {
        thread: Arc<dyn VmObject>,
        instruction: Arc<dyn VmInstruction>,
    },
    InstructionBoundary {
        thread: Arc<dyn VmObject>,
        instruction: Arc<dyn VmInstruction>,
    },
    FieldAccess {
        thread: Arc<dyn VmObject>,
        instruction: Arc<dyn VmInstruction>,
        field: Arc<dyn VmField>,
        /// `None` for static field accesses.
        object: Option<Arc<dyn VmObject>>,
    },
    FieldModification {
        thread: Arc<dyn VmObject>,
        instruction: Arc<dyn VmInstruction>,
        field: Arc<dyn VmField>,
        object: Option<Arc<dyn VmObject>>,
        value_to_be: tern_jdwp::Value,
    },
}

impl std::fmt::Debug for VmEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            VmEvent::VmStart { .. } => "VmStart",
            VmEvent::VmDeath => "VmDeath",
            VmEvent::ThreadStart { .. } => "ThreadStart",
            VmEvent::ThreadDeath { .. } => "ThreadDeath",
            VmEvent::ClassLoad { .. } => "ClassLoad",
            VmEvent::ClassPrepare { .. } => "ClassPrepare",
            VmEvent::ClassUnload { .. } => "ClassUnload",
            VmEvent::MethodEntry { .. } => "MethodEntry",
            VmEvent::InstructionBoundary { .. } => "InstructionBoundary",
            VmEvent::FieldAccess { .. } => "FieldAccess",
            VmEvent::FieldModification { .. } => "FieldModification",
        };
        f.write_str(name)
    }
}
