//! Java Debug Wire Protocol (JDWP) wire contracts for the Tern backend.
//!
//! `tern-debug` consumes this crate to serialize events, locations, line and
//! variable tables, and error replies byte-exactly as an unmodified JDWP
//! debugger client expects them.
//!
//! Everything here is pure data plus encode/decode; transport framing and the
//! per-command dispatch tables live outside this workspace.

mod codec;
mod types;

pub use codec::{CodecError, JdwpReader, JdwpWriter};
pub use types::{
    ErrorCode, EventKind, FieldId, FrameId, LineTable, LineTableEntry, Location, MethodId,
    ObjectId, ReferenceTypeId, SuspendPolicy, ThreadId, TypeTag, Value, VariableSlot,
    VariableTable, NATIVE_METHOD_INDEX,
};

pub use types::tag;
