//! Wire-visible data model: tagged values, locations, line/variable tables,
//! event kinds, suspend policies and the JDWP error-code taxonomy.

pub type ObjectId = u64;
pub type ThreadId = u64;
pub type ReferenceTypeId = u64;
pub type MethodId = u64;
pub type FieldId = u64;
pub type FrameId = u64;

/// JDWP value tag bytes.
///
/// These are the ASCII signature characters fixed by the protocol; object-like
/// tags distinguish the runtime kind of the reference that follows.
pub mod tag {
    pub const BYTE: u8 = b'B';
    pub const CHAR: u8 = b'C';
    pub const DOUBLE: u8 = b'D';
    pub const FLOAT: u8 = b'F';
    pub const INT: u8 = b'I';
    pub const LONG: u8 = b'J';
    pub const SHORT: u8 = b'S';
    pub const VOID: u8 = b'V';
    pub const BOOLEAN: u8 = b'Z';
    pub const OBJECT: u8 = b'L';
    pub const STRING: u8 = b's';
    pub const THREAD: u8 = b't';
    pub const THREAD_GROUP: u8 = b'g';
    pub const CLASS_LOADER: u8 = b'l';
    pub const CLASS_OBJECT: u8 = b'c';
    pub const ARRAY: u8 = b'[';
}

/// A JDWP value. Object-like values carry their runtime tag byte alongside the
/// 8-byte id so `write_tagged_value` never has to re-derive it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    Void,
    Boolean(bool),
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Object { tag: u8, id: ObjectId },
}

impl Value {
    pub fn tag(&self) -> u8 {
        match *self {
            Value::Void => tag::VOID,
            Value::Boolean(_) => tag::BOOLEAN,
            Value::Byte(_) => tag::BYTE,
            Value::Char(_) => tag::CHAR,
            Value::Short(_) => tag::SHORT,
            Value::Int(_) => tag::INT,
            Value::Long(_) => tag::LONG,
            Value::Float(_) => tag::FLOAT,
            Value::Double(_) => tag::DOUBLE,
            Value::Object { tag, .. } => tag,
        }
    }

    pub fn object_id(&self) -> Option<ObjectId> {
        match *self {
            Value::Object { id, .. } => Some(id),
            _ => None,
        }
    }
}

/// Reference-type tag byte used in `Location` and class-prepare events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeTag {
    Class = 1,
    Interface = 2,
    Array = 3,
}

impl TypeTag {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(TypeTag::Class),
            2 => Some(TypeTag::Interface),
            3 => Some(TypeTag::Array),
            _ => None,
        }
    }
}

/// An executable location: a method plus an instruction index within it.
///
/// Equality is by underlying instruction identity, which on the wire is the
/// `(method_id, index)` pair; the type tag and class id are carried for
/// encoding but derive from the method.
#[derive(Clone, Copy, Debug, Eq)]
pub struct Location {
    pub type_tag: TypeTag,
    pub class_id: ReferenceTypeId,
    pub method_id: MethodId,
    pub index: u64,
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.method_id == other.method_id && self.index == other.index
    }
}

/// Code index reported for both ends of a native method's line table.
pub const NATIVE_METHOD_INDEX: i64 = -1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineTableEntry {
    pub code_index: u64,
    pub line: u32,
}

/// A method's line table: lowest and highest valid code index plus one row per
/// *change* of line number walking the instructions in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineTable {
    pub start: i64,
    pub end: i64,
    pub lines: Vec<LineTableEntry>,
}

impl LineTable {
    /// The table reported for native methods: no rows, both indexes `-1`.
    pub fn native() -> Self {
        Self {
            start: NATIVE_METHOD_INDEX,
            end: NATIVE_METHOD_INDEX,
            lines: Vec::new(),
        }
    }

    /// Build a table from per-instruction `(code_index, line)` rows in
    /// execution order. Consecutive instructions sharing a line collapse into
    /// a single row.
    pub fn from_instruction_lines(rows: impl IntoIterator<Item = (u64, u32)>) -> Self {
        let mut start = NATIVE_METHOD_INDEX;
        let mut end = NATIVE_METHOD_INDEX;
        let mut lines: Vec<LineTableEntry> = Vec::new();

        for (code_index, line) in rows {
            if start == NATIVE_METHOD_INDEX {
                start = code_index as i64;
            }
            end = code_index as i64;
            if lines.last().map(|entry| entry.line) != Some(line) {
                lines.push(LineTableEntry { code_index, line });
            }
        }

        Self { start, end, lines }
    }
}

/// A single local-variable slot of a method's variable table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariableSlot {
    pub code_index: u64,
    pub name: String,
    pub signature: String,
    /// Empty when the slot has no generic signature; only written by the
    /// "with-generic" encoding variant.
    pub generic_signature: String,
    pub length: u32,
    pub slot: u32,
}

/// A method's variable table: the number of words occupied by arguments plus
/// one entry per local-variable slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariableTable {
    pub arg_count: u32,
    pub slots: Vec<VariableSlot>,
}

/// JDWP event kinds, restricted to the notifications the collaborator VM
/// raises. Numeric values are fixed by the protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventKind {
    SingleStep = 1,
    Breakpoint = 2,
    Exception = 4,
    ThreadStart = 6,
    ThreadDeath = 7,
    ClassPrepare = 8,
    ClassUnload = 9,
    ClassLoad = 10,
    FieldAccess = 20,
    FieldModification = 21,
    MethodEntry = 40,
    MethodExit = 41,
    VmStart = 90,
    VmDeath = 99,
}

impl EventKind {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(EventKind::SingleStep),
            2 => Some(EventKind::Breakpoint),
            4 => Some(EventKind::Exception),
            6 => Some(EventKind::ThreadStart),
            7 => Some(EventKind::ThreadDeath),
            8 => Some(EventKind::ClassPrepare),
            9 => Some(EventKind::ClassUnload),
            10 => Some(EventKind::ClassLoad),
            20 => Some(EventKind::FieldAccess),
            21 => Some(EventKind::FieldModification),
            40 => Some(EventKind::MethodEntry),
            41 => Some(EventKind::MethodExit),
            90 => Some(EventKind::VmStart),
            99 => Some(EventKind::VmDeath),
            _ => None,
        }
    }
}

/// How much of the debuggee pauses when an event is reported.
///
/// The declaration order doubles as the severity ordering: when several
/// requests match one event the effective policy is the `max`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum SuspendPolicy {
    #[default]
    None = 0,
    EventThread = 1,
    All = 2,
}

impl SuspendPolicy {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(SuspendPolicy::None),
            1 => Some(SuspendPolicy::EventThread),
            2 => Some(SuspendPolicy::All),
            _ => None,
        }
    }
}

/// JDWP reply error codes. Values are fixed by the protocol specification and
/// travel as a 2-byte big-endian field in reply headers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    None = 0,
    InvalidThread = 10,
    InvalidThreadGroup = 11,
    ThreadNotSuspended = 13,
    InvalidObject = 20,
    InvalidClass = 21,
    ClassNotPrepared = 22,
    InvalidMethodId = 23,
    InvalidLocation = 24,
    InvalidFieldId = 25,
    InvalidFrameId = 30,
    NoMoreFrames = 31,
    OpaqueFrame = 32,
    NotCurrentFrame = 33,
    Duplicate = 40,
    NotFound = 41,
    Interrupt = 52,
    NotImplemented = 99,
    AbsentInformation = 101,
    InvalidEventType = 102,
    IllegalArgument = 103,
    VmDead = 112,
    Internal = 113,
    InvalidTag = 500,
    InvalidIndex = 503,
    InvalidLength = 504,
    InvalidString = 506,
    InvalidClassLoader = 507,
    InvalidArray = 508,
    InvalidCount = 512,
}

impl ErrorCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}
