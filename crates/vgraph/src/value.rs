use std::fmt;
use std::rc::Rc;

/// Handle to a table on a [`crate::Heap`]. The handle is the table's identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableRef {
    pub(crate) heap: u64,
    pub(crate) index: u32,
}

/// Handle to a closure on a [`crate::Heap`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClosureRef {
    pub(crate) heap: u64,
    pub(crate) index: u32,
}

/// Handle to a captured-variable cell. Closures built over the same handle
/// share the variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UpvalRef {
    pub(crate) heap: u64,
    pub(crate) index: u32,
}

/// Handle to a host object the encoder cannot represent (userdata, threads).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ForeignRef {
    pub(crate) heap: u64,
    pub(crate) index: u32,
}

// Handles carry the id of the heap that issued them, so a handle from one
// heap never resolves on another.
macro_rules! handle_index {
    ($($t:ident),*) => {
        $(impl $t {
            pub(crate) fn new(heap: u64, index: u32) -> Self {
                $t { heap, index }
            }

            pub fn index(self) -> u32 {
                self.index
            }
        })*
    };
}

handle_index!(TableRef, ClosureRef, UpvalRef, ForeignRef);

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(Vec<u8>),
    Table(TableRef),
    Function(ClosureRef),
    Foreign(ForeignRef),
}

impl Value {
    pub fn string(bytes: impl Into<Vec<u8>>) -> Self {
        Value::String(bytes.into())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Table(_) => "table",
            Value::Function(_) => "function",
            Value::Foreign(_) => "foreign",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.as_bytes().to_vec())
    }
}

impl From<TableRef> for Value {
    fn from(t: TableRef) -> Self {
        Value::Table(t)
    }
}

impl From<ClosureRef> for Value {
    fn from(f: ClosureRef) -> Self {
        Value::Function(f)
    }
}

/// Compiled-code payload of a closure.
///
/// The bytes are produced by whatever compiler the host embeds; the encoder
/// hands them to a [`crate::ChunkDumper`] and never looks inside.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Chunk {
    pub code: Vec<u8>,
    pub debug_info: Vec<u8>,
}

impl Chunk {
    pub fn new(code: impl Into<Vec<u8>>) -> Rc<Self> {
        Rc::new(Chunk {
            code: code.into(),
            debug_info: Vec::new(),
        })
    }

    pub fn with_debug_info(code: impl Into<Vec<u8>>, debug_info: impl Into<Vec<u8>>) -> Rc<Self> {
        Rc::new(Chunk {
            code: code.into(),
            debug_info: debug_info.into(),
        })
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("code_len", &self.code.len())
            .field("debug_info_len", &self.debug_info.len())
            .finish()
    }
}
