//! The value encoder.
//!
//! Walks the graph depth-first over an explicit work stack and writes one
//! newline-terminated record per value:
//!
//! ```text
//! nil | true | false
//! integer <decimal>
//! number <shortest round-trip decimal | inf | -inf | NaN>
//! string <len>\n<bytes>\n
//! ref <id>
//! table <n>          then n (key, value) record pairs in canonical key order
//! function <n>       then n slot records (a value or `upref <id> <slot>`),
//!                    then code <len>\n<bytes>\n
//! ```
//!
//! Tables and closures get ids in first-encounter order starting at 0; a later
//! encounter writes `ref <id>`. A captured variable is owned by the first
//! closure slot that reaches it; later slots write `upref <owner id> <slot>`
//! with 1-based slot numbers.

use serde::Serialize;

use crate::buffer::OutBuf;
use crate::chunk::{ChunkDumper, VerbatimDumper};
use crate::error::EncodeError;
use crate::heap::{Heap, Table, TableKey};
use crate::keys;
use crate::options::EncodeOptions;
use crate::registry::{ObjId, RefRegistry, UpvalRegistry};
use crate::value::{Chunk, UpvalRef, Value};

static NIL: Value = Value::Nil;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EncodeStats {
    pub tables: u64,
    pub closures: u64,
    pub back_refs: u64,
    pub uprefs: u64,
    /// Peak length of the work stack.
    pub max_stack: usize,
}

#[derive(Debug, Clone)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    pub stats: EncodeStats,
}

enum Work<'h> {
    Value(&'h Value),
    Key(&'h TableKey),
    Entry {
        table: &'h Table,
        key: &'h TableKey,
    },
    Upval {
        closure_id: u64,
        slot: u16,
        upval: UpvalRef,
    },
    Chunk(&'h Chunk),
}

/// One serialization call. Registries live exactly as long as the encoder,
/// and [`Encoder::encode`] consumes it.
pub struct Encoder<'h, D = VerbatimDumper> {
    heap: &'h Heap,
    dumper: D,
    strip: bool,
    out: OutBuf,
    refs: RefRegistry,
    upvals: UpvalRegistry,
    stats: EncodeStats,
    scratch: Vec<u8>,
}

/// Encodes `root` with default options.
pub fn serialize(heap: &Heap, root: &Value) -> Result<Vec<u8>, EncodeError> {
    let encoder = Encoder::new(heap, &EncodeOptions::default())?;
    Ok(encoder.encode(root)?.bytes)
}

impl<'h> Encoder<'h, VerbatimDumper> {
    pub fn new(heap: &'h Heap, opts: &EncodeOptions) -> Result<Self, EncodeError> {
        Self::with_dumper(heap, opts, VerbatimDumper)
    }
}

impl<'h, D: ChunkDumper> Encoder<'h, D> {
    pub fn with_dumper(heap: &'h Heap, opts: &EncodeOptions, dumper: D) -> Result<Self, EncodeError> {
        let out = OutBuf::with_capacity(opts.initial_capacity)?.with_limit(opts.max_output_bytes);
        Ok(Self {
            heap,
            dumper,
            strip: opts.strip,
            out,
            refs: RefRegistry::new(),
            upvals: UpvalRegistry::new(),
            stats: EncodeStats::default(),
            scratch: Vec::new(),
        })
    }

    pub fn encode(mut self, root: &'h Value) -> Result<Encoded, EncodeError> {
        tracing::debug!(root = root.type_name(), "encode start");
        if let Err(err) = self.run(root) {
            tracing::debug!(error = %err, bytes = self.out.written(), "encode aborted");
            return Err(err);
        }
        let stats = self.stats;
        tracing::debug!(
            bytes = self.out.written(),
            tables = stats.tables,
            closures = stats.closures,
            back_refs = stats.back_refs,
            uprefs = stats.uprefs,
            max_stack = stats.max_stack,
            "encode finished"
        );
        Ok(Encoded {
            bytes: self.out.into_bytes(),
            stats,
        })
    }

    fn run(&mut self, root: &'h Value) -> Result<(), EncodeError> {
        let mut stack = vec![Work::Value(root)];
        while let Some(work) = stack.pop() {
            match work {
                Work::Value(value) => self.visit(value, &mut stack)?,
                Work::Key(key) => self.write_key(key)?,
                Work::Entry { table, key } => {
                    let value = table.get(key).unwrap_or(&NIL);
                    self.visit(value, &mut stack)?;
                }
                Work::Upval {
                    closure_id,
                    slot,
                    upval,
                } => match self.upvals.claim(upval, closure_id, slot) {
                    Some(owner) => {
                        self.stats.uprefs += 1;
                        self.out.push_fmt(format_args!(
                            "upref {} {}\n",
                            owner.closure_id, owner.slot
                        ))?;
                    }
                    None => {
                        let heap = self.heap;
                        let value = heap.upval(upval).ok_or(EncodeError::StaleHandle {
                            kind: "upvalue",
                            index: upval.index(),
                        })?;
                        self.visit(value, &mut stack)?;
                    }
                },
                Work::Chunk(chunk) => self.write_chunk(chunk)?,
            }
            self.stats.max_stack = self.stats.max_stack.max(stack.len());
        }
        Ok(())
    }

    fn visit(&mut self, value: &'h Value, stack: &mut Vec<Work<'h>>) -> Result<(), EncodeError> {
        let heap = self.heap;
        match value {
            Value::Nil => self.out.push_bytes(b"nil\n"),
            Value::Boolean(true) => self.out.push_bytes(b"true\n"),
            Value::Boolean(false) => self.out.push_bytes(b"false\n"),
            Value::Integer(i) => self.out.push_fmt(format_args!("integer {i}\n")),
            Value::Float(n) => self.write_number(*n),
            Value::String(s) => self.write_string(s),
            Value::Table(t) => {
                let (id, fresh) = self.refs.intern(ObjId::Table(*t));
                if !fresh {
                    return self.write_ref(id);
                }
                let table = heap.table(*t).ok_or(EncodeError::StaleHandle {
                    kind: "table",
                    index: t.index(),
                })?;
                let keys = keys::canonical_keys(table)?;
                self.stats.tables += 1;
                self.out.push_fmt(format_args!("table {}\n", keys.len()))?;

                stack
                    .try_reserve(keys.len() * 2)
                    .map_err(|_| EncodeError::OutOfMemory {
                        requested: keys.len() * 2,
                    })?;
                for k in keys.iter().rev() {
                    stack.push(Work::Entry { table, key: k.key });
                    stack.push(Work::Key(k.key));
                }
                Ok(())
            }
            Value::Function(f) => {
                let (id, fresh) = self.refs.intern(ObjId::Closure(*f));
                if !fresh {
                    return self.write_ref(id);
                }
                let closure = heap.closure(*f).ok_or(EncodeError::StaleHandle {
                    kind: "closure",
                    index: f.index(),
                })?;
                self.stats.closures += 1;
                self.out
                    .push_fmt(format_args!("function {}\n", closure.upvals().len()))?;

                stack.push(Work::Chunk(closure.chunk()));
                for (i, &upval) in closure.upvals().iter().enumerate().rev() {
                    stack.push(Work::Upval {
                        closure_id: id,
                        // Heap caps captures at 255, so 1-based slots fit.
                        slot: (i + 1) as u16,
                        upval,
                    });
                }
                Ok(())
            }
            Value::Foreign(u) => Err(EncodeError::UnsupportedValue {
                type_name: heap.foreign_type(*u).unwrap_or("foreign").to_string(),
            }),
        }
    }

    fn write_key(&mut self, key: &TableKey) -> Result<(), EncodeError> {
        match key {
            TableKey::Bool(true) => self.out.push_bytes(b"true\n"),
            TableKey::Bool(false) => self.out.push_bytes(b"false\n"),
            TableKey::Int(i) => self.out.push_fmt(format_args!("integer {i}\n")),
            TableKey::Float(bits) => self.write_number(f64::from_bits(*bits)),
            TableKey::Str(s) => self.write_string(s),
            TableKey::Table(_) | TableKey::Function(_) | TableKey::Foreign(_) => {
                keys::KeyRank::of(key).map(|_| ())
            }
        }
    }

    fn write_ref(&mut self, id: u64) -> Result<(), EncodeError> {
        self.stats.back_refs += 1;
        self.out.push_fmt(format_args!("ref {id}\n"))
    }

    fn write_number(&mut self, n: f64) -> Result<(), EncodeError> {
        let mut digits = ryu::Buffer::new();
        let text = digits.format(n);
        self.out.push_fmt(format_args!("number {text}\n"))
    }

    fn write_string(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        self.out.push_fmt(format_args!("string {}\n", bytes.len()))?;
        self.out.push_bytes(bytes)?;
        self.out.push_bytes(b"\n")
    }

    fn write_chunk(&mut self, chunk: &Chunk) -> Result<(), EncodeError> {
        self.scratch.clear();
        self.dumper
            .dump(chunk, self.strip, &mut self.scratch)
            .map_err(EncodeError::ChunkDump)?;
        self.out
            .push_fmt(format_args!("code {}\n", self.scratch.len()))?;
        self.out.push_bytes(&self.scratch)?;
        self.out.push_bytes(b"\n")
    }
}
