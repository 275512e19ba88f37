//! Deterministic encoding of dynamic value graphs.
//!
//! A graph lives on a [`Heap`]: tables, closures and their captured
//! variables are addressed by handles, so cycles and shared captures are
//! ordinary data. [`Encoder`] turns a root [`Value`] into a line-oriented
//! record stream that preserves both, visiting each object once and emitting
//! table entries in a canonical key order.

pub mod buffer;
pub mod chunk;
pub mod doc;
pub mod encode;
pub mod error;
pub mod heap;
pub mod keys;
pub mod options;
pub mod registry;
pub mod value;

pub use buffer::OutBuf;
pub use chunk::{ChunkDumper, VerbatimDumper};
pub use doc::load_graph;
pub use encode::{serialize, EncodeStats, Encoded, Encoder};
pub use error::{EncodeError, HeapError};
pub use heap::{Closure, Heap, Table, TableKey, MAX_UPVALUES};
pub use options::EncodeOptions;
pub use value::{Chunk, ClosureRef, ForeignRef, TableRef, UpvalRef, Value};
