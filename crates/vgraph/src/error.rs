//! Error types for the heap and the encoder.

use thiserror::Error;

/// Errors raised while building a graph on the heap.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeapError {
    #[error("table index is nil")]
    NilKey,

    #[error("table index is NaN")]
    NanKey,

    #[error("closure captures {count} variables (max {max})")]
    TooManyUpvalues { count: usize, max: usize },

    #[error("stale {kind} handle #{index}")]
    StaleHandle { kind: &'static str, index: u32 },

    #[error("heap holds too many {kind} objects")]
    ArenaFull { kind: &'static str },
}

/// Errors that abort a serialization call.
///
/// Every variant is fatal to the current call: bytes produced so far must be
/// discarded by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// A table key outside boolean/integer/float/string.
    #[error("unsupported table key of type {type_name}")]
    UnsupportedKey { type_name: &'static str },

    /// A reachable value outside the serializable union.
    #[error("unsupported value of type {type_name}")]
    UnsupportedValue { type_name: String },

    /// The output buffer could not grow.
    #[error("out of memory growing output buffer to {requested} bytes")]
    OutOfMemory { requested: usize },

    /// The output grew past the configured cap.
    #[error("output exceeds limit of {limit} bytes")]
    OutputLimit { limit: usize },

    /// A handle that does not belong to the heap being encoded.
    #[error("stale {kind} handle #{index}")]
    StaleHandle { kind: &'static str, index: u32 },

    #[error("record formatting failed")]
    Format,

    #[error("chunk dump failed: {0}")]
    ChunkDump(String),
}

impl EncodeError {
    /// Stable snake_case name for reports.
    pub fn kind(&self) -> &'static str {
        match self {
            EncodeError::UnsupportedKey { .. } => "unsupported_key",
            EncodeError::UnsupportedValue { .. } => "unsupported_value",
            EncodeError::OutOfMemory { .. } => "out_of_memory",
            EncodeError::OutputLimit { .. } => "output_limit",
            EncodeError::StaleHandle { .. } => "stale_handle",
            EncodeError::Format => "format",
            EncodeError::ChunkDump(_) => "chunk_dump",
        }
    }
}
