//! Codec boundary for closure bodies.

use crate::value::Chunk;

/// Writes a closure's compiled code into the encoder's output.
///
/// The encoder frames whatever this produces as a length-prefixed blob, so an
/// implementation is free to use any internal format.
pub trait ChunkDumper {
    fn dump(&self, chunk: &Chunk, strip: bool, out: &mut Vec<u8>) -> Result<(), String>;
}

/// Emits the stored code bytes, followed by the debug section unless stripping.
#[derive(Clone, Copy, Debug, Default)]
pub struct VerbatimDumper;

impl ChunkDumper for VerbatimDumper {
    fn dump(&self, chunk: &Chunk, strip: bool, out: &mut Vec<u8>) -> Result<(), String> {
        out.extend_from_slice(&chunk.code);
        if !strip {
            out.extend_from_slice(&chunk.debug_info);
        }
        Ok(())
    }
}
