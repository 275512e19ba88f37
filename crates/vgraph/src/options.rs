use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::buffer::DEFAULT_INITIAL_CAPACITY;

/// Per-call encoder settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncodeOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    /// Drop debug sections from closure bodies.
    pub strip: bool,
    pub initial_capacity: usize,
    pub max_output_bytes: Option<usize>,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            schema_version: None,
            strip: true,
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            max_output_bytes: None,
        }
    }
}

impl EncodeOptions {
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        let opts: EncodeOptions =
            serde_json::from_slice(bytes).context("parse encode options JSON")?;
        if let Some(v) = opts.schema_version.as_deref() {
            if v != vgraph_contracts::ENCODE_OPTIONS_SCHEMA_VERSION {
                anyhow::bail!(
                    "encode options schema_version mismatch: expected {} got {:?}",
                    vgraph_contracts::ENCODE_OPTIONS_SCHEMA_VERSION,
                    v
                );
            }
        }
        Ok(opts)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
        Self::from_json_slice(&bytes).with_context(|| format!("load {}", path.display()))
    }
}
