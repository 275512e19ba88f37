//! Shared, version-pinned protocol identifiers.
//!
//! These constants are the single source of truth for schema/version strings that
//! appear in machine-readable I/O: graph documents read by the host and the JSON
//! reports it writes next to encoded output.

pub const GRAPH_SCHEMA_VERSION: &str = "vgraph.graph@0.1.0";
pub const ENCODE_OPTIONS_SCHEMA_VERSION: &str = "vgraph.encode.options@0.1.0";

pub const ENCODE_REPORT_SCHEMA_VERSION: &str = "vgraph.encode.report@0.1.0";
pub const VERIFY_REPORT_SCHEMA_VERSION: &str = "vgraph.verify.report@0.1.0";
