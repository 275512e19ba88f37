//! JSON graph documents.
//!
//! A document names every table, captured variable and closure so that
//! cycles and shared captures can be written down:
//!
//! ```json
//! {
//!   "schema_version": "vgraph.graph@0.1.0",
//!   "root": {"table": "t"},
//!   "tables": {"t": [["self", {"table": "t"}], [1, {"fn": "f"}]]},
//!   "upvals": {"counter": 0},
//!   "closures": {"f": {"code_b64": "G0x1YQ==", "upvals": ["counter"]}}
//! }
//! ```
//!
//! Scalars are JSON scalars (integers stay integers, other numbers are
//! floats, strings are their UTF-8 bytes). Tagged objects cover the rest:
//! `{"float": 1}` / `{"float": "inf"}`, `{"bytes_b64": ".."}`,
//! `{"table": name}`, `{"fn": name}` and `{"foreign": type_name}`.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use base64::Engine as _;
use serde::Deserialize;
use serde_json::Value as Json;

use crate::heap::Heap;
use crate::value::{Chunk, ClosureRef, TableRef, UpvalRef, Value};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphDoc {
    pub schema_version: String,
    pub root: Json,
    #[serde(default)]
    pub tables: BTreeMap<String, Vec<(Json, Json)>>,
    #[serde(default)]
    pub upvals: BTreeMap<String, Json>,
    #[serde(default)]
    pub closures: BTreeMap<String, ClosureDoc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClosureDoc {
    pub code_b64: String,
    #[serde(default)]
    pub debug_b64: Option<String>,
    #[serde(default)]
    pub upvals: Vec<String>,
}

/// Parses a graph document and builds it on a fresh heap.
pub fn load_graph(bytes: &[u8]) -> Result<(Heap, Value)> {
    let doc: GraphDoc = serde_json::from_slice(bytes).context("parse graph document JSON")?;
    build_graph(&doc)
}

pub fn build_graph(doc: &GraphDoc) -> Result<(Heap, Value)> {
    if doc.schema_version != vgraph_contracts::GRAPH_SCHEMA_VERSION {
        anyhow::bail!(
            "graph schema_version mismatch: expected {} got {:?}",
            vgraph_contracts::GRAPH_SCHEMA_VERSION,
            doc.schema_version
        );
    }

    let mut builder = Builder::default();

    // Allocate every named object first so contents may refer to any of them.
    for name in doc.tables.keys() {
        let t = builder.heap.new_table()?;
        builder.tables.insert(name.clone(), t);
    }
    for name in doc.upvals.keys() {
        let u = builder.heap.new_upval(Value::Nil)?;
        builder.upvals.insert(name.clone(), u);
    }
    for (name, closure) in &doc.closures {
        let f = builder
            .new_closure(closure)
            .with_context(|| format!("closure {name:?}"))?;
        builder.closures.insert(name.clone(), f);
    }

    for (name, value) in &doc.upvals {
        let v = builder
            .value(value)
            .with_context(|| format!("upval {name:?}"))?;
        let u = builder.upvals[name];
        builder.heap.set_upval(u, v)?;
    }
    for (name, entries) in &doc.tables {
        let t = builder.tables[name];
        for (idx, (key, value)) in entries.iter().enumerate() {
            let k = builder
                .value(key)
                .with_context(|| format!("table {name:?} entry {idx} key"))?;
            let v = builder
                .value(value)
                .with_context(|| format!("table {name:?} entry {idx} value"))?;
            builder
                .heap
                .set(t, k, v)
                .with_context(|| format!("table {name:?} entry {idx}"))?;
        }
    }

    let root = builder.value(&doc.root).context("root")?;
    Ok((builder.heap, root))
}

#[derive(Default)]
struct Builder {
    heap: Heap,
    tables: BTreeMap<String, TableRef>,
    upvals: BTreeMap<String, UpvalRef>,
    closures: BTreeMap<String, ClosureRef>,
}

impl Builder {
    fn new_closure(&mut self, doc: &ClosureDoc) -> Result<ClosureRef> {
        let b64 = base64::engine::general_purpose::STANDARD;
        let code = b64.decode(&doc.code_b64).context("decode code_b64")?;
        let debug_info = match &doc.debug_b64 {
            Some(s) => b64.decode(s).context("decode debug_b64")?,
            None => Vec::new(),
        };
        let mut upvals = Vec::with_capacity(doc.upvals.len());
        for name in &doc.upvals {
            let u = self
                .upvals
                .get(name)
                .copied()
                .with_context(|| format!("unknown upval {name:?}"))?;
            upvals.push(u);
        }
        Ok(self
            .heap
            .new_closure(Chunk::with_debug_info(code, debug_info), upvals)?)
    }

    fn value(&mut self, v: &Json) -> Result<Value> {
        match v {
            Json::Null => Ok(Value::Nil),
            Json::Bool(b) => Ok(Value::Boolean(*b)),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Integer(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Value::Float(f))
                } else {
                    anyhow::bail!("unrepresentable number {n}")
                }
            }
            Json::String(s) => Ok(Value::String(s.as_bytes().to_vec())),
            Json::Array(_) => anyhow::bail!("arrays are not values; use a table"),
            Json::Object(obj) => {
                let mut it = obj.iter();
                let (tag, arg) = match (it.next(), it.next()) {
                    (Some(pair), None) => pair,
                    _ => anyhow::bail!("tagged value must have exactly one key"),
                };
                self.tagged(tag, arg)
            }
        }
    }

    fn tagged(&mut self, tag: &str, arg: &Json) -> Result<Value> {
        match tag {
            "float" => Ok(Value::Float(parse_float(arg)?)),
            "bytes_b64" => {
                let s = arg.as_str().context("bytes_b64 expects a string")?;
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(s)
                    .context("decode bytes_b64")?;
                Ok(Value::String(bytes))
            }
            "table" => {
                let name = arg.as_str().context("table expects a name")?;
                let t = self
                    .tables
                    .get(name)
                    .copied()
                    .with_context(|| format!("unknown table {name:?}"))?;
                Ok(Value::Table(t))
            }
            "fn" => {
                let name = arg.as_str().context("fn expects a name")?;
                let f = self
                    .closures
                    .get(name)
                    .copied()
                    .with_context(|| format!("unknown closure {name:?}"))?;
                Ok(Value::Function(f))
            }
            "foreign" => {
                let type_name = arg.as_str().context("foreign expects a type name")?;
                Ok(Value::Foreign(self.heap.new_foreign(type_name)?))
            }
            other => anyhow::bail!("unknown value tag {other:?}"),
        }
    }
}

fn parse_float(arg: &Json) -> Result<f64> {
    match arg {
        Json::Number(n) => n.as_f64().with_context(|| format!("bad float {n}")),
        Json::String(s) => match s.as_str() {
            "inf" => Ok(f64::INFINITY),
            "-inf" => Ok(f64::NEG_INFINITY),
            "nan" => Ok(f64::NAN),
            other => other
                .parse::<f64>()
                .with_context(|| format!("bad float {other:?}")),
        },
        _ => anyhow::bail!("float expects a number or string"),
    }
}
