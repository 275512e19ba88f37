use serde_json::json;
use vgraph::{load_graph, serialize, Value};

fn load(doc: serde_json::Value) -> anyhow::Result<(vgraph::Heap, Value)> {
    load_graph(&serde_json::to_vec(&doc).expect("encode doc"))
}

fn encode_doc(doc: serde_json::Value) -> String {
    let (heap, root) = load(doc).expect("load graph");
    String::from_utf8(serialize(&heap, &root).expect("encode")).expect("utf-8")
}

#[test]
fn scalar_root() {
    let out = encode_doc(json!({
        "schema_version": "vgraph.graph@0.1.0",
        "root": "hello",
    }));
    assert_eq!(out, "string 5\nhello\n");
}

#[test]
fn cyclic_tables_by_name() {
    let out = encode_doc(json!({
        "schema_version": "vgraph.graph@0.1.0",
        "root": {"table": "a"},
        "tables": {
            "a": [["peer", {"table": "b"}]],
            "b": [["peer", {"table": "a"}], [1, 2.5]],
        },
    }));
    assert_eq!(
        out,
        "table 1\nstring 4\npeer\n\
         table 2\ninteger 1\nnumber 2.5\nstring 4\npeer\nref 0\n"
    );
}

#[test]
fn closures_share_named_upvals() {
    // "RgE=" and "RwE=" are base64 for "F\x01" and "G\x01".
    let out = encode_doc(json!({
        "schema_version": "vgraph.graph@0.1.0",
        "root": {"table": "api"},
        "tables": {"api": [["get", {"fn": "get"}], ["inc", {"fn": "inc"}]]},
        "upvals": {"n": 0},
        "closures": {
            "get": {"code_b64": "RwE=", "upvals": ["n"]},
            "inc": {"code_b64": "RgE=", "upvals": ["n"]},
        },
    }));
    assert_eq!(
        out,
        "table 2\n\
         string 3\nget\nfunction 1\ninteger 0\ncode 2\nG\x01\n\
         string 3\ninc\nfunction 1\nupref 1 1\ncode 2\nF\x01\n"
    );
}

#[test]
fn tagged_scalars() {
    let out = encode_doc(json!({
        "schema_version": "vgraph.graph@0.1.0",
        "root": {"table": "t"},
        "tables": {"t": [
            ["f", {"float": 3}],
            ["i", {"float": "-inf"}],
            ["z", {"bytes_b64": "AAE="}],
        ]},
    }));
    assert_eq!(
        out,
        "table 3\n\
         string 1\nf\nnumber 3.0\n\
         string 1\ni\nnumber -inf\n\
         string 1\nz\nstring 2\n\0\x01\n"
    );
}

#[test]
fn foreign_values_load_but_do_not_encode() {
    let (heap, root) = load(json!({
        "schema_version": "vgraph.graph@0.1.0",
        "root": {"foreign": "thread"},
    }))
    .unwrap();
    let err = serialize(&heap, &root).unwrap_err();
    assert_eq!(err.to_string(), "unsupported value of type thread");
}

#[test]
fn schema_version_mismatch_is_rejected() {
    let err = load(json!({"schema_version": "vgraph.graph@9", "root": null})).unwrap_err();
    assert!(
        format!("{err:#}").contains("schema_version mismatch"),
        "err={err:#}"
    );
}

#[test]
fn unknown_names_are_rejected_with_context() {
    let err = load(json!({
        "schema_version": "vgraph.graph@0.1.0",
        "root": {"table": "t"},
        "tables": {"t": [["x", {"table": "missing"}]]},
    }))
    .unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("unknown table \"missing\""), "msg={msg}");
    assert!(msg.contains("entry 0 value"), "msg={msg}");

    let err = load(json!({
        "schema_version": "vgraph.graph@0.1.0",
        "root": null,
        "closures": {"f": {"code_b64": "", "upvals": ["nope"]}},
    }))
    .unwrap_err();
    assert!(format!("{err:#}").contains("unknown upval \"nope\""));
}

#[test]
fn nan_key_is_a_heap_error() {
    let err = load(json!({
        "schema_version": "vgraph.graph@0.1.0",
        "root": {"table": "t"},
        "tables": {"t": [[{"float": "nan"}, 1]]},
    }))
    .unwrap_err();
    assert!(format!("{err:#}").contains("table index is NaN"));
}

#[test]
fn malformed_tagged_values_are_rejected() {
    for root in [
        json!([1, 2]),
        json!({"table": "t", "fn": "f"}),
        json!({"mystery": 1}),
        json!({"bytes_b64": "***"}),
    ] {
        let res = load(json!({"schema_version": "vgraph.graph@0.1.0", "root": root}));
        assert!(res.is_err(), "root={root}");
    }
}
