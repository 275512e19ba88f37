#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let data = if data.len() > 64 * 1024 {
        &data[..64 * 1024]
    } else {
        data
    };

    let Ok((heap, root)) = vgraph::load_graph(data) else {
        return;
    };

    if let Ok(bytes) = vgraph::serialize(&heap, &root) {
        assert!(bytes.ends_with(b"\n"));
    }
});
