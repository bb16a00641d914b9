#![no_main]

use bsp_decoder::{Decoder, Field, Repeat, Schema};
use libfuzzer_sys::fuzz_target;

// Fuzz target: arbitrary bytes through a nested, sibling-sized schema.
//
// Catches bugs in:
// - Sizes and repeat counts taken from hostile input
// - Descending into and unwinding nested schemas
// - End-of-stream in the middle of a field or a cycle
fuzz_target!(|data: &[u8]| {
    let item = Schema::builder("item")
        .field("len", Field::u8())
        .field("body", Field::bytes("len"))
        .repeat(Repeat::Sibling("count".into()))
        .build()
        .unwrap();
    let frame = Schema::builder("frame")
        .field("count", Field::u8())
        .nested("items", item)
        .field("crc", Field::u16())
        .repeat(Repeat::Forever)
        .build()
        .unwrap();

    let mut decoder = Decoder::new();
    decoder.activate(frame).unwrap();
    let _ = decoder.push(data.to_vec());
    let _ = decoder.end_stream();

    assert!(!decoder.is_active());
    assert!(decoder.offset() <= data.len());
});
