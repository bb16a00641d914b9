//! Chunk-boundary independence, byte order and starvation.
//!
//! The same input must produce the same callback sequence however it is
//! split across pushes. Each test decodes once in a single chunk and
//! compares every other split against that baseline.

use bsp_decoder::{ByteOrder, Decoder, Field, Schema, Status};
use bsp_tests::{Trace, fixture, push_chunked, sized_string, u8_records};
use insta::assert_snapshot;

const STRING_12345: &str = "05000000 3132333435";

fn decode_in_chunks(input: &[u8], size: usize) -> (Vec<String>, Status) {
    let trace = Trace::new();
    let mut decoder = Decoder::new();
    decoder.activate(sized_string(&trace)).unwrap();
    push_chunked(&mut decoder, input, size);
    (trace.lines(), decoder.status().clone())
}

fn single_u32(order: Option<ByteOrder>, trace: &Trace) -> Schema {
    let builder = Schema::builder("word").field("n", trace.field("n", Field::u32()));
    let builder = match order {
        Some(order) => builder.byte_order(order),
        None => builder,
    };
    builder.build().unwrap()
}

// ── Round trip ────────────────────────────────────────────────────────────────

#[test]
fn sized_string_round_trip() {
    let trace = Trace::new();
    let mut decoder = Decoder::new();
    decoder.activate(sized_string(&trace)).unwrap();
    decoder.push(fixture(STRING_12345)).unwrap();

    assert_snapshot!(trace.render(), @r"
    size = 5
    data = [3132333435]
    string done x1
    ");
    assert_eq!(decoder.status(), &Status::Finished);
    assert_eq!(decoder.offset(), 9);

    let schemas = decoder.take_schemas();
    assert_eq!(schemas.len(), 1);
    assert_eq!(schemas[0].values().uint("size"), Some(5));
    assert_eq!(
        schemas[0].values().bytes("data").map(|b| &b[..]),
        Some(&b"12345"[..])
    );
}

// ── Chunk independence ────────────────────────────────────────────────────────

#[test]
fn every_chunk_size_gives_the_same_trace() {
    let input = fixture(STRING_12345);
    let (baseline, status) = decode_in_chunks(&input, input.len());
    assert_eq!(status, Status::Finished);

    for size in 1..input.len() {
        let (lines, status) = decode_in_chunks(&input, size);
        assert_eq!(lines, baseline, "chunk size {size}");
        assert_eq!(status, Status::Finished, "chunk size {size}");
    }
}

#[test]
fn every_two_way_split_gives_the_same_trace() {
    let input = fixture("02 6869 00 03 414243 01 7a");
    let run = |split: usize| {
        let trace = Trace::new();
        let mut decoder = Decoder::new();
        decoder.activate(u8_records(&trace)).unwrap();
        decoder.push(input[..split].to_vec()).unwrap();
        decoder.push(input[split..].to_vec()).unwrap();
        decoder.end_stream().unwrap();
        (trace.lines(), decoder.status().clone())
    };

    let (baseline, status) = run(input.len());
    assert_eq!(status, Status::Ended);
    assert_eq!(baseline.len(), 4 * 3);

    for split in 0..input.len() {
        assert_eq!(run(split), (baseline.clone(), Status::Ended), "split at {split}");
    }
}

#[test]
fn one_chunk_and_four_single_bytes_agree() {
    let whole = Trace::new();
    let mut decoder = Decoder::new();
    decoder.activate(single_u32(None, &whole)).unwrap();
    decoder.push(fixture("05000000")).unwrap();

    let bytewise = Trace::new();
    let mut decoder = Decoder::new();
    decoder.activate(single_u32(None, &bytewise)).unwrap();
    for byte in fixture("05000000") {
        decoder.push(vec![byte]).unwrap();
    }

    assert_eq!(whole.lines(), ["n = 5"]);
    assert_eq!(bytewise.lines(), whole.lines());
}

// ── Byte order ────────────────────────────────────────────────────────────────

#[test]
fn little_endian_by_default() {
    let trace = Trace::new();
    let mut decoder = Decoder::new();
    decoder.activate(single_u32(None, &trace)).unwrap();
    decoder.push(fixture("05000000")).unwrap();

    assert_eq!(trace.lines(), ["n = 5"]);
}

#[test]
fn big_endian_decoder_default() {
    let trace = Trace::new();
    let mut decoder = Decoder::new();
    decoder.set_byte_order(ByteOrder::Big);
    decoder.activate(single_u32(None, &trace)).unwrap();
    decoder.push(fixture("05000000")).unwrap();

    assert_eq!(trace.lines(), ["n = 83886080"]);
}

#[test]
fn schema_byte_order_overrides_decoder() {
    let trace = Trace::new();
    let mut decoder = Decoder::new();
    decoder.activate(single_u32(Some(ByteOrder::Big), &trace)).unwrap();
    decoder.push(fixture("05000000")).unwrap();

    assert_eq!(trace.lines(), ["n = 83886080"]);
}

#[test]
fn byte_order_is_fixed_at_activation() {
    let trace = Trace::new();
    let mut decoder = Decoder::new();
    decoder.activate(single_u32(None, &trace)).unwrap();
    // Too late for the active schema
    decoder.set_byte_order(ByteOrder::Big);
    decoder.push(fixture("05000000")).unwrap();

    assert_eq!(trace.lines(), ["n = 5"]);
    assert_eq!(decoder.take_schemas()[0].byte_order(), Some(ByteOrder::Little));
}

#[test]
fn u16_in_both_orders() {
    for (order, expected) in [(ByteOrder::Little, "n = 513"), (ByteOrder::Big, "n = 258")] {
        let trace = Trace::new();
        let schema = Schema::builder("half")
            .field("n", trace.field("n", Field::u16()))
            .byte_order(order)
            .build()
            .unwrap();
        let mut decoder = Decoder::new();
        decoder.activate(schema).unwrap();
        decoder.push(fixture("0102")).unwrap();

        assert_eq!(trace.lines(), [expected]);
    }
}

// ── Starvation ────────────────────────────────────────────────────────────────

#[test]
fn waiting_reports_the_starving_field() {
    let trace = Trace::new();
    let mut decoder = Decoder::new();
    decoder.activate(sized_string(&trace)).unwrap();

    decoder.push(fixture("0500")).unwrap();
    assert_eq!(
        decoder.status(),
        &Status::Waiting {
            schema: "string".into(),
            field: "size".into(),
            needed: 4,
            available: 2,
        }
    );
    assert!(trace.lines().is_empty());

    decoder.push(fixture("0000 31")).unwrap();
    assert_eq!(
        decoder.status(),
        &Status::Waiting {
            schema: "string".into(),
            field: "data".into(),
            needed: 5,
            available: 1,
        }
    );
    assert_eq!(trace.lines(), ["size = 5"]);
    assert_eq!(decoder.offset(), 4);

    decoder.push(fixture("32333435")).unwrap();
    assert_eq!(decoder.status(), &Status::Finished);
}

#[test]
fn bytes_buffered_before_activation_are_decoded() {
    let trace = Trace::new();
    let mut decoder = Decoder::with_stream(fixture(STRING_12345).into());
    assert_eq!(decoder.status(), &Status::Idle);

    decoder.activate(sized_string(&trace)).unwrap();
    assert_eq!(decoder.status(), &Status::Finished);
    assert_eq!(trace.lines().len(), 3);
}
