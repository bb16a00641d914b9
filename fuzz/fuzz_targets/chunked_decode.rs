#![no_main]

use std::cell::RefCell;
use std::rc::Rc;

use arbitrary::Arbitrary;
use bsp_decoder::{ByteOrder, Decoder, Field, Repeat, Schema, Status};
use libfuzzer_sys::fuzz_target;

// Fuzz target: the same bytes split at arbitrary points must decode to
// the same sequence of values and end in the same status.
//
// Input format:
//   data:       the byte stream
//   cuts:       chunk lengths, cycled until `data` is used up (0 → 1)
//   big_endian: decoder default byte order

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    data: Vec<u8>,
    cuts: Vec<u8>,
    big_endian: bool,
}

fn record(log: &Rc<RefCell<Vec<String>>>) -> Schema {
    let on_size = Rc::clone(log);
    let on_body = Rc::clone(log);
    Schema::builder("record")
        .field(
            "size",
            Field::u16().on_decode(move |v, _, _| on_size.borrow_mut().push(format!("size {v}"))),
        )
        .field(
            "body",
            Field::bytes("size").on_decode(move |v, _, _| {
                on_body
                    .borrow_mut()
                    .push(format!("body {:?}", v.as_bytes().map(|b| b.to_vec())));
            }),
        )
        .repeat(Repeat::Forever)
        .build()
        .unwrap()
}

fn run(input: &FuzzInput, whole: bool) -> (Vec<String>, Status, usize) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut decoder = Decoder::new();
    if input.big_endian {
        decoder.set_byte_order(ByteOrder::Big);
    }
    decoder.activate(record(&log)).unwrap();

    if whole || input.cuts.is_empty() {
        decoder.push(input.data.clone()).unwrap();
    } else {
        let mut pos = 0;
        for cut in input.cuts.iter().cycle() {
            if pos >= input.data.len() {
                break;
            }
            let end = (pos + usize::from((*cut).max(1))).min(input.data.len());
            decoder.push(input.data[pos..end].to_vec()).unwrap();
            pos = end;
        }
    }
    decoder.end_stream().unwrap();

    let lines = log.borrow().clone();
    (lines, decoder.status().clone(), decoder.offset())
}

fuzz_target!(|input: FuzzInput| {
    assert_eq!(run(&input, true), run(&input, false));
});
