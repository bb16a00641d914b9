//! Shared fixtures and helpers for the BSP integration tests and benches.
//!
//! [`Trace`] records every callback a decode fires as one line of text, so
//! tests can compare whole decode sequences (and snapshot them) instead of
//! asserting on individual values.

use std::cell::RefCell;
use std::rc::Rc;

use bsp_decoder::{Control, Decoder, Field, Record, Repeat, RepeatValue, Schema, Value};

/// A 1x1 RGBA PNG: signature, `IHDR`, one `IDAT`, `IEND`.
pub const PNG_1X1_HEX: &str = "89504e470d0a1a0a\
    0000000d494844520000000100000001080600000\
    01f15c489\
    0000000d49444154789c63f8cfc0f01f00050001ff89993d1d\
    0000000049454e44ae426082";

/// Decode a hex fixture. Whitespace is ignored.
///
/// # Panics
///
/// If `text` is not valid hex.
#[must_use]
pub fn fixture(text: &str) -> Vec<u8> {
    let clean: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(clean).expect("fixture is valid hex")
}

#[must_use]
pub fn png_1x1() -> Vec<u8> {
    fixture(PNG_1X1_HEX)
}

/// Ordered log of decode callbacks.
#[derive(Clone, Debug, Default)]
pub struct Trace(Rc<RefCell<Vec<String>>>);

impl Trace {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a logging callback to `field`. Integers are logged in
    /// decimal, bytes as hex.
    #[must_use]
    pub fn field(&self, name: &'static str, field: Field) -> Field {
        let log = Rc::clone(&self.0);
        field.on_decode(move |value, _, _| log.borrow_mut().push(format!("{name} = {}", show(value))))
    }

    /// A completion hook that logs `label` and the repeat value.
    pub fn finished(
        &self,
        label: &'static str,
    ) -> impl FnMut(RepeatValue, &Record, &mut Control) + 'static {
        let log = Rc::clone(&self.0);
        move |repeat, _, _| {
            let times = match repeat {
                RepeatValue::Count(n) => n.to_string(),
                RepeatValue::Forever => "forever".to_owned(),
            };
            log.borrow_mut().push(format!("{label} done x{times}"));
        }
    }

    /// Log an arbitrary line, e.g. from a hand-written callback.
    pub fn note(&self, line: impl Into<String>) {
        self.0.borrow_mut().push(line.into());
    }

    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    /// All lines joined with newlines, for snapshots.
    #[must_use]
    pub fn render(&self) -> String {
        self.0.borrow().join("\n")
    }
}

fn show(value: &Value) -> String {
    match value {
        Value::Uint(n) => n.to_string(),
        Value::Bytes(b) => format!("[{}]", hex::encode(b)),
    }
}

/// `{size: u32, data: bytes(size)}`, traced.
///
/// # Panics
///
/// Never for this fixed declaration.
#[must_use]
pub fn sized_string(trace: &Trace) -> Schema {
    Schema::builder("string")
        .field("size", trace.field("size", Field::u32()))
        .field("data", trace.field("data", Field::bytes("size")))
        .on_finished(trace.finished("string"))
        .build()
        .expect("valid schema")
}

/// Forever-repeating `{len: u8, body: bytes(len)}` records, traced.
///
/// # Panics
///
/// Never for this fixed declaration.
#[must_use]
pub fn u8_records(trace: &Trace) -> Schema {
    Schema::builder("record")
        .field("len", trace.field("len", Field::u8()))
        .field("body", trace.field("body", Field::bytes("len")))
        .on_finished(trace.finished("record"))
        .repeat(Repeat::Forever)
        .build()
        .expect("valid schema")
}

/// Push `input` into `decoder` in chunks of `size` bytes.
///
/// # Panics
///
/// If the decoder reports an error.
pub fn push_chunked(decoder: &mut Decoder, input: &[u8], size: usize) {
    for chunk in input.chunks(size.max(1)) {
        decoder
            .push(bytes::Bytes::copy_from_slice(chunk))
            .expect("push succeeds");
    }
}
