/// Implementation of `bsp png`.
///
/// Walks a PNG file with two schemas: the file schema (8-byte signature
/// followed by a forever-repeating chunk) and, for the `IHDR` chunk, a
/// header schema run by a second decoder over the chunk data.
///
/// # Output format
///
/// ```text
/// IHDR       13 bytes  crc=0x1F15C489  1x1, bit depth 8, colour type 6, interlace 0
/// IDAT       13 bytes  crc=0x89993D1D
/// IEND        0 bytes  crc=0xAE426082
/// ---
/// 3 chunks, 70 bytes
/// ```
use std::cell::RefCell;
use std::fs::File;
use std::rc::Rc;

use anyhow::{Context, Result, bail};
use bsp_decoder::{ByteOrder, Decoder, Field, Record, Repeat, Schema, Status};
use serde::Serialize;

use crate::{Globals, PngArgs};

/// The eight bytes every PNG file starts with.
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'];

/// Decoded `IHDR` chunk body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Ihdr {
    pub width: u64,
    pub height: u64,
    pub bit_depth: u64,
    pub color_type: u64,
    pub compression: u64,
    pub filter: u64,
    pub interlace: u64,
}

/// One chunk as reported.
#[derive(Clone, Debug, Serialize)]
pub struct ChunkInfo {
    pub kind: String,
    pub length: u64,
    pub crc: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ihdr: Option<Ihdr>,
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    file: String,
    bytes: usize,
    chunks: &'a [ChunkInfo],
}

/// Collected while the file decodes.
#[derive(Debug, Default)]
struct Walk {
    bad_signature: bool,
    ihdr: Option<Ihdr>,
    ihdr_error: Option<String>,
    chunks: Vec<ChunkInfo>,
}

/// Run the `bsp png` command.
///
/// # Errors
///
/// Returns an error if the file cannot be read, does not start with the
/// PNG signature, or ends inside a chunk.
pub fn run(args: &PngArgs, globals: &Globals) -> Result<()> {
    let file =
        File::open(&args.file).with_context(|| format!("cannot open {}", args.file.display()))?;

    let walk = Rc::new(RefCell::new(Walk::default()));
    let mut decoder = globals.decoder(ByteOrder::Big);
    decoder
        .activate(png_schema(&walk).context("invalid PNG schema")?)
        .context("cannot start decoding")?;
    let bytes = decoder
        .feed_reader(file)
        .with_context(|| format!("failed to decode {}", args.file.display()))?;
    tracing::debug!(bytes, status = ?decoder.status(), "png walk finished");

    let walk = walk.take();
    if walk.bad_signature {
        bail!("{} is not a PNG file", args.file.display());
    }
    if let Some(err) = walk.ihdr_error {
        bail!("malformed IHDR chunk: {err}");
    }
    if let Status::Truncated { field, missing, .. } = decoder.status() {
        bail!("file ends inside chunk {field} ({missing} bytes missing)");
    }

    if args.json {
        let report = Report {
            file: args.file.display().to_string(),
            bytes,
            chunks: &walk.chunks,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for chunk in &walk.chunks {
        print!("{:<6} {:>6} bytes  crc=0x{:08X}", chunk.kind, chunk.length, chunk.crc);
        if let Some(ihdr) = &chunk.ihdr {
            print!(
                "  {}x{}, bit depth {}, colour type {}, interlace {}",
                ihdr.width, ihdr.height, ihdr.bit_depth, ihdr.color_type, ihdr.interlace
            );
        }
        println!();
    }
    println!("---");
    println!(
        "{} chunk{}, {bytes} bytes",
        walk.chunks.len(),
        if walk.chunks.len() == 1 { "" } else { "s" }
    );
    Ok(())
}

/// Signature, then chunks until the input ends.
fn png_schema(walk: &Rc<RefCell<Walk>>) -> Result<Schema> {
    let on_signature = Rc::clone(walk);
    let on_data = Rc::clone(walk);
    let on_crc = Rc::clone(walk);

    let chunk = Schema::builder("chunk")
        .field("length", Field::u32())
        .field("type", Field::bytes(4))
        .field(
            "data",
            Field::bytes("length").on_decode(move |value, record, control| {
                if chunk_kind(record) != "IHDR" {
                    return;
                }
                let mut walk = on_data.borrow_mut();
                match value.as_bytes().map(parse_ihdr) {
                    Some(Ok(ihdr)) => walk.ihdr = Some(ihdr),
                    Some(Err(e)) => {
                        walk.ihdr_error = Some(format!("{e:#}"));
                        control.abort();
                    }
                    None => {}
                }
            }),
        )
        .field(
            "crc",
            Field::u32().on_decode(move |value, record, _| {
                let mut walk = on_crc.borrow_mut();
                let ihdr = walk.ihdr.take();
                walk.chunks.push(ChunkInfo {
                    kind: chunk_kind(record),
                    length: record.uint("length").unwrap_or(0),
                    crc: value.as_uint().unwrap_or(0),
                    ihdr,
                });
            }),
        )
        .repeat(Repeat::Forever)
        .build()?;

    let schema = Schema::builder("png")
        .field(
            "signature",
            Field::bytes(PNG_SIGNATURE.len()).on_decode(move |value, _, control| {
                if value.as_bytes().map(|b| &b[..]) != Some(&PNG_SIGNATURE[..]) {
                    on_signature.borrow_mut().bad_signature = true;
                    control.abort();
                }
            }),
        )
        .nested("chunk", chunk)
        .build()?;
    Ok(schema)
}

fn chunk_kind(record: &Record) -> String {
    record
        .bytes("type")
        .map(|b| String::from_utf8_lossy(b).into_owned())
        .unwrap_or_default()
}

/// Decode an `IHDR` body with its own decoder.
///
/// # Errors
///
/// Returns an error if the body is shorter than 13 bytes.
pub fn parse_ihdr(body: &bytes::Bytes) -> Result<Ihdr> {
    let schema = Schema::builder("IHDR")
        .field("width", Field::u32())
        .field("height", Field::u32())
        .field("bit_depth", Field::u8())
        .field("color_type", Field::u8())
        .field("compression", Field::u8())
        .field("filter", Field::u8())
        .field("interlace", Field::u8())
        .byte_order(ByteOrder::Big)
        .build()?;

    let mut decoder = Decoder::new();
    decoder.activate(schema)?;
    decoder.push(body.clone())?;
    decoder.end_stream()?;
    if let Status::Truncated { field, .. } = decoder.status() {
        bail!("IHDR body of {} bytes ends before {field}", body.len());
    }

    let ihdr = decoder
        .take_schemas()
        .pop()
        .context("IHDR schema was not returned")?;
    let get = |name: &str| ihdr.values().uint(name).unwrap_or(0);
    Ok(Ihdr {
        width: get("width"),
        height: get("height"),
        bit_depth: get("bit_depth"),
        color_type: get("color_type"),
        compression: get("compression"),
        filter: get("filter"),
        interlace: get("interlace"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ihdr_body() {
        let body = bytes::Bytes::from_static(&[
            0, 0, 0, 1, 0, 0, 0, 2, 8, 6, 0, 0, 0,
        ]);
        let ihdr = parse_ihdr(&body).unwrap();
        assert_eq!(ihdr.width, 1);
        assert_eq!(ihdr.height, 2);
        assert_eq!(ihdr.bit_depth, 8);
        assert_eq!(ihdr.color_type, 6);
    }

    #[test]
    fn short_ihdr_body_is_rejected() {
        let body = bytes::Bytes::from_static(&[0, 0, 0, 1]);
        assert!(parse_ihdr(&body).is_err());
    }
}
