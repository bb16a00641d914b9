/// Implementation of `bsp lpstr`.
///
/// Decodes a file of length-prefixed records (`u32` length, then that many
/// bytes) and prints each one as lossy UTF-8.
///
/// # Output format
///
/// ```text
/// 0: "hello" (5 bytes)
/// 1: "" (0 bytes)
/// ---
/// 2 records
/// ```
use std::cell::RefCell;
use std::fs::File;
use std::rc::Rc;

use anyhow::{Context, Result, bail};
use bsp_decoder::{Field, Repeat, Schema, Status};

use crate::{Globals, LpstrArgs};

/// Run the `bsp lpstr` command.
///
/// # Errors
///
/// Returns an error if the file cannot be read or ends inside a record.
pub fn run(args: &LpstrArgs, globals: &Globals) -> Result<()> {
    let file =
        File::open(&args.file).with_context(|| format!("cannot open {}", args.file.display()))?;

    let count = Rc::new(RefCell::new(0usize));
    let printed = Rc::clone(&count);

    let schema = Schema::builder("lpstr")
        .field("size", Field::u32())
        .field(
            "data",
            Field::bytes("size").on_decode(move |value, _, _| {
                let data = value.as_bytes().map(|b| &b[..]).unwrap_or_default();
                let mut n = printed.borrow_mut();
                println!(
                    "{n}: {:?} ({} bytes)",
                    String::from_utf8_lossy(data),
                    data.len()
                );
                *n += 1;
            }),
        )
        .repeat(Repeat::Forever)
        .build()
        .context("invalid record schema")?;

    let mut decoder = globals.decoder(args.byte_order);
    decoder.activate(schema).context("cannot start decoding")?;
    let bytes = decoder
        .feed_reader(file)
        .with_context(|| format!("failed to decode {}", args.file.display()))?;
    tracing::debug!(
        bytes,
        records = *count.borrow(),
        status = ?decoder.status(),
        "lpstr decode finished"
    );

    if let Status::Truncated { field, missing, .. } = decoder.status() {
        bail!("file ends inside record field {field} ({missing} bytes missing)");
    }

    let n = *count.borrow();
    println!("---");
    println!("{n} record{}", if n == 1 { "" } else { "s" });
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    use bsp_decoder::ByteOrder;

    use super::*;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn run_logs_a_summary_at_debug_level() {
        let path = std::env::temp_dir().join(format!("bsp-lpstr-{}.bin", std::process::id()));
        std::fs::write(&path, [2, 0, 0, 0, b'h', b'i', 1, 0, 0, 0, b'!']).unwrap();

        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let args = LpstrArgs {
            file: path.clone(),
            byte_order: ByteOrder::Little,
        };
        let globals = Globals {
            verbose: false,
            chunk_size: 4,
        };
        let result = tracing::subscriber::with_default(subscriber, || run(&args, &globals));
        std::fs::remove_file(&path).unwrap();
        result.unwrap();

        let logs = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("lpstr decode finished"), "{logs}");
        assert!(logs.contains("bytes=11"), "{logs}");
        assert!(logs.contains("records=2"), "{logs}");
    }
}
