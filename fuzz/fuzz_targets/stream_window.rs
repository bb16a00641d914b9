#![no_main]

use arbitrary::Arbitrary;
use bsp_stream::ByteStream;
use libfuzzer_sys::fuzz_target;

// Fuzz target: ByteStream windows and retirement against a flat Vec.
//
// Catches bugs in:
// - Windows starting or ending on chunk boundaries
// - Partial retirement of the head chunk
// - Over-retirement debt swallowed by later pushes

#[derive(Debug, Arbitrary)]
enum Op {
    Push(Vec<u8>),
    Retire(u8),
    Window(u16, u16),
}

fuzz_target!(|ops: Vec<Op>| {
    let mut stream = ByteStream::new();
    let mut flat: Vec<u8> = Vec::new();
    let mut debt = 0usize;

    for op in ops {
        match op {
            Op::Push(chunk) => {
                let owed = debt.min(chunk.len());
                debt -= owed;
                flat.extend_from_slice(&chunk[owed..]);
                stream.push(chunk);
            }
            Op::Retire(n) => {
                let n = usize::from(n);
                let dropped = n.min(flat.len());
                flat.drain(..dropped);
                debt += n - dropped;
                stream.retire(n);
            }
            Op::Window(a, b) => {
                let (start, end) = (usize::from(a), usize::from(b));
                match stream.window(start, end) {
                    Ok(bytes) => assert_eq!(&bytes[..], &flat[start..end]),
                    Err(_) => assert!(start > end || end > flat.len()),
                }
            }
        }
        assert_eq!(stream.available(), flat.len());
        assert_eq!(&stream.linearize()[..], &flat[..]);
    }
});
