#![warn(clippy::pedantic)]

pub mod config;
pub mod control;
pub mod decoder;
pub mod error;
pub mod field;
pub mod observer;
pub mod schema;
pub mod value;

mod reader;

pub use bsp_stream::ByteStream;
pub use config::DecoderConfig;
pub use control::Control;
pub use decoder::{CompletionHook, Decoder, Status};
pub use error::{DecodeError, SchemaError};
pub use field::{Field, FieldCallback, FieldType, SizeSource};
pub use observer::{DecodeObserver, NoopObserver, TracingObserver};
pub use schema::{FinishHook, Repeat, RepeatValue, Schema, SchemaBuilder};
pub use value::{ByteOrder, Record, Value};
