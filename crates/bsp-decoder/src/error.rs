use bsp_stream::StreamError;

/// Errors raised while defining a schema.
///
/// These surface synchronously from
/// [`SchemaBuilder::build`](crate::schema::SchemaBuilder::build), before
/// any byte is decoded.
///
/// ```text
///   SchemaError
///   ├── EmptyEntryName       ← entry declared with ""
///   ├── DuplicateEntry       ← two entries share a name
///   ├── EmptySizeSource      ← bytes field sized by sibling ""
///   ├── EmptyRepeatSource    ← repeat count taken from sibling ""
///   └── EmptyForever         ← forever schema with nothing to decode
/// ```
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("schema {schema}: entry name must not be empty")]
    EmptyEntryName { schema: String },

    #[error("schema {schema}: entry {entry} declared twice")]
    DuplicateEntry { schema: String, entry: String },

    #[error("schema {schema}: field {entry} takes its size from an empty sibling name")]
    EmptySizeSource { schema: String, entry: String },

    #[error("schema {schema}: repeat count refers to an empty sibling name")]
    EmptyRepeatSource { schema: String },

    /// A forever schema with no entries would re-enter without ever
    /// consuming a byte.
    #[error("schema {schema}: repeats forever but declares no entries")]
    EmptyForever { schema: String },
}

/// Errors that can occur while decoding.
///
/// Starvation and end-of-input are not errors: they are reported through
/// [`Status`](crate::decoder::Status). What remains are caller mistakes
/// that only show up once data flows, plus failures of the underlying
/// stream or reader. The decoder aborts before returning any of these.
///
/// ```text
///   DecodeError
///   ├── UnresolvedSize     ← bytes field's size sibling missing / not an integer
///   ├── UnresolvedRepeat   ← nested schema's repeat sibling missing / not an integer
///   ├── SizeTooLarge       ← resolved size does not fit in memory addressing
///   ├── Stream(StreamError)
///   └── Io(std::io::Error) ← from the reader drivers
/// ```
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("schema {schema}: size of field {field} refers to {source_name}, which holds no integer")]
    UnresolvedSize {
        schema: String,
        field: String,
        source_name: String,
    },

    /// `schema` is the schema whose repeat could not be resolved; `parent`
    /// is the schema whose record was searched (empty for a detached
    /// schema, which has no parent record to look in).
    #[error("schema {schema}: repeat refers to {source_name}, which holds no integer in {parent:?}")]
    UnresolvedRepeat {
        schema: String,
        parent: String,
        source_name: String,
    },

    #[error("schema {schema}: field {field} resolved to {size} bytes, too large to buffer")]
    SizeTooLarge {
        schema: String,
        field: String,
        size: u64,
    },

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
