#![warn(clippy::pedantic)]

pub mod error;
pub mod stream;

pub use error::StreamError;
pub use stream::ByteStream;
