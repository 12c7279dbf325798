//! Decorator streams.
//!
//! Decorators wrap another [`Stream`](crate::Stream) and add behavior
//! (buffering, on-the-fly compression) without changing the caller-visible
//! interface.

pub mod buffered;
pub mod compressed;

pub use buffered::{BufferedInputStream, BufferedOutputStream};
pub use compressed::{CompressedInputStream, CompressedOutputStream};
