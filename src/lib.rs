//! Loads Lottie compositions from arbitrary byte sources.
//!
//! [`load_sync`] parses on the calling thread. [`Loader`] runs parses on a
//! worker pool and hands every outcome to one dispatcher thread, so listeners
//! never run concurrently with each other.

pub mod loader;
pub mod source;

pub use loader::{load_sync, Cancellable, Loader, LoaderError};
pub use source::{ByteSource, BytesSource, FileSource};

pub use lottie_core;
pub use lottie_core::{Composition, ErrorKind, ParseError};
