use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where the bytes of an animation come from.
///
/// Opening may block; the loader only ever calls it on a worker thread or on
/// the thread that asked for a synchronous load.
pub trait ByteSource: Send + 'static {
    fn open(&self) -> io::Result<Box<dyn Read + Send>>;

    /// Human-readable name used in logs.
    fn describe(&self) -> String {
        "<animation>".to_string()
    }
}

/// Any `Fn` returning a fresh reader is a source.
impl<F> ByteSource for F
where
    F: Fn() -> io::Result<Box<dyn Read + Send>> + Send + 'static,
{
    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        self()
    }
}

#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSource { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for FileSource {
    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(&self.path)?))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// An animation already in memory, e.g. bundled with `include_bytes!`.
#[derive(Debug, Clone)]
pub struct BytesSource {
    name: String,
    bytes: Arc<[u8]>,
}

impl BytesSource {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        BytesSource {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

impl ByteSource for BytesSource {
    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(Arc::clone(&self.bytes))))
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}
