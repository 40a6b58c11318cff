//! Filesystem abstraction the spec readers walk over
//!
//! `OsFs` maps onto the local disk under a base directory, `MemFs` keeps a
//! tree in memory for tests. Both report symlinks without following them.

mod memory;
mod os;

pub use memory::MemFs;
pub use os::OsFs;

use std::io;
use std::path::Path;

/// Kind of a filesystem entry, as seen without following symlinks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
}

/// One child of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl DirEntry {
    /// Dot-prefixed entries are skipped by every walk
    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('.')
    }
}

/// Operations the spec subsystem needs from a filesystem
pub trait SpecFs: Send + Sync {
    /// Kind of the entry at `path`; `NotFound` when absent
    fn kind(&self, path: &Path) -> io::Result<EntryKind>;

    /// Children of the directory at `path`, sorted by name
    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>>;

    /// Whole content of the file at `path`
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Create `path` and every missing parent
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Create or truncate the file at `path` and write `contents`
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    fn exists(&self, path: &Path) -> bool {
        self.kind(path).is_ok()
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.kind(path), Ok(EntryKind::Dir))
    }
}
