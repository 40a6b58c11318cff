//! In-memory implementation of `SpecFs`, mostly for tests

use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{DirEntry, EntryKind, SpecFs};

#[derive(Debug, Clone)]
enum Node {
    File(Vec<u8>),
    Dir,
    Symlink,
}

impl Node {
    fn kind(&self) -> EntryKind {
        match self {
            Node::File(_) => EntryKind::File,
            Node::Dir => EntryKind::Dir,
            Node::Symlink => EntryKind::Symlink,
        }
    }
}

/// In-memory filesystem. Writing a file creates its missing parents.
#[derive(Debug, Default)]
pub struct MemFs {
    nodes: RwLock<BTreeMap<PathBuf, Node>>,
}

/// Drop `.` components and fold `..`, so equal paths share one key
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} does not exist", path.display()),
    )
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder for tests: write a UTF-8 file, creating parents.
    ///
    /// Panics when `path` clashes with an existing directory.
    pub fn with_file(self, path: impl AsRef<Path>, contents: &str) -> Self {
        if let Err(e) = self.write(path.as_ref(), contents.as_bytes()) {
            panic!("MemFs::with_file({}): {}", path.as_ref().display(), e);
        }
        self
    }

    /// Record a symlink entry. Its target is irrelevant since walks never follow it.
    pub fn symlink(&self, link: impl AsRef<Path>) -> io::Result<()> {
        let link = normalize(link.as_ref());
        if let Some(parent) = link.parent() {
            self.create_dir_all(parent)?;
        }
        self.write_lock().insert(link, Node::Symlink);
        Ok(())
    }

    /// Remove a file or a whole subtree
    pub fn remove_all(&self, path: impl AsRef<Path>) {
        let path = normalize(path.as_ref());
        self.write_lock()
            .retain(|key, _| !(key == &path || key.starts_with(&path)));
    }

    fn read_lock(&self) -> RwLockReadGuard<'_, BTreeMap<PathBuf, Node>> {
        self.nodes.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_lock(&self) -> RwLockWriteGuard<'_, BTreeMap<PathBuf, Node>> {
        self.nodes.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn insert_dirs(nodes: &mut BTreeMap<PathBuf, Node>, path: &Path) -> io::Result<()> {
        let mut current = PathBuf::new();
        for component in path.components() {
            current.push(component);
            match nodes.get(&current) {
                Some(Node::Dir) => {}
                Some(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        format!("{} exists and is not a directory", current.display()),
                    ))
                }
                None => {
                    nodes.insert(current.clone(), Node::Dir);
                }
            }
        }
        Ok(())
    }
}

impl SpecFs for MemFs {
    fn kind(&self, path: &Path) -> io::Result<EntryKind> {
        let key = normalize(path);
        if key.as_os_str().is_empty() {
            return Ok(EntryKind::Dir);
        }
        self.read_lock()
            .get(&key)
            .map(Node::kind)
            .ok_or_else(|| not_found(path))
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let key = normalize(path);
        match self.kind(&key)? {
            EntryKind::Dir => {}
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("{} is not a directory", path.display()),
                ))
            }
        }

        let nodes = self.read_lock();
        let entries = nodes
            .iter()
            .filter(|(child, _)| child.parent() == Some(key.as_path()))
            .filter_map(|(child, node)| {
                let name = child.file_name()?.to_string_lossy().into_owned();
                Some(DirEntry {
                    name,
                    kind: node.kind(),
                })
            })
            .collect();
        Ok(entries)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        match self.read_lock().get(&normalize(path)) {
            Some(Node::File(bytes)) => Ok(bytes.clone()),
            Some(_) => Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{} is not a regular file", path.display()),
            )),
            None => Err(not_found(path)),
        }
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let key = normalize(path);
        Self::insert_dirs(&mut self.write_lock(), &key)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let key = normalize(path);
        let mut nodes = self.write_lock();
        if let Some(parent) = key.parent() {
            Self::insert_dirs(&mut nodes, parent)?;
        }
        if let Some(Node::Dir) = nodes.get(&key) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{} is a directory", path.display()),
            ));
        }
        nodes.insert(key, Node::File(contents.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_creates_parents() {
        let fs = MemFs::new();
        fs.write(Path::new("root/ns/job.yaml"), b"x").unwrap();

        assert_eq!(fs.kind(Path::new("root")).unwrap(), EntryKind::Dir);
        assert_eq!(fs.kind(Path::new("root/ns")).unwrap(), EntryKind::Dir);
        assert_eq!(fs.read(Path::new("./root/ns/job.yaml")).unwrap(), b"x");
    }

    #[test]
    fn test_read_dir_lists_direct_children_only() {
        let fs = MemFs::new()
            .with_file("root/a/job.yaml", "")
            .with_file("root/b.yaml", "")
            .with_file("root/a/assets/q.sql", "");

        let entries = fs.read_dir(Path::new("root")).unwrap();
        assert_eq!(
            entries,
            vec![
                DirEntry {
                    name: "a".into(),
                    kind: EntryKind::Dir
                },
                DirEntry {
                    name: "b.yaml".into(),
                    kind: EntryKind::File
                },
            ]
        );
    }

    #[test]
    fn test_missing_path_is_not_found() {
        let fs = MemFs::new();
        let err = fs.kind(Path::new("nope")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(fs.read_dir(Path::new("nope")).is_err());
    }

    #[test]
    fn test_remove_all_drops_subtree() {
        let fs = MemFs::new()
            .with_file("root/a/assets/q.sql", "")
            .with_file("root/a/job.yaml", "");
        fs.remove_all("root/a/assets");

        assert!(!fs.exists(Path::new("root/a/assets")));
        assert!(fs.exists(Path::new("root/a/job.yaml")));
    }

    #[test]
    fn test_file_cannot_become_parent() {
        let fs = MemFs::new().with_file("root/file", "");
        assert!(fs.write(Path::new("root/file/child"), b"").is_err());
    }
}
