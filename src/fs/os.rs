//! Local disk implementation of `SpecFs`

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::{DirEntry, EntryKind, SpecFs};

/// Local filesystem rooted at a base directory.
///
/// Relative paths are resolved against the base; absolute paths are used as is.
#[derive(Debug, Clone)]
pub struct OsFs {
    base: PathBuf,
}

impl OsFs {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Filesystem rooted at the process working directory
    pub fn current_dir() -> Self {
        Self::new(".")
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base.join(path)
        }
    }
}

fn kind_of(file_type: fs::FileType) -> EntryKind {
    if file_type.is_symlink() {
        EntryKind::Symlink
    } else if file_type.is_dir() {
        EntryKind::Dir
    } else {
        EntryKind::File
    }
}

impl SpecFs for OsFs {
    fn kind(&self, path: &Path) -> io::Result<EntryKind> {
        let metadata = fs::symlink_metadata(self.resolve(path))?;
        Ok(kind_of(metadata.file_type()))
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(self.resolve(path))? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            entries.push(DirEntry {
                name,
                kind: kind_of(entry.file_type()?),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(self.resolve(path))
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o755);
        }
        builder.create(self.resolve(path))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        fs::write(self.resolve(path), contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_paths_resolve_against_base() {
        let dir = tempfile::tempdir().unwrap();
        let fs = OsFs::new(dir.path());

        fs.create_dir_all(Path::new("ns/jobs")).unwrap();
        fs.write(Path::new("ns/jobs/job.yaml"), b"name: a").unwrap();

        assert!(dir.path().join("ns/jobs/job.yaml").is_file());
        assert_eq!(fs.kind(Path::new("ns/jobs")).unwrap(), EntryKind::Dir);
        assert_eq!(fs.read(Path::new("ns/jobs/job.yaml")).unwrap(), b"name: a");
    }

    #[test]
    fn test_read_dir_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let fs = OsFs::new(dir.path());
        for name in ["b.sql", "a.sql", "c"] {
            fs.write(Path::new(name), b"").unwrap();
        }

        let names: Vec<String> = fs
            .read_dir(Path::new("."))
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["a.sql", "b.sql", "c"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("real")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("link")).unwrap();

        let fs = OsFs::new(dir.path());
        assert_eq!(fs.kind(Path::new("link")).unwrap(), EntryKind::Symlink);
    }
}
