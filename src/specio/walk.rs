//! Directory walking and YAML codec over a `SpecFs`
//!
//! Walks are depth-first in name order. Hidden entries are skipped and
//! symlinks are never followed, so a walk cannot leave its root.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::fs::{EntryKind, SpecFs};

fn walk(
    fs: &dyn SpecFs,
    dir: &Path,
    visit: &mut dyn FnMut(&Path, &str) -> Result<()>,
) -> Result<()> {
    let entries = fs
        .read_dir(dir)
        .map_err(|e| Error::filesystem(dir, e))?;

    for entry in entries.iter().filter(|e| !e.is_hidden()) {
        if entry.kind == EntryKind::File {
            visit(dir, &entry.name)?;
        }
    }
    for entry in entries.iter().filter(|e| !e.is_hidden()) {
        if entry.kind == EntryKind::Dir {
            walk(fs, &dir.join(&entry.name), visit)?;
        }
    }
    Ok(())
}

fn ensure_root(fs: &dyn SpecFs, root: &Path) -> Result<()> {
    fs.kind(root).map(|_| ()).map_err(|e| Error::filesystem(root, e))
}

/// Every directory under `root` (itself included) holding a regular file named `marker`
pub fn discover_spec_dirs(fs: &dyn SpecFs, root: &Path, marker: &str) -> Result<Vec<PathBuf>> {
    ensure_root(fs, root)?;
    let mut dirs = Vec::new();
    walk(fs, root, &mut |dir, name| {
        if name == marker {
            dirs.push(dir.to_path_buf());
        }
        Ok(())
    })?;
    Ok(dirs)
}

/// Every regular file under `root`
pub fn discover_files(fs: &dyn SpecFs, root: &Path) -> Result<Vec<PathBuf>> {
    ensure_root(fs, root)?;
    let mut files = Vec::new();
    walk(fs, root, &mut |dir, name| {
        files.push(dir.join(name));
        Ok(())
    })?;
    Ok(files)
}

/// Decode the YAML file at `path`. Unknown fields are rejected; an empty file
/// decodes to the default value.
pub fn read_spec<T>(fs: &dyn SpecFs, path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let bytes = fs.read(path).map_err(|e| Error::filesystem(path, e))?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_yaml::from_slice(&bytes).map_err(|source| Error::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Encode `value` as YAML into `path`, creating the parent directory first
pub fn write_spec<T: Serialize>(fs: &dyn SpecFs, path: &Path, value: &T) -> Result<()> {
    let yaml = serde_yaml::to_string(value).map_err(|source| Error::Encode {
        path: path.to_path_buf(),
        source,
    })?;
    if let Some(parent) = path.parent() {
        fs.create_dir_all(parent)
            .map_err(|e| Error::filesystem(parent, e))?;
    }
    fs.write(path, yaml.as_bytes())
        .map_err(|e| Error::filesystem(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemFs;
    use crate::model::JobSpec;

    fn tree() -> MemFs {
        MemFs::new()
            .with_file("root/ns/this.yaml", "")
            .with_file("root/ns/jobs/a/job.yaml", "name: a")
            .with_file("root/ns/jobs/b/job.yaml", "name: b")
            .with_file("root/ns/jobs/b/assets/query.sql", "SELECT 1")
            .with_file("root/.hidden/job.yaml", "name: hidden")
            .with_file("root/ns/jobs/c/.job.yaml", "name: c")
    }

    #[test]
    fn test_discover_spec_dirs() {
        let fs = tree();
        let dirs = discover_spec_dirs(&fs, Path::new("root"), "job.yaml").unwrap();
        assert_eq!(
            dirs,
            vec![PathBuf::from("root/ns/jobs/a"), PathBuf::from("root/ns/jobs/b")]
        );
    }

    #[test]
    fn test_symlinked_dirs_are_skipped() {
        let fs = tree();
        fs.symlink("root/ns/jobs/link").unwrap();
        let dirs = discover_spec_dirs(&fs, Path::new("root"), "job.yaml").unwrap();
        assert_eq!(dirs.len(), 2);
    }

    #[test]
    fn test_missing_root_is_filesystem_error() {
        let fs = MemFs::new();
        let err = discover_spec_dirs(&fs, Path::new("nope"), "job.yaml").unwrap_err();
        assert!(matches!(err, Error::Filesystem { .. }));
    }

    #[test]
    fn test_discover_files() {
        let fs = tree();
        let files = discover_files(&fs, Path::new("root/ns/jobs/b")).unwrap();
        assert_eq!(
            files,
            vec![
                PathBuf::from("root/ns/jobs/b/job.yaml"),
                PathBuf::from("root/ns/jobs/b/assets/query.sql"),
            ]
        );
    }

    #[test]
    fn test_read_spec_names_path_on_decode_error() {
        let fs = MemFs::new().with_file("bad/job.yaml", "name: a\nbogus: 1\n");
        let err = read_spec::<JobSpec>(&fs, Path::new("bad/job.yaml")).unwrap_err();
        match err {
            Error::Decode { path, .. } => assert_eq!(path, PathBuf::from("bad/job.yaml")),
            other => panic!("unexpected {}", other),
        }
    }

    #[test]
    fn test_empty_file_is_default() {
        let fs = MemFs::new().with_file("ns/this.yaml", "\n");
        let spec: JobSpec = read_spec(&fs, Path::new("ns/this.yaml")).unwrap();
        assert_eq!(spec, JobSpec::default());
    }

    #[test]
    fn test_write_spec_creates_parent() {
        let fs = MemFs::new();
        let spec = JobSpec {
            name: "a".into(),
            ..Default::default()
        };
        write_spec(&fs, Path::new("out/deep/job.yaml"), &spec).unwrap();
        assert!(fs.is_dir(Path::new("out/deep")));

        let back: JobSpec = read_spec(&fs, Path::new("out/deep/job.yaml")).unwrap();
        assert_eq!(back.name, "a");
    }
}
