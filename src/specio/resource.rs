//! Resource spec trees: one `resource.yaml` per directory

use std::path::Path;
use std::sync::Arc;

use super::walk::{discover_spec_dirs, read_spec, write_spec};
use super::SpecReadWriter;
use crate::error::{Error, Result};
use crate::fs::SpecFs;
use crate::model::ResourceSpec;

pub const RESOURCE_SPEC_FILE: &str = "resource.yaml";

pub struct ResourceSpecReadWriter {
    fs: Arc<dyn SpecFs>,
}

impl ResourceSpecReadWriter {
    pub fn new(fs: Arc<dyn SpecFs>) -> Self {
        Self { fs }
    }
}

impl SpecReadWriter<ResourceSpec> for ResourceSpecReadWriter {
    fn read_all(&self, root: &Path) -> Result<Vec<ResourceSpec>> {
        let fs = self.fs.as_ref();
        let dirs = discover_spec_dirs(fs, root, RESOURCE_SPEC_FILE)?;
        log::debug!("found {} resource specs under {}", dirs.len(), root.display());

        dirs.into_iter()
            .map(|dir| {
                let mut spec: ResourceSpec = read_spec(fs, &dir.join(RESOURCE_SPEC_FILE))?;
                spec.path = dir;
                Ok(spec)
            })
            .collect()
    }

    fn write(&self, dir: &Path, spec: &ResourceSpec) -> Result<()> {
        if spec.name.is_empty() {
            return Err(Error::InvalidArgument(
                "resource spec name is required".to_string(),
            ));
        }
        write_spec(self.fs.as_ref(), &dir.join(RESOURCE_SPEC_FILE), spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemFs;
    use std::path::PathBuf;

    #[test]
    fn test_read_all_fills_path() {
        let fs = MemFs::new()
            .with_file("bq/p/d/resource.yaml", "version: 1\nname: p.d\ntype: dataset\n")
            .with_file("bq/p/d/t/resource.yaml", "version: 1\nname: p.d.t\ntype: table\n");

        let rw = ResourceSpecReadWriter::new(Arc::new(fs));
        let specs = rw.read_all(Path::new("bq")).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].path, PathBuf::from("bq/p/d"));
        assert_eq!(specs[1].resource_type, "table");
    }

    #[test]
    fn test_no_inheritance_for_resources() {
        let fs = MemFs::new()
            .with_file("bq/this.yaml", "labels:\n  a: b\n")
            .with_file("bq/t/resource.yaml", "name: p.d.t\n");

        let rw = ResourceSpecReadWriter::new(Arc::new(fs));
        let spec = rw.read_by_name(Path::new("bq"), "p.d.t").unwrap();
        assert!(spec.labels.is_empty());
    }
}
