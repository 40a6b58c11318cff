//! Reading and writing spec trees on a `SpecFs`

mod job;
mod resource;
pub mod walk;

pub use job::{JobSpecReadWriter, JobSpecReadWriterOptions};
pub use resource::ResourceSpecReadWriter;
pub use walk::{discover_files, discover_spec_dirs, read_spec, write_spec};

use std::path::Path;

use crate::error::{Error, Result};
use crate::model::{JobSpec, ResourceSpec};

/// Specs carry a name that is unique within a project
pub trait NamedSpec {
    fn spec_name(&self) -> &str;
}

impl NamedSpec for JobSpec {
    fn spec_name(&self) -> &str {
        &self.name
    }
}

impl NamedSpec for ResourceSpec {
    fn spec_name(&self) -> &str {
        &self.name
    }
}

/// Read and write access to one kind of spec under a root directory
pub trait SpecReadWriter<T: NamedSpec> {
    /// Every spec under `root`, in discovery order
    fn read_all(&self, root: &Path) -> Result<Vec<T>>;

    /// Persist `spec` into `dir`, overwriting what is there
    fn write(&self, dir: &Path, spec: &T) -> Result<()>;

    /// First spec under `root` carrying `name`
    fn read_by_name(&self, root: &Path, name: &str) -> Result<T> {
        self.read_all(root)?
            .into_iter()
            .find(|spec| spec.spec_name() == name)
            .ok_or_else(|| Error::NotFound {
                name: name.to_string(),
            })
    }
}
