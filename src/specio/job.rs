//! Job spec trees: `job.yaml`, inherited `this.yaml` and `assets/`

use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use super::walk::{discover_files, discover_spec_dirs, read_spec, write_spec};
use super::SpecReadWriter;
use crate::error::{Error, Result};
use crate::fs::SpecFs;
use crate::model::JobSpec;

/// File names the job reader looks for
#[derive(Debug, Clone)]
pub struct JobSpecReadWriterOptions {
    pub spec_file: String,
    pub parent_file: String,
    pub asset_dir: String,
    /// Merge ancestor `this.yaml` files into each spec
    pub parent_reading: bool,
}

impl Default for JobSpecReadWriterOptions {
    fn default() -> Self {
        Self {
            spec_file: "job.yaml".to_string(),
            parent_file: "this.yaml".to_string(),
            asset_dir: "assets".to_string(),
            parent_reading: false,
        }
    }
}

/// Reads job specs with their assets and inherited defaults, and writes them back
pub struct JobSpecReadWriter {
    fs: Arc<dyn SpecFs>,
    options: JobSpecReadWriterOptions,
}

impl JobSpecReadWriter {
    pub fn new(fs: Arc<dyn SpecFs>) -> Self {
        Self {
            fs,
            options: JobSpecReadWriterOptions::default(),
        }
    }

    /// Enable or disable `this.yaml` inheritance
    pub fn with_parent_reading(mut self, enabled: bool) -> Self {
        self.options.parent_reading = enabled;
        self
    }

    pub fn with_options(mut self, options: JobSpecReadWriterOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &JobSpecReadWriterOptions {
        &self.options
    }

    fn read_parents(&self, root: &Path) -> Result<HashMap<PathBuf, JobSpec>> {
        let fs = self.fs.as_ref();
        let mut parents = HashMap::new();
        for dir in discover_spec_dirs(fs, root, &self.options.parent_file)? {
            let spec: JobSpec = read_spec(fs, &dir.join(&self.options.parent_file))?;
            parents.insert(dir, spec);
        }
        Ok(parents)
    }

    /// Asset files keyed by their `/`-separated path relative to the asset directory
    fn read_assets(&self, dir: &Path) -> Result<Vec<(String, String)>> {
        let fs = self.fs.as_ref();
        let asset_root = dir.join(&self.options.asset_dir);
        if !fs.is_dir(&asset_root) {
            return Ok(Vec::new());
        }

        let mut assets = Vec::new();
        for file in discover_files(fs, &asset_root)? {
            let key = asset_key(&asset_root, &file);
            let bytes = fs.read(&file).map_err(|e| Error::filesystem(&file, e))?;
            let content = String::from_utf8(bytes).map_err(|e| {
                Error::filesystem(&file, io::Error::new(io::ErrorKind::InvalidData, e))
            })?;
            assets.push((key, content));
        }
        Ok(assets)
    }

    fn read_one(
        &self,
        root: &Path,
        dir: &Path,
        parents: &HashMap<PathBuf, JobSpec>,
    ) -> Result<JobSpec> {
        let mut spec: JobSpec = read_spec(self.fs.as_ref(), &dir.join(&self.options.spec_file))?;
        spec.path = dir.to_path_buf();
        spec.asset.extend(self.read_assets(dir)?);

        // deepest ancestor first, up to and including the root
        for ancestor in dir.ancestors().take_while(|a| a.starts_with(root)) {
            if let Some(parent) = parents.get(ancestor) {
                spec.merge_from(parent);
            }
        }
        spec.apply_defaults();
        Ok(spec)
    }
}

fn asset_key(asset_root: &Path, file: &Path) -> String {
    let relative = file.strip_prefix(asset_root).unwrap_or(file);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Reject asset keys that would escape the asset directory
fn asset_path(asset_root: &Path, key: &str) -> Result<PathBuf> {
    let relative = Path::new(key);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if key.is_empty() || escapes {
        return Err(Error::InvalidArgument(format!(
            "asset name [{}] must be a relative path inside the asset directory",
            key
        )));
    }
    Ok(key.split('/').fold(asset_root.to_path_buf(), |p, part| p.join(part)))
}

impl SpecReadWriter<JobSpec> for JobSpecReadWriter {
    fn read_all(&self, root: &Path) -> Result<Vec<JobSpec>> {
        let parents = if self.options.parent_reading {
            self.read_parents(root)?
        } else {
            HashMap::new()
        };

        let dirs = discover_spec_dirs(self.fs.as_ref(), root, &self.options.spec_file)?;
        log::debug!("found {} job specs under {}", dirs.len(), root.display());

        dirs.iter()
            .map(|dir| self.read_one(root, dir, &parents))
            .collect()
    }

    fn write(&self, dir: &Path, spec: &JobSpec) -> Result<()> {
        if spec.name.is_empty() {
            return Err(Error::InvalidArgument(
                "job spec name is required".to_string(),
            ));
        }
        let fs = self.fs.as_ref();
        write_spec(fs, &dir.join(&self.options.spec_file), spec)?;

        let asset_root = dir.join(&self.options.asset_dir);
        for (key, content) in &spec.asset {
            let path = asset_path(&asset_root, key)?;
            if let Some(parent) = path.parent() {
                fs.create_dir_all(parent)
                    .map_err(|e| Error::filesystem(parent, e))?;
            }
            fs.write(&path, content.as_bytes())
                .map_err(|e| Error::filesystem(&path, e))?;
        }
        Ok(())
    }
}
