//! Client config - parses optimus.yaml

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};

pub const CONFIG_FILE: &str = "optimus.yaml";

/// Contents of `optimus.yaml`. Unknown keys are ignored since the file is
/// shared with other tooling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub version: i32,
    pub log: LogConfig,
    pub host: String,
    pub project: ProjectConfig,
    pub namespaces: Vec<NamespaceConfig>,

    /// Directory holding the config file; relative spec paths resolve against it
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: String,
    pub config: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NamespaceConfig {
    pub name: String,
    pub config: BTreeMap<String, String>,
    pub job: JobConfig,
    pub datastore: Vec<DatastoreConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatastoreConfig {
    #[serde(rename = "type")]
    pub datastore_type: String,
    pub path: PathBuf,
    pub backup: BTreeMap<String, serde_yaml::Value>,
}

impl ClientConfig {
    /// Load config from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::filesystem(path, e))?;
        let mut config: ClientConfig = if content.trim().is_empty() {
            ClientConfig::default()
        } else {
            serde_yaml::from_str(&content).map_err(|source| Error::Decode {
                path: path.to_path_buf(),
                source,
            })?
        };
        config.base_dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Ok(config)
    }

    /// Find and load the config.
    /// Priority:
    /// 1. the explicit path, when given
    /// 2. ./optimus.yaml
    /// 3. $HOME/.optimus/optimus.yaml
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        let local = Path::new(CONFIG_FILE);
        if local.is_file() {
            return Self::load(local);
        }

        if let Some(home) = dirs::home_dir() {
            let global = home.join(".optimus").join(CONFIG_FILE);
            if global.is_file() {
                return Self::load(&global);
            }
        }

        Err(Error::Config(format!(
            "no {} found in the current directory or in $HOME/.optimus",
            CONFIG_FILE
        )))
    }

    /// Check what every server-facing command needs
    pub fn validate(&self) -> Result<()> {
        if self.project.name.trim().is_empty() {
            return Err(Error::Config("project.name is required".to_string()));
        }
        if self.host.trim().is_empty() {
            return Err(Error::Config("host is required".to_string()));
        }
        let mut seen = HashSet::new();
        for namespace in &self.namespaces {
            if namespace.name.trim().is_empty() {
                return Err(Error::Config("every namespace needs a name".to_string()));
            }
            if !seen.insert(namespace.name.as_str()) {
                return Err(Error::Config(format!(
                    "namespace [{}] is declared more than once",
                    namespace.name
                )));
            }
        }
        Ok(())
    }

    pub fn namespace(&self, name: &str) -> Option<&NamespaceConfig> {
        self.namespaces.iter().find(|ns| ns.name == name)
    }

    /// Namespaces named in `names`, in configured order. Empty means all.
    pub fn selected_namespaces(&self, names: &[String]) -> Result<Vec<&NamespaceConfig>> {
        if names.is_empty() {
            return Ok(self.namespaces.iter().collect());
        }

        let unknown: Vec<&str> = names
            .iter()
            .filter(|name| self.namespace(name).is_none())
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "namespaces [{}] are not found in the client config",
                unknown.join(", ")
            )));
        }

        Ok(self
            .namespaces
            .iter()
            .filter(|ns| names.contains(&ns.name))
            .collect())
    }

    /// Resolve a configured path against the config file's directory
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// `log.level` as a filter, when set and recognised
    pub fn log_level(&self) -> Option<log::LevelFilter> {
        if self.log.level.is_empty() {
            return None;
        }
        log::LevelFilter::from_str(&self.log.level).ok()
    }
}
