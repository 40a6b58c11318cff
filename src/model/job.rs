//! Job specification as stored in `job.yaml` / `this.yaml`

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use super::duration::SpecDuration;

fn is_false(value: &bool) -> bool {
    !*value
}

fn is_zero_i32(value: &i32) -> bool {
    *value == 0
}

/// One job, as declared on disk.
///
/// `asset` and `path` never appear in the YAML document: assets live in the
/// sibling `assets/` directory and `path` is filled in by the reader.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobSpec {
    pub version: i32,
    pub name: String,
    pub owner: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub schedule: JobSchedule,
    pub behavior: JobBehavior,
    pub task: JobTask,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<JobDependency>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hooks: Vec<JobHook>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JobMetadata>,

    #[serde(skip)]
    pub asset: BTreeMap<String, String>,
    #[serde(skip)]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobSchedule {
    pub start_date: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub end_date: String,
    pub interval: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobBehavior {
    pub depends_on_past: bool,
    pub catch_up: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<JobRetry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notify: Vec<JobNotifier>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobRetry {
    #[serde(skip_serializing_if = "is_zero_i32")]
    pub count: i32,
    #[serde(skip_serializing_if = "SpecDuration::is_zero")]
    pub delay: SpecDuration,
    #[serde(skip_serializing_if = "is_false")]
    pub exponential_backoff: bool,
}

/// Notification routing for one job event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobNotifier {
    pub on: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobTask {
    pub name: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, String>,
    pub window: JobWindow,
}

/// Data window of a task run. Size and offset keep their textual form
/// because offsets may carry a sign and months are not fixed durations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobWindow {
    pub size: String,
    pub offset: String,
    pub truncate_to: String,
}

/// Either an upstream job or an external HTTP sensor; exactly one side is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobDependency {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub job: String,
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub dependency_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpDependency>,
}

impl JobDependency {
    pub fn job(name: impl Into<String>, dependency_type: impl Into<String>) -> Self {
        Self {
            job: name.into(),
            dependency_type: dependency_type.into(),
            http: None,
        }
    }

    /// Identity used when merging parent dependencies into a child
    pub(crate) fn same_target(&self, other: &JobDependency) -> bool {
        match (&self.http, &other.http) {
            (Some(a), Some(b)) => a.name == b.name,
            (None, None) => self.job == other.job && self.dependency_type == other.dependency_type,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpDependency {
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobHook {
    pub name: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<MetadataResource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub airflow: Option<MetadataAirflow>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetadataResource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<ResourceQuantity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<ResourceQuantity>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResourceQuantity {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cpu: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub memory: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetadataAirflow {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub pool: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub queue: String,
}

/// Kind of job dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyType {
    /// Same project, same namespace
    Intra,
    /// Same project, different namespace
    Inter,
    /// Outside the project
    Extra,
}

impl DependencyType {
    pub const ALL: [DependencyType; 3] = [Self::Intra, Self::Inter, Self::Extra];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intra => "intra",
            Self::Inter => "inter",
            Self::Extra => "extra",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl JobSpec {
    /// Fill in values that have a documented default
    pub fn apply_defaults(&mut self) {
        if self.version == 0 {
            self.version = 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
version: 1
name: example1
owner: data@example.io
description: sample job
schedule:
  start_date: "2021-02-18"
  interval: 0 3 * * *
behavior:
  depends_on_past: false
  catch_up: true
  retry:
    count: 2
    delay: 30s
  notify:
  - on: failure
    config:
      key: value
    channels:
    - slack://#alerts
task:
  name: bq2bq
  config:
    PROJECT: godata
  window:
    size: 24h
    offset: "0"
    truncate_to: d
labels:
  orchestrator: optimus
dependencies:
- job: upstream
  type: inter
- http:
    name: sensor
    url: https://example.io/ready
hooks:
- name: transporter
  config:
    FILTER: none
metadata:
  airflow:
    pool: etl
"#;

    #[test]
    fn test_decode_full_document() {
        let spec: JobSpec = serde_yaml::from_str(FULL).unwrap();
        assert_eq!(spec.name, "example1");
        assert_eq!(spec.schedule.start_date, "2021-02-18");
        assert_eq!(
            spec.behavior.retry.as_ref().unwrap().delay,
            SpecDuration::from_secs(30)
        );
        assert_eq!(spec.behavior.notify[0].channels, vec!["slack://#alerts"]);
        assert_eq!(spec.task.config["PROJECT"], "godata");
        assert_eq!(spec.task.window.truncate_to, "d");
        assert_eq!(spec.dependencies[0].dependency_type, "inter");
        assert_eq!(spec.dependencies[1].http.as_ref().unwrap().name, "sensor");
        assert_eq!(spec.hooks[0].config["FILTER"], "none");
        assert_eq!(spec.metadata.unwrap().airflow.unwrap().pool, "etl");
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let err = serde_yaml::from_str::<JobSpec>("name: a\nschedulee: {}\n").unwrap_err();
        assert!(err.to_string().contains("schedulee"));

        let nested = "task:\n  name: a\n  windows: {}\n";
        assert!(serde_yaml::from_str::<JobSpec>(nested).is_err());
    }

    #[test]
    fn test_asset_and_path_are_not_yaml_fields() {
        assert!(serde_yaml::from_str::<JobSpec>("asset: {}\n").is_err());

        let mut spec = JobSpec {
            name: "a".into(),
            ..Default::default()
        };
        spec.asset.insert("query.sql".into(), "SELECT 1".into());
        spec.path = PathBuf::from("/tmp/a");
        let yaml = serde_yaml::to_string(&spec).unwrap();
        assert!(!yaml.contains("asset"));
        assert!(!yaml.contains("path"));
    }

    #[test]
    fn test_encode_is_stable() {
        let spec: JobSpec = serde_yaml::from_str(FULL).unwrap();
        let first = serde_yaml::to_string(&spec).unwrap();
        let reparsed: JobSpec = serde_yaml::from_str(&first).unwrap();
        assert_eq!(reparsed, spec);
        assert_eq!(serde_yaml::to_string(&reparsed).unwrap(), first);
    }

    #[test]
    fn test_version_defaults_to_one() {
        let mut spec = JobSpec::default();
        spec.apply_defaults();
        assert_eq!(spec.version, 1);

        spec.version = 3;
        spec.apply_defaults();
        assert_eq!(spec.version, 3);
    }
}
