//! Projection of spec entities onto their wire messages and back

use std::collections::BTreeMap;
use std::time::Duration;

use prost_types::value::Kind;
use prost_types::{ListValue, Struct, Value};

use super::{
    HttpDependency, JobBehavior, JobConfigItem, JobDependency, JobDependencyType, JobEventType,
    JobMetadata, JobMetadataAirflow, JobMetadataResource, JobMetadataResourceConfig,
    JobNotifier, JobRetry, JobSpecHook, JobSpecification, ResourceSpecification,
};
use crate::error::{Error, Result};
use crate::model::{self, JobSpec, ResourceSpec, SpecDuration, SpecNode};

/// Largest integer a protobuf number value carries without loss
const MAX_EXACT_INT: i64 = 1 << 53;

/// `failure` -> `TYPE_FAILURE`
pub fn to_wire_enum_name(value: &str) -> String {
    format!("TYPE_{}", value.to_uppercase())
}

/// `TYPE_FAILURE` -> `failure`
pub fn from_wire_enum_name(name: &str) -> String {
    name.strip_prefix("TYPE_").unwrap_or(name).to_lowercase()
}

fn config_items(config: &BTreeMap<String, String>) -> Vec<JobConfigItem> {
    config
        .iter()
        .map(|(name, value)| JobConfigItem {
            name: name.clone(),
            value: value.clone(),
        })
        .collect()
}

fn config_map(items: &[JobConfigItem]) -> BTreeMap<String, String> {
    items
        .iter()
        .map(|item| (item.name.clone(), item.value.clone()))
        .collect()
}

fn event_type(on: &str) -> Result<JobEventType> {
    JobEventType::from_str_name(&to_wire_enum_name(on))
        .filter(|t| *t != JobEventType::Unspecified)
        .ok_or_else(|| Error::Wire(format!("unknown notify event [{}]", on)))
}

fn dependency_type(value: &str) -> Result<JobDependencyType> {
    if value.is_empty() {
        return Ok(JobDependencyType::Unspecified);
    }
    JobDependencyType::from_str_name(&to_wire_enum_name(value))
        .ok_or_else(|| Error::Wire(format!("unknown dependency type [{}]", value)))
}

fn wire_name_or_empty(name: &str) -> String {
    if name == "TYPE_UNSPECIFIED" {
        String::new()
    } else {
        from_wire_enum_name(name)
    }
}

fn duration_to_wire(d: SpecDuration) -> prost_types::Duration {
    let d = d.as_duration();
    prost_types::Duration {
        seconds: d.as_secs() as i64,
        nanos: d.subsec_nanos() as i32,
    }
}

fn duration_from_wire(d: &prost_types::Duration) -> Result<SpecDuration> {
    if d.seconds < 0 || d.nanos < 0 {
        return Err(Error::Wire(format!(
            "negative retry delay {}s{}ns",
            d.seconds, d.nanos
        )));
    }
    Ok(SpecDuration(
        Duration::from_secs(d.seconds as u64) + Duration::from_nanos(d.nanos as u64),
    ))
}

fn quantity_to_wire(q: &Option<model::ResourceQuantity>) -> Option<JobMetadataResourceConfig> {
    q.as_ref().map(|q| JobMetadataResourceConfig {
        cpu: q.cpu.clone(),
        memory: q.memory.clone(),
    })
}

fn quantity_from_wire(q: &Option<JobMetadataResourceConfig>) -> Option<model::ResourceQuantity> {
    q.as_ref().map(|q| model::ResourceQuantity {
        cpu: q.cpu.clone(),
        memory: q.memory.clone(),
    })
}

impl JobSpec {
    /// Wire form of this spec. `path` is not carried.
    pub fn to_wire(&self) -> Result<JobSpecification> {
        let behavior = &self.behavior;
        let behavior = if behavior.retry.is_some() || !behavior.notify.is_empty() {
            let notify = behavior
                .notify
                .iter()
                .map(|n| {
                    Ok(JobNotifier {
                        on: event_type(&n.on)? as i32,
                        channels: n.channels.clone(),
                        config: n.config.clone(),
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Some(JobBehavior {
                retry: behavior.retry.as_ref().map(|r| JobRetry {
                    count: r.count,
                    delay: Some(duration_to_wire(r.delay)),
                    exponential_backoff: r.exponential_backoff,
                }),
                notify,
            })
        } else {
            None
        };

        let dependencies = self
            .dependencies
            .iter()
            .map(|d| {
                Ok(JobDependency {
                    name: d.job.clone(),
                    r#type: dependency_type(&d.dependency_type)? as i32,
                    http_dependency: d.http.as_ref().map(|h| HttpDependency {
                        name: h.name.clone(),
                        url: h.url.clone(),
                        headers: h.headers.clone(),
                        params: h.params.clone(),
                    }),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let metadata = self.metadata.as_ref().map(|m| JobMetadata {
            resource: m.resource.as_ref().map(|r| JobMetadataResource {
                request: quantity_to_wire(&r.request),
                limit: quantity_to_wire(&r.limit),
            }),
            airflow: m.airflow.as_ref().map(|a| JobMetadataAirflow {
                pool: a.pool.clone(),
                queue: a.queue.clone(),
            }),
        });

        Ok(JobSpecification {
            version: self.version,
            name: self.name.clone(),
            owner: self.owner.clone(),
            start_date: self.schedule.start_date.clone(),
            end_date: self.schedule.end_date.clone(),
            interval: self.schedule.interval.clone(),
            depends_on_past: self.behavior.depends_on_past,
            catch_up: self.behavior.catch_up,
            task_name: self.task.name.clone(),
            config: config_items(&self.task.config),
            window_size: self.task.window.size.clone(),
            window_offset: self.task.window.offset.clone(),
            window_truncate_to: self.task.window.truncate_to.clone(),
            dependencies,
            assets: self.asset.clone(),
            hooks: self
                .hooks
                .iter()
                .map(|h| JobSpecHook {
                    name: h.name.clone(),
                    config: config_items(&h.config),
                })
                .collect(),
            description: self.description.clone(),
            labels: self.labels.clone(),
            behavior,
            metadata,
        })
    }

    /// Rebuild a spec from its wire form; absent fields come back zero.
    pub fn from_wire(wire: &JobSpecification) -> Result<JobSpec> {
        let mut behavior = model::JobBehavior {
            depends_on_past: wire.depends_on_past,
            catch_up: wire.catch_up,
            ..Default::default()
        };
        if let Some(b) = &wire.behavior {
            behavior.retry = b
                .retry
                .as_ref()
                .map(|r| {
                    Ok::<_, Error>(model::JobRetry {
                        count: r.count,
                        delay: r
                            .delay
                            .as_ref()
                            .map(duration_from_wire)
                            .transpose()?
                            .unwrap_or_default(),
                        exponential_backoff: r.exponential_backoff,
                    })
                })
                .transpose()?;
            behavior.notify = b
                .notify
                .iter()
                .map(|n| model::JobNotifier {
                    on: wire_name_or_empty(n.on().as_str_name()),
                    config: n.config.clone(),
                    channels: n.channels.clone(),
                })
                .collect();
        }

        let metadata = wire.metadata.as_ref().map(|m| model::JobMetadata {
            resource: m.resource.as_ref().map(|r| model::MetadataResource {
                request: quantity_from_wire(&r.request),
                limit: quantity_from_wire(&r.limit),
            }),
            airflow: m.airflow.as_ref().map(|a| model::MetadataAirflow {
                pool: a.pool.clone(),
                queue: a.queue.clone(),
            }),
        });

        Ok(JobSpec {
            version: wire.version,
            name: wire.name.clone(),
            owner: wire.owner.clone(),
            description: wire.description.clone(),
            schedule: model::JobSchedule {
                start_date: wire.start_date.clone(),
                end_date: wire.end_date.clone(),
                interval: wire.interval.clone(),
            },
            behavior,
            task: model::JobTask {
                name: wire.task_name.clone(),
                config: config_map(&wire.config),
                window: model::JobWindow {
                    size: wire.window_size.clone(),
                    offset: wire.window_offset.clone(),
                    truncate_to: wire.window_truncate_to.clone(),
                },
            },
            labels: wire.labels.clone(),
            dependencies: wire
                .dependencies
                .iter()
                .map(|d| model::JobDependency {
                    job: d.name.clone(),
                    dependency_type: wire_name_or_empty(d.r#type().as_str_name()),
                    http: d.http_dependency.as_ref().map(|h| model::HttpDependency {
                        name: h.name.clone(),
                        url: h.url.clone(),
                        headers: h.headers.clone(),
                        params: h.params.clone(),
                    }),
                })
                .collect(),
            hooks: wire
                .hooks
                .iter()
                .map(|h| model::JobHook {
                    name: h.name.clone(),
                    config: config_map(&h.config),
                })
                .collect(),
            metadata,
            asset: wire.assets.clone(),
            path: Default::default(),
        })
    }
}

fn node_to_value(node: &SpecNode, at: &str) -> Result<Value> {
    let kind = match node {
        SpecNode::Null => Kind::NullValue(0),
        SpecNode::Bool(b) => Kind::BoolValue(*b),
        SpecNode::Int(i) => {
            if i.unsigned_abs() > MAX_EXACT_INT as u64 {
                return Err(Error::Wire(format!(
                    "integer {} at [{}] does not fit a structured value",
                    i, at
                )));
            }
            Kind::NumberValue(*i as f64)
        }
        SpecNode::Float(f) => {
            if !f.is_finite() {
                return Err(Error::Wire(format!(
                    "number {} at [{}] is not finite",
                    f, at
                )));
            }
            Kind::NumberValue(*f)
        }
        SpecNode::String(s) => Kind::StringValue(s.clone()),
        SpecNode::List(items) => Kind::ListValue(ListValue {
            values: items
                .iter()
                .enumerate()
                .map(|(i, item)| node_to_value(item, &format!("{}[{}]", at, i)))
                .collect::<Result<_>>()?,
        }),
        SpecNode::Map(map) => Kind::StructValue(map_to_struct(map, at)?),
    };
    Ok(Value { kind: Some(kind) })
}

fn map_to_struct(map: &BTreeMap<String, SpecNode>, at: &str) -> Result<Struct> {
    let fields = map
        .iter()
        .map(|(key, node)| {
            let path = if at.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", at, key)
            };
            Ok((key.clone(), node_to_value(node, &path)?))
        })
        .collect::<Result<_>>()?;
    Ok(Struct { fields })
}

fn value_to_node(value: &Value) -> SpecNode {
    match &value.kind {
        None | Some(Kind::NullValue(_)) => SpecNode::Null,
        Some(Kind::BoolValue(b)) => SpecNode::Bool(*b),
        Some(Kind::NumberValue(n)) => {
            if n.fract() == 0.0 && n.abs() <= MAX_EXACT_INT as f64 {
                SpecNode::Int(*n as i64)
            } else {
                SpecNode::Float(*n)
            }
        }
        Some(Kind::StringValue(s)) => SpecNode::String(s.clone()),
        Some(Kind::ListValue(list)) => {
            SpecNode::List(list.values.iter().map(value_to_node).collect())
        }
        Some(Kind::StructValue(s)) => SpecNode::Map(struct_to_map(s)),
    }
}

fn struct_to_map(s: &Struct) -> BTreeMap<String, SpecNode> {
    s.fields
        .iter()
        .map(|(key, value)| (key.clone(), value_to_node(value)))
        .collect()
}

impl ResourceSpec {
    /// Wire form with `spec` as a structured value
    pub fn to_wire(&self) -> Result<ResourceSpecification> {
        let spec = if self.spec.is_empty() {
            None
        } else {
            Some(map_to_struct(&self.spec, "").map_err(|e| match e {
                Error::Wire(msg) => Error::Wire(format!("resource [{}]: {}", self.name, msg)),
                other => other,
            })?)
        };
        Ok(ResourceSpecification {
            version: self.version,
            name: self.name.clone(),
            r#type: self.resource_type.clone(),
            spec,
            assets: BTreeMap::new(),
            labels: self.labels.clone(),
        })
    }

    /// Whole-valued numbers come back as integers
    pub fn from_wire(wire: &ResourceSpecification) -> ResourceSpec {
        ResourceSpec {
            version: wire.version,
            name: wire.name.clone(),
            resource_type: wire.r#type.clone(),
            labels: wire.labels.clone(),
            spec: wire.spec.as_ref().map(struct_to_map).unwrap_or_default(),
            path: Default::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sample_job() -> JobSpec {
        let mut spec: JobSpec = serde_yaml::from_str(
            r#"
version: 1
name: example1
owner: data@example.io
schedule:
  start_date: "2021-02-18"
  interval: "@daily"
behavior:
  catch_up: true
  retry:
    count: 2
    delay: 1500ms
    exponential_backoff: true
  notify:
  - on: sla_miss
    channels: [slack://#alerts]
task:
  name: bq2bq
  config:
    PROJECT: godata
  window:
    size: 24h
    offset: "-1h"
    truncate_to: d
dependencies:
- job: upstream
  type: inter
- http:
    name: sensor
    url: https://example.io
    headers:
      Auth: token
hooks:
- name: transporter
  config:
    FILTER: none
metadata:
  resource:
    limit:
      memory: 2Gi
"#,
        )
        .unwrap();
        spec.asset.insert("query.sql".into(), "SELECT 1".into());
        spec
    }

    #[test]
    fn test_job_roundtrip_drops_only_path() {
        let mut spec = sample_job();
        spec.path = PathBuf::from("root/ns/example1");

        let wire = spec.to_wire().unwrap();
        assert_eq!(wire.config[0].name, "PROJECT");
        assert_eq!(wire.dependencies[0].r#type(), JobDependencyType::Inter);
        let delay = wire.behavior.as_ref().unwrap().retry.as_ref().unwrap().delay.clone();
        assert_eq!(
            delay,
            Some(prost_types::Duration {
                seconds: 1,
                nanos: 500_000_000
            })
        );

        let back = JobSpec::from_wire(&wire).unwrap();
        assert_eq!(back.path, PathBuf::new());
        spec.path = PathBuf::new();
        assert_eq!(back, spec);
    }

    #[test]
    fn test_behavior_omitted_without_retry_or_notify() {
        let spec = JobSpec {
            name: "plain".into(),
            behavior: model::JobBehavior {
                depends_on_past: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let wire = spec.to_wire().unwrap();
        assert!(wire.behavior.is_none());
        assert!(wire.metadata.is_none());
        assert!(wire.depends_on_past);
    }

    #[test]
    fn test_unknown_event_is_wire_error() {
        let mut spec = sample_job();
        spec.behavior.notify[0].on = "whenever".into();
        assert!(matches!(spec.to_wire(), Err(Error::Wire(_))));
    }

    #[test]
    fn test_resource_structured_roundtrip() {
        let resource: ResourceSpec = serde_yaml::from_str(
            "version: 1\nname: p.d.t\ntype: table\nspec:\n  schema:\n  - name: id\n    type: INTEGER\n  expiration: 7\n  ratio: 0.25\n  enabled: true\n  note: null\n",
        )
        .unwrap();

        let wire = resource.to_wire().unwrap();
        let fields = &wire.spec.as_ref().unwrap().fields;
        assert_eq!(fields["expiration"].kind, Some(Kind::NumberValue(7.0)));

        assert_eq!(ResourceSpec::from_wire(&wire), resource);
    }

    #[test]
    fn test_non_finite_number_is_wire_error() {
        let mut resource = ResourceSpec {
            name: "p.d.t".into(),
            ..Default::default()
        };
        resource
            .spec
            .insert(
                "bad".into(),
                SpecNode::Map(BTreeMap::from([("x".to_string(), SpecNode::Float(f64::NAN))])),
            );

        let err = resource.to_wire().unwrap_err();
        assert!(err.to_string().contains("bad.x"));
    }

    #[test]
    fn test_enum_name_convention() {
        assert_eq!(to_wire_enum_name("sla_miss"), "TYPE_SLA_MISS");
        assert_eq!(from_wire_enum_name("TYPE_SLA_MISS"), "sla_miss");
    }
}
