//! Resource specification as stored in `resource.yaml`

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A datastore object (table, dataset, topic...) owned by one namespace and datastore.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResourceSpec {
    pub version: i32,
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub spec: BTreeMap<String, SpecNode>,

    #[serde(skip)]
    pub path: PathBuf,
}

/// Free-form value tree carried in a resource's `spec` section.
///
/// Maps are kept sorted so encoding is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpecNode {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<SpecNode>),
    Map(BTreeMap<String, SpecNode>),
}

impl SpecNode {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SpecNode::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&SpecNode> {
        match self {
            SpecNode::Map(map) => map.get(key),
            _ => None,
        }
    }
}

impl From<&str> for SpecNode {
    fn from(value: &str) -> Self {
        SpecNode::String(value.to_string())
    }
}

impl From<i64> for SpecNode {
    fn from(value: i64) -> Self {
        SpecNode::Int(value)
    }
}

impl From<bool> for SpecNode {
    fn from(value: bool) -> Self {
        SpecNode::Bool(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"
version: 1
name: project.dataset.table
type: table
labels:
  owner: data
spec:
  description: sample table
  schema:
  - name: id
    type: INTEGER
    mode: required
  - name: tags
    type: STRING
    mode: repeated
  partition:
    field: event_ts
    expiration: 7
  cluster: null
  ratio: 0.5
  public: false
"#;

    #[test]
    fn test_decode_nested_spec() {
        let resource: ResourceSpec = serde_yaml::from_str(TABLE).unwrap();
        assert_eq!(resource.resource_type, "table");

        let schema = match &resource.spec["schema"] {
            SpecNode::List(items) => items,
            other => panic!("schema decoded as {:?}", other),
        };
        assert_eq!(schema.len(), 2);
        assert_eq!(schema[1].get("mode").and_then(SpecNode::as_str), Some("repeated"));
        assert_eq!(
            resource.spec["partition"].get("expiration"),
            Some(&SpecNode::Int(7))
        );
        assert_eq!(resource.spec["cluster"], SpecNode::Null);
        assert_eq!(resource.spec["ratio"], SpecNode::Float(0.5));
        assert_eq!(resource.spec["public"], SpecNode::Bool(false));
    }

    #[test]
    fn test_encode_sorts_keys() {
        let resource: ResourceSpec = serde_yaml::from_str(TABLE).unwrap();
        let yaml = serde_yaml::to_string(&resource).unwrap();

        let cluster = yaml.find("cluster:").unwrap();
        let description = yaml.find("description:").unwrap();
        let schema = yaml.find("schema:").unwrap();
        assert!(cluster < description && description < schema);

        let reparsed: ResourceSpec = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(reparsed, resource);
    }

    #[test]
    fn test_unknown_top_level_key_rejected() {
        assert!(serde_yaml::from_str::<ResourceSpec>("name: a\nkind: table\n").is_err());
    }
}
