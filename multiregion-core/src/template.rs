//! Template - A CloudFormation-style document of resources and outputs
//!
//! Resources and outputs refer to each other only by logical id strings
//! (`Ref`, `Fn::GetAtt`, `Fn::Sub`, `DependsOn`), so the document is kept as
//! plain JSON values and edited in place.
//!
//! Templates must use the long form of intrinsic functions (`Ref:` rather
//! than `!Ref`).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{LoadResult, TransformError, TransformResult};
use crate::merge::merge_maps;

const BASE_RESOURCES: &str = include_str!("resources.yml");

/// A resource/output document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Template {
    #[serde(rename = "Resources", default)]
    pub resources: Map<String, Value>,
    #[serde(rename = "Outputs", default, skip_serializing_if = "Map::is_empty")]
    pub outputs: Map<String, Value>,
    /// Any other top-level section, kept as-is
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A reference from one part of the template to a logical id
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Reference {
    /// Where the reference appears (e.g., "Outputs.GlobalEndpoint")
    pub referrer: String,
    /// The referenced logical id
    pub target: String,
}

impl Template {
    /// The multi-regional resources bundled with this crate
    pub fn base_resources() -> LoadResult<Self> {
        Self::from_yaml_str(BASE_RESOURCES)
    }

    pub fn from_yaml_str(content: &str) -> LoadResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_json_str(content: &str) -> LoadResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn to_json_pretty(&self) -> LoadResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_yaml(&self) -> LoadResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn contains_resource(&self, logical_id: &str) -> bool {
        self.resources.contains_key(logical_id)
    }

    pub fn contains_output(&self, logical_id: &str) -> bool {
        self.outputs.contains_key(logical_id)
    }

    /// Mutable access to a resource's `Properties` mapping
    pub fn properties_mut(&mut self, logical_id: &str) -> TransformResult<&mut Map<String, Value>> {
        let resource = self
            .resources
            .get_mut(logical_id)
            .ok_or_else(|| TransformError::MissingResource(logical_id.to_string()))?;

        resource
            .get_mut("Properties")
            .and_then(Value::as_object_mut)
            .ok_or_else(|| {
                TransformError::unexpected_shape(
                    format!("Resources.{}.Properties", logical_id),
                    "a mapping",
                )
            })
    }

    /// Mutable access to the element list of an output's `Fn::Join` value
    pub fn output_join_elements_mut(&mut self, logical_id: &str) -> TransformResult<&mut Vec<Value>> {
        let output = self
            .outputs
            .get_mut(logical_id)
            .ok_or_else(|| TransformError::MissingOutput(logical_id.to_string()))?;

        output
            .get_mut("Value")
            .and_then(|value| value.get_mut("Fn::Join"))
            .and_then(|join| join.get_mut(1))
            .and_then(Value::as_array_mut)
            .ok_or_else(|| {
                TransformError::unexpected_shape(
                    format!("Outputs.{}.Value.Fn::Join[1]", logical_id),
                    "a list",
                )
            })
    }

    pub fn remove_resource(&mut self, logical_id: &str) -> bool {
        self.resources.remove(logical_id).is_some()
    }

    pub fn remove_output(&mut self, logical_id: &str) -> bool {
        self.outputs.remove(logical_id).is_some()
    }

    /// Every reference to one of `targets`, in document order
    pub fn references_to(&self, targets: &BTreeSet<String>) -> Vec<Reference> {
        let mut found = Vec::new();

        for (logical_id, resource) in &self.resources {
            let referrer = format!("Resources.{}", logical_id);
            if let Some(depends_on) = resource.get("DependsOn") {
                for target in string_values(depends_on) {
                    if targets.contains(target) {
                        found.push(Reference {
                            referrer: referrer.clone(),
                            target: target.to_string(),
                        });
                    }
                }
            }
            collect_references(resource, &referrer, targets, &mut found);
        }

        for (logical_id, output) in &self.outputs {
            let referrer = format!("Outputs.{}", logical_id);
            collect_references(output, &referrer, targets, &mut found);
        }

        found
    }

    /// Deep-merge another template into this one
    pub fn merge_from(&mut self, other: Template) {
        merge_maps(&mut self.resources, other.resources);
        merge_maps(&mut self.outputs, other.outputs);
        merge_maps(&mut self.extra, other.extra);
    }
}

fn string_values(value: &Value) -> Vec<&str> {
    match value {
        Value::String(s) => vec![s.as_str()],
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => vec![],
    }
}

fn collect_references(
    value: &Value,
    referrer: &str,
    targets: &BTreeSet<String>,
    found: &mut Vec<Reference>,
) {
    match value {
        Value::Object(map) => {
            for (key, inner) in map {
                let referenced: Vec<String> = match key.as_str() {
                    "Ref" => inner.as_str().map(|s| vec![s.to_string()]).unwrap_or_default(),
                    "Fn::GetAtt" => get_att_target(inner).into_iter().collect(),
                    "Fn::Sub" => sub_targets(inner),
                    _ => vec![],
                };
                for target in referenced {
                    if targets.contains(&target) {
                        found.push(Reference {
                            referrer: referrer.to_string(),
                            target,
                        });
                    }
                }
                collect_references(inner, referrer, targets, found);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_references(item, referrer, targets, found);
            }
        }
        _ => {}
    }
}

/// `[Id, Attr]` or `"Id.Attr"`
fn get_att_target(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => items.first().and_then(Value::as_str).map(str::to_string),
        Value::String(s) => s.split('.').next().map(str::to_string),
        _ => None,
    }
}

/// Logical ids named by `${Id}` / `${Id.Attr}` placeholders
fn sub_targets(value: &Value) -> Vec<String> {
    let text = match value {
        Value::String(s) => s.as_str(),
        Value::Array(items) => match items.first().and_then(Value::as_str) {
            Some(s) => s,
            None => return vec![],
        },
        _ => return vec![],
    };

    let mut targets = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        let name = &after[..end];
        // ${!Literal} is an escape, not a reference
        if !name.starts_with('!') {
            let id = name.split('.').next().unwrap_or(name);
            targets.push(id.to_string());
        }
        rest = &after[end + 1..];
    }
    targets
}
