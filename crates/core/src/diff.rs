use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::resource::Resource;

/// A single field transition inside a [`ChangeSet`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    /// The prior value (`null` for newly introduced fields).
    pub old: Value,
    /// The new value (`null` for removed fields).
    pub new: Value,
}

impl FieldChange {
    /// Build a change from any two serializable values.
    pub fn new(old: impl Into<Value>, new: impl Into<Value>) -> Self {
        Self {
            old: old.into(),
            new: new.into(),
        }
    }
}

/// A structural diff: dotted field path to old/new pair, equal values
/// omitted. `BTreeMap` keeps path order stable for canonical hashing.
pub type ChangeSet = BTreeMap<String, FieldChange>;

/// Compute the diff between two versions of a resource.
///
/// Covered paths: `name`, `parent_id`, `data.*` (recursive map diff, scalar
/// and sequence replace), and the metadata fields (`metadata.region`,
/// `metadata.tags.<k>`, ...). Timestamps and the modifier are bookkeeping
/// carried by the audit record itself and are not part of the diff, so
/// `diff_resources(r, r)` is always empty.
pub fn diff_resources(old: &Resource, new: &Resource) -> ChangeSet {
    let mut changes = ChangeSet::new();

    if old.name != new.name {
        changes.insert(
            "name".to_owned(),
            FieldChange::new(old.name.clone(), new.name.clone()),
        );
    }
    if old.parent_id != new.parent_id {
        changes.insert(
            "parent_id".to_owned(),
            FieldChange::new(
                option_value(old.parent_id.as_deref()),
                option_value(new.parent_id.as_deref()),
            ),
        );
    }

    diff_value(
        "data",
        &Value::Object(old.data.clone()),
        &Value::Object(new.data.clone()),
        &mut changes,
    );

    diff_scalar(
        "metadata.region",
        old.metadata.region.as_deref(),
        new.metadata.region.as_deref(),
        &mut changes,
    );
    diff_scalar(
        "metadata.environment",
        old.metadata.environment.as_deref(),
        new.metadata.environment.as_deref(),
        &mut changes,
    );
    diff_scalar(
        "metadata.cost_center",
        old.metadata.cost_center.as_deref(),
        new.metadata.cost_center.as_deref(),
        &mut changes,
    );

    // Tags are compared key-wise rather than as one opaque map.
    let keys: BTreeSet<&String> = old.metadata.tags.keys().chain(new.metadata.tags.keys()).collect();
    for key in keys {
        let old_tag = old.metadata.tags.get(key);
        let new_tag = new.metadata.tags.get(key);
        if old_tag != new_tag {
            changes.insert(
                format!("metadata.tags.{key}"),
                FieldChange::new(
                    option_value(old_tag.map(String::as_str)),
                    option_value(new_tag.map(String::as_str)),
                ),
            );
        }
    }

    if old.metadata.iam != new.metadata.iam {
        changes.insert(
            "metadata.iam".to_owned(),
            FieldChange::new(
                old.metadata.iam.clone().unwrap_or(Value::Null),
                new.metadata.iam.clone().unwrap_or(Value::Null),
            ),
        );
    }
    if old.metadata.custom != new.metadata.custom {
        changes.insert(
            "metadata.custom".to_owned(),
            FieldChange::new(
                old.metadata.custom.clone().unwrap_or(Value::Null),
                new.metadata.custom.clone().unwrap_or(Value::Null),
            ),
        );
    }

    changes
}

/// Full snapshot for a CREATE record: every top-level field from `null` to
/// its value.
pub fn create_snapshot(resource: &Resource) -> ChangeSet {
    snapshot_fields(resource)
        .into_iter()
        .map(|(path, value)| (path, FieldChange::new(Value::Null, value)))
        .collect()
}

/// Final snapshot for a DELETE record: every top-level field from its value
/// to `null`.
pub fn delete_snapshot(resource: &Resource) -> ChangeSet {
    snapshot_fields(resource)
        .into_iter()
        .map(|(path, value)| (path, FieldChange::new(value, Value::Null)))
        .collect()
}

fn snapshot_fields(resource: &Resource) -> Vec<(String, Value)> {
    let mut fields = vec![
        ("id".to_owned(), Value::String(resource.id.clone())),
        (
            "type".to_owned(),
            Value::String(resource.resource_type.clone()),
        ),
        (
            "provider".to_owned(),
            Value::String(resource.provider.as_str().to_owned()),
        ),
        ("name".to_owned(), Value::String(resource.name.clone())),
        ("data".to_owned(), Value::Object(resource.data.clone())),
        (
            "metadata".to_owned(),
            serde_json::to_value(&resource.metadata).unwrap_or(Value::Null),
        ),
    ];
    if let Some(parent_id) = &resource.parent_id {
        fields.push(("parent_id".to_owned(), Value::String(parent_id.clone())));
    }
    fields
}

fn option_value(v: Option<&str>) -> Value {
    v.map_or(Value::Null, |s| Value::String(s.to_owned()))
}

fn diff_scalar(path: &str, old: Option<&str>, new: Option<&str>, out: &mut ChangeSet) {
    if old != new {
        out.insert(
            path.to_owned(),
            FieldChange::new(option_value(old), option_value(new)),
        );
    }
}

/// Recursive value diff: maps recurse per key, everything else (scalars,
/// arrays, type changes) replaces wholesale at the current path.
fn diff_value(path: &str, old: &Value, new: &Value, out: &mut ChangeSet) {
    if old == new {
        return;
    }
    match (old, new) {
        (Value::Object(old_map), Value::Object(new_map)) => {
            let keys: BTreeSet<&String> = old_map.keys().chain(new_map.keys()).collect();
            for key in keys {
                let old_entry = old_map.get(key.as_str()).unwrap_or(&Value::Null);
                let new_entry = new_map.get(key.as_str()).unwrap_or(&Value::Null);
                diff_value(&format!("{path}.{key}"), old_entry, new_entry, out);
            }
        }
        _ => {
            out.insert(path.to_owned(), FieldChange::new(old.clone(), new.clone()));
        }
    }
}
