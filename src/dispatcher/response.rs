//! # Response Shaping
//!
//! Pure functions that turn a discovery result (a flat, tree-ordered list of
//! resources) into the negotiated representation: nested trees, reference
//! lists, URI lists, and modified-attribute diffs.

use crate::error::{DispatchError, Outcome};
use crate::model::{DesiredIdentifierResultType, Resource, ResourceType, ResultContent};
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

/// Validates the requested result content against what an operation allows.
pub fn negotiate(requested: Option<ResultContent>, allowed: &[ResultContent], operation: &str) -> Outcome<ResultContent> {
    let Some(rcn) = requested else {
        return allowed
            .first()
            .copied()
            .ok_or_else(|| DispatchError::Internal(format!("no result content allowed for {operation}")));
    };
    if allowed.contains(&rcn) {
        Ok(rcn)
    } else {
        Err(DispatchError::BadRequest(format!(
            "invalid rcn: {} for {operation}",
            rcn.code()
        )))
    }
}

/// Instances order by creation time, everything else by name.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum SortKey {
    Created(DateTime<Utc>),
    Named(String),
}

fn sort_key(resource: &Resource) -> (ResourceType, SortKey) {
    if resource.ty.is_instance() {
        (resource.ty, SortKey::Created(resource.ct))
    } else {
        (resource.ty, SortKey::Named(resource.rn.to_lowercase()))
    }
}

/// Rebuilds the resource tree from a tree-ordered list.
///
/// Takes the resources that belong directly below `parent_ri` (or every
/// resource when `None`), grouped into one array per type tag. The first
/// unconsumed resource decides which `(type, tpe)` group the next pass
/// collects. Each collected resource consumes its own descendants from the
/// list before the pass continues. Returns the grouped children and the
/// resources that were not placed.
pub fn resource_tree(resources: Vec<Resource>, parent_ri: Option<&str>, sort: bool) -> (Map<String, Value>, Vec<Resource>) {
    let mut remaining = resources;
    let mut tree = Map::new();

    loop {
        let mut group: Vec<(Resource, Map<String, Value>)> = Vec::new();
        let mut handled: Option<(ResourceType, String)> = None;
        let mut idx = 0;

        while idx < remaining.len() {
            let candidate = &remaining[idx];
            let foreign = parent_ri.is_some_and(|pi| candidate.pi.as_deref() != Some(pi));
            if foreign || candidate.ty.is_virtual() {
                idx += 1;
                continue;
            }
            let (ty, tpe) = handled.get_or_insert_with(|| (candidate.ty, candidate.tpe.clone()));
            if candidate.ty != *ty || candidate.tpe != *tpe {
                idx += 1;
                continue;
            }
            let resource = remaining.remove(idx);
            let (children, rest) = resource_tree(remaining, Some(&resource.ri), sort);
            remaining = rest;
            group.push((resource, children));
        }

        let Some((_, tpe)) = handled else {
            break;
        };
        if group.is_empty() {
            break;
        }
        if sort {
            group.sort_by_key(|(resource, _)| sort_key(resource));
        }
        let entries = group
            .into_iter()
            .map(|(resource, children)| {
                let mut attributes = resource.to_attributes();
                attributes.extend(children);
                Value::Object(attributes)
            })
            .collect();
        tree.insert(tpe, Value::Array(entries));
    }
    (tree, remaining)
}

/// Child-resource references (`{nm, typ, val}`) for a flat list.
///
/// `<latest>`/`<oldest>` projections are left out. Specialised flex
/// containers carry their container definition as `spty`.
pub fn references(resources: &[Resource], drt: DesiredIdentifierResultType, sort: bool) -> Vec<Value> {
    let mut ordered: Vec<&Resource> = resources.iter().collect();
    if sort {
        ordered.sort_by_key(|resource| (resource.ty, resource.rn.to_lowercase()));
    }
    ordered
        .into_iter()
        .filter(|resource| !resource.ty.is_latest_oldest())
        .map(|resource| {
            let val = match drt {
                DesiredIdentifierResultType::Structured => resource.structured_path(),
                DesiredIdentifierResultType::Unstructured => resource.ri.clone(),
            };
            let mut reference = json!({ "nm": resource.rn, "typ": resource.ty.code(), "val": val });
            if resource.ty == ResourceType::FlexContainer {
                if let Some(cnd) = &resource.cnd {
                    reference["spty"] = Value::from(cnd.clone());
                }
            }
            reference
        })
        .collect()
}

/// `{"m2m:rrl": {"rrf": [...]}}`
pub fn reference_list(resources: &[Resource], drt: DesiredIdentifierResultType, sort: bool) -> Value {
    json!({ "m2m:rrl": { "rrf": references(resources, drt, sort) } })
}

/// `{"m2m:uril": [...]}`: structured paths, or SP-relative ids for unstructured results.
pub fn uri_list(resources: &[Resource], drt: DesiredIdentifierResultType, cse_id: &str) -> Value {
    let uris: Vec<Value> = resources
        .iter()
        .map(|resource| match drt {
            DesiredIdentifierResultType::Structured => Value::from(resource.structured_path()),
            DesiredIdentifierResultType::Unstructured => Value::from(format!("/{cse_id}/{}", resource.ri)),
        })
        .collect();
    json!({ "m2m:uril": uris })
}

/// `{<tpe>: attributes + grouped children}` of the target resource.
pub fn attributes_with_children(resource: &Resource, children: Map<String, Value>) -> Value {
    let mut attributes = resource.to_attributes();
    attributes.extend(children);
    json!({ resource.tpe.clone(): attributes })
}

/// `{<tpe>: attributes + "ch": [references]}` of the target resource.
pub fn attributes_with_references(resource: &Resource, references: Vec<Value>) -> Value {
    let mut attributes = resource.to_attributes();
    attributes.insert("ch".to_string(), Value::Array(references));
    json!({ resource.tpe.clone(): attributes })
}

/// Attributes that differ between two snapshots.
///
/// Contains every attribute of `new` that is absent from or different in
/// `old`, every attribute of `old` missing from `new` (as `null`), and every
/// attribute in `modifiers` whose final value differs from what `requested`
/// asked for.
pub fn modified_attributes(
    old: &Map<String, Value>,
    new: &Map<String, Value>,
    requested: &Map<String, Value>,
    modifiers: &[String],
) -> Map<String, Value> {
    let mut diff = Map::new();
    for (name, value) in new {
        if old.get(name) != Some(value) {
            diff.insert(name.clone(), value.clone());
        }
    }
    for name in old.keys() {
        if !new.contains_key(name) {
            diff.insert(name.clone(), Value::Null);
        }
    }
    for name in modifiers {
        if let (Some(asked), Some(value)) = (requested.get(name), new.get(name)) {
            if asked != value {
                diff.insert(name.clone(), value.clone());
            }
        }
    }
    diff
}
