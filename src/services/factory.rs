//! Factory collaborator interface and the default payload deserialiser.

use crate::error::{DispatchError, Outcome};
use crate::model::{parse_timestamp, Resource, ResourceType};
use serde_json::{Map, Value};

/// Builds candidate resources from CREATE payloads.
pub trait Factory: Send + Sync {
    /// Validates `payload` (`{ <tpe>: { ... } }`) and instantiates a resource
    /// of type `ty` under `pi`. Invalid payloads fail with `BadRequest`.
    fn from_payload(&self, payload: &Value, pi: &str, ty: ResourceType) -> Outcome<Resource>;
}

/// Attributes a client may never provide on CREATE.
const SERVER_ASSIGNED: [&str; 7] = ["ri", "pi", "ty", "ct", "lt", "st", "cs"];

/// Deserialises the common attributes and the mandatory type-specific ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardFactory;

impl StandardFactory {
    fn type_tag(payload: &Value, ty: ResourceType) -> Outcome<(String, &Map<String, Value>)> {
        let doc = payload
            .as_object()
            .filter(|doc| doc.len() == 1)
            .ok_or_else(|| bad("payload must contain exactly one resource"))?;
        let (tpe, inner) = doc.iter().next().ok_or_else(|| bad("empty payload"))?;
        let inner = inner.as_object().ok_or_else(|| bad("resource must be an object"))?;
        // Flex containers carry their specialisation as the type tag.
        let accepted = tpe == ty.tpe() || (ty == ResourceType::FlexContainer && tpe.contains(':'));
        if !accepted {
            return Err(bad(&format!("type tag {tpe} does not match resource type {ty}")));
        }
        Ok((tpe.clone(), inner))
    }

    fn require(resource: &Resource, name: &str) -> Outcome<()> {
        match resource.attribute(name) {
            Some(_) => Ok(()),
            None => Err(bad(&format!("missing attribute: {name}"))),
        }
    }
}

impl Factory for StandardFactory {
    fn from_payload(&self, payload: &Value, pi: &str, ty: ResourceType) -> Outcome<Resource> {
        let (tpe, inner) = Self::type_tag(payload, ty)?;
        let id = uuid::Uuid::new_v4().simple().to_string();
        let short: String = id.chars().take(10).collect();
        let ri = format!("{}{}", ty.short_name(), short);
        let mut resource = Resource::new(ty, ri, format!("{}_{}", ty.short_name(), short), Some(pi.to_string()));
        resource.tpe = tpe;

        for (name, value) in inner {
            match name.as_str() {
                n if SERVER_ASSIGNED.contains(&n) => {
                    return Err(bad(&format!("attribute is server-assigned: {name}")));
                }
                "rn" => {
                    let rn = value.as_str().ok_or_else(|| bad("rn must be a string"))?;
                    if rn.is_empty() || rn.contains('/') {
                        return Err(bad(&format!("invalid resource name: {rn}")));
                    }
                    resource.rn = rn.to_string();
                }
                "et" => {
                    let et = value.as_str().and_then(parse_timestamp).ok_or_else(|| bad("invalid et"))?;
                    resource.et = et;
                }
                "cnd" => {
                    let cnd = value.as_str().ok_or_else(|| bad("cnd must be a string"))?;
                    resource.cnd = Some(cnd.to_string());
                }
                "lbl" | "acpi" | "lnk" | "cnf" => {
                    let mut single = Map::new();
                    single.insert(name.clone(), value.clone());
                    resource.apply_update(&single).map_err(|e| bad(&e))?;
                }
                _ => {
                    resource.attributes.insert(name.clone(), value.clone());
                }
            }
        }
        resource.modified.clear();
        resource.lt = resource.ct;

        match ty {
            ResourceType::Ae => Self::require(&resource, "api")?,
            ResourceType::ContentInstance | ResourceType::FlexContainerInstance => {
                Self::require(&resource, "con")?;
                let size = match resource.attributes.get("con") {
                    Some(Value::String(con)) => con.len(),
                    Some(other) => other.to_string().len(),
                    None => 0,
                };
                resource.cs = Some(size as u64);
                resource.st = Some(0);
            }
            ResourceType::Container => {
                resource.st = Some(0);
                resource.attributes.insert("cni".into(), Value::from(0));
                resource.attributes.insert("cbs".into(), Value::from(0));
            }
            ResourceType::FlexContainer => {
                Self::require(&resource, "cnd")?;
                resource.st = Some(0);
            }
            ResourceType::Group => {
                let members = resource.attributes.get("mid").and_then(Value::as_array);
                if members.is_none() {
                    return Err(bad("missing attribute: mid"));
                }
            }
            ResourceType::Subscription => Self::require(&resource, "nu")?,
            _ => {}
        }
        Ok(resource)
    }
}

fn bad(msg: &str) -> DispatchError {
    DispatchError::BadRequest(msg.to_string())
}
