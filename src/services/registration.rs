//! Registration collaborator interface and the node's default registrar.

use crate::error::{DispatchError, Outcome};
use crate::model::{Resource, ResourceType};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

/// Registration-time structural validation.
#[async_trait]
pub trait Registration: Send + Sync {
    /// Validates a candidate resource before it is persisted.
    ///
    /// Returns the originator the rest of the operation runs as, which may
    /// differ from the requesting one (e.g. an assigned application-entity id).
    async fn check_create(&self, resource: &mut Resource, originator: &str, parent: &Resource) -> Outcome<String>;

    async fn check_update(&self, _resource: &Resource, _update: &Map<String, Value>) -> Outcome<()> {
        Ok(())
    }

    /// Releases registration state. Also used to roll back a failed CREATE.
    async fn check_delete(&self, _resource: &Resource) -> Outcome<()> {
        Ok(())
    }
}

/// Assigns originators to self-registering application entities.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardRegistration;

impl StandardRegistration {
    fn assigned_originator(originator: &str) -> String {
        match originator {
            "" | "C" => format!("C{}", short_id()),
            "S" => format!("S{}", short_id()),
            other => other.to_string(),
        }
    }
}

fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string().chars().take(10).collect()
}

#[async_trait]
impl Registration for StandardRegistration {
    async fn check_create(&self, resource: &mut Resource, originator: &str, parent: &Resource) -> Outcome<String> {
        if resource.ty != ResourceType::Ae {
            return Ok(originator.to_string());
        }
        if !matches!(parent.ty, ResourceType::CseBase | ResourceType::RemoteCse) {
            return Err(DispatchError::BadRequest(format!(
                "<ae> must be registered under a CSE, not {}",
                parent.ty
            )));
        }
        if resource.attribute("api").is_none() {
            return Err(DispatchError::BadRequest("missing attribute: api".to_string()));
        }
        let assigned = Self::assigned_originator(originator);
        debug!(%assigned, "Registering application entity");
        resource.attributes.insert("aei".to_string(), Value::from(assigned.clone()));
        Ok(assigned)
    }
}
