use super::ResourceBehavior;
use crate::dispatcher::Dispatcher;
use crate::error::{DispatchError, Outcome};
use crate::model::{Request, Resource, ResourceType, Response, ResponseStatusCode};
use async_trait::async_trait;
use tracing::debug;

/// The `<latest>` and `<oldest>` projections of an instance-bearing parent.
///
/// RETRIEVE returns the newest (or oldest) instance, DELETE removes it. Every
/// other operation is not allowed.
#[derive(Debug, Clone, Copy)]
pub struct LatestOldestBehavior {
    instance: ResourceType,
    oldest: bool,
}

impl LatestOldestBehavior {
    pub const fn latest(instance: ResourceType) -> Self {
        Self { instance, oldest: false }
    }

    pub const fn oldest(instance: ResourceType) -> Self {
        Self { instance, oldest: true }
    }

    fn label(&self) -> &'static str {
        if self.oldest {
            "oldest"
        } else {
            "latest"
        }
    }

    async fn instance(&self, dispatcher: &Dispatcher, resource: &Resource) -> Outcome<Resource> {
        let pi = resource
            .pi
            .as_deref()
            .ok_or_else(|| DispatchError::Internal(format!("<{}> without parent", self.label())))?;
        dispatcher
            .retrieve_latest_oldest_instance(pi, self.instance, self.oldest)
            .await?
            .ok_or_else(|| DispatchError::NotFound(format!("no instance for <{}>", self.label())))
    }
}

#[async_trait]
impl ResourceBehavior for LatestOldestBehavior {
    async fn handle_retrieve(&self, dispatcher: &Dispatcher, _request: &Request, resource: &Resource) -> Outcome<Response> {
        debug!(parent = ?resource.pi, "Retrieving {} instance", self.label());
        let instance = self.instance(dispatcher, resource).await?;
        Ok(Response::with_resource(ResponseStatusCode::Ok, instance))
    }

    async fn handle_delete(&self, dispatcher: &Dispatcher, request: &Request, resource: &Resource) -> Outcome<Response> {
        debug!(parent = ?resource.pi, "Deleting {} instance", self.label());
        let instance = self.instance(dispatcher, resource).await?;
        dispatcher.delete_local_resource(&instance, &request.originator, true).await?;
        Ok(Response::with_resource(ResponseStatusCode::Deleted, instance))
    }
}
