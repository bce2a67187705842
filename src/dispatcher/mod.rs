//! # Request Dispatcher
//!
//! The [`Dispatcher`] is the entry point for every inbound operation. It
//! resolves the target, enforces timing and access, delegates to per-type
//! [`ResourceBehavior`]s, persists through the injected [`Storage`], and shapes
//! the response.
//!
//! ## Architecture Note
//! The dispatcher holds no state of its own beyond its collaborators, which are
//! injected once at construction ([`Collaborators`]) and shared for the
//! lifetime of the node. Concurrent operations share nothing but those
//! collaborators; serialising writes to the same resource is the storage's job.
//!
//! Each operation runs as one sequential pass:
//!
//! 1. classify the identifier (pure, see [`resolver`])
//! 2. sleep until the scheduled execution time, if any
//! 3. fail with `RequestTimeout` if the request already expired
//! 4. complete hybrid identifiers (one storage lookup)
//! 5. redirect fan-out points and polling-channel endpoints to their handlers
//! 6. the operation itself ([`retrieve`], [`create`], [`update`], [`delete`], [`notify`])
//!
//! ## Internal Operations
//! Behaviors and other node components use the permission-free internal
//! operations (`retrieve_resource`, `create_local_resource`,
//! `delete_local_resource`, ...). They run without access checks and without
//! result-content negotiation.

mod create;
mod delete;
mod discovery;
pub mod filter;
mod notify;
pub mod resolver;
pub mod response;
mod retrieve;
mod update;

use crate::behavior::{BehaviorRegistry, ResourceBehavior};
use crate::config::DispatcherConfig;
use crate::error::{DispatchError, Outcome};
use crate::model::{Operation, Permission, Request, Resource, ResourceType, Response};
use crate::services::{
    BroadcastEvents, EventSink, Factory, OpenSecurity, Registration, RemoteProxy, Security, StandardFactory,
    StandardRegistration, Storage, UnreachableRemote,
};
use chrono::Utc;
use resolver::{Identifier, Target};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Boxed future for the recursive internal operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// =============================================================================
// COLLABORATORS
// =============================================================================

/// The injected services a [`Dispatcher`] works with.
///
/// Only storage is mandatory; everything else starts with the node defaults
/// and can be replaced with the `with_*` builders.
#[derive(Clone)]
pub struct Collaborators {
    pub storage: Arc<dyn Storage>,
    pub security: Arc<dyn Security>,
    pub registration: Arc<dyn Registration>,
    pub factory: Arc<dyn Factory>,
    pub events: Arc<dyn EventSink>,
    pub remote: Arc<dyn RemoteProxy>,
}

impl Collaborators {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            security: Arc::new(OpenSecurity),
            registration: Arc::new(StandardRegistration),
            factory: Arc::new(StandardFactory),
            events: Arc::new(BroadcastEvents::new(16)),
            remote: Arc::new(UnreachableRemote),
        }
    }

    pub fn with_security(mut self, security: Arc<dyn Security>) -> Self {
        self.security = security;
        self
    }

    pub fn with_registration(mut self, registration: Arc<dyn Registration>) -> Self {
        self.registration = registration;
        self
    }

    pub fn with_factory(mut self, factory: Arc<dyn Factory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemoteProxy>) -> Self {
        self.remote = remote;
        self
    }
}

// =============================================================================
// DISPATCHER
// =============================================================================

pub struct Dispatcher {
    config: DispatcherConfig,
    storage: Arc<dyn Storage>,
    security: Arc<dyn Security>,
    registration: Arc<dyn Registration>,
    factory: Arc<dyn Factory>,
    events: Arc<dyn EventSink>,
    remote: Arc<dyn RemoteProxy>,
    behaviors: BehaviorRegistry,
}

impl Dispatcher {
    pub fn new(config: DispatcherConfig, collaborators: Collaborators, behaviors: BehaviorRegistry) -> Self {
        let Collaborators { storage, security, registration, factory, events, remote } = collaborators;
        Self { config, storage, security, registration, factory, events, remote, behaviors }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn factory(&self) -> &dyn Factory {
        self.factory.as_ref()
    }

    pub fn behavior(&self, ty: ResourceType) -> Arc<dyn ResourceBehavior> {
        self.behaviors.get(ty)
    }

    /// Dispatches one request to the operation it names.
    pub fn process_request<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Outcome<Response>> {
        Box::pin(async move {
            let outcome = match request.operation {
                Operation::Retrieve => self.process_retrieve_request(request).await,
                Operation::Create => self.process_create_request(request).await,
                Operation::Update => self.process_update_request(request).await,
                Operation::Delete => self.process_delete_request(request).await,
                Operation::Notify => self.process_notify_request(request).await,
            };
            match &outcome {
                Ok(response) => debug!(to = %request.to, status = %response.status, "Request processed"),
                Err(err) => debug!(to = %request.to, status = %err.status(), dbg = err.diagnostic(), "Request failed"),
            }
            outcome
        })
    }

    // =========================================================================
    // RESOLUTION & TIMING
    // =========================================================================

    fn classify(&self, id: &str) -> Identifier {
        resolver::classify(id, &self.config.cse_id, &self.config.cse_rn)
    }

    /// Waits for the scheduled execution time, then rejects expired requests.
    async fn check_timing(&self, request: &Request) -> Outcome<()> {
        if let Some(oet) = request.operation_execution_time {
            if let Ok(delay) = (oet - Utc::now()).to_std() {
                debug!(?delay, "Delaying request until its execution time");
                tokio::time::sleep(delay).await;
            }
        }
        if let Some(rqet) = request.expiration {
            if rqet <= Utc::now() {
                warn!(to = %request.to, %rqet, "Request expired");
                return Err(DispatchError::RequestTimeout(format!("request expired at {rqet}")));
            }
        }
        Ok(())
    }

    /// Turns a classified identifier into a storage target.
    async fn complete(&self, identifier: Identifier) -> Outcome<Target> {
        match identifier {
            Identifier::Unstructured(ri) => Ok(Target::Id(ri)),
            Identifier::Structured(srn) => Ok(Target::Path(srn)),
            Identifier::Remote(id) => Ok(Target::Remote(id)),
            Identifier::Hybrid { ri, suffix } => match self.storage.retrieve_by_id(&ri).await {
                Ok(head) => Ok(Target::Path(format!("{}/{suffix}", head.structured_path()))),
                // Left for the operation to report as not found.
                Err(DispatchError::NotFound(_)) => Ok(Target::Path(format!("{ri}/{suffix}"))),
                Err(err) => Err(err),
            },
        }
    }

    /// Steps 1 to 4 of every operation.
    async fn resolve_target(&self, request: &Request) -> Outcome<Target> {
        let identifier = self.classify(&request.to);
        self.check_timing(request).await?;
        let target = self.complete(identifier).await?;
        debug!(?target, "Resolved target");
        Ok(target)
    }

    /// A fan-out point or polling-channel endpoint addressed by `target`.
    ///
    /// Paths below a fan-out point (`grp/fopt/la`) resolve to the fan-out point.
    async fn virtual_endpoint(&self, target: &Target) -> Outcome<Option<Resource>> {
        let candidate = match target {
            Target::Path(srn) => {
                let head = resolver::virtual_head(srn, "fopt")
                    .or_else(|| resolver::virtual_head(srn, "pcu").filter(|head| *head == srn.as_str()));
                match head {
                    Some(head) => self.storage.retrieve_by_path(head).await,
                    None => return Ok(None),
                }
            }
            Target::Id(ri) => self.storage.retrieve_by_id(ri).await,
            Target::Remote(_) => return Ok(None),
        };
        match candidate {
            Ok(resource) if matches!(resource.ty, ResourceType::GroupFanoutPoint | ResourceType::PollingChannelUri) => {
                Ok(Some(resource))
            }
            Ok(_) | Err(DispatchError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Step 5: hands fan-out and polling-channel requests to their handlers.
    async fn redirect_endpoint(&self, request: &Request, target: &Target) -> Outcome<Option<Response>> {
        let Some(endpoint) = self.virtual_endpoint(target).await? else {
            return Ok(None);
        };
        match endpoint.ty {
            ResourceType::GroupFanoutPoint => {
                debug!(fopt = %endpoint.ri, "Redirecting to fan-out point");
                self.handle_virtual(request, &endpoint).await.map(Some)
            }
            ResourceType::PollingChannelUri if matches!(request.operation, Operation::Retrieve | Operation::Notify) => {
                if !self
                    .security
                    .has_access_to_polling_channel(&request.originator, &endpoint)
                    .await
                {
                    warn!(pcu = %endpoint.ri, originator = %request.originator, "Polling channel access denied");
                    return Err(DispatchError::OriginatorHasNoPrivilege(format!(
                        "originator: {} has no access to <pollingChannelURI>: {}",
                        request.originator, endpoint.ri
                    )));
                }
                debug!(pcu = %endpoint.ri, "Redirecting to polling channel endpoint");
                self.handle_virtual(request, &endpoint).await.map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Runs the operation-specific handler of a virtual resource.
    async fn handle_virtual(&self, request: &Request, resource: &Resource) -> Outcome<Response> {
        let behavior = self.behavior(resource.ty);
        match request.operation {
            Operation::Retrieve => behavior.handle_retrieve(self, request, resource).await,
            Operation::Create => behavior.handle_create(self, request, resource).await,
            Operation::Update => behavior.handle_update(self, request, resource).await,
            Operation::Delete => behavior.handle_delete(self, request, resource).await,
            Operation::Notify => behavior.handle_notify(self, request, resource).await,
        }
    }

    async fn check_access(&self, originator: &str, resource: &Resource, permission: Permission) -> Outcome<()> {
        if self.security.has_access(originator, resource, permission).await {
            Ok(())
        } else {
            warn!(%originator, ri = %resource.ri, %permission, "Access denied");
            Err(DispatchError::OriginatorHasNoPrivilege(format!(
                "originator: {originator} has no {permission} privilege for: {}",
                resource.ri
            )))
        }
    }

    fn remote_not_supported(operation: &str, id: &str) -> DispatchError {
        DispatchError::NotImplemented(format!("{operation} forwarding to another node is not supported: {id}"))
    }

    // =========================================================================
    // INTERNAL OPERATIONS
    // =========================================================================

    /// Retrieves any resource by identifier, forwarding other nodes' identifiers
    /// to the remote proxy. No access check.
    pub async fn retrieve_resource(&self, id: &str, originator: &str) -> Outcome<Resource> {
        match self.complete(self.classify(id)).await? {
            Target::Remote(id) => {
                debug!(%id, "Retrieving from remote node");
                self.remote.retrieve(&id, originator).await
            }
            target => self.retrieve_local_resource(&target).await,
        }
    }

    pub async fn retrieve_local_resource(&self, target: &Target) -> Outcome<Resource> {
        match target {
            Target::Id(ri) => self.storage.retrieve_by_id(ri).await,
            Target::Path(srn) => self.storage.retrieve_by_path(srn).await,
            Target::Remote(id) => Err(DispatchError::NotFound(format!("not a local resource: {id}"))),
        }
    }

    pub async fn direct_child_resources(&self, pi: &str, ty: Option<ResourceType>) -> Outcome<Vec<Resource>> {
        self.storage.direct_children(pi, ty).await
    }

    pub async fn count_direct_child_resources(&self, pi: &str, ty: Option<ResourceType>) -> Outcome<usize> {
        self.storage.count_direct_children(pi, ty).await
    }

    /// The newest (or oldest) instance of type `ty` below `pi`, by creation time.
    pub async fn retrieve_latest_oldest_instance(
        &self,
        pi: &str,
        ty: ResourceType,
        oldest: bool,
    ) -> Outcome<Option<Resource>> {
        let instances = self.direct_child_resources(pi, Some(ty)).await?.into_iter();
        Ok(if oldest {
            instances.min_by_key(|instance| instance.ct)
        } else {
            instances.max_by_key(|instance| instance.ct)
        })
    }

    /// Deletes every direct child of `parent` (optionally of one type) with its subtree.
    pub async fn delete_child_resources(
        &self,
        parent: &Resource,
        originator: &str,
        ty: Option<ResourceType>,
    ) -> Outcome<()> {
        for child in self.direct_child_resources(&parent.ri, ty).await? {
            self.delete_local_resource(&child, originator, false).await?;
        }
        Ok(())
    }

    /// Places `resource` below `parent`, activates it and notifies the parent.
    ///
    /// Rolls the resource back out of storage if activation or the follow-up
    /// persist fails, or if the parent vanished in the meantime.
    pub async fn create_local_resource(
        &self,
        mut resource: Resource,
        parent: &Resource,
        originator: &str,
    ) -> Outcome<Resource> {
        if !self.behavior(parent.ty).can_have_child(parent, resource.ty) {
            let msg = format!("<{}> cannot have a child of type {}", parent.short_tpe(), resource.ty);
            return Err(if resource.ty == ResourceType::Subscription {
                DispatchError::TargetNotSubscribable(msg)
            } else {
                DispatchError::InvalidChildResourceType(msg)
            });
        }
        resource.srn = Some(format!("{}/{}", parent.structured_path(), resource.rn));
        self.storage.create(&resource).await?;

        if let Err(err) = self.behavior(resource.ty).activate(self, &mut resource, parent, originator).await {
            warn!(ri = %resource.ri, %err, "Activation failed, removing resource");
            self.discard(&resource, originator).await;
            return Err(err);
        }
        let resource = match self.storage.update(&resource).await {
            Ok(stored) => stored,
            Err(err) => {
                self.discard(&resource, originator).await;
                return Err(err);
            }
        };
        self.events.created(&resource);

        // The parent may have changed while the child was activated.
        let mut parent = match self.storage.retrieve_by_id(&parent.ri).await {
            Ok(parent) => parent,
            Err(DispatchError::NotFound(_)) => {
                self.discard(&resource, originator).await;
                return Err(DispatchError::Internal(format!(
                    "parent vanished while creating: {}",
                    resource.ri
                )));
            }
            Err(err) => return Err(err),
        };
        self.behavior(parent.ty).child_added(self, &mut parent, &resource, originator).await?;
        self.storage.update(&parent).await?;

        info!(ri = %resource.ri, srn = ?resource.srn, ty = %resource.ty, "Created");
        Ok(resource)
    }

    /// Compensates a failed creation.
    async fn discard(&self, resource: &Resource, originator: &str) {
        if let Err(err) = self.delete_child_resources(resource, originator, None).await {
            warn!(ri = %resource.ri, %err, "Failed to remove children of discarded resource");
        }
        if let Err(err) = self.storage.delete(&resource.ri).await {
            warn!(ri = %resource.ri, %err, "Failed to remove discarded resource");
        }
    }

    /// Applies an update payload through the type's behavior and persists it.
    pub async fn update_local_resource(
        &self,
        mut resource: Resource,
        update: &serde_json::Map<String, serde_json::Value>,
        originator: &str,
    ) -> Outcome<Resource> {
        self.behavior(resource.ty).update(self, &mut resource, update, originator).await?;
        let mut updated = self.storage.update(&resource).await?;
        updated.modified = resource.modified;
        self.events.updated(&updated);
        info!(ri = %updated.ri, modified = ?updated.modified, "Updated");
        Ok(updated)
    }

    /// Removes `resource` with its whole subtree and notifies the parent.
    pub fn delete_local_resource<'a>(
        &'a self,
        resource: &'a Resource,
        originator: &'a str,
        with_deregistration: bool,
    ) -> BoxFuture<'a, Outcome<Resource>> {
        Box::pin(async move {
            self.delete_child_resources(resource, originator, None).await?;
            self.behavior(resource.ty).deactivate(self, resource, originator).await?;
            if with_deregistration {
                self.registration
                    .check_delete(resource)
                    .await
                    .map_err(|err| DispatchError::BadRequest(err.diagnostic().to_string()))?;
            }

            let parent_ri = resource.pi.clone();
            let removed = self.storage.delete(&resource.ri).await?;
            self.events.deleted(&removed);

            if let Some(pi) = parent_ri {
                match self.storage.retrieve_by_id(&pi).await {
                    Ok(mut parent) => {
                        self.behavior(parent.ty).child_removed(self, &mut parent, &removed, originator).await?;
                        self.storage.update(&parent).await?;
                    }
                    Err(DispatchError::NotFound(_)) => debug!(%pi, "Parent already removed"),
                    Err(err) => return Err(err),
                }
            }
            info!(ri = %removed.ri, ty = %removed.ty, "Deleted");
            Ok(removed)
        })
    }
}
