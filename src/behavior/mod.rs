//! # Per-Type Resource Behavior
//!
//! Every resource type gets a [`ResourceBehavior`]: the lifecycle hooks the
//! dispatcher calls around storage operations, plus optional handlers for the
//! operations a virtual resource answers itself.
//!
//! ## Provided Methods (Hooks)
//! All methods have defaults. A type only overrides what it cares about:
//! - lifecycle hooks default to "nothing to do" (`Ok(())`)
//! - [`ResourceBehavior::update`] defaults to [`Resource::apply_update`]
//! - the `handle_*` operation handlers default to `OperationNotAllowed`, so a
//!   virtual type that only supports RETRIEVE implements just `handle_retrieve`
//!
//! Hooks receive the [`Dispatcher`] so they can run internal operations,
//! e.g. a `<container>` creating its `<latest>` child on activation.

mod container;
mod group;
mod latest;
mod polling;

pub use container::ContainerBehavior;
pub use group::{FanoutPointBehavior, GroupBehavior};
pub use latest::LatestOldestBehavior;
pub use polling::{PollingChannelBehavior, PollingChannelUriBehavior};

use crate::dispatcher::Dispatcher;
use crate::error::{DispatchError, Outcome};
use crate::model::{Request, Resource, ResourceType, Response};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[async_trait]
pub trait ResourceBehavior: Send + Sync {
    /// Whether `parent` accepts a child of type `ty`.
    fn can_have_child(&self, parent: &Resource, ty: ResourceType) -> bool {
        parent.ty.allowed_children().contains(&ty)
    }

    /// Veto point before a new child is validated and stored.
    async fn child_will_be_added(
        &self,
        _dispatcher: &Dispatcher,
        _parent: &Resource,
        _child: &Resource,
        _originator: &str,
    ) -> Outcome<()> {
        Ok(())
    }

    /// Called once the new resource is stored. Changes made to `resource` are persisted.
    async fn activate(
        &self,
        _dispatcher: &Dispatcher,
        _resource: &mut Resource,
        _parent: &Resource,
        _originator: &str,
    ) -> Outcome<()> {
        Ok(())
    }

    /// Called before the resource is removed, after its children are gone.
    async fn deactivate(&self, _dispatcher: &Dispatcher, _resource: &Resource, _originator: &str) -> Outcome<()> {
        Ok(())
    }

    /// Validates and applies an UPDATE payload.
    async fn update(
        &self,
        _dispatcher: &Dispatcher,
        resource: &mut Resource,
        update: &Map<String, Value>,
        _originator: &str,
    ) -> Outcome<()> {
        resource.apply_update(update).map_err(DispatchError::BadRequest)
    }

    /// Called on every resource about to be returned by a retrieval or discovery.
    async fn will_be_retrieved(&self, _dispatcher: &Dispatcher, _resource: &Resource, _originator: &str) -> Outcome<()> {
        Ok(())
    }

    /// A child was created. Changes made to `parent` are persisted.
    async fn child_added(
        &self,
        _dispatcher: &Dispatcher,
        _parent: &mut Resource,
        _child: &Resource,
        _originator: &str,
    ) -> Outcome<()> {
        Ok(())
    }

    /// A child was removed. Changes made to `parent` are persisted.
    async fn child_removed(
        &self,
        _dispatcher: &Dispatcher,
        _parent: &mut Resource,
        _child: &Resource,
        _originator: &str,
    ) -> Outcome<()> {
        Ok(())
    }

    // --- Virtual resource operations ---

    async fn handle_retrieve(&self, _dispatcher: &Dispatcher, _request: &Request, resource: &Resource) -> Outcome<Response> {
        Err(not_allowed("RETRIEVE", resource))
    }

    async fn handle_create(&self, _dispatcher: &Dispatcher, _request: &Request, resource: &Resource) -> Outcome<Response> {
        Err(not_allowed("CREATE", resource))
    }

    async fn handle_update(&self, _dispatcher: &Dispatcher, _request: &Request, resource: &Resource) -> Outcome<Response> {
        Err(not_allowed("UPDATE", resource))
    }

    async fn handle_delete(&self, _dispatcher: &Dispatcher, _request: &Request, resource: &Resource) -> Outcome<Response> {
        Err(not_allowed("DELETE", resource))
    }

    async fn handle_notify(&self, _dispatcher: &Dispatcher, _request: &Request, resource: &Resource) -> Outcome<Response> {
        Err(not_allowed("NOTIFY", resource))
    }
}

fn not_allowed(operation: &str, resource: &Resource) -> DispatchError {
    DispatchError::OperationNotAllowed(format!(
        "{operation} operation not allowed for <{}> resource type",
        resource.short_tpe()
    ))
}

/// Behavior of every type without special needs.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardBehavior;

impl ResourceBehavior for StandardBehavior {}

/// Type to behavior lookup. Unregistered types get [`StandardBehavior`].
#[derive(Clone)]
pub struct BehaviorRegistry {
    behaviors: HashMap<ResourceType, Arc<dyn ResourceBehavior>>,
    fallback: Arc<dyn ResourceBehavior>,
}

impl BehaviorRegistry {
    /// A registry where every type uses [`StandardBehavior`].
    pub fn empty() -> Self {
        Self {
            behaviors: HashMap::new(),
            fallback: Arc::new(StandardBehavior),
        }
    }

    /// The built-in behaviors for containers, time series, groups and polling channels.
    pub fn standard() -> Self {
        use ResourceType::*;
        let mut registry = Self::empty();
        registry
            .register(Container, ContainerBehavior::new(ContentInstance, ContainerLatest, ContainerOldest))
            .register(TimeSeries, ContainerBehavior::new(TimeSeriesInstance, TimeSeriesLatest, TimeSeriesOldest))
            .register(ContainerLatest, LatestOldestBehavior::latest(ContentInstance))
            .register(ContainerOldest, LatestOldestBehavior::oldest(ContentInstance))
            .register(FlexContainerLatest, LatestOldestBehavior::latest(FlexContainerInstance))
            .register(FlexContainerOldest, LatestOldestBehavior::oldest(FlexContainerInstance))
            .register(TimeSeriesLatest, LatestOldestBehavior::latest(TimeSeriesInstance))
            .register(TimeSeriesOldest, LatestOldestBehavior::oldest(TimeSeriesInstance))
            .register(Group, GroupBehavior)
            .register(GroupFanoutPoint, FanoutPointBehavior)
            .register(PollingChannel, PollingChannelBehavior)
            .register(PollingChannelUri, PollingChannelUriBehavior::default());
        registry
    }

    pub fn register(&mut self, ty: ResourceType, behavior: impl ResourceBehavior + 'static) -> &mut Self {
        self.behaviors.insert(ty, Arc::new(behavior));
        self
    }

    pub fn get(&self, ty: ResourceType) -> Arc<dyn ResourceBehavior> {
        self.behaviors.get(&ty).unwrap_or(&self.fallback).clone()
    }
}

impl Default for BehaviorRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Creates a read-only virtual child (`la`, `ol`, `fopt`, `pcu`) below `parent`.
async fn create_virtual_child(
    dispatcher: &Dispatcher,
    parent: &Resource,
    ty: ResourceType,
    rn: &str,
    originator: &str,
) -> Outcome<Resource> {
    debug!(parent = %parent.ri, %ty, "Registering virtual child");
    let payload = json!({ ty.tpe(): { "rn": rn } });
    let mut child = dispatcher.factory().from_payload(&payload, &parent.ri, ty)?;
    child.read_only = true;
    child.acpi = parent.acpi.clone();
    dispatcher.create_local_resource(child, parent, originator).await
}
