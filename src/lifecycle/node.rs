use crate::behavior::BehaviorRegistry;
use crate::config::DispatcherConfig;
use crate::dispatcher::{Collaborators, Dispatcher};
use crate::error::{DispatchError, Outcome};
use crate::model::{Resource, ResourceType};
use crate::services::{BroadcastEvents, ResourceEvent, Storage};
use crate::store::{StorageActor, StorageClient};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};

/// A running CSE: the storage actor, the event bus and the wired dispatcher.
///
/// `CseNode` is responsible for:
/// - **Lifecycle Management**: spawning the storage actor and stopping it again
/// - **Dependency Wiring**: handing storage, events and the other collaborators to the [`Dispatcher`]
/// - **Bootstrapping**: creating the `<CSEBase>` root every resource hangs below
///
/// # Example
///
/// ```ignore
/// let node = CseNode::start(DispatcherConfig::default()).await?;
///
/// let request = Request::create("cse-in", "CAdmin", ResourceType::Ae, payload);
/// let response = node.dispatcher.process_request(&request).await?;
///
/// node.shutdown().await?;
/// ```
pub struct CseNode {
    /// Entry point for all requests.
    pub dispatcher: Arc<Dispatcher>,

    /// The `<CSEBase>` as created at startup.
    pub cse_base: Resource,

    events: BroadcastEvents,
    storage: StorageClient,

    /// Storage actor task (used for graceful shutdown)
    handle: tokio::task::JoinHandle<()>,
}

impl CseNode {
    /// Starts a node with the default collaborators and behaviors.
    pub async fn start(config: DispatcherConfig) -> Outcome<Self> {
        Self::start_with(config, |collaborators| collaborators, BehaviorRegistry::standard()).await
    }

    /// Starts a node, letting the caller replace collaborators before wiring.
    ///
    /// Storage and events are always the node's own; `customize` receives them
    /// already filled in.
    pub async fn start_with(
        config: DispatcherConfig,
        customize: impl FnOnce(Collaborators) -> Collaborators,
        behaviors: BehaviorRegistry,
    ) -> Outcome<Self> {
        // 1. Spawn storage
        let (actor, storage) = StorageActor::new(config.storage_buffer);
        let handle = tokio::spawn(actor.run());

        // 2. Bootstrap the root
        let cse_base = Resource::new(ResourceType::CseBase, config.cse_id.clone(), config.cse_rn.clone(), None)
            .with_srn(config.cse_rn.clone())
            .with_attribute("csi", Value::from(format!("/{}", config.cse_id)));
        storage.create(&cse_base).await?;

        // 3. Wire the dispatcher
        let events = BroadcastEvents::new(config.event_capacity);
        let collaborators = customize(
            Collaborators::new(Arc::new(storage.clone())).with_events(Arc::new(events.clone())),
        );
        info!(cse_id = %config.cse_id, cse_rn = %config.cse_rn, "CSE started");
        let dispatcher = Arc::new(Dispatcher::new(config, collaborators, behaviors));

        Ok(Self { dispatcher, cse_base, events, storage, handle })
    }

    /// Subscribes to resource change events.
    pub fn subscribe(&self) -> broadcast::Receiver<ResourceEvent> {
        self.events.subscribe()
    }

    /// The node's storage, bypassing dispatch and resource behaviors.
    pub fn storage(&self) -> &StorageClient {
        &self.storage
    }

    /// Gracefully shuts the node down.
    ///
    /// Drops the dispatcher and the storage client, then waits for the storage
    /// actor to drain. Clones of the dispatcher held elsewhere keep the actor
    /// alive, so release them first.
    pub async fn shutdown(self) -> Outcome<()> {
        info!("Shutting down CSE...");
        drop(self.dispatcher);
        drop(self.storage);

        if let Err(e) = self.handle.await {
            error!("Storage actor failed: {:?}", e);
            return Err(DispatchError::Internal(format!("storage actor failed: {e}")));
        }
        info!("CSE shutdown complete.");
        Ok(())
    }
}
