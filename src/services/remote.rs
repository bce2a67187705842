//! Remote-node proxy collaborator interface.

use crate::error::{DispatchError, Outcome};
use crate::model::{Request, Resource, Response};
use async_trait::async_trait;

/// Federated access to other nodes.
#[async_trait]
pub trait RemoteProxy: Send + Sync {
    /// Retrieves a resource by an SP-relative identifier that does not belong to this node.
    async fn retrieve(&self, id: &str, originator: &str) -> Outcome<Resource>;

    /// Forwards a NOTIFY to the notification target behind `target`
    /// (an application entity's point of access or a registered node).
    async fn deliver_notification(&self, target: &Resource, request: &Request) -> Outcome<Response>;
}

/// Proxy for a standalone node: nothing remote is reachable.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnreachableRemote;

#[async_trait]
impl RemoteProxy for UnreachableRemote {
    async fn retrieve(&self, id: &str, _originator: &str) -> Outcome<Resource> {
        Err(DispatchError::TargetNotReachable(format!("no route to: {id}")))
    }

    async fn deliver_notification(&self, target: &Resource, _request: &Request) -> Outcome<Response> {
        Err(DispatchError::TargetNotReachable(format!(
            "no notification route to: {}",
            target.ri
        )))
    }
}
