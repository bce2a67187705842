//! Storage collaborator interface.

use crate::error::Outcome;
use crate::model::{Resource, ResourceType};
use async_trait::async_trait;

/// Persistent resource storage.
///
/// Implementations serialise operations on the same resource and are the final
/// arbiter of identifier and path uniqueness: `create` fails with
/// [`DispatchError::Conflict`](crate::error::DispatchError::Conflict) on a duplicate
/// even if the dispatcher's advisory check passed.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn retrieve_by_id(&self, ri: &str) -> Outcome<Resource>;

    async fn retrieve_by_path(&self, srn: &str) -> Outcome<Resource>;

    async fn create(&self, resource: &Resource) -> Outcome<()>;

    /// Replaces the stored snapshot, returning what was persisted.
    async fn update(&self, resource: &Resource) -> Outcome<Resource>;

    /// Removes a resource, returning its prior snapshot.
    async fn delete(&self, ri: &str) -> Outcome<Resource>;

    /// Direct children of `pi` in storage order, optionally of one type only.
    async fn direct_children(&self, pi: &str, ty: Option<ResourceType>) -> Outcome<Vec<Resource>>;

    async fn count_direct_children(&self, pi: &str, ty: Option<ResourceType>) -> Outcome<usize> {
        Ok(self.direct_children(pi, ty).await?.len())
    }

    async fn exists_by_id(&self, ri: &str) -> Outcome<bool>;

    async fn exists_by_path(&self, srn: &str) -> Outcome<bool>;
}
