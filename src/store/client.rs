use crate::error::Outcome;
use crate::model::{Resource, ResourceType};
use crate::services::Storage;
use crate::store::{Reply, StorageRequest, StoreError};
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

/// Handle to a running [`StorageActor`](crate::store::StorageActor).
///
/// Cheap to clone; every clone talks to the same actor. The actor stops once
/// the last client is dropped.
#[derive(Clone)]
pub struct StorageClient {
    sender: mpsc::Sender<StorageRequest>,
}

impl StorageClient {
    pub fn new(sender: mpsc::Sender<StorageRequest>) -> Self {
        Self { sender }
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> StorageRequest) -> Result<T, StoreError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(build(respond_to))
            .await
            .map_err(|_| StoreError::ActorClosed)?;
        response.await.map_err(|_| StoreError::ActorDropped)?
    }
}

#[async_trait]
impl Storage for StorageClient {
    async fn retrieve_by_id(&self, ri: &str) -> Outcome<Resource> {
        let ri = ri.to_string();
        Ok(self.request(|respond_to| StorageRequest::RetrieveById { ri, respond_to }).await?)
    }

    async fn retrieve_by_path(&self, srn: &str) -> Outcome<Resource> {
        let srn = srn.to_string();
        Ok(self.request(|respond_to| StorageRequest::RetrieveByPath { srn, respond_to }).await?)
    }

    async fn create(&self, resource: &Resource) -> Outcome<()> {
        let resource = Box::new(resource.clone());
        Ok(self.request(|respond_to| StorageRequest::Create { resource, respond_to }).await?)
    }

    async fn update(&self, resource: &Resource) -> Outcome<Resource> {
        let resource = Box::new(resource.clone());
        Ok(self.request(|respond_to| StorageRequest::Update { resource, respond_to }).await?)
    }

    async fn delete(&self, ri: &str) -> Outcome<Resource> {
        let ri = ri.to_string();
        Ok(self.request(|respond_to| StorageRequest::Delete { ri, respond_to }).await?)
    }

    async fn direct_children(&self, pi: &str, ty: Option<ResourceType>) -> Outcome<Vec<Resource>> {
        let pi = pi.to_string();
        Ok(self
            .request(|respond_to| StorageRequest::DirectChildren { pi, ty, respond_to })
            .await?)
    }

    async fn exists_by_id(&self, ri: &str) -> Outcome<bool> {
        let ri = ri.to_string();
        Ok(self.request(|respond_to| StorageRequest::ExistsById { ri, respond_to }).await?)
    }

    async fn exists_by_path(&self, srn: &str) -> Outcome<bool> {
        let srn = srn.to_string();
        Ok(self.request(|respond_to| StorageRequest::ExistsByPath { srn, respond_to }).await?)
    }
}
