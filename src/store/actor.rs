use crate::model::{Resource, ResourceType};
use crate::store::{StorageClient, StorageRequest, StoreError};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// The in-memory resource store.
///
/// # Architecture Note
/// This struct is the "Server" half of the storage actor. It owns the resource
/// map, the structured-path index and the per-parent child order, and is the
/// only place they are touched. All requests are processed sequentially in
/// [`StorageActor::run`], so no lock guards the maps and the identifier/path
/// uniqueness checks cannot race with each other.
pub struct StorageActor {
    receiver: mpsc::Receiver<StorageRequest>,
    resources: HashMap<String, Resource>,
    /// Structured path to resource id.
    paths: HashMap<String, String>,
    /// Parent id to child ids, in insertion order.
    children: HashMap<String, Vec<String>>,
}

impl StorageActor {
    pub fn new(buffer_size: usize) -> (Self, StorageClient) {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        let actor = Self {
            receiver,
            resources: HashMap::new(),
            paths: HashMap::new(),
            children: HashMap::new(),
        };
        (actor, StorageClient::new(sender))
    }

    /// Runs the actor's event loop until every client has been dropped.
    pub async fn run(mut self) {
        info!("Storage actor started");

        while let Some(msg) = self.receiver.recv().await {
            match msg {
                StorageRequest::RetrieveById { ri, respond_to } => {
                    let found = self.resources.get(&ri).cloned();
                    debug!(%ri, found = found.is_some(), "Retrieve");
                    let _ = respond_to.send(found.ok_or(StoreError::NotFound(ri)));
                }
                StorageRequest::RetrieveByPath { srn, respond_to } => {
                    let found = self.paths.get(&srn).and_then(|ri| self.resources.get(ri)).cloned();
                    debug!(%srn, found = found.is_some(), "Retrieve by path");
                    let _ = respond_to.send(found.ok_or(StoreError::NotFound(srn)));
                }
                StorageRequest::Create { resource, respond_to } => {
                    let _ = respond_to.send(self.create(*resource));
                }
                StorageRequest::Update { resource, respond_to } => {
                    let _ = respond_to.send(self.update(*resource));
                }
                StorageRequest::Delete { ri, respond_to } => {
                    let _ = respond_to.send(self.delete(&ri));
                }
                StorageRequest::DirectChildren { pi, ty, respond_to } => {
                    let _ = respond_to.send(Ok(self.direct_children(&pi, ty)));
                }
                StorageRequest::ExistsById { ri, respond_to } => {
                    let _ = respond_to.send(Ok(self.resources.contains_key(&ri)));
                }
                StorageRequest::ExistsByPath { srn, respond_to } => {
                    let _ = respond_to.send(Ok(self.paths.contains_key(&srn)));
                }
            }
        }

        info!(size = self.resources.len(), "Storage actor shutdown");
    }

    fn create(&mut self, resource: Resource) -> Result<(), StoreError> {
        let ri = resource.ri.clone();
        if self.resources.contains_key(&ri) {
            warn!(%ri, "Duplicate resource id");
            return Err(StoreError::AlreadyExists(ri));
        }
        if let Some(srn) = &resource.srn {
            if self.paths.contains_key(srn) {
                warn!(%ri, %srn, "Duplicate structured path");
                return Err(StoreError::AlreadyExists(srn.clone()));
            }
            self.paths.insert(srn.clone(), ri.clone());
        }
        if let Some(pi) = &resource.pi {
            self.children.entry(pi.clone()).or_default().push(ri.clone());
        }
        let ty = resource.ty;
        self.resources.insert(ri.clone(), resource);
        info!(%ri, %ty, size = self.resources.len(), "Created");
        Ok(())
    }

    fn update(&mut self, resource: Resource) -> Result<Resource, StoreError> {
        let ri = resource.ri.clone();
        let Some(previous) = self.resources.get(&ri) else {
            warn!(%ri, "Not found");
            return Err(StoreError::NotFound(ri));
        };
        if previous.srn != resource.srn {
            if let Some(old) = &previous.srn {
                self.paths.remove(old);
            }
            if let Some(new) = &resource.srn {
                self.paths.insert(new.clone(), ri.clone());
            }
        }
        self.resources.insert(ri.clone(), resource.clone());
        debug!(%ri, "Updated");
        Ok(resource)
    }

    fn delete(&mut self, ri: &str) -> Result<Resource, StoreError> {
        let Some(removed) = self.resources.remove(ri) else {
            warn!(%ri, "Not found");
            return Err(StoreError::NotFound(ri.to_string()));
        };
        if let Some(srn) = &removed.srn {
            self.paths.remove(srn);
        }
        if let Some(siblings) = removed.pi.as_ref().and_then(|pi| self.children.get_mut(pi)) {
            siblings.retain(|child| child != ri);
        }
        self.children.remove(ri);
        info!(%ri, size = self.resources.len(), "Deleted");
        Ok(removed)
    }

    fn direct_children(&self, pi: &str, ty: Option<ResourceType>) -> Vec<Resource> {
        self.children
            .get(pi)
            .into_iter()
            .flatten()
            .filter_map(|ri| self.resources.get(ri))
            .filter(|child| ty.map_or(true, |ty| child.ty == ty))
            .cloned()
            .collect()
    }
}
