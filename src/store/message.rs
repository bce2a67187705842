use crate::model::{Resource, ResourceType};
use crate::store::StoreError;
use tokio::sync::oneshot;

/// One-shot reply channel carried by every [`StorageRequest`].
pub type Reply<T> = oneshot::Sender<Result<T, StoreError>>;

/// Messages understood by the [`StorageActor`](crate::store::StorageActor).
///
/// Each variant maps one-to-one onto a [`Storage`](crate::services::Storage)
/// operation. Because the actor handles them one at a time, operations on the
/// same resource are serialised and the uniqueness checks in `Create` are atomic.
#[derive(Debug)]
pub enum StorageRequest {
    RetrieveById {
        ri: String,
        respond_to: Reply<Resource>,
    },
    RetrieveByPath {
        srn: String,
        respond_to: Reply<Resource>,
    },
    Create {
        resource: Box<Resource>,
        respond_to: Reply<()>,
    },
    Update {
        resource: Box<Resource>,
        respond_to: Reply<Resource>,
    },
    Delete {
        ri: String,
        respond_to: Reply<Resource>,
    },
    DirectChildren {
        pi: String,
        ty: Option<ResourceType>,
        respond_to: Reply<Vec<Resource>>,
    },
    ExistsById {
        ri: String,
        respond_to: Reply<bool>,
    },
    ExistsByPath {
        srn: String,
        respond_to: Reply<bool>,
    },
}
