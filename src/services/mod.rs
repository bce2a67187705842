//! Collaborator interfaces the dispatcher is constructed with.
//!
//! - [`Storage`] - resource persistence (see [`crate::store`] for the in-memory actor)
//! - [`Security`] - access decisions
//! - [`Registration`] - structural validation at create/update/delete time
//! - [`Factory`] - payload deserialisation
//! - [`EventSink`] - change notifications
//! - [`RemoteProxy`] - other nodes

pub mod events;
pub mod factory;
pub mod registration;
pub mod remote;
pub mod security;
pub mod storage;

pub use events::{BroadcastEvents, EventKind, EventSink, ResourceEvent};
pub use factory::{Factory, StandardFactory};
pub use registration::{Registration, StandardRegistration};
pub use remote::{RemoteProxy, UnreachableRemote};
pub use security::{OpenSecurity, Security};
pub use storage::Storage;
