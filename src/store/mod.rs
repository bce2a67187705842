//! # In-Memory Storage Actor
//!
//! The node's default [`Storage`](crate::services::Storage) implementation.
//!
//! - [`StorageActor`] owns the resource tree and processes [`StorageRequest`]s one at a time.
//! - [`StorageClient`] is the cloneable handle the dispatcher talks to.
//! - [`StoreError`] covers channel failures and uniqueness violations; it converts
//!   into [`DispatchError`](crate::error::DispatchError) at the trait boundary.

mod actor;
mod client;
mod error;
mod message;

pub use actor::StorageActor;
pub use client::StorageClient;
pub use error::StoreError;
pub use message::{Reply, StorageRequest};
