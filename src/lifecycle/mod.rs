//! Node lifecycle and observability.
//!
//! - [`CseNode`] - spawns storage, bootstraps the `<CSEBase>`, wires the dispatcher, shuts down
//! - [`setup_tracing`] - initializes the tracing/logging infrastructure

pub mod node;
pub mod tracing;

pub use self::node::*;
pub use self::tracing::*;
