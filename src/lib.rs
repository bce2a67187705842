//! # CSE Request Dispatcher
//!
//! > **The request-processing core of a oneM2M Common Services Entity.**
//!
//! Every inbound operation (CREATE, RETRIEVE, UPDATE, DELETE, NOTIFY) against
//! the hierarchical resource tree passes through the [`Dispatcher`](dispatcher::Dispatcher).
//! It resolves the target identifier, enforces timing and access, delegates
//! type-specific behavior, persists through the storage collaborator and
//! shapes the response the client negotiated.
//!
//! ## 🏗️ Design Philosophy
//!
//! ### Injected Collaborators
//! The dispatcher never reaches for global state. Storage, security,
//! registration, the payload factory, the event bus and the remote proxy are
//! traits in [`services`], handed over once at construction. Tests swap any of
//! them (see [`mock`]).
//!
//! ### Typed Outcomes
//! Every operation returns [`Outcome<Response>`](error::Outcome). Expected
//! protocol conditions (not found, no privilege, conflict, ...) are
//! [`DispatchError`](error::DispatchError) variants with a stable status code
//! and a diagnostic. A failure can never carry a payload.
//!
//! ### Behavior per Type
//! What makes a `<container>` different from a `<group>` lives in a
//! [`ResourceBehavior`](behavior::ResourceBehavior): lifecycle hooks around
//! storage operations plus optional handlers for virtual resources. Handlers a
//! type does not provide answer `OperationNotAllowed`.
//!
//! ## 👩‍💻 Architecture Notes
//!
//! ### 1. Storage is an Actor
//! The default store ([`store`]) is a Tokio task owning the resource tree. All
//! mutations are serialised through its channel, which makes identifier and
//! path uniqueness race-free without locks.
//!
//! ### 2. Concurrency Model
//! The dispatcher is `Send + Sync` and shared behind an `Arc`. Operations run
//! concurrently; the only deliberate suspension is the wait for a request's
//! scheduled execution time, which holds no lock.
//!
//! ### 3. Observability
//! Every operation runs in a `tracing` span carrying its target and
//! originator. See the [`lifecycle::tracing`] module for details.
//!
//! ## 🗺️ Module Tour
//!
//! - [`model`] - resources, requests, responses
//! - [`dispatcher`] - the orchestrators, identifier resolution, discovery, filtering, response shaping
//! - [`behavior`] - per-type hooks and virtual resources (`la`, `ol`, `fopt`, `pcu`)
//! - [`services`] - collaborator traits and their default implementations
//! - [`store`] - the in-memory storage actor
//! - [`lifecycle`] - [`CseNode`](lifecycle::CseNode) wiring and tracing setup
//! - [`config`] - node configuration
//!
//! ## 🚀 Quick Start
//!
//! ```bash
//! # Run the demo with info logs
//! RUST_LOG=info cargo run
//!
//! # With a configuration file
//! CSE_CONFIG=cse.toml RUST_LOG=debug cargo run
//! ```

pub mod behavior;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod lifecycle;
pub mod mock;
pub mod model;
pub mod services;
pub mod store;
