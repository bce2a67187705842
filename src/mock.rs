//! # Test Doubles
//!
//! Collaborators for exercising the dispatcher without a policy engine or a
//! second node.
//!
//! - [`ScriptedSecurity`] grants everything except the denials it is given.
//! - [`MockRemote`] answers remote calls from an expectation queue:
//!
//! ```ignore
//! let remote = MockRemote::new();
//! remote.expect_retrieve("/id-mn/cnt7").return_ok(resource);
//! remote.expect_notify("CLight").return_err(DispatchError::TargetNotReachable("offline".into()));
//!
//! let node = CseNode::start_with(config, |c| c.with_remote(Arc::new(remote.clone())), behaviors).await?;
//! // drive requests...
//! remote.verify(); // all expectations were consumed
//! ```

use crate::error::Outcome;
use crate::model::{Permission, Request, Resource, Response};
use crate::services::{RemoteProxy, Security};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

// =============================================================================
// SCRIPTED SECURITY
// =============================================================================

/// Grants every permission except the configured `(originator, permission)` pairs.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSecurity {
    denied: HashSet<(String, Permission)>,
    polling_denied: HashSet<String>,
}

impl ScriptedSecurity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deny(mut self, originator: &str, permission: Permission) -> Self {
        self.denied.insert((originator.to_string(), permission));
        self
    }

    /// Denies `originator` access to every polling channel endpoint.
    pub fn deny_polling(mut self, originator: &str) -> Self {
        self.polling_denied.insert(originator.to_string());
        self
    }
}

#[async_trait]
impl Security for ScriptedSecurity {
    async fn has_access(&self, originator: &str, _resource: &Resource, permission: Permission) -> bool {
        !self.denied.contains(&(originator.to_string(), permission))
    }

    async fn has_access_to_polling_channel(&self, originator: &str, _resource: &Resource) -> bool {
        !self.polling_denied.contains(originator)
    }
}

// =============================================================================
// EXPECTATION BUILDER API
// =============================================================================

enum Expectation {
    Retrieve { id: String, response: Outcome<Resource> },
    Notify { target: String, response: Outcome<Response> },
}

type Expectations = Arc<Mutex<VecDeque<Expectation>>>;

fn lock(expectations: &Expectations) -> MutexGuard<'_, VecDeque<Expectation>> {
    expectations.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A remote proxy that replays queued responses in order.
///
/// Panics on a call that does not match the next expectation.
#[derive(Clone, Default)]
pub struct MockRemote {
    expectations: Expectations,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expects a `retrieve` of the given SP-relative identifier.
    pub fn expect_retrieve(&self, id: &str) -> RetrieveExpectationBuilder {
        RetrieveExpectationBuilder {
            id: id.to_string(),
            expectations: self.expectations.clone(),
        }
    }

    /// Expects a notification delivery to the resource with the given id.
    pub fn expect_notify(&self, target: &str) -> NotifyExpectationBuilder {
        NotifyExpectationBuilder {
            target: target.to_string(),
            expectations: self.expectations.clone(),
        }
    }

    /// Verifies that all expectations were met.
    pub fn verify(&self) {
        let remaining = lock(&self.expectations).len();
        if remaining > 0 {
            panic!("Not all expectations were met. {remaining} remaining");
        }
    }
}

#[async_trait]
impl RemoteProxy for MockRemote {
    async fn retrieve(&self, id: &str, _originator: &str) -> Outcome<Resource> {
        let next = lock(&self.expectations).pop_front();
        match next {
            Some(Expectation::Retrieve { id: expected, response }) if expected == id => response,
            _ => panic!("Unexpected remote retrieve of {id}"),
        }
    }

    async fn deliver_notification(&self, target: &Resource, _request: &Request) -> Outcome<Response> {
        let next = lock(&self.expectations).pop_front();
        match next {
            Some(Expectation::Notify { target: expected, response }) if expected == target.ri => response,
            _ => panic!("Unexpected notification to {}", target.ri),
        }
    }
}

/// Builder for `retrieve` expectations.
pub struct RetrieveExpectationBuilder {
    id: String,
    expectations: Expectations,
}

impl RetrieveExpectationBuilder {
    pub fn return_ok(self, resource: Resource) {
        lock(&self.expectations).push_back(Expectation::Retrieve { id: self.id, response: Ok(resource) });
    }

    pub fn return_err(self, error: crate::error::DispatchError) {
        lock(&self.expectations).push_back(Expectation::Retrieve { id: self.id, response: Err(error) });
    }
}

/// Builder for notification expectations.
pub struct NotifyExpectationBuilder {
    target: String,
    expectations: Expectations,
}

impl NotifyExpectationBuilder {
    pub fn return_ok(self, response: Response) {
        lock(&self.expectations).push_back(Expectation::Notify { target: self.target, response: Ok(response) });
    }

    pub fn return_err(self, error: crate::error::DispatchError) {
        lock(&self.expectations).push_back(Expectation::Notify { target: self.target, response: Err(error) });
    }
}
