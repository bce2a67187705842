//! Security collaborator interface.
//!
//! The access-control policy language itself lives behind this trait.

use crate::error::{DispatchError, Outcome};
use crate::model::{Permission, Request, Resource, ResourceType};
use async_trait::async_trait;

#[async_trait]
pub trait Security: Send + Sync {
    /// Whether `originator` holds `permission` on `resource`.
    async fn has_access(&self, originator: &str, resource: &Resource, permission: Permission) -> bool;

    /// CREATE check against the parent. Implementations may short-circuit
    /// type-specific rules, e.g. self-registration of application entities.
    async fn has_create_access(&self, originator: &str, parent: &Resource, _ty: ResourceType) -> bool {
        self.has_access(originator, parent, Permission::Create).await
    }

    /// Whether `originator` may retrieve from or notify a polling channel endpoint.
    async fn has_access_to_polling_channel(&self, originator: &str, resource: &Resource) -> bool;

    /// Whether `originator` may rewrite the access-control references of `resource` itself.
    async fn may_change_acpi(&self, originator: &str, resource: &Resource) -> bool {
        self.has_access(originator, resource, Permission::Update).await
    }

    /// Special-cased permission check for UPDATEs touching `acpi`.
    ///
    /// Returns `Ok(false)` when the request does not touch `acpi`, so the
    /// caller falls back to the generic UPDATE check. Returns `Ok(true)` when
    /// it does and the change is permitted.
    async fn has_acpi_update_permission(&self, request: &Request, resource: &Resource) -> Outcome<bool> {
        let touches_acpi = request
            .content_attributes(&resource.tpe)
            .is_some_and(|attrs| attrs.contains_key("acpi"));
        if !touches_acpi {
            return Ok(false);
        }
        if self.may_change_acpi(&request.originator, resource).await {
            Ok(true)
        } else {
            Err(DispatchError::OriginatorHasNoPrivilege(format!(
                "originator: {} may not update acpi of: {}",
                request.originator, resource.ri
            )))
        }
    }
}

/// Grants every request. The node default when no policy engine is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenSecurity;

#[async_trait]
impl Security for OpenSecurity {
    async fn has_access(&self, _originator: &str, _resource: &Resource, _permission: Permission) -> bool {
        true
    }

    async fn has_access_to_polling_channel(&self, _originator: &str, _resource: &Resource) -> bool {
        true
    }
}
