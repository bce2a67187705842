use super::resolver::Target;
use super::{response, Dispatcher};
use crate::error::{DispatchError, Outcome};
use crate::model::{FilterUsage, Permission, Request, Resource, ResponseStatusCode, ResultContent, Response};
use serde_json::{json, Value};
use tracing::{debug, instrument};

const DISCOVERY_RESULTS: [ResultContent; 2] = [
    ResultContent::DiscoveryResultReferences,
    ResultContent::ChildResourceReferences,
];

const RETRIEVE_RESULTS: [ResultContent; 6] = [
    ResultContent::Attributes,
    ResultContent::AttributesAndChildResources,
    ResultContent::ChildResources,
    ResultContent::AttributesAndChildResourceReferences,
    ResultContent::OriginalResource,
    ResultContent::ChildResourceReferences,
];

impl Dispatcher {
    #[instrument(skip(self, request), fields(to = %request.to, originator = %request.originator))]
    pub(super) async fn process_retrieve_request(&self, request: &Request) -> Outcome<Response> {
        let target = self.resolve_target(request).await?;
        if let Some(response) = self.redirect_endpoint(request, &target).await? {
            return Ok(response);
        }

        let discovery = request.args.fu == FilterUsage::Discovery;
        let (allowed, permission): (&[ResultContent], _) = if discovery {
            (&DISCOVERY_RESULTS[..], Permission::Discovery)
        } else {
            (&RETRIEVE_RESULTS[..], Permission::Retrieve)
        };
        let rcn = response::negotiate(request.args.rcn, allowed, "RETRIEVE")?;

        if let Target::Remote(id) = &target {
            debug!(%id, "Retrieving from remote node");
            let resource = self.remote.retrieve(id, &request.originator).await?;
            return Ok(Response::with_resource(ResponseStatusCode::Ok, resource));
        }
        let resource = self.retrieve_local_resource(&target).await?;
        let originator = request.originator.as_str();

        // Reference-only results need the root to exist, not to be readable.
        let references_only = matches!(
            rcn,
            ResultContent::ChildResourceReferences | ResultContent::DiscoveryResultReferences
        );
        if !references_only {
            self.check_access(originator, &resource, permission).await?;
            if resource.ty.is_virtual() {
                debug!(ri = %resource.ri, "Redirecting to virtual resource");
                return self.handle_virtual(request, &resource).await;
            }
        }

        match rcn {
            ResultContent::Attributes => {
                self.behavior(resource.ty).will_be_retrieved(self, &resource, originator).await?;
                return Ok(Response::with_resource(ResponseStatusCode::Ok, resource));
            }
            ResultContent::OriginalResource => {
                let original = self.retrieve_original(&resource, originator).await?;
                return Ok(Response::with_resource(ResponseStatusCode::Ok, original));
            }
            _ => {}
        }

        let found = self.discover_resources(&resource, originator, &request.args, permission).await?;
        let found = self.retrievable(found, originator).await;
        let sort = self.config.sort_discovered_resources;
        let drt = request.args.drt;

        let document = match rcn {
            ResultContent::AttributesAndChildResources => {
                let (children, _) = response::resource_tree(found, Some(&resource.ri), sort);
                response::attributes_with_children(&resource, children)
            }
            ResultContent::ChildResources => {
                let (children, _) = response::resource_tree(found, None, sort);
                json!({ resource.tpe.clone(): Value::Object(children) })
            }
            ResultContent::AttributesAndChildResourceReferences => {
                response::attributes_with_references(&resource, response::references(&found, drt, sort))
            }
            ResultContent::ChildResourceReferences => response::reference_list(&found, drt, sort),
            ResultContent::DiscoveryResultReferences => response::uri_list(&found, drt, &self.config.cse_id),
            other => {
                return Err(DispatchError::Internal(format!("unhandled rcn: {}", other.code())));
            }
        };
        Ok(Response::with_document(ResponseStatusCode::Ok, document))
    }

    /// Follows `lnk` to the resource this one mirrors.
    async fn retrieve_original(&self, resource: &Resource, originator: &str) -> Outcome<Resource> {
        let lnk = resource.lnk.as_deref().ok_or_else(|| {
            DispatchError::BadRequest(format!("missing lnk attribute in target resource: {}", resource.ri))
        })?;
        debug!(%lnk, "Retrieving original resource");
        let original = self.retrieve_resource(lnk, originator).await?;
        self.check_access(originator, &original, Permission::Retrieve).await?;
        self.behavior(original.ty).will_be_retrieved(self, &original, originator).await?;
        Ok(original)
    }

    /// Drops every resource whose `will_be_retrieved` hook refuses.
    async fn retrievable(&self, found: Vec<Resource>, originator: &str) -> Vec<Resource> {
        let mut permitted = Vec::with_capacity(found.len());
        for resource in found {
            match self.behavior(resource.ty).will_be_retrieved(self, &resource, originator).await {
                Ok(()) => permitted.push(resource),
                Err(err) => debug!(ri = %resource.ri, %err, "Dropped from result"),
            }
        }
        permitted
    }
}
