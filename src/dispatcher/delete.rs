use super::resolver::Target;
use super::{response, Dispatcher};
use crate::error::Outcome;
use crate::model::{Content, Permission, Request, RequestArgs, ResponseStatusCode, ResultContent, Response};
use serde_json::{json, Value};
use tracing::{debug, instrument};

const DELETE_RESULTS: [ResultContent; 6] = [
    ResultContent::Nothing,
    ResultContent::Attributes,
    ResultContent::AttributesAndChildResources,
    ResultContent::ChildResources,
    ResultContent::AttributesAndChildResourceReferences,
    ResultContent::ChildResourceReferences,
];

impl Dispatcher {
    #[instrument(skip(self, request), fields(to = %request.to, originator = %request.originator))]
    pub(super) async fn process_delete_request(&self, request: &Request) -> Outcome<Response> {
        let target = self.resolve_target(request).await?;
        if let Some(response) = self.redirect_endpoint(request, &target).await? {
            return Ok(response);
        }

        let rcn = response::negotiate(request.args.rcn, &DELETE_RESULTS, "DELETE")?;
        if let Target::Remote(id) = &target {
            return Err(Self::remote_not_supported("DELETE", id));
        }

        let resource = self.retrieve_local_resource(&target).await?;
        let originator = request.originator.as_str();
        self.check_access(originator, &resource, Permission::Delete).await?;
        if resource.ty.is_virtual() {
            debug!(ri = %resource.ri, "Redirecting delete to virtual resource");
            return self.handle_virtual(request, &resource).await;
        }

        // The payload describes the resource as it was before removal.
        let sort = self.config.sort_discovered_resources;
        let drt = request.args.drt;
        let content = match rcn {
            ResultContent::Nothing => None,
            ResultContent::Attributes => Some(Content::Resource(Box::new(resource.clone()))),
            _ => {
                // Filter conditions never narrow what gets deleted, so they do not narrow the echo either.
                let scope = RequestArgs { handling: request.args.handling.clone(), ..RequestArgs::default() };
                let children = self.discover_resources(&resource, originator, &scope, Permission::Delete).await?;
                let document = match rcn {
                    ResultContent::AttributesAndChildResources => {
                        let (tree, _) = response::resource_tree(children, None, sort);
                        response::attributes_with_children(&resource, tree)
                    }
                    ResultContent::ChildResources => {
                        let (tree, _) = response::resource_tree(children, None, sort);
                        json!({ resource.tpe.clone(): Value::Object(tree) })
                    }
                    ResultContent::AttributesAndChildResourceReferences => {
                        response::attributes_with_references(&resource, response::references(&children, drt, sort))
                    }
                    _ => json!({ resource.tpe.clone(): response::reference_list(&children, drt, sort) }),
                };
                Some(Content::Document(document))
            }
        };

        self.delete_local_resource(&resource, originator, true).await?;
        Ok(Response { status: ResponseStatusCode::Deleted, content })
    }
}
