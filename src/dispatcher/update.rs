use super::resolver::Target;
use super::{response, Dispatcher};
use crate::error::{DispatchError, Outcome};
use crate::model::{Permission, Request, ResponseStatusCode, ResultContent, Response};
use serde_json::json;
use tracing::{debug, instrument};

const UPDATE_RESULTS: [ResultContent; 3] = [
    ResultContent::Attributes,
    ResultContent::ModifiedAttributes,
    ResultContent::Nothing,
];

impl Dispatcher {
    #[instrument(skip(self, request), fields(to = %request.to, originator = %request.originator))]
    pub(super) async fn process_update_request(&self, request: &Request) -> Outcome<Response> {
        let target = self.resolve_target(request).await?;
        if let Some(response) = self.redirect_endpoint(request, &target).await? {
            return Ok(response);
        }

        let rcn = response::negotiate(request.args.rcn, &UPDATE_RESULTS, "UPDATE")?;
        if let Target::Remote(id) = &target {
            return Err(Self::remote_not_supported("UPDATE", id));
        }

        let resource = self.retrieve_local_resource(&target).await?;
        if resource.read_only {
            return Err(DispatchError::OperationNotAllowed(format!(
                "resource is read-only: {}",
                resource.ri
            )));
        }
        if !resource.ty.is_update_allowed() {
            return Err(DispatchError::OperationNotAllowed(format!(
                "UPDATE not allowed for <{}> resources",
                resource.short_tpe()
            )));
        }

        // Rewriting acpi has its own rule; everything else is a plain UPDATE check.
        if !self.security.has_acpi_update_permission(request, &resource).await? {
            self.check_access(&request.originator, &resource, Permission::Update).await?;
        }
        if resource.ty.is_virtual() {
            debug!(ri = %resource.ri, "Redirecting update to virtual resource");
            return self.handle_virtual(request, &resource).await;
        }

        let update = request.content_attributes(&resource.tpe).cloned().ok_or_else(|| {
            DispatchError::BadRequest(format!("content must contain a {} resource", resource.tpe))
        })?;
        let before = resource.to_attributes();
        let updated = self.update_local_resource(resource, &update, &request.originator).await?;
        self.registration.check_update(&updated, &update).await?;

        Ok(match rcn {
            ResultContent::Attributes => Response::with_resource(ResponseStatusCode::Updated, updated),
            ResultContent::ModifiedAttributes => {
                let diff = response::modified_attributes(&before, &updated.to_attributes(), &update, &updated.modified);
                Response::with_document(ResponseStatusCode::Updated, json!({ updated.tpe.clone(): diff }))
            }
            _ => Response::new(ResponseStatusCode::Updated),
        })
    }
}
