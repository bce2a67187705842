use super::resolver::Target;
use super::{response, Dispatcher};
use crate::error::{DispatchError, Outcome};
use crate::model::{Request, Resource, ResourceType, ResponseStatusCode, ResultContent, Response};
use serde_json::{json, Map, Value};
use tracing::{debug, instrument, warn};

const CREATE_RESULTS: [ResultContent; 5] = [
    ResultContent::Attributes,
    ResultContent::ModifiedAttributes,
    ResultContent::HierarchicalAddress,
    ResultContent::HierarchicalAddressAttributes,
    ResultContent::Nothing,
];

impl Dispatcher {
    #[instrument(skip(self, request), fields(to = %request.to, originator = %request.originator))]
    pub(super) async fn process_create_request(&self, request: &Request) -> Outcome<Response> {
        let target = self.resolve_target(request).await?;
        if let Some(response) = self.redirect_endpoint(request, &target).await? {
            return Ok(response);
        }

        let rcn = response::negotiate(request.args.rcn, &CREATE_RESULTS, "CREATE")?;
        let ty = request
            .resource_type
            .ok_or_else(|| DispatchError::BadRequest("missing resource type".to_string()))?;
        if !ty.is_client_creatable() {
            return Err(DispatchError::OperationNotAllowed(format!(
                "resource type {ty} cannot be created by a client"
            )));
        }
        if let Target::Remote(id) = &target {
            return Err(Self::remote_not_supported("CREATE", id));
        }

        let parent = self.retrieve_local_resource(&target).await?;
        if !self.security.has_create_access(&request.originator, &parent, ty).await {
            warn!(originator = %request.originator, parent = %parent.ri, %ty, "Create denied");
            let msg = format!(
                "originator: {} has no CREATE privilege for: {}",
                request.originator, parent.ri
            );
            return Err(if ty == ResourceType::Ae {
                DispatchError::SecurityAssociationRequired(msg)
            } else {
                DispatchError::OriginatorHasNoPrivilege(msg)
            });
        }
        if parent.ty.is_virtual() {
            debug!(parent = %parent.ri, "Redirecting create to virtual resource");
            return self.handle_virtual(request, &parent).await;
        }

        let payload = request
            .content
            .as_ref()
            .ok_or_else(|| DispatchError::BadRequest("missing content".to_string()))?;
        let mut candidate = self.factory.from_payload(payload, &parent.ri, ty)?;
        self.behavior(parent.ty)
            .child_will_be_added(self, &parent, &candidate, &request.originator)
            .await?;
        let originator = self
            .registration
            .check_create(&mut candidate, &request.originator, &parent)
            .await?;

        let created = match self.admit(candidate.clone(), &parent, &originator).await {
            Ok(created) => created,
            Err(err) => {
                if let Err(rollback) = self.registration.check_delete(&candidate).await {
                    warn!(ri = %candidate.ri, %rollback, "Registration rollback failed");
                }
                return Err(err);
            }
        };

        Ok(match rcn {
            ResultContent::Attributes => Response::with_resource(ResponseStatusCode::Created, created),
            ResultContent::ModifiedAttributes => {
                let requested = request.content_attributes(&created.tpe).cloned().unwrap_or_default();
                let diff = response::modified_attributes(&requested, &created.to_attributes(), &requested, &[]);
                Response::with_document(ResponseStatusCode::Created, json!({ created.tpe.clone(): diff }))
            }
            ResultContent::HierarchicalAddress => Response::with_document(
                ResponseStatusCode::Created,
                json!({ "m2m:uri": created.structured_path() }),
            ),
            ResultContent::HierarchicalAddressAttributes => {
                let mut rce = Map::new();
                rce.insert(created.short_tpe().to_string(), Value::Object(created.to_attributes()));
                rce.insert("uri".to_string(), Value::from(created.structured_path()));
                Response::with_document(ResponseStatusCode::Created, json!({ "m2m:rce": rce }))
            }
            _ => Response::new(ResponseStatusCode::Created),
        })
    }

    /// Advisory uniqueness checks, then placement. Storage has the final word on conflicts.
    async fn admit(&self, candidate: Resource, parent: &Resource, originator: &str) -> Outcome<Resource> {
        if self.storage.exists_by_id(&candidate.ri).await? {
            return Err(DispatchError::Conflict(format!(
                "resource with this id already exists: {}",
                candidate.ri
            )));
        }
        let srn = format!("{}/{}", parent.structured_path(), candidate.rn);
        if self.storage.exists_by_path(&srn).await? {
            return Err(DispatchError::Conflict(format!("resource with this name already exists: {srn}")));
        }
        self.create_local_resource(candidate, parent, originator).await
    }
}
