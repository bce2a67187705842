use super::resolver::Target;
use super::Dispatcher;
use crate::error::{DispatchError, Outcome};
use crate::model::{Permission, Request, ResourceType, Response};
use tracing::{debug, instrument};

impl Dispatcher {
    /// NOTIFY to a polling-channel endpoint is queued for its owner before
    /// this point. NOTIFY to an application entity or a node is delivered
    /// through the remote proxy.
    #[instrument(skip(self, request), fields(to = %request.to, originator = %request.originator))]
    pub(super) async fn process_notify_request(&self, request: &Request) -> Outcome<Response> {
        let target = self.resolve_target(request).await?;
        if let Some(response) = self.redirect_endpoint(request, &target).await? {
            return Ok(response);
        }
        if let Target::Remote(id) = &target {
            return Err(Self::remote_not_supported("NOTIFY", id));
        }

        let resource = self.retrieve_local_resource(&target).await?;
        match resource.ty {
            ResourceType::Ae | ResourceType::RemoteCse | ResourceType::CseBase => {
                self.check_access(&request.originator, &resource, Permission::Notify).await?;
                debug!(target = %resource.ri, "Delivering notification");
                self.remote.deliver_notification(&resource, request).await
            }
            _ => Err(DispatchError::BadRequest(format!(
                "NOTIFY not supported for <{}> resources",
                resource.short_tpe()
            ))),
        }
    }
}
