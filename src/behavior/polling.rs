use super::{create_virtual_child, ResourceBehavior};
use crate::dispatcher::Dispatcher;
use crate::error::{DispatchError, Outcome};
use crate::model::{Request, Resource, ResourceType, Response, ResponseStatusCode};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::sync::Notify;
use tokio::time::{timeout_at, Instant};
use tracing::debug;

/// `<pollingChannel>`: registers its `pcu` endpoint on activation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PollingChannelBehavior;

#[async_trait]
impl ResourceBehavior for PollingChannelBehavior {
    async fn activate(
        &self,
        dispatcher: &Dispatcher,
        resource: &mut Resource,
        _parent: &Resource,
        originator: &str,
    ) -> Outcome<()> {
        let pcu = create_virtual_child(dispatcher, resource, ResourceType::PollingChannelUri, "pcu", originator).await?;
        resource.attributes.insert("pcuRI".into(), Value::from(pcu.ri));
        Ok(())
    }
}

/// `<pollingChannelURI>`: queues NOTIFY requests until the owner long-polls them.
///
/// Queues are keyed by the endpoint's resource id. A RETRIEVE returns the oldest
/// queued request, waiting up to the configured polling timeout for one to arrive.
#[derive(Debug, Default)]
pub struct PollingChannelUriBehavior {
    queues: Mutex<HashMap<String, VecDeque<Value>>>,
    arrived: Notify,
}

impl PollingChannelUriBehavior {
    fn pop(&self, ri: &str) -> Outcome<Option<Value>> {
        let mut queues = self
            .queues
            .lock()
            .map_err(|_| DispatchError::Internal("polling channel queue poisoned".to_string()))?;
        Ok(queues.get_mut(ri).and_then(VecDeque::pop_front))
    }

    fn push(&self, ri: &str, request: Value) -> Outcome<usize> {
        let mut queues = self
            .queues
            .lock()
            .map_err(|_| DispatchError::Internal("polling channel queue poisoned".to_string()))?;
        let queue = queues.entry(ri.to_string()).or_default();
        queue.push_back(request);
        Ok(queue.len())
    }
}

#[async_trait]
impl ResourceBehavior for PollingChannelUriBehavior {
    async fn deactivate(&self, _dispatcher: &Dispatcher, resource: &Resource, _originator: &str) -> Outcome<()> {
        let mut queues = self
            .queues
            .lock()
            .map_err(|_| DispatchError::Internal("polling channel queue poisoned".to_string()))?;
        queues.remove(&resource.ri);
        Ok(())
    }

    async fn handle_retrieve(&self, dispatcher: &Dispatcher, _request: &Request, resource: &Resource) -> Outcome<Response> {
        let deadline = Instant::now() + dispatcher.config().polling_channel_timeout();
        loop {
            // Register interest before checking, so a NOTIFY in between is not missed.
            let arrived = self.arrived.notified();
            tokio::pin!(arrived);
            arrived.as_mut().enable();

            if let Some(queued) = self.pop(&resource.ri)? {
                return Ok(Response::with_document(ResponseStatusCode::Ok, queued));
            }
            if timeout_at(deadline, arrived).await.is_err() {
                debug!(pcu = %resource.ri, "Polling request timed out");
                return Err(DispatchError::RequestTimeout(format!(
                    "no request arrived at <pollingChannelURI>: {}",
                    resource.ri
                )));
            }
        }
    }

    async fn handle_notify(&self, _dispatcher: &Dispatcher, request: &Request, resource: &Resource) -> Outcome<Response> {
        let queued = json!({
            "m2m:rqp": {
                "op": 5,
                "fr": request.originator,
                "to": request.to,
                "pc": request.content.clone().unwrap_or(Value::Null),
            }
        });
        let depth = self.push(&resource.ri, queued)?;
        debug!(pcu = %resource.ri, depth, "Queued notification");
        self.arrived.notify_waiters();
        Ok(Response::new(ResponseStatusCode::Ok))
    }
}
