use super::{create_virtual_child, ResourceBehavior};
use crate::dispatcher::Dispatcher;
use crate::error::{DispatchError, Outcome};
use crate::model::{Resource, ResourceType};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

/// Instance-bearing containers (`<container>`, `<timeSeries>`).
///
/// On activation the container registers its `<latest>` and `<oldest>` virtual
/// children. Afterwards it keeps `cni` (current number of instances) and `cbs`
/// (current byte size) in step with its instances, and prunes the oldest
/// instances whenever `mni` or `mbs` would be exceeded.
#[derive(Debug, Clone, Copy)]
pub struct ContainerBehavior {
    instance: ResourceType,
    latest: ResourceType,
    oldest: ResourceType,
}

impl ContainerBehavior {
    pub const fn new(instance: ResourceType, latest: ResourceType, oldest: ResourceType) -> Self {
        Self { instance, latest, oldest }
    }

    /// Instances in creation order.
    async fn instances(&self, dispatcher: &Dispatcher, container: &Resource) -> Outcome<Vec<Resource>> {
        let mut instances = dispatcher.direct_child_resources(&container.ri, Some(self.instance)).await?;
        instances.sort_by_key(|instance| instance.ct);
        Ok(instances)
    }

    /// Deletes the oldest instances until `mni` and `mbs` hold again. `keep` is
    /// never pruned.
    async fn enforce_limits(
        &self,
        dispatcher: &Dispatcher,
        container: &Resource,
        keep: Option<&str>,
        originator: &str,
    ) -> Outcome<()> {
        let mni = limit(container, "mni");
        let mbs = limit(container, "mbs");
        if mni.is_none() && mbs.is_none() {
            return Ok(());
        }
        let instances = self.instances(dispatcher, container).await?;
        let mut count = instances.len() as u64;
        let mut size: u64 = instances.iter().filter_map(|instance| instance.cs).sum();
        for oldest in &instances {
            let too_many = mni.is_some_and(|mni| count > mni);
            let too_big = mbs.is_some_and(|mbs| size > mbs);
            if !too_many && !too_big {
                break;
            }
            if keep == Some(oldest.ri.as_str()) {
                continue;
            }
            debug!(container = %container.ri, instance = %oldest.ri, "Pruning oldest instance");
            dispatcher.delete_local_resource(oldest, originator, false).await?;
            count -= 1;
            size = size.saturating_sub(oldest.cs.unwrap_or(0));
        }
        Ok(())
    }

    async fn refresh_statistics(&self, dispatcher: &Dispatcher, container: &mut Resource) -> Outcome<()> {
        let instances = dispatcher.direct_child_resources(&container.ri, Some(self.instance)).await?;
        let cbs: u64 = instances.iter().filter_map(|instance| instance.cs).sum();
        container.attributes.insert("cni".into(), Value::from(instances.len()));
        container.attributes.insert("cbs".into(), Value::from(cbs));
        Ok(())
    }
}

fn limit(container: &Resource, name: &str) -> Option<u64> {
    container.attributes.get(name).and_then(Value::as_u64)
}

#[async_trait]
impl ResourceBehavior for ContainerBehavior {
    async fn activate(
        &self,
        dispatcher: &Dispatcher,
        resource: &mut Resource,
        _parent: &Resource,
        originator: &str,
    ) -> Outcome<()> {
        create_virtual_child(dispatcher, resource, self.latest, "la", originator).await?;
        create_virtual_child(dispatcher, resource, self.oldest, "ol", originator).await?;
        Ok(())
    }

    async fn child_will_be_added(
        &self,
        _dispatcher: &Dispatcher,
        parent: &Resource,
        child: &Resource,
        _originator: &str,
    ) -> Outcome<()> {
        if child.ty != self.instance {
            return Ok(());
        }
        if limit(parent, "mni") == Some(0) {
            return Err(DispatchError::BadRequest("container accepts no instances (mni: 0)".to_string()));
        }
        if let (Some(mbs), Some(cs)) = (limit(parent, "mbs"), child.cs) {
            if cs > mbs {
                return Err(DispatchError::BadRequest(format!("instance size {cs} exceeds mbs: {mbs}")));
            }
        }
        Ok(())
    }

    async fn update(
        &self,
        dispatcher: &Dispatcher,
        resource: &mut Resource,
        update: &Map<String, Value>,
        originator: &str,
    ) -> Outcome<()> {
        for name in ["cni", "cbs"] {
            if update.contains_key(name) {
                return Err(DispatchError::BadRequest(format!("attribute is not updatable: {name}")));
            }
        }
        resource.apply_update(update).map_err(DispatchError::BadRequest)?;
        if update.contains_key("mni") || update.contains_key("mbs") {
            self.enforce_limits(dispatcher, resource, None, originator).await?;
            self.refresh_statistics(dispatcher, resource).await?;
        }
        resource.st = Some(resource.st.unwrap_or(0) + 1);
        resource.modified.push("st".to_string());
        Ok(())
    }

    async fn child_added(
        &self,
        dispatcher: &Dispatcher,
        parent: &mut Resource,
        child: &Resource,
        originator: &str,
    ) -> Outcome<()> {
        if child.ty != self.instance {
            return Ok(());
        }
        self.enforce_limits(dispatcher, parent, Some(&child.ri), originator).await?;
        self.refresh_statistics(dispatcher, parent).await?;
        parent.st = Some(parent.st.unwrap_or(0) + 1);
        Ok(())
    }

    async fn child_removed(
        &self,
        dispatcher: &Dispatcher,
        parent: &mut Resource,
        child: &Resource,
        _originator: &str,
    ) -> Outcome<()> {
        if child.ty == self.instance {
            self.refresh_statistics(dispatcher, parent).await?;
        }
        Ok(())
    }
}
