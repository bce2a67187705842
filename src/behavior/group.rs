use super::{create_virtual_child, ResourceBehavior};
use crate::dispatcher::resolver::{self, Identifier};
use crate::dispatcher::Dispatcher;
use crate::error::{DispatchError, Outcome};
use crate::model::{Request, Resource, ResourceType, Response, ResponseStatusCode};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use tracing::debug;

/// How many `<fanOutPoint>`s a single request may pass through.
const MAX_FANOUT_DEPTH: usize = 8;

/// `<group>`: validates its member list and registers the `fopt` fan-out point.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupBehavior;

impl GroupBehavior {
    fn members(group: &Resource) -> Vec<String> {
        group
            .attributes
            .get("mid")
            .and_then(Value::as_array)
            .map(|mid| mid.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default()
    }

    fn check_members(group: &mut Resource) -> Outcome<()> {
        let members = Self::members(group);
        if let Some(mnm) = group.attributes.get("mnm").and_then(Value::as_u64) {
            if members.len() as u64 > mnm {
                return Err(DispatchError::BadRequest(format!(
                    "group has {} members, more than mnm: {mnm}",
                    members.len()
                )));
            }
        }
        group.attributes.insert("cnm".into(), Value::from(members.len()));
        Ok(())
    }

    /// Rejects members that address a fan-out point, and members through which
    /// the group would contain itself. Unknown and remote members are accepted.
    async fn check_references(dispatcher: &Dispatcher, group: &Resource, originator: &str) -> Outcome<()> {
        if let Some(member) = Self::members(group)
            .into_iter()
            .find(|member| member.split('/').any(|segment| segment == "fopt"))
        {
            return Err(DispatchError::BadRequest(format!(
                "group member must not be a fan-out point: {member}"
            )));
        }

        let config = dispatcher.config();
        let mut visited = HashSet::new();
        let mut pending = vec![group.clone()];
        while let Some(current) = pending.pop() {
            if !visited.insert(current.ri.clone()) {
                continue;
            }
            for member in Self::members(&current) {
                if let Identifier::Remote(_) = resolver::classify(&member, &config.cse_id, &config.cse_rn) {
                    continue;
                }
                let resource = match dispatcher.retrieve_resource(&member, originator).await {
                    Ok(resource) => resource,
                    Err(DispatchError::NotFound(_)) => continue,
                    Err(err) => return Err(err),
                };
                if resource.ri == group.ri {
                    return Err(DispatchError::BadRequest(format!(
                        "group {} would contain itself through member: {member}",
                        group.ri
                    )));
                }
                if resource.ty == ResourceType::Group {
                    pending.push(resource);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceBehavior for GroupBehavior {
    async fn activate(
        &self,
        dispatcher: &Dispatcher,
        resource: &mut Resource,
        _parent: &Resource,
        originator: &str,
    ) -> Outcome<()> {
        Self::check_members(resource)?;
        Self::check_references(dispatcher, resource, originator).await?;
        create_virtual_child(dispatcher, resource, ResourceType::GroupFanoutPoint, "fopt", originator).await?;
        Ok(())
    }

    async fn update(
        &self,
        dispatcher: &Dispatcher,
        resource: &mut Resource,
        update: &Map<String, Value>,
        originator: &str,
    ) -> Outcome<()> {
        if update.contains_key("cnm") {
            return Err(DispatchError::BadRequest("attribute is not updatable: cnm".to_string()));
        }
        resource.apply_update(update).map_err(DispatchError::BadRequest)?;
        Self::check_members(resource)?;
        if update.contains_key("mid") {
            Self::check_references(dispatcher, resource, originator).await?;
        }
        Ok(())
    }
}

/// `<fanOutPoint>`: re-dispatches the request to every group member.
///
/// The remainder of the target after `fopt` is appended to each member id, so
/// `grp/fopt/la` retrieves the `<latest>` of every member container. The member
/// outcomes are aggregated into `{"m2m:agr": {"m2m:rsp": [...]}}`.
///
/// A request that comes back through a fan-out point it already passed, or
/// that nests deeper than [`MAX_FANOUT_DEPTH`], fails with a bad request.
#[derive(Debug, Clone, Copy, Default)]
pub struct FanoutPointBehavior;

impl FanoutPointBehavior {
    async fn fan_out(&self, dispatcher: &Dispatcher, request: &Request, resource: &Resource) -> Outcome<Response> {
        if request.fanout_trail.contains(&resource.ri) {
            return Err(DispatchError::BadRequest(format!("fan-out loop through: {}", resource.ri)));
        }
        if request.fanout_trail.len() >= MAX_FANOUT_DEPTH {
            return Err(DispatchError::BadRequest(format!(
                "fan-out nested deeper than {MAX_FANOUT_DEPTH} at: {}",
                resource.ri
            )));
        }
        let group_ri = resource
            .pi
            .as_deref()
            .ok_or_else(|| DispatchError::Internal("<fanOutPoint> without group".to_string()))?;
        let group = dispatcher.retrieve_resource(group_ri, &request.originator).await?;
        let suffix = resolver::fanout_suffix(&request.to);

        let mut responses = Vec::new();
        for member in GroupBehavior::members(&group) {
            let to = format!("{member}{suffix}");
            debug!(%to, "Fanning out");
            let mut member_request = request.retargeted(to.clone());
            member_request.fanout_trail.push(resource.ri.clone());
            let entry = match dispatcher.process_request(&member_request).await {
                Ok(response) => {
                    let mut entry = json!({ "rsc": response.status.code(), "to": to });
                    if let Some(pc) = response.document() {
                        entry["pc"] = pc;
                    }
                    entry
                }
                Err(err) => json!({ "rsc": err.status().code(), "to": to, "dbg": err.diagnostic() }),
            };
            responses.push(entry);
        }
        Ok(Response::with_document(
            ResponseStatusCode::Ok,
            json!({ "m2m:agr": { "m2m:rsp": responses } }),
        ))
    }
}

#[async_trait]
impl ResourceBehavior for FanoutPointBehavior {
    async fn handle_retrieve(&self, dispatcher: &Dispatcher, request: &Request, resource: &Resource) -> Outcome<Response> {
        self.fan_out(dispatcher, request, resource).await
    }

    async fn handle_create(&self, dispatcher: &Dispatcher, request: &Request, resource: &Resource) -> Outcome<Response> {
        self.fan_out(dispatcher, request, resource).await
    }

    async fn handle_update(&self, dispatcher: &Dispatcher, request: &Request, resource: &Resource) -> Outcome<Response> {
        self.fan_out(dispatcher, request, resource).await
    }

    async fn handle_delete(&self, dispatcher: &Dispatcher, request: &Request, resource: &Resource) -> Outcome<Response> {
        self.fan_out(dispatcher, request, resource).await
    }
}
