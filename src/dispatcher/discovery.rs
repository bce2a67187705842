//! Subtree discovery.
//!
//! Results come back in pre-order (a parent before its descendants, siblings
//! in storage order). [`response::resource_tree`](super::response::resource_tree)
//! relies on that order to rebuild the nesting.

use super::filter;
use super::resolver::Target;
use super::Dispatcher;
use crate::error::Outcome;
use crate::model::{Permission, RequestArgs, Resource};
use tracing::{debug, trace};

impl Dispatcher {
    /// Effective depth budget: the request's `lvl`, clamped to the configured maximum.
    fn discovery_level(&self, requested: Option<usize>) -> Option<usize> {
        match (requested, self.config.max_discovery_level) {
            (Some(requested), Some(max)) => Some(requested.min(max)),
            (requested, max) => requested.or(max),
        }
    }

    /// Matching, permitted descendants of `root`.
    ///
    /// Paging (`ofst`, `lim`) selects which direct children of `root` are
    /// walked; it does not limit the flattened result. Virtual resources are
    /// never candidates, and are not descended into. Every other child is
    /// descended into whether it matched or not.
    pub async fn discover_resources(
        &self,
        root: &Resource,
        originator: &str,
        args: &RequestArgs,
        permission: Permission,
    ) -> Outcome<Vec<Resource>> {
        let level = self.discovery_level(args.handling.level);
        if level == Some(0) {
            return Ok(Vec::new());
        }

        let offset = args.handling.offset.unwrap_or(1).max(1) - 1;
        let limit = args.handling.limit.unwrap_or(usize::MAX);
        let first_level: Vec<Resource> = self
            .direct_child_resources(&root.ri, None)
            .await?
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect();

        let mut stack: Vec<(Resource, usize)> = first_level.into_iter().rev().map(|child| (child, 1)).collect();
        let mut found = Vec::new();

        while let Some((resource, depth)) = stack.pop() {
            if resource.ty.is_virtual() {
                continue;
            }
            if level.map_or(true, |level| depth < level) {
                let children = self.direct_child_resources(&resource.ri, None).await?;
                stack.extend(children.into_iter().rev().map(|child| (child, depth + 1)));
            }
            let matched = filter::matches(&resource, &args.conditions, &args.attributes, args.fo);
            if matched && self.security.has_access(originator, &resource, permission).await {
                trace!(ri = %resource.ri, "Discovered");
                found.push(resource);
            }
        }

        if let Some(arp) = &args.handling.arp {
            found = self.apply_additional_path(found, arp, originator, permission).await?;
        }
        debug!(root = %root.ri, count = found.len(), "Discovery finished");
        Ok(found)
    }

    /// Replaces every match with its `<path>/<arp>` sibling, where that exists and is permitted.
    async fn apply_additional_path(
        &self,
        found: Vec<Resource>,
        arp: &str,
        originator: &str,
        permission: Permission,
    ) -> Outcome<Vec<Resource>> {
        let arp = arp.trim_matches('/');
        let mut retargeted = Vec::with_capacity(found.len());
        for resource in found {
            let target = Target::Path(format!("{}/{arp}", resource.structured_path()));
            match self.retrieve_local_resource(&target).await {
                Ok(sibling) if self.security.has_access(originator, &sibling, permission).await => {
                    retargeted.push(sibling);
                }
                Ok(_) => trace!(?target, "Additional path not permitted"),
                Err(err) => trace!(?target, %err, "Additional path not resolvable"),
            }
        }
        Ok(retargeted)
    }
}
