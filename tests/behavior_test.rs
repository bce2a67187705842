use async_trait::async_trait;
use cse_dispatch::behavior::{BehaviorRegistry, ResourceBehavior};
use cse_dispatch::config::DispatcherConfig;
use cse_dispatch::dispatcher::Dispatcher;
use cse_dispatch::error::{DispatchError, Outcome};
use cse_dispatch::lifecycle::CseNode;
use cse_dispatch::mock::ScriptedSecurity;
use cse_dispatch::model::{Request, Resource, ResourceType, Response, ResponseStatusCode};
use cse_dispatch::services::{EventKind, Storage};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const ORIGINATOR: &str = "CAdmin";

async fn start_node() -> CseNode {
    CseNode::start(DispatcherConfig::default()).await.expect("Failed to start node")
}

async fn create(dispatcher: &Dispatcher, to: &str, ty: ResourceType, payload: Value) -> Resource {
    dispatcher
        .process_request(&Request::create(to, ORIGINATOR, ty, payload))
        .await
        .expect("Failed to create resource")
        .into_resource()
        .expect("Create returned no resource")
}

async fn retrieve(dispatcher: &Dispatcher, to: &str) -> Outcome<Resource> {
    let response = dispatcher.process_request(&Request::retrieve(to, ORIGINATOR)).await?;
    response
        .into_resource()
        .ok_or_else(|| DispatchError::Internal(format!("{to} returned no resource")))
}

async fn setup_container(dispatcher: &Dispatcher, payload: Value) -> Resource {
    create(dispatcher, "cse-in", ResourceType::Ae, json!({ "m2m:ae": { "rn": "ae", "api": "Ntest" } })).await;
    create(dispatcher, "cse-in/ae", ResourceType::Container, payload).await
}

async fn add_instance(dispatcher: &Dispatcher, rn: &str, con: &str) -> Resource {
    create(
        dispatcher,
        "cse-in/ae/box",
        ResourceType::ContentInstance,
        json!({ "m2m:cin": { "rn": rn, "con": con } }),
    )
    .await
}

fn status(outcome: Outcome<Response>) -> u16 {
    match outcome {
        Ok(response) => response.status.code(),
        Err(err) => err.status().code(),
    }
}

// =============================================================================
// CONTAINER, LATEST, OLDEST
// =============================================================================

#[tokio::test]
async fn test_container_creates_latest_and_oldest() {
    let node = start_node().await;
    let d = &node.dispatcher;
    let cnt = setup_container(d, json!({ "m2m:cnt": { "rn": "box" } })).await;

    let latest = d
        .direct_child_resources(&cnt.ri, Some(ResourceType::ContainerLatest))
        .await
        .expect("Failed to list children");
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].srn.as_deref(), Some("cse-in/ae/box/la"));
    assert!(latest[0].read_only);

    // Empty container: nothing to project yet
    assert_eq!(status(d.process_request(&Request::retrieve("cse-in/ae/box/la", ORIGINATOR)).await), 4004);
    assert_eq!(status(d.process_request(&Request::retrieve("cse-in/ae/box/ol", ORIGINATOR)).await), 4004);
}

#[tokio::test]
async fn test_latest_and_oldest_follow_instances() {
    let node = start_node().await;
    let d = &node.dispatcher;
    let cnt = setup_container(d, json!({ "m2m:cnt": { "rn": "box" } })).await;

    add_instance(d, "first", "1").await;
    add_instance(d, "second", "22").await;
    add_instance(d, "third", "333").await;

    assert_eq!(retrieve(d, "cse-in/ae/box/la").await.expect("la").rn, "third");
    assert_eq!(retrieve(d, "cse-in/ae/box/ol").await.expect("ol").rn, "first");
    // Hybrid addressing reaches the same projection
    assert_eq!(retrieve(d, &format!("{}/la", cnt.ri)).await.expect("hybrid la").rn, "third");

    let cnt = retrieve(d, "cse-in/ae/box").await.expect("Failed to retrieve container");
    assert_eq!(cnt.attribute("cni"), Some(json!(3)));
    assert_eq!(cnt.attribute("cbs"), Some(json!(6)));

    // DELETE on la removes the newest instance
    let response = d
        .process_request(&Request::delete("cse-in/ae/box/la", ORIGINATOR))
        .await
        .expect("Failed to delete latest");
    assert_eq!(response.status, ResponseStatusCode::Deleted);
    assert_eq!(response.resource().map(|r| r.rn.as_str()), Some("third"));
    assert_eq!(retrieve(d, "cse-in/ae/box/la").await.expect("la").rn, "second");

    let cnt = retrieve(d, "cse-in/ae/box").await.expect("Failed to retrieve container");
    assert_eq!(cnt.attribute("cni"), Some(json!(2)));
    assert_eq!(cnt.attribute("cbs"), Some(json!(3)));
}

#[tokio::test]
async fn test_max_instances_prunes_oldest() {
    let node = start_node().await;
    let d = &node.dispatcher;
    let cnt = setup_container(d, json!({ "m2m:cnt": { "rn": "box", "mni": 2 } })).await;

    add_instance(d, "a", "a").await;
    add_instance(d, "b", "b").await;
    add_instance(d, "c", "c").await;

    let count = d
        .count_direct_child_resources(&cnt.ri, Some(ResourceType::ContentInstance))
        .await
        .expect("Failed to count instances");
    assert_eq!(count, 2);
    assert_eq!(retrieve(d, "cse-in/ae/box/ol").await.expect("ol").rn, "b");
    assert_eq!(status(d.process_request(&Request::retrieve("cse-in/ae/box/a", ORIGINATOR)).await), 4004);

    // Lowering the limit prunes immediately
    let update = Request::update("cse-in/ae/box", ORIGINATOR, json!({ "m2m:cnt": { "mni": 1 } }));
    d.process_request(&update).await.expect("Failed to update");
    let cnt = retrieve(d, "cse-in/ae/box").await.expect("Failed to retrieve container");
    assert_eq!(cnt.attribute("cni"), Some(json!(1)));
    assert_eq!(retrieve(d, "cse-in/ae/box/ol").await.expect("ol").rn, "c");
}

#[tokio::test]
async fn test_max_byte_size_prunes_oldest() {
    let node = start_node().await;
    let d = &node.dispatcher;
    setup_container(d, json!({ "m2m:cnt": { "rn": "box", "mbs": 5 } })).await;

    add_instance(d, "a", "123").await;
    add_instance(d, "b", "456").await;

    let cnt = retrieve(d, "cse-in/ae/box").await.expect("Failed to retrieve container");
    assert_eq!(cnt.attribute("cni"), Some(json!(1)));
    assert_eq!(cnt.attribute("cbs"), Some(json!(3)));
    assert_eq!(retrieve(d, "cse-in/ae/box/ol").await.expect("ol").rn, "b");
}

#[tokio::test]
async fn test_instance_larger_than_container_is_rejected() {
    let node = start_node().await;
    let d = &node.dispatcher;
    setup_container(d, json!({ "m2m:cnt": { "rn": "box", "mbs": 5 } })).await;
    add_instance(d, "small", "123").await;

    let big = Request::create(
        "cse-in/ae/box",
        ORIGINATOR,
        ResourceType::ContentInstance,
        json!({ "m2m:cin": { "rn": "big", "con": "0123456789" } }),
    );
    assert_eq!(status(d.process_request(&big).await), 4000);
    assert_eq!(status(d.process_request(&Request::retrieve("cse-in/ae/box/big", ORIGINATOR)).await), 4004);

    // The rejected instance must not have pruned the existing one
    let cnt = retrieve(d, "cse-in/ae/box").await.expect("Failed to retrieve container");
    assert_eq!(cnt.attribute("cni"), Some(json!(1)));
    assert_eq!(retrieve(d, "cse-in/ae/box/la").await.expect("la").rn, "small");
}

#[tokio::test]
async fn test_container_without_room_rejects_instances() {
    let node = start_node().await;
    let d = &node.dispatcher;
    setup_container(d, json!({ "m2m:cnt": { "rn": "box", "mni": 0 } })).await;

    let cin = Request::create(
        "cse-in/ae/box",
        ORIGINATOR,
        ResourceType::ContentInstance,
        json!({ "m2m:cin": { "rn": "only", "con": "x" } }),
    );
    assert_eq!(status(d.process_request(&cin).await), 4000);
    assert_eq!(status(d.process_request(&Request::retrieve("cse-in/ae/box/only", ORIGINATOR)).await), 4004);
}

// =============================================================================
// GROUP FANOUT
// =============================================================================

#[tokio::test]
async fn test_fanout_aggregates_member_responses() {
    let node = start_node().await;
    let d = &node.dispatcher;
    create(d, "cse-in", ResourceType::Ae, json!({ "m2m:ae": { "rn": "ae", "api": "Ntest" } })).await;

    let mut members = Vec::new();
    for (rn, con) in [("kitchen", "21"), ("garage", "12")] {
        let cnt = create(d, "cse-in/ae", ResourceType::Container, json!({ "m2m:cnt": { "rn": rn } })).await;
        create(
            d,
            &format!("cse-in/ae/{rn}"),
            ResourceType::ContentInstance,
            json!({ "m2m:cin": { "con": con } }),
        )
        .await;
        members.push(cnt.ri);
    }
    members.push("missing".to_string());

    let group = create(d, "cse-in/ae", ResourceType::Group, json!({ "m2m:grp": { "rn": "temps", "mid": &members } })).await;
    assert_eq!(group.attribute("cnm"), Some(json!(3)));

    let response = d
        .process_request(&Request::retrieve("cse-in/ae/temps/fopt/la", ORIGINATOR))
        .await
        .expect("Fanout failed");
    assert_eq!(response.status, ResponseStatusCode::Ok);

    let document = response.document().expect("No aggregated response");
    let rsp = document["m2m:agr"]["m2m:rsp"].as_array().expect("No member responses");
    assert_eq!(rsp.len(), 3);
    assert_eq!(rsp[0]["rsc"], 2000);
    assert_eq!(rsp[0]["to"], format!("{}/la", members[0]));
    assert_eq!(rsp[0]["pc"]["m2m:cin"]["con"], "21");
    assert_eq!(rsp[1]["pc"]["m2m:cin"]["con"], "12");
    assert_eq!(rsp[2]["rsc"], 4004);
    assert!(rsp[2].get("pc").is_none());
}

#[tokio::test]
async fn test_group_member_limit() {
    let node = start_node().await;
    let d = &node.dispatcher;
    create(d, "cse-in", ResourceType::Ae, json!({ "m2m:ae": { "rn": "ae", "api": "Ntest" } })).await;

    let request = Request::create(
        "cse-in/ae",
        ORIGINATOR,
        ResourceType::Group,
        json!({ "m2m:grp": { "mid": ["a", "b"], "mnm": 1 } }),
    );
    assert_eq!(status(d.process_request(&request).await), 4000);
}

#[tokio::test]
async fn test_group_cannot_contain_itself() {
    let node = start_node().await;
    let d = &node.dispatcher;
    create(d, "cse-in", ResourceType::Ae, json!({ "m2m:ae": { "rn": "ae", "api": "Ntest" } })).await;

    let own_fopt = Request::create(
        "cse-in/ae",
        ORIGINATOR,
        ResourceType::Group,
        json!({ "m2m:grp": { "rn": "grp", "mid": ["cse-in/ae/grp/fopt"] } }),
    );
    assert_eq!(status(d.process_request(&own_fopt).await), 4000);
    assert_eq!(status(d.process_request(&Request::retrieve("cse-in/ae/grp", ORIGINATOR)).await), 4004);

    create(d, "cse-in/ae", ResourceType::Group, json!({ "m2m:grp": { "rn": "grp", "mid": [] } })).await;
    let own_path = Request::update("cse-in/ae/grp", ORIGINATOR, json!({ "m2m:grp": { "mid": ["cse-in/ae/grp"] } }));
    assert_eq!(status(d.process_request(&own_path).await), 4000);
    let grp = retrieve(d, "cse-in/ae/grp").await.expect("Failed to retrieve group");
    assert_eq!(grp.attribute("cnm"), Some(json!(0)));
}

#[tokio::test]
async fn test_groups_cannot_contain_each_other() {
    let node = start_node().await;
    let d = &node.dispatcher;
    create(d, "cse-in", ResourceType::Ae, json!({ "m2m:ae": { "rn": "ae", "api": "Ntest" } })).await;

    let a = create(d, "cse-in/ae", ResourceType::Group, json!({ "m2m:grp": { "rn": "a", "mid": [] } })).await;
    let b = create(d, "cse-in/ae", ResourceType::Group, json!({ "m2m:grp": { "rn": "b", "mid": [&a.ri] } })).await;
    create(d, "cse-in/ae", ResourceType::Group, json!({ "m2m:grp": { "rn": "c", "mid": [&b.ri] } })).await;

    let direct = Request::update("cse-in/ae/a", ORIGINATOR, json!({ "m2m:grp": { "mid": [&b.ri] } }));
    assert_eq!(status(d.process_request(&direct).await), 4000);
    let transitive = Request::update("cse-in/ae/a", ORIGINATOR, json!({ "m2m:grp": { "mid": ["cse-in/ae/c"] } }));
    assert_eq!(status(d.process_request(&transitive).await), 4000);

    let a = retrieve(d, "cse-in/ae/a").await.expect("Failed to retrieve group");
    assert_eq!(a.attribute("cnm"), Some(json!(0)));
}

/// Writes `mid` straight to storage, skipping member validation.
async fn force_members(node: &CseNode, srn: &str, members: Value) {
    let mut group = retrieve(&node.dispatcher, srn).await.expect("Failed to retrieve group");
    group.attributes.insert("mid".into(), members);
    node.storage().update(&group).await.expect("Failed to store group");
}

#[tokio::test]
async fn test_fanout_loop_is_cut_off() {
    let node = start_node().await;
    let d = &node.dispatcher;
    create(d, "cse-in", ResourceType::Ae, json!({ "m2m:ae": { "rn": "ae", "api": "Ntest" } })).await;
    create(d, "cse-in/ae", ResourceType::Group, json!({ "m2m:grp": { "rn": "grp", "mid": [] } })).await;
    force_members(&node, "cse-in/ae/grp", json!(["cse-in/ae/grp/fopt"])).await;

    let response = d
        .process_request(&Request::retrieve("cse-in/ae/grp/fopt", ORIGINATOR))
        .await
        .expect("Fanout failed");
    let document = response.document().expect("No aggregated response");
    let rsp = document["m2m:agr"]["m2m:rsp"].as_array().expect("No member responses");
    assert_eq!(rsp.len(), 1);
    assert_eq!(rsp[0]["rsc"], 4000);
}

#[tokio::test]
async fn test_mutual_fanout_loop_is_cut_off() {
    let node = start_node().await;
    let d = &node.dispatcher;
    create(d, "cse-in", ResourceType::Ae, json!({ "m2m:ae": { "rn": "ae", "api": "Ntest" } })).await;
    create(d, "cse-in/ae", ResourceType::Group, json!({ "m2m:grp": { "rn": "a", "mid": [] } })).await;
    create(d, "cse-in/ae", ResourceType::Group, json!({ "m2m:grp": { "rn": "b", "mid": [] } })).await;
    force_members(&node, "cse-in/ae/a", json!(["cse-in/ae/b/fopt"])).await;
    force_members(&node, "cse-in/ae/b", json!(["cse-in/ae/a/fopt"])).await;

    let response = d
        .process_request(&Request::retrieve("cse-in/ae/a/fopt", ORIGINATOR))
        .await
        .expect("Fanout failed");
    let document = response.document().expect("No aggregated response");
    let outer = &document["m2m:agr"]["m2m:rsp"][0];
    assert_eq!(outer["rsc"], 2000);
    let inner = &outer["pc"]["m2m:agr"]["m2m:rsp"][0];
    assert_eq!(inner["to"], "cse-in/ae/a/fopt");
    assert_eq!(inner["rsc"], 4000);
}

// =============================================================================
// POLLING CHANNEL
// =============================================================================

async fn setup_polling_channel(dispatcher: &Dispatcher) -> Resource {
    create(dispatcher, "cse-in", ResourceType::Ae, json!({ "m2m:ae": { "rn": "ae", "api": "Ntest" } })).await;
    create(dispatcher, "cse-in/ae", ResourceType::PollingChannel, json!({ "m2m:pch": { "rn": "pch" } })).await
}

#[tokio::test]
async fn test_polling_channel_queues_notifications() {
    let node = start_node().await;
    let d = &node.dispatcher;
    let pch = setup_polling_channel(d).await;
    assert!(pch.attribute("pcuRI").is_some());

    let notify = Request::notify("cse-in/ae/pch/pcu", "CSensor", json!({ "m2m:sgn": { "nev": { "net": 1 } } }));
    let response = d.process_request(&notify).await.expect("Failed to notify");
    assert_eq!(response.status, ResponseStatusCode::Ok);

    let response = d
        .process_request(&Request::retrieve("cse-in/ae/pch/pcu", ORIGINATOR))
        .await
        .expect("Failed to poll");
    let document = response.document().expect("No queued request");
    assert_eq!(document["m2m:rqp"]["op"], 5);
    assert_eq!(document["m2m:rqp"]["fr"], "CSensor");
    assert_eq!(document["m2m:rqp"]["pc"]["m2m:sgn"]["nev"]["net"], 1);
}

#[tokio::test]
async fn test_polling_retrieve_waits_for_notification() {
    let node = start_node().await;
    let dispatcher = node.dispatcher.clone();
    setup_polling_channel(&dispatcher).await;

    let poller = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            let request = Request::retrieve("cse-in/ae/pch/pcu", ORIGINATOR);
            dispatcher.process_request(&request).await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    let notify = Request::notify("cse-in/ae/pch/pcu", "CSensor", json!({ "m2m:sgn": { "vrq": true } }));
    dispatcher.process_request(&notify).await.expect("Failed to notify");

    let response = poller.await.expect("Poller panicked").expect("Poll failed");
    let document = response.document().expect("No queued request");
    assert_eq!(document["m2m:rqp"]["pc"]["m2m:sgn"]["vrq"], true);
}

#[tokio::test]
async fn test_polling_retrieve_times_out() {
    let config = DispatcherConfig {
        polling_channel_timeout_ms: 100,
        ..DispatcherConfig::default()
    };
    let node = CseNode::start(config).await.expect("Failed to start node");
    let d = &node.dispatcher;
    setup_polling_channel(d).await;

    let outcome = d.process_request(&Request::retrieve("cse-in/ae/pch/pcu", ORIGINATOR)).await;
    assert!(matches!(outcome, Err(DispatchError::RequestTimeout(_))));
}

#[tokio::test]
async fn test_polling_channel_access_is_checked() {
    let node = CseNode::start_with(
        DispatcherConfig::default(),
        |collaborators| collaborators.with_security(Arc::new(ScriptedSecurity::new().deny_polling("CEvil"))),
        BehaviorRegistry::standard(),
    )
    .await
    .expect("Failed to start node");
    let d = &node.dispatcher;
    setup_polling_channel(d).await;

    let notify = Request::notify("cse-in/ae/pch/pcu", "CEvil", json!({}));
    assert_eq!(status(d.process_request(&notify).await), 4103);
    let poll = Request::retrieve("cse-in/ae/pch/pcu", "CEvil");
    assert_eq!(status(d.process_request(&poll).await), 4103);
}

// =============================================================================
// EVENTS & CUSTOM BEHAVIOR
// =============================================================================

#[tokio::test]
async fn test_events_follow_lifecycle() {
    let node = start_node().await;
    let mut events = node.subscribe();
    let d = &node.dispatcher;

    let cnt = setup_container(d, json!({ "m2m:cnt": { "rn": "box" } })).await;
    d.process_request(&Request::update("cse-in/ae/box", ORIGINATOR, json!({ "m2m:cnt": { "lbl": ["x"] } })))
        .await
        .expect("Failed to update");
    d.process_request(&Request::delete("cse-in/ae", ORIGINATOR)).await.expect("Failed to delete");

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push((event.kind, event.resource.ri));
    }

    assert!(seen.contains(&(EventKind::Created, cnt.ri.clone())));
    assert!(seen.contains(&(EventKind::Updated, cnt.ri.clone())));
    let deleted_cnt = seen.iter().position(|e| *e == (EventKind::Deleted, cnt.ri.clone()));
    let last = seen.last().expect("No events");
    assert_eq!(last.0, EventKind::Deleted);
    assert!(deleted_cnt.is_some_and(|idx| idx < seen.len() - 1), "children go before their parent");
}

/// Refuses children whose name starts with `forbidden`.
struct Picky;

#[async_trait]
impl ResourceBehavior for Picky {
    async fn child_will_be_added(
        &self,
        _dispatcher: &Dispatcher,
        _parent: &Resource,
        child: &Resource,
        _originator: &str,
    ) -> Outcome<()> {
        if child.rn.starts_with("forbidden") {
            return Err(DispatchError::OperationNotAllowed(format!("refusing {}", child.rn)));
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_registered_behavior_can_veto_children() {
    let mut behaviors = BehaviorRegistry::standard();
    behaviors.register(ResourceType::Ae, Picky);
    let node = CseNode::start_with(DispatcherConfig::default(), |c| c, behaviors)
        .await
        .expect("Failed to start node");
    let d = &node.dispatcher;
    create(d, "cse-in", ResourceType::Ae, json!({ "m2m:ae": { "rn": "ae", "api": "Ntest" } })).await;

    let refused = Request::create("cse-in/ae", ORIGINATOR, ResourceType::Container, json!({ "m2m:cnt": { "rn": "forbidden1" } }));
    assert_eq!(status(d.process_request(&refused).await), 4005);
    assert_eq!(status(d.process_request(&Request::retrieve("cse-in/ae/forbidden1", ORIGINATOR)).await), 4004);

    let accepted = Request::create("cse-in/ae", ORIGINATOR, ResourceType::Container, json!({ "m2m:cnt": { "rn": "fine" } }));
    assert_eq!(status(d.process_request(&accepted).await), 2001);
}
