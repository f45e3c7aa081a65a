//! Routing and Responder Tests
//!
//! Linear traversal, per-kind routing restrictions, unknown routes, and the
//! Config and Status request/response protocols.

mod common;

use actor_runtime::{from_fn, Actor, ActorContext, ActorOptions, Address, AddressBook};
use common::*;
use graph_engine::{
    node_fn, ConfigMessage, ConfigPayload, Graph, GraphBuilder, GraphError, NodeScope, Outcome,
    StatusMessage,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

fn addr(s: &str) -> Address {
    s.parse().unwrap()
}

#[tokio::test]
async fn test_root_debug_end_completes_once() {
    init_tracing();
    let graph = Graph::new("linear", Workflow::default(), Settings::with_target(0)).unwrap();
    let root = graph.root("root").await.unwrap();
    let debug = graph.debug("debug").await.unwrap();
    let end = graph.end("end").await.unwrap();

    root.one_way_route("next", &debug).unwrap();
    debug.one_way_route("next", &end).unwrap();

    // Debug keeps its single route
    let err = debug.one_way_route("other", &end).unwrap_err();
    assert!(matches!(err, GraphError::RoutingInvalid { .. }));
    assert!(matches!(
        debug.one_way_route("next", &end),
        Err(GraphError::RoutingInvalid { .. })
    ));
    assert_eq!(debug.routes().len(), 1);

    let mut completions = graph.take_completions().unwrap();
    assert!(graph.take_completions().is_none());

    let traversal = graph.start(json!({"hello": "world"})).await.unwrap();
    let done = next_completion(&mut completions).await;
    assert_eq!(done.traversal, traversal);
    assert_eq!(done.payload, json!({"hello": "world"}));
    assert_no_completion(&mut completions, Duration::from_millis(100)).await;
}

#[tokio::test]
async fn test_routing_restrictions_by_kind() {
    init_tracing();
    let graph = Graph::new("rules", Workflow::default(), Settings::with_target(0)).unwrap();
    let root = graph.root("root").await.unwrap();
    let end = graph.end("end").await.unwrap();
    let other_end = graph.end("other-end").await.unwrap();
    let worker = graph
        .custom("worker", node_fn(|_: &NodeScope<'_, Workflow, Settings>| Ok(Outcome::route("a"))))
        .await
        .unwrap();

    root.one_way_route("next", &worker).unwrap();
    assert!(root.one_way_route("second", &end).is_err());
    assert!(end.one_way_route("back", &root).is_err());

    // Custom nodes may reach one destination under several names, or themselves
    worker.one_way_route("a", &end).unwrap();
    worker.one_way_route("b", &end).unwrap();
    worker.one_way_route("self", &worker).unwrap();
    worker.one_way_route("c", &other_end).unwrap();
    assert!(worker.one_way_route("a", &other_end).is_err());
    assert_eq!(worker.routes().len(), 4);

    let foreign = Graph::new("foreign", Workflow::default(), Settings::with_target(0)).unwrap();
    let outsider = foreign.end("end").await.unwrap();
    assert!(matches!(
        worker.one_way_route("away", &outsider),
        Err(GraphError::RoutingInvalid { .. })
    ));
}

#[tokio::test]
async fn test_unknown_route_outcome_drops_traversal() {
    init_tracing();
    let failures = FailureLog::default();
    let graph = GraphBuilder::new("lost")
        .on_failure(failures.hook())
        .build(Workflow::default(), Settings::with_target(0))
        .unwrap();
    let root = graph.root("root").await.unwrap();
    let lost = graph
        .custom(
            "lost",
            node_fn(|_: &NodeScope<'_, Workflow, Settings>| Ok(Outcome::route("nowhere"))),
        )
        .await
        .unwrap();
    let end = graph.end("end").await.unwrap();
    root.one_way_route("next", &lost).unwrap();
    lost.one_way_route("somewhere", &end).unwrap();

    let mut completions = graph.take_completions().unwrap();
    graph.start(Value::Null).await.unwrap();

    eventually(|| failures.entries() == vec!["unknown_route".to_string()]).await;
    assert_no_completion(&mut completions, Duration::from_millis(50)).await;

    // The node survives and keeps serving traversals
    assert!(lost.actor().is_running());
}

fn config_client(book: &Arc<AddressBook<ConfigMessage>>) -> Actor<Vec<ConfigPayload>, ConfigMessage> {
    Actor::new(
        addr("actor://localhost/config-client"),
        from_fn(
            |msg: ConfigMessage, ctx: &ActorContext<'_, Vec<ConfigPayload>, ConfigMessage>| {
                let mut seen = ctx.state().clone();
                if let ConfigMessage::Response { payload, .. } = msg {
                    seen.push(payload);
                }
                Ok(seen)
            },
        ),
        Vec::new(),
        ActorOptions::default().with_address_book(Arc::clone(book)),
    )
    .unwrap()
}

#[tokio::test]
async fn test_config_protocol() {
    init_tracing();
    let failures = FailureLog::default();
    let graph = GraphBuilder::new("configured")
        .on_failure(failures.hook())
        .build(Workflow::default(), Settings::with_target(9))
        .unwrap();
    let book = Arc::new(AddressBook::new());
    let config = graph.config_node("config", Arc::clone(&book)).await.unwrap();
    let client = config_client(&book);
    let me = client.address().clone();

    assert_eq!(config.address().to_string(), "graph://localhost/configured/config");
    let end = graph.end("end").await.unwrap();
    assert!(matches!(
        config.one_way_route("next", &end),
        Err(GraphError::RoutingInvalid { .. })
    ));

    config
        .deliver(ConfigMessage::KeysRequest { sender: me.clone() })
        .await
        .unwrap();
    config
        .deliver(ConfigMessage::EntriesRequest { sender: me.clone() })
        .await
        .unwrap();
    config
        .deliver(ConfigMessage::ValueRequest {
            sender: me.clone(),
            keys: vec!["target".into(), "unknown".into()],
        })
        .await
        .unwrap();
    eventually(|| client.state().len() == 3).await;

    let answers = client.state();
    assert_eq!(
        answers[0],
        ConfigPayload::Keys(vec!["label".into(), "target".into()])
    );
    let all: BTreeMap<String, Value> = [
        ("label".to_string(), json!("test-workflow")),
        ("target".to_string(), json!(9)),
    ]
    .into_iter()
    .collect();
    assert_eq!(answers[1], ConfigPayload::Entries(all));
    let picked: BTreeMap<String, Value> = [("target".to_string(), json!(9))].into_iter().collect();
    assert_eq!(answers[2], ConfigPayload::Entries(picked));

    // Config nodes answer requests, not responses
    config
        .deliver(ConfigMessage::Response {
            sender: me,
            payload: ConfigPayload::Keys(Vec::new()),
        })
        .await
        .unwrap();
    eventually(|| failures.entries() == vec!["unexpected_message".to_string()]).await;
    assert_eq!(graph.state(), Workflow::default());
}

#[derive(Debug, Clone, PartialEq)]
struct Health {
    healthy: bool,
    checks: u32,
}

#[tokio::test]
async fn test_status_protocol() {
    init_tracing();
    let graph = Graph::new("monitored", Workflow::default(), Settings::with_target(0)).unwrap();
    let book = Arc::new(AddressBook::new());
    let status = graph
        .status_node(
            "status",
            Health {
                healthy: false,
                checks: 0,
            },
            Arc::clone(&book),
        )
        .await
        .unwrap();

    let probe = Actor::new(
        addr("actor://localhost/probe"),
        from_fn(
            |msg: StatusMessage<Health>, ctx: &ActorContext<'_, Option<Health>, StatusMessage<Health>>| {
                match msg {
                    StatusMessage::Response { value, .. } => Ok(Some(value)),
                    _ => Ok(ctx.state().clone()),
                }
            },
        ),
        None,
        ActorOptions::default().with_address_book(Arc::clone(&book)),
    )
    .unwrap();
    let me = probe.address().clone();

    status
        .deliver(StatusMessage::Request { sender: me.clone() })
        .await
        .unwrap();
    eventually(|| probe.state().is_some()).await;
    assert_eq!(
        probe.state(),
        Some(Health {
            healthy: false,
            checks: 0
        })
    );

    // Update replaces the whole value
    let replacement = Health {
        healthy: true,
        checks: 12,
    };
    status
        .deliver(StatusMessage::Update {
            sender: me.clone(),
            value: replacement.clone(),
        })
        .await
        .unwrap();
    status
        .deliver(StatusMessage::Request { sender: me })
        .await
        .unwrap();
    eventually(|| probe.state() == Some(replacement.clone())).await;
    assert_eq!(status.value(), replacement);

    let end = graph.end("end").await.unwrap();
    assert!(status.one_way_route("next", &end).is_err());

    graph.shutdown().await.unwrap();
    assert_eq!(status.status(), actor_runtime::ActorStatus::Idle);
}
