use super::helpers::*;
use crate::{
    config::NodeClasses,
    event::{GraphEvent, GraphEventHandler},
    graph::{Graph, NodeId},
    nodekey::NodeRef,
    trigger::{TriggerWordRequest, TriggerWordSync},
};
use std::{collections::BTreeSet, time::Duration};
use tokio::{sync::mpsc::UnboundedReceiver, time::timeout};

/// stacker 1 -> stacker 2 -> toggle 3, with a second toggle 4 on stacker 1.
fn chain_graph() -> Graph {
    let mut graph = graph_with(
        None,
        vec![
            stacker(1, &[("A", true), ("off", false)]),
            stacker(2, &[("B", true)]),
            toggle(3),
            toggle(4),
        ],
    );
    stack(&mut graph, 1, 1, 2);
    connect(&mut graph, 2, 2, 3, "lora_stack");
    connect(&mut graph, 3, 1, 4, "lora_stack");
    graph
}

async fn next_request(receiver: &mut UnboundedReceiver<TriggerWordRequest>) -> TriggerWordRequest {
    timeout(Duration::from_secs(2), receiver.recv())
        .await
        .expect("request was not sent in time")
        .expect("channel closed")
}

#[tokio::test]
async fn test_request_lists_names_and_toggles() {
    init_logging();
    let graph = chain_graph();
    let (backend, _receiver) = ChannelBackend::new();
    let sync = TriggerWordSync::new(backend, NodeClasses::default());

    let node = graph.graph_node(&NodeId::Num(2)).unwrap();
    let names = BTreeSet::from(["z".to_string(), "a".to_string()]);
    let request = sync.request_for(node, &names).unwrap();
    assert_eq!(request.lora_names, vec!["a", "z"]);
    assert_eq!(request.node_ids, vec![NodeRef::new(None, 3)]);

    let toggle_node = graph.graph_node(&NodeId::Num(3)).unwrap();
    assert!(sync.request_for(toggle_node, &names).is_none());
}

#[tokio::test]
async fn test_refresh_sends_chain_to_backend() {
    init_logging();
    let graph = chain_graph();
    let (backend, mut receiver) = ChannelBackend::new();
    let sync = TriggerWordSync::new(backend, NodeClasses::default());

    let node = graph.graph_node(&NodeId::Num(2)).unwrap();
    let dispatched = sync.refresh(node).unwrap();
    let received = next_request(&mut receiver).await;
    assert_eq!(received, dispatched);
    assert_eq!(received.lora_names, vec!["A", "B"]);
}

#[tokio::test]
async fn test_refresh_downstream_updates_every_affected_chain() {
    init_logging();
    let graph = chain_graph();
    let (backend, mut receiver) = ChannelBackend::new();
    let sync = TriggerWordSync::new(backend, NodeClasses::default());

    let node = graph.graph_node(&NodeId::Num(1)).unwrap();
    let dispatched = sync.refresh_downstream(node);
    assert_eq!(dispatched.len(), 2);
    assert_eq!(dispatched[0].node_ids, vec![NodeRef::new(None, 4)]);
    assert_eq!(dispatched[0].lora_names, vec!["A"]);
    assert_eq!(dispatched[1].node_ids, vec![NodeRef::new(None, 3)]);
    assert_eq!(dispatched[1].lora_names, vec!["A", "B"]);

    let mut received = vec![
        next_request(&mut receiver).await,
        next_request(&mut receiver).await,
    ];
    received.sort_by(|a, b| a.lora_names.len().cmp(&b.lora_names.len()));
    assert_eq!(received, dispatched);
}

#[tokio::test]
async fn test_backend_failure_is_not_surfaced() {
    init_logging();
    let graph = chain_graph();
    let (backend, mut receiver) = ChannelBackend::failing();
    let sync = TriggerWordSync::new(backend, NodeClasses::default());

    let node = graph.graph_node(&NodeId::Num(2)).unwrap();
    assert!(sync.refresh(node).is_some());
    // The backend still saw the request; its error only reached the log.
    next_request(&mut receiver).await;
}

#[tokio::test]
async fn test_events_drive_refresh() {
    init_logging();
    let mut graph = chain_graph();
    let (backend, mut receiver) = ChannelBackend::new();
    let sync = TriggerWordSync::new(backend, NodeClasses::default());

    graph.nodes[0].mode = Some(4);
    let requests = sync.handle_event(
        &graph,
        &GraphEvent::ModeChanged {
            node: NodeRef::new(None, 1),
            mode: 4,
        },
    );
    assert_eq!(requests.len(), 2);
    assert!(requests[0].lora_names.is_empty());
    assert_eq!(requests[1].lora_names, vec!["B"]);

    let removed = GraphEvent::NodeRemoved {
        node: NodeRef::new(None, 2),
    };
    assert!(sync.handle_event(&graph, &removed).is_empty());

    let unknown = GraphEvent::WidgetChanged {
        node: NodeRef::new(Some("elsewhere"), 1),
        widget: "loras".to_string(),
    };
    assert!(sync.handle_event(&graph, &unknown).is_empty());

    sync.on_event(
        &graph,
        &GraphEvent::ConnectionsChanged {
            node: NodeRef::new(None, 2),
        },
    );
    for _ in 0..3 {
        next_request(&mut receiver).await;
    }
}

#[test]
fn test_no_runtime_drops_update() {
    init_logging();
    let graph = chain_graph();
    let (backend, mut receiver) = ChannelBackend::new();
    let sync = TriggerWordSync::new(backend, NodeClasses::default());

    let node = graph.graph_node(&NodeId::Num(2)).unwrap();
    assert!(sync.refresh(node).is_some());
    assert!(receiver.try_recv().is_err());
}
