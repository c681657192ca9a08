//! Shared test utilities for building workflow graphs

use crate::{
    chain::{CYCLER_WIDGET, LORA_STACK_INPUT},
    config::{CYCLER_CLASS, STACKER_CLASS, TRIGGER_TOGGLE_CLASS},
    graph::{Graph, Link, LinkId, Node, NodeId, NodeInput, NodeOutput, Widget},
    lora::LoraEntry,
    trigger::{TriggerWordBackend, TriggerWordRequest},
    LoraSyncError,
};
use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Initialize logging for tests
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// A stacker whose loras widget holds `(name, active)` entries.
pub fn stacker(id: i64, loras: &[(&str, bool)]) -> Node {
    let mut node = Node::new(id, STACKER_CLASS);
    let entries: Vec<LoraEntry> = loras
        .iter()
        .map(|(name, active)| {
            let mut entry = LoraEntry::new(name, 1.0);
            entry.active = Some(*active);
            entry
        })
        .collect();
    node.widgets.push(Widget {
        name: "loras".to_string(),
        value: serde_json::to_value(entries).unwrap(),
    });
    node
}

/// A cycler currently positioned on `current`.
pub fn cycler(id: i64, current: &str) -> Node {
    let mut node = Node::new(id, CYCLER_CLASS);
    node.widgets.push(Widget {
        name: CYCLER_WIDGET.to_string(),
        value: json!({ "current_lora_filename": current, "current_index": 2, "total_count": 5 }),
    });
    node
}

pub fn toggle(id: i64) -> Node {
    Node::new(id, TRIGGER_TOGGLE_CLASS)
}

/// Link `origin`'s first output into an input named `input` on `target`.
///
/// Both nodes must already be in `graph`.
pub fn connect(
    graph: &mut Graph,
    link_id: LinkId,
    origin: impl Into<NodeId>,
    target: impl Into<NodeId>,
    input: &str,
) {
    let origin = origin.into();
    let target = target.into();
    graph
        .links
        .insert(Link::new(link_id, origin.clone(), target.clone()));
    for node in graph.nodes.iter_mut() {
        if node.id == origin {
            match node.outputs.first_mut() {
                Some(output) => output.links.push(link_id),
                None => node.outputs.push(NodeOutput {
                    name: "LORA_STACK".to_string(),
                    links: vec![link_id],
                }),
            }
        }
        if node.id == target {
            node.inputs.push(NodeInput {
                name: input.to_string(),
                link: Some(link_id),
            });
        }
    }
}

/// Chain `origin` into `target`'s `lora_stack` input.
pub fn stack(graph: &mut Graph, link_id: LinkId, origin: i64, target: i64) {
    connect(graph, link_id, origin, target, LORA_STACK_INPUT);
}

pub fn graph_with(id: Option<&str>, nodes: Vec<Node>) -> Graph {
    Graph {
        id: id.map(str::to_string),
        nodes,
        ..Default::default()
    }
}

/// Backend that forwards every request to a channel instead of the network.
pub struct ChannelBackend {
    sender: UnboundedSender<TriggerWordRequest>,
    fail: bool,
}

impl ChannelBackend {
    pub fn new() -> (ChannelBackend, UnboundedReceiver<TriggerWordRequest>) {
        let (sender, receiver) = unbounded_channel();
        (
            ChannelBackend {
                sender,
                fail: false,
            },
            receiver,
        )
    }

    /// Records the request, then reports failure.
    pub fn failing() -> (ChannelBackend, UnboundedReceiver<TriggerWordRequest>) {
        let (mut backend, receiver) = ChannelBackend::new();
        backend.fail = true;
        (backend, receiver)
    }
}

#[async_trait]
impl TriggerWordBackend for ChannelBackend {
    async fn send_trigger_words(&self, request: &TriggerWordRequest) -> Result<(), LoraSyncError> {
        self.sender
            .send(request.clone())
            .map_err(|e| LoraSyncError::Custom(e.to_string()))?;
        if self.fail {
            return Err(LoraSyncError::Network("connection refused".to_string()));
        }
        Ok(())
    }
}
