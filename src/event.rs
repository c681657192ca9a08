use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::{
    graph::{access::node_from_ref, Graph},
    nodekey::NodeRef,
    trigger::{TriggerWordBackend, TriggerWordRequest, TriggerWordSync},
};

/// Edits to a workflow graph that can change what LoRAs a chain applies.
///
/// Events identify nodes by [NodeRef] so they stay valid across graph reloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GraphEvent {
    /// Node muted, bypassed or re-enabled.
    ModeChanged { node: NodeRef, mode: i64 },
    /// A widget value changed, e.g. a loras list edit or a cycler step.
    WidgetChanged { node: NodeRef, widget: String },
    /// A link into or out of the node was added or removed.
    ConnectionsChanged { node: NodeRef },
    NodeRemoved { node: NodeRef },
}

impl GraphEvent {
    pub fn node(&self) -> &NodeRef {
        match self {
            GraphEvent::ModeChanged { node, .. }
            | GraphEvent::WidgetChanged { node, .. }
            | GraphEvent::ConnectionsChanged { node }
            | GraphEvent::NodeRemoved { node } => node,
        }
    }
}

impl Display for GraphEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphEvent::ModeChanged { node, mode } => write!(f, "mode of {node} -> {mode}"),
            GraphEvent::WidgetChanged { node, widget } => {
                write!(f, "widget '{widget}' of {node} changed")
            }
            GraphEvent::ConnectionsChanged { node } => write!(f, "connections of {node} changed"),
            GraphEvent::NodeRemoved { node } => write!(f, "{node} removed"),
        }
    }
}

/// Receives [GraphEvent]s. `root` is the graph state after the edit.
pub trait GraphEventHandler {
    fn on_event(&self, root: &Graph, event: &GraphEvent);
}

impl<B> TriggerWordSync<B>
where
    B: TriggerWordBackend + 'static,
{
    /// Refresh every chain affected by `event`, returning the dispatched requests.
    ///
    /// A removed node is already gone from `root`; the links that pointed at it are
    /// reported separately as [GraphEvent::ConnectionsChanged] on its neighbours.
    pub fn handle_event(&self, root: &Graph, event: &GraphEvent) -> Vec<TriggerWordRequest> {
        if let GraphEvent::NodeRemoved { node } = event {
            tracing::debug!("[TriggerWordSync::handle_event] {node} removed, nothing to refresh");
            return Vec::new();
        }
        match node_from_ref(root, event.node()) {
            Some(node) => {
                tracing::debug!("[TriggerWordSync::handle_event] {event}");
                self.refresh_downstream(node)
            }
            None => {
                tracing::debug!(
                    "[TriggerWordSync::handle_event] {} not found, ignoring '{event}'",
                    event.node()
                );
                Vec::new()
            }
        }
    }
}

impl<B> GraphEventHandler for TriggerWordSync<B>
where
    B: TriggerWordBackend + 'static,
{
    fn on_event(&self, root: &Graph, event: &GraphEvent) {
        let requests = self.handle_event(root, event);
        tracing::debug!(
            "[TriggerWordSync::on_event] dispatched {} trigger word update(s)",
            requests.len()
        );
    }
}
