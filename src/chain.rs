//! Active-LoRA aggregation along chains of provider nodes.
//!
//! Provider nodes (stackers, randomizers, cyclers) hand their entries downstream through
//! a `lora_stack` input. The set of LoRAs a node effectively applies is its own active
//! set plus everything its upstream providers apply, recursively. Chains may be cyclic,
//! so every walk carries a visited set of [`NodeKey`]s created fresh by the top-level
//! call.
//!
//! Dangling links, missing nodes and unknown classes end a branch; they are logged at
//! debug level and never reported as errors.

use serde_json::Value;
use std::collections::{BTreeSet, HashSet};

use crate::{
    config::{NodeClasses, ProviderKind},
    graph::{access::node_from_ref, Graph, GraphNode, Node},
    nodekey::{NodeKey, NodeRef},
};

/// Input slot through which providers are chained.
pub const LORA_STACK_INPUT: &str = "lora_stack";
/// Widget holding a cycler's iteration state. Saved workflows keep the same object
/// positionally in `widgets_values`.
pub const CYCLER_WIDGET: &str = "cycler_config";
/// Field of [`CYCLER_WIDGET`] naming the LoRA at the current cycle position.
pub const CYCLER_CURRENT_FIELD: &str = "current_lora_filename";

/// Names a single node applies on its own.
///
/// Cyclers contribute the file at their current position; every other node contributes
/// the entries of its loras widget marked active. Muted or bypassed nodes contribute
/// nothing.
pub fn active_loras_from_node(node: &Node, classes: &NodeClasses) -> BTreeSet<String> {
    if !node.is_active() {
        return BTreeSet::new();
    }
    match classes.provider_kind(node.class_tag()) {
        Some(ProviderKind::Cycler) => node
            .object_widget_value(CYCLER_WIDGET, CYCLER_CURRENT_FIELD)
            .and_then(|value| value.get(CYCLER_CURRENT_FIELD))
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .map(|name| BTreeSet::from([name.to_string()]))
            .unwrap_or_default(),
        _ => node
            .lora_entries()
            .into_iter()
            .filter(|entry| entry.is_active())
            .map(|entry| entry.name)
            .collect(),
    }
}

/// Provider nodes linked into `node`'s `lora_stack` input(s).
pub fn connected_input_stackers<'a>(
    node: GraphNode<'a>,
    classes: &NodeClasses,
) -> Vec<GraphNode<'a>> {
    node.node
        .inputs
        .iter()
        .filter(|input| input.name == LORA_STACK_INPUT)
        .filter_map(|input| {
            let link_id = input.link?;
            let Some(link) = node.link(link_id) else {
                tracing::debug!(
                    "[connected_input_stackers] {} references missing link {link_id}",
                    node.key()
                );
                return None;
            };
            let Some(origin) = node.sibling(&link.origin_id) else {
                tracing::debug!(
                    "[connected_input_stackers] link {link_id} origin {} not found in graph {}",
                    link.origin_id,
                    node.graph.graph_id()
                );
                return None;
            };
            classes
                .provider_kind(origin.class_tag())
                .is_some()
                .then_some(origin)
        })
        .collect()
}

/// Every distinct active LoRA name applied at `node`, following `lora_stack` inputs
/// upstream.
#[tracing::instrument(skip_all, fields(node = %node.key()))]
pub fn collect_active_loras_from_chain(
    node: GraphNode<'_>,
    classes: &NodeClasses,
) -> BTreeSet<String> {
    let mut visited = HashSet::new();
    collect_active_loras_from_chain_with(node, classes, &mut visited)
}

/// [`collect_active_loras_from_chain`] with a caller-owned visited set. A node whose key
/// is already in `visited` contributes nothing.
pub fn collect_active_loras_from_chain_with(
    node: GraphNode<'_>,
    classes: &NodeClasses,
    visited: &mut HashSet<NodeKey>,
) -> BTreeSet<String> {
    let key = node.key();
    if visited.contains(&key) {
        tracing::debug!("[collect_active_loras_from_chain] {key} already visited");
        return BTreeSet::new();
    }
    visited.insert(key);

    let mut names = active_loras_from_node(&node, classes);
    for upstream in connected_input_stackers(node, classes) {
        names.extend(collect_active_loras_from_chain_with(upstream, classes, visited));
    }
    names
}

/// Resolve `node_ref` in `root` and collect its chain; unresolvable refs yield an empty
/// set.
pub fn collect_active_loras_for_ref(
    root: &Graph,
    node_ref: &NodeRef,
    classes: &NodeClasses,
) -> BTreeSet<String> {
    match node_from_ref(root, node_ref) {
        Some(node) => collect_active_loras_from_chain(node, classes),
        None => {
            tracing::debug!("[collect_active_loras_for_ref] {node_ref} not found");
            BTreeSet::new()
        }
    }
}

/// Nodes directly behind `node`'s output links, in output/link order, once each.
fn output_targets<'a>(node: GraphNode<'a>) -> Vec<GraphNode<'a>> {
    let mut seen = HashSet::new();
    node.node
        .outputs
        .iter()
        .flat_map(|output| output.links.iter())
        .filter_map(|&link_id| {
            let Some(link) = node.link(link_id) else {
                tracing::debug!(
                    "[output_targets] {} references missing link {link_id}",
                    node.key()
                );
                return None;
            };
            node.sibling(&link.target_id)
        })
        .filter(|target| seen.insert(target.key()))
        .collect()
}

/// Trigger-word toggle nodes fed by any of `node`'s outputs.
pub fn connected_trigger_toggle_nodes<'a>(
    node: GraphNode<'a>,
    classes: &NodeClasses,
) -> Vec<GraphNode<'a>> {
    output_targets(node)
        .into_iter()
        .filter(|target| classes.is_trigger_toggle(target.class_tag()))
        .collect()
}

/// Providers and loaders downstream of `node` whose chain includes `node`, in discovery
/// order. `node` itself is not included.
pub fn downstream_chain_nodes<'a>(
    node: GraphNode<'a>,
    classes: &NodeClasses,
) -> Vec<GraphNode<'a>> {
    let mut visited = HashSet::from([node.key()]);
    let mut found = Vec::new();
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        let targets: Vec<_> = output_targets(current)
            .into_iter()
            .filter(|target| {
                let tag = target.class_tag();
                classes.provider_kind(tag).is_some() || classes.is_loader(tag)
            })
            .filter(|target| visited.insert(target.key()))
            .collect();
        found.extend(targets.iter().copied());
        stack.extend(targets.into_iter().rev());
    }
    found
}
