//! Lookup and traversal across a graph and all of its nested subgraphs.
//!
//! Nothing here returns an error. A missing graph, node or link resolves to `None` or an
//! empty collection so that a half-loaded or malformed graph never takes the caller
//! down with it.

use std::collections::HashSet;

use super::{Graph, GraphLinkStore, GraphNode, Link, LinkId, NodeId, ROOT_GRAPH_ID};
use crate::nodekey::{NodeKey, NodeRef};

/// Id of `graph`, or [`ROOT_GRAPH_ID`] when there is no graph or it has no id.
pub fn graph_id(graph: Option<&Graph>) -> &str {
    graph.map(Graph::graph_id).unwrap_or(ROOT_GRAPH_ID)
}

/// Direct children of `graph`: entries of its subgraph container plus any
/// `definitions.subgraphs`, unwrapped, excluding entries that point back at `graph`.
pub fn child_graphs(graph: &Graph) -> Vec<&Graph> {
    let own_id = graph.graph_id();
    let definitions = graph
        .definitions
        .iter()
        .flat_map(|definitions| definitions.subgraphs.iter());
    graph
        .subgraphs
        .entries()
        .map(|entry| entry.graph())
        .chain(definitions)
        .filter(|child| child.graph_id() != own_id)
        .collect()
}

/// Depth-first pre-order walk over `root` and every graph nested below it.
///
/// Each graph id is visited at most once, so a subgraph reachable along several paths
/// is reported a single time.
pub fn traverse_graphs<'a, F>(root: &'a Graph, mut visitor: F)
where
    F: FnMut(&'a Graph),
{
    let mut visited = HashSet::new();
    traverse_graphs_with(root, &mut visitor, &mut visited);
}

/// [`traverse_graphs`] with a caller-owned visited set of graph ids.
pub fn traverse_graphs_with<'a, F>(
    root: &'a Graph,
    visitor: &mut F,
    visited: &mut HashSet<String>,
) where
    F: FnMut(&'a Graph),
{
    if !visited.insert(root.graph_id().to_string()) {
        return;
    }
    visitor(root);
    for child in child_graphs(root) {
        traverse_graphs_with(child, visitor, visited);
    }
}

/// Find the graph with id `graph_id` anywhere below `root`. An absent or empty id means
/// `root` itself.
pub fn graph_by_id<'a>(graph_id: Option<&str>, root: &'a Graph) -> Option<&'a Graph> {
    let Some(graph_id) = graph_id.filter(|id| !id.is_empty()) else {
        return Some(root);
    };
    let mut found = None;
    traverse_graphs(root, |graph| {
        if found.is_none() && graph.graph_id() == graph_id {
            found = Some(graph);
        }
    });
    found
}

/// Resolve a node by graph id and node id.
///
/// String ids that parse as integers are looked up numerically first; the raw id is
/// tried next so alphanumeric ids still resolve.
pub fn node_from_graph<'a>(
    root: &'a Graph,
    graph_id: Option<&str>,
    node_id: &NodeId,
) -> Option<GraphNode<'a>> {
    let graph = graph_by_id(graph_id, root)?;
    graph
        .graph_node(&node_id.coerced())
        .or_else(|| graph.graph_node(node_id))
}

/// Resolve a [`NodeRef`] against `root`.
pub fn node_from_ref<'a>(root: &'a Graph, node_ref: &NodeRef) -> Option<GraphNode<'a>> {
    node_from_graph(root, Some(&node_ref.graph_id), &node_ref.node_id)
}

/// Every node of every graph reachable from `root`.
pub fn all_graph_nodes(root: &Graph) -> Vec<GraphNode<'_>> {
    let mut nodes = Vec::new();
    traverse_graphs(root, |graph| {
        nodes.extend(graph.nodes.iter().map(|node| GraphNode { graph, node }));
    });
    nodes
}

pub fn node_reference(node: Option<&GraphNode<'_>>) -> Option<NodeRef> {
    node.map(GraphNode::reference)
}

pub fn node_key(node: Option<&GraphNode<'_>>) -> Option<NodeKey> {
    node.map(GraphNode::key)
}

pub fn link_from_graph(graph: Option<&Graph>, link_id: LinkId) -> Option<&Link> {
    graph?.links.get(link_id)
}
