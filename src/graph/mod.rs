//! Typed rendition of the host editor's graph object model.
//!
//! The host hands us graphs in two shapes: the live runtime objects (`_nodes`,
//! `_subgraphs`, `comfyClass`, Map-backed `links`) and the serialized workflow JSON
//! (`nodes`, `definitions.subgraphs`, `type`, tuple-encoded `links`). Both deserialize
//! into the same [`Graph`] type; container-shape differences are absorbed by
//! [`store::LinkStore`] and [`store::SubgraphStore`].
//!
//! - [`Graph`]: one graph level (root or nested subgraph)
//! - [`Node`]: a node with its input/output slots and widgets
//! - [`GraphNode`]: a node paired with the graph that owns it
//! - [`access`]: lookup and traversal helpers that never fail

pub mod access;
pub mod store;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::{
    convert::Infallible,
    fmt::{Display, Formatter},
    ops::Deref,
    path::Path,
    str::FromStr,
};

use crate::{
    lora::{lora_entries_from_values, LoraEntry},
    nodekey::{NodeKey, NodeRef},
    LoraSyncError,
};
pub use store::{GraphLinkStore, LinkStore, SubgraphEntry, SubgraphStore};

/// Sentinel id for a graph that carries no `id` of its own.
pub const ROOT_GRAPH_ID: &str = "root";

/// Host link ids are numeric; subgraph IO links use negative ids.
pub type LinkId = i64;

/// Node ids are numeric in practice but the host tolerates alphanumeric ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeId {
    Num(i64),
    Str(String),
}

impl NodeId {
    /// Numeric form of a string id that parses cleanly, otherwise a copy of `self`.
    pub fn coerced(&self) -> NodeId {
        match self {
            NodeId::Str(s) => s.parse::<NodeId>().unwrap_or_else(|never| match never {}),
            NodeId::Num(_) => self.clone(),
        }
    }

    /// Id from a JavaScript number. Only finite integral values name a node.
    pub fn from_f64(num: f64) -> Option<NodeId> {
        if !num.is_finite() || num.fract() != 0.0 || num.abs() > i64::MAX as f64 {
            return None;
        }
        Some(NodeId::Num(num as i64))
    }
}

impl From<i64> for NodeId {
    fn from(id: i64) -> Self {
        NodeId::Num(id)
    }
}

impl From<i32> for NodeId {
    fn from(id: i32) -> Self {
        NodeId::Num(id.into())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        NodeId::Str(id)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        NodeId::Str(id.to_string())
    }
}

impl FromStr for NodeId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().parse::<i64>() {
            Ok(num) => NodeId::Num(num),
            Err(_) => NodeId::Str(s.to_string()),
        })
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeId::Num(num) => write!(f, "{num}"),
            NodeId::Str(s) => write!(f, "{s}"),
        }
    }
}

/// Treats an explicit JSON `null` the same as a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Definitions {
    #[serde(default, deserialize_with = "null_as_default")]
    pub subgraphs: Vec<Graph>,
}

/// One level of the graph hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, alias = "_nodes", deserialize_with = "null_as_default")]
    pub nodes: Vec<Node>,
    #[serde(default, alias = "_subgraphs", deserialize_with = "null_as_default")]
    pub subgraphs: SubgraphStore,
    #[serde(default, deserialize_with = "null_as_default")]
    pub links: LinkStore,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definitions: Option<Definitions>,
}

impl Graph {
    pub fn from_json(data: &str) -> Result<Graph, LoraSyncError> {
        Ok(serde_json::from_str(data)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Graph, LoraSyncError> {
        tracing::debug!("Reading workflow {:?}", path.as_ref());
        let content = std::fs::read_to_string(path)?;
        Graph::from_json(&content)
    }

    /// This graph's id, or [`ROOT_GRAPH_ID`] when it has none.
    pub fn graph_id(&self) -> &str {
        self.id.as_deref().unwrap_or(ROOT_GRAPH_ID)
    }

    /// Exact-match node lookup, the equivalent of the host's `getNodeById`.
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == *id)
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(id)
    }

    /// Pair one of this graph's nodes with the graph itself.
    pub fn graph_node<'a>(&'a self, id: &NodeId) -> Option<GraphNode<'a>> {
        self.node(id).map(|node| GraphNode { graph: self, node })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeInput {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<LinkId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeOutput {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub links: Vec<LinkId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(default, rename = "comfyClass", skip_serializing_if = "Option::is_none")]
    pub comfy_class: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub inputs: Vec<NodeInput>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub outputs: Vec<NodeOutput>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub widgets: Vec<Widget>,
    #[serde(default, rename = "lorasWidget", skip_serializing_if = "Option::is_none")]
    pub loras_widget: Option<Widget>,
    /// Positional widget values of a saved workflow, which carries no widget names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widgets_values: Option<Value>,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, class_tag: &str) -> Node {
        Node {
            id: id.into(),
            comfy_class: Some(class_tag.to_string()),
            node_type: None,
            mode: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            widgets: Vec::new(),
            loras_widget: None,
            widgets_values: None,
        }
    }

    /// The backend class tag, falling back to the serialized `type` field.
    pub fn class_tag(&self) -> Option<&str> {
        self.comfy_class.as_deref().or(self.node_type.as_deref())
    }

    /// Modes 0 (always) and 3 (on event), or no mode at all, count as active.
    pub fn is_active(&self) -> bool {
        matches!(self.mode, None | Some(0) | Some(3))
    }

    pub fn widget(&self, name: &str) -> Option<&Widget> {
        self.widgets.iter().find(|widget| widget.name == name)
    }

    /// The `lorasWidget` property if the host attached one, else the widget named `loras`.
    pub fn loras_widget(&self) -> Option<&Widget> {
        self.loras_widget.as_ref().or_else(|| self.widget("loras"))
    }

    /// The loras widget value, or for saved workflows the first positional value that
    /// looks like a list of named entries.
    fn loras_value(&self) -> Option<&Value> {
        if let Some(widget) = self.loras_widget() {
            return Some(&widget.value);
        }
        let Some(Value::Array(positional)) = &self.widgets_values else {
            return None;
        };
        positional.iter().find(|value| match value {
            Value::Array(items) => {
                !items.is_empty() && items.iter().all(|item| item.get("name").is_some())
            }
            _ => false,
        })
    }

    /// Value of the object widget `name`, or for saved workflows the first positional
    /// object that carries `field`.
    pub fn object_widget_value(&self, name: &str, field: &str) -> Option<&Value> {
        if let Some(widget) = self.widget(name) {
            return Some(&widget.value);
        }
        let Some(Value::Array(positional)) = &self.widgets_values else {
            return None;
        };
        positional
            .iter()
            .find(|value| value.as_object().is_some_and(|obj| obj.contains_key(field)))
    }

    /// Structured entries held by the loras widget. Malformed entries are skipped.
    pub fn lora_entries(&self) -> Vec<LoraEntry> {
        let Some(Value::Array(values)) = self.loras_value() else {
            return Vec::new();
        };
        lora_entries_from_values(values)
    }
}

/// A link between two nodes of the same graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "LinkRepr")]
pub struct Link {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<LinkId>,
    pub origin_id: NodeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_slot: Option<i64>,
    pub target_id: NodeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_slot: Option<i64>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub link_type: Option<Value>,
}

impl Link {
    pub fn new(id: LinkId, origin_id: impl Into<NodeId>, target_id: impl Into<NodeId>) -> Link {
        Link {
            id: Some(id),
            origin_id: origin_id.into(),
            origin_slot: None,
            target_id: target_id.into(),
            target_slot: None,
            link_type: None,
        }
    }
}

/// Serialized workflows store links as `[id, origin_id, origin_slot, target_id,
/// target_slot, type]`; runtime graphs store them as objects.
#[derive(Deserialize)]
#[serde(untagged)]
enum LinkRepr {
    Object {
        #[serde(default)]
        id: Option<LinkId>,
        origin_id: NodeId,
        #[serde(default)]
        origin_slot: Option<i64>,
        target_id: NodeId,
        #[serde(default)]
        target_slot: Option<i64>,
        #[serde(default, rename = "type")]
        link_type: Option<Value>,
    },
    Tuple(LinkId, NodeId, i64, NodeId, i64, Value),
}

impl From<LinkRepr> for Link {
    fn from(repr: LinkRepr) -> Self {
        match repr {
            LinkRepr::Object {
                id,
                origin_id,
                origin_slot,
                target_id,
                target_slot,
                link_type,
            } => Link {
                id,
                origin_id,
                origin_slot,
                target_id,
                target_slot,
                link_type,
            },
            LinkRepr::Tuple(id, origin_id, origin_slot, target_id, target_slot, link_type) => {
                Link {
                    id: Some(id),
                    origin_id,
                    origin_slot: Some(origin_slot),
                    target_id,
                    target_slot: Some(target_slot),
                    link_type: (!link_type.is_null()).then_some(link_type),
                }
            }
        }
    }
}

/// A node together with the graph that owns it.
///
/// Stands in for the host's `node.graph` back-pointer: node ids are only unique within
/// one graph, so every cross-graph operation carries both halves.
#[derive(Debug, Clone, Copy)]
pub struct GraphNode<'a> {
    pub graph: &'a Graph,
    pub node: &'a Node,
}

impl<'a> GraphNode<'a> {
    pub fn reference(&self) -> NodeRef {
        NodeRef {
            node_id: self.node.id.clone(),
            graph_id: self.graph.graph_id().to_string(),
        }
    }

    pub fn key(&self) -> NodeKey {
        self.reference().key()
    }

    /// Resolve a link id against the owning graph.
    pub fn link(&self, link_id: LinkId) -> Option<&'a Link> {
        self.graph.link(link_id)
    }

    /// Resolve a sibling node in the owning graph.
    pub fn sibling(&self, id: &NodeId) -> Option<GraphNode<'a>> {
        self.graph.graph_node(id)
    }
}

impl Deref for GraphNode<'_> {
    type Target = Node;

    fn deref(&self) -> &Self::Target {
        self.node
    }
}
