//! [crate::nodekey] contains the identity types for nodes living in nested subgraphs.
//!
//! Local node ids are only unique inside one graph, so a node is addressed by the pair
//! `(graph_id, node_id)` ([NodeRef]) or by its string encoding `graph_id:node_id`
//! ([NodeKey]).
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use crate::{
    graph::{NodeId, ROOT_GRAPH_ID},
    LoraSyncError,
};

/// Serializes as `{"node_id": .., "graph_id": ..}`, the shape the backend expects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeRef {
    pub node_id: NodeId,
    pub graph_id: String,
}

impl NodeRef {
    pub fn new(graph_id: Option<&str>, node_id: impl Into<NodeId>) -> NodeRef {
        NodeRef {
            node_id: node_id.into(),
            graph_id: graph_id
                .filter(|id| !id.is_empty())
                .unwrap_or(ROOT_GRAPH_ID)
                .to_string(),
        }
    }

    pub fn key(&self) -> NodeKey {
        NodeKey(format!("{}:{}", self.graph_id, self.node_id))
    }
}

impl Display for NodeRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.graph_id, self.node_id)
    }
}

impl FromStr for NodeRef {
    type Err = LoraSyncError;

    /// Parse `graph_id:node_id`. The split happens at the last `:` since node ids are
    /// numeric in practice while graph ids are opaque.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (graph_id, node_id) = s.rsplit_once(':').ok_or_else(|| {
            LoraSyncError::Serialization(format!(
                "[NodeRef] '{s}' is not of the form graph_id:node_id"
            ))
        })?;
        if node_id.is_empty() {
            return Err(LoraSyncError::Serialization(format!(
                "[NodeRef] '{s}' has an empty node id"
            )));
        }
        let node_id = match node_id.parse::<NodeId>() {
            Ok(id) => id,
            Err(never) => match never {},
        };
        Ok(NodeRef::new(Some(graph_id), node_id))
    }
}

impl From<&NodeRef> for NodeKey {
    fn from(node_ref: &NodeRef) -> Self {
        node_ref.key()
    }
}

/// String-encoded [NodeRef], the element type of traversal visited sets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKey(String);

impl NodeKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_ref(&self) -> Result<NodeRef, LoraSyncError> {
        self.0.parse()
    }
}

impl Display for NodeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
