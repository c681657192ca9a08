//! Container shapes for per-graph links and nested subgraphs.
//!
//! The host keeps both collections either in a `Map` or in a plain object / array, and
//! the shape is only known once the data arrives. Each shape gets its own
//! [`GraphLinkStore`] implementation; the concrete one is picked at deserialization time.

use serde::{
    de::{self, MapAccess, SeqAccess, Visitor},
    Deserialize, Deserializer, Serialize,
};
use std::{collections::BTreeMap, fmt};

use super::{Graph, Link, LinkId};

/// Uniform read access to a graph's links regardless of backing store.
pub trait GraphLinkStore {
    fn get(&self, id: LinkId) -> Option<&Link>;

    fn values(&self) -> Box<dyn Iterator<Item = &Link> + '_>;

    fn len(&self) -> usize {
        self.values().count()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl GraphLinkStore for BTreeMap<LinkId, Link> {
    fn get(&self, id: LinkId) -> Option<&Link> {
        BTreeMap::get(self, &id)
    }

    fn values(&self) -> Box<dyn Iterator<Item = &Link> + '_> {
        Box::new(BTreeMap::values(self))
    }

    fn len(&self) -> usize {
        BTreeMap::len(self)
    }
}

/// Array storage. Links that carry their own id are matched on it; id-less links are
/// addressed by array position.
impl GraphLinkStore for Vec<Option<Link>> {
    fn get(&self, id: LinkId) -> Option<&Link> {
        self.iter()
            .flatten()
            .find(|link| link.id == Some(id))
            .or_else(|| {
                let idx = usize::try_from(id).ok()?;
                self.as_slice()
                    .get(idx)
                    .and_then(Option::as_ref)
                    .filter(|link| link.id.is_none())
            })
    }

    fn values(&self) -> Box<dyn Iterator<Item = &Link> + '_> {
        Box::new(self.iter().flatten())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LinkStore {
    /// `Map` or plain object keyed by link id.
    Keyed(BTreeMap<LinkId, Link>),
    /// Array of links, possibly with holes.
    Listed(Vec<Option<Link>>),
}

impl Default for LinkStore {
    fn default() -> Self {
        LinkStore::Keyed(BTreeMap::new())
    }
}

impl LinkStore {
    fn inner(&self) -> &dyn GraphLinkStore {
        match self {
            LinkStore::Keyed(map) => map,
            LinkStore::Listed(list) => list,
        }
    }

    /// Add `link`. Keyed storage drops links without an id.
    pub fn insert(&mut self, link: Link) {
        match self {
            LinkStore::Keyed(map) => {
                if let Some(id) = link.id {
                    map.insert(id, link);
                }
            }
            LinkStore::Listed(list) => list.push(Some(link)),
        }
    }
}

impl GraphLinkStore for LinkStore {
    fn get(&self, id: LinkId) -> Option<&Link> {
        self.inner().get(id)
    }

    fn values(&self) -> Box<dyn Iterator<Item = &Link> + '_> {
        self.inner().values()
    }

    fn len(&self) -> usize {
        self.inner().len()
    }
}

impl FromIterator<Link> for LinkStore {
    /// Collects into keyed storage. Links without an id are dropped.
    fn from_iter<T: IntoIterator<Item = Link>>(iter: T) -> Self {
        LinkStore::Keyed(
            iter.into_iter()
                .filter_map(|link| link.id.map(|id| (id, link)))
                .collect(),
        )
    }
}

struct LinkStoreVisitor;

impl<'de> Visitor<'de> for LinkStoreVisitor {
    type Value = LinkStore;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map of link id to link, or an array of links")
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(LinkStore::default())
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        // Object keys arrive as strings; parse them here so the same code path serves
        // direct and buffered (untagged) deserialization.
        let mut links = BTreeMap::new();
        while let Some((key, link)) = access.next_entry::<String, Link>()? {
            let id = key.trim().parse::<LinkId>().map_err(|_| {
                de::Error::invalid_value(de::Unexpected::Str(&key), &"a numeric link id")
            })?;
            links.insert(id, link);
        }
        Ok(LinkStore::Keyed(links))
    }

    fn visit_seq<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut links = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some(link) = access.next_element::<Option<Link>>()? {
            links.push(link);
        }
        Ok(LinkStore::Listed(links))
    }
}

impl<'de> Deserialize<'de> for LinkStore {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(LinkStoreVisitor)
    }
}

/// A subgraph container entry: either the graph itself or a wrapper holding it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubgraphEntry {
    Wrapped {
        #[serde(alias = "_graph")]
        graph: Graph,
    },
    Bare(Graph),
}

impl SubgraphEntry {
    pub fn graph(&self) -> &Graph {
        match self {
            SubgraphEntry::Wrapped { graph } => graph,
            SubgraphEntry::Bare(graph) => graph,
        }
    }
}

impl From<Graph> for SubgraphEntry {
    fn from(graph: Graph) -> Self {
        SubgraphEntry::Bare(graph)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubgraphStore {
    Keyed(BTreeMap<String, SubgraphEntry>),
    Listed(Vec<SubgraphEntry>),
}

impl Default for SubgraphStore {
    fn default() -> Self {
        SubgraphStore::Keyed(BTreeMap::new())
    }
}

impl SubgraphStore {
    pub fn entries(&self) -> Box<dyn Iterator<Item = &SubgraphEntry> + '_> {
        match self {
            SubgraphStore::Keyed(map) => Box::new(map.values()),
            SubgraphStore::Listed(list) => Box::new(list.iter()),
        }
    }
}

impl FromIterator<Graph> for SubgraphStore {
    fn from_iter<T: IntoIterator<Item = Graph>>(iter: T) -> Self {
        SubgraphStore::Keyed(
            iter.into_iter()
                .map(|graph| (graph.graph_id().to_string(), SubgraphEntry::from(graph)))
                .collect(),
        )
    }
}
