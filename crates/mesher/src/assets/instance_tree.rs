//! Instance tree model
//!
//! The instance tree is the JSON scene description listing Transform and
//! Mesh nodes. Mesh nodes reference fragments (one geometry blob each) and
//! the material id every fragment is drawn with.

use serde::Deserialize;

/// Scene node type tag
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum NodeType {
    /// Grouping node; its `mtype` matrix is not applied
    Transform,
    /// Node carrying fragments
    Mesh,
    /// Any other tag, walked for its children only
    Other(String),
}

impl From<String> for NodeType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "Transform" => Self::Transform,
            "Mesh" => Self::Mesh,
            _ => Self::Other(tag),
        }
    }
}

/// One fragment reference of a Mesh node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentRef {
    /// Fragment id
    pub fragment: u64,
    /// Material id the fragment is drawn with
    pub material: u64,
    /// Polygon count, `None` when the node carries no `fragPolys` list
    pub polys: Option<u64>,
}

impl FragmentRef {
    /// False for fragments declared with zero polygons
    pub fn has_geometry(&self) -> bool {
        self.polys != Some(0)
    }
}

/// Instance tree node
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SceneNode {
    /// Node id
    pub id: u64,
    /// Type tag
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Child nodes, `null` in the source for leaves
    #[serde(default)]
    pub childs: Option<Vec<SceneNode>>,
    /// Fragment ids (Mesh nodes)
    #[serde(default)]
    pub fragments: Vec<u64>,
    /// Material id per fragment (Mesh nodes)
    #[serde(default)]
    pub materials: Vec<u64>,
    /// Polygon count per fragment (Mesh nodes)
    #[serde(default, rename = "fragPolys")]
    pub frag_polys: Option<Vec<u64>>,
    /// Matrix type tag, kept for diagnostics only
    #[serde(default)]
    pub mtype: Option<String>,
    /// Path of the node in the tree, e.g. `"3:1"`
    #[serde(default)]
    pub pathid: Option<String>,
    /// Total polygon count of the subtree
    #[serde(default)]
    pub polys: Option<u64>,
}

impl SceneNode {
    /// Child nodes (empty for leaves)
    pub fn children(&self) -> &[SceneNode] {
        self.childs.as_deref().unwrap_or_default()
    }

    /// True when the parallel fragment lists all have the same length
    pub fn has_consistent_lists(&self) -> bool {
        let len = self.fragments.len();
        self.materials.len() == len && self.frag_polys.as_ref().map_or(true, |p| p.len() == len)
    }

    /// Positionally correlated fragment references
    ///
    /// Stops at the shortest of the parallel lists.
    pub fn fragment_refs(&self) -> impl Iterator<Item = FragmentRef> + '_ {
        let polys = self.frag_polys.as_deref();
        let len = polys.map_or(usize::MAX, <[u64]>::len);

        self.fragments
            .iter()
            .zip(&self.materials)
            .take(len)
            .enumerate()
            .map(move |(i, (&fragment, &material))| FragmentRef {
                fragment,
                material,
                polys: polys.map(|p| p[i]),
            })
    }
}

/// Root of the scene description
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InstanceTree {
    /// Top level nodes
    #[serde(default)]
    pub childs: Option<Vec<SceneNode>>,
}

impl InstanceTree {
    /// Parse an instance tree document
    pub fn from_slice(contents: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(contents)
    }

    /// Top level nodes
    pub fn roots(&self) -> &[SceneNode] {
        self.childs.as_deref().unwrap_or_default()
    }

    /// Total number of nodes in the tree
    pub fn node_count(&self) -> usize {
        fn count(nodes: &[SceneNode]) -> usize {
            nodes.iter().map(|n| 1 + count(n.children())).sum()
        }
        count(self.roots())
    }
}
