use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::fmt;

new_key_type! {
    /// Identifies a registered node (connection point) in a network.
    pub struct NodeId;

    /// Identifies a segment (contiguous chain of nodes) in a network.
    pub struct SegmentId;

    /// Identifies an explicit connection between two nodes.
    pub struct ConnectionId;

    /// Identifies a leaf or branch in an [`AabbTree`](crate::aabb::AabbTree).
    pub struct ProxyId;
}

/// Opaque reference to the object that owns a node (a ship, a turret, a block).
/// Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OwnerId(pub u64);

/// Stable identity of a node: the owning object plus a `/`-delimited path
/// inside it (e.g. `"TurretBase/Barrel/Muzzle"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeIdentity {
    pub owner: OwnerId,
    pub path: String,
}

impl NodeIdentity {
    pub fn new(owner: OwnerId, path: impl Into<String>) -> Self {
        Self {
            owner,
            path: path.into(),
        }
    }

    /// Iterate over the non-empty components of the path.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').filter(|c| !c.is_empty())
    }

    /// The last path component, or the empty string for an empty path.
    pub fn leaf(&self) -> &str {
        self.components().last().unwrap_or("")
    }

    /// Identity of the parent path under the same owner, if any.
    pub fn parent(&self) -> Option<NodeIdentity> {
        let trimmed = self.path.trim_end_matches('/');
        let (parent, _) = trimmed.rsplit_once('/')?;
        Some(NodeIdentity::new(self.owner, parent))
    }

    /// Identity of a child path under the same owner.
    pub fn child(&self, name: &str) -> NodeIdentity {
        if self.path.is_empty() {
            NodeIdentity::new(self.owner, name)
        } else {
            NodeIdentity::new(self.owner, format!("{}/{}", self.path, name))
        }
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}:{}", self.owner.0, self.path)
    }
}
