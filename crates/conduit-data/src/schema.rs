//! Serde structs for network definition files.
//!
//! A scene file holds controller and beam tunables plus any number of
//! network definitions. Each definition names nodes, links between them,
//! auto-linking detectors with optional placement, and initial supplies.

use conduit_beam::{BeamConfig, Color};
use conduit_core::aabb::{Affine, Vec3};
use conduit_core::config::NetworkConfig;
use conduit_core::connection::{ConnData, IDENTITY_FILTER};
use conduit_core::id::{NodeIdentity, OwnerId};
use serde::Deserialize;

fn default_true() -> bool {
    true
}

fn default_scale() -> [f64; 3] {
    [1.0; 3]
}

// ===========================================================================
// Nodes
// ===========================================================================

/// A node identity as written in a data file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct NodeRef {
    pub owner: u64,
    pub path: String,
}

impl NodeRef {
    pub fn identity(&self) -> NodeIdentity {
        NodeIdentity::new(OwnerId(self.owner), self.path.clone())
    }
}

// ===========================================================================
// Links
// ===========================================================================

/// A link between two nodes. Omitted throughput means unlimited; omitted
/// filter means identity.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkData {
    pub from: NodeRef,
    pub to: NodeRef,
    #[serde(default)]
    pub max_throughput: Option<f64>,
    #[serde(default)]
    pub filter: Option<[f64; 4]>,
    #[serde(default = "default_true")]
    pub bidirectional: bool,
}

impl LinkData {
    pub fn conn_data(&self) -> ConnData {
        let base = match self.max_throughput {
            Some(limit) => ConnData::limited(limit),
            None => ConnData::lossless(),
        };
        base.with_filter(self.filter.unwrap_or(IDENTITY_FILTER))
            .with_bidirectional(self.bidirectional)
    }
}

// ===========================================================================
// Detectors
// ===========================================================================

/// Placement of a connector in world space.
#[derive(Debug, Clone, Deserialize)]
pub struct TransformData {
    pub translation: [f64; 3],
    /// Rotation about the z axis, in radians.
    #[serde(default)]
    pub rotation_z: f64,
    #[serde(default = "default_scale")]
    pub scale: [f64; 3],
}

impl TransformData {
    /// Scale, then rotate, then translate.
    pub fn to_affine(&self) -> Affine {
        let [sx, sy, sz] = self.scale;
        let [tx, ty, tz] = self.translation;
        Affine::from_translation(Vec3::new(tx, ty, tz))
            .then_apply(&Affine::from_rotation_z(self.rotation_z))
            .then_apply(&Affine::from_scale(Vec3::new(sx, sy, sz)))
    }
}

/// An auto-linking connector.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectorData {
    pub node: NodeRef,
    #[serde(default = "default_true")]
    pub accepts_input: bool,
    #[serde(default = "default_true")]
    pub provides_output: bool,
    /// Known placement. Without one the detector waits for a resolver.
    #[serde(default)]
    pub transform: Option<TransformData>,
}

// ===========================================================================
// Supplies
// ===========================================================================

/// Energy injected into a node's segment when the scene is built.
/// Negative amounts draw.
#[derive(Debug, Clone, Deserialize)]
pub struct SupplyData {
    pub node: NodeRef,
    pub amount: f64,
    #[serde(default)]
    pub color: Option<[f64; 4]>,
}

impl SupplyData {
    pub fn color(&self) -> Color {
        self.color.map(Color).unwrap_or(Color::WHITE)
    }
}

// ===========================================================================
// Definitions and scenes
// ===========================================================================

/// One group of nodes and links registered together. Either all of it is
/// applied or none of it is.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkDefinition {
    #[serde(default)]
    pub name: String,
    /// Nodes registered even if no link mentions them.
    #[serde(default)]
    pub nodes: Vec<NodeRef>,
    #[serde(default)]
    pub links: Vec<LinkData>,
    #[serde(default)]
    pub detectors: Vec<DetectorData>,
    #[serde(default)]
    pub supplies: Vec<SupplyData>,
}

/// A complete scene file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SceneData {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub beam: BeamConfig,
    #[serde(default)]
    pub definitions: Vec<NetworkDefinition>,
}
