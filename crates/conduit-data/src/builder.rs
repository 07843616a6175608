//! Applies definitions to a live network.
//!
//! [`register_definition`] is all-or-nothing. Links are checked before the
//! network is touched, so a definition the topology would reject never
//! splits or connects existing nodes. Should a link still fail once applied,
//! every node the definition created is removed again. Either way the
//! network dump is logged and the error is returned.

use std::path::Path;

use conduit_beam::{BeamKind, BeamNetwork, BeamNetworkExt};
use conduit_core::config::ConfigError;
use conduit_core::detector::StaticGeometry;
use conduit_core::id::NodeIdentity;
use conduit_core::kind::NetworkKind;
use conduit_core::network::Network;
use conduit_core::topology::TopologyError;
use tracing::{error, info, warn};

use crate::loader::{DataLoadError, deserialize_file};
use crate::schema::{NetworkDefinition, SceneData};

/// Errors from building networks out of data files.
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error(transparent)]
    Load(#[from] DataLoadError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("definition '{definition}' rejected: {source}")]
    Topology {
        definition: String,
        #[source]
        source: TopologyError,
    },
}

/// What a successful registration added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registration {
    /// Identities that did not exist before the definition was applied.
    pub created: Vec<NodeIdentity>,
    pub links: usize,
    pub detectors: usize,
}

/// Register every node, link and detector of `definition` on `network`.
///
/// Detectors with a transform are placed against the definition's own
/// geometry; the rest wait for the network's resolver.
pub fn register_definition<K: NetworkKind>(
    network: &mut Network<K>,
    definition: &NetworkDefinition,
) -> Result<Registration, DefinitionError> {
    if let Err(source) = check_links(definition) {
        return Err(reject(network, definition, source));
    }

    let mut registration = Registration::default();
    for node in &definition.nodes {
        touch(network, &mut registration.created, node.identity());
    }

    let mut failure = None;
    for link in &definition.links {
        let (from, to) = (link.from.identity(), link.to.identity());
        touch(network, &mut registration.created, from.clone());
        touch(network, &mut registration.created, to.clone());
        if let Err(err) = network.link(&from, &to, link.conn_data()) {
            failure = Some(err);
            break;
        }
    }

    if let Some(source) = failure {
        let err = reject(network, definition, source);
        for identity in registration.created.iter().rev() {
            if let Err(err) = network.remove(identity) {
                warn!(%identity, %err, "rollback could not remove node");
            }
        }
        return Err(err);
    }

    let mut geometry = StaticGeometry::new();
    for detector in &definition.detectors {
        let identity = detector.node.identity();
        touch(network, &mut registration.created, identity.clone());
        if let Some(transform) = &detector.transform {
            geometry.set(identity.clone(), transform.to_affine());
        }
        network.add_detector(&identity, detector.accepts_input, detector.provides_output);
    }
    if !definition.detectors.is_empty() {
        network.retry_detectors(&geometry);
    }

    registration.links = definition.links.len();
    registration.detectors = definition.detectors.len();
    info!(
        definition = %definition.name,
        created = registration.created.len(),
        links = registration.links,
        detectors = registration.detectors,
        "definition registered"
    );
    Ok(registration)
}

/// Reject what the topology would refuse, before anything is registered.
fn check_links(definition: &NetworkDefinition) -> Result<(), TopologyError> {
    for link in &definition.links {
        let from = link.from.identity();
        if from == link.to.identity() {
            return Err(TopologyError::SelfLink(from));
        }
    }
    Ok(())
}

fn reject<K: NetworkKind>(
    network: &Network<K>,
    definition: &NetworkDefinition,
    source: TopologyError,
) -> DefinitionError {
    error!(
        definition = %definition.name,
        %source,
        dump = %network.dump(),
        "definition rejected"
    );
    DefinitionError::Topology {
        definition: definition.name.clone(),
        source,
    }
}

fn touch<K: NetworkKind>(
    network: &mut Network<K>,
    created: &mut Vec<NodeIdentity>,
    identity: NodeIdentity,
) {
    if network.get_or_create(&identity).1 {
        created.push(identity);
    }
}

/// Queue every supply of `definition` on its node's segment.
pub fn apply_supplies(
    network: &mut BeamNetwork,
    definition: &NetworkDefinition,
) -> Result<(), DefinitionError> {
    for supply in &definition.supplies {
        let identity = supply.node.identity();
        network.get_or_create(&identity);
        let Some(segment) = network.segment_of(&identity) else {
            continue;
        };
        network
            .supply(segment, supply.amount, supply.color())
            .map_err(|source| DefinitionError::Topology {
                definition: definition.name.clone(),
                source,
            })?;
    }
    Ok(())
}

/// Build a beam network from a parsed scene.
pub fn build_scene(scene: &SceneData) -> Result<BeamNetwork, DefinitionError> {
    let mut network = Network::new(BeamKind::new(scene.beam), scene.network.clone())?;
    for definition in &scene.definitions {
        register_definition(&mut network, definition)?;
        apply_supplies(&mut network, definition)?;
    }
    Ok(network)
}

/// Read a scene file (RON, TOML or JSON) and build its network.
pub fn load_scene(path: &Path) -> Result<BeamNetwork, DefinitionError> {
    let scene: SceneData = deserialize_file(path)?;
    build_scene(&scene)
}
