//! Integration test: scenes loaded from data files.
//!
//! A TOML scene describing a small plant (a generator line, a throttled
//! feeder, two docking connectors placed next to each other) is written to
//! a temporary directory, discovered by base name, built and simulated.
//! Logs go to the test writer so failures show the controller's output.

use std::fs;

use conduit_beam::BeamNetworkExt;
use conduit_core::test_utils::ident;
use conduit_core::validation::check_invariants;
use conduit_core::TopologyError;
use conduit_data::loader::require_data_file;
use conduit_data::{DefinitionError, load_scene};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .with_test_writer()
        .try_init();
}

const PLANT: &str = r#"
[network]
tick_seconds = 0.5
execution = "background"
worker_threads = 2

[beam]
smoothing = 0.2

[[definitions]]
name = "generators"

[[definitions.links]]
from = { owner = 4, path = "Gen/A" }
to = { owner = 4, path = "Gen/B" }

[[definitions.links]]
from = { owner = 4, path = "Gen/B" }
to = { owner = 4, path = "Feeder" }
max_throughput = 20.0

[[definitions.supplies]]
node = { owner = 4, path = "Gen/A" }
amount = 100.0
color = [1.0, 0.8, 0.2, 1.0]

[[definitions]]
name = "dock"
nodes = [{ owner = 5, path = "Spare" }]

[[definitions.links]]
from = { owner = 4, path = "Feeder" }
to = { owner = 5, path = "Dock/Out" }
max_throughput = 20.0

[[definitions.detectors]]
node = { owner = 5, path = "Dock/Out" }
accepts_input = false
transform = { translation = [0.0, 0.0, 0.0] }

[[definitions.detectors]]
node = { owner = 6, path = "Ship/In" }
provides_output = false
transform = { translation = [0.4, 0.0, 0.0], rotation_z = 1.5707963267948966 }
"#;

#[test]
fn plant_scene_builds_and_runs() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("plant.toml"), PLANT).unwrap();

    let path = require_data_file(dir.path(), "plant").unwrap();
    let mut net = load_scene(&path).unwrap();

    assert_eq!(net.kind().config().smoothing, 0.2);
    assert_eq!(net.config().worker_threads, Some(2));
    // Gen/A and Gen/B dissolve; everything else stands alone.
    assert_eq!(net.segment_count(), 5);
    assert_eq!(net.detectors().placed_count(), 2);
    let dock_to_ship = net
        .find_connection(&ident(5, "Dock/Out"), &ident(6, "Ship/In"))
        .expect("docking connectors linked");
    assert!(!net.connection(dock_to_ship).unwrap().data.bidirectional);

    for _ in 0..100 {
        net.update(1);
    }
    net.join_predict();

    assert!((net.total_energy() - 100.0).abs() < 1e-9);
    let ship = net.beam_state(&ident(6, "Ship/In")).unwrap();
    assert!(ship.energy > 0.0);
    assert!(net.beam_state(&ident(5, "Spare")).unwrap().energy == 0.0);
    assert!(check_invariants(&net).is_empty());
}

#[test]
fn rejected_definition_fails_the_scene() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(
        &path,
        r#"{
            "network": { "execution": "inline" },
            "definitions": [{
                "name": "loop",
                "links": [{
                    "from": { "owner": 1, "path": "Coil" },
                    "to": { "owner": 1, "path": "Coil" }
                }]
            }]
        }"#,
    )
    .unwrap();

    let err = load_scene(&path).unwrap_err();
    assert!(matches!(
        err,
        DefinitionError::Topology {
            source: TopologyError::SelfLink(_),
            ..
        }
    ));
    assert!(err.to_string().contains("loop"));
}

#[test]
fn unknown_extension_is_a_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plant.yaml");
    fs::write(&path, "network: {}").unwrap();
    assert!(matches!(load_scene(&path), Err(DefinitionError::Load(_))));
}
