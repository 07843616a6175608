//! Declarative network definitions for Conduit.
//!
//! Scenes and configs are read from RON, TOML or JSON and applied to a
//! live network by [`builder::register_definition`].

pub mod builder;
pub mod loader;
pub mod schema;

pub use builder::{DefinitionError, Registration, build_scene, load_scene, register_definition};
pub use loader::{DataLoadError, Format, deserialize_file};
pub use schema::{NetworkDefinition, SceneData};
