//! Pulse Plugin API
//!
//! The contract installable plugin bundles implement. Bundles declare
//! their identity in a `.info.toml` manifest, optionally describe the
//! database entities they persist, and may opt into the deprecated
//! legacy install/update hooks. The kernel consumes this crate to
//! manage the schema footprint of each bundle.

pub mod bundle;
pub mod descriptor;
pub mod manifest;
pub mod metadata;

pub use bundle::{HostContext, LegacyInstall, LegacyUpdate, PluginBundle};
pub use descriptor::{LegacyAddonView, PluginDescriptor};
pub use manifest::PluginManifest;
pub use metadata::{
    ColumnDef, ColumnType, EntityDef, EntityMetadata, IndexDef, OnDelete, RelationDef,
};
