//! Plugin descriptors and the legacy compatibility view.

use std::collections::BTreeSet;

use crate::manifest::PluginManifest;

/// Identity of an installable plugin bundle as the kernel tracks it.
///
/// Created when a bundle is first registered, updated when its declared
/// version changes. The schema lifecycle manager treats this as
/// read-only input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDescriptor {
    /// Database row id. Zero until the descriptor has been persisted.
    pub id: i64,
    pub name: String,
    pub author: String,
    pub version: String,
    /// Bundle identifier (e.g., "PulseCrmSyncBundle").
    pub bundle: String,
    pub description: String,
    /// Identifiers of third-party integrations the bundle provides.
    pub integrations: BTreeSet<String>,
    /// True when a database record references this plugin but its
    /// backing code is no longer present.
    pub is_missing: bool,
}

impl PluginDescriptor {
    /// Build a not-yet-persisted descriptor from a bundle manifest.
    pub fn from_manifest(manifest: &PluginManifest) -> Self {
        Self {
            id: 0,
            name: manifest.name.clone(),
            author: manifest.author.clone(),
            version: manifest.version.clone(),
            bundle: manifest.bundle.clone(),
            description: manifest.description.clone(),
            integrations: manifest.integrations.iter().cloned().collect(),
            is_missing: false,
        }
    }
}

/// Value object shaped for the deprecated `LegacyUpdate` hook contract.
///
/// The legacy hook predates [`PluginDescriptor`]; this view copies the
/// eight descriptor fields once at construction so the two types stay
/// decoupled. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyAddonView {
    pub id: i64,
    pub name: String,
    pub author: String,
    pub version: String,
    pub bundle: String,
    pub description: String,
    pub integrations: BTreeSet<String>,
    pub is_missing: bool,
}

impl From<&PluginDescriptor> for LegacyAddonView {
    fn from(descriptor: &PluginDescriptor) -> Self {
        Self {
            id: descriptor.id,
            name: descriptor.name.clone(),
            author: descriptor.author.clone(),
            version: descriptor.version.clone(),
            bundle: descriptor.bundle.clone(),
            description: descriptor.description.clone(),
            integrations: descriptor.integrations.clone(),
            is_missing: descriptor.is_missing,
        }
    }
}
