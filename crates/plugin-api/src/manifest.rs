//! Parser for plugin `.info.toml` manifest files.
//!
//! Each bundle ships a `{name}.info.toml` declaring its identity:
//! - name, description, version, author, bundle id
//! - integrations the bundle provides
//! - dependencies (other plugins that must be installed first)

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Plugin metadata parsed from `.info.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PluginManifest {
    /// Plugin machine name (must match the bundle crate name suffix).
    pub name: String,

    /// Human-readable description.
    pub description: String,

    /// Semantic version (e.g., "1.0.0").
    pub version: String,

    /// Author or maintainer.
    #[serde(default)]
    pub author: String,

    /// Bundle identifier (e.g., "PulseCrmSyncBundle").
    #[serde(default)]
    pub bundle: String,

    /// Integration identifiers this bundle provides.
    #[serde(default)]
    pub integrations: Vec<String>,

    /// Other plugins this one depends on (installed first).
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl PluginManifest {
    /// Parse a manifest file from the given path.
    pub fn parse(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read plugin manifest: {}", path.display()))?;

        Self::parse_str(&content)
    }

    /// Parse a manifest from a TOML string.
    pub fn parse_str(content: &str) -> Result<Self> {
        let manifest: PluginManifest =
            toml::from_str(content).context("failed to parse plugin manifest TOML")?;

        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            anyhow::bail!("plugin manifest has empty 'name' field");
        }

        if self.version.is_empty() {
            anyhow::bail!("plugin '{}' has empty 'version' field", self.name);
        }

        Ok(())
    }
}
