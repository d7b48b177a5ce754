//! Plugin system error types with clear, actionable messages.
//!
//! All errors include the plugin name and relevant context to help
//! operators quickly identify and fix issues.

use thiserror::Error;

/// Errors that can occur while registering and reconciling plugins.
#[derive(Debug, Error)]
pub enum PluginError {
    /// Two bundles registered under the same machine name.
    #[error("plugin '{plugin}': a bundle with this name is already registered")]
    DuplicateBundle { plugin: String },

    /// A plugin name that no registered bundle answers to.
    #[error("plugin '{plugin}' is not registered with this kernel")]
    UnknownPlugin { plugin: String },

    /// Install requested for a plugin that already has a record.
    #[error("plugin '{plugin}' is already installed")]
    AlreadyInstalled { plugin: String },

    /// Operation requires an installed plugin.
    #[error("plugin '{plugin}' is not installed. Run `pulse plugin install {plugin}` first")]
    NotInstalled { plugin: String },

    /// Plugin depends on another plugin that isn't installed.
    #[error(
        "plugin '{plugin}': depends on '{dependency}' which is not installed. \
         Install '{dependency}' first with: pulse plugin install {dependency}"
    )]
    MissingDependency { plugin: String, dependency: String },

    /// Circular dependency detected.
    #[error("circular dependency detected involving plugins: {cycle}")]
    CircularDependency { cycle: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_dependency_is_actionable() {
        let err = PluginError::MissingDependency {
            plugin: "crm_sync".to_string(),
            dependency: "social_monitor".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("crm_sync"));
        assert!(msg.contains("pulse plugin install social_monitor"));
    }

    #[test]
    fn not_installed_is_actionable() {
        let err = PluginError::NotInstalled {
            plugin: "crm_sync".to_string(),
        };
        assert!(err.to_string().contains("pulse plugin install crm_sync"));
    }
}
