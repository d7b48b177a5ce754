//! The plugin bundle contract and optional legacy hooks.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::descriptor::LegacyAddonView;
use crate::manifest::PluginManifest;
use crate::metadata::EntityMetadata;

/// Execution context handed to plugin hooks.
///
/// CLI commands and tests may run with a detached context (no database
/// pool); hooks that need the database must handle its absence.
#[derive(Clone, Default)]
pub struct HostContext {
    pool: Option<PgPool>,
}

impl HostContext {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Some(pool) }
    }

    /// A context without a database pool.
    pub fn detached() -> Self {
        Self { pool: None }
    }

    pub fn pool(&self) -> Option<&PgPool> {
        self.pool.as_ref()
    }
}

/// An installable plugin bundle.
///
/// Bundles with no persisted entities keep the default
/// `entity_metadata` (None). The legacy hook accessors exist so the
/// kernel can ask "do you implement the old contract?" with a
/// type-safe query instead of probing method names; bundles opting in
/// override the accessor to return `Some(self)`.
pub trait PluginBundle: Send + Sync {
    /// The bundle's parsed `.info.toml` manifest.
    fn manifest(&self) -> &PluginManifest;

    /// Entities this bundle persists, or None for schema-less bundles.
    fn entity_metadata(&self) -> Option<EntityMetadata> {
        None
    }

    /// Deprecated install hook, if the bundle implements it.
    fn as_legacy_install(&self) -> Option<&dyn LegacyInstall> {
        None
    }

    /// Deprecated update hook, if the bundle implements it.
    fn as_legacy_update(&self) -> Option<&dyn LegacyUpdate> {
        None
    }
}

/// Deprecated install hook from the pre-descriptor plugin contract.
///
/// Absence is normal; the kernel silently skips bundles that do not
/// implement it.
#[async_trait]
pub trait LegacyInstall: Send + Sync {
    async fn on_install(&self, ctx: &HostContext) -> Result<()>;
}

/// Deprecated update hook from the pre-descriptor plugin contract.
///
/// Receives a [`LegacyAddonView`] in place of the current descriptor
/// type, preserving the shape the old contract expects.
#[async_trait]
pub trait LegacyUpdate: Send + Sync {
    async fn on_update(&self, addon: &LegacyAddonView, ctx: &HostContext) -> Result<()>;
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    struct PlainBundle {
        manifest: PluginManifest,
    }

    impl PluginBundle for PlainBundle {
        fn manifest(&self) -> &PluginManifest {
            &self.manifest
        }
    }

    #[test]
    fn defaults_report_no_capabilities() {
        let bundle = PlainBundle {
            manifest: PluginManifest::parse_str(
                "name = \"plain\"\ndescription = \"d\"\nversion = \"1.0.0\"\n",
            )
            .unwrap(),
        };

        assert!(bundle.entity_metadata().is_none());
        assert!(bundle.as_legacy_install().is_none());
        assert!(bundle.as_legacy_update().is_none());
    }

    #[test]
    fn detached_context_has_no_pool() {
        assert!(HostContext::detached().pool().is_none());
    }
}
