//! Social mention monitoring plugin.
//!
//! Written against the pre-descriptor plugin contract: it implements
//! the deprecated install and update hooks in addition to declaring
//! entity metadata, and serves as the reference for how legacy bundles
//! behave under the current kernel.

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use pulse_plugin_api::{
    ColumnDef, ColumnType, EntityDef, EntityMetadata, HostContext, IndexDef, LegacyAddonView,
    LegacyInstall, LegacyUpdate, PluginBundle, PluginManifest,
};

/// Bundle for the social monitoring plugin.
pub struct SocialMonitorBundle {
    manifest: PluginManifest,
}

impl SocialMonitorBundle {
    pub fn new() -> Result<Self> {
        let manifest = PluginManifest::parse_str(include_str!("../social_monitor.info.toml"))?;
        Ok(Self { manifest })
    }
}

impl PluginBundle for SocialMonitorBundle {
    fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    fn entity_metadata(&self) -> Option<EntityMetadata> {
        let mention = EntityDef::new("social_mention")
            .column(ColumnDef::new("id", ColumnType::BigInteger).primary_key())
            .column(ColumnDef::new("network", ColumnType::Varchar(64)))
            .column(ColumnDef::new("handle", ColumnType::Varchar(191)))
            .column(ColumnDef::new("body", ColumnType::Text))
            .column(ColumnDef::new("seen_at", ColumnType::Timestamp))
            .index(IndexDef::new("idx_social_mention_handle", vec![
                "network", "handle",
            ]));

        Some(EntityMetadata::new(vec![mention]))
    }

    fn as_legacy_install(&self) -> Option<&dyn LegacyInstall> {
        Some(self)
    }

    fn as_legacy_update(&self) -> Option<&dyn LegacyUpdate> {
        Some(self)
    }
}

#[async_trait]
impl LegacyInstall for SocialMonitorBundle {
    async fn on_install(&self, _ctx: &HostContext) -> Result<()> {
        // Historical behavior: warm per-network watch lists. Nothing to
        // seed until a network credential is configured.
        info!(plugin = "social_monitor", "legacy install hook ran");
        Ok(())
    }
}

#[async_trait]
impl LegacyUpdate for SocialMonitorBundle {
    async fn on_update(&self, addon: &LegacyAddonView, _ctx: &HostContext) -> Result<()> {
        info!(
            plugin = "social_monitor",
            from = %addon.version,
            "legacy update hook ran"
        );
        Ok(())
    }
}
