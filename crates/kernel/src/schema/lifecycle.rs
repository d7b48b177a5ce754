//! Transactional schema lifecycle manager.
//!
//! Applies, migrates, or removes the database-schema footprint of a
//! plugin bundle. Every entry point that executes DDL shares one
//! protocol: begin, execute each statement in order, commit; on any
//! failure roll back and propagate the triggering error unchanged. No
//! entry point ever leaves the schema reflecting a partial sequence.
//!
//! Serialization of concurrent operations on the same plugin is the
//! registry's job; this type holds no locks of its own.

use anyhow::Result;
use tracing::{debug, info, warn};

use pulse_plugin_api::{
    EntityMetadata, HostContext, LegacyAddonView, PluginBundle, PluginDescriptor,
};

use super::diff::DiffEngine;
use super::error::SchemaError;
use super::session::SchemaSession;
use super::snapshot::SchemaSnapshot;
use super::statement::DdlStatement;

/// Orchestrates install/update/drop of plugin schemas.
pub struct SchemaLifecycle<D: DiffEngine> {
    diff: D,
}

impl<D: DiffEngine> SchemaLifecycle<D> {
    pub fn new(diff: D) -> Self {
        Self { diff }
    }

    /// Install a bundle's schema.
    ///
    /// Invokes the deprecated install hook first when the bundle
    /// implements it, then creates the declared tables as one atomic
    /// unit. Bundles without entity metadata install without opening a
    /// transaction at all.
    pub async fn install(
        &self,
        bundle: &dyn PluginBundle,
        descriptor: &PluginDescriptor,
        session: &mut dyn SchemaSession,
        ctx: &HostContext,
    ) -> Result<()> {
        if let Some(hook) = bundle.as_legacy_install() {
            debug!(plugin = %descriptor.name, "invoking legacy install hook");
            hook.on_install(ctx).await?;
        }

        match bundle.entity_metadata() {
            Some(metadata) if !metadata.is_empty() => {
                let statements = self.diff.create_statements(&metadata)?;
                let count = statements.len();
                self.apply(session, &statements).await?;
                info!(
                    plugin = %descriptor.name,
                    tables = metadata.entities.len(),
                    statements = count,
                    "plugin schema installed"
                );
            }
            _ => {
                debug!(plugin = %descriptor.name, "no entity metadata; nothing to install");
            }
        }

        Ok(())
    }

    /// Update a bundle after its declared version changed.
    ///
    /// Invokes the deprecated update hook (with a [`LegacyAddonView`]
    /// built from the descriptor) when the bundle implements it. Never
    /// applies DDL implicitly; automatic migration is the separate,
    /// opt-in [`Self::compute_and_apply_diff`].
    pub async fn update(
        &self,
        bundle: &dyn PluginBundle,
        descriptor: &PluginDescriptor,
        ctx: &HostContext,
    ) -> Result<()> {
        if let Some(hook) = bundle.as_legacy_update() {
            debug!(plugin = %descriptor.name, "invoking legacy update hook");
            let addon = LegacyAddonView::from(descriptor);
            hook.on_update(&addon, ctx).await?;
        }

        Ok(())
    }

    /// Compute a migration from `installed` to `metadata` and apply it
    /// transactionally.
    ///
    /// Opt-in only: generated migrations may drop columns or tables,
    /// and the diff engine cannot guarantee correctness for every
    /// destructive change. Review the statements before using this in
    /// production flows.
    pub async fn compute_and_apply_diff(
        &self,
        metadata: &EntityMetadata,
        installed: &SchemaSnapshot,
        session: &mut dyn SchemaSession,
    ) -> Result<(), SchemaError> {
        warn!(
            "applying automatically generated schema diff; \
             destructive column/table drops may occur"
        );

        let statements = self.diff.diff_statements(metadata, installed)?;
        self.apply(session, &statements).await
    }

    /// Uninstall hook point.
    ///
    /// Currently a stub that always succeeds without touching the
    /// schema. Kept distinct from [`Self::drop_schema`] so pre-drop
    /// steps (data export, archival) can be added here without
    /// changing callers.
    pub async fn uninstall(
        &self,
        _bundle: &dyn PluginBundle,
        descriptor: &PluginDescriptor,
    ) -> Result<()> {
        debug!(plugin = %descriptor.name, "uninstall: no schema action taken");
        Ok(())
    }

    /// Drop the full schema for `metadata` as one atomic unit.
    pub async fn drop_schema(
        &self,
        metadata: &EntityMetadata,
        session: &mut dyn SchemaSession,
    ) -> Result<(), SchemaError> {
        let statements = self.diff.drop_statements(metadata)?;
        self.apply(session, &statements).await?;
        info!(tables = metadata.entities.len(), "plugin schema dropped");
        Ok(())
    }

    /// Preview the migration statements without applying anything.
    pub fn preview_diff(
        &self,
        metadata: &EntityMetadata,
        installed: &SchemaSnapshot,
    ) -> Result<Vec<DdlStatement>, SchemaError> {
        self.diff.diff_statements(metadata, installed)
    }

    /// Shared transactional apply.
    ///
    /// Empty sequences open no transaction; this is the documented
    /// no-op optimization for bundles without schema changes.
    async fn apply(
        &self,
        session: &mut dyn SchemaSession,
        statements: &[DdlStatement],
    ) -> Result<(), SchemaError> {
        if statements.is_empty() {
            debug!("empty statement sequence; no transaction opened");
            return Ok(());
        }

        session.begin().await?;

        for statement in statements {
            if let Err(err) = session.execute(statement).await {
                session.rollback().await?;
                return Err(err);
            }
        }

        session.commit().await
    }
}
