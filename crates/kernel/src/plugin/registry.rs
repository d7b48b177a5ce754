//! Plugin registry: bundle registration and reconciliation.
//!
//! The registry owns the registered bundles, decides what a reload has
//! to do (install new bundles, update version changes, flag missing
//! ones), and drives the schema lifecycle manager accordingly.
//!
//! Operations on the same plugin are serialized with an in-process
//! per-plugin mutex. Cross-process coordination (two kernels sharing a
//! database) is the deployment's responsibility.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{Context, Result};
use dashmap::DashMap;
use sqlx::PgPool;
use tokio::sync::Mutex;
use tracing::{info, warn};

use pulse_plugin_api::{HostContext, PluginBundle, PluginDescriptor, PluginManifest};

use crate::schema::{PgSession, PostgresDiffEngine, SchemaLifecycle, SchemaSnapshot};

use super::dependency::{check_dependencies, resolve_install_order};
use super::error::PluginError;
use super::store;

/// What a reload decided to do, before doing it.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReloadPlan {
    /// Bundles with no persisted record.
    pub install: Vec<String>,
    /// Bundles whose declared version differs from the record.
    pub update: Vec<String>,
    /// Flagged records whose bundle is registered again at the same
    /// version; the missing flag gets cleared.
    pub reappeared: Vec<String>,
    /// Persisted records with no registered bundle, not yet flagged.
    pub missing: Vec<String>,
}

/// Summary of an executed reload.
#[derive(Debug, Default)]
pub struct ReloadReport {
    pub installed: Vec<String>,
    pub updated: Vec<String>,
    pub reappeared: Vec<String>,
    pub missing: Vec<String>,
}

/// Registry of installable plugin bundles.
pub struct PluginRegistry {
    bundles: HashMap<String, Box<dyn PluginBundle>>,
    lifecycle: SchemaLifecycle<PostgresDiffEngine>,
    locks: DashMap<String, Arc<Mutex<()>>>,
    pool: PgPool,
}

impl PluginRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self {
            bundles: HashMap::new(),
            lifecycle: SchemaLifecycle::new(PostgresDiffEngine::new()),
            locks: DashMap::new(),
            pool,
        }
    }

    /// Register a bundle under its manifest name.
    pub fn register(&mut self, bundle: Box<dyn PluginBundle>) -> Result<(), PluginError> {
        let name = bundle.manifest().name.clone();
        if self.bundles.contains_key(&name) {
            return Err(PluginError::DuplicateBundle { plugin: name });
        }

        self.bundles.insert(name, bundle);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&dyn PluginBundle> {
        self.bundles.get(name).map(|b| b.as_ref())
    }

    pub fn bundle_count(&self) -> usize {
        self.bundles.len()
    }

    /// Manifests of all registered bundles, keyed by name.
    pub fn manifests(&self) -> HashMap<String, PluginManifest> {
        self.bundles
            .iter()
            .map(|(name, bundle)| (name.clone(), bundle.manifest().clone()))
            .collect()
    }

    fn plugin_lock(&self, name: &str) -> Arc<Mutex<()>> {
        self.locks.entry(name.to_string()).or_default().clone()
    }

    fn bundle(&self, name: &str) -> Result<&dyn PluginBundle, PluginError> {
        self.get(name).ok_or_else(|| PluginError::UnknownPlugin {
            plugin: name.to_string(),
        })
    }

    /// Reconcile registered bundles against persisted records.
    ///
    /// New bundles are installed, version changes trigger the update
    /// path, and records whose bundle disappeared are flagged missing.
    /// Bundles are processed in dependency order; the first failure
    /// aborts the reload and propagates.
    pub async fn reload(&self, ctx: &HostContext) -> Result<ReloadReport> {
        store::ensure_table(&self.pool).await?;

        let persisted: HashMap<String, PluginDescriptor> = store::get_all(&self.pool)
            .await?
            .into_iter()
            .map(|d| (d.name.clone(), d))
            .collect();

        let manifests = self.manifests();
        let order = resolve_install_order(&manifests)?;
        let plan = plan_reload(&manifests, &persisted);

        let mut report = ReloadReport::default();

        for name in &order {
            if plan.install.contains(name) {
                self.install_locked(name, ctx).await?;
                report.installed.push(name.clone());
            } else if plan.update.contains(name) {
                self.update_locked(name, ctx).await?;
                report.updated.push(name.clone());
            }
        }

        for name in &plan.reappeared {
            info!(plugin = %name, "plugin bundle reappeared; clearing missing flag");
            store::set_missing(&self.pool, name, false).await?;
            report.reappeared.push(name.clone());
        }

        for name in &plan.missing {
            warn!(plugin = %name, "installed plugin has no backing bundle");
            store::set_missing(&self.pool, name, true).await?;
            report.missing.push(name.clone());
        }

        info!(
            installed = report.installed.len(),
            updated = report.updated.len(),
            reappeared = report.reappeared.len(),
            missing = report.missing.len(),
            "plugin reload complete"
        );

        Ok(report)
    }

    /// Install one bundle: schema first, then the descriptor record.
    ///
    /// The record is only written after the schema transaction commits,
    /// so a failed install leaves no trace.
    pub async fn install_bundle(&self, name: &str, ctx: &HostContext) -> Result<()> {
        self.install_locked(name, ctx).await
    }

    async fn install_locked(&self, name: &str, ctx: &HostContext) -> Result<()> {
        let lock = self.plugin_lock(name);
        let _guard = lock.lock().await;

        // Preconditions are checked under the lock, so a concurrent
        // install of the same plugin surfaces AlreadyInstalled rather
        // than a statement conflict.
        let bundle = self.bundle(name)?;
        let installed: HashSet<String> = store::installed_names(&self.pool)
            .await?
            .into_iter()
            .collect();
        ensure_installable(bundle.manifest(), &installed)?;

        let descriptor = PluginDescriptor::from_manifest(bundle.manifest());

        let mut session = PgSession::new(self.pool.clone());
        self.lifecycle
            .install(bundle, &descriptor, &mut session, ctx)
            .await
            .with_context(|| format!("failed to install plugin '{name}'"))?;

        let id = store::insert(&self.pool, &descriptor).await?;
        info!(plugin = %name, id, version = %descriptor.version, "plugin installed");
        Ok(())
    }

    /// Run the update path for a bundle whose declared version changed.
    pub async fn update_bundle(&self, name: &str, ctx: &HostContext) -> Result<()> {
        self.update_locked(name, ctx).await
    }

    async fn update_locked(&self, name: &str, ctx: &HostContext) -> Result<()> {
        let lock = self.plugin_lock(name);
        let _guard = lock.lock().await;

        let bundle = self.bundle(name)?;
        let descriptor =
            store::get_by_name(&self.pool, name)
                .await?
                .ok_or_else(|| PluginError::NotInstalled {
                    plugin: name.to_string(),
                })?;

        self.lifecycle
            .update(bundle, &descriptor, ctx)
            .await
            .with_context(|| format!("failed to update plugin '{name}'"))?;

        store::update_version(&self.pool, name, &bundle.manifest().version).await?;
        info!(
            plugin = %name,
            from = %descriptor.version,
            to = %bundle.manifest().version,
            "plugin updated"
        );
        Ok(())
    }

    /// Compute the schema diff for one bundle without applying it.
    ///
    /// Returns the snapshot the diff was computed against alongside the
    /// statements; pass that snapshot to [`Self::apply_diff`] so what
    /// runs is exactly what was reviewed.
    pub async fn preview_diff(
        &self,
        name: &str,
    ) -> Result<(SchemaSnapshot, Vec<crate::schema::DdlStatement>)> {
        let bundle = self.bundle(name)?;
        let metadata = bundle.entity_metadata().unwrap_or_default();
        let tables: Vec<String> = metadata.table_names().iter().map(|s| s.to_string()).collect();
        let installed = SchemaSnapshot::introspect(&self.pool, &tables).await?;
        let statements = self.lifecycle.preview_diff(&metadata, &installed)?;

        Ok((installed, statements))
    }

    /// Apply the schema diff computed against a previously captured
    /// snapshot.
    ///
    /// Explicit and destructive; the CLI requires a flag to reach this.
    /// The diff engine is deterministic, so the same snapshot yields
    /// the same statements the preview showed.
    pub async fn apply_diff(&self, name: &str, installed: &SchemaSnapshot) -> Result<()> {
        let lock = self.plugin_lock(name);
        let _guard = lock.lock().await;

        let bundle = self.bundle(name)?;
        let metadata = bundle.entity_metadata().unwrap_or_default();

        let mut session = PgSession::new(self.pool.clone());
        self.lifecycle
            .compute_and_apply_diff(&metadata, installed, &mut session)
            .await
            .with_context(|| format!("failed to migrate schema for plugin '{name}'"))?;

        Ok(())
    }

    /// Invoke the uninstall stub for an installed bundle.
    ///
    /// Leaves the schema and the descriptor record in place; see
    /// [`Self::drop_bundle`] for the destructive path.
    pub async fn uninstall_bundle(&self, name: &str) -> Result<()> {
        let bundle = self.bundle(name)?;
        let descriptor =
            store::get_by_name(&self.pool, name)
                .await?
                .ok_or_else(|| PluginError::NotInstalled {
                    plugin: name.to_string(),
                })?;

        self.lifecycle.uninstall(bundle, &descriptor).await
    }

    /// Drop a bundle's schema and delete its record.
    pub async fn drop_bundle(&self, name: &str) -> Result<()> {
        let lock = self.plugin_lock(name);
        let _guard = lock.lock().await;

        let bundle = self.bundle(name)?;
        if store::get_by_name(&self.pool, name).await?.is_none() {
            return Err(PluginError::NotInstalled {
                plugin: name.to_string(),
            }
            .into());
        }

        if let Some(metadata) = bundle.entity_metadata() {
            let mut session = PgSession::new(self.pool.clone());
            self.lifecycle
                .drop_schema(&metadata, &mut session)
                .await
                .with_context(|| format!("failed to drop schema for plugin '{name}'"))?;
        }

        store::remove(&self.pool, name).await?;
        info!(plugin = %name, "plugin dropped");
        Ok(())
    }
}

/// Install preconditions, checked under the plugin lock.
fn ensure_installable(
    manifest: &PluginManifest,
    installed: &HashSet<String>,
) -> Result<(), PluginError> {
    if installed.contains(&manifest.name) {
        return Err(PluginError::AlreadyInstalled {
            plugin: manifest.name.clone(),
        });
    }
    check_dependencies(manifest, installed)
}

/// Decide what a reload has to do. Pure so it can be tested without a
/// database.
pub fn plan_reload(
    manifests: &HashMap<String, PluginManifest>,
    persisted: &HashMap<String, PluginDescriptor>,
) -> ReloadPlan {
    let mut plan = ReloadPlan::default();

    for (name, manifest) in manifests {
        match persisted.get(name) {
            None => plan.install.push(name.clone()),
            Some(descriptor) if descriptor.version != manifest.version => {
                plan.update.push(name.clone());
            }
            // Same version, but the record was flagged while the
            // bundle was gone.
            Some(descriptor) if descriptor.is_missing => {
                plan.reappeared.push(name.clone());
            }
            Some(_) => {}
        }
    }

    for (name, descriptor) in persisted {
        if !manifests.contains_key(name) && !descriptor.is_missing {
            plan.missing.push(name.clone());
        }
    }

    plan.install.sort_unstable();
    plan.update.sort_unstable();
    plan.reappeared.sort_unstable();
    plan.missing.sort_unstable();
    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(name: &str, version: &str) -> PluginManifest {
        PluginManifest {
            name: name.to_string(),
            description: format!("{name} plugin"),
            version: version.to_string(),
            author: String::new(),
            bundle: String::new(),
            integrations: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    fn descriptor(name: &str, version: &str, missing: bool) -> PluginDescriptor {
        let mut d = PluginDescriptor::from_manifest(&manifest(name, version));
        d.id = 1;
        d.is_missing = missing;
        d
    }

    #[test]
    fn plan_installs_unpersisted_bundles() {
        let manifests = HashMap::from([("crm_sync".to_string(), manifest("crm_sync", "1.0.0"))]);
        let persisted = HashMap::new();

        let plan = plan_reload(&manifests, &persisted);
        assert_eq!(plan.install, vec!["crm_sync"]);
        assert!(plan.update.is_empty());
        assert!(plan.missing.is_empty());
    }

    #[test]
    fn plan_updates_on_version_change_only() {
        let manifests = HashMap::from([
            ("crm_sync".to_string(), manifest("crm_sync", "2.0.0")),
            (
                "social_monitor".to_string(),
                manifest("social_monitor", "1.0.0"),
            ),
        ]);
        let persisted = HashMap::from([
            (
                "crm_sync".to_string(),
                descriptor("crm_sync", "1.0.0", false),
            ),
            (
                "social_monitor".to_string(),
                descriptor("social_monitor", "1.0.0", false),
            ),
        ]);

        let plan = plan_reload(&manifests, &persisted);
        assert!(plan.install.is_empty());
        assert_eq!(plan.update, vec!["crm_sync"]);
        assert!(plan.missing.is_empty());
    }

    #[test]
    fn plan_flags_records_without_bundles_once() {
        let manifests = HashMap::new();
        let persisted = HashMap::from([
            ("gone".to_string(), descriptor("gone", "1.0.0", false)),
            (
                "already_flagged".to_string(),
                descriptor("already_flagged", "1.0.0", true),
            ),
        ]);

        let plan = plan_reload(&manifests, &persisted);
        assert_eq!(plan.missing, vec!["gone"]);
    }

    #[test]
    fn plan_clears_missing_flag_when_bundle_reappears() {
        let manifests = HashMap::from([
            ("back".to_string(), manifest("back", "1.0.0")),
            ("bumped".to_string(), manifest("bumped", "2.0.0")),
        ]);
        let persisted = HashMap::from([
            ("back".to_string(), descriptor("back", "1.0.0", true)),
            ("bumped".to_string(), descriptor("bumped", "1.0.0", true)),
        ]);

        let plan = plan_reload(&manifests, &persisted);
        // Same version goes through the reappeared path; a version
        // change takes the update path, which also clears the flag.
        assert_eq!(plan.reappeared, vec!["back"]);
        assert_eq!(plan.update, vec!["bumped"]);
        assert!(plan.install.is_empty());
        assert!(plan.missing.is_empty());
    }

    #[test]
    fn install_preconditions_reject_installed_plugin() {
        let installed: HashSet<String> = ["crm_sync".to_string()].into();

        let result = ensure_installable(&manifest("crm_sync", "1.0.0"), &installed);
        assert!(matches!(
            result,
            Err(PluginError::AlreadyInstalled { .. })
        ));
    }

    #[test]
    fn install_preconditions_require_dependencies() {
        let mut m = manifest("crm_sync", "1.0.0");
        m.dependencies = vec!["social_monitor".to_string()];

        let result = ensure_installable(&m, &HashSet::new());
        assert!(matches!(
            result,
            Err(PluginError::MissingDependency { .. })
        ));

        let installed: HashSet<String> = ["social_monitor".to_string()].into();
        assert!(ensure_installable(&m, &installed).is_ok());
    }
}
