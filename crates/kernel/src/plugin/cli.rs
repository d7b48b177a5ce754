//! CLI command implementations for plugin management.
//!
//! These commands operate with a minimal context (database pool plus
//! the statically registered bundles), without starting a host
//! application.

use anyhow::Result;
use sqlx::PgPool;

use pulse_plugin_api::HostContext;

use super::registry::PluginRegistry;
use super::store;

/// List registered bundles and their installed status.
pub async fn cmd_plugin_list(pool: &PgPool, registry: &PluginRegistry) -> Result<()> {
    store::ensure_table(pool).await?;
    let persisted = store::get_all(pool).await?;
    let manifests = registry.manifests();

    if manifests.is_empty() && persisted.is_empty() {
        println!("No plugins found.");
        return Ok(());
    }

    println!(
        "{:<20} {:<12} {:<14} {:<12}",
        "PLUGIN", "VERSION", "STATUS", "INTEGRATIONS"
    );
    println!("{}", "-".repeat(60));

    let mut names: Vec<&String> = manifests.keys().collect();
    names.sort_unstable();

    for name in names {
        let manifest = &manifests[name];
        let status = match persisted.iter().find(|d| &d.name == name) {
            Some(d) if d.version != manifest.version => "needs update",
            Some(_) => "installed",
            None => "not installed",
        };

        println!(
            "{:<20} {:<12} {:<14} {}",
            name,
            manifest.version,
            status,
            manifest.integrations.join(", ")
        );
    }

    // Installed plugins whose bundle is gone
    for descriptor in &persisted {
        if !manifests.contains_key(&descriptor.name) {
            println!(
                "{:<20} {:<12} {:<14} (bundle missing)",
                descriptor.name, descriptor.version, "missing"
            );
        }
    }

    Ok(())
}

/// Install a single registered bundle.
pub async fn cmd_plugin_install(
    pool: &PgPool,
    registry: &PluginRegistry,
    name: &str,
) -> Result<()> {
    store::ensure_table(pool).await?;

    let ctx = HostContext::new(pool.clone());
    registry.install_bundle(name, &ctx).await?;

    println!("Plugin '{name}' installed.");
    Ok(())
}

/// Run the update path for a single bundle.
pub async fn cmd_plugin_update(pool: &PgPool, registry: &PluginRegistry, name: &str) -> Result<()> {
    store::ensure_table(pool).await?;

    let ctx = HostContext::new(pool.clone());
    registry.update_bundle(name, &ctx).await?;

    println!("Plugin '{name}' updated.");
    Ok(())
}

/// Show (and optionally apply) the schema diff for a bundle.
///
/// Without `--apply` this only prints the statements the diff engine
/// would run, so an operator can review destructive changes first.
pub async fn cmd_plugin_diff(
    pool: &PgPool,
    registry: &PluginRegistry,
    name: &str,
    apply: bool,
) -> Result<()> {
    store::ensure_table(pool).await?;

    let (snapshot, statements) = registry.preview_diff(name).await?;
    if statements.is_empty() {
        println!("Schema for '{name}' is up to date.");
        return Ok(());
    }

    println!("Pending statements for '{name}':");
    for statement in &statements {
        println!("  {statement}");
    }

    if apply {
        // Reuse the previewed snapshot so the applied statements match
        // the ones printed above.
        registry.apply_diff(name, &snapshot).await?;
        println!("Applied {} statement(s).", statements.len());
    } else {
        println!("Re-run with --apply to execute. Review drops carefully: they destroy data.");
    }

    Ok(())
}

/// Run the uninstall hook point for an installed bundle.
///
/// Schema and descriptor record stay in place; `drop` is the
/// destructive counterpart.
pub async fn cmd_plugin_uninstall(
    pool: &PgPool,
    registry: &PluginRegistry,
    name: &str,
) -> Result<()> {
    store::ensure_table(pool).await?;

    registry.uninstall_bundle(name).await?;
    println!("Plugin '{name}' uninstalled. Schema and record kept; use `pulse plugin drop {name}` to remove them.");
    Ok(())
}

/// Drop a bundle's schema and forget it.
pub async fn cmd_plugin_drop(pool: &PgPool, registry: &PluginRegistry, name: &str) -> Result<()> {
    store::ensure_table(pool).await?;

    registry.drop_bundle(name).await?;
    println!("Plugin '{name}' dropped.");
    Ok(())
}

/// Reconcile all registered bundles against the database.
pub async fn cmd_plugin_reload(pool: &PgPool, registry: &PluginRegistry) -> Result<()> {
    let ctx = HostContext::new(pool.clone());
    let report = registry.reload(&ctx).await?;

    if report.installed.is_empty()
        && report.updated.is_empty()
        && report.reappeared.is_empty()
        && report.missing.is_empty()
    {
        println!("Nothing to do.");
        return Ok(());
    }

    for name in &report.installed {
        println!("installed: {name}");
    }
    for name in &report.updated {
        println!("updated: {name}");
    }
    for name in &report.reappeared {
        println!("reappeared (flag cleared): {name}");
    }
    for name in &report.missing {
        println!("missing bundle (flagged): {name}");
    }

    Ok(())
}
