//! Pulse kernel CLI.
//!
//! Operator entry point for plugin management: list, install, update,
//! diff, uninstall, drop, and reload.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use pulse_crm_sync::CrmSyncBundle;
use pulse_kernel::config::Config;
use pulse_kernel::db;
use pulse_kernel::plugin::{PluginRegistry, cli};
use pulse_social_monitor::SocialMonitorBundle;

#[derive(Parser)]
#[command(name = "pulse", about = "Pulse plugin management", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage installed plugins.
    Plugin {
        #[command(subcommand)]
        action: PluginAction,
    },
}

#[derive(Subcommand)]
enum PluginAction {
    /// List registered bundles and their status.
    List,
    /// Install a registered bundle.
    Install { name: String },
    /// Run the update path for a bundle.
    Update { name: String },
    /// Show (and optionally apply) the pending schema diff.
    Diff {
        name: String,
        /// Apply the statements instead of just printing them.
        #[arg(long)]
        apply: bool,
    },
    /// Run the uninstall path (keeps schema and record).
    Uninstall { name: String },
    /// Drop a bundle's schema and forget it.
    Drop { name: String },
    /// Reconcile all registered bundles against the database.
    Reload,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("failed to load configuration")?;

    let pool = db::create_pool(&config).await?;
    info!("Database connection established");

    let registry = build_registry(&config, pool.clone())?;

    match cli.command {
        Command::Plugin { action } => match action {
            PluginAction::List => cli::cmd_plugin_list(&pool, &registry).await?,
            PluginAction::Install { name } => {
                cli::cmd_plugin_install(&pool, &registry, &name).await?;
            }
            PluginAction::Update { name } => {
                cli::cmd_plugin_update(&pool, &registry, &name).await?;
            }
            PluginAction::Diff { name, apply } => {
                cli::cmd_plugin_diff(&pool, &registry, &name, apply).await?;
            }
            PluginAction::Uninstall { name } => {
                cli::cmd_plugin_uninstall(&pool, &registry, &name).await?;
            }
            PluginAction::Drop { name } => cli::cmd_plugin_drop(&pool, &registry, &name).await?,
            PluginAction::Reload => cli::cmd_plugin_reload(&pool, &registry).await?,
        },
    }

    Ok(())
}

/// Register the bundles compiled into this kernel, honoring
/// DISABLED_PLUGINS.
fn build_registry(config: &Config, pool: sqlx::PgPool) -> Result<PluginRegistry> {
    let mut registry = PluginRegistry::new(pool);

    let bundles: Vec<Box<dyn pulse_plugin_api::PluginBundle>> = vec![
        Box::new(CrmSyncBundle::new()?),
        Box::new(SocialMonitorBundle::new()?),
    ];

    for bundle in bundles {
        let name = bundle.manifest().name.clone();
        if config.disabled_plugins.contains(&name) {
            info!(plugin = %name, "skipping disabled plugin");
            continue;
        }
        registry.register(bundle)?;
    }

    Ok(registry)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
