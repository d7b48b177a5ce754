//! Plugin system for Pulse.
//!
//! This module handles:
//! - Registering plugin bundles and resolving their dependencies
//! - Persisting plugin descriptors in the `plugin` table
//! - Reconciling bundles against the database on reload
//! - CLI commands for plugin management

pub mod cli;
mod dependency;
mod error;
mod registry;
pub mod store;

pub use dependency::{check_dependencies, resolve_install_order};
pub use error::PluginError;
pub use registry::{PluginRegistry, ReloadPlan, ReloadReport, plan_reload};
