//! Pulse Kernel Library
//!
//! Plugin registry and transactional schema lifecycle management for
//! the Pulse marketing-automation platform. The `pulse` binary is the
//! operator-facing entry point; this library exposes the internals for
//! host applications and integration testing.

pub mod config;
pub mod db;
pub mod plugin;
pub mod schema;
