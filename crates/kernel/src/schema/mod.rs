//! Schema lifecycle management for plugin bundles.
//!
//! This module handles:
//! - Turning declared entity metadata into ordered DDL (diff engine)
//! - Introspecting the installed schema for migration diffs
//! - Applying statement sequences all-or-nothing over a session

mod diff;
mod error;
mod lifecycle;
mod session;
mod snapshot;
mod statement;

pub use diff::{DiffEngine, PostgresDiffEngine};
pub use error::{DbError, SchemaError};
pub use lifecycle::SchemaLifecycle;
pub use session::{PgSession, SchemaSession};
pub use snapshot::{ColumnSnapshot, SchemaSnapshot, TableSnapshot};
pub use statement::DdlStatement;
