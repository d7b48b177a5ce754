//! Snapshot of the schema as currently installed.
//!
//! Used only by the explicit diff path: the lifecycle manager compares
//! a snapshot of the plugin's installed tables against its declared
//! metadata to compute a migration.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use tracing::debug;

use pulse_plugin_api::ColumnType;

/// Installed state of a set of tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaSnapshot {
    pub tables: BTreeMap<String, TableSnapshot>,
}

/// Installed state of one table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableSnapshot {
    pub columns: BTreeMap<String, ColumnSnapshot>,
    pub indexes: BTreeSet<String>,
}

/// Installed state of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSnapshot {
    pub ty: ColumnType,
    pub nullable: bool,
}

impl ColumnSnapshot {
    pub fn new(ty: ColumnType, nullable: bool) -> Self {
        Self { ty, nullable }
    }
}

impl SchemaSnapshot {
    /// Access (or create) the snapshot entry for a table.
    pub fn table(&mut self, name: &str) -> &mut TableSnapshot {
        self.tables.entry(name.to_string()).or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Read the installed state of the named tables from the database.
    ///
    /// Tables that do not exist simply do not appear in the snapshot;
    /// the diff engine will generate creates for them.
    pub async fn introspect(pool: &PgPool, table_names: &[String]) -> Result<Self> {
        let mut snapshot = Self::default();

        let names: Vec<String> = table_names.to_vec();
        let columns = sqlx::query(
            "SELECT table_name, column_name, data_type, is_nullable, character_maximum_length \
             FROM information_schema.columns \
             WHERE table_schema = 'public' AND table_name = ANY($1) \
             ORDER BY table_name, ordinal_position",
        )
        .bind(&names)
        .fetch_all(pool)
        .await
        .context("failed to introspect table columns")?;

        for row in &columns {
            let table: String = row.get("table_name");
            let column: String = row.get("column_name");
            let data_type: String = row.get("data_type");
            let is_nullable: String = row.get("is_nullable");
            let max_length: Option<i32> = row.get("character_maximum_length");

            let ty = map_pg_type(&data_type, max_length).with_context(|| {
                format!("unsupported column type '{data_type}' on {table}.{column}")
            })?;

            snapshot
                .table(&table)
                .columns
                .insert(column, ColumnSnapshot::new(ty, is_nullable == "YES"));
        }

        let indexes = sqlx::query(
            "SELECT tablename, indexname FROM pg_indexes \
             WHERE schemaname = 'public' AND tablename = ANY($1)",
        )
        .bind(&names)
        .fetch_all(pool)
        .await
        .context("failed to introspect indexes")?;

        for row in &indexes {
            let table: String = row.get("tablename");
            let index: String = row.get("indexname");
            // Only attach indexes to tables we saw columns for.
            if let Some(entry) = snapshot.tables.get_mut(&table) {
                entry.indexes.insert(index);
            }
        }

        debug!(tables = snapshot.tables.len(), "schema snapshot built");
        Ok(snapshot)
    }
}

impl TableSnapshot {
    /// Record a column, builder-style.
    pub fn column(&mut self, name: &str, snapshot: ColumnSnapshot) -> &mut Self {
        self.columns.insert(name.to_string(), snapshot);
        self
    }

    /// Record an index name, builder-style.
    pub fn index(&mut self, name: &str) -> &mut Self {
        self.indexes.insert(name.to_string());
        self
    }
}

/// Map an `information_schema` type name to the metadata column type.
fn map_pg_type(data_type: &str, max_length: Option<i32>) -> Option<ColumnType> {
    match data_type {
        "integer" => Some(ColumnType::Integer),
        "bigint" => Some(ColumnType::BigInteger),
        "text" => Some(ColumnType::Text),
        "character varying" => {
            let len = max_length.and_then(|l| u32::try_from(l).ok()).unwrap_or(255);
            Some(ColumnType::Varchar(len))
        }
        "boolean" => Some(ColumnType::Boolean),
        "timestamp without time zone" | "timestamp with time zone" => Some(ColumnType::Timestamp),
        "double precision" => Some(ColumnType::Double),
        "json" | "jsonb" => Some(ColumnType::Json),
        "bytea" => Some(ColumnType::Binary),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_common_postgres_types() {
        assert_eq!(map_pg_type("integer", None), Some(ColumnType::Integer));
        assert_eq!(map_pg_type("bigint", None), Some(ColumnType::BigInteger));
        assert_eq!(
            map_pg_type("character varying", Some(64)),
            Some(ColumnType::Varchar(64))
        );
        assert_eq!(
            map_pg_type("timestamp with time zone", None),
            Some(ColumnType::Timestamp)
        );
        assert_eq!(map_pg_type("jsonb", None), Some(ColumnType::Json));
        assert_eq!(map_pg_type("tsvector", None), None);
    }

    #[test]
    fn builder_populates_tables() {
        let mut snapshot = SchemaSnapshot::default();
        snapshot
            .table("crm_contact")
            .column("id", ColumnSnapshot::new(ColumnType::BigInteger, false))
            .index("crm_contact_pkey");

        assert!(!snapshot.is_empty());
        let table = &snapshot.tables["crm_contact"];
        assert!(table.columns.contains_key("id"));
        assert!(table.indexes.contains("crm_contact_pkey"));
    }
}
