//! Schema diff engine: entity metadata in, ordered DDL out.
//!
//! Statement generation is pure and deterministic; nothing here touches
//! the database. SQL strings are built with SeaQuery against the
//! Postgres backend.

use sea_query::{
    Alias, ColumnDef as SqlColumnDef, Expr, ForeignKey, ForeignKeyAction, Index,
    PostgresQueryBuilder, Table,
};

use pulse_plugin_api::{ColumnDef, ColumnType, EntityDef, EntityMetadata, OnDelete, RelationDef};

use super::error::SchemaError;
use super::snapshot::{SchemaSnapshot, TableSnapshot};
use super::statement::DdlStatement;

/// Computes the DDL statement sequences the lifecycle manager applies.
///
/// Treated as a pure function of its inputs: for a given metadata (and
/// snapshot, for diffs) the same ordered sequence is always produced.
pub trait DiffEngine: Send + Sync {
    /// Statements that create the full schema for `metadata`.
    fn create_statements(
        &self,
        metadata: &EntityMetadata,
    ) -> Result<Vec<DdlStatement>, SchemaError>;

    /// Statements that migrate `installed` to the schema `metadata`
    /// implies. May include destructive column and table drops.
    fn diff_statements(
        &self,
        metadata: &EntityMetadata,
        installed: &SchemaSnapshot,
    ) -> Result<Vec<DdlStatement>, SchemaError>;

    /// Statements that drop the full schema for `metadata`.
    fn drop_statements(&self, metadata: &EntityMetadata) -> Result<Vec<DdlStatement>, SchemaError>;
}

/// SeaQuery-backed diff engine targeting PostgreSQL.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresDiffEngine;

impl PostgresDiffEngine {
    pub fn new() -> Self {
        Self
    }
}

impl DiffEngine for PostgresDiffEngine {
    fn create_statements(
        &self,
        metadata: &EntityMetadata,
    ) -> Result<Vec<DdlStatement>, SchemaError> {
        validate(metadata)?;

        let mut statements = Vec::new();

        // Tables first, in declaration order, then indexes, then foreign
        // keys, so intra-plugin references always resolve.
        for entity in &metadata.entities {
            statements.push(create_table(entity));
        }
        for entity in &metadata.entities {
            for index in &entity.indexes {
                statements.push(create_index(&entity.table, index));
            }
        }
        for entity in &metadata.entities {
            for relation in &entity.relations {
                statements.push(create_foreign_key(&entity.table, relation));
            }
        }

        Ok(statements)
    }

    fn diff_statements(
        &self,
        metadata: &EntityMetadata,
        installed: &SchemaSnapshot,
    ) -> Result<Vec<DdlStatement>, SchemaError> {
        validate(metadata)?;

        let mut statements = Vec::new();
        let mut new_entities = Vec::new();

        for entity in &metadata.entities {
            match installed.tables.get(&entity.table) {
                None => {
                    statements.push(create_table(entity));
                    new_entities.push(entity);
                }
                Some(table) => {
                    alter_table(entity, table, &mut statements);
                }
            }
        }

        // Indexes and foreign keys for freshly created tables.
        for entity in &new_entities {
            for index in &entity.indexes {
                statements.push(create_index(&entity.table, index));
            }
        }
        for entity in &new_entities {
            for relation in &entity.relations {
                statements.push(create_foreign_key(&entity.table, relation));
            }
        }

        // Tables installed but no longer declared. Destructive; the
        // lifecycle manager only reaches this path when explicitly
        // invoked.
        let declared: Vec<&str> = metadata.table_names();
        for table in installed.tables.keys() {
            if !declared.contains(&table.as_str()) {
                statements.push(drop_table(table));
            }
        }

        Ok(statements)
    }

    fn drop_statements(&self, metadata: &EntityMetadata) -> Result<Vec<DdlStatement>, SchemaError> {
        validate(metadata)?;

        let mut statements = Vec::new();

        // Constraints first, then tables in reverse declaration order,
        // mirroring create_statements.
        for entity in metadata.entities.iter().rev() {
            for relation in &entity.relations {
                statements.push(DdlStatement::new(
                    ForeignKey::drop()
                        .name(&relation.name)
                        .table(Alias::new(&entity.table))
                        .to_string(PostgresQueryBuilder),
                ));
            }
        }
        for entity in metadata.entities.iter().rev() {
            statements.push(drop_table(&entity.table));
        }

        Ok(statements)
    }
}

/// Reject metadata the builders cannot express.
fn validate(metadata: &EntityMetadata) -> Result<(), SchemaError> {
    let mut seen = Vec::new();

    for entity in &metadata.entities {
        if entity.table.is_empty() {
            return Err(SchemaError::Diff {
                details: "entity with empty table name".to_string(),
            });
        }
        if entity.columns.is_empty() {
            return Err(SchemaError::Diff {
                details: format!("table '{}' declares no columns", entity.table),
            });
        }
        if seen.contains(&entity.table.as_str()) {
            return Err(SchemaError::Diff {
                details: format!("duplicate table name '{}'", entity.table),
            });
        }
        seen.push(entity.table.as_str());

        for relation in &entity.relations {
            if relation.columns.len() != relation.ref_columns.len() {
                return Err(SchemaError::Diff {
                    details: format!(
                        "relation '{}' on '{}' has mismatched column counts",
                        relation.name, entity.table
                    ),
                });
            }
        }
    }

    Ok(())
}

fn create_table(entity: &EntityDef) -> DdlStatement {
    let mut stmt = Table::create();
    stmt.table(Alias::new(&entity.table));

    let pk_columns: Vec<&str> = entity
        .columns
        .iter()
        .filter(|c| c.primary_key)
        .map(|c| c.name.as_str())
        .collect();

    for column in &entity.columns {
        let mut def = sql_column(column);
        // Single-column keys inline; composite keys as a table-level
        // constraint below.
        if column.primary_key && pk_columns.len() == 1 {
            def.primary_key();
        }
        stmt.col(&mut def);
    }

    if pk_columns.len() > 1 {
        let mut pk = Index::create();
        for name in &pk_columns {
            pk.col(Alias::new(*name));
        }
        stmt.primary_key(&mut pk);
    }

    DdlStatement::new(stmt.to_string(PostgresQueryBuilder))
}

fn sql_column(column: &ColumnDef) -> SqlColumnDef {
    let mut def = SqlColumnDef::new(Alias::new(&column.name));

    match column.ty {
        ColumnType::Integer => def.integer(),
        ColumnType::BigInteger => def.big_integer(),
        ColumnType::Text => def.text(),
        ColumnType::Varchar(len) => def.string_len(len),
        ColumnType::Boolean => def.boolean(),
        ColumnType::Timestamp => def.timestamp(),
        ColumnType::Double => def.double(),
        ColumnType::Json => def.json_binary(),
        ColumnType::Binary => def.binary(),
    };

    if !column.nullable {
        def.not_null();
    }
    if let Some(expr) = &column.default {
        def.default(Expr::cust(expr.as_str()));
    }

    def
}

fn create_index(table: &str, index: &pulse_plugin_api::IndexDef) -> DdlStatement {
    let mut stmt = Index::create();
    stmt.name(&index.name).table(Alias::new(table));
    for column in &index.columns {
        stmt.col(Alias::new(column));
    }
    if index.unique {
        stmt.unique();
    }

    DdlStatement::new(stmt.to_string(PostgresQueryBuilder))
}

fn create_foreign_key(table: &str, relation: &RelationDef) -> DdlStatement {
    let mut stmt = ForeignKey::create();
    stmt.name(&relation.name)
        .from_tbl(Alias::new(table))
        .to_tbl(Alias::new(&relation.ref_table))
        .on_delete(fk_action(relation.on_delete));
    for column in &relation.columns {
        stmt.from_col(Alias::new(column));
    }
    for column in &relation.ref_columns {
        stmt.to_col(Alias::new(column));
    }

    DdlStatement::new(stmt.to_string(PostgresQueryBuilder))
}

fn fk_action(action: OnDelete) -> ForeignKeyAction {
    match action {
        OnDelete::NoAction => ForeignKeyAction::NoAction,
        OnDelete::Restrict => ForeignKeyAction::Restrict,
        OnDelete::Cascade => ForeignKeyAction::Cascade,
        OnDelete::SetNull => ForeignKeyAction::SetNull,
    }
}

fn drop_table(table: &str) -> DdlStatement {
    DdlStatement::new(
        Table::drop()
            .table(Alias::new(table))
            .to_string(PostgresQueryBuilder),
    )
}

/// Emit ALTERs bringing an installed table in line with its entity
/// definition: added, modified, and dropped columns, then index churn.
fn alter_table(entity: &EntityDef, installed: &TableSnapshot, statements: &mut Vec<DdlStatement>) {
    for column in &entity.columns {
        match installed.columns.get(&column.name) {
            None => {
                let mut stmt = Table::alter();
                stmt.table(Alias::new(&entity.table));
                let mut def = sql_column(column);
                stmt.add_column(&mut def);
                statements.push(DdlStatement::new(stmt.to_string(PostgresQueryBuilder)));
            }
            Some(snap) if snap.ty != column.ty || snap.nullable != column.nullable => {
                let mut stmt = Table::alter();
                stmt.table(Alias::new(&entity.table));
                let mut def = sql_column(column);
                stmt.modify_column(&mut def);
                statements.push(DdlStatement::new(stmt.to_string(PostgresQueryBuilder)));
            }
            Some(_) => {}
        }
    }

    let declared: Vec<&str> = entity.columns.iter().map(|c| c.name.as_str()).collect();
    for name in installed.columns.keys() {
        if !declared.contains(&name.as_str()) {
            let mut stmt = Table::alter();
            stmt.table(Alias::new(&entity.table));
            stmt.drop_column(Alias::new(name));
            statements.push(DdlStatement::new(stmt.to_string(PostgresQueryBuilder)));
        }
    }

    for index in &entity.indexes {
        if !installed.indexes.contains(&index.name) {
            statements.push(create_index(&entity.table, index));
        }
    }

    let declared_indexes: Vec<&str> = entity.indexes.iter().map(|i| i.name.as_str()).collect();
    for name in &installed.indexes {
        // Primary-key indexes are managed by the table definition, not
        // the index diff.
        if name.ends_with("_pkey") {
            continue;
        }
        if !declared_indexes.contains(&name.as_str()) {
            statements.push(DdlStatement::new(
                Index::drop()
                    .name(name)
                    .table(Alias::new(&entity.table))
                    .to_string(PostgresQueryBuilder),
            ));
        }
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::schema::snapshot::ColumnSnapshot;
    use pulse_plugin_api::IndexDef;

    fn contact_entity() -> EntityDef {
        EntityDef::new("crm_contact")
            .column(ColumnDef::new("id", ColumnType::BigInteger).primary_key())
            .column(ColumnDef::new("email", ColumnType::Varchar(255)))
            .column(ColumnDef::new("score", ColumnType::Integer).default_expr("0"))
            .index(IndexDef::new("idx_crm_contact_email", vec!["email"]).unique())
    }

    fn deal_entity() -> EntityDef {
        EntityDef::new("crm_deal")
            .column(ColumnDef::new("id", ColumnType::BigInteger).primary_key())
            .column(ColumnDef::new("contact_id", ColumnType::BigInteger))
            .relation(
                RelationDef::new(
                    "fk_crm_deal_contact",
                    vec!["contact_id"],
                    "crm_contact",
                    vec!["id"],
                )
                .on_delete(OnDelete::Cascade),
            )
    }

    fn crm_metadata() -> EntityMetadata {
        EntityMetadata::new(vec![contact_entity(), deal_entity()])
    }

    #[test]
    fn create_orders_tables_indexes_then_foreign_keys() {
        let statements = PostgresDiffEngine::new()
            .create_statements(&crm_metadata())
            .unwrap();

        let sql: Vec<&str> = statements.iter().map(|s| s.as_str()).collect();
        assert_eq!(sql.len(), 4);
        assert!(sql[0].starts_with("CREATE TABLE"));
        assert!(sql[0].contains("crm_contact"));
        assert!(sql[1].starts_with("CREATE TABLE"));
        assert!(sql[1].contains("crm_deal"));
        assert!(sql[2].contains("UNIQUE INDEX"));
        assert!(sql[3].contains("FOREIGN KEY"));
        assert!(sql[3].contains("ON DELETE CASCADE"));
    }

    #[test]
    fn drop_reverses_declaration_order() {
        let statements = PostgresDiffEngine::new()
            .drop_statements(&crm_metadata())
            .unwrap();

        let sql: Vec<&str> = statements.iter().map(|s| s.as_str()).collect();
        assert_eq!(sql.len(), 3);
        assert!(sql[0].contains("DROP CONSTRAINT"));
        assert!(sql[0].contains("fk_crm_deal_contact"));
        assert!(sql[1].starts_with("DROP TABLE"));
        assert!(sql[1].contains("crm_deal"));
        assert!(sql[2].contains("crm_contact"));
    }

    #[test]
    fn diff_creates_missing_table_and_adds_column() {
        let mut installed = SchemaSnapshot::default();
        installed
            .table("crm_contact")
            .column("id", ColumnSnapshot::new(ColumnType::BigInteger, false))
            .column("email", ColumnSnapshot::new(ColumnType::Varchar(255), false))
            .index("idx_crm_contact_email")
            .index("crm_contact_pkey");

        let statements = PostgresDiffEngine::new()
            .diff_statements(&crm_metadata(), &installed)
            .unwrap();
        let sql: Vec<&str> = statements.iter().map(|s| s.as_str()).collect();

        // "score" column is new on the installed table, crm_deal is new
        // entirely, and nothing is dropped.
        assert!(
            sql.iter()
                .any(|s| s.contains("ADD COLUMN") && s.contains("score"))
        );
        assert!(
            sql.iter()
                .any(|s| s.starts_with("CREATE TABLE") && s.contains("crm_deal"))
        );
        assert!(sql.iter().any(|s| s.contains("FOREIGN KEY")));
        assert!(!sql.iter().any(|s| s.contains("DROP")));
    }

    #[test]
    fn diff_drops_undeclared_table_and_column() {
        let mut installed = SchemaSnapshot::default();
        installed
            .table("crm_contact")
            .column("id", ColumnSnapshot::new(ColumnType::BigInteger, false))
            .column("email", ColumnSnapshot::new(ColumnType::Varchar(255), false))
            .column("score", ColumnSnapshot::new(ColumnType::Integer, false))
            .column("legacy_notes", ColumnSnapshot::new(ColumnType::Text, true))
            .index("idx_crm_contact_email");
        installed
            .table("crm_abandoned")
            .column("id", ColumnSnapshot::new(ColumnType::BigInteger, false));

        let metadata = EntityMetadata::new(vec![contact_entity()]);
        let statements = PostgresDiffEngine::new()
            .diff_statements(&metadata, &installed)
            .unwrap();
        let sql: Vec<&str> = statements.iter().map(|s| s.as_str()).collect();

        assert!(
            sql.iter()
                .any(|s| s.contains("DROP COLUMN") && s.contains("legacy_notes"))
        );
        assert!(
            sql.iter()
                .any(|s| s.starts_with("DROP TABLE") && s.contains("crm_abandoned"))
        );
    }

    #[test]
    fn diff_ignores_primary_key_index() {
        let mut installed = SchemaSnapshot::default();
        installed
            .table("crm_contact")
            .column("id", ColumnSnapshot::new(ColumnType::BigInteger, false))
            .column("email", ColumnSnapshot::new(ColumnType::Varchar(255), false))
            .column("score", ColumnSnapshot::new(ColumnType::Integer, false))
            .index("idx_crm_contact_email")
            .index("crm_contact_pkey");

        let metadata = EntityMetadata::new(vec![contact_entity()]);
        let statements = PostgresDiffEngine::new()
            .diff_statements(&metadata, &installed)
            .unwrap();

        assert!(statements.is_empty(), "unexpected: {statements:?}");
    }

    #[test]
    fn rejects_table_without_columns() {
        let metadata = EntityMetadata::new(vec![EntityDef::new("empty_table")]);
        let result = PostgresDiffEngine::new().create_statements(&metadata);

        let err = match result {
            Err(e) => e,
            Ok(_) => panic!("expected Diff error"),
        };
        assert!(matches!(err, SchemaError::Diff { .. }));
        assert!(err.to_string().contains("empty_table"));
    }

    #[test]
    fn rejects_duplicate_table_names() {
        let metadata = EntityMetadata::new(vec![contact_entity(), contact_entity()]);
        let result = PostgresDiffEngine::new().create_statements(&metadata);

        assert!(matches!(result, Err(SchemaError::Diff { .. })));
    }

    #[test]
    fn composite_primary_key_becomes_table_constraint() {
        let entity = EntityDef::new("crm_contact_tag")
            .column(ColumnDef::new("contact_id", ColumnType::BigInteger).primary_key())
            .column(ColumnDef::new("tag_id", ColumnType::BigInteger).primary_key());
        let metadata = EntityMetadata::new(vec![entity]);

        let statements = PostgresDiffEngine::new()
            .create_statements(&metadata)
            .unwrap();
        let sql = statements[0].as_str();
        assert!(sql.contains("PRIMARY KEY"));
        assert!(sql.contains("contact_id"));
        assert!(sql.contains("tag_id"));
    }
}
