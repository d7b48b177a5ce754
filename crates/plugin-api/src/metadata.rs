//! Entity metadata declared by plugin bundles.
//!
//! A bundle that persists data describes its tables here. The kernel
//! never interprets this structure itself; it hands it to the schema
//! diff engine, which turns it into executable DDL.

use serde::{Deserialize, Serialize};

/// Ordered collection of entity definitions for one plugin bundle.
///
/// Declaration order matters: tables are created in this order and
/// dropped in reverse, so an entity may reference any entity declared
/// before it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityMetadata {
    pub entities: Vec<EntityDef>,
}

impl EntityMetadata {
    pub fn new(entities: Vec<EntityDef>) -> Self {
        Self { entities }
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Table names in declaration order.
    pub fn table_names(&self) -> Vec<&str> {
        self.entities.iter().map(|e| e.table.as_str()).collect()
    }
}

/// Structural description of one persisted entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDef {
    /// Database table name (e.g., "crm_contact").
    pub table: String,

    /// Column definitions in declaration order.
    pub columns: Vec<ColumnDef>,

    /// Secondary indexes.
    #[serde(default)]
    pub indexes: Vec<IndexDef>,

    /// Foreign-key relations to other tables.
    #[serde(default)]
    pub relations: Vec<RelationDef>,
}

impl EntityDef {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
            relations: Vec::new(),
        }
    }

    /// Add a column.
    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    /// Add an index.
    pub fn index(mut self, index: IndexDef) -> Self {
        self.indexes.push(index);
        self
    }

    /// Add a foreign-key relation.
    pub fn relation(mut self, relation: RelationDef) -> Self {
        self.relations.push(relation);
        self
    }
}

/// One column of an entity table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub ty: ColumnType,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
    /// Raw default expression (e.g., "0", "now()").
    #[serde(default)]
    pub default: Option<String>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: false,
            primary_key: false,
            default: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn default_expr(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }
}

/// Column data types supported across plugin schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    BigInteger,
    Text,
    Varchar(u32),
    Boolean,
    Timestamp,
    Double,
    Json,
    Binary,
}

/// A secondary index on an entity table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDef {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

impl IndexDef {
    pub fn new(name: impl Into<String>, columns: Vec<&str>) -> Self {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(String::from).collect(),
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// A foreign-key relation from this entity to another table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationDef {
    /// Constraint name (e.g., "fk_crm_deal_contact").
    pub name: String,
    /// Local columns, in order.
    pub columns: Vec<String>,
    /// Referenced table.
    pub ref_table: String,
    /// Referenced columns, matching `columns` positionally.
    pub ref_columns: Vec<String>,
    #[serde(default)]
    pub on_delete: OnDelete,
}

impl RelationDef {
    pub fn new(
        name: impl Into<String>,
        columns: Vec<&str>,
        ref_table: impl Into<String>,
        ref_columns: Vec<&str>,
    ) -> Self {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(String::from).collect(),
            ref_table: ref_table.into(),
            ref_columns: ref_columns.into_iter().map(String::from).collect(),
            on_delete: OnDelete::default(),
        }
    }

    pub fn on_delete(mut self, action: OnDelete) -> Self {
        self.on_delete = action;
        self
    }
}

/// Referential action when a referenced row is deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnDelete {
    #[default]
    NoAction,
    Restrict,
    Cascade,
    SetNull,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_preserves_declaration_order() {
        let entity = EntityDef::new("crm_contact")
            .column(ColumnDef::new("id", ColumnType::BigInteger).primary_key())
            .column(ColumnDef::new("email", ColumnType::Varchar(255)))
            .column(ColumnDef::new("score", ColumnType::Integer).default_expr("0"));

        let names: Vec<_> = entity.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "email", "score"]);
    }

    #[test]
    fn table_names_follow_entity_order() {
        let metadata = EntityMetadata::new(vec![
            EntityDef::new("crm_contact"),
            EntityDef::new("crm_deal"),
        ]);
        assert_eq!(metadata.table_names(), vec!["crm_contact", "crm_deal"]);
    }

    #[test]
    fn empty_metadata_reports_empty() {
        assert!(EntityMetadata::default().is_empty());
    }
}
