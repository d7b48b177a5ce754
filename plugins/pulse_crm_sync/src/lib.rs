//! CRM synchronization plugin.
//!
//! Persists synchronized contacts and deals; exercises the current
//! bundle contract (entity metadata, no legacy hooks).

use anyhow::Result;

use pulse_plugin_api::{
    ColumnDef, ColumnType, EntityDef, EntityMetadata, IndexDef, OnDelete, PluginBundle,
    PluginManifest, RelationDef,
};

/// Bundle for the CRM synchronization plugin.
pub struct CrmSyncBundle {
    manifest: PluginManifest,
}

impl CrmSyncBundle {
    pub fn new() -> Result<Self> {
        let manifest = PluginManifest::parse_str(include_str!("../crm_sync.info.toml"))?;
        Ok(Self { manifest })
    }
}

impl PluginBundle for CrmSyncBundle {
    fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    fn entity_metadata(&self) -> Option<EntityMetadata> {
        let contact = EntityDef::new("crm_contact")
            .column(ColumnDef::new("id", ColumnType::BigInteger).primary_key())
            .column(ColumnDef::new("email", ColumnType::Varchar(255)))
            .column(ColumnDef::new("first_name", ColumnType::Varchar(191)).nullable())
            .column(ColumnDef::new("last_name", ColumnType::Varchar(191)).nullable())
            .column(ColumnDef::new("score", ColumnType::Integer).default_expr("0"))
            .column(ColumnDef::new("synced_at", ColumnType::Timestamp).nullable())
            .column(ColumnDef::new("raw_payload", ColumnType::Json).nullable())
            .index(IndexDef::new("idx_crm_contact_email", vec!["email"]).unique());

        let deal = EntityDef::new("crm_deal")
            .column(ColumnDef::new("id", ColumnType::BigInteger).primary_key())
            .column(ColumnDef::new("contact_id", ColumnType::BigInteger))
            .column(ColumnDef::new("title", ColumnType::Varchar(255)))
            .column(ColumnDef::new("amount", ColumnType::Double).default_expr("0"))
            .column(ColumnDef::new("is_won", ColumnType::Boolean).default_expr("false"))
            .index(IndexDef::new("idx_crm_deal_contact", vec!["contact_id"]))
            .relation(
                RelationDef::new(
                    "fk_crm_deal_contact",
                    vec!["contact_id"],
                    "crm_contact",
                    vec!["id"],
                )
                .on_delete(OnDelete::Cascade),
            );

        Some(EntityMetadata::new(vec![contact, deal]))
    }
}
