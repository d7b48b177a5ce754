//! Pulse test utilities.
//!
//! Helpers for integration testing: a recording mock schema session
//! with scripted failures, bundle doubles with observable legacy
//! hooks, and entity metadata fixtures.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use async_trait::async_trait;

use pulse_kernel::schema::{DdlStatement, SchemaError, SchemaSession};
use pulse_plugin_api::{
    ColumnDef, ColumnType, EntityDef, EntityMetadata, HostContext, IndexDef, LegacyAddonView,
    LegacyInstall, LegacyUpdate, OnDelete, PluginBundle, PluginManifest, RelationDef,
};

/// One recorded session interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCall {
    Begin,
    Execute(String),
    Commit,
    Rollback,
}

/// Recording schema session with scripted failures.
///
/// Records every call in order; `fail_execute_at(n)` makes the n-th
/// (zero-based) execute fail with the configured message, and
/// `fail_commit()` makes commit fail.
pub struct MockSession {
    calls: Vec<SessionCall>,
    fail_execute_at: Option<usize>,
    fail_commit: bool,
    failure_message: String,
    executed: usize,
}

impl Default for MockSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSession {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            fail_execute_at: None,
            fail_commit: false,
            failure_message: "injected failure".to_string(),
            executed: 0,
        }
    }

    /// Fail the n-th execute call (zero-based).
    pub fn fail_execute_at(mut self, index: usize, message: &str) -> Self {
        self.fail_execute_at = Some(index);
        self.failure_message = message.to_string();
        self
    }

    /// Fail the commit call.
    pub fn fail_commit(mut self, message: &str) -> Self {
        self.fail_commit = true;
        self.failure_message = message.to_string();
        self
    }

    /// All recorded calls, in order.
    pub fn calls(&self) -> &[SessionCall] {
        &self.calls
    }

    /// Only the executed statement strings, in order.
    pub fn executed_statements(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                SessionCall::Execute(sql) => Some(sql.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl SchemaSession for MockSession {
    async fn begin(&mut self) -> Result<(), SchemaError> {
        self.calls.push(SessionCall::Begin);
        Ok(())
    }

    async fn execute(&mut self, statement: &DdlStatement) -> Result<(), SchemaError> {
        self.calls
            .push(SessionCall::Execute(statement.as_str().to_string()));

        let index = self.executed;
        self.executed += 1;

        if self.fail_execute_at == Some(index) {
            return Err(SchemaError::Statement {
                statement: statement.as_str().to_string(),
                source: self.failure_message.clone().into(),
            });
        }

        Ok(())
    }

    async fn commit(&mut self) -> Result<(), SchemaError> {
        self.calls.push(SessionCall::Commit);

        if self.fail_commit {
            return Err(SchemaError::Transaction {
                op: "commit",
                source: self.failure_message.clone().into(),
            });
        }

        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), SchemaError> {
        self.calls.push(SessionCall::Rollback);
        Ok(())
    }
}

/// Configurable bundle double.
///
/// Legacy hooks are opt-in; when enabled, invocations are observable
/// through `install_hook_ran` / `last_update_view`.
pub struct TestBundle {
    manifest: PluginManifest,
    metadata: Option<EntityMetadata>,
    legacy: bool,
    install_hook_ran: AtomicBool,
    last_update_view: Mutex<Option<LegacyAddonView>>,
}

impl TestBundle {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            manifest: PluginManifest {
                name: name.to_string(),
                description: format!("{name} test bundle"),
                version: version.to_string(),
                author: "Pulse Contributors".to_string(),
                bundle: format!("{name}_bundle"),
                integrations: Vec::new(),
                dependencies: Vec::new(),
            },
            metadata: None,
            legacy: false,
            install_hook_ran: AtomicBool::new(false),
            last_update_view: Mutex::new(None),
        }
    }

    /// Attach entity metadata.
    pub fn with_metadata(mut self, metadata: EntityMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Opt into the legacy install/update hooks.
    pub fn with_legacy_hooks(mut self) -> Self {
        self.legacy = true;
        self
    }

    pub fn install_hook_ran(&self) -> bool {
        self.install_hook_ran.load(Ordering::SeqCst)
    }

    /// The addon view the legacy update hook last received.
    pub fn last_update_view(&self) -> Option<LegacyAddonView> {
        self.last_update_view
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
    }
}

impl PluginBundle for TestBundle {
    fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    fn entity_metadata(&self) -> Option<EntityMetadata> {
        self.metadata.clone()
    }

    fn as_legacy_install(&self) -> Option<&dyn LegacyInstall> {
        self.legacy.then_some(self as &dyn LegacyInstall)
    }

    fn as_legacy_update(&self) -> Option<&dyn LegacyUpdate> {
        self.legacy.then_some(self as &dyn LegacyUpdate)
    }
}

#[async_trait]
impl LegacyInstall for TestBundle {
    async fn on_install(&self, _ctx: &HostContext) -> Result<()> {
        self.install_hook_ran.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl LegacyUpdate for TestBundle {
    async fn on_update(&self, addon: &LegacyAddonView, _ctx: &HostContext) -> Result<()> {
        if let Ok(mut guard) = self.last_update_view.lock() {
            *guard = Some(addon.clone());
        }
        Ok(())
    }
}

/// Two-table CRM metadata with an index and a foreign key; the
/// standard fixture for lifecycle tests.
pub fn crm_metadata() -> EntityMetadata {
    let contact = EntityDef::new("crm_contact")
        .column(ColumnDef::new("id", ColumnType::BigInteger).primary_key())
        .column(ColumnDef::new("email", ColumnType::Varchar(255)))
        .index(IndexDef::new("idx_crm_contact_email", vec!["email"]).unique());

    let deal = EntityDef::new("crm_deal")
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
        );

    EntityMetadata::new(vec![contact, deal])
}

/// Single-table metadata.
pub fn mention_metadata() -> EntityMetadata {
    let mention = EntityDef::new("social_mention")
        .column(ColumnDef::new("id", ColumnType::BigInteger).primary_key())
        .column(ColumnDef::new("body", ColumnType::Text));

    EntityMetadata::new(vec![mention])
}
