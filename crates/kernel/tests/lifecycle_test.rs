//! Schema lifecycle integration tests.
//!
//! Exercises install/update/diff/drop against a recording mock session
//! so transactional behavior is observable without a database.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use pulse_kernel::schema::{
    ColumnSnapshot, PostgresDiffEngine, SchemaError, SchemaLifecycle, SchemaSnapshot,
};
use pulse_plugin_api::{HostContext, PluginBundle, PluginDescriptor};
use pulse_test_utils::{MockSession, SessionCall, TestBundle, crm_metadata, mention_metadata};

fn lifecycle() -> SchemaLifecycle<PostgresDiffEngine> {
    SchemaLifecycle::new(PostgresDiffEngine)
}

fn descriptor_for(bundle: &TestBundle) -> PluginDescriptor {
    PluginDescriptor::from_manifest(bundle.manifest())
}

#[tokio::test]
async fn install_applies_all_statements_in_one_transaction() {
    let bundle = TestBundle::new("crm_sync", "2.1.0").with_metadata(crm_metadata());
    let descriptor = descriptor_for(&bundle);
    let mut session = MockSession::new();

    lifecycle()
        .install(&bundle, &descriptor, &mut session, &HostContext::detached())
        .await
        .unwrap();

    let calls = session.calls();
    assert_eq!(calls.first(), Some(&SessionCall::Begin));
    assert_eq!(calls.last(), Some(&SessionCall::Commit));
    assert_eq!(
        calls
            .iter()
            .filter(|c| matches!(c, SessionCall::Begin))
            .count(),
        1
    );
    assert!(!calls.contains(&SessionCall::Rollback));

    // Tables in declaration order, then indexes, then foreign keys.
    let statements = session.executed_statements();
    assert_eq!(statements.len(), 4);
    assert!(statements[0].starts_with("CREATE TABLE \"crm_contact\""));
    assert!(statements[1].starts_with("CREATE TABLE \"crm_deal\""));
    assert!(statements[2].starts_with("CREATE UNIQUE INDEX \"idx_crm_contact_email\""));
    assert!(statements[3].contains("\"fk_crm_deal_contact\""));
}

#[tokio::test]
async fn install_failure_rolls_back_and_reports_the_statement() {
    let bundle = TestBundle::new("crm_sync", "2.1.0").with_metadata(crm_metadata());
    let descriptor = descriptor_for(&bundle);
    let mut session = MockSession::new().fail_execute_at(1, "relation already exists");

    let err = lifecycle()
        .install(&bundle, &descriptor, &mut session, &HostContext::detached())
        .await
        .unwrap_err();

    // No commit; the transaction ends with a rollback.
    let calls = session.calls();
    assert!(!calls.contains(&SessionCall::Commit));
    assert_eq!(calls.last(), Some(&SessionCall::Rollback));
    // Statements after the failing one are never attempted.
    assert_eq!(session.executed_statements().len(), 2);

    // The original failure survives the anyhow boundary intact.
    let schema_err = err.downcast_ref::<SchemaError>().unwrap();
    match schema_err {
        SchemaError::Statement { statement, source } => {
            assert!(statement.starts_with("CREATE TABLE \"crm_deal\""));
            assert_eq!(source.to_string(), "relation already exists");
        }
        other => panic!("unexpected error variant: {other:?}"),
    }
}

#[tokio::test]
async fn install_without_metadata_opens_no_transaction() {
    let bundle = TestBundle::new("bare", "1.0.0");
    let descriptor = descriptor_for(&bundle);
    let mut session = MockSession::new();

    lifecycle()
        .install(&bundle, &descriptor, &mut session, &HostContext::detached())
        .await
        .unwrap();

    assert!(session.calls().is_empty());
}

#[tokio::test]
async fn install_skips_legacy_hook_when_absent() {
    let bundle = TestBundle::new("modern", "1.0.0").with_metadata(mention_metadata());
    let descriptor = descriptor_for(&bundle);
    let mut session = MockSession::new();

    lifecycle()
        .install(&bundle, &descriptor, &mut session, &HostContext::detached())
        .await
        .unwrap();

    assert!(!bundle.install_hook_ran());
}

#[tokio::test]
async fn install_invokes_legacy_hook_before_schema() {
    let bundle = TestBundle::new("vintage", "1.0.0")
        .with_metadata(mention_metadata())
        .with_legacy_hooks();
    let descriptor = descriptor_for(&bundle);
    let mut session = MockSession::new();

    lifecycle()
        .install(&bundle, &descriptor, &mut session, &HostContext::detached())
        .await
        .unwrap();

    assert!(bundle.install_hook_ran());
    assert_eq!(session.calls().last(), Some(&SessionCall::Commit));
}

#[tokio::test]
async fn update_passes_descriptor_fields_through_the_addon_view() {
    let bundle = TestBundle::new("vintage", "1.4.2").with_legacy_hooks();
    let mut descriptor = descriptor_for(&bundle);
    descriptor.id = 42;
    descriptor.is_missing = false;

    lifecycle()
        .update(&bundle, &descriptor, &HostContext::detached())
        .await
        .unwrap();

    let view = bundle.last_update_view().unwrap();
    assert_eq!(view.id, 42);
    assert_eq!(view.name, descriptor.name);
    assert_eq!(view.author, descriptor.author);
    assert_eq!(view.version, descriptor.version);
    assert_eq!(view.bundle, descriptor.bundle);
    assert_eq!(view.description, descriptor.description);
    assert_eq!(view.integrations, descriptor.integrations);
    assert_eq!(view.is_missing, descriptor.is_missing);
}

#[tokio::test]
async fn update_without_hook_is_a_no_op() {
    let bundle = TestBundle::new("modern", "2.0.0").with_metadata(crm_metadata());
    let descriptor = descriptor_for(&bundle);

    lifecycle()
        .update(&bundle, &descriptor, &HostContext::detached())
        .await
        .unwrap();

    assert!(bundle.last_update_view().is_none());
}

#[tokio::test]
async fn uninstall_is_a_stub_that_touches_nothing() {
    let bundle = TestBundle::new("crm_sync", "2.1.0").with_metadata(crm_metadata());
    let descriptor = descriptor_for(&bundle);

    lifecycle().uninstall(&bundle, &descriptor).await.unwrap();
}

#[tokio::test]
async fn drop_schema_removes_foreign_keys_before_tables() {
    let mut session = MockSession::new();

    lifecycle()
        .drop_schema(&crm_metadata(), &mut session)
        .await
        .unwrap();

    let statements = session.executed_statements();
    assert_eq!(statements.len(), 3);
    assert!(statements[0].contains("DROP CONSTRAINT \"fk_crm_deal_contact\""));
    assert!(statements[1].starts_with("DROP TABLE \"crm_deal\""));
    assert!(statements[2].starts_with("DROP TABLE \"crm_contact\""));
    assert_eq!(session.calls().last(), Some(&SessionCall::Commit));
}

#[tokio::test]
async fn diff_against_empty_snapshot_creates_everything() {
    let mut session = MockSession::new();

    lifecycle()
        .compute_and_apply_diff(&mention_metadata(), &SchemaSnapshot::default(), &mut session)
        .await
        .unwrap();

    let statements = session.executed_statements();
    assert_eq!(statements.len(), 1);
    assert!(statements[0].starts_with("CREATE TABLE \"social_mention\""));
}

#[tokio::test]
async fn diff_with_no_changes_opens_no_transaction() {
    let metadata = mention_metadata();
    let mut snapshot = SchemaSnapshot::default();
    for entity in &metadata.entities {
        let table = snapshot.table(&entity.table);
        for column in &entity.columns {
            table.column(&column.name, ColumnSnapshot::new(column.ty, column.nullable));
        }
    }
    let mut session = MockSession::new();

    lifecycle()
        .compute_and_apply_diff(&metadata, &snapshot, &mut session)
        .await
        .unwrap();

    assert!(session.calls().is_empty());
}

#[tokio::test]
async fn applied_diff_matches_previewed_statements() {
    let metadata = crm_metadata();
    let snapshot = SchemaSnapshot::default();

    let previewed = lifecycle().preview_diff(&metadata, &snapshot).unwrap();

    let mut session = MockSession::new();
    lifecycle()
        .compute_and_apply_diff(&metadata, &snapshot, &mut session)
        .await
        .unwrap();

    let previewed: Vec<&str> = previewed.iter().map(|s| s.as_str()).collect();
    assert_eq!(session.executed_statements(), previewed);
}

#[tokio::test]
async fn commit_failure_propagates_as_transaction_error() {
    let mut session = MockSession::new().fail_commit("connection reset");

    let err = lifecycle()
        .drop_schema(&mention_metadata(), &mut session)
        .await
        .unwrap_err();

    match err {
        SchemaError::Transaction { op, source } => {
            assert_eq!(op, "commit");
            assert_eq!(source.to_string(), "connection reset");
        }
        other => panic!("unexpected error variant: {other:?}"),
    }
}
