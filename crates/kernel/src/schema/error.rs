//! Schema lifecycle error types.
//!
//! Failures are propagated with their original cause attached so an
//! operator can diagnose the exact conflicting statement; nothing here
//! masks a database error behind a generic message.

use thiserror::Error;

/// Boxed backend error, kept dynamic so mock sessions can inject
/// arbitrary failures in tests.
pub type DbError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the schema lifecycle manager and its sessions.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// One DDL statement failed. The surrounding transaction has
    /// already been rolled back when this surfaces.
    #[error("DDL statement failed: {statement}")]
    Statement {
        statement: String,
        #[source]
        source: DbError,
    },

    /// Begin, commit, or rollback itself failed. Never retried here;
    /// retrying a partially-committed DDL sequence safely would need
    /// idempotent statements the diff engine does not guarantee.
    #[error("failed to {op} schema transaction")]
    Transaction {
        op: &'static str,
        #[source]
        source: DbError,
    },

    /// Session misuse: execute/commit/rollback without an open
    /// transaction.
    #[error("no open schema transaction; call begin() first")]
    NoTransaction,

    /// The diff engine rejected the supplied metadata.
    #[error("schema diff rejected: {details}")]
    Diff { details: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_error_names_the_statement() {
        let err = SchemaError::Statement {
            statement: "CREATE TABLE \"crm_deal\" ( ... )".to_string(),
            source: "duplicate table crm_deal".into(),
        };
        assert!(err.to_string().contains("crm_deal"));
    }

    #[test]
    fn statement_error_preserves_cause() {
        let err = SchemaError::Statement {
            statement: "CREATE TABLE t".to_string(),
            source: "duplicate table t".into(),
        };

        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("duplicate table t"));
    }
}
