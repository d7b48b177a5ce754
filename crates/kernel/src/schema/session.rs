//! Database session abstraction for schema changes.
//!
//! The lifecycle manager only needs begin/execute/commit/rollback; the
//! trait keeps it independent of the concrete backend so tests can
//! substitute a recording session.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use super::error::SchemaError;
use super::statement::DdlStatement;

/// A database session capable of applying DDL transactionally.
///
/// At most one transaction may be open at a time; it never outlives the
/// lifecycle operation that opened it.
#[async_trait]
pub trait SchemaSession: Send {
    async fn begin(&mut self) -> Result<(), SchemaError>;
    async fn execute(&mut self, statement: &DdlStatement) -> Result<(), SchemaError>;
    async fn commit(&mut self) -> Result<(), SchemaError>;
    async fn rollback(&mut self) -> Result<(), SchemaError>;
}

/// PostgreSQL-backed schema session over a sqlx pool.
pub struct PgSession {
    pool: PgPool,
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgSession {
    pub fn new(pool: PgPool) -> Self {
        Self { pool, tx: None }
    }
}

#[async_trait]
impl SchemaSession for PgSession {
    async fn begin(&mut self) -> Result<(), SchemaError> {
        if self.tx.is_some() {
            return Err(SchemaError::Transaction {
                op: "begin",
                source: "a schema transaction is already open".into(),
            });
        }

        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SchemaError::Transaction {
                op: "begin",
                source: e.into(),
            })?;
        self.tx = Some(tx);
        Ok(())
    }

    async fn execute(&mut self, statement: &DdlStatement) -> Result<(), SchemaError> {
        let tx = self.tx.as_mut().ok_or(SchemaError::NoTransaction)?;

        // The diff engine emits exactly one DDL command per statement.
        sqlx::query(statement.as_str())
            .execute(&mut **tx)
            .await
            .map_err(|e| SchemaError::Statement {
                statement: statement.as_str().to_string(),
                source: e.into(),
            })?;

        Ok(())
    }

    async fn commit(&mut self) -> Result<(), SchemaError> {
        let tx = self.tx.take().ok_or(SchemaError::NoTransaction)?;
        tx.commit().await.map_err(|e| SchemaError::Transaction {
            op: "commit",
            source: e.into(),
        })
    }

    async fn rollback(&mut self) -> Result<(), SchemaError> {
        let tx = self.tx.take().ok_or(SchemaError::NoTransaction)?;
        tx.rollback().await.map_err(|e| SchemaError::Transaction {
            op: "rollback",
            source: e.into(),
        })
    }
}
