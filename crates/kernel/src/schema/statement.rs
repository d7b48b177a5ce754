//! Executable schema-change statements.

use std::fmt;

/// One executable DDL statement.
///
/// Statements are produced in ordered sequences by the diff engine and
/// must be applied in order or not at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdlStatement(String);

impl DdlStatement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self(sql.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DdlStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DdlStatement {
    fn from(sql: String) -> Self {
        Self(sql)
    }
}
