//! Repository contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts, one trait per aggregate.
//! - Keep SQL, cache keys and transaction sequencing inside this boundary.
//!
//! # Invariants
//! - Article writes invalidate `article:<id>` before touching the store.
//! - Multi-table writes run in one [`crate::db::unit_of_work`].
//! - Store failures always surface; cache failures never do.

use crate::db::{migrations, DbError};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, ErrorCode};
use thiserror::Error;

pub mod article_repo;
pub mod comment_repo;
pub mod donation_repo;
pub mod engagement_repo;
pub mod taxonomy_repo;
pub mod user_repo;

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    /// Unique key already taken.
    #[error("{0}")]
    Conflict(String),
    /// Foreign key points at a row that does not exist.
    #[error("{0}")]
    InvalidReference(String),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("database schema not migrated: user_version {found}, expected {expected}")]
    SchemaNotReady { found: u32, expected: u32 },
}

impl RepoError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Rejects connections that were not opened through [`crate::db::open_db`].
pub(crate) fn ensure_schema_ready(conn: &Connection) -> RepoResult<()> {
    let found: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let expected = migrations::latest_version();
    if found != expected {
        return Err(RepoError::SchemaNotReady { found, expected });
    }
    Ok(())
}

pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    constraint_code(err) == Some(rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE)
        || constraint_code(err) == Some(rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
}

pub(crate) fn is_foreign_key_violation(err: &rusqlite::Error) -> bool {
    constraint_code(err) == Some(rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY)
}

fn constraint_code(err: &rusqlite::Error) -> Option<i32> {
    match err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            Some(failure.extended_code)
        }
        _ => None,
    }
}

/// Accumulates `column = ?` assignments for a sparse `UPDATE ... WHERE id = ?`.
#[derive(Debug, Default)]
pub(crate) struct SparseUpdate {
    assignments: Vec<String>,
    values: Vec<Value>,
}

impl SparseUpdate {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.assignments.push(format!("{column} = ?"));
        self.values.push(value.into());
        self
    }

    pub(crate) fn set_opt(&mut self, column: &str, value: Option<impl Into<Value>>) -> &mut Self {
        if let Some(value) = value {
            self.set(column, value);
        }
        self
    }

    /// Adds an assignment whose right-hand side is an expression with exactly
    /// one `?` placeholder.
    pub(crate) fn set_expr(&mut self, expr: String, value: impl Into<Value>) -> &mut Self {
        self.assignments.push(expr);
        self.values.push(value.into());
        self
    }

    /// Returns the number of rows changed (0 or 1).
    pub(crate) fn execute(self, conn: &Connection, table: &str, id: &str) -> rusqlite::Result<usize> {
        let sql = format!(
            "UPDATE {table} SET {} WHERE id = ?;",
            self.assignments.join(", ")
        );
        let mut values = self.values;
        values.push(Value::Text(id.to_string()));
        conn.execute(&sql, params_from_iter(values))
    }
}

/// Escapes `%`, `_` and `\` so user text matches literally inside `LIKE ... ESCAPE '\'`.
pub(crate) fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for ch in query.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
