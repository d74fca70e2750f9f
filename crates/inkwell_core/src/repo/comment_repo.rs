//! Comment repository contract and SQLite implementation.
//!
//! # Invariants
//! - New comments are always `pending`; only `approved` rows are listed.
//! - Comments have no update path.

use crate::clock::now_millis;
use crate::model::{new_id, Comment, CommentStatus, NewComment};
use crate::repo::{ensure_schema_ready, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

pub trait CommentRepository {
    /// Approved comments of one article, newest first.
    fn list_approved(&self, article_id: &str) -> RepoResult<Vec<Comment>>;
    /// Stores a pending comment. The article must exist in any status.
    fn create_comment(&self, article_id: &str, comment: &NewComment) -> RepoResult<Comment>;
    fn delete_comment(&self, id: &str) -> RepoResult<()>;
}

/// SQLite-backed comment repository.
pub struct SqliteCommentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCommentRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }

    fn get_comment(&self, id: &str) -> RepoResult<Comment> {
        self.conn
            .query_row(
                "SELECT id, article_id, author, email, content, status, created_at, updated_at
                 FROM comments WHERE id = ?1;",
                [id],
                |row| Ok(parse_comment_row(row)),
            )
            .optional()?
            .ok_or_else(|| RepoError::not_found("comment", id))?
    }
}

impl CommentRepository for SqliteCommentRepository<'_> {
    fn list_approved(&self, article_id: &str) -> RepoResult<Vec<Comment>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, article_id, author, email, content, status, created_at, updated_at
             FROM comments
             WHERE article_id = ?1 AND status = ?2
             ORDER BY created_at DESC, id ASC;",
        )?;
        let mut rows = stmt.query(params![article_id, CommentStatus::Approved.as_str()])?;
        let mut comments = Vec::new();
        while let Some(row) = rows.next()? {
            comments.push(parse_comment_row(row)?);
        }
        Ok(comments)
    }

    fn create_comment(&self, article_id: &str, comment: &NewComment) -> RepoResult<Comment> {
        let article_exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM articles WHERE id = ?1);",
            [article_id],
            |row| row.get(0),
        )?;
        if article_exists != 1 {
            return Err(RepoError::not_found("article", article_id));
        }

        let id = new_id();
        let now = now_millis();
        self.conn.execute(
            "INSERT INTO comments (id, article_id, author, email, content, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7);",
            params![
                id,
                article_id,
                comment.author,
                comment.email,
                comment.content,
                CommentStatus::Pending.as_str(),
                now
            ],
        )?;
        self.get_comment(&id)
    }

    fn delete_comment(&self, id: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM comments WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::not_found("comment", id));
        }
        Ok(())
    }
}

fn parse_comment_row(row: &Row<'_>) -> RepoResult<Comment> {
    let status_text: String = row.get("status")?;
    let status = CommentStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid comment status `{status_text}`"))
    })?;
    Ok(Comment {
        id: row.get("id")?,
        article_id: row.get("article_id")?,
        author: row.get("author")?,
        email: row.get("email")?,
        content: row.get("content")?,
        status,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
