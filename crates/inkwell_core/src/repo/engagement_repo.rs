//! View tracking and favorites.
//!
//! # Invariants
//! - `record_view` writes the analytics row and bumps `articles.views` in one
//!   unit of work.
//! - Favorites are unique per `(user_id, article_id)`; add and remove are
//!   both idempotent.

use crate::clock::now_millis;
use crate::db::unit_of_work;
use crate::model::{new_id, Article, ArticleStats, ArticleView, CommentStatus, Favorite, NewArticleView};
use crate::repo::article_repo::{query_articles, ARTICLE_SELECT_SQL};
use crate::repo::{ensure_schema_ready, is_foreign_key_violation, RepoError, RepoResult};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension};

pub trait EngagementRepository {
    /// Appends one view row and increments the article's counter.
    ///
    /// The cached `article:<id>` entry is left alone, so `views` on a cached
    /// article lags until that entry expires. [`Self::article_stats`] reads
    /// the live counter.
    fn record_view(&mut self, article_id: &str, view: &NewArticleView) -> RepoResult<ArticleView>;
    /// View counter plus the number of approved comments.
    fn article_stats(&self, article_id: &str) -> RepoResult<ArticleStats>;
    /// Returns the existing favorite when the pair is already stored.
    fn add_favorite(&self, user_id: &str, article_id: &str) -> RepoResult<Favorite>;
    /// Removing an absent favorite is not an error.
    fn remove_favorite(&self, user_id: &str, article_id: &str) -> RepoResult<()>;
    fn is_favorited(&self, user_id: &str, article_id: &str) -> RepoResult<bool>;
    /// Favorited articles in any status, most recently favorited first.
    fn list_favorite_articles(&self, user_id: &str) -> RepoResult<Vec<Article>>;
}

/// SQLite-backed engagement repository.
pub struct SqliteEngagementRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteEngagementRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }

    fn find_favorite(&self, user_id: &str, article_id: &str) -> RepoResult<Option<Favorite>> {
        let favorite = self
            .conn
            .query_row(
                "SELECT id, user_id, article_id, created_at
                 FROM favorites
                 WHERE user_id = ?1 AND article_id = ?2;",
                params![user_id, article_id],
                |row| {
                    Ok(Favorite {
                        id: row.get("id")?,
                        user_id: row.get("user_id")?,
                        article_id: row.get("article_id")?,
                        created_at: row.get("created_at")?,
                    })
                },
            )
            .optional()?;
        Ok(favorite)
    }
}

impl EngagementRepository for SqliteEngagementRepository<'_> {
    fn record_view(&mut self, article_id: &str, view: &NewArticleView) -> RepoResult<ArticleView> {
        let recorded = ArticleView {
            id: new_id(),
            article_id: article_id.to_string(),
            ip: view.ip.clone(),
            user_agent: view.user_agent.clone(),
            created_at: now_millis(),
        };
        unit_of_work(self.conn, "record_view", |tx| {
            let changed = tx.execute(
                "UPDATE articles SET views = views + 1 WHERE id = ?1;",
                [article_id],
            )?;
            if changed == 0 {
                return Err(RepoError::not_found("article", article_id));
            }
            tx.execute(
                "INSERT INTO article_views (id, article_id, ip, user_agent, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    recorded.id,
                    recorded.article_id,
                    recorded.ip,
                    recorded.user_agent,
                    recorded.created_at
                ],
            )?;
            Ok(())
        })?;
        debug!("event=record_view module=repo status=ok article_id={article_id}");
        Ok(recorded)
    }

    fn article_stats(&self, article_id: &str) -> RepoResult<ArticleStats> {
        let views: i64 = self
            .conn
            .query_row(
                "SELECT views FROM articles WHERE id = ?1;",
                [article_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| RepoError::not_found("article", article_id))?;
        let comments: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM comments WHERE article_id = ?1 AND status = ?2;",
            params![article_id, CommentStatus::Approved.as_str()],
            |row| row.get(0),
        )?;
        Ok(ArticleStats { views, comments })
    }

    fn add_favorite(&self, user_id: &str, article_id: &str) -> RepoResult<Favorite> {
        let inserted = self
            .conn
            .execute(
                "INSERT INTO favorites (id, user_id, article_id, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (user_id, article_id) DO NOTHING;",
                params![new_id(), user_id, article_id, now_millis()],
            )
            .map_err(|err| {
                if is_foreign_key_violation(&err) {
                    RepoError::InvalidReference("user or article does not exist".to_string())
                } else {
                    RepoError::from(err)
                }
            })?;
        debug!("event=add_favorite module=repo status=ok inserted={inserted}");
        self.find_favorite(user_id, article_id)?
            .ok_or_else(|| RepoError::not_found("favorite", format!("{user_id}/{article_id}")))
    }

    fn remove_favorite(&self, user_id: &str, article_id: &str) -> RepoResult<()> {
        let removed = self.conn.execute(
            "DELETE FROM favorites WHERE user_id = ?1 AND article_id = ?2;",
            params![user_id, article_id],
        )?;
        debug!("event=remove_favorite module=repo status=ok removed={removed}");
        Ok(())
    }

    fn is_favorited(&self, user_id: &str, article_id: &str) -> RepoResult<bool> {
        Ok(self.find_favorite(user_id, article_id)?.is_some())
    }

    fn list_favorite_articles(&self, user_id: &str) -> RepoResult<Vec<Article>> {
        let sql = format!(
            "{ARTICLE_SELECT_SQL}
             INNER JOIN favorites f ON f.article_id = a.id
             WHERE f.user_id = ?
             ORDER BY f.created_at DESC, a.id ASC;"
        );
        query_articles(self.conn, &sql, vec![Value::Text(user_id.to_string())])
    }
}
