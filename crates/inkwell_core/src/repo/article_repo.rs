//! Article repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Serve the cache-aside single-article read for published articles.
//! - Run article writes with invalidate-first cache semantics.
//! - Own article/tag link replacement with atomic semantics.
//!
//! # Invariants
//! - The cached read only ever fills the cache with published articles.
//! - `article:<id>` is deleted before any mutation of that article's row.
//! - Tag replacement and the row write commit or roll back together.
//! - Public listings order by `published_at DESC, id ASC`; author and admin
//!   listings order by `created_at DESC, id ASC`.
//! - `published_at` is stamped when an article first becomes published and is
//!   never overwritten afterwards.

use crate::cache::{article_cache_key, Cache};
use crate::clock::now_millis;
use crate::config::{CoreConfig, DEFAULT_ARTICLE_CACHE_TTL};
use crate::db::unit_of_work;
use crate::model::{
    new_id, Article, ArticlePatch, ArticleStatus, AuthorArticleFilter, Category, NewArticle,
    Page, PageRequest, Role, Tag, User,
};
use crate::repo::{
    ensure_schema_ready, is_foreign_key_violation, like_pattern, RepoError, RepoResult,
    SparseUpdate,
};
use log::{debug, warn};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

pub(crate) const ARTICLE_SELECT_SQL: &str = "SELECT
    a.id, a.title, a.slug, a.content, a.excerpt, a.cover_image,
    a.category_id, a.status, a.views, a.author_id,
    a.created_at, a.updated_at, a.published_at,
    c.id AS c_id, c.name AS c_name, c.slug AS c_slug, c.description AS c_description,
    c.created_at AS c_created_at, c.updated_at AS c_updated_at,
    u.id AS u_id, u.email AS u_email, u.name AS u_name, u.avatar AS u_avatar,
    u.bio AS u_bio, u.role AS u_role,
    u.created_at AS u_created_at, u.updated_at AS u_updated_at
 FROM articles a
 LEFT JOIN categories c ON c.id = a.category_id
 LEFT JOIN users u ON u.id = a.author_id";

const ORDER_PUBLISHED: &str = " ORDER BY a.published_at DESC, a.id ASC";
const ORDER_CREATED: &str = " ORDER BY a.created_at DESC, a.id ASC";

/// Repository interface for article reads and writes.
pub trait ArticleRepository {
    /// Cache-aside read of one published article.
    fn get_article(&self, id: &str) -> RepoResult<Article>;
    /// Uncached read of one article in any status, for owner and admin views.
    fn get_article_any_status(&self, id: &str) -> RepoResult<Article>;
    fn list_published(&self, page: PageRequest) -> RepoResult<Page<Article>>;
    fn list_by_category(&self, category_id: &str, page: PageRequest)
        -> RepoResult<Page<Article>>;
    fn list_by_tag(&self, tag_id: &str, page: PageRequest) -> RepoResult<Page<Article>>;
    /// Substring match over title, content and excerpt of published articles.
    fn search(&self, query: &str, page: PageRequest) -> RepoResult<Page<Article>>;
    /// Lists one author's articles in every status unless the filter narrows it.
    fn list_by_author(
        &self,
        author_id: &str,
        filter: &AuthorArticleFilter,
        page: PageRequest,
    ) -> RepoResult<Page<Article>>;
    /// Admin listing over all articles, optionally narrowed to one status.
    fn list_all(&self, status: Option<ArticleStatus>, page: PageRequest)
        -> RepoResult<Page<Article>>;
    /// Loads the given articles in any status, newest first. Unknown ids are skipped.
    fn list_by_ids(&self, ids: &[String]) -> RepoResult<Vec<Article>>;
    fn create_article(&self, article: NewArticle) -> RepoResult<Article>;
    fn update_article(&self, id: &str, patch: ArticlePatch) -> RepoResult<()>;
    fn delete_article(&self, id: &str) -> RepoResult<()>;
    /// Inserts the article and links `tag_ids` in one unit of work.
    fn create_article_with_tags(
        &mut self,
        article: NewArticle,
        tag_ids: &[String],
    ) -> RepoResult<Article>;
    /// Applies `patch` and, when `tag_ids` is `Some`, replaces the whole tag
    /// set in one unit of work. `None` leaves links untouched; `Some(&[])`
    /// clears them.
    fn update_article_with_tags(
        &mut self,
        id: &str,
        patch: ArticlePatch,
        tag_ids: Option<&[String]>,
    ) -> RepoResult<()>;
}

/// SQLite-backed article repository with a shared read cache.
pub struct SqliteArticleRepository<'conn> {
    conn: &'conn mut Connection,
    cache: Arc<dyn Cache>,
    cache_ttl: Duration,
}

impl<'conn> SqliteArticleRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn mut Connection, cache: Arc<dyn Cache>) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self {
            conn,
            cache,
            cache_ttl: DEFAULT_ARTICLE_CACHE_TTL,
        })
    }

    /// Constructs a repository whose cache entries live for
    /// `config.article_cache_ttl`.
    pub fn from_config(
        conn: &'conn mut Connection,
        cache: Arc<dyn Cache>,
        config: &CoreConfig,
    ) -> RepoResult<Self> {
        Ok(Self::try_new(conn, cache)?.with_cache_ttl(config.article_cache_ttl))
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    fn cached(&self, key: &str) -> Option<Article> {
        match self.cache.get(key) {
            Ok(Some(bytes)) => match serde_json::from_slice::<Article>(&bytes) {
                Ok(article) => {
                    debug!("event=article_cache module=repo status=hit key={key}");
                    Some(article)
                }
                Err(err) => {
                    warn!("event=article_cache module=repo status=corrupt key={key} error={err}");
                    None
                }
            },
            Ok(None) => {
                debug!("event=article_cache module=repo status=miss key={key}");
                None
            }
            Err(err) => {
                warn!("event=article_cache module=repo status=read_failed key={key} error={err}");
                None
            }
        }
    }

    fn fill(&self, key: &str, article: &Article) {
        let payload = match serde_json::to_vec(article) {
            Ok(payload) => payload,
            Err(err) => {
                warn!("event=article_cache module=repo status=encode_failed key={key} error={err}");
                return;
            }
        };
        if let Err(err) = self.cache.set(key, &payload, self.cache_ttl) {
            warn!("event=article_cache module=repo status=write_failed key={key} error={err}");
        }
    }

    fn invalidate(&self, id: &str) {
        let key = article_cache_key(id);
        if let Err(err) = self.cache.delete(&key) {
            warn!("event=article_cache module=repo status=invalidate_failed key={key} error={err}");
        }
    }
}

impl ArticleRepository for SqliteArticleRepository<'_> {
    fn get_article(&self, id: &str) -> RepoResult<Article> {
        let key = article_cache_key(id);
        if let Some(article) = self.cached(&key) {
            return Ok(article);
        }

        let article = load_article(self.conn, id, Some(ArticleStatus::Published))?
            .ok_or_else(|| RepoError::not_found("article", id))?;
        self.fill(&key, &article);
        Ok(article)
    }

    fn get_article_any_status(&self, id: &str) -> RepoResult<Article> {
        load_article(self.conn, id, None)?.ok_or_else(|| RepoError::not_found("article", id))
    }

    fn list_published(&self, page: PageRequest) -> RepoResult<Page<Article>> {
        let query = ArticleQuery::published();
        query.fetch_page(self.conn, page)
    }

    fn list_by_category(
        &self,
        category_id: &str,
        page: PageRequest,
    ) -> RepoResult<Page<Article>> {
        let mut query = ArticleQuery::published();
        query.category(category_id);
        query.fetch_page(self.conn, page)
    }

    fn list_by_tag(&self, tag_id: &str, page: PageRequest) -> RepoResult<Page<Article>> {
        let mut query = ArticleQuery::published();
        query.tag(tag_id);
        query.fetch_page(self.conn, page)
    }

    fn search(&self, query_text: &str, page: PageRequest) -> RepoResult<Page<Article>> {
        let mut query = ArticleQuery::published();
        query.text(query_text);
        query.fetch_page(self.conn, page)
    }

    fn list_by_author(
        &self,
        author_id: &str,
        filter: &AuthorArticleFilter,
        page: PageRequest,
    ) -> RepoResult<Page<Article>> {
        let mut query = ArticleQuery::by_created();
        query.push("a.author_id = ?", Value::Text(author_id.to_string()));
        if let Some(text) = filter.query.as_deref().filter(|text| !text.trim().is_empty()) {
            query.text(text.trim());
        }
        if let Some(status) = filter.status {
            query.status(status);
        }
        if let Some(category_id) = filter.category_id.as_deref() {
            query.category(category_id);
        }
        if let Some(tag_id) = filter.tag_id.as_deref() {
            query.tag(tag_id);
        }
        query.fetch_page(self.conn, page)
    }

    fn list_all(
        &self,
        status: Option<ArticleStatus>,
        page: PageRequest,
    ) -> RepoResult<Page<Article>> {
        let mut query = ArticleQuery::by_created();
        if let Some(status) = status {
            query.status(status);
        }
        query.fetch_page(self.conn, page)
    }

    fn list_by_ids(&self, ids: &[String]) -> RepoResult<Vec<Article>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("{ARTICLE_SELECT_SQL} WHERE a.id IN ({placeholders}){ORDER_CREATED};");
        let binds = ids.iter().map(|id| Value::Text(id.clone())).collect();
        query_articles(self.conn, &sql, binds)
    }

    fn create_article(&self, article: NewArticle) -> RepoResult<Article> {
        let id = insert_article(self.conn, &article.normalized())?;
        debug!("event=article_create module=repo status=ok id={id}");
        self.get_article_any_status(&id)
    }

    fn update_article(&self, id: &str, patch: ArticlePatch) -> RepoResult<()> {
        self.invalidate(id);
        apply_patch(self.conn, id, &patch.normalized())?;
        debug!("event=article_update module=repo status=ok id={id}");
        Ok(())
    }

    fn delete_article(&self, id: &str) -> RepoResult<()> {
        self.invalidate(id);
        let changed = self
            .conn
            .execute("DELETE FROM articles WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::not_found("article", id));
        }
        debug!("event=article_delete module=repo status=ok id={id}");
        Ok(())
    }

    fn create_article_with_tags(
        &mut self,
        article: NewArticle,
        tag_ids: &[String],
    ) -> RepoResult<Article> {
        let article = article.normalized();
        let id = unit_of_work(self.conn, "create_article_with_tags", |tx| {
            let id = insert_article(tx, &article)?;
            let linked = replace_tags(tx, &id, tag_ids)?;
            debug!("event=article_tags module=repo status=linked id={id} count={linked}");
            Ok::<_, RepoError>(id)
        })?;
        self.get_article_any_status(&id)
    }

    fn update_article_with_tags(
        &mut self,
        id: &str,
        patch: ArticlePatch,
        tag_ids: Option<&[String]>,
    ) -> RepoResult<()> {
        self.invalidate(id);
        let patch = patch.normalized();
        unit_of_work(self.conn, "update_article_with_tags", |tx| {
            apply_patch(tx, id, &patch)?;
            if let Some(tag_ids) = tag_ids {
                let linked = replace_tags(tx, id, tag_ids)?;
                debug!("event=article_tags module=repo status=replaced id={id} count={linked}");
            }
            Ok::<_, RepoError>(())
        })
    }
}

/// Count-then-fetch query over the joined article projection.
struct ArticleQuery {
    clauses: Vec<String>,
    binds: Vec<Value>,
    order: &'static str,
}

impl ArticleQuery {
    fn published() -> Self {
        let mut query = Self {
            clauses: Vec::new(),
            binds: Vec::new(),
            order: ORDER_PUBLISHED,
        };
        query.status(ArticleStatus::Published);
        query
    }

    fn by_created() -> Self {
        Self {
            clauses: Vec::new(),
            binds: Vec::new(),
            order: ORDER_CREATED,
        }
    }

    fn push(&mut self, clause: &str, value: Value) {
        self.clauses.push(clause.to_string());
        self.binds.push(value);
    }

    fn status(&mut self, status: ArticleStatus) {
        self.push("a.status = ?", Value::Text(status.as_str().to_string()));
    }

    fn category(&mut self, category_id: &str) {
        self.push("a.category_id = ?", Value::Text(category_id.to_string()));
    }

    fn tag(&mut self, tag_id: &str) {
        self.push(
            "EXISTS (
                SELECT 1 FROM article_tags at
                WHERE at.article_id = a.id AND at.tag_id = ?
            )",
            Value::Text(tag_id.to_string()),
        );
    }

    fn text(&mut self, text: &str) {
        const COLUMNS: [&str; 3] = ["a.title", "a.content", "a.excerpt"];
        let pattern = like_pattern(text);
        let clause = COLUMNS
            .iter()
            .map(|column| format!("{column} LIKE ? ESCAPE '\\'"))
            .collect::<Vec<_>>()
            .join(" OR ");
        self.clauses.push(format!("({clause})"));
        for _ in COLUMNS {
            self.binds.push(Value::Text(pattern.clone()));
        }
    }

    fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::from(" WHERE 1 = 1")
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    fn fetch_page(self, conn: &Connection, page: PageRequest) -> RepoResult<Page<Article>> {
        let where_sql = self.where_sql();
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM articles a{where_sql};"),
            params_from_iter(self.binds.iter()),
            |row| row.get(0),
        )?;

        let sql = format!("{ARTICLE_SELECT_SQL}{where_sql}{} LIMIT ? OFFSET ?;", self.order);
        let mut binds = self.binds;
        binds.push(Value::Integer(page.limit()));
        binds.push(Value::Integer(page.offset()));
        let items = query_articles(conn, &sql, binds)?;

        Ok(Page::new(items, u64::try_from(total).unwrap_or_default(), page))
    }
}

/// Runs a query over [`ARTICLE_SELECT_SQL`] and hydrates tags per row.
pub(crate) fn query_articles(
    conn: &Connection,
    sql: &str,
    binds: Vec<Value>,
) -> RepoResult<Vec<Article>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(binds))?;
    let mut articles = Vec::new();
    while let Some(row) = rows.next()? {
        let mut article = parse_article_row(row)?;
        article.tags = load_tags_for_article(conn, &article.id)?;
        articles.push(article);
    }
    Ok(articles)
}

fn load_article(
    conn: &Connection,
    id: &str,
    status: Option<ArticleStatus>,
) -> RepoResult<Option<Article>> {
    let mut sql = format!("{ARTICLE_SELECT_SQL} WHERE a.id = ?");
    let mut binds = vec![Value::Text(id.to_string())];
    if let Some(status) = status {
        sql.push_str(" AND a.status = ?");
        binds.push(Value::Text(status.as_str().to_string()));
    }
    sql.push(';');
    Ok(query_articles(conn, &sql, binds)?.into_iter().next())
}

fn insert_article(conn: &Connection, article: &NewArticle) -> RepoResult<String> {
    let id = new_id();
    let now = now_millis();
    let published_at = (article.status == ArticleStatus::Published).then_some(now);
    conn.execute(
        "INSERT INTO articles (
            id, title, slug, content, excerpt, cover_image,
            category_id, status, views, author_id,
            created_at, updated_at, published_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, ?10, ?10, ?11);",
        params![
            id,
            article.title,
            article.slug,
            article.content,
            article.excerpt,
            article.cover_image,
            article.category_id,
            article.status.as_str(),
            article.author_id,
            now,
            published_at,
        ],
    )
    .map_err(map_reference_error)?;
    Ok(id)
}

fn apply_patch(conn: &Connection, id: &str, patch: &ArticlePatch) -> RepoResult<()> {
    let now = now_millis();
    let mut update = SparseUpdate::new();
    update
        .set_opt("title", patch.title.clone())
        .set_opt("slug", patch.slug.clone())
        .set_opt("content", patch.content.clone())
        .set_opt("excerpt", patch.excerpt.clone())
        .set_opt("cover_image", patch.cover_image.clone());
    if let Some(category_id) = patch.category_id.as_update() {
        update.set("category_id", category_id.cloned());
    }
    if let Some(author_id) = patch.author_id.as_update() {
        update.set("author_id", author_id.cloned());
    }
    if let Some(status) = patch.status {
        update.set("status", status.as_str().to_string());
        if status == ArticleStatus::Published {
            update.set_expr("published_at = COALESCE(published_at, ?)".to_string(), now);
        }
    }
    update.set("updated_at", now);

    let changed = update
        .execute(conn, "articles", id)
        .map_err(map_reference_error)?;
    if changed == 0 {
        return Err(RepoError::not_found("article", id));
    }
    Ok(())
}

/// Replaces the article's tag links. Unknown and duplicate tag ids are
/// dropped. Returns the number of links written.
fn replace_tags(conn: &Connection, article_id: &str, tag_ids: &[String]) -> RepoResult<usize> {
    conn.execute("DELETE FROM article_tags WHERE article_id = ?1;", [article_id])?;

    let unique: BTreeSet<&str> = tag_ids
        .iter()
        .map(|tag_id| tag_id.trim())
        .filter(|tag_id| !tag_id.is_empty())
        .collect();
    let mut linked = 0;
    for tag_id in unique {
        linked += conn.execute(
            "INSERT INTO article_tags (article_id, tag_id)
             SELECT ?1, id FROM tags WHERE id = ?2;",
            params![article_id, tag_id],
        )?;
    }
    Ok(linked)
}

fn load_tags_for_article(conn: &Connection, article_id: &str) -> RepoResult<Vec<Tag>> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.name, t.slug, t.created_at, t.updated_at
         FROM article_tags at
         INNER JOIN tags t ON t.id = at.tag_id
         WHERE at.article_id = ?1
         ORDER BY t.name ASC, t.id ASC;",
    )?;
    let mut rows = stmt.query([article_id])?;
    let mut tags = Vec::new();
    while let Some(row) = rows.next()? {
        tags.push(Tag {
            id: row.get("id")?,
            name: row.get("name")?,
            slug: row.get("slug")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        });
    }
    Ok(tags)
}

fn parse_article_row(row: &Row<'_>) -> RepoResult<Article> {
    let status_text: String = row.get("status")?;
    let status = ArticleStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid article status `{status_text}`"))
    })?;

    let category = match row.get::<_, Option<String>>("c_id")? {
        Some(id) => Some(Category {
            id,
            name: row.get("c_name")?,
            slug: row.get("c_slug")?,
            description: row.get("c_description")?,
            created_at: row.get("c_created_at")?,
            updated_at: row.get("c_updated_at")?,
        }),
        None => None,
    };

    let author = match row.get::<_, Option<String>>("u_id")? {
        Some(id) => {
            let role_text: String = row.get("u_role")?;
            let role = Role::parse(&role_text).ok_or_else(|| {
                RepoError::InvalidData(format!("invalid user role `{role_text}`"))
            })?;
            Some(User {
                id,
                email: row.get("u_email")?,
                name: row.get("u_name")?,
                avatar: row.get("u_avatar")?,
                bio: row.get("u_bio")?,
                role,
                created_at: row.get("u_created_at")?,
                updated_at: row.get("u_updated_at")?,
            })
        }
        None => None,
    };

    Ok(Article {
        id: row.get("id")?,
        title: row.get("title")?,
        slug: row.get("slug")?,
        content: row.get("content")?,
        excerpt: row.get("excerpt")?,
        cover_image: row.get("cover_image")?,
        category_id: row.get("category_id")?,
        category,
        status,
        views: row.get("views")?,
        author_id: row.get("author_id")?,
        author,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        published_at: row.get("published_at")?,
        tags: Vec::new(),
    })
}

fn map_reference_error(err: rusqlite::Error) -> RepoError {
    if is_foreign_key_violation(&err) {
        RepoError::InvalidReference("category or author does not exist".to_string())
    } else {
        RepoError::from(err)
    }
}
