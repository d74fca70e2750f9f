//! Category and tag repository contract and SQLite implementation.
//!
//! # Invariants
//! - Deleting a category leaves its articles uncategorized.
//! - Deleting a tag removes its article links and nothing else.

use crate::clock::now_millis;
use crate::model::{new_id, Category, CategoryPatch, NewCategory, NewTag, Tag, TagPatch};
use crate::repo::{ensure_schema_ready, RepoError, RepoResult, SparseUpdate};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Repository interface for article classification.
pub trait TaxonomyRepository {
    /// Lists categories ordered by name.
    fn list_categories(&self) -> RepoResult<Vec<Category>>;
    fn get_category(&self, id: &str) -> RepoResult<Category>;
    fn create_category(&self, category: &NewCategory) -> RepoResult<Category>;
    fn update_category(&self, id: &str, patch: &CategoryPatch) -> RepoResult<()>;
    fn delete_category(&self, id: &str) -> RepoResult<()>;
    /// Lists tags ordered by name.
    fn list_tags(&self) -> RepoResult<Vec<Tag>>;
    fn get_tag(&self, id: &str) -> RepoResult<Tag>;
    fn create_tag(&self, tag: &NewTag) -> RepoResult<Tag>;
    fn update_tag(&self, id: &str, patch: &TagPatch) -> RepoResult<()>;
    fn delete_tag(&self, id: &str) -> RepoResult<()>;
}

/// SQLite-backed taxonomy repository.
pub struct SqliteTaxonomyRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaxonomyRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }
}

impl TaxonomyRepository for SqliteTaxonomyRepository<'_> {
    fn list_categories(&self) -> RepoResult<Vec<Category>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, slug, description, created_at, updated_at
             FROM categories
             ORDER BY name ASC, id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut categories = Vec::new();
        while let Some(row) = rows.next()? {
            categories.push(parse_category_row(row)?);
        }
        Ok(categories)
    }

    fn get_category(&self, id: &str) -> RepoResult<Category> {
        self.conn
            .query_row(
                "SELECT id, name, slug, description, created_at, updated_at
                 FROM categories WHERE id = ?1;",
                [id],
                parse_category_row,
            )
            .optional()?
            .ok_or_else(|| RepoError::not_found("category", id))
    }

    fn create_category(&self, category: &NewCategory) -> RepoResult<Category> {
        let id = new_id();
        let now = now_millis();
        self.conn.execute(
            "INSERT INTO categories (id, name, slug, description, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5);",
            params![id, category.name, category.slug, category.description, now],
        )?;
        self.get_category(&id)
    }

    fn update_category(&self, id: &str, patch: &CategoryPatch) -> RepoResult<()> {
        let mut update = SparseUpdate::new();
        update
            .set_opt("name", patch.name.clone())
            .set_opt("slug", patch.slug.clone())
            .set_opt("description", patch.description.clone())
            .set("updated_at", now_millis());
        ensure_changed(update.execute(self.conn, "categories", id)?, "category", id)
    }

    fn delete_category(&self, id: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM categories WHERE id = ?1;", [id])?;
        ensure_changed(changed, "category", id)
    }

    fn list_tags(&self) -> RepoResult<Vec<Tag>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, slug, created_at, updated_at
             FROM tags
             ORDER BY name ASC, id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut tags = Vec::new();
        while let Some(row) = rows.next()? {
            tags.push(parse_tag_row(row)?);
        }
        Ok(tags)
    }

    fn get_tag(&self, id: &str) -> RepoResult<Tag> {
        self.conn
            .query_row(
                "SELECT id, name, slug, created_at, updated_at FROM tags WHERE id = ?1;",
                [id],
                parse_tag_row,
            )
            .optional()?
            .ok_or_else(|| RepoError::not_found("tag", id))
    }

    fn create_tag(&self, tag: &NewTag) -> RepoResult<Tag> {
        let id = new_id();
        let now = now_millis();
        self.conn.execute(
            "INSERT INTO tags (id, name, slug, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4);",
            params![id, tag.name, tag.slug, now],
        )?;
        self.get_tag(&id)
    }

    fn update_tag(&self, id: &str, patch: &TagPatch) -> RepoResult<()> {
        let mut update = SparseUpdate::new();
        update
            .set_opt("name", patch.name.clone())
            .set_opt("slug", patch.slug.clone())
            .set("updated_at", now_millis());
        ensure_changed(update.execute(self.conn, "tags", id)?, "tag", id)
    }

    fn delete_tag(&self, id: &str) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM tags WHERE id = ?1;", [id])?;
        ensure_changed(changed, "tag", id)
    }
}

fn ensure_changed(changed: usize, entity: &'static str, id: &str) -> RepoResult<()> {
    if changed == 0 {
        return Err(RepoError::not_found(entity, id));
    }
    Ok(())
}

fn parse_category_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get("id")?,
        name: row.get("name")?,
        slug: row.get("slug")?,
        description: row.get("description")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_tag_row(row: &Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get("id")?,
        name: row.get("name")?,
        slug: row.get("slug")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
