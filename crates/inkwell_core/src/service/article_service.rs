//! Article use cases for readers, authors and administrators.
//!
//! # Invariants
//! - Raw page input is normalized before it reaches the repository.
//! - Authors only touch their own articles and cannot change status or
//!   authorship through a patch; `submit` is their only way to publish.
//! - Admin entry points check the role before any repository call.

use crate::auth::Identity;
use crate::error::{CoreError, CoreResult};
use crate::model::{
    Article, ArticlePatch, ArticleStatus, AuthorArticleFilter, FieldPatch, NewArticle, Page,
    PageRequest,
};
use crate::repo::article_repo::ArticleRepository;
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

const FALLBACK_SLUG: &str = "article";

static SLUG_SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}]+").expect("valid slug separator regex"));

/// Author-submitted article body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ArticleDraft {
    pub title: String,
    pub slug: Option<String>,
    pub content: String,
    pub excerpt: String,
    pub cover_image: String,
    pub category_id: Option<String>,
    pub tag_ids: Vec<String>,
    /// Publish immediately instead of saving a draft.
    pub submit: bool,
}

/// Article use cases over an [`ArticleRepository`].
pub struct ArticleService<R: ArticleRepository> {
    repo: R,
}

impl<R: ArticleRepository> ArticleService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Public single-article read. Unpublished and missing both yield `NotFound`.
    pub fn get_article(&self, id: &str) -> CoreResult<Article> {
        Ok(self.repo.get_article(id)?)
    }

    pub fn list_published(&self, page: i64, page_size: i64) -> CoreResult<Page<Article>> {
        Ok(self
            .repo
            .list_published(PageRequest::new(page, page_size))?)
    }

    pub fn list_by_category(
        &self,
        category_id: &str,
        page: i64,
        page_size: i64,
    ) -> CoreResult<Page<Article>> {
        Ok(self
            .repo
            .list_by_category(category_id, PageRequest::new(page, page_size))?)
    }

    pub fn list_by_tag(&self, tag_id: &str, page: i64, page_size: i64) -> CoreResult<Page<Article>> {
        Ok(self
            .repo
            .list_by_tag(tag_id, PageRequest::new(page, page_size))?)
    }

    pub fn search(&self, query: &str, page: i64, page_size: i64) -> CoreResult<Page<Article>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(CoreError::validation("search query is required"));
        }
        Ok(self.repo.search(query, PageRequest::new(page, page_size))?)
    }

    /// The caller's own articles in every status unless `filter` narrows it.
    pub fn list_mine(
        &self,
        identity: &Identity,
        filter: &AuthorArticleFilter,
        page: i64,
        page_size: i64,
    ) -> CoreResult<Page<Article>> {
        Ok(self.repo.list_by_author(
            &identity.user_id,
            filter,
            PageRequest::new(page, page_size),
        )?)
    }

    /// Owner view of one article in any status.
    pub fn get_own_article(&self, identity: &Identity, id: &str) -> CoreResult<Article> {
        let article = self.repo.get_article_any_status(id)?;
        identity.require_owner(article.author_id.as_deref())?;
        Ok(article)
    }

    /// Creates a draft, or a published article when `draft.submit` is set.
    pub fn create_user_article(
        &mut self,
        identity: &Identity,
        draft: ArticleDraft,
    ) -> CoreResult<Article> {
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(CoreError::validation("title is required"));
        }
        if draft.content.trim().is_empty() {
            return Err(CoreError::validation("content is required"));
        }

        let slug = match draft.slug.as_deref().map(str::trim) {
            Some(slug) if !slug.is_empty() => slug.to_string(),
            _ => derive_slug(title),
        };
        let article = NewArticle {
            title: title.to_string(),
            slug,
            content: draft.content,
            excerpt: draft.excerpt,
            cover_image: draft.cover_image,
            category_id: draft.category_id,
            author_id: Some(identity.user_id.clone()),
            status: if draft.submit {
                ArticleStatus::Published
            } else {
                ArticleStatus::Draft
            },
        };
        let created = self.repo.create_article_with_tags(article, &draft.tag_ids)?;
        info!(
            "event=create_article module=service status=ok id={} article_status={}",
            created.id,
            created.status.as_str()
        );
        Ok(created)
    }

    /// Owner-checked sparse update. `tag_ids = None` keeps the current tags.
    pub fn update_user_article(
        &mut self,
        identity: &Identity,
        id: &str,
        mut patch: ArticlePatch,
        tag_ids: Option<&[String]>,
        submit: bool,
    ) -> CoreResult<()> {
        let article = self.repo.get_article_any_status(id)?;
        identity.require_owner(article.author_id.as_deref())?;

        patch.author_id = FieldPatch::Unchanged;
        patch.status = submit.then_some(ArticleStatus::Published);
        self.repo.update_article_with_tags(id, patch, tag_ids)?;
        info!("event=update_article module=service status=ok id={id} submit={submit}");
        Ok(())
    }

    pub fn delete_user_article(&self, identity: &Identity, id: &str) -> CoreResult<()> {
        let article = self.repo.get_article_any_status(id)?;
        identity.require_owner(article.author_id.as_deref())?;
        self.repo.delete_article(id)?;
        info!("event=delete_article module=service status=ok id={id}");
        Ok(())
    }

    /// Admin create with an explicit status and author.
    pub fn admin_create(
        &mut self,
        identity: &Identity,
        mut article: NewArticle,
        tag_ids: &[String],
    ) -> CoreResult<Article> {
        identity.require_admin()?;
        if article.title.trim().is_empty() {
            return Err(CoreError::validation("title is required"));
        }
        if article.slug.trim().is_empty() {
            article.slug = derive_slug(&article.title);
        }
        Ok(self.repo.create_article_with_tags(article, tag_ids)?)
    }

    pub fn publish(&self, identity: &Identity, id: &str) -> CoreResult<()> {
        self.set_status(identity, id, ArticleStatus::Published)
    }

    pub fn reject(&self, identity: &Identity, id: &str) -> CoreResult<()> {
        self.set_status(identity, id, ArticleStatus::Rejected)
    }

    /// Admin sparse update; may change status and authorship.
    pub fn admin_update(
        &mut self,
        identity: &Identity,
        id: &str,
        patch: ArticlePatch,
        tag_ids: Option<&[String]>,
    ) -> CoreResult<()> {
        identity.require_admin()?;
        Ok(self.repo.update_article_with_tags(id, patch, tag_ids)?)
    }

    pub fn admin_delete(&self, identity: &Identity, id: &str) -> CoreResult<()> {
        identity.require_admin()?;
        self.repo.delete_article(id)?;
        info!("event=admin_delete_article module=service status=ok id={id}");
        Ok(())
    }

    pub fn list_admin(
        &self,
        identity: &Identity,
        status: Option<ArticleStatus>,
        page: i64,
        page_size: i64,
    ) -> CoreResult<Page<Article>> {
        identity.require_admin()?;
        Ok(self
            .repo
            .list_all(status, PageRequest::new(page, page_size))?)
    }

    /// Moderation queue.
    pub fn list_pending(
        &self,
        identity: &Identity,
        page: i64,
        page_size: i64,
    ) -> CoreResult<Page<Article>> {
        self.list_admin(identity, Some(ArticleStatus::Pending), page, page_size)
    }

    /// Resolves favorite ids or any other id list into articles.
    pub fn articles_by_ids(&self, ids: &[String]) -> CoreResult<Vec<Article>> {
        Ok(self.repo.list_by_ids(ids)?)
    }

    fn set_status(&self, identity: &Identity, id: &str, status: ArticleStatus) -> CoreResult<()> {
        identity.require_admin()?;
        self.repo.update_article(id, ArticlePatch::status(status))?;
        info!(
            "event=moderate_article module=service status=ok id={id} article_status={}",
            status.as_str()
        );
        Ok(())
    }
}

/// Lowercased title with every run of non-alphanumeric characters collapsed
/// to one `-`. Letters outside ASCII are kept.
pub fn derive_slug(title: &str) -> String {
    let lowered = title.to_lowercase();
    let slug = SLUG_SEPARATOR_RE.replace_all(&lowered, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::derive_slug;

    #[test]
    fn slug_collapses_separators() {
        assert_eq!(derive_slug("Hello, World!"), "hello-world");
        assert_eq!(derive_slug("  Rust   2024 -- edition "), "rust-2024-edition");
    }

    #[test]
    fn slug_keeps_non_ascii_letters() {
        assert_eq!(derive_slug("你好 世界"), "你好-世界");
    }

    #[test]
    fn slug_falls_back_when_title_has_no_letters() {
        assert_eq!(derive_slug("!!!"), "article");
    }
}
