//! Article aggregate and its write inputs.
//!
//! # Invariants
//! - `published_at` is stamped only on entry into `Published` and is never
//!   overwritten afterwards.
//! - `category_id`/`author_id` are `None` or reference an existing row, never
//!   an empty string.
//! - `tags` is the authoritative join set; writes replace it wholesale.

use super::patch::FieldPatch;
use super::taxonomy::{Category, Tag};
use super::user::User;
use super::normalize_optional_id;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    Draft,
    Pending,
    Published,
    Rejected,
}

impl ArticleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Published => "published",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "pending" => Some(Self::Pending),
            "published" => Some(Self::Published),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Article with its category, author and tag set resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: String,
    pub cover_image: String,
    pub category_id: Option<String>,
    pub category: Option<Category>,
    pub status: ArticleStatus,
    pub views: i64,
    pub author_id: Option<String>,
    pub author: Option<User>,
    pub created_at: i64,
    pub updated_at: i64,
    pub published_at: Option<i64>,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewArticle {
    pub title: String,
    #[serde(default)]
    pub slug: String,
    pub content: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub cover_image: String,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default = "draft_status")]
    pub status: ArticleStatus,
}

fn draft_status() -> ArticleStatus {
    ArticleStatus::Draft
}

impl NewArticle {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            slug: String::new(),
            content: content.into(),
            excerpt: String::new(),
            cover_image: String::new(),
            category_id: None,
            author_id: None,
            status: ArticleStatus::Draft,
        }
    }

    /// Collapses empty-string references into `None`.
    pub fn normalized(mut self) -> Self {
        self.category_id = normalize_optional_id(self.category_id);
        self.author_id = normalize_optional_id(self.author_id);
        self
    }
}

/// Sparse article update. Only populated fields are written; `updated_at` is
/// always refreshed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ArticlePatch {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub cover_image: Option<String>,
    pub category_id: FieldPatch<String>,
    pub author_id: FieldPatch<String>,
    pub status: Option<ArticleStatus>,
}

impl ArticlePatch {
    pub fn status(status: ArticleStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Empty-string category/author become `Clear`. Other fields keep empty
    /// strings as legitimate values.
    pub fn normalized(mut self) -> Self {
        self.category_id = self.category_id.normalize_empty();
        self.author_id = self.author_id.normalize_empty();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.slug.is_none()
            && self.content.is_none()
            && self.excerpt.is_none()
            && self.cover_image.is_none()
            && self.category_id.is_unchanged()
            && self.author_id.is_unchanged()
            && self.status.is_none()
    }
}

/// Optional narrowing for an author's own article listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorArticleFilter {
    /// Substring matched against title, content and excerpt.
    pub query: Option<String>,
    pub status: Option<ArticleStatus>,
    pub category_id: Option<String>,
    pub tag_id: Option<String>,
}
