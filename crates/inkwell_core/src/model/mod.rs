//! Blog domain model.
//!
//! # Invariants
//! - Identifiers are opaque UUIDv4 strings, generated at creation, immutable.
//! - Timestamps are Unix epoch milliseconds.
//! - Deletes are hard deletes; there are no tombstones.

mod article;
mod comment;
mod donation;
mod engagement;
mod page;
mod patch;
mod taxonomy;
mod user;

pub use article::{
    Article, ArticlePatch, ArticleStatus, AuthorArticleFilter, NewArticle,
};
pub use comment::{Comment, CommentStatus, NewComment};
pub use donation::{DonationQrCode, DonationQrCodePatch, NewDonationQrCode};
pub use engagement::{ArticleStats, ArticleView, Favorite, NewArticleView};
pub use page::{Page, PageRequest, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use patch::FieldPatch;
pub use taxonomy::{Category, CategoryPatch, NewCategory, NewTag, Tag, TagPatch};
pub use user::{Credentials, NewUser, ProfilePatch, Role, User};

/// Generates a fresh entity identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Empty or whitespace-only ids mean "no reference".
pub(crate) fn normalize_optional_id(value: Option<String>) -> Option<String> {
    value.filter(|id| !id.trim().is_empty())
}
