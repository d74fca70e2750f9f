//! Handler-facing use-case services.
//!
//! # Responsibility
//! - Turn raw handler input into repository calls: page normalization,
//!   identity resolution, role and ownership checks.
//! - Translate repository errors into [`crate::error::CoreError`].

pub mod article_service;
pub mod auth_service;

pub use article_service::{derive_slug, ArticleDraft, ArticleService};
pub use auth_service::{AuthService, AuthSession, MIN_PASSWORD_LEN};
