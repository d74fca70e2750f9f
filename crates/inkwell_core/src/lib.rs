//! Data-access core for the Inkwell blog backend.
//! This crate is the single source of truth for cache/store consistency,
//! transactional article writes and the token trust boundary.

pub mod auth;
pub mod cache;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use auth::{bearer_token, Claims, Identity, TokenError, TokenService};
pub use cache::{article_cache_key, Cache, CacheError, MemoryCache, NoopCache};
pub use config::{ConfigError, CoreConfig};
pub use db::{open_db, open_db_in_memory, unit_of_work, DbError};
pub use error::{CoreError, CoreResult};
pub use logging::{
    default_log_level, init_logging, init_logging_from, logging_status, LoggingError,
};
pub use repo::article_repo::{ArticleRepository, SqliteArticleRepository};
pub use repo::comment_repo::{CommentRepository, SqliteCommentRepository};
pub use repo::donation_repo::{DonationRepository, SqliteDonationRepository};
pub use repo::engagement_repo::{EngagementRepository, SqliteEngagementRepository};
pub use repo::taxonomy_repo::{SqliteTaxonomyRepository, TaxonomyRepository};
pub use repo::user_repo::{SqliteUserRepository, UserRepository};
pub use repo::{RepoError, RepoResult};
pub use service::{ArticleDraft, ArticleService, AuthService, AuthSession};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
