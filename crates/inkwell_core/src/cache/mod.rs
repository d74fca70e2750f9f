//! Key/value cache contract used by the article read path.
//!
//! # Invariants
//! - Values are opaque bytes; the repository owns (de)serialization.
//! - A cache failure never fails a read. Callers log and fall through.

use std::time::Duration;
use thiserror::Error;

mod memory;

pub use memory::MemoryCache;

const ARTICLE_KEY_PREFIX: &str = "article:";

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

/// Minimal cache surface: the read path needs nothing else.
pub trait Cache: Send + Sync {
    /// Returns the stored bytes, or `None` on a miss or expired entry.
    fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;
    fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()>;
    /// Removing an absent key is not an error.
    fn delete(&self, key: &str) -> CacheResult<()>;
}

/// Cache that stores nothing. Every read is a miss.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

impl Cache for NoopCache {
    fn get(&self, _key: &str) -> CacheResult<Option<Vec<u8>>> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &[u8], _ttl: Duration) -> CacheResult<()> {
        Ok(())
    }

    fn delete(&self, _key: &str) -> CacheResult<()> {
        Ok(())
    }
}

pub fn article_cache_key(article_id: &str) -> String {
    format!("{ARTICLE_KEY_PREFIX}{article_id}")
}
