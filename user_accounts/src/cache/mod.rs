//! Key/value cache with expiry, consulted before storage when reading
//! options and invalidated after every options write.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub mod memory;
pub mod redis;

pub use memory::MemoryCache;
pub use redis::RedisCache;

/// Cache errors
#[derive(Debug, Error)]
pub enum CacheError {
    /// Could not obtain a connection
    #[error("Cache pool error: {0}")]
    Pool(String),

    /// Command failed
    #[error("Cache command error: {0}")]
    Command(#[from] deadpool_redis::redis::RedisError),
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Trait for cache operations
#[async_trait]
pub trait Cache: Send + Sync {
    /// Value stored under `key`, if present and not expired
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store `value` under `key` for `expires`
    async fn set(&self, key: &str, value: &str, expires: Duration) -> CacheResult<()>;

    /// Drop `key`
    async fn remove(&self, key: &str) -> CacheResult<()>;
}
