//! Redis-backed cache.

use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use std::time::Duration;

use super::{Cache, CacheError, CacheResult};

/// Cache over a `deadpool-redis` connection pool.
#[derive(Clone)]
pub struct RedisCache {
    pool: Pool,
}

impl RedisCache {
    /// Build a pool for `redis_url`. Connections are opened lazily.
    pub fn connect(redis_url: &str) -> CacheResult<Self> {
        let pool = Config::from_url(redis_url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::Pool(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> CacheResult<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheError::Pool(e.to_string()))
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.conn().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, expires: Duration) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        let _: () = conn.set_ex(key, value, expires.as_secs().max(1)).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires a running Redis (REDIS_URL)"]
    async fn test_redis_round_trip() {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let cache = RedisCache::connect(&redis_url).expect("Failed to create cache pool");
        let key = "user_accounts.test.round_trip";

        cache
            .set(key, "value", Duration::from_secs(30))
            .await
            .expect("SET EX failed");
        assert_eq!(cache.get(key).await.unwrap(), Some("value".to_string()));

        cache.remove(key).await.expect("DEL failed");
        assert_eq!(cache.get(key).await.unwrap(), None);
    }
}
