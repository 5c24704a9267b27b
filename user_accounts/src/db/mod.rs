//! Database module providing PostgreSQL connection pooling, schema setup and
//! the storage seams the account service is written against.

use crate::model::NaturalKey;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

pub mod config;
pub mod memory;
pub mod repository;

pub use config::DatabaseConfig;
pub use memory::{MemoryStore, StoreCall};
pub use repository::{
    OptionsRepository, PgOptionsRepository, PgUserRepository, SortOrder, UserFilter,
    UserRepository,
};

/// Quoted table names and the natural-key column for one deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tables {
    pub user: String,
    pub user_options: String,
    pub key: NaturalKey,
}

impl Tables {
    pub fn new(prefix: &str, key: NaturalKey) -> Self {
        Self {
            user: quote_ident(&format!("{prefix}user")),
            user_options: quote_ident(&format!("{prefix}user_options")),
            key,
        }
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Database connection pool wrapper
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use user_accounts::db::{Database, DatabaseConfig};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), sqlx::Error> {
    ///     let db = Database::new(&DatabaseConfig::development()).await?;
    ///     db.health_check().await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check if the database connection is healthy
    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Create the user and options tables when missing.
    ///
    /// The natural-key column is UNIQUE, as is (`uid`, `name`) on the
    /// options table; concurrent creates rely on these constraints.
    pub async fn ensure_schema(&self, tables: &Tables) -> Result<(), sqlx::Error> {
        let user_table = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id BIGSERIAL PRIMARY KEY,
                {key} VARCHAR(255) NOT NULL UNIQUE,
                password VARCHAR(64) NOT NULL DEFAULT '',
                ctime BIGINT NOT NULL DEFAULT 0,
                atime BIGINT NOT NULL DEFAULT 0,
                mtime BIGINT NOT NULL DEFAULT 0
            )
            "#,
            table = tables.user,
            key = tables.key.field(),
        );
        let options_table = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id BIGSERIAL PRIMARY KEY,
                uid BIGINT NOT NULL,
                name VARCHAR(64) NOT NULL,
                type VARCHAR(16) NOT NULL DEFAULT 'text',
                options TEXT NOT NULL DEFAULT '',
                UNIQUE (uid, name)
            )
            "#,
            table = tables.user_options,
        );

        sqlx::query(&user_table).execute(&self.pool).await?;
        sqlx::query(&options_table).execute(&self.pool).await?;

        info!(user = %tables.user, options = %tables.user_options, "Schema ready");
        Ok(())
    }

    /// Close the database connection pool
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_are_prefixed_and_quoted() {
        let tables = Tables::new("kk_", NaturalKey::Phone);
        assert_eq!(tables.user, "\"kk_user\"");
        assert_eq!(tables.user_options, "\"kk_user_options\"");
        assert_eq!(tables.key, NaturalKey::Phone);
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
    async fn test_database_connection() {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://postgres@localhost/user_accounts_test".to_string());

        let config = DatabaseConfig {
            database_url,
            max_connections: 5,
            min_connections: 1,
            connection_timeout_secs: 5,
            idle_timeout_secs: 300,
            max_lifetime_secs: 1800,
            table_prefix: "test_".to_string(),
        };

        let db = Database::new(&config)
            .await
            .expect("Failed to connect to database");
        db.health_check().await.expect("Health check failed");
        db.ensure_schema(&Tables::new(&config.table_prefix, NaturalKey::Name))
            .await
            .expect("Schema setup failed");
        db.close().await;
    }
}
