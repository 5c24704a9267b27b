//! User account server.
//!
//! Connects PostgreSQL and Redis, ensures the schema, provisions seed users
//! and keeps the account service running until interrupted.

mod config;
mod logging;

use std::sync::Arc;

use anyhow::Error;
use pico_args::Arguments;
use tracing::info;
use user_accounts::{
    AccountService, Database, RedisCache, Tables,
    db::{PgOptionsRepository, PgUserRepository},
};

use crate::config::ServerConfig;

const HELP: &str = "\
Run the user account server

USAGE:
  ua_server [OPTIONS]

OPTIONS:
  --db-url     URL         Database connection string  [default: env DATABASE_URL or postgres://postgres@localhost/user_accounts]
  --redis-url  URL         Redis connection string     [default: env REDIS_URL or redis://127.0.0.1:6379]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  DATABASE_URL             PostgreSQL connection string
  DB_TABLE_PREFIX          Prefix for the user and user_options tables
  REDIS_URL                Redis connection string
  USER_TOKEN               Password secret (required)
  USER_NATURAL_KEY         Field users are identified by: name or phone
  USER_CACHE_KEY           Cache namespace for options [default: user.options]
  USER_CACHE_EXPIRES_SECS  Options cache lifetime [default: 300]
  USER_SEED                JSON object of users to create at startup
  (See .env file for all configuration options)
";

struct Args {
    database_url: Option<String>,
    redis_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        database_url: pargs.opt_value_from_str("--db-url")?,
        redis_url: pargs.opt_value_from_str("--redis-url")?,
    };

    logging::init();

    let config = ServerConfig::from_env(args.database_url, args.redis_url)?;
    config.validate()?;
    logging::log_config(&config);

    info!(
        "Connecting to database: {}",
        logging::redact_url(&config.database.database_url)
    );
    let db = Database::new(&config.database)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;
    db.health_check()
        .await
        .map_err(|e| anyhow::anyhow!("Database health check failed: {}", e))?;

    let tables = Tables::new(&config.database.table_prefix, config.account.natural_key);
    db.ensure_schema(&tables)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to prepare schema: {}", e))?;

    info!("Connecting to cache: {}", logging::redact_url(&config.redis_url));
    let cache = RedisCache::connect(&config.redis_url)
        .map_err(|e| anyhow::anyhow!("Failed to create cache pool: {}", e))?;

    let service = AccountService::new(
        Arc::new(PgUserRepository::new(db.pool().clone(), tables.clone())),
        Arc::new(PgOptionsRepository::new(db.pool().clone(), tables)),
        Arc::new(cache),
        config.account.settings(),
    );

    let created = service.provision(&config.account.seed).await;
    info!(
        created,
        requested = config.account.seed.len(),
        "Seed users provisioned"
    );

    info!("User account service ready, press Ctrl+C to stop");
    shutdown_signal().await?;

    info!("Shutting down server...");
    db.close().await;

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() -> Result<(), Error> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to listen for CTRL+C: {}", e))
}
