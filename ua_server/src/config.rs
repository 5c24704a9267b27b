//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use user_accounts::{AccountSettings, DatabaseConfig, NaturalKey};

const DEFAULT_DATABASE_URL: &str = "postgres://postgres@localhost/user_accounts";
const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Database configuration
    pub database: DatabaseConfig,
    /// Redis connection URL
    pub redis_url: String,
    /// Account service configuration
    pub account: AccountConfig,
}

/// Account-related configuration
#[derive(Debug, Clone)]
pub struct AccountConfig {
    /// Password secret (required)
    pub token: String,
    /// Cache namespace for options entries
    pub cache_key: String,
    /// Lifetime of a cached options entry
    pub cache_expires: Duration,
    /// Field users are identified by
    pub natural_key: NaturalKey,
    /// Users created at startup when missing, natural key to password
    pub seed: BTreeMap<String, String>,
}

impl AccountConfig {
    /// Service settings derived from this configuration
    pub fn settings(&self) -> AccountSettings {
        AccountSettings {
            token: self.token.clone(),
            key: self.natural_key,
            cache_key: self.cache_key.clone(),
            cache_expires: self.cache_expires,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `database_url_override` - Optional database URL override (from CLI args)
    /// * `redis_url_override` - Optional Redis URL override (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or invalid
    pub fn from_env(
        database_url_override: Option<String>,
        redis_url_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        let database_url = database_url_override
            .or_else(|| std::env::var("DATABASE_URL").ok())
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let database = DatabaseConfig {
            database_url,
            max_connections: parse_env_or("DB_MAX_CONNECTIONS", 20),
            min_connections: parse_env_or("DB_MIN_CONNECTIONS", 5),
            connection_timeout_secs: parse_env_or("DB_CONNECTION_TIMEOUT_SECS", 5),
            idle_timeout_secs: parse_env_or("DB_IDLE_TIMEOUT_SECS", 300),
            max_lifetime_secs: parse_env_or("DB_MAX_LIFETIME_SECS", 1800),
            table_prefix: std::env::var("DB_TABLE_PREFIX").unwrap_or_default(),
        };

        let redis_url = redis_url_override
            .or_else(|| std::env::var("REDIS_URL").ok())
            .unwrap_or_else(|| DEFAULT_REDIS_URL.to_string());

        let token = std::env::var("USER_TOKEN").map_err(|_| ConfigError::MissingRequired {
            var: "USER_TOKEN".to_string(),
            hint: "Generate with: openssl rand -hex 16".to_string(),
        })?;

        let natural_key = match std::env::var("USER_NATURAL_KEY") {
            Ok(raw) => raw.parse::<NaturalKey>().map_err(|reason| ConfigError::Invalid {
                var: "USER_NATURAL_KEY".to_string(),
                reason,
            })?,
            Err(_) => NaturalKey::Name,
        };

        let seed = match std::env::var("USER_SEED") {
            Ok(raw) => parse_seed(&raw)?,
            Err(_) => BTreeMap::new(),
        };

        let account = AccountConfig {
            token,
            cache_key: std::env::var("USER_CACHE_KEY")
                .unwrap_or_else(|_| "user.options".to_string()),
            cache_expires: Duration::from_secs(parse_env_or("USER_CACHE_EXPIRES_SECS", 300)),
            natural_key,
            seed,
        };

        Ok(ServerConfig {
            database,
            redis_url,
            account,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.account.token.is_empty() {
            return Err(ConfigError::Invalid {
                var: "USER_TOKEN".to_string(),
                reason: "Must not be empty".to_string(),
            });
        }

        if self.account.cache_expires.is_zero() {
            return Err(ConfigError::Invalid {
                var: "USER_CACHE_EXPIRES_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid {
                var: "DB_MIN_CONNECTIONS".to_string(),
                reason: format!(
                    "Cannot exceed max connections ({})",
                    self.database.max_connections
                ),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Parse `USER_SEED`, a JSON object of natural key to password.
///
/// Non-string passwords are taken as their JSON text; `null` as empty.
fn parse_seed(raw: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        var: "USER_SEED".to_string(),
        reason,
    };

    let value: Value = serde_json::from_str(raw).map_err(|e| invalid(e.to_string()))?;
    let Value::Object(entries) = value else {
        return Err(invalid("Must be a JSON object".to_string()));
    };

    Ok(entries
        .into_iter()
        .map(|(identity, password)| {
            let password = match password {
                Value::Null => String::new(),
                Value::String(s) => s,
                other => other.to_string(),
            };
            (identity, password)
        })
        .collect())
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ServerConfig {
        ServerConfig {
            database: DatabaseConfig {
                database_url: "test".to_string(),
                max_connections: 10,
                min_connections: 1,
                connection_timeout_secs: 5,
                idle_timeout_secs: 300,
                max_lifetime_secs: 1800,
                table_prefix: String::new(),
            },
            redis_url: DEFAULT_REDIS_URL.to_string(),
            account: AccountConfig {
                token: "secret".to_string(),
                cache_key: "user.options".to_string(),
                cache_expires: Duration::from_secs(300),
                natural_key: NaturalKey::Name,
                seed: BTreeMap::new(),
            },
        }
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingRequired {
            var: "USER_TOKEN".to_string(),
            hint: "Use openssl".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("USER_TOKEN"));
        assert!(msg.contains("Use openssl"));
    }

    #[test]
    fn test_config_validation_ok() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_config_validation_empty_token() {
        let mut config = test_config();
        config.account.token = String::new();

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref var, .. } if var == "USER_TOKEN"));
    }

    #[test]
    fn test_config_validation_zero_expiry() {
        let mut config = test_config();
        config.account.cache_expires = Duration::ZERO;

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_config_validation_pool_bounds() {
        let mut config = test_config();
        config.database.min_connections = 50;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_seed() {
        let seed = parse_seed(r#"{"admin": "pw", "ops": 1234, "guest": null}"#).unwrap();

        assert_eq!(seed.get("admin").map(String::as_str), Some("pw"));
        assert_eq!(seed.get("ops").map(String::as_str), Some("1234"));
        assert_eq!(seed.get("guest").map(String::as_str), Some(""));
    }

    #[test]
    fn test_parse_seed_rejects_non_object() {
        assert!(parse_seed("[1, 2]").is_err());
        assert!(parse_seed("not json").is_err());
    }

    #[test]
    fn test_account_settings() {
        let settings = test_config().account.settings();
        assert_eq!(settings.token, "secret");
        assert_eq!(settings.key, NaturalKey::Name);
        assert_eq!(settings.cache_expires, Duration::from_secs(300));
    }
}
