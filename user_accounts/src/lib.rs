//! # User Accounts
//!
//! A user-account service: registration, lookup, password management,
//! login, named per-user option buckets and paged listing.
//!
//! Accounts live in PostgreSQL (or in memory for tests). Option buckets are
//! cached read-through in Redis and invalidated on every write.
//!
//! ## Core Modules
//!
//! - [`account`]: The [`AccountService`] and the typed tasks it handles
//! - [`model`]: Users, option buckets and password encoding
//! - [`db`]: Storage traits with PostgreSQL and in-memory implementations
//! - [`cache`]: Cache trait with Redis and in-memory implementations
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use user_accounts::{AccountService, AccountSettings, MemoryCache, MemoryStore};
//!
//! let store = Arc::new(MemoryStore::new());
//! let service = AccountService::new(
//!     store.clone(),
//!     store,
//!     Arc::new(MemoryCache::new()),
//!     AccountSettings::default(),
//! );
//! ```

pub mod account;
pub mod cache;
pub mod db;
pub mod model;

pub use account::{AccountError, AccountResult, AccountService, AccountSettings, Task, TaskResult};
pub use cache::{Cache, MemoryCache, RedisCache};
pub use db::{Database, DatabaseConfig, MemoryStore, Tables};
pub use model::{NaturalKey, OptionsType, User, UserId, UserOptions};
