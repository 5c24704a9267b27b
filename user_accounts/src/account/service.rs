//! Account service implementation.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use super::{
    errors::{AccountError, AccountResult, ERRNO_STORAGE},
    tasks::{Envelope, QueryCounter, QueryPage, QueryRequest, Task, TaskResult},
};
use crate::cache::Cache;
use crate::db::{OptionsRepository, SortOrder, UserFilter, UserRepository};
use crate::model::{NaturalKey, OptionsType, PasswordEncoder, User, UserId, UserOptions, unix_now};

/// Page size used when a query does not give one
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Largest page a single query may return
pub const MAX_PAGE_SIZE: i64 = 100;

/// Service settings
#[derive(Debug, Clone)]
pub struct AccountSettings {
    /// Secret appended to every password before hashing
    pub token: String,
    /// Field that identifies an account
    pub key: NaturalKey,
    /// Namespace for cached options entries
    pub cache_key: String,
    /// Lifetime of a cached options entry
    pub cache_expires: Duration,
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self {
            token: String::new(),
            key: NaturalKey::Name,
            cache_key: "user.options".to_string(),
            cache_expires: Duration::from_secs(300),
        }
    }
}

/// Account service
#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserRepository>,
    options: Arc<dyn OptionsRepository>,
    cache: Arc<dyn Cache>,
    encoder: PasswordEncoder,
    key: NaturalKey,
    cache_key: String,
    cache_expires: Duration,
}

impl AccountService {
    /// Create a new account service
    ///
    /// # Arguments
    ///
    /// * `users` - User storage
    /// * `options` - Options storage
    /// * `cache` - Cache consulted before options storage
    /// * `settings` - Password secret, natural key and cache settings
    pub fn new(
        users: Arc<dyn UserRepository>,
        options: Arc<dyn OptionsRepository>,
        cache: Arc<dyn Cache>,
        settings: AccountSettings,
    ) -> Self {
        Self {
            users,
            options,
            cache,
            encoder: PasswordEncoder::new(settings.token),
            key: settings.key,
            cache_key: settings.cache_key,
            cache_expires: settings.cache_expires,
        }
    }

    pub fn key(&self) -> NaturalKey {
        self.key
    }

    /// Run one task and wrap its outcome in a result envelope.
    pub async fn handle(&self, task: Task) -> TaskResult {
        let name = task.name();
        let result = match task {
            Task::Create(req) => {
                TaskResult::User(self.create(&req.identity, &req.password).await.into())
            }
            Task::Get(req) => TaskResult::User(
                self.get(req.id, &req.identity, req.autocreate)
                    .await
                    .into(),
            ),
            Task::SetPassword(req) => {
                TaskResult::User(self.set_password(req.id, &req.password).await.into())
            }
            Task::Login(req) => {
                TaskResult::User(self.login(&req.identity, &req.password).await.into())
            }
            Task::VerifyPassword(req) => {
                TaskResult::User(self.verify_password(req.id, &req.password).await.into())
            }
            Task::GetOptions(req) => {
                TaskResult::Options(self.get_options(req.uid, &req.name).await.into())
            }
            Task::SetOptions(req) => TaskResult::Done(Envelope::from(
                self.set_options(req.uid, &req.name, req.kind, &req.options)
                    .await,
            )),
            Task::Query(req) => TaskResult::Query(self.query(&req).await.into()),
        };

        let envelope = result.envelope();
        if envelope.errno == ERRNO_STORAGE {
            error!(task = name, errmsg = %envelope.errmsg, "Storage failure");
        } else if !envelope.is_ok() {
            debug!(
                task = name,
                errno = envelope.errno,
                errmsg = %envelope.errmsg,
                "Task failed"
            );
        }
        result
    }

    /// Register a new account
    ///
    /// An empty password is replaced by a random one nobody knows.
    ///
    /// # Errors
    ///
    /// * `AccountError::MissingIdentifier` - Natural key is empty
    /// * `AccountError::DuplicateIdentifier` - Natural key already taken
    /// * `AccountError::Storage` - Storage failure
    #[instrument(skip(self, password))]
    pub async fn create(&self, identity: &str, password: &str) -> AccountResult<User> {
        if identity.is_empty() {
            return Err(AccountError::MissingIdentifier(self.key.field()));
        }

        let user = User::new(
            self.key,
            identity,
            self.encoder.encode_or_generate(password),
            unix_now(),
        );

        let created = self.users.create_user(&user).await.inspect_err(|e| {
            if matches!(e, AccountError::DuplicateIdentifier(_)) {
                warn!("Create rejected, identity already exists");
            }
        })?;

        info!(id = created.id, "Created user");
        Ok(created)
    }

    /// Look an account up by id, or by natural key when `id` is 0.
    ///
    /// With `autocreate`, a missing account is registered with a generated
    /// password; if that fails the caller still sees `NotFound`.
    #[instrument(skip(self))]
    pub async fn get(&self, id: UserId, identity: &str, autocreate: bool) -> AccountResult<User> {
        let found = if id != 0 {
            self.users.find_by_id(id).await?
        } else if !identity.is_empty() {
            self.users.find_by_identity(identity).await?
        } else {
            return Err(AccountError::MissingIdentifier("uid"));
        };

        if let Some(user) = found {
            return Ok(user);
        }

        if autocreate && !identity.is_empty() {
            match self.create(identity, "").await {
                Ok(user) => return Ok(user),
                Err(e) => debug!(error = %e, "Autocreate failed"),
            }
        }

        Err(AccountError::NotFound)
    }

    /// Replace an account's password. An empty password is generated.
    #[instrument(skip(self, password))]
    pub async fn set_password(&self, id: UserId, password: &str) -> AccountResult<User> {
        if id == 0 {
            return Err(AccountError::MissingIdentifier("uid"));
        }

        let mut user = self
            .users
            .find_by_id(id)
            .await?
            .ok_or(AccountError::NotFound)?;

        let encoded = self.encoder.encode_or_generate(password);
        let now = unix_now();
        self.users.update_password(id, &encoded, now).await?;

        user.password = encoded;
        user.mtime = now;
        info!("Password changed");
        Ok(user)
    }

    /// Authenticate by natural key and password
    ///
    /// The access time is refreshed on success. Failing to persist it is
    /// logged and does not fail the login.
    ///
    /// # Errors
    ///
    /// * `AccountError::MissingIdentifier` - Natural key is empty
    /// * `AccountError::MissingPassword` - Password is empty
    /// * `AccountError::NotFound` - No such account
    /// * `AccountError::BadPassword` - Password mismatch
    #[instrument(skip(self, password))]
    pub async fn login(&self, identity: &str, password: &str) -> AccountResult<User> {
        if identity.is_empty() {
            return Err(AccountError::MissingIdentifier(self.key.field()));
        }
        if password.is_empty() {
            return Err(AccountError::MissingPassword);
        }

        let mut user = self
            .users
            .find_by_identity(identity)
            .await?
            .ok_or(AccountError::NotFound)?;

        if !self.encoder.matches(password, &user.password) {
            warn!(id = user.id, "Login failed: bad password");
            return Err(AccountError::BadPassword);
        }

        let now = unix_now();
        match self.users.update_atime(user.id, now).await {
            Ok(()) => user.atime = now,
            Err(e) => warn!(id = user.id, error = %e, "Failed to record access time"),
        }

        info!(id = user.id, "User logged in");
        Ok(user)
    }

    /// Check a password against the stored one without touching the account.
    #[instrument(skip(self, password))]
    pub async fn verify_password(&self, id: UserId, password: &str) -> AccountResult<User> {
        if id == 0 {
            return Err(AccountError::MissingIdentifier("uid"));
        }

        let user = self
            .users
            .find_by_id(id)
            .await?
            .ok_or(AccountError::NotFound)?;

        if !self.encoder.matches(password, &user.password) {
            warn!("Password check failed");
            return Err(AccountError::BadPassword);
        }
        Ok(user)
    }

    fn options_cache_key(&self, uid: UserId, name: &str) -> String {
        format!("{}.{}.{}", self.cache_key, uid, name)
    }

    /// Read a named options record, through the cache.
    ///
    /// Returns `None` when the record does not exist or holds no JSON
    /// value. Cache failures fall back to storage.
    #[instrument(skip(self))]
    pub async fn get_options(&self, uid: UserId, name: &str) -> AccountResult<Option<Value>> {
        if uid == 0 {
            return Err(AccountError::MissingIdentifier("uid"));
        }

        let key = self.options_cache_key(uid, name);
        match self.cache.get(&key).await {
            Ok(Some(raw)) if !raw.is_empty() => match serde_json::from_str::<UserOptions>(&raw) {
                Ok(cached) => {
                    debug!("Options cache hit");
                    return Ok(cached.get_options());
                }
                Err(e) => warn!(key = %key, error = %e, "Discarding undecodable cache entry"),
            },
            Ok(_) => {}
            Err(e) => warn!(key = %key, error = %e, "Cache read failed"),
        }

        let Some(options) = self.options.find_options(uid, name).await? else {
            return Ok(None);
        };

        match serde_json::to_string(&options) {
            Ok(raw) => {
                if let Err(e) = self.cache.set(&key, &raw, self.cache_expires).await {
                    warn!(key = %key, error = %e, "Cache write failed");
                }
            }
            Err(e) => warn!(error = %e, "Failed to encode options for cache"),
        }

        Ok(options.get_options())
    }

    /// Write a named options record
    ///
    /// A `json` record is shallow-merged with the given object; a `text`
    /// record is replaced. Changing the type drops the old payload. The
    /// cached copy is removed after the write commits.
    #[instrument(skip(self, value))]
    pub async fn set_options(
        &self,
        uid: UserId,
        name: &str,
        kind: OptionsType,
        value: &Value,
    ) -> AccountResult<()> {
        if uid == 0 {
            return Err(AccountError::MissingIdentifier("uid"));
        }

        let mut options = match self.options.find_options(uid, name).await? {
            Some(mut existing) => {
                existing.set_kind(kind);
                existing
            }
            None => UserOptions::new(uid, name, kind),
        };
        options.set_options(value);

        let saved = self.options.save_options(&options, unix_now()).await?;

        let key = self.options_cache_key(saved.uid, &saved.name);
        if let Err(e) = self.cache.remove(&key).await {
            warn!(key = %key, error = %e, "Cache invalidation failed");
        }
        Ok(())
    }

    /// List accounts one page at a time
    ///
    /// Page index defaults to 1 and page size to [`DEFAULT_PAGE_SIZE`],
    /// capped at [`MAX_PAGE_SIZE`]. Ordering is by id, descending unless
    /// `orderBy` is `asc`.
    #[instrument(skip(self, request))]
    pub async fn query(&self, request: &QueryRequest) -> AccountResult<QueryPage> {
        let page_index = request.page_index.max(1);
        let page_size = if request.page_size < 1 {
            DEFAULT_PAGE_SIZE
        } else {
            request.page_size.min(MAX_PAGE_SIZE)
        };

        let filter = UserFilter {
            uid: (request.uid != 0).then_some(request.uid),
            identity: (!request.identity.is_empty()).then(|| request.identity.clone()),
            identities: request.names.clone(),
        };
        let order = SortOrder::parse(&request.order_by);

        let counter = if request.counter {
            let row_count = self.users.count_users(&filter).await?;
            Some(QueryCounter::new(page_index, page_size, row_count))
        } else {
            None
        };

        let offset = (page_index - 1).saturating_mul(page_size);
        let users = self
            .users
            .query_users(&filter, order, offset, page_size)
            .await?;

        Ok(QueryPage { users, counter })
    }

    /// Create every seed account that does not exist yet.
    ///
    /// Failures are logged and skipped. Returns the number created.
    pub async fn provision(&self, seeds: &BTreeMap<String, String>) -> usize {
        let mut created = 0;

        for (identity, password) in seeds {
            match self.users.find_by_identity(identity).await {
                Ok(Some(_)) => debug!(identity = %identity, "Seed user already present"),
                Ok(None) => match self.create(identity, password).await {
                    Ok(user) => {
                        info!(identity = %identity, id = user.id, "Provisioned seed user");
                        created += 1;
                    }
                    Err(e) => error!(identity = %identity, error = %e, "Failed to provision seed user"),
                },
                Err(e) => error!(identity = %identity, error = %e, "Failed to look up seed user"),
            }
        }

        created
    }
}
