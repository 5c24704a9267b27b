//! Repository trait definitions and their PostgreSQL implementations.
//!
//! The account service only talks to storage through [`UserRepository`] and
//! [`OptionsRepository`], so it can run against PostgreSQL or the in-memory
//! [`MemoryStore`](super::MemoryStore).

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, postgres::PgRow};

use super::Tables;
use crate::account::{AccountError, AccountResult};
use crate::model::{OptionsType, User, UserId, UserOptions};

/// Listing order, by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// `asc` selects ascending order; anything else is descending.
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("asc") {
            SortOrder::Asc
        } else {
            SortOrder::Desc
        }
    }

    fn sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Conjunctive user listing filter. Empty fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    pub uid: Option<UserId>,
    pub identity: Option<String>,
    pub identities: Vec<String>,
}

impl UserFilter {
    pub fn matches(&self, user: &User) -> bool {
        self.uid.is_none_or(|uid| user.id == uid)
            && self.identity.as_ref().is_none_or(|key| &user.identity == key)
            && (self.identities.is_empty() || self.identities.contains(&user.identity))
    }
}

/// Trait for user repository operations
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user inside one transaction, after checking the natural key
    /// is free. Fails with `DuplicateIdentifier` when it is taken.
    async fn create_user(&self, user: &User) -> AccountResult<User>;

    /// Find user by ID
    async fn find_by_id(&self, id: UserId) -> AccountResult<Option<User>>;

    /// Find user by natural key
    async fn find_by_identity(&self, identity: &str) -> AccountResult<Option<User>>;

    /// Replace the encoded password and modification time
    async fn update_password(&self, id: UserId, password: &str, mtime: i64) -> AccountResult<()>;

    /// Update the last access time
    async fn update_atime(&self, id: UserId, atime: i64) -> AccountResult<()>;

    /// Count users matching `filter`
    async fn count_users(&self, filter: &UserFilter) -> AccountResult<i64>;

    /// One page of users matching `filter`
    async fn query_users(
        &self,
        filter: &UserFilter,
        order: SortOrder,
        offset: i64,
        limit: i64,
    ) -> AccountResult<Vec<User>>;
}

/// Trait for options repository operations
#[async_trait]
pub trait OptionsRepository: Send + Sync {
    /// Find the bucket `name` of user `uid`
    async fn find_options(&self, uid: UserId, name: &str) -> AccountResult<Option<UserOptions>>;

    /// Insert (`id == 0`) or update a bucket and touch the owner's `mtime`,
    /// in one transaction. Returns the stored bucket.
    async fn save_options(&self, options: &UserOptions, mtime: i64) -> AccountResult<UserOptions>;
}

/// Default PostgreSQL implementation of `UserRepository`
pub struct PgUserRepository {
    pool: PgPool,
    tables: Tables,
}

impl PgUserRepository {
    pub fn new(pool: PgPool, tables: Tables) -> Self {
        Self { pool, tables }
    }

    fn select_users(&self) -> String {
        format!(
            "SELECT id, {key} AS identity, password, ctime, atime, mtime FROM {table}",
            key = self.tables.key.field(),
            table = self.tables.user,
        )
    }

    fn user_from_row(&self, row: &PgRow) -> User {
        User {
            id: row.get("id"),
            key: self.tables.key,
            identity: row.get("identity"),
            password: row.get("password"),
            ctime: row.get("ctime"),
            atime: row.get("atime"),
            mtime: row.get("mtime"),
        }
    }

    fn push_filter(&self, qb: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
        let key = self.tables.key.field();
        qb.push(" WHERE TRUE");

        if let Some(uid) = filter.uid {
            qb.push(" AND id = ").push_bind(uid);
        }

        if let Some(identity) = &filter.identity {
            qb.push(format_args!(" AND {key} = ")).push_bind(identity.clone());
        }

        if !filter.identities.is_empty() {
            qb.push(format_args!(" AND {key} IN ("));
            let mut separated = qb.separated(", ");
            for identity in &filter.identities {
                separated.push_bind(identity.clone());
            }
            separated.push_unseparated(")");
        }
    }

    fn insert_error(&self, err: sqlx::Error) -> AccountError {
        match err.as_database_error() {
            Some(db) if db.is_unique_violation() => {
                AccountError::DuplicateIdentifier(self.tables.key.field())
            }
            _ => err.into(),
        }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create_user(&self, user: &User) -> AccountResult<User> {
        let key = self.tables.key.field();
        let mut tx = self.pool.begin().await?;

        let exists_sql = format!("SELECT id FROM {} WHERE {key} = $1", self.tables.user);
        let existing = sqlx::query(&exists_sql)
            .bind(&user.identity)
            .fetch_optional(&mut *tx)
            .await?;

        if existing.is_some() {
            tx.rollback().await?;
            return Err(AccountError::DuplicateIdentifier(key));
        }

        // A concurrent create of the same key fails here on the UNIQUE constraint.
        let insert_sql = format!(
            "INSERT INTO {} ({key}, password, ctime, atime, mtime) VALUES ($1, $2, $3, $4, $5) RETURNING id",
            self.tables.user
        );
        let row = sqlx::query(&insert_sql)
            .bind(&user.identity)
            .bind(&user.password)
            .bind(user.ctime)
            .bind(user.atime)
            .bind(user.mtime)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| self.insert_error(e))?;

        tx.commit().await.map_err(|e| self.insert_error(e))?;

        Ok(User {
            id: row.get("id"),
            key: self.tables.key,
            ..user.clone()
        })
    }

    async fn find_by_id(&self, id: UserId) -> AccountResult<Option<User>> {
        let sql = format!("{} WHERE id = $1", self.select_users());
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| self.user_from_row(&r)))
    }

    async fn find_by_identity(&self, identity: &str) -> AccountResult<Option<User>> {
        let sql = format!(
            "{} WHERE {} = $1",
            self.select_users(),
            self.tables.key.field()
        );
        let row = sqlx::query(&sql)
            .bind(identity)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| self.user_from_row(&r)))
    }

    async fn update_password(&self, id: UserId, password: &str, mtime: i64) -> AccountResult<()> {
        let sql = format!(
            "UPDATE {} SET password = $1, mtime = $2 WHERE id = $3",
            self.tables.user
        );
        sqlx::query(&sql)
            .bind(password)
            .bind(mtime)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_atime(&self, id: UserId, atime: i64) -> AccountResult<()> {
        let sql = format!("UPDATE {} SET atime = $1 WHERE id = $2", self.tables.user);
        sqlx::query(&sql)
            .bind(atime)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn count_users(&self, filter: &UserFilter) -> AccountResult<i64> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT COUNT(*) FROM {}", self.tables.user));
        self.push_filter(&mut qb, filter);

        let row = qb.build().fetch_one(&self.pool).await?;
        Ok(row.get::<i64, _>(0))
    }

    async fn query_users(
        &self,
        filter: &UserFilter,
        order: SortOrder,
        offset: i64,
        limit: i64,
    ) -> AccountResult<Vec<User>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(self.select_users());
        self.push_filter(&mut qb, filter);
        qb.push(format_args!(" ORDER BY id {}", order.sql()));
        qb.push(" LIMIT ").push_bind(limit);
        qb.push(" OFFSET ").push_bind(offset);

        let rows = qb.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().map(|r| self.user_from_row(r)).collect())
    }
}

/// Default PostgreSQL implementation of `OptionsRepository`
pub struct PgOptionsRepository {
    pool: PgPool,
    tables: Tables,
}

impl PgOptionsRepository {
    pub fn new(pool: PgPool, tables: Tables) -> Self {
        Self { pool, tables }
    }
}

#[async_trait]
impl OptionsRepository for PgOptionsRepository {
    async fn find_options(&self, uid: UserId, name: &str) -> AccountResult<Option<UserOptions>> {
        let sql = format!(
            "SELECT id, uid, name, type, options FROM {} WHERE uid = $1 AND name = $2",
            self.tables.user_options
        );
        let row = sqlx::query(&sql)
            .bind(uid)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| UserOptions {
            id: r.get("id"),
            uid: r.get("uid"),
            name: r.get("name"),
            kind: OptionsType::from(r.get::<String, _>("type")),
            options: r.get("options"),
        }))
    }

    async fn save_options(&self, options: &UserOptions, mtime: i64) -> AccountResult<UserOptions> {
        let mut tx = self.pool.begin().await?;

        let touch_sql = format!("UPDATE {} SET mtime = $1 WHERE id = $2", self.tables.user);
        sqlx::query(&touch_sql)
            .bind(mtime)
            .bind(options.uid)
            .execute(&mut *tx)
            .await?;

        let id = if options.id == 0 {
            let insert_sql = format!(
                "INSERT INTO {} (uid, name, type, options) VALUES ($1, $2, $3, $4) RETURNING id",
                self.tables.user_options
            );
            let row = sqlx::query(&insert_sql)
                .bind(options.uid)
                .bind(&options.name)
                .bind(options.kind.as_str())
                .bind(&options.options)
                .fetch_one(&mut *tx)
                .await?;
            row.get("id")
        } else {
            let update_sql = format!(
                "UPDATE {} SET options = $1, type = $2 WHERE id = $3",
                self.tables.user_options
            );
            sqlx::query(&update_sql)
                .bind(&options.options)
                .bind(options.kind.as_str())
                .bind(options.id)
                .execute(&mut *tx)
                .await?;
            options.id
        };

        tx.commit().await?;

        Ok(UserOptions {
            id,
            ..options.clone()
        })
    }
}
