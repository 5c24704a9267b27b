//! In-memory storage, useful for tests and single-process deployments.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::Mutex;

use super::repository::{OptionsRepository, SortOrder, UserFilter, UserRepository};
use crate::account::{AccountError, AccountResult};
use crate::model::{User, UserId, UserOptions};

/// Storage calls that can be made to fail with [`MemoryStore::fail`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreCall {
    CreateUser,
    FindUser,
    UpdatePassword,
    UpdateAtime,
    CountUsers,
    QueryUsers,
    FindOptions,
    SaveOptions,
}

#[derive(Default)]
struct StoreData {
    users: BTreeMap<UserId, User>,
    options: HashMap<(UserId, String), UserOptions>,
    next_user_id: UserId,
    next_options_id: i64,
    failing: HashSet<StoreCall>,
    failure_message: String,
}

impl StoreData {
    fn check(&self, call: StoreCall) -> AccountResult<()> {
        if self.failing.contains(&call) {
            return Err(AccountError::Storage(self.failure_message.clone()));
        }
        Ok(())
    }
}

/// Both repositories over one in-process map. Uniqueness of the natural key
/// and of (`uid`, `name`) holds because every call runs under one lock.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<StoreData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later `call` fail with a storage error carrying `message`.
    pub async fn fail(&self, call: StoreCall, message: &str) {
        let mut data = self.data.lock().await;
        data.failing.insert(call);
        data.failure_message = message.to_string();
    }

    /// Clear all injected failures.
    pub async fn heal(&self) {
        self.data.lock().await.failing.clear();
    }

    /// Number of stored users.
    pub async fn user_count(&self) -> usize {
        self.data.lock().await.users.len()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, user: &User) -> AccountResult<User> {
        let mut data = self.data.lock().await;
        data.check(StoreCall::CreateUser)?;

        if data.users.values().any(|u| u.identity == user.identity) {
            return Err(AccountError::DuplicateIdentifier(user.key.field()));
        }

        data.next_user_id += 1;
        let created = User {
            id: data.next_user_id,
            ..user.clone()
        };
        data.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: UserId) -> AccountResult<Option<User>> {
        let data = self.data.lock().await;
        data.check(StoreCall::FindUser)?;
        Ok(data.users.get(&id).cloned())
    }

    async fn find_by_identity(&self, identity: &str) -> AccountResult<Option<User>> {
        let data = self.data.lock().await;
        data.check(StoreCall::FindUser)?;
        Ok(data.users.values().find(|u| u.identity == identity).cloned())
    }

    async fn update_password(&self, id: UserId, password: &str, mtime: i64) -> AccountResult<()> {
        let mut data = self.data.lock().await;
        data.check(StoreCall::UpdatePassword)?;
        if let Some(user) = data.users.get_mut(&id) {
            user.password = password.to_string();
            user.mtime = mtime;
        }
        Ok(())
    }

    async fn update_atime(&self, id: UserId, atime: i64) -> AccountResult<()> {
        let mut data = self.data.lock().await;
        data.check(StoreCall::UpdateAtime)?;
        if let Some(user) = data.users.get_mut(&id) {
            user.atime = atime;
        }
        Ok(())
    }

    async fn count_users(&self, filter: &UserFilter) -> AccountResult<i64> {
        let data = self.data.lock().await;
        data.check(StoreCall::CountUsers)?;
        Ok(data.users.values().filter(|u| filter.matches(u)).count() as i64)
    }

    async fn query_users(
        &self,
        filter: &UserFilter,
        order: SortOrder,
        offset: i64,
        limit: i64,
    ) -> AccountResult<Vec<User>> {
        let data = self.data.lock().await;
        data.check(StoreCall::QueryUsers)?;

        let matching = data.users.values().filter(|u| filter.matches(u));
        let ordered: Vec<&User> = match order {
            SortOrder::Asc => matching.collect(),
            SortOrder::Desc => matching.rev().collect(),
        };

        Ok(ordered
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OptionsRepository for MemoryStore {
    async fn find_options(&self, uid: UserId, name: &str) -> AccountResult<Option<UserOptions>> {
        let data = self.data.lock().await;
        data.check(StoreCall::FindOptions)?;
        Ok(data.options.get(&(uid, name.to_string())).cloned())
    }

    async fn save_options(&self, options: &UserOptions, mtime: i64) -> AccountResult<UserOptions> {
        let mut data = self.data.lock().await;
        data.check(StoreCall::SaveOptions)?;

        if let Some(user) = data.users.get_mut(&options.uid) {
            user.mtime = mtime;
        }

        let key = (options.uid, options.name.clone());
        let id = match data.options.get(&key) {
            Some(existing) => existing.id,
            None => {
                data.next_options_id += 1;
                data.next_options_id
            }
        };

        let saved = UserOptions {
            id,
            ..options.clone()
        };
        data.options.insert(key, saved.clone());
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NaturalKey, OptionsType};

    fn new_user(identity: &str) -> User {
        User::new(NaturalKey::Name, identity, "hash".to_string(), 10)
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_ids() {
        let store = MemoryStore::new();

        let first = store.create_user(&new_user("alice")).await.unwrap();
        let second = store.create_user(&new_user("bob")).await.unwrap();

        assert_eq!(first.id, 1, "First user should have ID 1");
        assert_eq!(second.id, 2, "Second user should have ID 2");
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_identity() {
        let store = MemoryStore::new();
        store.create_user(&new_user("alice")).await.unwrap();

        let err = store.create_user(&new_user("alice")).await.unwrap_err();
        assert_eq!(err, AccountError::DuplicateIdentifier("name"));
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_query_orders_and_pages() {
        let store = MemoryStore::new();
        for name in ["a", "b", "c", "d", "e"] {
            store.create_user(&new_user(name)).await.unwrap();
        }
        let filter = UserFilter::default();

        let desc = store.query_users(&filter, SortOrder::Desc, 0, 2).await.unwrap();
        let ids: Vec<UserId> = desc.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![5, 4]);

        let asc = store.query_users(&filter, SortOrder::Asc, 4, 10).await.unwrap();
        let ids: Vec<UserId> = asc.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![5]);

        assert_eq!(store.count_users(&filter).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_save_options_upserts_and_touches_owner() {
        let store = MemoryStore::new();
        let user = store.create_user(&new_user("alice")).await.unwrap();

        let mut options = UserOptions::new(user.id, "prefs", OptionsType::Text);
        options.options = "one".to_string();
        let saved = store.save_options(&options, 50).await.unwrap();
        assert!(saved.id > 0);

        let mut updated = saved.clone();
        updated.options = "two".to_string();
        let resaved = store.save_options(&updated, 60).await.unwrap();
        assert_eq!(resaved.id, saved.id, "Update should keep the row id");

        let found = store.find_options(user.id, "prefs").await.unwrap().unwrap();
        assert_eq!(found.options, "two");

        let owner = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(owner.mtime, 60);
    }

    #[tokio::test]
    async fn test_injected_failure_and_heal() {
        let store = MemoryStore::new();
        store.fail(StoreCall::FindUser, "database is down").await;

        let err = store.find_by_id(1).await.unwrap_err();
        assert_eq!(err, AccountError::Storage("database is down".to_string()));

        store.heal().await;
        assert!(store.find_by_id(1).await.unwrap().is_none());
    }
}
