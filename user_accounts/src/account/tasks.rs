//! Typed requests and results for every account operation, and the
//! [`Task`] enum the dispatcher routes by operation name.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::errors::{AccountError, AccountResult, ERRNO_OK};
use crate::model::{OptionsType, User, UserId};

/// Common result envelope. `errno` is 0 on success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub errno: i32,
    pub errmsg: String,
}

impl Envelope {
    pub fn ok() -> Self {
        Self {
            errno: ERRNO_OK,
            errmsg: String::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errno == ERRNO_OK
    }
}

impl From<&AccountError> for Envelope {
    fn from(err: &AccountError) -> Self {
        Self {
            errno: err.errno(),
            errmsg: err.to_string(),
        }
    }
}

impl From<AccountResult<()>> for Envelope {
    fn from(result: AccountResult<()>) -> Self {
        match result {
            Ok(()) => Envelope::ok(),
            Err(e) => Envelope::from(&e),
        }
    }
}

/// `User.Create`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateRequest {
    #[serde(rename = "name", alias = "phone")]
    pub identity: String,
    pub password: String,
}

/// `User.Get`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GetRequest {
    #[serde(alias = "uid")]
    pub id: UserId,
    #[serde(rename = "name", alias = "phone")]
    pub identity: String,
    pub autocreate: bool,
}

/// `User.Set`: replace a password, generating one when none is given.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SetPasswordRequest {
    #[serde(alias = "uid")]
    pub id: UserId,
    pub password: String,
}

/// `User.Login`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    #[serde(rename = "name", alias = "phone")]
    pub identity: String,
    pub password: String,
}

/// `User.Password`: check a password without logging in.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VerifyPasswordRequest {
    #[serde(alias = "uid")]
    pub id: UserId,
    pub password: String,
}

/// `User.GetOptions`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GetOptionsRequest {
    pub uid: UserId,
    pub name: String,
}

/// `User.SetOptions`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SetOptionsRequest {
    pub uid: UserId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: OptionsType,
    pub options: Value,
}

/// `User.Query`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QueryRequest {
    pub uid: UserId,
    #[serde(rename = "name", alias = "phone")]
    pub identity: String,
    #[serde(alias = "phones", deserialize_with = "identity_list")]
    pub names: Vec<String>,
    #[serde(rename = "orderBy")]
    pub order_by: String,
    #[serde(rename = "pageIndex", alias = "p")]
    pub page_index: i64,
    #[serde(rename = "pageSize", alias = "size")]
    pub page_size: i64,
    pub counter: bool,
}

/// Accepts `"a,b,c"` as well as `["a", "b", "c"]`.
fn identity_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdentityList {
        Joined(String),
        List(Vec<String>),
    }

    let list = match IdentityList::deserialize(deserializer)? {
        IdentityList::Joined(joined) => joined.split(',').map(str::to_string).collect(),
        IdentityList::List(list) => list,
    };
    Ok(list.into_iter().filter(|s| !s.is_empty()).collect())
}

/// Result carrying a user record.
#[derive(Debug, Clone, Serialize)]
pub struct UserResult {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

impl From<AccountResult<User>> for UserResult {
    fn from(result: AccountResult<User>) -> Self {
        match result {
            Ok(user) => Self {
                envelope: Envelope::ok(),
                user: Some(user),
            },
            Err(e) => Self {
                envelope: Envelope::from(&e),
                user: None,
            },
        }
    }
}

/// Result carrying a decoded options payload.
#[derive(Debug, Clone, Serialize)]
pub struct OptionsResult {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
}

impl From<AccountResult<Option<Value>>> for OptionsResult {
    fn from(result: AccountResult<Option<Value>>) -> Self {
        match result {
            Ok(options) => Self {
                envelope: Envelope::ok(),
                options,
            },
            Err(e) => Self {
                envelope: Envelope::from(&e),
                options: None,
            },
        }
    }
}

/// Paging information returned by `User.Query` on request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryCounter {
    pub page_index: i64,
    pub page_size: i64,
    pub page_count: i64,
    pub row_count: i64,
}

impl QueryCounter {
    pub fn new(page_index: i64, page_size: i64, row_count: i64) -> Self {
        Self {
            page_index,
            page_size,
            page_count: page_count(row_count, page_size),
            row_count,
        }
    }
}

/// `ceil(row_count / page_size)`
pub fn page_count(row_count: i64, page_size: i64) -> i64 {
    if page_size <= 0 {
        return 0;
    }
    row_count / page_size + i64::from(row_count % page_size != 0)
}

/// One page of a user listing.
#[derive(Debug, Clone, Default)]
pub struct QueryPage {
    pub users: Vec<User>,
    pub counter: Option<QueryCounter>,
}

/// Result of `User.Query`.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counter: Option<QueryCounter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<User>>,
}

impl From<AccountResult<QueryPage>> for QueryResult {
    fn from(result: AccountResult<QueryPage>) -> Self {
        match result {
            Ok(page) => Self {
                envelope: Envelope::ok(),
                counter: page.counter,
                users: Some(page.users),
            },
            Err(e) => Self {
                envelope: Envelope::from(&e),
                counter: None,
                users: None,
            },
        }
    }
}

/// Every operation the account service handles, tagged by client name.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "task")]
pub enum Task {
    #[serde(rename = "User.Create")]
    Create(CreateRequest),
    #[serde(rename = "User.Get")]
    Get(GetRequest),
    #[serde(rename = "User.Set")]
    SetPassword(SetPasswordRequest),
    #[serde(rename = "User.Login")]
    Login(LoginRequest),
    #[serde(rename = "User.Password")]
    VerifyPassword(VerifyPasswordRequest),
    #[serde(rename = "User.GetOptions")]
    GetOptions(GetOptionsRequest),
    #[serde(rename = "User.SetOptions")]
    SetOptions(SetOptionsRequest),
    #[serde(rename = "User.Query")]
    Query(QueryRequest),
}

impl Task {
    /// Client name the task is registered under.
    pub fn name(&self) -> &'static str {
        match self {
            Task::Create(_) => "User.Create",
            Task::Get(_) => "User.Get",
            Task::SetPassword(_) => "User.Set",
            Task::Login(_) => "User.Login",
            Task::VerifyPassword(_) => "User.Password",
            Task::GetOptions(_) => "User.GetOptions",
            Task::SetOptions(_) => "User.SetOptions",
            Task::Query(_) => "User.Query",
        }
    }
}

/// Typed result of a [`Task`].
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum TaskResult {
    User(UserResult),
    Options(OptionsResult),
    Done(Envelope),
    Query(QueryResult),
}

impl TaskResult {
    pub fn envelope(&self) -> &Envelope {
        match self {
            TaskResult::User(r) => &r.envelope,
            TaskResult::Options(r) => &r.envelope,
            TaskResult::Done(envelope) => envelope,
            TaskResult::Query(r) => &r.envelope,
        }
    }

    pub fn errno(&self) -> i32 {
        self.envelope().errno
    }
}
