//! Account operations: registration, lookup, passwords, login, per-user
//! options and paged listing.

pub mod errors;
pub mod service;
pub mod tasks;

pub use errors::{AccountError, AccountResult};
pub use service::{AccountService, AccountSettings, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use tasks::{
    CreateRequest, Envelope, GetOptionsRequest, GetRequest, LoginRequest, OptionsResult,
    QueryCounter, QueryPage, QueryRequest, QueryResult, SetOptionsRequest, SetPasswordRequest,
    Task, TaskResult, UserResult, VerifyPasswordRequest,
};
