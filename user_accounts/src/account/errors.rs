//! Account error types.

use thiserror::Error;

/// Errno reported for a successful operation.
pub const ERRNO_OK: i32 = 0;
/// Any failure of the storage layer.
pub const ERRNO_STORAGE: i32 = 0x1000;
/// No id, uid or natural key where one is required.
pub const ERRNO_MISSING_IDENTIFIER: i32 = 0x1001;
/// No password where one is required.
pub const ERRNO_MISSING_PASSWORD: i32 = 0x1002;
/// Natural key already taken.
pub const ERRNO_DUPLICATE_IDENTIFIER: i32 = 0x1003;
/// No matching user.
pub const ERRNO_NOT_FOUND: i32 = 0x1004;
/// Credential mismatch.
pub const ERRNO_BAD_PASSWORD: i32 = 0x1005;

/// Account errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    /// Storage failure, carrying the underlying message verbatim
    #[error("{0}")]
    Storage(String),

    /// Required identifier missing; names the field that was expected
    #[error("Not found {0}")]
    MissingIdentifier(&'static str),

    /// Required password missing
    #[error("Not found password")]
    MissingPassword,

    /// Natural key already exists
    #[error("The {0} already exists")]
    DuplicateIdentifier(&'static str),

    /// User not found
    #[error("Not found user")]
    NotFound,

    /// Password mismatch
    #[error("user password fail")]
    BadPassword,
}

impl AccountError {
    /// Stable numeric code for the result envelope.
    pub fn errno(&self) -> i32 {
        match self {
            AccountError::Storage(_) => ERRNO_STORAGE,
            AccountError::MissingIdentifier(_) => ERRNO_MISSING_IDENTIFIER,
            AccountError::MissingPassword => ERRNO_MISSING_PASSWORD,
            AccountError::DuplicateIdentifier(_) => ERRNO_DUPLICATE_IDENTIFIER,
            AccountError::NotFound => ERRNO_NOT_FOUND,
            AccountError::BadPassword => ERRNO_BAD_PASSWORD,
        }
    }
}

impl From<sqlx::Error> for AccountError {
    fn from(err: sqlx::Error) -> Self {
        AccountError::Storage(err.to_string())
    }
}

/// Result type for account operations
pub type AccountResult<T> = Result<T, AccountError>;
