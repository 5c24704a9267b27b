//! Account data models.
//!
//! A [`User`] is identified by a numeric id assigned by storage and by a
//! natural key (a name or a phone number, chosen per deployment through
//! [`NaturalKey`]). Each user owns any number of named [`UserOptions`]
//! buckets.

use serde::{Deserialize, Serialize, Serializer, ser::SerializeStruct};
use std::{fmt, str::FromStr};

pub mod options;
pub mod password;

pub use options::{OptionsType, UserOptions};
pub use password::PasswordEncoder;

/// User ID type
pub type UserId = i64;

/// Current time as unix seconds.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// The unique, human-meaningful column a deployment identifies users by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NaturalKey {
    #[default]
    Name,
    Phone,
}

impl NaturalKey {
    /// Column and serialized field name of the key.
    pub fn field(self) -> &'static str {
        match self {
            NaturalKey::Name => "name",
            NaturalKey::Phone => "phone",
        }
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

impl FromStr for NaturalKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(NaturalKey::Name),
            "phone" => Ok(NaturalKey::Phone),
            other => Err(format!("unknown natural key '{other}', expected 'name' or 'phone'")),
        }
    }
}

/// User model
///
/// `password` only ever holds an encoded value and is never serialized.
/// The natural key is serialized under its own field name (`name` or
/// `phone`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub key: NaturalKey,
    pub identity: String,
    pub password: String,
    pub ctime: i64,
    pub atime: i64,
    pub mtime: i64,
}

impl User {
    /// A user not yet stored, with every timestamp set to `now`.
    pub fn new(key: NaturalKey, identity: impl Into<String>, password: String, now: i64) -> Self {
        Self {
            id: 0,
            key,
            identity: identity.into(),
            password,
            ctime: now,
            atime: now,
            mtime: now,
        }
    }
}

impl Serialize for User {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("User", 5)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field(self.key.field(), &self.identity)?;
        state.serialize_field("ctime", &self.ctime)?;
        state.serialize_field("atime", &self.atime)?;
        state.serialize_field("mtime", &self.mtime)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_serialization_hides_password() {
        let user = User::new(NaturalKey::Name, "alice", "secret-hash".to_string(), 100);
        let json = serde_json::to_value(&user).unwrap();

        assert_eq!(json["name"], "alice");
        assert_eq!(json["ctime"], 100);
        assert!(json.get("password").is_none(), "password must never be serialized");
    }

    #[test]
    fn test_user_serialization_uses_phone_field() {
        let user = User::new(NaturalKey::Phone, "+15550100", String::new(), 1);
        let json = serde_json::to_value(&user).unwrap();

        assert_eq!(json["phone"], "+15550100");
        assert!(json.get("name").is_none());
    }

    #[test]
    fn test_natural_key_parse() {
        assert_eq!("name".parse::<NaturalKey>().unwrap(), NaturalKey::Name);
        assert_eq!(" Phone ".parse::<NaturalKey>().unwrap(), NaturalKey::Phone);
        assert!("email".parse::<NaturalKey>().is_err());
    }
}
