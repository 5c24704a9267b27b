//! Per-user options buckets.

use super::UserId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Encoding of an options payload.
///
/// Anything other than `json` is read as `text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum OptionsType {
    #[default]
    Text,
    Json,
}

impl OptionsType {
    pub fn as_str(self) -> &'static str {
        match self {
            OptionsType::Text => "text",
            OptionsType::Json => "json",
        }
    }
}

impl From<&str> for OptionsType {
    fn from(s: &str) -> Self {
        if s == "json" {
            OptionsType::Json
        } else {
            OptionsType::Text
        }
    }
}

impl From<String> for OptionsType {
    fn from(s: String) -> Self {
        OptionsType::from(s.as_str())
    }
}

impl From<OptionsType> for &'static str {
    fn from(kind: OptionsType) -> Self {
        kind.as_str()
    }
}

/// One named settings blob owned by a user, unique per (`uid`, `name`).
///
/// This is also the shape written to the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserOptions {
    pub id: i64,
    pub uid: UserId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: OptionsType,
    pub options: String,
}

impl UserOptions {
    /// An empty, not yet stored bucket.
    pub fn new(uid: UserId, name: impl Into<String>, kind: OptionsType) -> Self {
        Self {
            id: 0,
            uid,
            name: name.into(),
            kind,
            options: String::new(),
        }
    }

    /// Switch encodings. A change of type drops the stored payload.
    pub fn set_kind(&mut self, kind: OptionsType) {
        if self.kind != kind {
            self.kind = kind;
            self.options.clear();
        }
    }

    /// Decoded payload.
    ///
    /// JSON buckets yield `None` when empty or unparseable; text buckets
    /// always yield the raw string.
    pub fn get_options(&self) -> Option<Value> {
        match self.kind {
            OptionsType::Json => {
                if self.options.is_empty() {
                    return None;
                }
                serde_json::from_str(&self.options).ok()
            }
            OptionsType::Text => Some(Value::String(self.options.clone())),
        }
    }

    /// Apply an update.
    ///
    /// JSON buckets merge the top-level keys of `value` into the stored
    /// object, leaving other keys untouched. Text buckets are replaced.
    pub fn set_options(&mut self, value: &Value) {
        match self.kind {
            OptionsType::Json => {
                let mut object = match self.get_options() {
                    Some(Value::Object(map)) => map,
                    _ => Map::new(),
                };
                if let Value::Object(update) = value {
                    for (key, v) in update {
                        object.insert(key.clone(), v.clone());
                    }
                }
                self.options = Value::Object(object).to_string();
            }
            OptionsType::Text => {
                self.options = match value {
                    Value::Null => String::new(),
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
            }
        }
    }
}
