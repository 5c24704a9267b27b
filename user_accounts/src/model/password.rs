//! Password encoding.
//!
//! Passwords are stored as `hex(MD5(password || secret))`. The secret is
//! process-wide configuration handed to the encoder at construction.

use md5::{Digest, Md5};
use rand::Rng;
use std::fmt;
use subtle::ConstantTimeEq;

/// Encodes and checks passwords against a server secret.
#[derive(Clone)]
pub struct PasswordEncoder {
    secret: String,
}

impl fmt::Debug for PasswordEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordEncoder")
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl PasswordEncoder {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Encode a plaintext password.
    pub fn encode(&self, password: &str) -> String {
        let mut hasher = Md5::new();
        hasher.update(password.as_bytes());
        hasher.update(self.secret.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Encoded random password, for accounts created without one.
    pub fn generate(&self) -> String {
        let nanos = chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_default();
        let salt: u32 = rand::rng().random_range(0..100_000);
        self.encode(&format!("{nanos} {salt}"))
    }

    /// Encode `password`, or generate one when it is empty.
    pub fn encode_or_generate(&self, password: &str) -> String {
        if password.is_empty() {
            self.generate()
        } else {
            self.encode(password)
        }
    }

    /// Whether `password` encodes to `encoded`. Constant-time in the
    /// contents of the encodings.
    pub fn matches(&self, password: &str, encoded: &str) -> bool {
        self.encode(password)
            .as_bytes()
            .ct_eq(encoded.as_bytes())
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_known_vector() {
        let encoder = PasswordEncoder::new("");
        assert_eq!(encoder.encode("abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn test_encode_appends_secret() {
        let encoder = PasswordEncoder::new("c");
        assert_eq!(encoder.encode("ab"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn test_secret_changes_encoding() {
        let a = PasswordEncoder::new("secret-a");
        let b = PasswordEncoder::new("secret-b");
        assert_ne!(a.encode("password"), b.encode("password"));
    }

    #[test]
    fn test_matches() {
        let encoder = PasswordEncoder::new("token");
        let stored = encoder.encode("hunter2");

        assert!(encoder.matches("hunter2", &stored));
        assert!(!encoder.matches("hunter3", &stored));
        assert!(!encoder.matches("hunter2", ""));
    }

    #[test]
    fn test_generate_is_unique_hex() {
        let encoder = PasswordEncoder::new("token");
        let first = encoder.generate();
        let second = encoder.generate();

        assert_eq!(first.len(), 32);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(first, second, "generated passwords should differ");
    }

    #[test]
    fn test_encode_or_generate() {
        let encoder = PasswordEncoder::new("token");
        assert_eq!(encoder.encode_or_generate("pw"), encoder.encode("pw"));
        assert_ne!(encoder.encode_or_generate(""), encoder.encode(""));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let encoder = PasswordEncoder::new("top-secret");
        assert!(!format!("{encoder:?}").contains("top-secret"));
    }
}
