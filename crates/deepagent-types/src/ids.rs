//! Opaque string identifiers.
//!
//! Thread and collection ids come from outside the runtime (a caller, a
//! config file, a database row), so unlike block or session ids they are not
//! constrained to UUIDs. [`ThreadId::generate`] produces a random one when the
//! caller has none.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error from parsing an identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("{kind} must not be empty")]
    Empty { kind: &'static str },
    #[error("{kind} contains control characters: {value:?}")]
    ControlChars { kind: &'static str, value: String },
}

macro_rules! impl_string_id {
    ($T:ident, $name:expr) => {
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $T(String);

        impl $T {
            /// Wrap a caller-provided id without validation.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Parse and validate an id.
            pub fn parse(s: &str) -> Result<Self, IdError> {
                if s.trim().is_empty() {
                    return Err(IdError::Empty { kind: $name });
                }
                if s.chars().any(char::is_control) {
                    return Err(IdError::ControlChars {
                        kind: $name,
                        value: s.to_string(),
                    });
                }
                Ok(Self(s.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// First 8 characters, for compact log lines.
            pub fn short(&self) -> &str {
                match self.0.char_indices().nth(8) {
                    Some((idx, _)) => &self.0[..idx],
                    None => &self.0,
                }
            }
        }

        impl From<&str> for $T {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $T {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl AsRef<str> for $T {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $name, self.0)
            }
        }
    };
}

impl_string_id!(ThreadId, "ThreadId");
impl_string_id!(CollectionId, "CollectionId");

impl ThreadId {
    /// Generate a fresh random thread id (UUIDv4, hyphenated).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl CollectionId {
    /// Collection used by durable routes that don't name one.
    pub const DEFAULT: &'static str = "filesystem";
}

impl Default for CollectionId {
    fn default() -> Self {
        Self::new(Self::DEFAULT)
    }
}
