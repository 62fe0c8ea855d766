//! Typed ID newtypes.
//!
//! Users are keyed by the chat platform's numeric identifier; broadcasts and
//! personalities get string newtypes so they cannot be swapped by accident.
//!
//! Broadcast IDs are UUID v7 (time-ordered) generated via [`uuid::Uuid::now_v7`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// UserId
// ─────────────────────────────────────────────────────────────────────────────

/// Stable identifier of an end user on the chat platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    /// Wrap a raw platform identifier.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// The raw platform identifier.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl FromStr for UserId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(Self)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// String-backed IDs
// ─────────────────────────────────────────────────────────────────────────────

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from an existing string value.
            #[must_use]
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

string_id! {
    /// Unique identifier for a broadcast job.
    BroadcastId
}

string_id! {
    /// Catalog key of a personality profile (normalized lowercase name).
    PersonalityId
}

impl BroadcastId {
    /// Create a new time-ordered broadcast ID (`bc_<uuid v7>`).
    #[must_use]
    pub fn new() -> Self {
        Self(format!("bc_{}", Uuid::now_v7()))
    }
}

impl Default for BroadcastId {
    fn default() -> Self {
        Self::new()
    }
}

impl PersonalityId {
    /// Normalize a user-supplied name into a catalog key (trimmed, lowercase).
    #[must_use]
    pub fn normalized(name: &str) -> Self {
        Self(name.trim().to_lowercase())
    }
}
