// File: src/core/ids.rs

//! Identifier types for server-assigned records.
//!
//! The chat backend hands out numeric identifiers for users and
//! conversations. The client never generates them; it only parses,
//! compares and formats them. Each kind gets its own newtype so a user
//! id can never be passed where a conversation id is expected.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Declare a server-assigned numeric ID newtype with a consistent API.
macro_rules! define_numeric_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[repr(transparent)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Wrap a raw server value.
            #[inline]
            #[must_use]
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// Extract the raw server value.
            #[inline]
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            #[inline]
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            #[inline]
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            #[inline]
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.trim().parse()?))
            }
        }
    };
}

define_numeric_id!(
    /// Account identifier returned by the auth endpoints.
    UserId
);

define_numeric_id!(
    /// Conversation identifier, unique within the directory.
    ConversationId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let id: ConversationId = " 42 ".parse().unwrap();
        assert_eq!(id, ConversationId::new(42));
        assert_eq!(id.to_string(), "42");
        assert!("abc".parse::<ConversationId>().is_err());
    }

    #[test]
    fn test_serde_transparent() {
        let id = UserId::new(7);
        assert_eq!(serde_json::to_string(&id).unwrap(), "7");
        let restored: UserId = serde_json::from_str("7").unwrap();
        assert_eq!(restored, id);
    }
}
