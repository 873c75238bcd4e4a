//! Core identifier types for the PushChat client
//!
//! The server is the sole authority for every identifier handled here, so all
//! of them are opaque string newtypes: the client never parses, generates or
//! compares their contents beyond equality.

use core::fmt;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Identifier Newtypes
// ----------------------------------------------------------------------------

macro_rules! opaque_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

opaque_id! {
    /// Server-assigned message identifier, unique within a conversation
    MessageId
}

opaque_id! {
    /// Identifier of an addressable conversation thread
    ChatId
}

opaque_id! {
    /// Identifier of an authenticated user
    UserId
}

opaque_id! {
    /// Connection-time credential supplied by the session provider
    AuthToken
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
