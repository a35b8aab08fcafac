//! Database ID type definitions.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Alias for the integer type used for mapping to database IDs.
pub type DatabaseID = i64;

/// A newtype wrapper for integer user IDs.
///
/// Users live in the out-of-scope account system; the engine only ever
/// addresses them (as notification recipients, acting users, and event
/// managers). The wrapper keeps user IDs from being confused with the
/// other ID types, leading to better compile time errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
