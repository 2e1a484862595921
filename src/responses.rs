//! `{"data": ...}` response envelopes.
//!
//! `Entity<T>` and `Collection<T>` are ordinary generic types, so any number
//! of payload schemas can be wrapped side by side:
//!
//! ```
//! use clientapi::{parse_slice, responses::Collection};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct User {
//!     name: String,
//! }
//!
//! let users: Collection<User> = parse_slice(br#"{"data": [{"name": "Kit"}]}"#).unwrap();
//! assert_eq!(users.data().unwrap()[0].name, "Kit");
//! ```

use serde::{Deserialize, Serialize};

pub use crate::error::ErrorContent as RemoteError;

/// Envelope whose `data` is a single `T`, or absent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity<T> {
    pub data: Option<T>,
}

impl<T> Entity<T> {
    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }
}

impl<T> Default for Entity<T> {
    fn default() -> Self {
        Self { data: None }
    }
}

/// Envelope whose `data` is an ordered list of `T`, or absent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Collection<T> {
    pub data: Option<Vec<T>>,
}

impl<T> Collection<T> {
    pub fn data(&self) -> Option<&[T]> {
        self.data.as_deref()
    }

    /// Items in response order; an absent `data` yields no items.
    pub fn into_data(self) -> Vec<T> {
        self.data.unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.data.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self { data: None }
    }
}

impl<T> IntoIterator for Collection<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.into_data().into_iter()
    }
}
