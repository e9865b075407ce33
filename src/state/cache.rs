//! Session-scoped cache for data derived from the signed-in user.
//!
//! Entries belong to whoever was signed in when they were written. The auth
//! context clears the cache on sign-out, on session expiry, and whenever the
//! signed-in identity changes, so nothing leaks across users.

#[cfg(test)]
#[path = "cache_test.rs"]
mod cache_test;

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;

/// JSON-valued key/value store shared through the auth context.
#[derive(Debug, Default)]
pub struct SessionCache {
    entries: Mutex<HashMap<String, serde_json::Value>>,
}

impl SessionCache {
    /// Store a value, replacing any previous entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be represented as JSON.
    pub fn insert<T: Serialize>(&self, key: &str, value: &T) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        self.lock().insert(key.to_owned(), value);
        Ok(())
    }

    /// Read a value back. A missing key or a type mismatch yields `None`.
    #[must_use]
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.lock().get(key).cloned()?;
        serde_json::from_value(value).ok()
    }

    pub fn remove(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, serde_json::Value>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
