//! Local persistence for retailer sessions and default store selection.
//!
//! Back ends only need string get/set/remove semantics; [`SessionStore`]
//! layers the typed session and store-location records on top of them.

mod memory;

use thiserror::Error;

use crate::auth::AuthSession;
use crate::models::{Retailer, StoreLocation};

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Secure storage error: {0}")]
    Backend(String),
    #[error("Stored value for '{key}' is corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Store is read-only")]
    ReadOnly,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Minimal key-value persistence contract.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StoreResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;
    fn remove(&self, key: &str) -> StoreResult<()>;

    fn get_bool(&self, key: &str) -> StoreResult<Option<bool>> {
        Ok(self.get(key)?.map(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        }))
    }

    fn set_bool(&self, key: &str, value: bool) -> StoreResult<()> {
        self.set(key, if value { "true" } else { "false" })
    }
}

/// Typed session storage for one retailer.
///
/// The session is written as a single JSON value, so readers never observe
/// tokens without the authenticated flag or the other way around.
#[derive(Debug, Clone)]
pub struct SessionStore<K: KeyValueStore> {
    kv: K,
    retailer: Retailer,
}

impl<K: KeyValueStore> SessionStore<K> {
    pub const fn new(kv: K, retailer: Retailer) -> Self {
        Self { kv, retailer }
    }

    pub const fn retailer(&self) -> Retailer {
        self.retailer
    }

    pub const fn backend(&self) -> &K {
        &self.kv
    }

    pub fn load_session(&self) -> StoreResult<Option<AuthSession>> {
        let key = self.session_key();
        let Some(raw) = self.kv.get(&key)? else {
            return Ok(None);
        };
        let session: AuthSession =
            serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt { key, source })?;
        if session.is_usable() {
            Ok(Some(session))
        } else {
            tracing::debug!(
                "Ignoring unauthenticated {} session record",
                self.retailer
            );
            Ok(None)
        }
    }

    pub fn save_session(&self, session: &AuthSession) -> StoreResult<()> {
        let key = self.session_key();
        let raw = serde_json::to_string(session)
            .map_err(|source| StoreError::Corrupt { key: key.clone(), source })?;
        self.kv.set(&key, &raw)
    }

    pub fn clear_session(&self) -> StoreResult<()> {
        self.kv.remove(&self.session_key())
    }

    pub fn load_store_location(&self) -> StoreResult<Option<StoreLocation>> {
        let key = self.store_location_key();
        let Some(raw) = self.kv.get(&key)? else {
            return Ok(None);
        };
        let location: StoreLocation =
            serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt { key, source })?;
        Ok(location.is_for(self.retailer).then_some(location))
    }

    pub fn save_store_location(&self, location: &StoreLocation) -> StoreResult<()> {
        let key = self.store_location_key();
        let raw = serde_json::to_string(location)
            .map_err(|source| StoreError::Corrupt { key: key.clone(), source })?;
        self.kv.set(&key, &raw)
    }

    pub fn clear_store_location(&self) -> StoreResult<()> {
        self.kv.remove(&self.store_location_key())
    }

    fn session_key(&self) -> String {
        format!("{}_session", self.retailer.id())
    }

    fn store_location_key(&self) -> String {
        format!("{}_default_store", self.retailer.id())
    }
}
