//! Session synchronization after a successful exchange.
//!
//! Local persistence is the commit point. Pushing tokens to the backend and
//! choosing a default store are best-effort and only logged on failure.

use std::sync::Arc;

use chrono::SecondsFormat;
use serde_json::{Map, Value};

use super::{AuthError, AuthResult, AuthSession, TokenPair};
use crate::api::AccountApi;
use crate::models::StoreLocation;
use crate::store::{KeyValueStore, SessionStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub session: AuthSession,
    pub remote_synced: bool,
    pub store_location: Option<StoreLocation>,
}

pub struct SessionSynchronizer<K: KeyValueStore> {
    store: SessionStore<K>,
    api: Arc<dyn AccountApi>,
    zip_code: Option<String>,
}

impl<K: KeyValueStore> SessionSynchronizer<K> {
    pub fn new(store: SessionStore<K>, api: Arc<dyn AccountApi>, zip_code: Option<String>) -> Self {
        Self {
            store,
            api,
            zip_code,
        }
    }

    pub const fn store(&self) -> &SessionStore<K> {
        &self.store
    }

    pub async fn synchronize(&self, tokens: TokenPair) -> AuthResult<SyncReport> {
        let session = AuthSession::from_tokens(tokens);
        self.store
            .save_session(&session)
            .map_err(AuthError::SessionPersistFailed)?;
        tracing::info!("Saved {} session locally", self.store.retailer());

        let remote_synced = match self.push_session(&session).await {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!("{}", AuthError::RemoteSyncFailed(error.to_string()));
                false
            }
        };

        let store_location = self.ensure_default_store().await;

        Ok(SyncReport {
            session,
            remote_synced,
            store_location,
        })
    }

    /// Clear the local link and tell the backend. Only the local clear is fatal.
    pub async fn disconnect(&self) -> AuthResult<()> {
        let retailer = self.store.retailer();
        self.store.clear_session()?;
        if let Err(error) = self.store.clear_store_location() {
            tracing::warn!("Failed to clear {} default store: {}", retailer, error);
        }

        let mut preferences = Map::new();
        preferences.insert(pref_key(retailer.id(), "access_token"), Value::Null);
        preferences.insert(pref_key(retailer.id(), "refresh_token"), Value::Null);
        preferences.insert(pref_key(retailer.id(), "authenticated"), Value::Bool(false));
        if let Err(error) = self.api.update_preferences(&preferences).await {
            tracing::warn!("{}", AuthError::RemoteSyncFailed(error.to_string()));
        }
        if let Err(error) = self.api.disconnect(retailer).await {
            tracing::warn!("Backend disconnect for {} failed: {}", retailer, error);
        }
        Ok(())
    }

    async fn push_session(&self, session: &AuthSession) -> AuthResult<()> {
        let retailer = self.store.retailer().id();
        let mut preferences = Map::new();
        preferences.insert(
            pref_key(retailer, "access_token"),
            Value::String(session.access_token.clone()),
        );
        preferences.insert(
            pref_key(retailer, "refresh_token"),
            Value::String(session.refresh_token.clone()),
        );
        preferences.insert(pref_key(retailer, "authenticated"), Value::Bool(true));
        preferences.insert(
            pref_key(retailer, "connected_at"),
            Value::String(
                session
                    .obtained_at
                    .to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
        );
        self.api.update_preferences(&preferences).await
    }

    async fn ensure_default_store(&self) -> Option<StoreLocation> {
        let retailer = self.store.retailer();
        match self.store.load_store_location() {
            Ok(Some(existing)) => return Some(existing),
            Ok(None) => {}
            Err(error) => {
                tracing::warn!("Ignoring unreadable {} default store: {}", retailer, error);
            }
        }

        let location = match self
            .api
            .find_store_location(retailer, self.zip_code.as_deref())
            .await
        {
            Ok(Some(location)) => location,
            Ok(None) => {
                tracing::debug!("Backend suggested no {} store location", retailer);
                return None;
            }
            Err(error) => {
                tracing::warn!("Failed to look up {} store location: {}", retailer, error);
                return None;
            }
        };

        if let Err(error) = self.store.save_store_location(&location) {
            tracing::warn!("Failed to save {} default store: {}", retailer, error);
        }

        let mut preferences = Map::new();
        preferences.insert(
            pref_key(retailer.id(), "store_location"),
            Value::String(location.location_id.clone()),
        );
        if let Err(error) = self.api.update_preferences(&preferences).await {
            tracing::warn!("{}", AuthError::RemoteSyncFailed(error.to_string()));
        }

        Some(location)
    }
}

fn pref_key(retailer: &str, field: &str) -> String {
    format!("{retailer}_{field}")
}
