//! OS keychain persistence for retailer sessions, one namespace per profile.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use keyring::Entry;
use smartmeal_core::store::{KeyValueStore, StoreError, StoreResult};

const KEYRING_SERVICE_NAME: &str = "smartmeal-cli";

/// Entries are built once per key and reused, so every read and write for a
/// key goes through the same credential handle.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    profile_name: String,
    entries: Arc<Mutex<HashMap<String, Arc<Entry>>>>,
}

impl KeyringStore {
    pub fn new(profile_name: &str) -> Self {
        Self {
            profile_name: profile_name.to_string(),
            entries: Arc::default(),
        }
    }

    fn username(&self, key: &str) -> String {
        format!("{}:{key}", self.profile_name)
    }

    fn entry(&self, key: &str) -> StoreResult<Arc<Entry>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = entries.get(key) {
            return Ok(Arc::clone(entry));
        }
        let entry = Entry::new(KEYRING_SERVICE_NAME, &self.username(key))
            .map(Arc::new)
            .map_err(backend_error)?;
        entries.insert(key.to_string(), Arc::clone(&entry));
        Ok(entry)
    }
}

fn backend_error(error: keyring::Error) -> StoreError {
    StoreError::Backend(format!("keychain: {error}"))
}

impl KeyValueStore for KeyringStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(raw) => Ok(Some(raw)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(backend_error(error)),
        }
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.entry(key)?.set_password(value).map_err(backend_error)
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(backend_error(error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Once;

    use smartmeal_core::{AuthSession, Retailer, SessionStore};

    use super::*;

    fn use_mock_keychain() {
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            keyring::set_default_credential_builder(keyring::mock::default_credential_builder());
        });
    }

    fn session(token: &str) -> AuthSession {
        AuthSession {
            access_token: token.to_string(),
            refresh_token: "refresh".to_string(),
            authenticated: true,
            obtained_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn saved_session_reads_back_through_same_store() {
        use_mock_keychain();
        let store = SessionStore::new(
            KeyringStore::new("keychain-test-roundtrip"),
            Retailer::Kroger,
        );

        assert!(store.load_session().unwrap().is_none());
        store.save_session(&session("tok1")).unwrap();
        assert_eq!(store.load_session().unwrap().unwrap().access_token, "tok1");

        store.save_session(&session("tok2")).unwrap();
        assert_eq!(store.load_session().unwrap().unwrap().access_token, "tok2");

        store.clear_session().unwrap();
        assert!(store.load_session().unwrap().is_none());
    }

    #[test]
    fn clones_share_credential_handles() {
        use_mock_keychain();
        let kv = KeyringStore::new("keychain-test-clone");
        let writer = kv.clone();

        writer.set("kroger_linked", "true").unwrap();
        assert_eq!(kv.get("kroger_linked").unwrap().as_deref(), Some("true"));

        kv.remove("kroger_linked").unwrap();
        assert_eq!(writer.get("kroger_linked").unwrap(), None);
    }

    #[test]
    fn profiles_do_not_share_sessions() {
        use_mock_keychain();
        let work = SessionStore::new(KeyringStore::new("keychain-test-work"), Retailer::Kroger);
        let home = SessionStore::new(KeyringStore::new("keychain-test-home"), Retailer::Kroger);

        work.save_session(&session("work-token")).unwrap();

        assert_eq!(
            work.load_session().unwrap().unwrap().access_token,
            "work-token"
        );
        assert!(home.load_session().unwrap().is_none());
    }

    #[test]
    fn backend_failures_surface_as_keychain_store_errors() {
        let error = backend_error(keyring::Error::NoStorageAccess(
            "locked".to_string().into(),
        ));
        let StoreError::Backend(message) = error else {
            panic!("expected backend error, got {error:?}");
        };
        assert!(message.starts_with("keychain: "));
    }

    #[test]
    fn removing_missing_key_is_ok() {
        use_mock_keychain();
        KeyringStore::new("keychain-test-empty")
            .remove("kroger_session")
            .unwrap();
    }
}
