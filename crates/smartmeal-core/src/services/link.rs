//! Retailer link service shared by every front end.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::api::{AccountApi, BackendClient};
use crate::auth::{
    AuthFlowController, AuthSession, BrowserLauncher, FlowSettings, SessionSynchronizer,
    TokenExchangeClient,
};
use crate::config::ClientConfig;
use crate::lifecycle::LifecycleHub;
use crate::models::{Retailer, StoreLocation};
use crate::store::{KeyValueStore, SessionStore};
use crate::Result;

/// Local view of a retailer link, optionally confirmed by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    NotLinked,
    Linked {
        /// `None` when the backend could not be asked.
        verified: Option<bool>,
        connected_at: DateTime<Utc>,
        store_location: Option<StoreLocation>,
    },
}

/// Builds flow controllers and answers status/logout for one retailer.
pub struct RetailerLinkService<K: KeyValueStore + Clone> {
    config: ClientConfig,
    store: SessionStore<K>,
    api: Arc<dyn AccountApi>,
}

impl<K: KeyValueStore + Clone> RetailerLinkService<K> {
    /// Validate `config` and talk to the configured backend.
    pub fn from_config(config: ClientConfig, kv: K, retailer: Retailer) -> Result<Self> {
        config.validate()?;
        let api = Arc::new(BackendClient::from_config(&config)?);
        Ok(Self::with_api(config, kv, retailer, api))
    }

    pub fn with_api(
        config: ClientConfig,
        kv: K,
        retailer: Retailer,
        api: Arc<dyn AccountApi>,
    ) -> Self {
        Self {
            config,
            store: SessionStore::new(kv, retailer),
            api,
        }
    }

    pub const fn store(&self) -> &SessionStore<K> {
        &self.store
    }

    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// A fresh controller wired to this service's store and backend.
    pub fn controller(&self, launcher: Arc<dyn BrowserLauncher>) -> Result<AuthFlowController<K>> {
        let settings = FlowSettings::from_config(&self.config, self.store.retailer())?;
        let exchange = TokenExchangeClient::from_config(&self.config)?;
        Ok(AuthFlowController::new(
            settings,
            self.store.clone(),
            Arc::clone(&self.api),
            exchange,
            launcher,
        ))
    }

    /// Run one complete linking flow against `hub`.
    pub async fn link(
        &self,
        hub: &LifecycleHub,
        launcher: Arc<dyn BrowserLauncher>,
    ) -> Result<AuthSession> {
        let controller = self.controller(launcher)?;
        Ok(controller.run(hub).await?)
    }

    /// Report the stored link. With `verify`, ask the backend as well.
    pub async fn status(&self, verify: bool) -> Result<LinkStatus> {
        let Some(session) = self.store.load_session()? else {
            return Ok(LinkStatus::NotLinked);
        };
        let store_location = self.store.load_store_location()?;

        let verified = if verify {
            match self.api.verify_auth(self.store.retailer(), &session).await {
                Ok(valid) => Some(valid),
                Err(error) => {
                    tracing::warn!("Could not verify {} link: {}", self.store.retailer(), error);
                    None
                }
            }
        } else {
            None
        };

        Ok(LinkStatus::Linked {
            verified,
            connected_at: session.obtained_at,
            store_location,
        })
    }

    /// Forget the local link and tell the backend.
    pub async fn disconnect(&self) -> Result<()> {
        let synchronizer = SessionSynchronizer::new(
            self.store.clone(),
            Arc::clone(&self.api),
            self.config.zip_code(),
        );
        synchronizer.disconnect().await?;
        tracing::info!("Disconnected {} account", self.store.retailer());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::auth::TokenPair;
    use crate::store::MemoryStore;
    use crate::test_support::FakeAccountApi;
    use crate::Error;

    fn service(kv: &MemoryStore, api: &Arc<FakeAccountApi>) -> RetailerLinkService<MemoryStore> {
        let config = ClientConfig {
            api_base_url: Some("https://api.smartmeal.test".to_string()),
            kroger_client_id: Some("smartmeal-test".to_string()),
            ..ClientConfig::default()
        };
        RetailerLinkService::with_api(
            config,
            kv.clone(),
            Retailer::Kroger,
            Arc::clone(api) as Arc<dyn AccountApi>,
        )
    }

    fn link_locally(kv: &MemoryStore) {
        SessionStore::new(kv.clone(), Retailer::Kroger)
            .save_session(&AuthSession::from_tokens(TokenPair {
                access_token: "tok1".to_string(),
                refresh_token: "ref1".to_string(),
                expires_in: None,
            }))
            .unwrap();
    }

    #[tokio::test]
    async fn status_reports_not_linked_without_session() {
        let kv = MemoryStore::new();
        let api = Arc::new(FakeAccountApi::default());

        assert_eq!(
            service(&kv, &api).status(true).await.unwrap(),
            LinkStatus::NotLinked
        );
    }

    #[tokio::test]
    async fn status_includes_backend_verdict() {
        let kv = MemoryStore::new();
        link_locally(&kv);
        let api = Arc::new(FakeAccountApi::default());
        api.set_verify_result(Some(true));

        let status = service(&kv, &api).status(true).await.unwrap();
        assert!(matches!(
            status,
            LinkStatus::Linked {
                verified: Some(true),
                ..
            }
        ));

        api.set_verify_result(None);
        let status = service(&kv, &api).status(true).await.unwrap();
        assert!(matches!(status, LinkStatus::Linked { verified: None, .. }));
    }

    #[tokio::test]
    async fn disconnect_clears_session() {
        let kv = MemoryStore::new();
        link_locally(&kv);
        let api = Arc::new(FakeAccountApi::default());
        let service = service(&kv, &api);

        service.disconnect().await.unwrap();

        assert_eq!(service.status(false).await.unwrap(), LinkStatus::NotLinked);
        assert_eq!(api.disconnects(), 1);
    }

    #[test]
    fn controller_requires_client_id() {
        let kv = MemoryStore::new();
        let api = Arc::new(FakeAccountApi::default());
        let service = RetailerLinkService::with_api(
            ClientConfig {
                api_base_url: Some("https://api.smartmeal.test".to_string()),
                ..ClientConfig::default()
            },
            kv,
            Retailer::Kroger,
            api as Arc<dyn AccountApi>,
        );

        let result = service.controller(Arc::new(crate::test_support::FakeLauncher::default()));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
