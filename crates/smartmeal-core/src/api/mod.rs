//! SmartMeal backend account API used around retailer linking.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::auth::{AuthError, AuthResult, AuthSession};
use crate::config::{ClientConfig, EndpointPaths};
use crate::http::{build_client, parse_api_error, with_bearer};
use crate::models::{Retailer, StoreLocation};
use crate::util::join_url;

const RETAILER_TOKEN_HEADER: &str = "X-Retailer-Access-Token";

#[async_trait]
pub trait AccountApi: Send + Sync {
    /// Ask the backend whether the stored retailer session is still valid.
    async fn verify_auth(&self, retailer: Retailer, session: &AuthSession) -> AuthResult<bool>;

    /// Merge arbitrary key-value pairs into the user's remote preferences.
    async fn update_preferences(&self, preferences: &Map<String, Value>) -> AuthResult<()>;

    /// First store location the backend suggests for `retailer`.
    async fn find_store_location(
        &self,
        retailer: Retailer,
        zip_code: Option<&str>,
    ) -> AuthResult<Option<StoreLocation>>;

    /// Drop the backend's copy of the retailer link.
    async fn disconnect(&self, retailer: Retailer) -> AuthResult<()>;
}

#[derive(Clone)]
pub struct BackendClient {
    base_url: String,
    bearer: Option<String>,
    endpoints: EndpointPaths,
    client: Client,
}

impl BackendClient {
    pub fn from_config(config: &ClientConfig) -> AuthResult<Self> {
        let base_url = config
            .api_base_url()
            .map_err(|error| AuthError::InvalidConfiguration(error.to_string()))?;
        Ok(Self {
            base_url,
            bearer: config.api_token(),
            endpoints: config.endpoints.clone(),
            client: build_client(config.request_timeout())?,
        })
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        with_bearer(request, self.bearer.as_deref()).header("Accept", "application/json")
    }

    async fn send(&self, request: RequestBuilder) -> AuthResult<String> {
        let response = self.authorized(request).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(AuthError::Api(parse_api_error(status, &body)))
        }
    }
}

#[async_trait]
impl AccountApi for BackendClient {
    async fn verify_auth(&self, retailer: Retailer, session: &AuthSession) -> AuthResult<bool> {
        let request = self
            .client
            .get(self.url(&self.endpoints.verify))
            .query(&[("retailer", retailer.id())])
            .header(RETAILER_TOKEN_HEADER, &session.access_token);
        let body = self.send(request).await?;
        let payload: VerifyResponse = serde_json::from_str(&body)?;
        Ok(payload.is_valid())
    }

    async fn update_preferences(&self, preferences: &Map<String, Value>) -> AuthResult<()> {
        let request = self
            .client
            .put(self.url(&self.endpoints.preferences))
            .json(preferences);
        self.send(request).await.map(|_| ())
    }

    async fn find_store_location(
        &self,
        retailer: Retailer,
        zip_code: Option<&str>,
    ) -> AuthResult<Option<StoreLocation>> {
        let mut request = self
            .client
            .get(self.url(&self.endpoints.store_locations))
            .query(&[("retailer", retailer.id())]);
        if let Some(zip_code) = zip_code {
            request = request.query(&[("zip_code", zip_code)]);
        }
        let body = self.send(request).await?;
        let payload: StoresResponse = serde_json::from_str(&body)?;
        Ok(payload.into_first(retailer))
    }

    async fn disconnect(&self, retailer: Retailer) -> AuthResult<()> {
        let request = self
            .client
            .post(self.url(&self.endpoints.disconnect))
            .json(&serde_json::json!({ "retailer": retailer.id() }));
        self.send(request).await.map(|_| ())
    }
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    authenticated: Option<bool>,
    is_authenticated: Option<bool>,
    valid: Option<bool>,
}

impl VerifyResponse {
    fn is_valid(&self) -> bool {
        self.authenticated
            .or(self.is_authenticated)
            .or(self.valid)
            .unwrap_or(false)
    }
}

#[derive(Debug, Deserialize)]
struct StoreRecord {
    #[serde(alias = "locationId", alias = "id")]
    location_id: String,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoresResponse {
    List(Vec<StoreRecord>),
    Wrapped {
        #[serde(alias = "stores", alias = "data")]
        locations: Vec<StoreRecord>,
    },
}

impl StoresResponse {
    fn into_first(self, retailer: Retailer) -> Option<StoreLocation> {
        let records = match self {
            Self::List(records) | Self::Wrapped { locations: records } => records,
        };
        records
            .into_iter()
            .find(|record| !record.location_id.trim().is_empty())
            .map(|record| StoreLocation {
                retailer_id: retailer.id().to_string(),
                location_id: record.location_id.trim().to_string(),
                name: record.name,
            })
    }
}
