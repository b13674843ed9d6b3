//! Client configuration.
//!
//! `ClientConfig` carries the public endpoints and identifiers needed to run
//! the retailer linking flow. Values come from (lowest to highest priority)
//! defaults, a profile file, `SMARTMEAL_*` environment variables, and an
//! optional remote bootstrap manifest.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::{AuthorizeParams, LaunchMode};
use crate::util::{compact_text, is_http_url, normalize_text_option};

const BOOTSTRAP_SCHEMA_VERSION: u32 = 1;
const BOOTSTRAP_HTTP_TIMEOUT_SECS: u64 = 4;

pub const DEFAULT_AUTHORIZE_URL: &str = "https://api.kroger.com/v1/connect/oauth2/authorize";
pub const DEFAULT_REDIRECT_URI: &str = "smartmealplanner://kroger-auth";
pub const DEFAULT_SCOPE: &str = "cart.basic:write profile.compact product.compact";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),
    #[error("Invalid setting '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("Bootstrap manifest error: {0}")]
    Bootstrap(String),
}

/// Backend paths, relative to `api_base_url` unless absolute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct EndpointPaths {
    /// Variant A: JSON POST and query GET exchange.
    pub exchange: String,
    /// Variant B: form-encoded token exchange.
    pub token: String,
    /// Generic "complete auth" helper.
    pub complete_auth: String,
    pub verify: String,
    pub preferences: String,
    pub store_locations: String,
    pub disconnect: String,
}

impl Default for EndpointPaths {
    fn default() -> Self {
        Self {
            exchange: "/kroger/auth/callback".to_string(),
            token: "/kroger/auth/token".to_string(),
            complete_auth: "/kroger/auth/complete".to_string(),
            verify: "/kroger/auth/status".to_string(),
            preferences: "/preferences".to_string(),
            store_locations: "/kroger/stores".to_string(),
            disconnect: "/kroger/auth/disconnect".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    pub bootstrap_manifest_url: Option<String>,
    pub api_base_url: Option<String>,
    /// Bearer token for the SmartMeal backend (the signed-in app user).
    pub api_token: Option<String>,
    pub kroger_client_id: Option<String>,
    pub kroger_authorize_url: String,
    pub redirect_uri: String,
    pub scope: String,
    pub endpoints: EndpointPaths,
    pub launch_modes: Vec<LaunchMode>,
    pub flow_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Used to pick a nearby default store after linking.
    pub zip_code: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            bootstrap_manifest_url: None,
            api_base_url: None,
            api_token: None,
            kroger_client_id: None,
            kroger_authorize_url: DEFAULT_AUTHORIZE_URL.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            endpoints: EndpointPaths::default(),
            launch_modes: LaunchMode::DEFAULT_ORDER.to_vec(),
            flow_timeout_secs: 300,
            request_timeout_secs: 15,
            zip_code: None,
        }
    }
}

impl ClientConfig {
    /// Apply `SMARTMEAL_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup; used by `apply_env` and tests.
    pub fn apply_env_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let get = |key: &str| normalize_text_option(lookup(key));

        if let Some(value) = get("SMARTMEAL_BOOTSTRAP_URL") {
            self.bootstrap_manifest_url = Some(value);
        }
        if let Some(value) = get("SMARTMEAL_API_BASE_URL") {
            self.api_base_url = Some(value);
        }
        if let Some(value) = get("SMARTMEAL_API_TOKEN") {
            self.api_token = Some(value);
        }
        if let Some(value) = get("SMARTMEAL_KROGER_CLIENT_ID") {
            self.kroger_client_id = Some(value);
        }
        if let Some(value) = get("SMARTMEAL_KROGER_AUTHORIZE_URL") {
            self.kroger_authorize_url = value;
        }
        if let Some(value) = get("SMARTMEAL_REDIRECT_URI") {
            self.redirect_uri = value;
        }
        if let Some(value) = get("SMARTMEAL_SCOPE") {
            self.scope = value;
        }
        if let Some(value) = get("SMARTMEAL_ZIP_CODE") {
            self.zip_code = Some(value);
        }
        if let Some(value) = get("SMARTMEAL_LAUNCH_MODES") {
            self.launch_modes = parse_launch_modes(&value)?;
        }
        if let Some(value) = get("SMARTMEAL_FLOW_TIMEOUT_SECS") {
            self.flow_timeout_secs = parse_secs(&value, "flow_timeout_secs")?;
        }
        if let Some(value) = get("SMARTMEAL_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_secs(&value, "request_timeout_secs")?;
        }
        Ok(())
    }

    pub fn api_base_url(&self) -> Result<String, ConfigError> {
        let url = normalize_text_option(self.api_base_url.clone())
            .ok_or(ConfigError::Missing("api_base_url"))?;
        require_http_url(&url, "api_base_url")?;
        Ok(url.trim_end_matches('/').to_string())
    }

    pub fn authorize_params(&self) -> Result<AuthorizeParams, ConfigError> {
        let client_id = normalize_text_option(self.kroger_client_id.clone())
            .ok_or(ConfigError::Missing("kroger_client_id"))?;
        require_http_url(&self.kroger_authorize_url, "kroger_authorize_url")?;
        let redirect_uri = normalize_text_option(Some(self.redirect_uri.clone()))
            .ok_or(ConfigError::Missing("redirect_uri"))?;
        Ok(AuthorizeParams {
            authorize_url: self.kroger_authorize_url.trim().to_string(),
            client_id,
            redirect_uri,
            scope: self.scope.trim().to_string(),
        })
    }

    pub fn api_token(&self) -> Option<String> {
        normalize_text_option(self.api_token.clone())
    }

    pub fn zip_code(&self) -> Option<String> {
        normalize_text_option(self.zip_code.clone())
    }

    pub const fn flow_timeout(&self) -> Duration {
        Duration::from_secs(self.flow_timeout_secs)
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Check everything the linking flow needs before any network call.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api_base_url()?;
        self.authorize_params()?;
        if self.launch_modes.is_empty() {
            return Err(ConfigError::Invalid {
                field: "launch_modes",
                reason: "at least one launch mode is required".to_string(),
            });
        }
        if self.flow_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "flow_timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if let Some(url) = normalize_text_option(self.bootstrap_manifest_url.clone()) {
            require_http_url(&url, "bootstrap_manifest_url")?;
        }
        Ok(())
    }
}

/// Resolve runtime config by overlaying the remote bootstrap manifest.
///
/// If `bootstrap_manifest_url` is set, fetch/parse/validation failures are
/// returned as errors instead of falling back to local values.
pub async fn resolve_client_config(fallback: ClientConfig) -> Result<ClientConfig, ConfigError> {
    let Some(manifest_url) = normalize_text_option(fallback.bootstrap_manifest_url.clone()) else {
        return Ok(fallback);
    };

    let manifest = fetch_bootstrap_manifest(&manifest_url).await?;
    manifest.apply_to(fallback)
}

/// Parse a bootstrap manifest payload and overlay it onto `base`.
pub fn parse_bootstrap_manifest(
    payload: &str,
    base: ClientConfig,
) -> Result<ClientConfig, ConfigError> {
    let manifest: BootstrapManifest = serde_json::from_str(payload)
        .map_err(|error| ConfigError::Bootstrap(format!("invalid manifest JSON: {error}")))?;
    manifest.apply_to(base)
}

// ---------------------------------------------------------------------------
// Private
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct BootstrapManifest {
    schema_version: u32,
    manifest_version: String,
    api_base_url: String,
    kroger_client_id: String,
    #[serde(default)]
    kroger_authorize_url: Option<String>,
    #[serde(default)]
    redirect_uri: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

impl BootstrapManifest {
    fn apply_to(self, mut base: ClientConfig) -> Result<ClientConfig, ConfigError> {
        if self.schema_version != BOOTSTRAP_SCHEMA_VERSION {
            return Err(ConfigError::Bootstrap(format!(
                "unsupported schema_version {} (expected {})",
                self.schema_version, BOOTSTRAP_SCHEMA_VERSION
            )));
        }
        if self.manifest_version.trim().is_empty() {
            return Err(ConfigError::Bootstrap(
                "manifest_version must not be empty".to_string(),
            ));
        }

        let api_base_url = normalize_text_option(Some(self.api_base_url))
            .ok_or(ConfigError::Missing("api_base_url"))?;
        require_http_url(&api_base_url, "api_base_url")?;
        base.api_base_url = Some(api_base_url.trim_end_matches('/').to_string());

        base.kroger_client_id = Some(
            normalize_text_option(Some(self.kroger_client_id))
                .ok_or(ConfigError::Missing("kroger_client_id"))?,
        );
        if let Some(url) = normalize_text_option(self.kroger_authorize_url) {
            require_http_url(&url, "kroger_authorize_url")?;
            base.kroger_authorize_url = url;
        }
        if let Some(uri) = normalize_text_option(self.redirect_uri) {
            base.redirect_uri = uri;
        }
        if let Some(scope) = normalize_text_option(self.scope) {
            base.scope = scope;
        }
        Ok(base)
    }
}

async fn fetch_bootstrap_manifest(url: &str) -> Result<BootstrapManifest, ConfigError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(BOOTSTRAP_HTTP_TIMEOUT_SECS))
        .build()
        .map_err(|error| ConfigError::Bootstrap(format!("failed to build HTTP client: {error}")))?;

    let response = client
        .get(url)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await
        .map_err(|error| ConfigError::Bootstrap(format!("request failed: {error}")))?;

    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|error| ConfigError::Bootstrap(format!("failed to read response body: {error}")))?;
    if !(200..300).contains(&status) {
        return Err(ConfigError::Bootstrap(format!(
            "endpoint returned HTTP {status}: {}",
            compact_text(&body)
        )));
    }

    serde_json::from_str(&body)
        .map_err(|error| ConfigError::Bootstrap(format!("invalid manifest JSON: {error}")))
}

fn require_http_url(value: &str, field: &'static str) -> Result<(), ConfigError> {
    if is_http_url(value.trim()) {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: "must include http:// or https://".to_string(),
        })
    }
}

fn parse_launch_modes(value: &str) -> Result<Vec<LaunchMode>, ConfigError> {
    let modes = value
        .split(',')
        .map(str::trim)
        .filter(|mode| !mode.is_empty())
        .map(str::parse::<LaunchMode>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|reason| ConfigError::Invalid {
            field: "launch_modes",
            reason,
        })?;
    if modes.is_empty() {
        return Err(ConfigError::Invalid {
            field: "launch_modes",
            reason: "at least one launch mode is required".to_string(),
        });
    }
    Ok(modes)
}

fn parse_secs(value: &str, field: &'static str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|error| ConfigError::Invalid {
        field,
        reason: error.to_string(),
    })
}
