//! Authorization URL construction and browser launch modes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use super::{AuthError, AuthResult};
use crate::util::{is_http_url, normalize_text_option};

/// Ways of presenting the authorization page, in fallback order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LaunchMode {
    /// Hand the URL to the OS so the provider redirects back through the app scheme.
    DeepLink,
    /// In-app browser whose navigations can be intercepted.
    EmbeddedBrowser,
    /// System browser; the callback is picked up on app resume or by paste.
    ExternalBrowser,
}

impl LaunchMode {
    pub const DEFAULT_ORDER: [Self; 3] =
        [Self::DeepLink, Self::EmbeddedBrowser, Self::ExternalBrowser];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DeepLink => "deep-link",
            Self::EmbeddedBrowser => "embedded-browser",
            Self::ExternalBrowser => "external-browser",
        }
    }
}

impl fmt::Display for LaunchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LaunchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "deep-link" => Ok(Self::DeepLink),
            "embedded-browser" | "embedded" => Ok(Self::EmbeddedBrowser),
            "external-browser" | "external" => Ok(Self::ExternalBrowser),
            other => Err(format!("unknown launch mode '{other}'")),
        }
    }
}

/// Opens the authorization page. Implementations return an error when the
/// mode is unavailable so the next mode can be tried.
pub trait BrowserLauncher: Send + Sync {
    fn launch(&self, mode: LaunchMode, url: &str) -> AuthResult<()>;
}

/// Provider parameters for the authorize redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizeParams {
    pub authorize_url: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
}

/// A built authorize URL with the opaque `state` the callback must echo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
}

pub fn build_authorization_request(params: &AuthorizeParams) -> AuthResult<AuthorizationRequest> {
    let authorize_url = normalize_text_option(Some(params.authorize_url.clone()))
        .filter(|url| is_http_url(url))
        .ok_or_else(|| {
            AuthError::InvalidConfiguration(
                "authorize URL must include http:// or https://".to_string(),
            )
        })?;
    let client_id = normalize_text_option(Some(params.client_id.clone())).ok_or_else(|| {
        AuthError::InvalidConfiguration("retailer client id must not be empty".to_string())
    })?;
    let redirect_uri = normalize_text_option(Some(params.redirect_uri.clone())).ok_or_else(|| {
        AuthError::InvalidConfiguration("redirect URI must not be empty".to_string())
    })?;

    let state = Uuid::new_v4().simple().to_string();
    let mut url = Url::parse(&authorize_url)
        .map_err(|error| AuthError::InvalidConfiguration(format!("authorize URL: {error}")))?;
    url.query_pairs_mut()
        .append_pair("client_id", &client_id)
        .append_pair("redirect_uri", &redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("scope", params.scope.trim())
        .append_pair("state", &state);

    Ok(AuthorizationRequest {
        url: url.into(),
        state,
    })
}
