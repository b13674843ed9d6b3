//! Retailer account linking: callback parsing, token exchange, session sync,
//! and the flow controller that drives them.

pub mod authorize;
pub mod callback;
pub mod exchange;
pub mod flow;
pub mod sync;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::StoreError;

pub use authorize::{
    build_authorization_request, AuthorizationRequest, AuthorizeParams, BrowserLauncher,
    LaunchMode,
};
pub use callback::{parse_callback, provider_error, AuthorizationCode, CodeSource, ProviderError};
pub use exchange::{ExchangeRequest, ExchangeStrategy, TokenExchangeClient};
pub use flow::{AuthFlowController, EventOutcome, FlowFailure, FlowSettings, FlowState};
pub use sync::{SessionSynchronizer, SyncReport};

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub authenticated: bool,
    pub obtained_at: DateTime<Utc>,
}

impl AuthSession {
    /// Build an authenticated session from freshly exchanged tokens.
    pub fn from_tokens(tokens: TokenPair) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            authenticated: true,
            obtained_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.authenticated && !self.access_token.trim().is_empty()
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("authenticated", &self.authenticated)
            .field("obtained_at", &self.obtained_at)
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: Option<i64>,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TokenPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No authorization code found in callback")]
    NoCodeFound,
    #[error("Token exchange failed: {}", .attempts.join("; "))]
    AuthExchangeFailed { attempts: Vec<String> },
    #[error("Failed to save session locally: {0}")]
    SessionPersistFailed(#[source] StoreError),
    #[error("Failed to sync session with backend: {0}")]
    RemoteSyncFailed(String),
    #[error("Authentication timed out")]
    Timeout,
    #[error("Authentication was cancelled")]
    UserCancelled,
    #[error("Retailer rejected authorization: {0}")]
    Provider(ProviderError),
    #[error("Could not open authorization page: {0}")]
    Launch(String),
    #[error("Invalid auth configuration: {0}")]
    InvalidConfiguration(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("API error: {0}")]
    Api(String),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_debug_redacts_tokens() {
        let session = AuthSession {
            access_token: "secret-access-token".to_string(),
            refresh_token: "secret-refresh-token".to_string(),
            authenticated: true,
            obtained_at: Utc::now(),
        };
        let rendered = format!("{session:?}");
        assert!(!rendered.contains("secret-access-token"));
        assert!(!rendered.contains("secret-refresh-token"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn session_from_tokens_is_authenticated() {
        let session = AuthSession::from_tokens(TokenPair {
            access_token: "tok1".to_string(),
            refresh_token: "ref1".to_string(),
            expires_in: Some(1800),
        });
        assert!(session.authenticated);
        assert!(session.is_usable());
        assert_eq!(session.refresh_token, "ref1");
    }

    #[test]
    fn blank_access_token_is_not_usable() {
        let session = AuthSession {
            access_token: "  ".to_string(),
            refresh_token: String::new(),
            authenticated: true,
            obtained_at: Utc::now(),
        };
        assert!(!session.is_usable());
    }

    #[test]
    fn exchange_failure_lists_attempts() {
        let error = AuthError::AuthExchangeFailed {
            attempts: vec!["json-post: HTTP 500".to_string(), "query-get: HTTP 404".to_string()],
        };
        let message = error.to_string();
        assert!(message.contains("json-post: HTTP 500"));
        assert!(message.contains("query-get: HTTP 404"));
    }
}
