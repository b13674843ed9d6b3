//! Authorization code to token exchange.
//!
//! The backend has exposed the exchange under several request shapes over
//! time. [`TokenExchangeClient`] walks an ordered list of strategies and
//! stops at the first one that returns an access token.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::Value;
use thiserror::Error;

use super::{AuthError, AuthResult, AuthorizationCode, TokenPair};
use crate::config::ClientConfig;
use crate::http::{build_client, parse_api_error, with_bearer};
use crate::util::join_url;

/// Parameters every strategy sends in some form.
#[derive(Debug, Clone, Copy)]
pub struct ExchangeRequest<'a> {
    pub code: &'a str,
    pub redirect_uri: &'a str,
    pub state: Option<&'a str>,
}

#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("{0}")]
    Status(String),
    #[error("response did not include an access token")]
    MissingToken,
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[async_trait]
pub trait ExchangeStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    async fn attempt(&self, request: &ExchangeRequest<'_>) -> Result<TokenPair, AttemptError>;
}

/// Ordered strategy list; the first success wins.
pub struct TokenExchangeClient {
    strategies: Vec<Box<dyn ExchangeStrategy>>,
}

impl TokenExchangeClient {
    pub fn new(strategies: Vec<Box<dyn ExchangeStrategy>>) -> Self {
        Self { strategies }
    }

    /// The default four-step sequence against the configured backend.
    pub fn from_config(config: &ClientConfig) -> AuthResult<Self> {
        let base = config
            .api_base_url()
            .map_err(|error| AuthError::InvalidConfiguration(error.to_string()))?;
        let http = ExchangeHttp {
            client: build_client(config.request_timeout())?,
            bearer: config.api_token(),
        };
        let paths = &config.endpoints;
        let exchange_endpoint = join_url(&base, &paths.exchange);

        Ok(Self::new(vec![
            Box::new(JsonPostStrategy {
                http: http.clone(),
                endpoint: exchange_endpoint.clone(),
            }),
            Box::new(QueryGetStrategy {
                http: http.clone(),
                endpoint: exchange_endpoint,
            }),
            Box::new(FormPostStrategy {
                http: http.clone(),
                endpoint: join_url(&base, &paths.token),
            }),
            Box::new(CompleteAuthStrategy {
                http,
                endpoint: join_url(&base, &paths.complete_auth),
            }),
        ]))
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|strategy| strategy.name()).collect()
    }

    /// Consume `code` and trade it for tokens.
    pub async fn exchange(
        &self,
        code: AuthorizationCode,
        redirect_uri: &str,
    ) -> AuthResult<TokenPair> {
        if self.strategies.is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "no token exchange strategies configured".to_string(),
            ));
        }

        let request = ExchangeRequest {
            code: code.as_str(),
            redirect_uri,
            state: code.state(),
        };
        let mut failures = Vec::with_capacity(self.strategies.len());

        for (index, strategy) in self.strategies.iter().enumerate() {
            tracing::debug!(
                "Token exchange attempt {}/{} via {}",
                index + 1,
                self.strategies.len(),
                strategy.name()
            );
            match strategy.attempt(&request).await {
                Ok(tokens) => {
                    tracing::info!("Token exchange succeeded via {}", strategy.name());
                    return Ok(tokens);
                }
                Err(error) => {
                    tracing::warn!("Token exchange via {} failed: {}", strategy.name(), error);
                    failures.push(format!("{}: {error}", strategy.name()));
                }
            }
        }

        Err(AuthError::AuthExchangeFailed { attempts: failures })
    }
}

#[derive(Clone)]
struct ExchangeHttp {
    client: Client,
    bearer: Option<String>,
}

/// Variant A as JSON POST.
pub struct JsonPostStrategy {
    http: ExchangeHttp,
    endpoint: String,
}

#[async_trait]
impl ExchangeStrategy for JsonPostStrategy {
    fn name(&self) -> &'static str {
        "json-post"
    }

    async fn attempt(&self, request: &ExchangeRequest<'_>) -> Result<TokenPair, AttemptError> {
        let payload = serde_json::json!({
            "code": request.code,
            "redirect_uri": request.redirect_uri,
        });
        let response = with_bearer(
            self.http.client.post(&self.endpoint).json(&payload),
            self.http.bearer.as_deref(),
        )
        .send()
        .await?;
        read_token_response(response).await
    }
}

/// Variant A as GET with query parameters.
pub struct QueryGetStrategy {
    http: ExchangeHttp,
    endpoint: String,
}

#[async_trait]
impl ExchangeStrategy for QueryGetStrategy {
    fn name(&self) -> &'static str {
        "query-get"
    }

    async fn attempt(&self, request: &ExchangeRequest<'_>) -> Result<TokenPair, AttemptError> {
        let response = with_bearer(
            self.http.client.get(&self.endpoint).query(&[
                ("code", request.code),
                ("redirect_uri", request.redirect_uri),
            ]),
            self.http.bearer.as_deref(),
        )
        .send()
        .await?;
        read_token_response(response).await
    }
}

/// Variant B, OAuth-style form POST.
pub struct FormPostStrategy {
    http: ExchangeHttp,
    endpoint: String,
}

#[async_trait]
impl ExchangeStrategy for FormPostStrategy {
    fn name(&self) -> &'static str {
        "form-post"
    }

    async fn attempt(&self, request: &ExchangeRequest<'_>) -> Result<TokenPair, AttemptError> {
        let response = with_bearer(
            self.http.client.post(&self.endpoint).form(&[
                ("code", request.code),
                ("redirect_uri", request.redirect_uri),
                ("grant_type", "authorization_code"),
            ]),
            self.http.bearer.as_deref(),
        )
        .send()
        .await?;
        read_token_response(response).await
    }
}

/// Generic complete-auth helper; last resort.
pub struct CompleteAuthStrategy {
    http: ExchangeHttp,
    endpoint: String,
}

#[async_trait]
impl ExchangeStrategy for CompleteAuthStrategy {
    fn name(&self) -> &'static str {
        "complete-auth"
    }

    async fn attempt(&self, request: &ExchangeRequest<'_>) -> Result<TokenPair, AttemptError> {
        let payload = serde_json::json!({
            "code": request.code,
            "redirect_uri": request.redirect_uri,
            "state": request.state,
        });
        let response = with_bearer(
            self.http.client.post(&self.endpoint).json(&payload),
            self.http.bearer.as_deref(),
        )
        .send()
        .await?;
        read_token_response(response).await
    }
}

async fn read_token_response(response: Response) -> Result<TokenPair, AttemptError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(AttemptError::Status(parse_api_error(status, &body)));
    }

    let payload: Value =
        serde_json::from_str(&body).map_err(|error| AttemptError::Malformed(error.to_string()))?;
    token_pair_from(&payload)
}

/// Tokens may sit at the top level or under `data` / `tokens`; unrelated
/// fields of any shape are ignored.
fn token_pair_from(payload: &Value) -> Result<TokenPair, AttemptError> {
    [Some(payload), payload.get("data"), payload.get("tokens")]
        .into_iter()
        .flatten()
        .filter(|fields| fields.is_object())
        .find_map(|fields| {
            let access_token = text_field(fields, "access_token")?;
            Some(TokenPair {
                access_token,
                refresh_token: text_field(fields, "refresh_token").unwrap_or_default(),
                expires_in: fields.get("expires_in").and_then(seconds),
            })
        })
        .ok_or(AttemptError::MissingToken)
}

fn text_field(fields: &Value, key: &str) -> Option<String> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}

fn seconds(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
