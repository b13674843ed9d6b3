//! Authorization code extraction from redirect callbacks.
//!
//! Callbacks arrive as deep links, intercepted web-view navigations, or text
//! pasted by the user, so the code may sit in the query string, the fragment,
//! or somewhere in free text. Tiers are tried in that order.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use url::{form_urlencoded, Url};

use super::{AuthError, AuthResult};
use crate::util::mask_secret;

/// Codes at or below this length are treated as noise.
const MIN_CODE_LEN: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeSource {
    Query,
    Fragment,
    RawScan,
    Manual,
}

impl fmt::Display for CodeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Query => "query",
            Self::Fragment => "fragment",
            Self::RawScan => "raw-scan",
            Self::Manual => "manual",
        })
    }
}

/// A single-use authorization code. Not `Clone`: the exchange client takes
/// it by value.
#[derive(PartialEq, Eq)]
pub struct AuthorizationCode {
    value: String,
    state: Option<String>,
    source: CodeSource,
}

impl AuthorizationCode {
    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    pub const fn source(&self) -> CodeSource {
        self.source
    }

    /// Accept either a full callback URL or a bare code typed by the user.
    pub fn from_manual_entry(text: &str) -> AuthResult<Self> {
        let text = text.trim();
        if text.contains("code=") || text.contains("://") {
            return parse_callback(text);
        }
        if text.chars().any(char::is_whitespace) {
            return Err(AuthError::NoCodeFound);
        }
        accept_candidate(text, None, CodeSource::Manual).ok_or(AuthError::NoCodeFound)
    }
}

impl fmt::Debug for AuthorizationCode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthorizationCode")
            .field("value", &mask_secret(&self.value))
            .field("state", &self.state)
            .field("source", &self.source)
            .finish()
    }
}

/// An OAuth `error` returned on the redirect instead of a code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub error: String,
    pub description: Option<String>,
}

impl ProviderError {
    pub fn is_access_denied(&self) -> bool {
        self.error == "access_denied"
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(description) => write!(f, "{} ({description})", self.error),
            None => f.write_str(&self.error),
        }
    }
}

/// Extract the authorization code from a callback URL or free text.
pub fn parse_callback(raw: &str) -> AuthResult<AuthorizationCode> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AuthError::NoCodeFound);
    }

    if let Ok(url) = Url::parse(raw) {
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        if let Some(code) = from_pairs(&query, CodeSource::Query) {
            return Ok(code);
        }

        if let Some(fragment) = url.fragment() {
            let pairs: Vec<(String, String)> = form_urlencoded::parse(fragment.as_bytes())
                .into_owned()
                .collect();
            if let Some(code) = from_pairs(&pairs, CodeSource::Fragment) {
                return Ok(code);
            }
        }
    }

    scan_raw(raw).ok_or(AuthError::NoCodeFound)
}

/// Extract a provider-reported error (`error=access_denied`, ...) if present.
pub fn provider_error(raw: &str) -> Option<ProviderError> {
    let url = Url::parse(raw.trim()).ok()?;
    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    if let Some(fragment) = url.fragment() {
        pairs.extend(form_urlencoded::parse(fragment.as_bytes()).into_owned());
    }

    let error = lookup(&pairs, "error")?;
    Some(ProviderError {
        error: error.to_string(),
        description: lookup(&pairs, "error_description").map(str::to_string),
    })
}

fn from_pairs(pairs: &[(String, String)], source: CodeSource) -> Option<AuthorizationCode> {
    let code = lookup(pairs, "code")?;
    accept_candidate(code, lookup(pairs, "state"), source)
}

fn scan_raw(raw: &str) -> Option<AuthorizationCode> {
    let state = state_pattern()
        .captures(raw)
        .and_then(|captures| captures.get(1))
        .and_then(|value| urlencoding::decode(value.as_str()).ok())
        .map(|value| value.into_owned());

    code_pattern()
        .captures_iter(raw)
        .filter_map(|captures| captures.get(1))
        .filter_map(|value| urlencoding::decode(value.as_str()).ok())
        .find_map(|value| accept_candidate(&value, state.as_deref(), CodeSource::RawScan))
}

fn accept_candidate(
    candidate: &str,
    state: Option<&str>,
    source: CodeSource,
) -> Option<AuthorizationCode> {
    let candidate = candidate.trim();
    if candidate.chars().count() < MIN_CODE_LEN {
        if !candidate.is_empty() {
            tracing::debug!(
                "Ignoring short authorization code candidate {} from {}",
                mask_secret(candidate),
                source
            );
        }
        return None;
    }

    Some(AuthorizationCode {
        value: candidate.to_string(),
        state: state
            .map(str::trim)
            .filter(|state| !state.is_empty())
            .map(str::to_string),
        source,
    })
}

fn lookup<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.as_str())
}

fn code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"\bcode=([^&#\s"'<>]+)"#).expect("Invalid regex"))
}

fn state_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"\bstate=([^&#\s"'<>]+)"#).expect("Invalid regex"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_code_is_returned() {
        let code =
            parse_callback("https://app.example.com/kroger/callback?code=abc123def456&state=789")
                .unwrap();
        assert_eq!(code.as_str(), "abc123def456");
        assert_eq!(code.state(), Some("789"));
        assert_eq!(code.source(), CodeSource::Query);
    }

    #[test]
    fn fragment_code_is_returned_for_deep_link() {
        let code = parse_callback("smartmealplanner://kroger-auth#code=xyz789uvw012").unwrap();
        assert_eq!(code.as_str(), "xyz789uvw012");
        assert_eq!(code.source(), CodeSource::Fragment);
    }

    #[test]
    fn query_takes_precedence_over_fragment() {
        let code =
            parse_callback("smartmealplanner://kroger-auth?code=query-code-123#code=fragment-code-456")
                .unwrap();
        assert_eq!(code.as_str(), "query-code-123");
    }

    #[test]
    fn short_query_code_falls_through_to_fragment() {
        let code = parse_callback("smartmealplanner://kroger-auth?code=short#code=fragment-code-456")
            .unwrap();
        assert_eq!(code.as_str(), "fragment-code-456");
        assert_eq!(code.source(), CodeSource::Fragment);
    }

    #[test]
    fn raw_scan_decodes_value() {
        let code = parse_callback("Redirected to: callback code=abc%2Fdef%3D12345 (done)").unwrap();
        assert_eq!(code.as_str(), "abc/def=12345");
        assert_eq!(code.source(), CodeSource::RawScan);
    }

    #[test]
    fn raw_scan_ignores_prefixed_parameter_names() {
        assert!(matches!(
            parse_callback("auth_code=abcdefghijklmnop"),
            Err(AuthError::NoCodeFound)
        ));
    }

    #[test]
    fn short_codes_are_rejected_from_every_source() {
        for raw in [
            "https://app.example.com/cb?code=0123456789",
            "smartmealplanner://kroger-auth#code=0123456789",
            "code=0123456789",
        ] {
            assert!(
                matches!(parse_callback(raw), Err(AuthError::NoCodeFound)),
                "expected NoCodeFound for {raw}"
            );
        }
    }

    #[test]
    fn eleven_character_code_is_accepted() {
        let code = parse_callback("https://app.example.com/cb?code=0123456789a").unwrap();
        assert_eq!(code.as_str(), "0123456789a");
    }

    #[test]
    fn missing_code_is_reported() {
        assert!(matches!(
            parse_callback("https://app.example.com/kroger/callback?state=789"),
            Err(AuthError::NoCodeFound)
        ));
        assert!(matches!(parse_callback("   "), Err(AuthError::NoCodeFound)));
    }

    #[test]
    fn parsing_is_repeatable() {
        let url = "https://app.example.com/kroger/callback?code=abc123def456&state=789";
        let first = parse_callback(url).unwrap();
        let second = parse_callback(url).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn manual_entry_accepts_bare_code_and_urls() {
        let bare = AuthorizationCode::from_manual_entry("  abc123def456 ").unwrap();
        assert_eq!(bare.as_str(), "abc123def456");
        assert_eq!(bare.source(), CodeSource::Manual);
        assert!(bare.state().is_none());

        let pasted =
            AuthorizationCode::from_manual_entry("smartmealplanner://kroger-auth?code=abc123def456")
                .unwrap();
        assert_eq!(pasted.source(), CodeSource::Query);

        assert!(AuthorizationCode::from_manual_entry("not a code").is_err());
        assert!(AuthorizationCode::from_manual_entry("tiny").is_err());
    }

    #[test]
    fn provider_error_is_detected() {
        let error = provider_error(
            "smartmealplanner://kroger-auth?error=access_denied&error_description=User+denied",
        )
        .unwrap();
        assert!(error.is_access_denied());
        assert_eq!(error.description.as_deref(), Some("User denied"));
        assert_eq!(error.to_string(), "access_denied (User denied)");

        assert!(provider_error("smartmealplanner://kroger-auth?code=abc123def456").is_none());
    }

    #[test]
    fn debug_masks_code() {
        let code = parse_callback("https://app.example.com/cb?code=abc123def456").unwrap();
        let rendered = format!("{code:?}");
        assert!(!rendered.contains("abc123def456"));
    }
}
