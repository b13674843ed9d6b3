//! Retailer linking state machine.
//!
//! ```text
//! Idle -> CheckingExistingAuth -> LaunchingBrowser -> AwaitingCallback
//!      -> ExchangingCode -> Synchronizing -> Success
//! ```
//!
//! Any non-terminal state may fall to `Failed`. Front-end events arrive via
//! [`AuthFlowController::handle_event`], usually from [`AuthFlowController::run`].
//! State lives behind a synchronous mutex that is never held across an await;
//! the move from `AwaitingCallback` to `ExchangingCode` happens under a single
//! lock so a second callback for the same code is ignored.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use url::Url;

use super::{
    build_authorization_request, parse_callback, provider_error, AuthError, AuthResult,
    AuthSession, AuthorizationCode, AuthorizationRequest, AuthorizeParams, BrowserLauncher,
    CodeSource, LaunchMode, SessionSynchronizer, SyncReport, TokenExchangeClient,
};
use crate::api::AccountApi;
use crate::config::{ClientConfig, ConfigError};
use crate::lifecycle::{LifecycleEvent, LifecycleHub};
use crate::models::{FlowId, Retailer};
use crate::store::{KeyValueStore, SessionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowFailure {
    Configuration,
    LaunchFailed,
    ExchangeFailed,
    PersistFailed,
    Cancelled,
    Timeout,
}

impl FlowFailure {
    fn fallback_error(self) -> AuthError {
        match self {
            Self::Configuration => {
                AuthError::InvalidConfiguration("authorization request rejected".to_string())
            }
            Self::LaunchFailed => AuthError::Launch("no launch mode succeeded".to_string()),
            Self::ExchangeFailed => AuthError::AuthExchangeFailed {
                attempts: Vec::new(),
            },
            Self::PersistFailed => AuthError::Api("session was not saved".to_string()),
            Self::Cancelled => AuthError::UserCancelled,
            Self::Timeout => AuthError::Timeout,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    CheckingExistingAuth,
    LaunchingBrowser,
    AwaitingCallback,
    ExchangingCode,
    Synchronizing,
    Success,
    Failed(FlowFailure),
}

impl FlowState {
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed(_))
    }
}

/// What a single event did to the flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Not relevant in the current state.
    Ignored,
    /// The app resumed but no code could be found; ask the user to paste one.
    NeedsManualCode,
    /// A callback arrived for a different authorization request.
    Rejected(String),
    Transitioned(FlowState),
}

#[derive(Debug, Clone)]
pub struct FlowSettings {
    pub retailer: Retailer,
    pub authorize: AuthorizeParams,
    pub launch_modes: Vec<LaunchMode>,
    pub timeout: Duration,
    pub zip_code: Option<String>,
}

impl FlowSettings {
    pub fn from_config(config: &ClientConfig, retailer: Retailer) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            retailer,
            authorize: config.authorize_params()?,
            launch_modes: config.launch_modes.clone(),
            timeout: config.flow_timeout(),
            zip_code: config.zip_code(),
        })
    }
}

struct FlowInner {
    state: FlowState,
    flow_id: FlowId,
    request: Option<AuthorizationRequest>,
    deadline: Option<Instant>,
    error: Option<AuthError>,
    report: Option<SyncReport>,
}

impl Default for FlowInner {
    fn default() -> Self {
        Self {
            state: FlowState::Idle,
            flow_id: FlowId::new(),
            request: None,
            deadline: None,
            error: None,
            report: None,
        }
    }
}

impl FlowInner {
    fn is_overdue(&self) -> bool {
        self.deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }
}

pub struct AuthFlowController<K: KeyValueStore> {
    settings: FlowSettings,
    store: SessionStore<K>,
    api: Arc<dyn AccountApi>,
    exchange: TokenExchangeClient,
    synchronizer: SessionSynchronizer<K>,
    launcher: Arc<dyn BrowserLauncher>,
    inner: Mutex<FlowInner>,
}

impl<K: KeyValueStore + Clone> AuthFlowController<K> {
    pub fn new(
        settings: FlowSettings,
        store: SessionStore<K>,
        api: Arc<dyn AccountApi>,
        exchange: TokenExchangeClient,
        launcher: Arc<dyn BrowserLauncher>,
    ) -> Self {
        let synchronizer =
            SessionSynchronizer::new(store.clone(), Arc::clone(&api), settings.zip_code.clone());
        Self {
            settings,
            store,
            api,
            exchange,
            synchronizer,
            launcher,
            inner: Mutex::new(FlowInner::default()),
        }
    }
}

impl<K: KeyValueStore> AuthFlowController<K> {
    pub fn state(&self) -> FlowState {
        self.lock().state.clone()
    }

    pub fn flow_id(&self) -> FlowId {
        self.lock().flow_id
    }

    pub const fn settings(&self) -> &FlowSettings {
        &self.settings
    }

    pub const fn synchronizer(&self) -> &SessionSynchronizer<K> {
        &self.synchronizer
    }

    /// The outstanding authorization request, while one is pending.
    pub fn authorization_request(&self) -> Option<AuthorizationRequest> {
        self.lock().request.clone()
    }

    pub fn sync_report(&self) -> Option<SyncReport> {
        self.lock().report.clone()
    }

    /// Error behind the current `Failed` state, if not already taken.
    pub fn take_error(&self) -> Option<AuthError> {
        self.lock().error.take()
    }

    /// Begin a flow from `Idle`. Returns the state reached once the browser
    /// has been launched or an existing session was accepted.
    pub async fn start(&self) -> FlowState {
        {
            let mut inner = self.lock();
            if inner.state != FlowState::Idle {
                tracing::debug!("Flow {} already started ({:?})", inner.flow_id, inner.state);
                return inner.state.clone();
            }
            inner.deadline = Some(Instant::now() + self.settings.timeout);
            tracing::info!(
                "Starting {} link flow {}",
                self.settings.retailer,
                inner.flow_id
            );
            Self::transition(&mut inner, FlowState::CheckingExistingAuth);
        }

        if self.existing_session_is_valid().await {
            let mut inner = self.lock();
            if inner.state == FlowState::CheckingExistingAuth {
                inner.deadline = None;
                Self::transition(&mut inner, FlowState::Success);
            }
            return inner.state.clone();
        }

        self.launch()
    }

    /// Back to `Idle` with a fresh flow id. Only allowed from a terminal state.
    pub fn restart(&self) -> bool {
        let mut inner = self.lock();
        if !inner.state.is_terminal() {
            return false;
        }
        *inner = FlowInner::default();
        true
    }

    /// Cancel from any state except `Synchronizing`, where the session is
    /// already being committed.
    pub fn cancel(&self) -> Option<FlowState> {
        let mut inner = self.lock();
        if inner.state.is_terminal() {
            return None;
        }
        if inner.state == FlowState::Synchronizing {
            tracing::debug!("Ignoring cancel while committing the session");
            return None;
        }
        Some(Self::fail(
            &mut inner,
            FlowFailure::Cancelled,
            AuthError::UserCancelled,
        ))
    }

    pub async fn handle_event(&self, event: LifecycleEvent) -> EventOutcome {
        if let Some(state) = self.expire(false) {
            return EventOutcome::Transitioned(state);
        }

        match event {
            LifecycleEvent::Cancelled => self
                .cancel()
                .map_or(EventOutcome::Ignored, EventOutcome::Transitioned),
            LifecycleEvent::NavigationIntercepted(url) => {
                if self.is_redirect(&url) {
                    self.on_callback(&url).await
                } else {
                    EventOutcome::Ignored
                }
            }
            LifecycleEvent::DeepLink(url)
            | LifecycleEvent::Resumed {
                callback_url: Some(url),
            } => self.on_callback(&url).await,
            LifecycleEvent::Resumed { callback_url: None } => {
                if self.state() == FlowState::AwaitingCallback {
                    EventOutcome::NeedsManualCode
                } else {
                    EventOutcome::Ignored
                }
            }
            LifecycleEvent::ManualCode(text) => {
                self.on_code(AuthorizationCode::from_manual_entry(&text))
                    .await
            }
        }
    }

    /// Drive one flow to completion against `hub`'s events.
    pub async fn run(&self, hub: &LifecycleHub) -> AuthResult<AuthSession> {
        let mut subscription = hub.subscribe();
        let mut state = self.start().await;
        let deadline = self
            .lock()
            .deadline
            .unwrap_or_else(|| Instant::now() + self.settings.timeout);

        while !state.is_terminal() {
            tokio::select! {
                () = sleep_until(deadline) => {
                    self.expire(true);
                    break;
                }
                event = subscription.next() => {
                    let Some(event) = event else {
                        tracing::debug!("Lifecycle hub closed; cancelling flow");
                        self.cancel();
                        break;
                    };
                    if self.handle_event(event).await == EventOutcome::NeedsManualCode {
                        tracing::info!("No authorization code found; waiting for manual entry");
                    }
                }
            }
            state = self.state();
        }
        drop(subscription);

        self.outcome()
    }

    fn outcome(&self) -> AuthResult<AuthSession> {
        let mut inner = self.lock();
        match inner.state.clone() {
            FlowState::Success => {
                if let Some(report) = &inner.report {
                    return Ok(report.session.clone());
                }
                drop(inner);
                self.store.load_session()?.ok_or_else(|| {
                    AuthError::Api("linked session disappeared from storage".to_string())
                })
            }
            FlowState::Failed(failure) => Err(inner
                .error
                .take()
                .unwrap_or_else(|| failure.fallback_error())),
            _ => Err(AuthError::Timeout),
        }
    }

    async fn existing_session_is_valid(&self) -> bool {
        let retailer = self.settings.retailer;
        let session = match self.store.load_session() {
            Ok(Some(session)) => session,
            Ok(None) => return false,
            Err(error) => {
                tracing::warn!("Discarding unreadable {} session: {}", retailer, error);
                self.clear_stale_session();
                return false;
            }
        };

        match self.api.verify_auth(retailer, &session).await {
            Ok(true) => {
                tracing::info!("Existing {} session is still valid", retailer);
                true
            }
            Ok(false) => {
                tracing::info!("Backend rejected stored {} session; re-linking", retailer);
                self.clear_stale_session();
                false
            }
            Err(error) => {
                tracing::warn!("Could not verify {} session, re-linking: {}", retailer, error);
                false
            }
        }
    }

    fn clear_stale_session(&self) {
        if let Err(error) = self.store.clear_session() {
            tracing::warn!("Failed to clear stale session: {}", error);
        }
    }

    fn launch(&self) -> FlowState {
        let mut inner = self.lock();
        if inner.state != FlowState::CheckingExistingAuth {
            return inner.state.clone();
        }
        Self::transition(&mut inner, FlowState::LaunchingBrowser);

        let request = match build_authorization_request(&self.settings.authorize) {
            Ok(request) => request,
            Err(error) => return Self::fail(&mut inner, FlowFailure::Configuration, error),
        };

        let mut refusals = Vec::new();
        for mode in &self.settings.launch_modes {
            match self.launcher.launch(*mode, &request.url) {
                Ok(()) => {
                    tracing::info!(
                        "Opened {} authorization via {}",
                        self.settings.retailer,
                        mode
                    );
                    inner.request = Some(request);
                    Self::transition(&mut inner, FlowState::AwaitingCallback);
                    return inner.state.clone();
                }
                Err(error) => {
                    tracing::debug!("Launch mode {} unavailable: {}", mode, error);
                    refusals.push(format!("{mode}: {error}"));
                }
            }
        }

        Self::fail(
            &mut inner,
            FlowFailure::LaunchFailed,
            AuthError::Launch(refusals.join("; ")),
        )
    }

    fn is_redirect(&self, url: &str) -> bool {
        let (Ok(candidate), Ok(expected)) = (
            Url::parse(url.trim()),
            Url::parse(&self.settings.authorize.redirect_uri),
        ) else {
            return false;
        };
        candidate.scheme() == expected.scheme()
            && candidate.host_str() == expected.host_str()
            && candidate.port_or_known_default() == expected.port_or_known_default()
            && candidate.path().trim_end_matches('/') == expected.path().trim_end_matches('/')
    }

    async fn on_callback(&self, url: &str) -> EventOutcome {
        if let Some(provider) = provider_error(url) {
            let mut inner = self.lock();
            if inner.state != FlowState::AwaitingCallback {
                return EventOutcome::Ignored;
            }
            let state = if provider.is_access_denied() {
                tracing::info!("User declined {} authorization", self.settings.retailer);
                Self::fail(&mut inner, FlowFailure::Cancelled, AuthError::UserCancelled)
            } else {
                Self::fail(
                    &mut inner,
                    FlowFailure::ExchangeFailed,
                    AuthError::Provider(provider),
                )
            };
            return EventOutcome::Transitioned(state);
        }

        self.on_code(parse_callback(url)).await
    }

    async fn on_code(&self, parsed: AuthResult<AuthorizationCode>) -> EventOutcome {
        let code = {
            let mut inner = self.lock();
            if inner.state != FlowState::AwaitingCallback {
                tracing::debug!("Ignoring callback while {:?}", inner.state);
                return EventOutcome::Ignored;
            }
            let code = match parsed {
                Ok(code) => code,
                Err(error) => {
                    tracing::debug!("Callback carried no usable code: {}", error);
                    return EventOutcome::NeedsManualCode;
                }
            };
            let expected = inner.request.as_ref().map(|request| request.state.as_str());
            match (code.state(), expected) {
                (Some(received), Some(expected)) if received != expected => {
                    tracing::warn!("Rejecting callback for a different authorization request");
                    return EventOutcome::Rejected("state mismatch".to_string());
                }
                (None, Some(_)) if code.source() != CodeSource::Manual => {
                    tracing::warn!("Rejecting callback URL without a state parameter");
                    return EventOutcome::Rejected("missing state".to_string());
                }
                _ => {}
            }
            Self::transition(&mut inner, FlowState::ExchangingCode);
            code
        };

        tracing::info!(
            "Exchanging {} authorization code from {}",
            self.settings.retailer,
            code.source()
        );
        let exchanged = self
            .exchange
            .exchange(code, &self.settings.authorize.redirect_uri)
            .await;

        let tokens = {
            let mut inner = self.lock();
            if inner.state != FlowState::ExchangingCode {
                tracing::info!("Discarding exchange result; flow is now {:?}", inner.state);
                return EventOutcome::Ignored;
            }
            if inner.is_overdue() {
                return EventOutcome::Transitioned(Self::fail(
                    &mut inner,
                    FlowFailure::Timeout,
                    AuthError::Timeout,
                ));
            }
            match exchanged {
                Ok(tokens) => {
                    Self::transition(&mut inner, FlowState::Synchronizing);
                    tokens
                }
                Err(error) => {
                    return EventOutcome::Transitioned(Self::fail(
                        &mut inner,
                        FlowFailure::ExchangeFailed,
                        error,
                    ));
                }
            }
        };

        let synced = self.synchronizer.synchronize(tokens).await;

        let mut inner = self.lock();
        match synced {
            Ok(report) => {
                tracing::info!(
                    "Linked {} account (remote sync: {})",
                    self.settings.retailer,
                    report.remote_synced
                );
                inner.report = Some(report);
                inner.request = None;
                inner.deadline = None;
                Self::transition(&mut inner, FlowState::Success);
            }
            Err(error) => {
                Self::fail(&mut inner, FlowFailure::PersistFailed, error);
            }
        }
        EventOutcome::Transitioned(inner.state.clone())
    }

    /// Fail with `Timeout` when the deadline has passed, or unconditionally
    /// when `force` is set. `Synchronizing` is allowed to finish.
    fn expire(&self, force: bool) -> Option<FlowState> {
        let mut inner = self.lock();
        if inner.state.is_terminal() || inner.state == FlowState::Synchronizing {
            return None;
        }
        if !force && !inner.is_overdue() {
            return None;
        }
        tracing::warn!("{} link flow {} timed out", self.settings.retailer, inner.flow_id);
        Some(Self::fail(&mut inner, FlowFailure::Timeout, AuthError::Timeout))
    }

    fn transition(inner: &mut FlowInner, next: FlowState) {
        tracing::debug!("Flow {}: {:?} -> {:?}", inner.flow_id, inner.state, next);
        inner.state = next;
    }

    fn fail(inner: &mut FlowInner, failure: FlowFailure, error: AuthError) -> FlowState {
        tracing::warn!("Flow {} failed: {}", inner.flow_id, error);
        inner.request = None;
        inner.deadline = None;
        inner.error = Some(error);
        Self::transition(inner, FlowState::Failed(failure));
        inner.state.clone()
    }

    fn lock(&self) -> MutexGuard<'_, FlowInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
