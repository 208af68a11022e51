//! Token-bearing HTTP client with transparent access-token recovery.

use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;

use reqwest::Url;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::refresh::{RefreshCoordinator, RefreshFailure, RefreshOutcome};
use super::request::{ApiRequest, ApiResponse};
use crate::api::paths;
use crate::api::types::{RefreshRequest, TokenResponse};
use crate::error::BookingClientError;
use crate::storage::TokenStore;
use crate::Result;

/// A request gets at most this many replays after a 401.
const MAX_AUTH_RETRIES: u32 = 1;

/// Capacity of the auth event channel.
const EVENT_CAPACITY: usize = 16;

/// Transport settings for [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend origin, e.g. `http://127.0.0.1:8004`.
    pub base_url: String,
    /// Whole-request timeout enforced by the transport.
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("http://127.0.0.1:8004")
    }
}

/// Signals emitted to the UI shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// A new access token was installed.
    TokenRefreshed,
    /// Credentials were discarded; the shell should go to its sign-in entry point.
    ForcedLogout { reason: RefreshFailure },
}

/// Receives the forced-logout notification synchronously, before the
/// failing request returns to its caller.
pub trait AuthListener: Send + Sync {
    fn on_forced_logout(&self, reason: &RefreshFailure);
}

/// Who asked for a refresh. Only interceptor-driven failures emit the
/// forced-logout signal; the startup path logs out on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshTrigger {
    Interceptor,
    Startup,
}

/// HTTP client for the booking backend.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    store: Arc<dyn TokenStore>,
    refresh: RefreshCoordinator,
    listeners: RwLock<Vec<Weak<dyn AuthListener>>>,
    events: broadcast::Sender<AuthEvent>,
}

impl ApiClient {
    /// Create a client for `config.base_url` using `store` for credentials.
    pub fn new(config: ClientConfig, store: Arc<dyn TokenStore>) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|e| {
            BookingClientError::InvalidUrl(format!("{}: {}", config.base_url, e))
        })?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            http,
            base_url,
            store,
            refresh: RefreshCoordinator::new(),
            listeners: RwLock::new(Vec::new()),
            events,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Credential storage shared with the session.
    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Refresh coordinator, exposed for inspection.
    pub fn refresh_coordinator(&self) -> &RefreshCoordinator {
        &self.refresh
    }

    /// Subscribe to auth events (token refreshed, forced logout).
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// Register a listener for forced logouts. Dropped listeners are pruned.
    pub fn add_listener(&self, listener: Weak<dyn AuthListener>) -> Result<()> {
        let mut listeners = self
            .listeners
            .write()
            .map_err(|_| BookingClientError::LockPoisoned)?;
        listeners.retain(|l| l.strong_count() > 0);
        listeners.push(listener);
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn bearer_for(&self, request: &ApiRequest) -> Result<Option<String>> {
        if request.is_public() {
            return Ok(None);
        }
        self.store.access_token()
    }

    /// Issue one request with `bearer` attached and read the whole body.
    async fn dispatch(&self, request: &ApiRequest, bearer: Option<&str>) -> Result<ApiResponse> {
        let url = self.url(request.path());
        let mut builder = self.http.request(request.method().clone(), &url);

        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        debug!(
            method = %request.method(),
            path = request.path(),
            authenticated = bearer.is_some(),
            "Sending request"
        );

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?.to_vec();

        debug!(
            method = %request.method(),
            path = request.path(),
            status = status.as_u16(),
            "Received response"
        );

        Ok(ApiResponse::new(status, body))
    }

    /// Send once with the stored bearer token, without auth recovery.
    ///
    /// Returns the backend response whatever its status; only transport
    /// failures are errors.
    pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let bearer = self.bearer_for(request)?;
        self.dispatch(request, bearer.as_deref()).await
    }

    /// Send through the full pipeline.
    ///
    /// A 401 on a non-public request triggers one refresh-and-replay. A
    /// second 401 on the replay is final. Other statuses are returned as-is.
    pub async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let mut bearer = self.bearer_for(request)?;
        let mut attempt = 0;

        loop {
            let response = self.dispatch(request, bearer.as_deref()).await?;
            if request.is_public() || !response.is_unauthorized() {
                return Ok(response);
            }

            if attempt >= MAX_AUTH_RETRIES {
                warn!(
                    method = %request.method(),
                    path = request.path(),
                    "Request still unauthorized after token refresh"
                );
                return Err(BookingClientError::Unauthorized {
                    detail: response.error_detail(),
                });
            }

            bearer = Some(self.on_auth_failure(request, bearer.as_deref()).await?);
            attempt += 1;
        }
    }

    /// Recover from a 401 and return the token to replay `request` with.
    async fn on_auth_failure(&self, request: &ApiRequest, sent_token: Option<&str>) -> Result<String> {
        if !self.refresh.is_refreshing() {
            match self.store.access_token()? {
                // A refresh completed while this request was on the wire
                Some(current) if sent_token != Some(current.as_str()) => {
                    debug!(path = request.path(), "Replaying with already refreshed token");
                    return Ok(current);
                }
                Some(_) => {}
                // Signed out, or a failed refresh already cleared the store
                None => {
                    debug!(path = request.path(), "No credentials to refresh");
                    return Err(BookingClientError::RefreshFailed(
                        RefreshFailure::MissingRefreshToken,
                    ));
                }
            }
        }

        debug!(path = request.path(), "Access token rejected, refreshing");
        let token = self
            .refresh
            .await_refreshed_token(|| self.refresh_access_token(RefreshTrigger::Interceptor))
            .await?;
        Ok(token)
    }

    /// Send and decode a JSON response, mapping error statuses to errors.
    pub async fn fetch<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T> {
        self.execute(request).await?.error_for_status()?.json()
    }

    /// Send and discard the response body, mapping error statuses to errors.
    pub async fn fetch_empty(&self, request: &ApiRequest) -> Result<()> {
        self.execute(request).await?.error_for_status()?;
        Ok(())
    }

    /// Renew the access token outside of request interception.
    ///
    /// Joins a refresh that is already running. On failure the stored
    /// credentials are cleared, but no forced-logout signal is emitted.
    pub async fn refresh_session(&self) -> Result<String> {
        let token = self
            .refresh
            .await_refreshed_token(|| self.refresh_access_token(RefreshTrigger::Startup))
            .await?;
        Ok(token)
    }

    /// Call the refresh endpoint with the stored refresh token. Runs only
    /// in the coordinator's leader.
    async fn refresh_access_token(&self, trigger: RefreshTrigger) -> RefreshOutcome {
        let outcome = self.request_new_access_token().await;
        match &outcome {
            Ok(_) => {
                info!("Access token refreshed");
                let _ = self.events.send(AuthEvent::TokenRefreshed);
            }
            Err(reason) => self.discard_credentials(reason, trigger),
        }
        outcome
    }

    async fn request_new_access_token(&self) -> RefreshOutcome {
        let refresh_token = self
            .store
            .refresh_token()
            .map_err(|e| RefreshFailure::Storage(e.to_string()))?
            .ok_or(RefreshFailure::MissingRefreshToken)?;

        let request = ApiRequest::post(paths::REFRESH)
            .public()
            .json(&RefreshRequest {
                refresh_token: refresh_token.clone(),
            })
            .map_err(|e| RefreshFailure::Transport(e.to_string()))?;

        let response = self
            .dispatch(&request, None)
            .await
            .map_err(|e| RefreshFailure::Transport(e.to_string()))?;

        if !response.is_success() {
            return Err(RefreshFailure::Rejected {
                status: response.status().as_u16(),
                detail: response.error_detail(),
            });
        }

        let tokens: TokenResponse = response
            .json()
            .map_err(|e| RefreshFailure::Transport(e.to_string()))?;

        let issued = tokens.access_token.clone();
        match self.store.replace_access_token(
            &refresh_token,
            tokens.access_token,
            tokens.refresh_token,
        ) {
            Ok(Some(pair)) => {
                if pair.access_token != issued {
                    debug!("Credentials replaced during refresh, keeping the newer pair");
                }
                Ok(pair.access_token)
            }
            // Logged out while the refresh was on the wire
            Ok(None) => Err(RefreshFailure::MissingRefreshToken),
            Err(e) => Err(RefreshFailure::Storage(e.to_string())),
        }
    }

    fn discard_credentials(&self, reason: &RefreshFailure, trigger: RefreshTrigger) {
        warn!(%reason, ?trigger, "Token refresh failed, clearing credentials");

        if let Err(e) = self.store.clear() {
            error!(error = %e, "Failed to clear stored credentials");
        }

        if trigger != RefreshTrigger::Interceptor {
            return;
        }

        self.notify_forced_logout(reason);
        let _ = self.events.send(AuthEvent::ForcedLogout {
            reason: reason.clone(),
        });
    }

    fn notify_forced_logout(&self, reason: &RefreshFailure) {
        let listeners: Vec<Arc<dyn AuthListener>> = match self.listeners.read() {
            Ok(listeners) => listeners.iter().filter_map(Weak::upgrade).collect(),
            Err(_) => {
                error!("Auth listener registry poisoned");
                return;
            }
        };

        for listener in listeners {
            listener.on_forced_logout(reason);
        }
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("refreshing", &self.refresh.is_refreshing())
            .finish()
    }
}
