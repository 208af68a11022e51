//! Client-held session and the operations that move it between states.

use std::sync::{Arc, Weak};

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::SessionStatus;
use crate::api::paths;
use crate::api::types::{
    AuthResponse, LoginRequest, RegisterRequest, RegistrationRole, User, UserUpdate,
};
use crate::error::BookingClientError;
use crate::http::{ApiClient, ApiRequest, AuthListener, RefreshFailure};
use crate::storage::{CredentialPair, TokenStore};
use crate::Result;

/// Snapshot of the client's belief about who is signed in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    /// Present exactly when `status` is `Authenticated`.
    pub user: Option<User>,
    pub status: SessionStatus,
    /// Last user-visible failure of login, register or profile update.
    pub error: Option<String>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.status.is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        !self.status.is_settled()
    }
}

/// Observable holder of the current [`Session`].
#[derive(Debug)]
struct SessionCell {
    tx: watch::Sender<Session>,
}

impl SessionCell {
    fn new() -> Self {
        let (tx, _) = watch::channel(Session::default());
        Self { tx }
    }

    /// Move to `target` as one published update. A rejected transition
    /// publishes nothing.
    fn transition(&self, target: SessionStatus, user: Option<User>, clear_error: bool) {
        self.tx.send_if_modified(|session| {
            if let Err(e) = session.status.transition_to(target) {
                error!(error = %e, "Rejected session transition");
                return false;
            }
            session.user = user;
            if clear_error {
                session.error = None;
            }
            true
        });
    }

    fn set_authenticated(&self, user: User) {
        debug!(user_id = user.id, role = %user.role, "Session authenticated");
        self.transition(SessionStatus::Authenticated, Some(user), true);
    }

    fn set_anonymous(&self) {
        self.transition(SessionStatus::Anonymous, None, false);
    }

    fn set_error(&self, message: String) {
        self.tx.send_modify(|session| session.error = Some(message));
    }

    fn clear_error(&self) {
        self.tx.send_if_modified(|session| session.error.take().is_some());
    }
}

impl AuthListener for SessionCell {
    fn on_forced_logout(&self, reason: &RefreshFailure) {
        warn!(%reason, "Session ended by failed token refresh");
        self.set_anonymous();
    }
}

/// Owner of the session state and the only code that changes it.
///
/// Construct one per application instance and hand it to the UI shell,
/// which reads it through [`SessionMachine::subscribe`].
pub struct SessionMachine {
    client: Arc<ApiClient>,
    cell: Arc<SessionCell>,
}

impl SessionMachine {
    /// Create a machine in the `Loading` state and register it for forced
    /// logouts raised by `client`.
    pub fn new(client: Arc<ApiClient>) -> Result<Self> {
        let cell = Arc::new(SessionCell::new());
        let listener: Weak<dyn AuthListener> = Arc::downgrade(&cell) as Weak<dyn AuthListener>;
        client.add_listener(listener)?;
        Ok(Self { client, cell })
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    /// Current session value.
    pub fn snapshot(&self) -> Session {
        self.cell.tx.borrow().clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.cell.tx.borrow().status
    }

    pub fn user(&self) -> Option<User> {
        self.cell.tx.borrow().user.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.cell.tx.borrow().error.clone()
    }

    /// Receive every future session change.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.cell.tx.subscribe()
    }

    /// Sign in with email and password.
    ///
    /// On failure the session state is left as it was, the backend's
    /// message is stored as the session error and the error is returned.
    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        let request = ApiRequest::post(paths::LOGIN).public().json(&LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        })?;
        self.authenticate(request, "Login failed").await
    }

    /// Create an account and sign in.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
        role: RegistrationRole,
    ) -> Result<User> {
        let request = ApiRequest::post(paths::REGISTER)
            .public()
            .json(&RegisterRequest {
                email: email.to_string(),
                password: password.to_string(),
                full_name: full_name.to_string(),
                role,
            })?;
        self.authenticate(request, "Registration failed").await
    }

    async fn authenticate(&self, request: ApiRequest, fallback: &str) -> Result<User> {
        self.cell.clear_error();

        let result = async {
            let auth: AuthResponse = self.client.fetch(&request).await?;
            self.client.store().save(&CredentialPair::new(
                auth.access_token,
                auth.refresh_token,
            ))?;
            Ok::<_, BookingClientError>(auth.user)
        }
        .await;

        match result {
            Ok(user) => {
                info!(user_id = user.id, path = request.path(), "Signed in");
                self.cell.set_authenticated(user.clone());
                Ok(user)
            }
            Err(e) => {
                warn!(error = %e, path = request.path(), "Sign-in failed");
                self.cell.set_error(e.user_message(fallback));
                Err(e)
            }
        }
    }

    /// Drop the credentials and become anonymous. No network call.
    pub fn logout(&self) {
        if let Err(e) = self.client.store().clear() {
            error!(error = %e, "Failed to clear stored credentials");
        }
        self.cell.set_anonymous();
        debug!("Logged out");
    }

    /// Restore the session from stored credentials at startup.
    pub async fn load_user(&self) -> SessionStatus {
        let token = match self.client.store().access_token() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Could not read stored credentials");
                None
            }
        };

        if token.is_none() {
            debug!("No stored access token");
            self.logout();
            return self.status();
        }

        match self.fetch_current_user().await {
            Ok(user) => {
                info!(user_id = user.id, "Session restored");
                self.cell.set_authenticated(user);
            }
            Err(e) => {
                debug!(error = %e, "Stored access token not accepted");
                self.refresh_token().await;
            }
        }
        self.status()
    }

    /// Obtain a new access token and re-confirm identity; log out on any
    /// failure.
    pub async fn refresh_token(&self) -> SessionStatus {
        match self.client.store().refresh_token() {
            Ok(Some(_)) => {}
            Ok(None) => {
                self.logout();
                return self.status();
            }
            Err(e) => {
                warn!(error = %e, "Could not read stored refresh token");
                self.logout();
                return self.status();
            }
        }

        let result = async {
            self.client.refresh_session().await?;
            self.fetch_current_user().await
        }
        .await;

        match result {
            Ok(user) => {
                info!(user_id = user.id, "Session recovered with refreshed token");
                self.cell.set_authenticated(user);
            }
            Err(e) => {
                warn!(error = %e, "Session recovery failed");
                self.logout();
            }
        }
        self.status()
    }

    /// Forget the last surfaced error message.
    pub fn clear_error(&self) {
        self.cell.clear_error();
    }

    /// Update the signed-in user's profile.
    ///
    /// An update that changes nothing is rejected without a request.
    pub async fn update_profile(&self, update: &UserUpdate) -> Result<User> {
        if update.is_empty() {
            let err = BookingClientError::InvalidInput("Nothing to update".into());
            self.cell.set_error(err.user_message("Profile update failed"));
            return Err(err);
        }

        let result = async {
            let request = ApiRequest::put(paths::CURRENT_USER).json(update)?;
            self.client.fetch::<User>(&request).await
        }
        .await;

        match result {
            Ok(user) => {
                self.cell.set_authenticated(user.clone());
                Ok(user)
            }
            Err(e) => {
                if !e.is_auth_failure() {
                    self.cell.set_error(e.user_message("Profile update failed"));
                }
                Err(e)
            }
        }
    }

    async fn fetch_current_user(&self) -> Result<User> {
        self.client
            .fetch(&ApiRequest::get(paths::CURRENT_USER))
            .await
    }
}

impl std::fmt::Debug for SessionMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionMachine")
            .field("session", &*self.cell.tx.borrow())
            .finish()
    }
}
