//! Identity: who is logged in, and the only place that changes it.

use reqwest::Method;
use serde_json::json;

use crate::core::user::{Credentials, NewUser, User};
use crate::error::ClientError;
use crate::http::{Gateway, paths};
use crate::lists::ListManager;
use crate::notify::Notification;
use crate::refresh::RefreshSignal;
use crate::tasks::TaskManager;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Anonymous,
    Authenticated(User),
}

/// The explicit session handle. Create one at startup and pass it to whatever
/// needs to know the current user; list and task managers are handed out only
/// while it is authenticated.
pub struct Session {
    gateway: Gateway,
    state: AuthState,
}

impl Session {
    pub fn new(gateway: Gateway) -> Self {
        Self {
            gateway,
            state: AuthState::Anonymous,
        }
    }

    /// A session picked up from the server's cookie, if there is one.
    pub async fn restore(gateway: Gateway) -> Self {
        let mut session = Self::new(gateway);
        if let Err(e) = session.fetch_current_user().await {
            log::warn!("Could not restore session: {}", e);
        }
        session
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn user(&self) -> Option<&User> {
        match &self.state {
            AuthState::Authenticated(user) => Some(user),
            AuthState::Anonymous => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user().is_some()
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub async fn login(&mut self, credentials: &Credentials) -> Result<User, ClientError> {
        if credentials.login.trim().is_empty() || credentials.password.is_empty() {
            return Err(ClientError::Validation(
                "Login and password are required".to_string(),
            ));
        }

        match self.post_login(credentials).await {
            Ok(user) => {
                log::info!("Logged in as {}", user.username);
                self.gateway
                    .notify(Notification::success("Logged in successfully!"));
                Ok(self.set_user(user))
            }
            Err(e) => {
                self.gateway.notify(Notification::error(failure_text(
                    "Login failed. Please check your credentials.",
                    &e,
                )));
                Err(e)
            }
        }
    }

    /// Create the account, then log straight into it. Either step failing fails the whole call.
    pub async fn signup(&mut self, new_user: &NewUser) -> Result<User, ClientError> {
        let fields = [
            &new_user.username,
            &new_user.email,
            &new_user.password,
            &new_user.name,
        ];
        if fields.iter().any(|f| f.trim().is_empty()) {
            return Err(ClientError::Validation("All fields are required".to_string()));
        }

        let result = match self
            .gateway
            .send_unnotified(Method::POST, paths::SIGNUP, Some(json!(new_user)))
            .await
        {
            Ok(_) => self.post_login(&new_user.credentials()).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(user) => {
                log::info!("Signed up and logged in as {}", user.username);
                self.gateway.notify(Notification::success(
                    "Signup successful! You are now logged in.",
                ));
                Ok(self.set_user(user))
            }
            Err(e) => {
                self.gateway.notify(Notification::error(failure_text(
                    "Signup failed. Please try again.",
                    &e,
                )));
                Err(e)
            }
        }
    }

    /// End the server session. Local state is cleared only if the server agreed.
    pub async fn logout(&mut self) -> Result<(), ClientError> {
        match self
            .gateway
            .send_unnotified(Method::POST, paths::LOGOUT, Some(json!({})))
            .await
        {
            Ok(_) => {
                if let Some(user) = self.user() {
                    log::info!("Logged out {}", user.username);
                }
                self.state = AuthState::Anonymous;
                self.gateway
                    .notify(Notification::success("Logged out successfully!"));
                Ok(())
            }
            Err(e) => {
                self.gateway.notify(Notification::error(failure_text(
                    "Logout failed. Please try again.",
                    &e,
                )));
                Err(e)
            }
        }
    }

    /// Ask the server who the session cookie belongs to.
    ///
    /// No session is not an error: the state just stays anonymous.
    pub async fn fetch_current_user(&mut self) -> Result<Option<User>, ClientError> {
        let result = self
            .gateway
            .send_unnotified(Method::GET, paths::CURRENT_USER, None)
            .await
            .and_then(|body| {
                serde_json::from_value::<User>(body).map_err(|e| ClientError::Decode(e.to_string()))
            });

        match result {
            Ok(user) => {
                log::info!("Restored session for {}", user.username);
                Ok(Some(self.set_user(user)))
            }
            Err(e) if e.is_unauthorized() => {
                log::debug!("No server session");
                self.state = AuthState::Anonymous;
                Ok(None)
            }
            Err(e) => {
                self.gateway
                    .notify(Notification::error("Failed to fetch user information."));
                Err(e)
            }
        }
    }

    /// List operations for the logged-in user.
    pub fn lists(&self, refresh: &RefreshSignal) -> Result<ListManager, ClientError> {
        self.require_user()?;
        Ok(ListManager::new(self.gateway.clone(), refresh.clone()))
    }

    /// Task operations for the logged-in user.
    pub fn tasks(&self, refresh: &RefreshSignal) -> Result<TaskManager, ClientError> {
        self.require_user()?;
        Ok(TaskManager::new(self.gateway.clone(), refresh.clone()))
    }

    fn require_user(&self) -> Result<&User, ClientError> {
        self.user().ok_or(ClientError::NotAuthenticated)
    }

    async fn post_login(&self, credentials: &Credentials) -> Result<User, ClientError> {
        let body = self
            .gateway
            .send_unnotified(Method::POST, paths::LOGIN, Some(json!(credentials)))
            .await?;
        serde_json::from_value(body).map_err(|e| ClientError::Decode(e.to_string()))
    }

    fn set_user(&mut self, user: User) -> User {
        self.state = AuthState::Authenticated(user.clone());
        user
    }
}

fn failure_text(fallback: &str, error: &ClientError) -> String {
    match error {
        ClientError::Api { message, .. } => format!("{} {}", fallback, message),
        _ => fallback.to_string(),
    }
}
