use std::fmt;

use crate::core::ListId;
use crate::core::user::Credentials;
use crate::session::{AuthState, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    Login,
    Signup,
    Dashboard,
    List(ListId),
    NotFound,
}

impl Route {
    pub fn parse(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match parts.as_slice() {
            [] => Self::Home,
            ["login"] => Self::Login,
            ["signup"] => Self::Signup,
            ["dashboard"] => Self::Dashboard,
            ["dashboard", "list", id] => id.parse().map(Self::List).unwrap_or(Self::NotFound),
            _ => Self::NotFound,
        }
    }

    pub fn is_protected(&self) -> bool {
        matches!(self, Self::Dashboard | Self::List(_))
    }

    /// Where a navigation to `self` actually lands for the given identity.
    pub fn resolve(self, auth: &AuthState) -> Self {
        match auth {
            AuthState::Anonymous if self.is_protected() => Self::Login,
            _ => self,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Home => write!(f, "/"),
            Self::Login => write!(f, "/login"),
            Self::Signup => write!(f, "/signup"),
            Self::Dashboard => write!(f, "/dashboard"),
            Self::List(id) => write!(f, "/dashboard/list/{}", id),
            Self::NotFound => write!(f, "/404"),
        }
    }
}

/// Submit the login form. Lands on the dashboard on success; a failed login
/// stays on the login page.
pub async fn submit_login(session: &mut Session, credentials: &Credentials) -> Route {
    match session.login(credentials).await {
        Ok(_) => Route::Dashboard.resolve(session.state()),
        Err(e) => {
            log::debug!("Login form rejected: {}", e);
            Route::Login
        }
    }
}
