/*
    spotify-tracker-rs | Rust client for Spotify profile and listening history.
    Copyright (C) 2025  Israel Alberto Roldan Vega

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use crate::broker::{IdentityBroker, LoginRedirect, Provider};
use crate::client::{ApiResult, QueryClient};
use crate::config::DEFAULT_LOGIN_COOLDOWN;
use crate::models::{Profile, ProviderToken, Session};
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

const LOGIN_FAILED_FALLBACK: &str = "Failed to start login";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("{0}")]
    LoginInitiationFailed(String),
}

/// Progress of the delegated-login flow.
///
/// `Idle -> LoggingIn -> (Redirected | CoolingDown -> Idle)`. `Redirected` is
/// terminal: the user has been sent to the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Idle,
    LoggingIn,
    Redirected,
    CoolingDown { until: Instant },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Navigate to this URL to continue the login.
    Redirect(LoginRedirect),
    /// A login is already running, finished, or cooling down; nothing was sent.
    InProgress,
}

/// Result of [`SessionManager::check_existing_session`].
#[derive(Debug)]
pub struct SessionCheck {
    pub session: Session,
    /// Set only the first time a given token is seen.
    pub profile: Option<ApiResult<Profile>>,
}

struct SessionState {
    session: Session,
    login: LoginState,
    profile_requested_for: Option<ProviderToken>,
}

/// Owns the delegated access credential and the login guard.
pub struct SessionManager {
    broker: Arc<dyn IdentityBroker>,
    client: Arc<QueryClient>,
    cooldown: Duration,
    state: Mutex<SessionState>,
}

impl SessionManager {
    pub fn new(broker: Arc<dyn IdentityBroker>, client: Arc<QueryClient>) -> Self {
        Self::with_cooldown(broker, client, DEFAULT_LOGIN_COOLDOWN)
    }

    pub fn with_cooldown(
        broker: Arc<dyn IdentityBroker>,
        client: Arc<QueryClient>,
        cooldown: Duration,
    ) -> Self {
        Self {
            broker,
            client,
            cooldown,
            state: Mutex::new(SessionState {
                session: Session::Absent,
                login: LoginState::Idle,
                profile_requested_for: None,
            }),
        }
    }

    pub fn session(&self) -> Session {
        self.lock().session.clone()
    }

    pub fn provider_token(&self) -> Option<ProviderToken> {
        self.lock().session.provider_token().cloned()
    }

    /// Current login state; an elapsed cool-down reads as `Idle`.
    pub fn login_state(&self) -> LoginState {
        let mut state = self.lock();
        settle_cooldown(&mut state.login);
        state.login
    }

    /// Asks the broker for an existing session.
    ///
    /// Broker failures are logged and reported as an absent session. When a
    /// token is found for the first time, its profile is fetched exactly once.
    pub async fn check_existing_session(&self) -> SessionCheck {
        let session = match self.broker.get_session().await {
            Ok(Some(found)) => found
                .provider_token
                .and_then(ProviderToken::new)
                .map(Session::present)
                .unwrap_or_default(),
            Ok(None) => Session::Absent,
            Err(e) => {
                error!("Session check error: {}", e);
                Session::Absent
            }
        };

        let pending = {
            let mut state = self.lock();
            state.session = session.clone();
            match session.provider_token() {
                Some(token) if state.profile_requested_for.as_ref() != Some(token) => {
                    state.profile_requested_for = Some(token.clone());
                    Some(token.clone())
                }
                _ => None,
            }
        };

        let profile = match pending {
            Some(token) => {
                info!("Existing session found, fetching profile");
                Some(self.client.fetch_profile(&token).await)
            }
            None => {
                debug!("Session resolved (present: {})", session.is_present());
                None
            }
        };

        SessionCheck { session, profile }
    }

    /// Starts the redirect-based login for `scopes`.
    ///
    /// Returns [`LoginOutcome::InProgress`] without touching the broker while
    /// another attempt is running, after a redirect, or during the cool-down
    /// that follows a failed attempt.
    pub async fn begin_delegated_login(
        &self,
        scopes: &HashSet<String>,
    ) -> Result<LoginOutcome, SessionError> {
        {
            let mut state = self.lock();
            settle_cooldown(&mut state.login);
            if state.login != LoginState::Idle {
                debug!("Login ignored, state is {:?}", state.login);
                return Ok(LoginOutcome::InProgress);
            }
            state.login = LoginState::LoggingIn;
        }

        info!("Starting delegated login via {}", Provider::Spotify);
        match self.broker.begin_login(Provider::Spotify, scopes).await {
            Ok(redirect) => {
                self.lock().login = LoginState::Redirected;
                Ok(LoginOutcome::Redirect(redirect))
            }
            Err(e) => {
                let until = Instant::now() + self.cooldown;
                self.lock().login = LoginState::CoolingDown { until };
                warn!(
                    "Login initiation failed, retry allowed in {:?}: {}",
                    self.cooldown, e
                );

                let message = e.to_string();
                Err(SessionError::LoginInitiationFailed(if message.is_empty() {
                    LOGIN_FAILED_FALLBACK.to_string()
                } else {
                    message
                }))
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn settle_cooldown(login: &mut LoginState) {
    if let LoginState::CoolingDown { until } = *login {
        if Instant::now() >= until {
            *login = LoginState::Idle;
        }
    }
}
