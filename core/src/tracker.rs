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

use crate::broker::{login_scopes, IdentityBroker, LoginRedirect};
use crate::client::{ApiResult, Endpoint, QueryClient};
use crate::config::TrackerConfig;
use crate::filter::{QueryFilter, RawFilter};
use crate::models::{Profile, Session};
use crate::session::{LoginOutcome, LoginState, SessionManager};
use log::debug;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// What the user currently sees.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackerState {
    pub profile: Option<Profile>,
    /// The most recent error only; any new attempt clears it.
    pub error: Option<String>,
    /// True while at least one backend request is outstanding.
    pub loading: bool,
    /// Payload of the most recent successful query.
    pub last_result: Option<Value>,
}

#[derive(Default)]
struct StateCell {
    view: TrackerState,
    in_flight: usize,
}

/// Wires the session manager and query client together and keeps the displayed state.
///
/// Overlapping queries are not de-duplicated: whichever resolves last owns
/// `last_result` and `error`.
pub struct Tracker {
    sessions: SessionManager,
    client: Arc<QueryClient>,
    state: Mutex<StateCell>,
}

impl Tracker {
    pub fn new(broker: Arc<dyn IdentityBroker>, config: &TrackerConfig) -> ApiResult<Self> {
        let client = Arc::new(QueryClient::new(config.api_base_url.clone())?);
        let sessions =
            SessionManager::with_cooldown(broker, Arc::clone(&client), config.login_cooldown);
        Ok(Self::from_parts(sessions, client))
    }

    pub fn from_parts(sessions: SessionManager, client: Arc<QueryClient>) -> Self {
        Self {
            sessions,
            client,
            state: Mutex::new(StateCell::default()),
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn snapshot(&self) -> TrackerState {
        self.lock().view.clone()
    }

    /// Whether a login click would reach the broker right now.
    pub fn can_login(&self) -> bool {
        self.sessions.login_state() == LoginState::Idle
    }

    /// Runs the session check and applies the one-time profile fetch.
    pub async fn mount(&self) -> Session {
        self.begin_request();
        let check = self.sessions.check_existing_session().await;

        let mut cell = self.finish_request();
        if let Some(result) = check.profile {
            match result {
                Ok(profile) => {
                    cell.view.profile = Some(profile);
                    cell.view.error = None;
                }
                Err(e) => cell.view.error = Some(e.to_string()),
            }
        }
        check.session
    }

    /// Starts the delegated login with the standard scopes.
    ///
    /// Returns the redirect to follow, or `None` if a login is already underway.
    /// A rejected click leaves the displayed error as it was.
    pub async fn login(&self) -> Option<LoginRedirect> {
        match self.sessions.begin_delegated_login(&login_scopes()).await {
            Ok(LoginOutcome::Redirect(redirect)) => {
                self.lock().view.error = None;
                Some(redirect)
            }
            Ok(LoginOutcome::InProgress) => None,
            Err(e) => {
                self.lock().view.error = Some(e.to_string());
                None
            }
        }
    }

    /// Queries `endpoint` with the current credential.
    ///
    /// The filter is only applied to endpoints that accept one.
    pub async fn query(&self, endpoint: Endpoint, raw: &RawFilter) -> ApiResult<Value> {
        let filter = endpoint
            .accepts_filter()
            .then(|| QueryFilter::from_raw(raw));
        self.query_with(endpoint, filter.as_ref()).await
    }

    /// Like [`Tracker::query`] with an already-normalized filter.
    pub async fn query_with(
        &self,
        endpoint: Endpoint,
        filter: Option<&QueryFilter>,
    ) -> ApiResult<Value> {
        self.begin_request();

        let token = self.sessions.provider_token();
        let result = self
            .client
            .query_endpoint(endpoint, token.as_ref(), filter)
            .await;

        let mut cell = self.finish_request();
        match &result {
            Ok(payload) => cell.view.last_result = Some(payload.clone()),
            Err(e) => cell.view.error = Some(e.to_string()),
        }
        debug!("{} resolved, {} request(s) still in flight", endpoint, cell.in_flight);

        result
    }

    fn begin_request(&self) {
        let mut cell = self.lock();
        cell.view.error = None;
        cell.in_flight += 1;
        cell.view.loading = true;
    }

    fn finish_request(&self) -> MutexGuard<'_, StateCell> {
        let mut cell = self.lock();
        cell.in_flight = cell.in_flight.saturating_sub(1);
        cell.view.loading = cell.in_flight > 0;
        cell
    }

    fn lock(&self) -> MutexGuard<'_, StateCell> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
