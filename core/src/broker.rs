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

use async_trait::async_trait;
use log::{debug, info};
use rspotify::{prelude::*, AuthCodeSpotify, Config, Credentials, OAuth};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Scopes requested by every delegated login: profile, email and recent listening activity.
pub const LOGIN_SCOPES: [&str; 3] = [
    "user-read-private",
    "user-read-email",
    "user-read-recently-played",
];

/// [`LOGIN_SCOPES`] as an owned set.
pub fn login_scopes() -> HashSet<String> {
    LOGIN_SCOPES.iter().map(|s| s.to_string()).collect()
}

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("Failed to initialize identity broker: {0}")]
    Config(String),
    #[error("Identity broker unavailable: {0}")]
    Unavailable(String),
    #[error("{0}")]
    Rejected(String),
    #[error("Spotify authorization failed: {0}")]
    Spotify(#[from] rspotify::ClientError),
}

/// Identity providers the broker can delegate to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Spotify,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Spotify => "spotify",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session as reported by the broker. A session may exist without a provider token.
#[derive(Debug, Clone, Default)]
pub struct BrokerSession {
    pub provider_token: Option<String>,
}

/// Where to send the user to authorize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRedirect {
    pub url: String,
}

/// The external service that owns the delegated-login round trip.
#[async_trait]
pub trait IdentityBroker: Send + Sync {
    /// Current session, or `None` when nobody is logged in.
    async fn get_session(&self) -> Result<Option<BrokerSession>, BrokerError>;

    /// Starts a login with `provider` for `scopes`, returning the authorization URL.
    async fn begin_login(
        &self,
        provider: Provider,
        scopes: &HashSet<String>,
    ) -> Result<LoginRedirect, BrokerError>;
}

/// Broker backed by a single long-lived rspotify Authorization Code client.
///
/// Tokens obtained through [`SpotifyBroker::complete_login`] are kept in
/// rspotify's token cache, which is what [`IdentityBroker::get_session`] reads.
pub struct SpotifyBroker {
    spotify: AuthCodeSpotify,
}

impl SpotifyBroker {
    /// Builds the client from `RSPOTIFY_CLIENT_ID`, `RSPOTIFY_CLIENT_SECRET`
    /// and `RSPOTIFY_REDIRECT_URI`, configured for [`LOGIN_SCOPES`].
    pub fn from_env() -> Result<Self, BrokerError> {
        let creds = Credentials::from_env().ok_or_else(|| {
            BrokerError::Config("Missing RSPOTIFY_CLIENT_ID or RSPOTIFY_CLIENT_SECRET".to_string())
        })?;

        let oauth = OAuth::from_env(login_scopes())
            .ok_or_else(|| BrokerError::Config("Missing RSPOTIFY_REDIRECT_URI".to_string()))?;

        Ok(Self::new(creds, oauth))
    }

    pub fn new(creds: Credentials, oauth: OAuth) -> Self {
        // `token_cached` persists the token to rspotify's cache file (default: .spotify_token_cache.json).
        let config = Config {
            token_cached: true,
            token_refreshing: true,
            ..Default::default()
        };

        Self {
            spotify: AuthCodeSpotify::with_config(creds, oauth, config),
        }
    }

    /// Finishes the redirect round trip for `url`.
    ///
    /// Opens the browser (or prints the URL), waits for the redirect and
    /// stores the resulting token in the cache.
    pub async fn complete_login(&self, url: &str) -> Result<(), BrokerError> {
        self.spotify.prompt_for_token(url).await?;
        info!("Spotify authorization completed");
        Ok(())
    }
}

#[async_trait]
impl IdentityBroker for SpotifyBroker {
    async fn get_session(&self) -> Result<Option<BrokerSession>, BrokerError> {
        let cache_path = &self.spotify.get_config().cache_path;
        if !cache_path.exists() {
            debug!("No token cache at {}", cache_path.display());
            return Ok(None);
        }

        let token = self
            .spotify
            .read_token_cache(false)
            .await
            .map_err(|e| BrokerError::Unavailable(e.to_string()))?;

        Ok(token.map(|token| BrokerSession {
            provider_token: Some(token.access_token),
        }))
    }

    async fn begin_login(
        &self,
        provider: Provider,
        scopes: &HashSet<String>,
    ) -> Result<LoginRedirect, BrokerError> {
        let configured = &self.spotify.oauth.scopes;
        let mut missing: Vec<&str> = scopes
            .iter()
            .filter(|scope| !configured.contains(*scope))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            missing.sort_unstable();
            return Err(BrokerError::Rejected(format!(
                "Scopes not enabled for this client: {}",
                missing.join(", ")
            )));
        }

        let url = self.spotify.get_authorize_url(false)?;
        debug!("Authorization URL issued for {}", provider);
        Ok(LoginRedirect { url })
    }
}
