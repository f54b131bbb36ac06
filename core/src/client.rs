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

use crate::filter::QueryFilter;
use crate::models::{Profile, ProviderToken};
use log::{debug, info, warn};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use url::Url;

/// Message reported when no HTTP response was received at all.
pub const TRANSPORT_FAILURE_MESSAGE: &str = "Network error: could not reach the server";

const CALLBACK_PATH: &str = "/callback";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("No access token available. Please log in first.")]
    NoCredential,
    #[error("{message}")]
    Transport { message: String },
    /// A response arrived with a non-success status. `body` is the raw response text.
    #[error("{message}")]
    Server {
        status: u16,
        message: String,
        body: String,
    },
    #[error("Unexpected response from server: {message}")]
    MalformedResponse { status: u16, message: String },
    #[error("Invalid backend URL: {0}")]
    InvalidBaseUrl(String),
}

impl ApiError {
    /// HTTP status of the response, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Server { status, .. } | ApiError::MalformedResponse { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Authorized read endpoints exposed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Profile,
    Playlists,
    RecentlyPlayed,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Profile => "/me",
            Endpoint::Playlists => "/my-playlists",
            Endpoint::RecentlyPlayed => "/recently-played",
        }
    }

    /// Only the listening history understands filter parameters.
    pub fn accepts_filter(self) -> bool {
        matches!(self, Endpoint::RecentlyPlayed)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Serialize)]
struct CallbackRequest<'a> {
    provider_token: &'a str,
}

#[derive(Deserialize)]
struct CallbackResponse {
    profile: Profile,
}

/// Stateless HTTP client for the tracker backend.
///
/// Holds no credential of its own: each call borrows the token it is given.
#[derive(Debug, Clone)]
pub struct QueryClient {
    http: reqwest::Client,
    base_url: Url,
}

impl QueryClient {
    pub fn new(base_url: Url) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("spotify-tracker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Transport {
                message: e.to_string(),
            })?;
        Self::with_http(http, base_url)
    }

    /// Builds a client around an existing `reqwest::Client`.
    pub fn with_http(http: reqwest::Client, mut base_url: Url) -> ApiResult<Self> {
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidBaseUrl(base_url.to_string()));
        }
        // Relative joins replace the last path segment unless the base ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Exchanges the provider token for the application's own profile.
    ///
    /// Sends `POST /callback` with `{"provider_token": ...}` and expects
    /// `{"profile": {...}}` back.
    pub async fn fetch_profile(&self, token: &ProviderToken) -> ApiResult<Profile> {
        let url = self.url_for(CALLBACK_PATH)?;
        debug!("POST {}", url);

        let response = self
            .http
            .post(url)
            .json(&CallbackRequest {
                provider_token: token.as_str(),
            })
            .send()
            .await
            .map_err(transport_failure)?;

        let (status, body) = read_body(response).await?;
        if !status.is_success() {
            return Err(server_failure(status, body));
        }

        let parsed: CallbackResponse =
            serde_json::from_str(&body).map_err(|e| malformed(status, e))?;
        info!("Profile received from backend");
        Ok(parsed.profile)
    }

    /// Issues an authorized `GET` against `endpoint`.
    ///
    /// Without a token this fails with [`ApiError::NoCredential`] before any
    /// network activity. The filter, when given, becomes query parameters
    /// containing only its present fields.
    pub async fn query_endpoint(
        &self,
        endpoint: Endpoint,
        token: Option<&ProviderToken>,
        filter: Option<&QueryFilter>,
    ) -> ApiResult<Value> {
        let token = token.ok_or(ApiError::NoCredential)?;
        let url = self.url_for(endpoint.path())?;

        let mut request = self.http.get(url).bearer_auth(token.as_str());
        if let Some(filter) = filter {
            let params = filter.to_params();
            debug!("GET {} with {} filter parameter(s)", endpoint, params.len());
            if !params.is_empty() {
                request = request.query(&params);
            }
        } else {
            debug!("GET {}", endpoint);
        }

        let response = request.send().await.map_err(transport_failure)?;
        let (status, body) = read_body(response).await?;
        if !status.is_success() {
            return Err(server_failure(status, body));
        }

        serde_json::from_str(&body).map_err(|e| malformed(status, e))
    }

    fn url_for(&self, path: &str) -> ApiResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::InvalidBaseUrl(e.to_string()))
    }
}

async fn read_body(response: reqwest::Response) -> ApiResult<(StatusCode, String)> {
    let status = response.status();
    let body = response.text().await.map_err(transport_failure)?;
    Ok((status, body))
}

fn transport_failure(err: reqwest::Error) -> ApiError {
    warn!("Request failed before a response arrived: {}", err);
    ApiError::Transport {
        message: TRANSPORT_FAILURE_MESSAGE.to_string(),
    }
}

fn server_failure(status: StatusCode, body: String) -> ApiError {
    let message = error_message(&body)
        .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()));
    warn!("Backend responded {}: {}", status, message);
    ApiError::Server {
        status: status.as_u16(),
        message,
        body,
    }
}

fn malformed(status: StatusCode, err: serde_json::Error) -> ApiError {
    warn!("Could not parse backend response ({}): {}", status, err);
    ApiError::MalformedResponse {
        status: status.as_u16(),
        message: err.to_string(),
    }
}

/// The string `error` field of a JSON error body, if there is one.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .and_then(Value::as_str)
        .filter(|message| !message.is_empty())
        .map(str::to_string)
}
