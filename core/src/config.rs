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

use std::env;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_API_URL: &str = "http://localhost:3000";
pub const DEFAULT_LOGIN_COOLDOWN: Duration = Duration::from_secs(8);

const API_URL_VAR: &str = "TRACKER_API_URL";
const COOLDOWN_VAR: &str = "TRACKER_LOGIN_COOLDOWN_SECS";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid TRACKER_API_URL '{value}': {reason}")]
    InvalidApiUrl { value: String, reason: String },
    #[error("Invalid TRACKER_LOGIN_COOLDOWN_SECS '{0}': expected a whole number of seconds")]
    InvalidCooldown(String),
}

/// Settings for the backend client and the login guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    pub api_base_url: Url,
    pub login_cooldown: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            api_base_url: Url::parse(DEFAULT_API_URL).expect("default API URL is valid"),
            login_cooldown: DEFAULT_LOGIN_COOLDOWN,
        }
    }
}

impl TrackerConfig {
    /// Reads `TRACKER_API_URL` and `TRACKER_LOGIN_COOLDOWN_SECS`, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(API_URL_VAR).filter(|v| !v.trim().is_empty()) {
            config.api_base_url = Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidApiUrl {
                value: raw.clone(),
                reason: e.to_string(),
            })?;
        }

        if let Some(raw) = lookup(COOLDOWN_VAR).filter(|v| !v.trim().is_empty()) {
            let secs = raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidCooldown(raw.clone()))?;
            config.login_cooldown = Duration::from_secs(secs);
        }

        Ok(config)
    }
}
