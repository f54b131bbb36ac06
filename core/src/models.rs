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

use serde::{Deserialize, Serialize};
use std::fmt;

/// The provider-scoped access token handed out by the identity broker.
///
/// The value is never printed by `Debug`; use [`ProviderToken::as_str`] only
/// when building an outbound request.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderToken(String);

impl ProviderToken {
    /// Wraps a raw token. Empty or whitespace-only input yields `None`.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ProviderToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ProviderToken").field(&"[REDACTED]").finish()
    }
}

/// Current delegated-authorization state.
///
/// A token exists exactly when the session is present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Session {
    #[default]
    Absent,
    Present { provider_token: ProviderToken },
}

impl Session {
    pub fn present(provider_token: ProviderToken) -> Self {
        Session::Present { provider_token }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Session::Present { .. })
    }

    pub fn provider_token(&self) -> Option<&ProviderToken> {
        match self {
            Session::Present { provider_token } => Some(provider_token),
            Session::Absent => None,
        }
    }
}

/// Avatar image attached to a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileImage {
    pub url: String,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub width: Option<u32>,
}

/// The authenticated user's provider identity, as normalized by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub images: Vec<ProfileImage>,
}

impl Profile {
    /// URL of the first image, if the provider returned any.
    pub fn avatar_url(&self) -> Option<&str> {
        self.images.first().map(|image| image.url.as_str())
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.display_name.as_deref().unwrap_or("(no display name)");
        write!(f, "Hola, {}", name)?;
        if let Some(email) = &self.email {
            write!(f, " | Email: {}", email)?;
        }
        if let Some(avatar) = self.avatar_url() {
            write!(f, " | Avatar: {}", avatar)?;
        }
        Ok(())
    }
}
