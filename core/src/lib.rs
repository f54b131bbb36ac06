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

pub mod broker;
pub mod client;
pub mod config;
pub mod filter;
pub mod models;
pub mod session;
pub mod tracker;

// Re-export key items for convenience
pub use broker::{IdentityBroker, LoginRedirect, Provider, SpotifyBroker, LOGIN_SCOPES};
pub use client::{ApiError, ApiResult, Endpoint, QueryClient};
pub use config::TrackerConfig;
pub use filter::{QueryFilter, RawFilter};
pub use models::{Profile, ProviderToken, Session};
pub use session::{LoginOutcome, LoginState, SessionManager};
pub use tracker::{Tracker, TrackerState};
