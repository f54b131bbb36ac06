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

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use log::debug;
use serde_json::Value;
use std::fs::File;
use std::io::Write;
use std::process;
use std::sync::Arc;
use tracker_core::{Endpoint, RawFilter, SpotifyBroker, Tracker, TrackerConfig, TrackerState};

#[derive(Parser)]
#[command(name = "spotify-tracker")]
#[command(about = "Log in with Spotify and browse your profile, playlists and listening history", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Checks for an existing session and shows the profile
    Status,
    /// Logs in with Spotify (opens the authorization page)
    Login,
    /// Shows your profile as returned by the backend
    Me {
        /// Output the response to a JSON file (e.g., --json=me.json)
        #[arg(long)]
        json: Option<String>,
    },
    /// Lists your playlists
    Playlists {
        /// Output the response to a JSON file
        #[arg(long)]
        json: Option<String>,
    },
    /// Shows recently played tracks, optionally filtered
    Recent {
        /// Only plays after this local date/time (e.g., 2024-01-01T10:00)
        #[arg(long)]
        date: Option<String>,
        /// Artist name contains this text
        #[arg(long)]
        artist: Option<String>,
        /// Album name contains this text
        #[arg(long)]
        album: Option<String>,
        /// Output the response to a JSON file
        #[arg(long)]
        json: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::init();

    if dotenv().is_err() {
        // Silently ignore
    }

    let cli = Cli::parse();

    match &cli.command {
        Commands::Status => {
            handle_status().await;
        }
        Commands::Login => {
            handle_login().await;
        }
        Commands::Me { json } => {
            handle_query(Endpoint::Profile, RawFilter::default(), json.as_deref()).await;
        }
        Commands::Playlists { json } => {
            handle_query(Endpoint::Playlists, RawFilter::default(), json.as_deref()).await;
        }
        Commands::Recent {
            date,
            artist,
            album,
            json,
        } => {
            let filter = RawFilter {
                date: date.clone().unwrap_or_default(),
                artist: artist.clone().unwrap_or_default(),
                album: album.clone().unwrap_or_default(),
            };
            handle_query(Endpoint::RecentlyPlayed, filter, json.as_deref()).await;
        }
    }
}

fn get_tracker() -> (Tracker, Arc<SpotifyBroker>, TrackerConfig) {
    let config = match TrackerConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error reading configuration: {}", e);
            process::exit(1);
        }
    };

    let broker = match SpotifyBroker::from_env() {
        Ok(b) => Arc::new(b),
        Err(e) => {
            eprintln!("Error initializing Spotify client: {}", e);
            process::exit(1);
        }
    };

    match Tracker::new(broker.clone(), &config) {
        Ok(tracker) => (tracker, broker, config),
        Err(e) => {
            eprintln!("Error initializing backend client: {}", e);
            process::exit(1);
        }
    }
}

fn print_profile(state: &TrackerState) {
    match &state.profile {
        Some(profile) => {
            println!();
            println!("---------------------------------------------------");
            println!("{}", profile);
            println!("---------------------------------------------------");
        }
        None => {
            if let Some(err) = &state.error {
                eprintln!("[ERROR] {}", err);
            }
        }
    }
}

async fn handle_status() {
    let (tracker, _, _) = get_tracker();
    println!("Checking for an active session...");

    let session = tracker.mount().await;
    if !session.is_present() {
        println!("Not logged in. Run 'spotify-tracker login' to connect your Spotify account.");
        return;
    }

    let state = tracker.snapshot();
    print_profile(&state);
    if state.error.is_some() {
        process::exit(1);
    }
}

async fn handle_login() {
    let (tracker, broker, config) = get_tracker();

    if tracker.mount().await.is_present() {
        println!("Already logged in.");
        print_profile(&tracker.snapshot());
        return;
    }

    println!("Starting Spotify login...");
    match tracker.login().await {
        Some(redirect) => {
            debug!("Following authorization redirect");
            if let Err(e) = broker.complete_login(&redirect.url).await {
                eprintln!();
                eprintln!("[ERROR] Login failed: {}", e);
                process::exit(1);
            }

            // Back from the redirect: check the session again, which fetches the profile.
            if !tracker.mount().await.is_present() {
                eprintln!("[ERROR] Login completed but no session was found.");
                process::exit(1);
            }
            print_profile(&tracker.snapshot());
        }
        None => {
            let state = tracker.snapshot();
            eprintln!();
            eprintln!(
                "[ERROR] Login failed: {}",
                state.error.as_deref().unwrap_or("a login is already in progress")
            );
            eprintln!(
                "Please wait {} seconds before trying again.",
                config.login_cooldown.as_secs()
            );
            process::exit(1);
        }
    }
}

async fn handle_query(endpoint: Endpoint, filter: RawFilter, json_path: Option<&str>) {
    let (tracker, _, _) = get_tracker();

    tracker.mount().await;
    println!("Fetching {} ...", endpoint);

    match tracker.query(endpoint, &filter).await {
        Ok(payload) => {
            println!();
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).unwrap_or_default()
            );

            if let Some(path) = json_path {
                match save_json(path, &payload) {
                    Ok(()) => {
                        println!();
                        println!("[SAVED] Response saved to: {}", path);
                    }
                    Err(e) => {
                        eprintln!();
                        eprintln!("[ERROR] {:#}", e);
                    }
                }
            }
        }
        Err(e) => {
            eprintln!();
            match e.status() {
                Some(status) => eprintln!("[ERROR] Request failed ({}): {}", status, e),
                None => eprintln!("[ERROR] Request failed: {}", e),
            }
            process::exit(1);
        }
    }
}

fn save_json(path: &str, payload: &Value) -> anyhow::Result<()> {
    let mut file =
        File::create(path).with_context(|| format!("Failed to create file '{}'", path))?;
    let json_content = serde_json::to_string_pretty(payload)?;
    file.write_all(json_content.as_bytes())
        .with_context(|| format!("Failed to write report to '{}'", path))?;
    Ok(())
}
