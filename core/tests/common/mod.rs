//! Shared helpers for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracker_core::broker::{BrokerError, BrokerSession, IdentityBroker, LoginRedirect, Provider};
use tracker_core::{QueryClient, TrackerConfig};
use url::Url;
use wiremock::MockServer;

/// In-memory identity broker that counts its calls.
pub struct FakeBroker {
    token: Option<String>,
    session_error: bool,
    login_error: Option<String>,
    pub session_calls: AtomicUsize,
    pub login_calls: AtomicUsize,
}

impl FakeBroker {
    pub fn logged_out() -> Self {
        Self {
            token: None,
            session_error: false,
            login_error: None,
            session_calls: AtomicUsize::new(0),
            login_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            token: Some(token.to_string()),
            ..Self::logged_out()
        }
    }

    pub fn unavailable() -> Self {
        Self {
            session_error: true,
            ..Self::logged_out()
        }
    }

    pub fn rejecting_login(message: &str) -> Self {
        Self {
            login_error: Some(message.to_string()),
            ..Self::logged_out()
        }
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityBroker for FakeBroker {
    async fn get_session(&self) -> Result<Option<BrokerSession>, BrokerError> {
        self.session_calls.fetch_add(1, Ordering::SeqCst);
        if self.session_error {
            return Err(BrokerError::Unavailable("503 Service Unavailable".to_string()));
        }
        Ok(self.token.clone().map(|token| BrokerSession {
            provider_token: Some(token),
        }))
    }

    async fn begin_login(
        &self,
        provider: Provider,
        scopes: &HashSet<String>,
    ) -> Result<LoginRedirect, BrokerError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        match &self.login_error {
            Some(message) => Err(BrokerError::Rejected(message.clone())),
            None => {
                let mut scopes: Vec<&str> = scopes.iter().map(String::as_str).collect();
                scopes.sort_unstable();
                Ok(LoginRedirect {
                    url: format!(
                        "https://broker.test/authorize?provider={}&scopes={}",
                        provider,
                        scopes.join("+")
                    ),
                })
            }
        }
    }
}

pub fn server_url(server: &MockServer) -> Url {
    Url::parse(&server.uri()).unwrap()
}

pub fn client_for(server: &MockServer) -> Arc<QueryClient> {
    Arc::new(QueryClient::new(server_url(server)).unwrap())
}

pub fn config_for(server: &MockServer) -> TrackerConfig {
    TrackerConfig {
        api_base_url: server_url(server),
        ..TrackerConfig::default()
    }
}

/// A local URL where nothing is listening.
pub fn unreachable_url() -> Url {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    Url::parse(&format!("http://127.0.0.1:{}", port)).unwrap()
}
