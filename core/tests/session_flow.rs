//! Session check, login guard and tracker state tests.

mod common;

use common::{client_for, config_for, unreachable_url, FakeBroker};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracker_core::client::TRANSPORT_FAILURE_MESSAGE;
use tracker_core::{
    ApiError, Endpoint, RawFilter, Session, SessionManager, Tracker, TrackerConfig,
};
use wiremock::matchers::{any, body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn profile_response() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "profile": { "display_name": "Ana", "email": "ana@example.com", "images": [] }
    }))
}

// ============================================================================
// Session check
// ============================================================================

#[tokio::test]
async fn test_existing_session_fetches_profile_once() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/callback"))
        .and(body_json(json!({ "provider_token": "T" })))
        .respond_with(profile_response())
        .expect(1)
        .mount(&server)
        .await;

    let broker = Arc::new(FakeBroker::with_token("T"));
    let sessions = SessionManager::new(broker.clone(), client_for(&server));

    let first = sessions.check_existing_session().await;
    assert!(first.session.is_present());
    let profile = first.profile.expect("profile fetch triggered").unwrap();
    assert_eq!(profile.display_name.as_deref(), Some("Ana"));

    // A repeated check (re-render) must not fetch again.
    let second = sessions.check_existing_session().await;
    assert!(second.session.is_present());
    assert!(second.profile.is_none());

    assert_eq!(broker.session_calls.load(Ordering::SeqCst), 2);
    assert_eq!(sessions.provider_token().unwrap().as_str(), "T");
}

#[tokio::test]
async fn test_broker_outage_is_treated_as_logged_out() {
    let server = MockServer::start().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let tracker = Tracker::new(Arc::new(FakeBroker::unavailable()), &config_for(&server)).unwrap();
    let session = tracker.mount().await;

    assert_eq!(session, Session::Absent);
    let state = tracker.snapshot();
    assert!(state.error.is_none());
    assert!(!state.loading);
    assert!(state.profile.is_none());
}

#[tokio::test]
async fn test_mount_applies_profile() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/callback"))
        .respond_with(profile_response())
        .expect(1)
        .mount(&server)
        .await;

    let tracker = Tracker::new(Arc::new(FakeBroker::with_token("T")), &config_for(&server)).unwrap();
    tracker.mount().await;

    let state = tracker.snapshot();
    assert_eq!(state.profile.unwrap().email.as_deref(), Some("ana@example.com"));
    assert!(state.error.is_none());
    assert!(!state.loading);
}

#[tokio::test]
async fn test_mount_profile_failure_clears_loading() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/callback"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let tracker = Tracker::new(Arc::new(FakeBroker::with_token("T")), &config_for(&server)).unwrap();
    tracker.mount().await;

    let state = tracker.snapshot();
    assert!(state.profile.is_none());
    assert_eq!(state.error.as_deref(), Some("HTTP error! status: 500"));
    assert!(!state.loading);
}

// ============================================================================
// Queries through the tracker
// ============================================================================

#[tokio::test]
async fn test_query_without_session_reports_no_credential() {
    let server = MockServer::start().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let tracker = Tracker::new(Arc::new(FakeBroker::logged_out()), &config_for(&server)).unwrap();
    tracker.mount().await;

    let err = tracker
        .query(Endpoint::RecentlyPlayed, &RawFilter::default())
        .await
        .unwrap_err();

    assert_eq!(err, ApiError::NoCredential);
    let state = tracker.snapshot();
    assert_eq!(state.error, Some(ApiError::NoCredential.to_string()));
    assert!(!state.loading);
}

#[tokio::test]
async fn test_unauthorized_playlists_surface_server_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/callback"))
        .respond_with(profile_response())
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/my-playlists"))
        .and(header("authorization", "Bearer T"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "error": "invalid token" })),
        )
        .mount(&server)
        .await;

    let tracker = Tracker::new(Arc::new(FakeBroker::with_token("T")), &config_for(&server)).unwrap();
    tracker.mount().await;

    let err = tracker
        .query(Endpoint::Playlists, &RawFilter::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Server { status: 401, .. }));
    let state = tracker.snapshot();
    assert_eq!(state.error.as_deref(), Some("invalid token"));
    assert!(!state.loading);
}

#[tokio::test]
async fn test_new_query_clears_previous_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/callback"))
        .respond_with(profile_response())
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/my-playlists"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "upstream down" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "ana" })))
        .mount(&server)
        .await;

    let tracker = Tracker::new(Arc::new(FakeBroker::with_token("T")), &config_for(&server)).unwrap();
    tracker.mount().await;

    assert!(tracker.query(Endpoint::Playlists, &RawFilter::default()).await.is_err());
    assert_eq!(tracker.snapshot().error.as_deref(), Some("upstream down"));

    tracker.query(Endpoint::Profile, &RawFilter::default()).await.unwrap();
    let state = tracker.snapshot();
    assert!(state.error.is_none());
    assert_eq!(state.last_result, Some(json!({ "id": "ana" })));
}

#[tokio::test]
async fn test_transport_failure_on_me_clears_loading() {
    let broker = Arc::new(FakeBroker::with_token("T"));
    let config = TrackerConfig {
        api_base_url: unreachable_url(),
        ..TrackerConfig::default()
    };
    let tracker = Tracker::new(broker, &config).unwrap();

    // The profile exchange fails the same way; the session is still present.
    assert!(tracker.mount().await.is_present());
    assert_eq!(tracker.snapshot().error.as_deref(), Some(TRANSPORT_FAILURE_MESSAGE));

    let err = tracker
        .query(Endpoint::Profile, &RawFilter::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Transport { .. }));
    assert_eq!(err.status(), None);
    let state = tracker.snapshot();
    assert_eq!(state.error.as_deref(), Some(TRANSPORT_FAILURE_MESSAGE));
    assert!(!state.loading);
}

// ============================================================================
// Delegated login
// ============================================================================

#[tokio::test]
async fn test_login_redirect_requests_fixed_scopes() {
    let broker = Arc::new(FakeBroker::logged_out());
    let tracker = Tracker::new(broker.clone(), &TrackerConfig::default()).unwrap();

    let redirect = tracker.login().await.expect("redirect issued");
    assert_eq!(
        redirect.url,
        "https://broker.test/authorize?provider=spotify&scopes=user-read-email+user-read-private+user-read-recently-played"
    );
    assert!(!tracker.can_login());

    assert!(tracker.login().await.is_none());
    assert_eq!(broker.login_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_failed_login_hits_broker_once_per_cooldown() {
    // The backend is never contacted during login.
    let broker = Arc::new(FakeBroker::rejecting_login("Unsupported provider"));
    let tracker = Tracker::new(broker.clone(), &TrackerConfig::default()).unwrap();

    assert!(tracker.login().await.is_none());
    assert_eq!(tracker.snapshot().error.as_deref(), Some("Unsupported provider"));

    for _ in 0..5 {
        assert!(tracker.login().await.is_none());
    }
    assert_eq!(broker.login_calls(), 1);
    assert_eq!(tracker.snapshot().error.as_deref(), Some("Unsupported provider"));
    assert!(!tracker.can_login());

    tokio::time::advance(Duration::from_secs(8)).await;
    assert!(tracker.can_login());
    tracker.login().await;
    assert_eq!(broker.login_calls(), 2);
}
