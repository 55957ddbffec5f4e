//! Token manager end-to-end tests using wiremock
//!
//! Wires the real adapters together (configuration, client factory, URL
//! generator, in-memory and JSON file sessions) and drives them against a
//! fake identity provider.

use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use oidc_login::auth::{
    MemorySession, OidcClientFactory, SessionKey, SessionLocks, SessionStore, TokenManager,
};
use oidc_login::clock::FixedClock;
use oidc_login::commands;
use oidc_login::config::{Config, OidcConfig};
use oidc_login::url_generator::BaseUrlGenerator;
use oidc_login::{RefreshError, RefreshOutcome};

const NOW: i64 = 1_700_000_000;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn config_for(server: &MockServer) -> Config {
    Config {
        base_url: "https://cloud.example.com".to_string(),
        oidc: OidcConfig {
            provider_url: server.uri(),
            client_id: "cloud".to_string(),
            refresh_timeout_seconds: 1,
            ..OidcConfig::default()
        },
        ..Config::default()
    }
}

/// Manager wired like a host would, using the process-wide lock registry.
fn default_manager(config: Config, session: Arc<MemorySession>) -> TokenManager {
    let urls = BaseUrlGenerator::new(&config.base_url, &config.app_name).unwrap();
    let app_name = config.app_name.clone();
    let config = Arc::new(config);
    TokenManager::new(
        app_name,
        session,
        config.clone(),
        Arc::new(urls),
        Arc::new(OidcClientFactory::new(config)),
    )
    .with_clock(Arc::new(FixedClock(NOW)))
}

/// Same wiring with a private lock registry, so tests sharing a session id
/// do not wait on each other.
fn manager_for(config: Config, session: Arc<MemorySession>) -> TokenManager {
    default_manager(config, session).with_locks(Arc::new(SessionLocks::new()))
}

fn expired_session() -> Arc<MemorySession> {
    Arc::new(MemorySession::with_values(
        "sess-1",
        [
            (SessionKey::AccessToken, "A1".to_string()),
            (SessionKey::RefreshToken, "R1".to_string()),
            (SessionKey::AccessTokenExpiresAt, (NOW - 60).to_string()),
        ],
    ))
}

async fn mount_discovery(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "issuer": server.uri(),
            "token_endpoint": format!("{}/token", server.uri()),
            "end_session_endpoint": format!("{}/logout", server.uri())
        })))
        .mount(server)
        .await;
}

async fn mount_token(server: &MockServer, response: ResponseTemplate, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("refresh_token=R1"))
        .respond_with(response)
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn rotated_tokens() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "access_token": "A2",
        "refresh_token": "R2",
        "expires_in": 3600,
        "id_token": "ID2"
    }))
}

// ---------------------------------------------------------------------------
// Refresh
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_expired_session_is_refreshed_against_provider() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    mount_token(&server, rotated_tokens(), 1).await;

    let session = expired_session();
    let manager = manager_for(config_for(&server), session.clone());

    assert!(manager.refresh_tokens().await.unwrap());
    assert_eq!(session.get(SessionKey::AccessToken).as_deref(), Some("A2"));
    assert_eq!(session.get(SessionKey::RefreshToken).as_deref(), Some("R2"));
    assert_eq!(
        session.get(SessionKey::AccessTokenExpiresAt),
        Some((NOW + 3600).to_string())
    );
    assert_eq!(session.get(SessionKey::IdToken).as_deref(), Some("ID2"));
}

#[tokio::test]
async fn test_valid_session_does_not_contact_provider() {
    let server = MockServer::start().await;
    mount_token(&server, rotated_tokens(), 0).await;

    let session = Arc::new(MemorySession::with_values(
        "sess-1",
        [
            (SessionKey::RefreshToken, "R1".to_string()),
            (SessionKey::AccessTokenExpiresAt, (NOW + 60).to_string()),
        ],
    ));
    let manager = manager_for(config_for(&server), session);

    assert_eq!(
        manager.try_refresh().await.unwrap(),
        Ok(RefreshOutcome::StillValid)
    );
}

#[tokio::test]
async fn test_rejected_refresh_returns_false_and_keeps_session() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    mount_token(
        &server,
        ResponseTemplate::new(400).set_body_json(serde_json::json!({"error": "invalid_grant"})),
        1,
    )
    .await;

    let session = expired_session();
    let before = session.snapshot();
    let manager = manager_for(config_for(&server), session.clone());

    assert!(!manager.refresh_tokens().await.unwrap());
    assert_eq!(session.snapshot(), before);
}

#[tokio::test]
async fn test_slow_provider_times_out_and_keeps_session() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    mount_token(&server, rotated_tokens().set_delay(Duration::from_secs(3)), 1).await;

    let session = expired_session();
    let before = session.snapshot();
    let manager = manager_for(config_for(&server), session.clone());

    assert_eq!(
        manager.try_refresh().await.unwrap(),
        Err(RefreshError::Timeout(1))
    );
    assert_eq!(session.snapshot(), before);
}

#[tokio::test]
async fn test_unreachable_provider_returns_false() {
    let session = expired_session();
    let config = Config {
        oidc: OidcConfig {
            provider_url: "http://127.0.0.1:1".to_string(),
            client_id: "cloud".to_string(),
            refresh_timeout_seconds: 2,
            ..OidcConfig::default()
        },
        ..Config::default()
    };
    let manager = manager_for(config, session.clone());

    assert!(!manager.refresh_tokens().await.unwrap());
    assert_eq!(session.get(SessionKey::RefreshToken).as_deref(), Some("R1"));
}

#[tokio::test]
async fn test_invalid_provider_url_is_configuration_error() {
    let session = expired_session();
    let config = Config {
        oidc: OidcConfig {
            provider_url: "not a url".to_string(),
            client_id: "cloud".to_string(),
            ..OidcConfig::default()
        },
        ..Config::default()
    };
    let manager = manager_for(config, session);

    assert!(manager.refresh_tokens().await.is_err());
}

/// Two requests of one session, each building its own manager the default
/// way, must spend the refresh token only once.
#[tokio::test]
async fn test_default_managers_refresh_one_session_once() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    mount_token(
        &server,
        rotated_tokens().set_delay(Duration::from_millis(100)),
        1,
    )
    .await;

    let session = Arc::new(MemorySession::with_values(
        "sess-shared-by-two-requests",
        [(SessionKey::RefreshToken, "R1".to_string())],
    ));
    let first = default_manager(config_for(&server), session.clone());
    let second = default_manager(config_for(&server), session.clone());

    let (a, b) = tokio::join!(first.refresh_tokens(), second.refresh_tokens());

    assert!(a.unwrap());
    assert!(b.unwrap());
    assert_eq!(session.get(SessionKey::RefreshToken).as_deref(), Some("R2"));
    let token_calls = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|request| request.url.path() == "/token")
        .count();
    assert_eq!(token_calls, 1);
}

// ---------------------------------------------------------------------------
// Logout URL
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_cached_logout_url_follows_refreshed_id_token() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    mount_token(&server, rotated_tokens(), 1).await;

    let session = expired_session();
    session.set(
        SessionKey::LogoutUrl,
        format!("{}/logout?id_token_hint=ID1", server.uri()),
    );
    let manager = manager_for(config_for(&server), session.clone());

    assert!(manager.refresh_tokens().await.unwrap());
    assert_eq!(
        manager.logout_url(),
        Some(format!("{}/logout?id_token_hint=ID2", server.uri()))
    );
}

#[tokio::test]
async fn test_configured_logout_url_overrides_provider_endpoint() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    mount_token(&server, rotated_tokens(), 1).await;

    let session = expired_session();
    session.set(SessionKey::LogoutUrl, "https://old.example.com/".to_string());
    let mut config = config_for(&server);
    config.oidc.logout_url = Some("https://sso.example.com/bye".to_string());
    let manager = manager_for(config, session);

    assert!(manager.refresh_tokens().await.unwrap());
    assert_eq!(
        manager.logout_url().as_deref(),
        Some("https://sso.example.com/bye?id_token_hint=ID2")
    );
}

// ---------------------------------------------------------------------------
// CLI handler
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_run_refresh_rewrites_session_file() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    mount_token(&server, rotated_tokens(), 1).await;

    let dir = tempfile::tempdir().unwrap();
    let session_path = dir.path().join("alice.json");
    std::fs::write(
        &session_path,
        r#"{"user":"alice","oidc_refresh_token":"R1","oidc_access_token_expires_at":1}"#,
    )
    .unwrap();

    let authenticated = commands::refresh::run_refresh(config_for(&server), &session_path)
        .await
        .unwrap();
    assert!(authenticated);

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&session_path).unwrap()).unwrap();
    assert_eq!(written["user"], "alice");
    assert_eq!(written["oidc_access_token"], "A2");
    assert_eq!(written["oidc_refresh_token"], "R2");
    assert!(written["oidc_access_token_expires_at"].is_i64());
}
