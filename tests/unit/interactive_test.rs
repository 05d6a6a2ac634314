//! Unit tests for the session-backed interactive token flow

use chrono::Duration as ChronoDuration;
use mcp_auth_client::{
    AccessToken, AuthError, AuthorizedClient, AuthorizedClientStore, SessionTokenAttacher,
    UserSession,
};
use mockito::Matcher;
use std::sync::Arc;
use std::time::Duration;

#[path = "../common/mod.rs"]
mod common;

fn attacher(token_uri: &str, store: Arc<AuthorizedClientStore>) -> SessionTokenAttacher {
    SessionTokenAttacher::new(
        common::both_registrations(token_uri),
        store,
        reqwest::Client::new(),
        common::INTERACTIVE_ID,
        Duration::from_secs(60),
    )
}

fn authorized(access_token: AccessToken, refresh_token: Option<&str>) -> AuthorizedClient {
    AuthorizedClient {
        registration_id: common::INTERACTIVE_ID.to_string(),
        principal: "alice".to_string(),
        access_token,
        refresh_token: refresh_token.map(str::to_string),
    }
}

fn expired(value: &str) -> AccessToken {
    AccessToken::bearer(value).expires_in(ChronoDuration::seconds(-10))
}

#[tokio::test]
async fn test_valid_user_token_is_used() {
    let store = Arc::new(AuthorizedClientStore::new());
    store
        .save(authorized(
            AccessToken::bearer("user-tok").expires_in(ChronoDuration::hours(1)),
            None,
        ))
        .await;

    let attacher = attacher("http://127.0.0.1:9/oauth2/token", store);
    let token = attacher
        .authorized_token(&UserSession::new("alice", "s-1"))
        .await
        .unwrap();

    assert_eq!(token.value(), "user-tok");
}

#[tokio::test]
async fn test_no_authorized_client_requires_login() {
    let attacher = attacher(
        "http://127.0.0.1:9/oauth2/token",
        Arc::new(AuthorizedClientStore::new()),
    );

    assert_error_matches!(
        attacher.authorized_token(&UserSession::new("bob", "s-2")).await,
        AuthError::InteractiveAuthRequired { .. }
    );
}

#[tokio::test]
async fn test_expired_token_is_refreshed() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/oauth2/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
            Matcher::UrlEncoded("refresh_token".into(), "refresh-1".into()),
        ]))
        .with_status(200)
        .with_body(common::token_body("user-tok-2", 3600))
        .expect(1)
        .create_async()
        .await;

    let store = Arc::new(AuthorizedClientStore::new());
    store.save(authorized(expired("user-tok-1"), Some("refresh-1"))).await;

    let attacher = attacher(&format!("{}/oauth2/token", server.url()), store.clone());
    let token = attacher
        .authorized_token(&UserSession::new("alice", "s-1"))
        .await
        .unwrap();

    assert_eq!(token.value(), "user-tok-2");

    // Refresh token kept since the response carried none
    let saved = store.load(common::INTERACTIVE_ID, "alice").await.unwrap();
    assert_eq!(saved.access_token.value(), "user-tok-2");
    assert_eq!(saved.refresh_token.as_deref(), Some("refresh-1"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_rejected_refresh_requires_login() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/oauth2/token")
        .with_status(400)
        .with_body(r#"{"error":"invalid_grant"}"#)
        .create_async()
        .await;

    let store = Arc::new(AuthorizedClientStore::new());
    store.save(authorized(expired("user-tok-1"), Some("refresh-1"))).await;

    let attacher = attacher(&format!("{}/oauth2/token", server.url()), store.clone());
    let err = attacher
        .authorized_token(&UserSession::new("alice", "s-1"))
        .await
        .unwrap_err();

    assert!(err.is_reauthentication());
    assert!(store.load(common::INTERACTIVE_ID, "alice").await.is_none());
}

#[tokio::test]
async fn test_concurrent_requests_share_one_refresh() {
    let mut server = mockito::Server::new_async().await;
    // A rotating server would reject a second use of refresh-1
    let mock = server
        .mock("POST", "/oauth2/token")
        .match_body(Matcher::UrlEncoded("refresh_token".into(), "refresh-1".into()))
        .with_status(200)
        .with_body(
            serde_json::json!({
                "access_token": "user-tok-2",
                "token_type": "Bearer",
                "expires_in": 3600,
                "refresh_token": "refresh-2"
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let store = Arc::new(AuthorizedClientStore::new());
    store.save(authorized(expired("user-tok-1"), Some("refresh-1"))).await;

    let attacher = attacher(&format!("{}/oauth2/token", server.url()), store.clone());
    let session = UserSession::new("alice", "s-1");
    let (first, second) = tokio::join!(
        attacher.authorized_token(&session),
        attacher.authorized_token(&session)
    );

    assert_eq!(first.unwrap().value(), "user-tok-2");
    assert_eq!(second.unwrap().value(), "user-tok-2");

    let saved = store.load(common::INTERACTIVE_ID, "alice").await.unwrap();
    assert_eq!(saved.access_token.value(), "user-tok-2");
    assert_eq!(saved.refresh_token.as_deref(), Some("refresh-2"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unreachable_endpoint_keeps_authorized_client() {
    let store = Arc::new(AuthorizedClientStore::new());
    store.save(authorized(expired("user-tok-1"), Some("refresh-1"))).await;

    let attacher = attacher("http://127.0.0.1:9/oauth2/token", store.clone());
    let err = attacher
        .authorized_token(&UserSession::new("alice", "s-1"))
        .await
        .unwrap_err();

    assert!(err.is_transient());
    let kept = store.load(common::INTERACTIVE_ID, "alice").await.unwrap();
    assert_eq!(kept.refresh_token.as_deref(), Some("refresh-1"));
}

#[tokio::test]
async fn test_expired_without_refresh_token_requires_login() {
    let store = Arc::new(AuthorizedClientStore::new());
    store.save(authorized(expired("user-tok-1"), None)).await;

    let attacher = attacher("http://127.0.0.1:9/oauth2/token", store.clone());

    assert_error_matches!(
        attacher.authorized_token(&UserSession::new("alice", "s-1")).await,
        AuthError::InteractiveAuthRequired { .. }
    );
    assert!(store.load(common::INTERACTIVE_ID, "alice").await.is_none());
}

#[tokio::test]
async fn test_missing_interactive_registration() {
    let registrations = Arc::new(
        mcp_auth_client::InMemoryRegistrationRepository::new(vec![common::registration(
            common::MACHINE_ID,
            mcp_auth_client::GrantType::ClientCredentials,
            "http://127.0.0.1:9/oauth2/token",
        )])
        .unwrap(),
    );
    let attacher = SessionTokenAttacher::new(
        registrations,
        Arc::new(AuthorizedClientStore::new()),
        reqwest::Client::new(),
        common::INTERACTIVE_ID,
        Duration::from_secs(60),
    );

    assert_error_matches!(
        attacher.authorized_token(&UserSession::new("alice", "s-1")).await,
        AuthError::RegistrationNotFound { .. }
    );
}
