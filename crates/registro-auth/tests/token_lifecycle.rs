//! Token lifecycle tests against a mock backend.

use std::sync::Arc;
use std::time::Duration;

use registro_auth::{
    AuthError, CredentialStore, LifecycleConfig, MemoryCredentialStore, StoredTokens,
    TokenManager,
};
use reqwest::StatusCode;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn tokens(access: &str, refresh: &str) -> StoredTokens {
    StoredTokens {
        access_token: access.to_string(),
        refresh_token: Some(refresh.to_string()),
    }
}

async fn session(
    server: &MockServer,
    config: LifecycleConfig,
) -> (Arc<TokenManager>, Arc<MemoryCredentialStore>) {
    let store = Arc::new(MemoryCredentialStore::with_tokens(tokens("old", "r1")));
    let manager = TokenManager::new(&server.uri(), config, store.clone()).unwrap();
    assert!(manager.restore().await.unwrap());
    (Arc::new(manager), store)
}

async fn mount_protected_resource(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v1/registers"))
        .and(header("authorization", "Bearer old"))
        .respond_with(ResponseTemplate::new(401))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/registers"))
        .and(header("authorization", "Bearer new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .mount(server)
        .await;
}

fn registers_request(manager: &TokenManager) -> reqwest::Request {
    manager
        .http()
        .get(format!("{}/api/v1/registers", manager.base_url()))
        .build()
        .unwrap()
}

async fn refresh_calls(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == "/auth/refresh")
        .count()
}

#[tokio::test]
async fn concurrent_401s_share_a_single_refresh() {
    let server = MockServer::start().await;
    mount_protected_resource(&server).await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(query_param("refreshToken", "r1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access_token": "new", "refresh_token": "r2" }))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (manager, store) = session(&server, LifecycleConfig::default()).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let manager = Arc::clone(&manager);
        handles.push(tokio::spawn(async move {
            let request = registers_request(&manager);
            manager.dispatch(request).await
        }));
    }

    for handle in handles {
        let response = handle.await.unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(refresh_calls(&server).await, 1);
    assert_eq!(manager.access_token().as_deref(), Some("new"));
    assert_eq!(store.load().await.unwrap(), Some(tokens("new", "r2")));
}

#[tokio::test]
async fn reactive_refresh_failure_logs_out() {
    let server = MockServer::start().await;
    mount_protected_resource(&server).await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let (manager, store) = session(&server, LifecycleConfig::default()).await;

    let err = manager
        .dispatch(registers_request(&manager))
        .await
        .unwrap_err();
    assert!(err.is_session_error(), "{err}");
    assert!(!manager.is_logged_in());
    assert!(store.load().await.unwrap().is_none());

    // Only one request to the protected resource: no retry after a failed refresh.
    let resource_calls = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/api/v1/registers")
        .count();
    assert_eq!(resource_calls, 1);
}

#[tokio::test]
async fn proactive_refresh_failure_keeps_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let config = LifecycleConfig::default().with_refresh_interval(Duration::from_millis(50));
    let (manager, store) = session(&server, config).await;

    let timer = manager.spawn_proactive_refresh();
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert!(!timer.is_running(), "timer should stop after a failure");
    assert!(manager.is_logged_in());
    assert_eq!(manager.access_token().as_deref(), Some("old"));
    assert_eq!(store.load().await.unwrap(), Some(tokens("old", "r1")));
}

#[tokio::test]
async fn proactive_refresh_renews_on_schedule() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "new" })))
        .mount(&server)
        .await;

    let config = LifecycleConfig::default().with_refresh_interval(Duration::from_millis(100));
    let (manager, store) = session(&server, config).await;

    let timer = manager.spawn_proactive_refresh();
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(timer.is_running());
    timer.stop();

    assert!(refresh_calls(&server).await >= 1);
    assert_eq!(manager.access_token().as_deref(), Some("new"));
    // The backend did not rotate the refresh token, so the old one is kept.
    assert_eq!(store.load().await.unwrap(), Some(tokens("new", "r1")));
}

#[tokio::test]
async fn excluded_endpoints_are_never_recovered() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let (manager, _store) = session(&server, LifecycleConfig::default()).await;

    let login = manager
        .http()
        .post(format!("{}/auth/login", server.uri()))
        .build()
        .unwrap();
    let response = manager.dispatch(login).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let refresh = manager
        .http()
        .post(format!("{}/auth/refresh?refreshToken=r1", server.uri()))
        .build()
        .unwrap();
    let response = manager.dispatch(refresh).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // One call each: the refresh endpoint itself was not retried.
    assert_eq!(refresh_calls(&server).await, 1);
    assert!(manager.is_logged_in());

    for request in server.received_requests().await.unwrap() {
        assert!(!request.headers.contains_key("authorization"));
    }
}

#[tokio::test]
async fn non_401_responses_pass_through() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/registers"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (manager, _store) = session(&server, LifecycleConfig::default()).await;
    let response = manager.dispatch(registers_request(&manager)).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn retry_is_attempted_only_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/registers"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "new" })))
        .expect(1)
        .mount(&server)
        .await;

    let (manager, _store) = session(&server, LifecycleConfig::default()).await;
    let response = manager.dispatch(registers_request(&manager)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(manager.is_logged_in());
}

#[tokio::test]
async fn stuck_refresh_times_out_for_leader_and_waiters() {
    let server = MockServer::start().await;
    mount_protected_resource(&server).await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access_token": "new" }))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let config = LifecycleConfig::default().with_refresh_timeout(Duration::from_millis(200));
    let (manager, _store) = session(&server, config).await;

    let mut handles = Vec::new();
    for _ in 0..3 {
        let manager = Arc::clone(&manager);
        handles.push(tokio::spawn(async move {
            let request = registers_request(&manager);
            manager.dispatch(request).await
        }));
    }

    for handle in handles {
        let err = handle.await.unwrap().unwrap_err();
        assert!(
            matches!(
                err,
                AuthError::RefreshTimeout { .. } | AuthError::SessionExpired { .. }
            ),
            "{err}"
        );
    }
    assert!(!manager.is_logged_in());
}

#[tokio::test]
async fn login_stores_tokens_and_reads_roles() {
    let server = MockServer::start().await;
    // {"email":"doctor@example.org","roles":["Doctor"]}
    let access = "e30.eyJlbWFpbCI6ImRvY3RvckBleGFtcGxlLm9yZyIsInJvbGVzIjpbIkRvY3RvciJdfQ.sig";
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({ "email": "doctor@example.org", "password": "s3cret" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access_token": access, "refresh_token": "r1" })),
        )
        .mount(&server)
        .await;

    let store = Arc::new(MemoryCredentialStore::new());
    let manager = TokenManager::new(&server.uri(), LifecycleConfig::default(), store.clone())
        .unwrap();

    let credential = manager.login("doctor@example.org", "s3cret").await.unwrap();
    assert_eq!(credential.email(), Some("doctor@example.org"));
    assert!(manager.has_role("Doctor"));
    assert!(manager.is_logged_in());
    assert_eq!(store.load().await.unwrap(), Some(tokens(access, "r1")));
}

#[tokio::test]
async fn login_with_wrong_password() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let manager = TokenManager::new(
        &server.uri(),
        LifecycleConfig::default(),
        Arc::new(MemoryCredentialStore::new()),
    )
    .unwrap();

    let err = manager.login("doctor@example.org", "wrong").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
    assert!(!manager.is_logged_in());
}

#[tokio::test]
async fn forgot_password_sends_email_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/forgot-password"))
        .and(query_param("email", "doctor@example.org"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let manager = TokenManager::new(
        &server.uri(),
        LifecycleConfig::default(),
        Arc::new(MemoryCredentialStore::new()),
    )
    .unwrap();
    manager.forgot_password("doctor@example.org").await.unwrap();
}

#[tokio::test]
async fn cancelled_refresh_does_not_block_later_recovery() {
    let server = MockServer::start().await;
    mount_protected_resource(&server).await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access_token": "new" }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let config = LifecycleConfig::default().with_refresh_timeout(Duration::from_secs(2));
    let (manager, _store) = session(&server, config).await;

    let cancelled = tokio::time::timeout(
        Duration::from_millis(100),
        manager.dispatch(registers_request(&manager)),
    )
    .await;
    assert!(cancelled.is_err(), "first dispatch should be cut short");
    assert!(manager.is_logged_in());

    let response = manager.dispatch(registers_request(&manager)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(refresh_calls(&server).await, 2);
    assert_eq!(manager.access_token().as_deref(), Some("new"));
}

#[tokio::test]
async fn stopping_the_timer_mid_refresh_releases_coordination() {
    let server = MockServer::start().await;
    mount_protected_resource(&server).await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access_token": "new" }))
                .set_delay(Duration::from_millis(400)),
        )
        .mount(&server)
        .await;

    let config = LifecycleConfig::default()
        .with_refresh_interval(Duration::from_millis(50))
        .with_refresh_timeout(Duration::from_secs(2));
    let (manager, _store) = session(&server, config).await;

    let timer = manager.spawn_proactive_refresh();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(refresh_calls(&server).await, 1, "timer refresh should be in flight");
    timer.stop();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let response = manager.dispatch(registers_request(&manager)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(refresh_calls(&server).await, 2);
}

#[tokio::test]
async fn waiter_on_failed_proactive_refresh_recovers_reactively() {
    let server = MockServer::start().await;
    mount_protected_resource(&server).await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(503).set_delay(Duration::from_millis(300)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access_token": "new", "refresh_token": "r2" })),
        )
        .mount(&server)
        .await;

    let (manager, store) = session(&server, LifecycleConfig::default()).await;

    let proactive = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.refresh_proactively().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let response = manager.dispatch(registers_request(&manager)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let err = proactive.await.unwrap().unwrap_err();
    assert!(matches!(err, AuthError::Http { status: 503, .. }), "{err}");
    assert_eq!(refresh_calls(&server).await, 2);
    assert!(manager.is_logged_in());
    assert_eq!(store.load().await.unwrap(), Some(tokens("new", "r2")));
}

#[tokio::test]
async fn waiter_on_failed_proactive_refresh_logs_out_when_reactive_fails_too() {
    let server = MockServer::start().await;
    mount_protected_resource(&server).await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(300)))
        .mount(&server)
        .await;

    let (manager, store) = session(&server, LifecycleConfig::default()).await;

    let proactive = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.refresh_proactively().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = manager
        .dispatch(registers_request(&manager))
        .await
        .unwrap_err();
    assert!(err.is_session_error(), "{err}");
    assert!(proactive.await.unwrap().is_err());
    assert_eq!(refresh_calls(&server).await, 2);
    assert!(!manager.is_logged_in());
    assert!(store.load().await.unwrap().is_none());
}
