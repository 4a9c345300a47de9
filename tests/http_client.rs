//! `AuthClient` and `SessionManager` against an in-process fake backend.

#![cfg(feature = "client")]

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde_json::{Value, json};

use nuam_session::api::{ApiConfig, AuthClient};
use nuam_session::session::{
    AuthError, FileTokenStore, LoginOutcome, MemoryTokenStore, SessionConfig, SessionManager,
    SessionPhase, TokenStore,
};
use nuam_session::{Error, Identity, Role};

fn grant(access: &str, user: Value) -> Value {
    json!({
        "mfa_required": false,
        "access": access,
        "refresh": format!("refresh-for-{access}"),
        "user": user,
    })
}

async fn login(Json(body): Json<Value>) -> Response {
    match (body["username"].as_str(), body["password"].as_str()) {
        (Some("alice"), Some("pw")) => Json(grant(
            "access-alice",
            json!({"username": "alice", "role": "admin"}),
        ))
        .into_response(),
        (Some("carla"), Some("pw")) => {
            Json(json!({"mfa_required": true, "temp_token": "signed:carla"})).into_response()
        }
        (Some("ghost"), Some("pw")) => Json(json!({
            "mfa_required": false,
            "access": "access-ghost",
            "refresh": "refresh-ghost",
        }))
        .into_response(),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Invalid credentials"})),
        )
            .into_response(),
    }
}

async fn verify(Json(body): Json<Value>) -> Response {
    match (body["temp_token"].as_str(), body["code"].as_str()) {
        (Some("signed:carla"), Some("123456")) => Json(grant(
            "access-carla",
            json!({"username": "carla", "role": "corredor"}),
        ))
        .into_response(),
        (Some("signed:carla"), _) => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Invalid OTP code"})),
        )
            .into_response(),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Invalid or expired session"})),
        )
            .into_response(),
    }
}

async fn me(headers: HeaderMap) -> Response {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    match bearer {
        Some("access-alice") => {
            Json(json!({"username": "alice", "role": "admin", "email": "alice@nuam.cl"}))
                .into_response()
        }
        Some("access-carla") => {
            Json(json!({"username": "carla", "role": "corredor"})).into_response()
        }
        Some("access-legacy") => {
            Json(json!({"username": "ana", "role": "analista"})).into_response()
        }
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Given token not valid for any token type"})),
        )
            .into_response(),
    }
}

async fn refresh(Json(body): Json<Value>) -> Response {
    match body["refresh"].as_str() {
        Some("refresh-for-access-alice") => Json(json!({"access": "access-alice-2"})).into_response(),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Token is invalid or expired"})),
        )
            .into_response(),
    }
}

async fn password_reset(Json(body): Json<Value>) -> Response {
    if body["email"].as_str().is_some() {
        Json(json!({"message": "If an account exists with this email, a password reset link has been sent."}))
            .into_response()
    } else {
        (StatusCode::BAD_REQUEST, Json(json!({"error": "Email is required"}))).into_response()
    }
}

async fn password_reset_confirm(Json(body): Json<Value>) -> Response {
    if body["token"].as_str() == Some("good") && body["password"].as_str().is_some() {
        Json(json!({"message": "Password has been reset successfully"})).into_response()
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Invalid or expired token"})),
        )
            .into_response()
    }
}

async fn register(Json(body): Json<Value>) -> Response {
    (
        StatusCode::CREATED,
        Json(json!({
            "message": "User created successfully",
            "user": {"username": body["username"], "role": body["role"]},
        })),
    )
        .into_response()
}

async fn mfa_setup(headers: HeaderMap) -> Response {
    if headers.get(AUTHORIZATION).is_none() {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({
        "qr_code": "data:image/png;base64,iVBORw0KGgo=",
        "secret_key": "JBSWY3DPEHPK3PXP",
    }))
    .into_response()
}

async fn spawn_backend() -> ApiConfig {
    let app = Router::new()
        .route("/api/auth/login/", post(login))
        .route("/api/auth/login/verify/", post(verify))
        .route("/api/auth/me/", get(me))
        .route("/api/auth/register/", post(register))
        .route("/api/auth/password-reset/", post(password_reset))
        .route("/api/auth/password-reset/confirm/", post(password_reset_confirm))
        .route("/api/token/refresh/", post(refresh))
        .route("/api/mfa/setup/", get(mfa_setup));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    ApiConfig::new(format!("http://{addr}/api").parse().unwrap()).unwrap()
}

async fn manager_with<S: TokenStore>(store: S) -> SessionManager<AuthClient, S> {
    let client = AuthClient::new(spawn_backend().await);
    let manager = SessionManager::new(client, store, SessionConfig::default());
    manager.initialize().await;
    manager
}

#[tokio::test]
async fn client_login_without_mfa() {
    let client = AuthClient::new(spawn_backend().await);

    let response = client.login("alice", "pw").await.unwrap();

    assert!(!response.mfa_required);
    assert_eq!(response.user, Some(Identity::new("alice", Role::Admin)));
}

#[tokio::test]
async fn client_surfaces_status_and_body() {
    let client = AuthClient::new(spawn_backend().await);

    let err = client.login("alice", "wrong").await.unwrap_err();

    match err {
        Error::Api {
            operation,
            status,
            detail,
        } => {
            assert_eq!(operation, "login");
            assert_eq!(status, Some(401));
            assert!(detail.contains("Invalid credentials"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn client_maps_legacy_role_names() {
    let client = AuthClient::new(spawn_backend().await);

    let identity = client.me(&"access-legacy".into()).await.unwrap();

    assert_eq!(identity.role, Role::Tributario);
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let config = ApiConfig::new(format!("http://{addr}/api/").parse().unwrap()).unwrap();

    let err = AuthClient::new(config).login("alice", "pw").await.unwrap_err();

    assert!(matches!(err, Error::Http(_)));
    assert!(!err.is_rejection());
}

#[tokio::test]
async fn mfa_login_over_http() {
    let manager = manager_with(MemoryTokenStore::new()).await;

    let outcome = manager.login("carla", "pw").await.unwrap();
    assert!(matches!(outcome, LoginOutcome::MfaRequired(_)));
    assert_eq!(manager.session().phase(), SessionPhase::AwaitingMfa);

    let err = manager.verify_mfa("999999").await.unwrap_err();
    assert!(err.is_rejection());
    assert!(manager.session().pending_challenge().is_some());

    let outcome = manager.verify_mfa("123456").await.unwrap();
    assert_eq!(outcome.redirect(), Some("/corredor/dashboard"));
    assert_eq!(
        manager.store().get("access_token").unwrap().as_deref(),
        Some("access-carla")
    );
    assert_eq!(manager.session().role(), Some(Role::Corredor));
}

#[tokio::test]
async fn grant_without_user_is_refused() {
    let manager = manager_with(MemoryTokenStore::new()).await;

    let err = manager.login("ghost", "pw").await.unwrap_err();

    assert!(matches!(err, AuthError::Transport(Error::MissingIdentity)));
    assert_eq!(manager.store().get("access_token").unwrap(), None);
}

#[tokio::test]
async fn session_survives_restart_with_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tokens.json");

    let first = manager_with(FileTokenStore::new(&path)).await;
    first.login("alice", "pw").await.unwrap();
    first.dispose();

    let second = manager_with(FileTokenStore::new(&path)).await;
    assert_eq!(second.session().phase(), SessionPhase::Authenticated);
    assert_eq!(
        second.session().identity(),
        Some(&Identity::new("alice", Role::Admin))
    );
}

#[tokio::test]
async fn stale_token_is_cleared_on_restart() {
    let store = Arc::new(MemoryTokenStore::new());
    store.set("access_token", "access-revoked").unwrap();
    store.set("refresh_token", "refresh-revoked").unwrap();

    let manager = manager_with(store.clone()).await;

    assert_eq!(manager.session().phase(), SessionPhase::Anonymous);
    assert_eq!(store.get("access_token").unwrap(), None);
    assert_eq!(store.get("refresh_token").unwrap(), None);
}

#[tokio::test]
async fn refresh_over_http() {
    let manager = manager_with(MemoryTokenStore::new()).await;
    manager.login("alice", "pw").await.unwrap();

    manager.refresh().await.unwrap();

    assert_eq!(
        manager.store().get("access_token").unwrap().as_deref(),
        Some("access-alice-2")
    );
    assert_eq!(
        manager.store().get("refresh_token").unwrap().as_deref(),
        Some("refresh-for-access-alice")
    );
}

#[tokio::test]
async fn account_endpoints_over_http() {
    let manager = manager_with(MemoryTokenStore::new()).await;

    manager.request_password_reset("alice@nuam.cl").await.unwrap();
    manager
        .confirm_password_reset("MQ", "good", "n3w-pass")
        .await
        .unwrap();
    assert!(
        manager
            .confirm_password_reset("MQ", "bad", "n3w-pass")
            .await
            .unwrap_err()
            .is_rejection()
    );

    let identity = manager
        .register(&nuam_session::types::NewAccount {
            username: "bob".into(),
            email: None,
            password: "hunter2".into(),
            role: Role::Tributario,
        })
        .await
        .unwrap();
    assert_eq!(identity, Identity::new("bob", Role::Tributario));
}

#[tokio::test]
async fn mfa_enrollment_over_http() {
    let manager = manager_with(MemoryTokenStore::new()).await;
    manager.login("alice", "pw").await.unwrap();

    let enrollment = manager.begin_mfa_enrollment().await.unwrap();

    assert_eq!(enrollment.secret_key.as_deref(), Some("JBSWY3DPEHPK3PXP"));
    assert_eq!(enrollment.qr_png().unwrap(), b"\x89PNG\r\n\x1a\n");
}
