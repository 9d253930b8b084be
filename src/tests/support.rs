use axum::{
    body::Body,
    http::{header, Method, Request, Response},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tempfile::TempDir;
use tower::ServiceExt;

use crate::config::AppConfig;
use crate::middleware::signature::{API_KEY_HEADER, REQUEST_AT_HEADER, SERVICE_NAME_HEADER};
use crate::routes;
use crate::state::AppState;

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const SIGNATURE_KEY: &str = "test-signature-key";
pub const SERVICE_NAME: &str = "pos-web";
pub const REQUEST_AT: &str = "1700000000";

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    // Keeps the database file alive for the lifetime of the test.
    _dir: TempDir,
}

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.security.jwt_secret = JWT_SECRET.to_string();
    cfg.security.signature_key = SIGNATURE_KEY.to_string();
    cfg
}

/// Builds state over a fresh, seeded database. `router` receives the state and returns the app.
pub async fn setup_custom(cfg: AppConfig, router: impl FnOnce(AppState) -> Router) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let opts = SqliteConnectOptions::new().filename(dir.path().join("test.db")).create_if_missing(true);
    let pool = SqlitePoolOptions::new().max_connections(4).connect_with(opts).await.unwrap();
    crate::db::init_db(&pool).await.unwrap();
    crate::db::seed(&pool, &cfg.seed).await.unwrap();

    let state = AppState::new(pool, cfg);
    let app = router(state.clone());
    TestApp { app, state, _dir: dir }
}

pub async fn setup_with(cfg: AppConfig) -> TestApp {
    setup_custom(cfg, routes::build_router).await
}

pub async fn setup() -> TestApp {
    setup_with(test_config()).await
}

impl TestApp {
    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(req).await.unwrap()
    }

    /// Logs in through the public endpoint and returns the bearer token.
    pub async fn login(&self, username: &str, password: &str) -> String {
        let body = serde_json::json!({ "username": username, "password": password });
        let res = self.send(json_request(Method::POST, "/api/v1/auth/login", None, false, &self.state, Some(body))).await;
        assert_eq!(res.status(), 200, "login failed for {}", username);
        let json = body_json(res).await;
        json["token"].as_str().unwrap().to_string()
    }

    pub async fn owner_token(&self) -> String {
        self.login("owner", "owner123").await
    }

    /// Authenticated and signed request, the way the POS clients call protected routes.
    pub fn authed(&self, method: Method, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
        json_request(method, uri, Some(token), true, &self.state, body)
    }
}

pub fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    signed: bool,
    state: &AppState,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    if signed {
        let proof = state.pipeline.signatures().compute_proof(SERVICE_NAME, REQUEST_AT);
        builder = builder
            .header(SERVICE_NAME_HEADER, SERVICE_NAME)
            .header(REQUEST_AT_HEADER, REQUEST_AT)
            .header(API_KEY_HEADER, proof);
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn body_json(res: Response<Body>) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
