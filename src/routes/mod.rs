//! HTTP route handlers and router assembly.
//!
//! - `health`: liveness, readiness, metrics and version endpoints
//! - `users`: login, registration and user profile endpoints under `/api/v1/auth`
//! - `products`: product CRUD under `/api/v1/products`

pub mod health;
pub mod products;
pub mod users;

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, Method,
    },
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::middleware::{
    failure::failure_boundary,
    guard::guard_middleware,
    rate_limit::rate_limit_middleware,
    signature::{API_KEY_HEADER, REQUEST_AT_HEADER, SERVICE_NAME_HEADER},
    AllowedRoles, RouteGuard,
};
use crate::state::AppState;

/// Role code allowed to register new users.
pub const OWNER_ROLE: &str = "owner";

/// Builds the full application router including the security pipeline layers.
///
/// Layer order, outermost first: trace, CORS, failure boundary, rate limit. Credential checks
/// are attached per route group through [`RouteGuard`].
pub fn build_router(state: AppState) -> Router {
    let owner_only = state.guard(RouteGuard::role_gated(AllowedRoles::new([OWNER_ROLE])));
    let authenticated = state.guard(RouteGuard::authenticated());

    let public: Router<AppState> = Router::new().route("/auth/login", post(users::login));

    let role_gated: Router<AppState> = Router::new()
        .route("/auth/register", post(users::register))
        .route_layer(from_fn_with_state(owner_only, guard_middleware));

    let protected: Router<AppState> = Router::new()
        .route("/auth/user", get(users::get_user_login))
        .route("/auth/{uuid}", get(users::get_user_by_uuid).put(users::update_user))
        .route("/products", get(products::list_products).post(products::create_product))
        .route("/products/pagination", get(products::list_products_paginated))
        .route("/products/code/{code}", get(products::get_product_by_code))
        .route(
            "/products/{uuid}",
            get(products::get_product).put(products::update_product).delete(products::delete_product),
        )
        .route_layer(from_fn_with_state(authenticated, guard_middleware));

    let api = Router::new().merge(public).merge(role_gated).merge(protected);

    Router::new()
        .route("/", get(health::welcome))
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/metrics", get(health::metrics))
        .route("/metrics/prometheus", get(health::metrics_prometheus))
        .route("/version", get(health::version))
        .nest("/api/v1", api)
        .fallback(health::not_found)
        .with_state(state.clone())
        .layer(from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(failure_boundary(state.metrics.clone()))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::GET, Method::PUT, Method::DELETE, Method::PATCH])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static(SERVICE_NAME_HEADER),
            HeaderName::from_static(API_KEY_HEADER),
            HeaderName::from_static(REQUEST_AT_HEADER),
        ])
}
