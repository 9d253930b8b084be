//! Per-route composition of the credential checks.
//!
//! Every route declares a [`RouteGuard`]; the [`Pipeline`] runs the checks it names in a fixed
//! order (token, signature, role) and stops at the first failure. On success the
//! [`AuthContext`] is stored in the request extensions for handlers.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::role::{authorize, AllowedRoles};
use super::signature::SignatureVerifier;
use super::token::{AuthContext, TokenAuthenticator};
use crate::config::SecurityConfig;
use crate::error::AppError;
use crate::metrics::Metrics;

/// Which checks a route requires.
///
/// The three source tiers are [`RouteGuard::public`], [`RouteGuard::authenticated`] and
/// [`RouteGuard::role_gated`]; [`RouteGuard::with_roles`] layers a role check on top of
/// token + signature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteGuard {
    token: bool,
    signature: bool,
    roles: Option<AllowedRoles>,
}

impl RouteGuard {
    /// No credential checks.
    pub fn public() -> Self {
        Self::default()
    }

    /// Bearer token plus signature proof.
    pub fn authenticated() -> Self {
        Self { token: true, signature: true, roles: None }
    }

    /// Bearer token plus role allow-list, no signature proof.
    pub fn role_gated(roles: AllowedRoles) -> Self {
        Self { token: true, signature: false, roles: Some(roles) }
    }

    /// Adds a role allow-list; implies a bearer token.
    pub fn with_roles(mut self, roles: AllowedRoles) -> Self {
        self.token = true;
        self.roles = Some(roles);
        self
    }

    pub fn requires_token(&self) -> bool {
        self.token
    }

    pub fn requires_signature(&self) -> bool {
        self.signature
    }

    pub fn allowed_roles(&self) -> Option<&AllowedRoles> {
        self.roles.as_ref()
    }
}

/// Token and signature verifiers built once from the startup configuration.
#[derive(Clone)]
pub struct Pipeline {
    tokens: TokenAuthenticator,
    signatures: SignatureVerifier,
}

impl Pipeline {
    pub fn new(tokens: TokenAuthenticator, signatures: SignatureVerifier) -> Self {
        Self { tokens, signatures }
    }

    pub fn from_config(cfg: &SecurityConfig) -> Self {
        Self::new(
            TokenAuthenticator::new(&cfg.jwt_secret, cfg.token_ttl()),
            SignatureVerifier::new(cfg.signature_key.clone()).with_max_skew(cfg.signature_max_skew_seconds),
        )
    }

    pub fn tokens(&self) -> &TokenAuthenticator {
        &self.tokens
    }

    pub fn signatures(&self) -> &SignatureVerifier {
        &self.signatures
    }

    /// Runs the checks named by `guard`. `Ok(None)` means the route needs no identity.
    pub fn check(&self, guard: &RouteGuard, headers: &HeaderMap) -> Result<Option<AuthContext>, AppError> {
        let ctx = if guard.token {
            let value = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok());
            match self.tokens.authenticate(value) {
                Ok(ctx) => Some(ctx),
                Err(e) => {
                    tracing::debug!(reason = %e, "bearer token rejected");
                    return Err(e.into());
                }
            }
        } else {
            None
        };

        if guard.signature {
            self.signatures.verify_headers(headers)?;
        }

        if let Some(roles) = &guard.roles {
            let ctx = ctx.as_ref().ok_or_else(AppError::unauthorized)?;
            authorize(roles, &ctx.identity)?;
        }

        Ok(ctx)
    }
}

/// State handed to [`guard_middleware`] for one group of routes.
#[derive(Clone)]
pub struct GuardState {
    pub pipeline: Arc<Pipeline>,
    pub guard: RouteGuard,
    pub metrics: Metrics,
}

pub async fn guard_middleware(State(gs): State<GuardState>, mut req: Request, next: Next) -> Response {
    match gs.pipeline.check(&gs.guard, req.headers()) {
        Ok(Some(ctx)) => {
            req.extensions_mut().insert(ctx);
            next.run(req).await
        }
        Ok(None) => next.run(req).await,
        Err(err) => {
            match &err {
                AppError::Forbidden { role, .. } => {
                    gs.metrics.inc_forbidden();
                    tracing::warn!(path = %req.uri().path(), %role, "role not permitted");
                }
                AppError::Unauthorized(_) => {
                    gs.metrics.inc_unauthorized();
                    tracing::warn!(path = %req.uri().path(), "request rejected: unauthorized");
                }
                _ => {}
            }
            err.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::signature::{API_KEY_HEADER, REQUEST_AT_HEADER, SERVICE_NAME_HEADER};
    use crate::types::Identity;
    use axum::http::HeaderValue;
    use std::time::Duration;
    use uuid::Uuid;

    fn pipeline() -> Pipeline {
        Pipeline::new(
            TokenAuthenticator::new("jwt-secret", Duration::from_secs(600)),
            SignatureVerifier::new("sig-key"),
        )
    }

    fn identity(role: &str) -> Identity {
        Identity {
            uuid: Uuid::new_v4(),
            name: "Admin".into(),
            username: "admin".into(),
            phone_number: "081".into(),
            email: "admin@mail.com".into(),
            role: role.into(),
        }
    }

    fn headers(p: &Pipeline, role: Option<&str>, signed: bool) -> HeaderMap {
        let mut h = HeaderMap::new();
        if let Some(role) = role {
            let token = p.tokens().issue(&identity(role)).unwrap();
            h.insert(header::AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", token)).unwrap());
        }
        if signed {
            let proof = p.signatures().compute_proof("pos-web", "1700000000");
            h.insert(SERVICE_NAME_HEADER, HeaderValue::from_static("pos-web"));
            h.insert(REQUEST_AT_HEADER, HeaderValue::from_static("1700000000"));
            h.insert(API_KEY_HEADER, HeaderValue::from_str(&proof).unwrap());
        }
        h
    }

    #[test]
    fn test_public_route_needs_nothing() {
        let p = pipeline();
        assert!(matches!(p.check(&RouteGuard::public(), &HeaderMap::new()), Ok(None)));
    }

    #[test]
    fn test_authenticated_requires_token_and_signature() {
        let p = pipeline();
        let guard = RouteGuard::authenticated();

        let ctx = p.check(&guard, &headers(&p, Some("admin"), true)).unwrap().unwrap();
        assert_eq!(ctx.identity.role, "admin");

        assert!(matches!(p.check(&guard, &headers(&p, Some("admin"), false)), Err(AppError::Unauthorized(_))));
        assert!(matches!(p.check(&guard, &headers(&p, None, true)), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_role_gated_skips_signature() {
        let p = pipeline();
        let guard = RouteGuard::role_gated(AllowedRoles::new(["owner"]));

        assert!(p.check(&guard, &headers(&p, Some("OWNER"), false)).unwrap().is_some());
        assert!(matches!(p.check(&guard, &headers(&p, Some("admin"), false)), Err(AppError::Forbidden { .. })));
        assert!(matches!(p.check(&guard, &headers(&p, None, false)), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_with_roles_runs_all_three_checks() {
        let p = pipeline();
        let guard = RouteGuard::authenticated().with_roles(AllowedRoles::new(["owner", "admin"]));
        assert!(guard.requires_token() && guard.requires_signature());

        assert!(p.check(&guard, &headers(&p, Some("admin"), true)).is_ok());
        assert!(matches!(p.check(&guard, &headers(&p, Some("guest"), true)), Err(AppError::Forbidden { .. })));
        // Signature runs before the role check
        assert!(matches!(p.check(&guard, &headers(&p, Some("guest"), false)), Err(AppError::Unauthorized(_))));
    }
}
