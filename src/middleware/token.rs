//! Bearer token issuing and verification.
//!
//! Tokens are HS256 JWTs with the caller's [`Identity`] in the `user` claim. Verification pins
//! the HMAC family, requires `exp`, allows no leeway and treats `exp == now` as expired.

use std::time::Duration;

use axum::{extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::types::Identity;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user: Identity,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("missing authorization header")]
    Missing,
    #[error("malformed authorization header")]
    Malformed,
    #[error("token expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
    #[error("token signing failed: {0}")]
    Signing(jsonwebtoken::errors::Error),
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(e) => AppError::Internal(anyhow::Error::new(e).context("signing token")),
            _ => AppError::unauthorized(),
        }
    }
}

/// Identity and raw token of an authenticated request, stored in request extensions.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub identity: Identity,
    pub token: String,
}

impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthContext>().cloned().ok_or_else(AppError::unauthorized)
    }
}

#[derive(Clone)]
pub struct TokenAuthenticator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenAuthenticator {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Symmetric family only; anything else (RS*, ES*, none) fails before signature checks.
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issues a token for `identity` that expires after the configured lifetime.
    pub fn issue(&self, identity: &Identity) -> Result<String, TokenError> {
        let now = chrono::Utc::now().timestamp();
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        self.sign(&Claims { user: identity.clone(), iat: now, exp: now.saturating_add(ttl) })
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding).map_err(TokenError::Signing)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, chrono::Utc::now().timestamp())
    }

    pub(crate) fn verify_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)?;
        if data.claims.exp <= now {
            return Err(TokenError::Expired);
        }
        Ok(data.claims)
    }

    /// Validates an `Authorization` header value and returns the request's auth context.
    pub fn authenticate(&self, header: Option<&str>) -> Result<AuthContext, TokenError> {
        let header = header.filter(|h| !h.is_empty()).ok_or(TokenError::Missing)?;
        let token = extract_bearer(header).ok_or(TokenError::Malformed)?;
        let claims = self.verify(token)?;
        Ok(AuthContext { identity: claims.user, token: token.to_string() })
    }
}

/// Returns the token of a `Bearer <token>` header; exactly two whitespace-separated parts.
pub fn extract_bearer(header: &str) -> Option<&str> {
    let mut parts = header.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Some(token),
        _ => None,
    }
}
