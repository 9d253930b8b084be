//! Shared-secret request proof carried in `x-api-key`.
//!
//! The caller sends `x-service-name`, `x-request-at` and
//! `x-api-key = hex(sha256("{service}:{signature_key}:{request_at}"))`. The server recomputes
//! the digest and compares it in constant time.

use axum::http::HeaderMap;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::AppError;

pub const SERVICE_NAME_HEADER: &str = "x-service-name";
pub const REQUEST_AT_HEADER: &str = "x-request-at";
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone)]
pub struct SignatureVerifier {
    signature_key: String,
    max_skew_seconds: Option<u64>,
}

impl SignatureVerifier {
    pub fn new(signature_key: impl Into<String>) -> Self {
        Self { signature_key: signature_key.into(), max_skew_seconds: None }
    }

    /// Rejects proofs whose `x-request-at` is further than `seconds` from server time.
    pub fn with_max_skew(mut self, seconds: Option<u64>) -> Self {
        self.max_skew_seconds = seconds;
        self
    }

    /// Lower-case hex SHA-256 of `service:key:request_at`.
    pub fn compute_proof(&self, service_name: &str, request_at: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(service_name.as_bytes());
        hasher.update(b":");
        hasher.update(self.signature_key.as_bytes());
        hasher.update(b":");
        hasher.update(request_at.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn verify(&self, service_name: &str, request_at: &str, proof: &str) -> bool {
        let expected = self.compute_proof(service_name, request_at);
        // ct_eq on slices of unequal length returns false without comparing content
        bool::from(expected.as_bytes().ct_eq(proof.as_bytes()))
    }

    /// Checks the three proof headers. Every failure is the same generic `Unauthorized`.
    pub fn verify_headers(&self, headers: &HeaderMap) -> Result<(), AppError> {
        let service_name = header_str(headers, SERVICE_NAME_HEADER);
        let request_at = header_str(headers, REQUEST_AT_HEADER);
        let proof = header_str(headers, API_KEY_HEADER);

        let (Some(service_name), Some(request_at), Some(proof)) = (service_name, request_at, proof) else {
            tracing::debug!("signature headers missing");
            return Err(AppError::unauthorized());
        };

        if let Some(max_skew) = self.max_skew_seconds {
            if !within_skew(request_at, max_skew, chrono::Utc::now().timestamp()) {
                tracing::debug!(request_at, "request timestamp outside allowed skew");
                return Err(AppError::unauthorized());
            }
        }

        if !self.verify(service_name, request_at, proof) {
            tracing::debug!(service_name, "signature proof mismatch");
            return Err(AppError::unauthorized());
        }
        Ok(())
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).filter(|v| !v.is_empty())
}

/// Accepts unix seconds or RFC 3339. Unparseable timestamps are out of skew.
fn within_skew(request_at: &str, max_skew: u64, now: i64) -> bool {
    let ts = match request_at.trim().parse::<i64>() {
        Ok(secs) => secs,
        Err(_) => match chrono::DateTime::parse_from_rfc3339(request_at.trim()) {
            Ok(dt) => dt.timestamp(),
            Err(_) => return false,
        },
    };
    now.abs_diff(ts) <= max_skew
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(service: &str, at: &str, proof: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(SERVICE_NAME_HEADER, HeaderValue::from_str(service).unwrap());
        h.insert(REQUEST_AT_HEADER, HeaderValue::from_str(at).unwrap());
        h.insert(API_KEY_HEADER, HeaderValue::from_str(proof).unwrap());
        h
    }

    #[test]
    fn test_proof_matches_known_digest() {
        let verifier = SignatureVerifier::new("secret");
        let mut hasher = Sha256::new();
        hasher.update(b"pos-web:secret:1700000000");
        let expected = hex::encode(hasher.finalize());
        assert_eq!(verifier.compute_proof("pos-web", "1700000000"), expected);
        assert_eq!(expected.len(), 64);
    }

    #[test]
    fn test_same_inputs_verify() {
        let verifier = SignatureVerifier::new("secret");
        let proof = verifier.compute_proof("pos-web", "1700000000");
        assert!(verifier.verify("pos-web", "1700000000", &proof));
    }

    #[test]
    fn test_single_character_mutation_rejected() {
        let verifier = SignatureVerifier::new("secret");
        let proof = verifier.compute_proof("pos-web", "1700000000");

        assert!(!verifier.verify("pos-weB", "1700000000", &proof));
        assert!(!verifier.verify("pos-web", "1700000001", &proof));
        assert!(!SignatureVerifier::new("secreT").verify("pos-web", "1700000000", &proof));

        let mut flipped = proof.clone().into_bytes();
        flipped[10] = if flipped[10] == b'a' { b'b' } else { b'a' };
        assert!(!verifier.verify("pos-web", "1700000000", &String::from_utf8(flipped).unwrap()));
    }

    #[test]
    fn test_truncated_or_uppercased_proof_rejected() {
        let verifier = SignatureVerifier::new("secret");
        let proof = verifier.compute_proof("pos-web", "1700000000");
        assert!(!verifier.verify("pos-web", "1700000000", &proof[..63]));
        assert!(!verifier.verify("pos-web", "1700000000", &proof.to_uppercase()));
        assert!(!verifier.verify("pos-web", "1700000000", ""));
    }

    #[test]
    fn test_verify_headers() {
        let verifier = SignatureVerifier::new("secret");
        let proof = verifier.compute_proof("pos-web", "1700000000");
        assert!(verifier.verify_headers(&headers("pos-web", "1700000000", &proof)).is_ok());

        let err = verifier.verify_headers(&headers("pos-web", "1700000000", "deadbeef")).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(ref m) if m == crate::error::UNAUTHORIZED_MESSAGE));
    }

    #[test]
    fn test_missing_header_rejected() {
        let verifier = SignatureVerifier::new("secret");
        let proof = verifier.compute_proof("pos-web", "1700000000");
        let mut h = headers("pos-web", "1700000000", &proof);
        h.remove(REQUEST_AT_HEADER);
        assert!(matches!(verifier.verify_headers(&h), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_skew_window() {
        let now = 1_700_000_000;
        assert!(within_skew("1700000100", 300, now));
        assert!(!within_skew("1699999000", 300, now));
        assert!(within_skew("2023-11-14T22:13:20Z", 300, now));
        assert!(!within_skew("yesterday", 300, now));
    }

    #[test]
    fn test_skew_disabled_by_default() {
        let verifier = SignatureVerifier::new("secret");
        let proof = verifier.compute_proof("pos-web", "0");
        assert!(verifier.verify_headers(&headers("pos-web", "0", &proof)).is_ok());

        let strict = SignatureVerifier::new("secret").with_max_skew(Some(60));
        assert!(strict.verify_headers(&headers("pos-web", "0", &proof)).is_err());
    }
}
