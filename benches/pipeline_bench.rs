use std::hint::black_box;
use std::net::IpAddr;
use std::time::Duration;

use axum::http::{header, HeaderMap, HeaderValue};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use pos_backend::middleware::signature::{SignatureVerifier, API_KEY_HEADER, REQUEST_AT_HEADER, SERVICE_NAME_HEADER};
use pos_backend::middleware::token::TokenAuthenticator;
use pos_backend::middleware::{AllowedRoles, Pipeline, RateLimiter, RouteGuard};
use pos_backend::types::Identity;
use uuid::Uuid;

fn identity() -> Identity {
    Identity {
        uuid: Uuid::new_v4(),
        name: "Admin".to_string(),
        username: "admin".to_string(),
        phone_number: "0811".to_string(),
        email: "admin@mail.com".to_string(),
        role: "admin".to_string(),
    }
}

fn bench_signature(c: &mut Criterion) {
    let verifier = SignatureVerifier::new("bench-signature-key");
    let proof = verifier.compute_proof("pos-web", "1700000000");
    c.bench_function("signature_verify", |b| {
        b.iter(|| black_box(verifier.verify(black_box("pos-web"), black_box("1700000000"), black_box(&proof))))
    });
}

fn bench_token(c: &mut Criterion) {
    let tokens = TokenAuthenticator::new("bench-jwt-secret", Duration::from_secs(3600));
    let token = tokens.issue(&identity()).unwrap();
    c.bench_function("token_verify", |b| b.iter(|| black_box(tokens.verify(black_box(&token)).is_ok())));
}

fn bench_pipeline(c: &mut Criterion) {
    let pipeline = Pipeline::new(
        TokenAuthenticator::new("bench-jwt-secret", Duration::from_secs(3600)),
        SignatureVerifier::new("bench-signature-key"),
    );
    let guard = RouteGuard::authenticated().with_roles(AllowedRoles::new(["owner", "admin"]));
    let token = pipeline.tokens().issue(&identity()).unwrap();
    let proof = pipeline.signatures().compute_proof("pos-web", "1700000000");

    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", token)).unwrap());
    headers.insert(SERVICE_NAME_HEADER, HeaderValue::from_static("pos-web"));
    headers.insert(REQUEST_AT_HEADER, HeaderValue::from_static("1700000000"));
    headers.insert(API_KEY_HEADER, HeaderValue::from_str(&proof).unwrap());

    c.bench_function("pipeline_check_role_gated", |b| {
        b.iter(|| black_box(pipeline.check(&guard, black_box(&headers)).is_ok()))
    });
}

fn bench_rate_limiter(c: &mut Criterion) {
    let mut group = c.benchmark_group("rate_limiter_check");
    for clients in [1u32, 1_000, 50_000] {
        group.bench_with_input(BenchmarkId::from_parameter(clients), &clients, |b, &clients| {
            let limiter = RateLimiter::new(u32::MAX, Duration::from_secs(60));
            let mut n: u32 = 0;
            b.iter(|| {
                n = (n + 1) % clients;
                let ip = IpAddr::from(n.to_be_bytes());
                black_box(limiter.check_rate_limit(ip).is_ok())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_signature, bench_token, bench_pipeline, bench_rate_limiter);
criterion_main!(benches);
