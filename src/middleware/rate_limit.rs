use super::ip::client_ip;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{
    collections::HashMap,
    net::IpAddr,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use crate::config::RateLimitConfig;
use crate::error::AppError;
use crate::state::AppState;

/// Per-client counter for the current window.
#[derive(Debug, Clone, Copy)]
struct RateWindow {
    count: u32,
    started: Instant,
}

/// A thread-safe fixed-window rate limiter keyed by client IP.
///
/// Lookup, window reset and increment for a key happen under one lock, so concurrent
/// requests can never be admitted past `max_requests` within a window.
#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<Mutex<HashMap<IpAddr, RateWindow>>>,
    max_requests: u32,
    window: Duration,
    stale_after: Duration,
}

impl RateLimiter {
    /// Creates a new `RateLimiter`.
    ///
    /// # Arguments
    ///
    /// * `max_requests` - The maximum number of requests allowed within the time window.
    /// * `window` - The length of one window.
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            windows: Arc::new(Mutex::new(HashMap::new())),
            max_requests,
            window,
            stale_after: window,
        }
    }

    pub fn from_config(cfg: &RateLimitConfig) -> Self {
        let window = Duration::from_secs(cfg.window_seconds);
        Self::new(cfg.max_requests, window).with_stale_after(window.saturating_mul(cfg.stale_after_windows.max(1)))
    }

    /// Age after which an untouched window is dropped by [`RateLimiter::sweep`].
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after.max(self.window);
        self
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<IpAddr, RateWindow>> {
        // Entries are plain counters; a panic mid-update cannot leave them inconsistent.
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Checks if a request from a given IP address is allowed and records it.
    pub fn check_rate_limit(&self, ip: IpAddr) -> Result<(), AppError> {
        self.check_at(ip, Instant::now())
    }

    pub(crate) fn check_at(&self, ip: IpAddr, now: Instant) -> Result<(), AppError> {
        let mut windows = self.lock();
        let entry = windows.entry(ip).or_insert(RateWindow { count: 0, started: now });

        // Instant is monotonic; a `now` before `started` only happens with caller-supplied instants
        let elapsed = now.checked_duration_since(entry.started).unwrap_or_default();
        if elapsed >= self.window {
            entry.count = 0;
            entry.started = now;
        }

        if entry.count >= self.max_requests {
            let remaining = self.window.saturating_sub(now.saturating_duration_since(entry.started));
            let retry_after_seconds = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
            return Err(AppError::RateLimited { retry_after_seconds: retry_after_seconds.max(1) });
        }

        entry.count += 1;
        Ok(())
    }

    /// Drops windows that started more than `stale_after` ago. Returns how many were removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let mut windows = self.lock();
        let before = windows.len();
        windows.retain(|_, w| now.checked_duration_since(w.started).map(|d| d < self.stale_after).unwrap_or(true));
        before - windows.len()
    }

    /// Number of clients currently holding a window.
    pub fn tracked_clients(&self) -> usize {
        self.lock().len()
    }
}

/// A background task that periodically sweeps stale windows from a `RateLimiter`.
pub async fn sweep_task(limiter: RateLimiter, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        let removed = limiter.sweep(Instant::now());
        if removed > 0 {
            tracing::debug!(removed, remaining = limiter.tracked_clients(), "rate limiter sweep");
        }
    }
}

/// First stage of the request pipeline: sheds excess traffic before any credential work.
pub async fn rate_limit_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let ip = client_ip(&req, state.config.rate_limit.trust_proxy_headers);

    match state.rate_limiter.check_rate_limit(ip) {
        Ok(()) => {
            state.metrics.inc_admitted();
            next.run(req).await
        }
        Err(err) => {
            state.metrics.inc_rate_limited();
            tracing::warn!(%ip, path = %req.uri().path(), "rate limit exceeded");
            err.into_response()
        }
    }
}
