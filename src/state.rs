use std::sync::Arc;

use crate::config::AppConfig;
use crate::metrics::Metrics;
use crate::middleware::{GuardState, Pipeline, RateLimiter, RouteGuard};

/// The shared application state.
///
/// Everything security-related is built once from the configuration snapshot; the only
/// mutable part is the rate limiter's window map.
#[derive(Clone)]
pub struct AppState {
    /// The database connection pool.
    pub db: sqlx::SqlitePool,
    /// Immutable configuration snapshot.
    pub config: Arc<AppConfig>,
    /// Token and signature verifiers.
    pub pipeline: Arc<Pipeline>,
    /// Per-client request quota.
    pub rate_limiter: RateLimiter,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(db: sqlx::SqlitePool, config: AppConfig) -> Self {
        let pipeline = Pipeline::from_config(&config.security);
        let rate_limiter = RateLimiter::from_config(&config.rate_limit);

        Self {
            db,
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            rate_limiter,
            metrics: Metrics::new(),
        }
    }

    /// Middleware state for a group of routes sharing `guard`.
    pub fn guard(&self, guard: RouteGuard) -> GuardState {
        GuardState { pipeline: self.pipeline.clone(), guard, metrics: self.metrics.clone() }
    }
}
