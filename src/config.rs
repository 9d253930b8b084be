use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Secrets and token lifetime. Read-only after startup.
#[derive(Clone, Deserialize)]
pub struct SecurityConfig {
    pub signature_key: String,
    pub jwt_secret: String,
    pub jwt_expiration_minutes: u64,
    /// Maximum allowed distance between `x-request-at` and server time. Unset keeps the
    /// proof timestamp unchecked.
    pub signature_max_skew_seconds: Option<u64>,
}

// Secrets never end up in logs through `{:?}`.
impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("signature_key", &"<redacted>")
            .field("jwt_secret", &"<redacted>")
            .field("jwt_expiration_minutes", &self.jwt_expiration_minutes)
            .field("signature_max_skew_seconds", &self.signature_max_skew_seconds)
            .finish()
    }
}

impl SecurityConfig {
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.jwt_expiration_minutes.saturating_mul(60))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_seconds: u64,
    pub sweep_interval_seconds: u64,
    /// Windows older than this many window lengths are dropped by the sweeper.
    pub stale_after_windows: u32,
    /// Honour `x-forwarded-for` / `x-real-ip` when keying clients.
    pub trust_proxy_headers: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedConfig {
    pub owner_username: String,
    pub owner_password: String,
    pub owner_name: String,
    pub owner_email: String,
    pub owner_phone: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub rate_limit: RateLimitConfig,
    pub seed: SeedConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        // Fallback: parse the embedded default TOML
        let defaults: &str = include_str!("../config/default.toml");
        match ::config::Config::builder()
            .add_source(::config::File::from_str(defaults, ::config::FileFormat::Toml))
            .build()
        {
            Ok(cfg) => match cfg.try_deserialize() {
                Ok(app_cfg) => app_cfg,
                Err(e) => panic!("Failed to deserialize default config: {}", e),
            },
            Err(e) => panic!("Failed to parse default config: {}", e),
        }
    }
}

pub fn load() -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();

    let defaults: &str = include_str!("../config/default.toml");
    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(defaults, ::config::FileFormat::Toml))
        // Optional local file: pos-backend.toml (in CWD)
        .add_source(::config::File::with_name("pos-backend").required(false));

    if let Ok(custom_path) = std::env::var("POS_BACKEND_CONFIG") {
        builder = builder.add_source(::config::File::with_name(&custom_path).required(false));
    }
    // Environment variables last to have highest precedence
    builder = builder.add_source(::config::Environment::with_prefix("POS_BACKEND").separator("__"));

    let cfg = builder.build()?;
    let app_cfg: AppConfig = cfg.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

pub fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    if cfg.server.port == 0 {
        return Err(anyhow::anyhow!("invalid server.port: {}", cfg.server.port));
    }
    #[cfg(unix)]
    if cfg.server.port < 1024 {
        tracing::warn!("Using privileged port {} - may require elevated permissions", cfg.server.port);
    }

    if cfg.database.max_connections == 0 {
        return Err(anyhow::anyhow!("database.max_connections must be > 0"));
    }

    if cfg.security.jwt_secret.trim().is_empty() {
        return Err(anyhow::anyhow!("security.jwt_secret is required"));
    }
    if cfg.security.jwt_expiration_minutes == 0 {
        return Err(anyhow::anyhow!("security.jwt_expiration_minutes must be > 0"));
    }
    if cfg.security.signature_key.is_empty() {
        tracing::warn!("security.signature_key is empty - request proofs only cover service name and timestamp");
    }

    if cfg.rate_limit.max_requests == 0 {
        return Err(anyhow::anyhow!("rate_limit.max_requests must be > 0"));
    }
    if cfg.rate_limit.window_seconds == 0 {
        return Err(anyhow::anyhow!("rate_limit.window_seconds must be > 0"));
    }
    if cfg.rate_limit.stale_after_windows == 0 {
        return Err(anyhow::anyhow!("rate_limit.stale_after_windows must be >= 1"));
    }
    if cfg.rate_limit.sweep_interval_seconds == 0 {
        return Err(anyhow::anyhow!("rate_limit.sweep_interval_seconds must be > 0"));
    }

    Ok(())
}

pub fn ensure_sqlite_parent_dir(url: &str) -> anyhow::Result<()> {
    if let Some(path) = url.strip_prefix("sqlite://") {
        let path = path.split('?').next().unwrap_or(path);
        let p = Path::new(path);
        if let Some(parent) = p.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }
    Ok(())
}
