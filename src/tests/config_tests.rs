#[cfg(test)]
mod tests {
    use std::env;
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::config::{self, AppConfig};

    // Tests touching process environment must not interleave.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_KEYS: [&str; 5] = [
        "POS_BACKEND__SECURITY__JWT_SECRET",
        "POS_BACKEND__SERVER__PORT",
        "POS_BACKEND__RATE_LIMIT__MAX_REQUESTS",
        "POS_BACKEND__RATE_LIMIT__TRUST_PROXY_HEADERS",
        "POS_BACKEND__SECURITY__SIGNATURE_MAX_SKEW_SECONDS",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            env::remove_var(key);
        }
    }

    fn valid() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.security.jwt_secret = "secret".to_string();
        cfg
    }

    #[test]
    fn test_default_config() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.server.port, 8085);
        assert_eq!(cfg.database.url, "sqlite://data/pos-backend.db");
        assert_eq!(cfg.security.jwt_expiration_minutes, 1440);
        assert_eq!(cfg.security.signature_max_skew_seconds, None);
        assert_eq!(cfg.rate_limit.max_requests, 1000);
        assert_eq!(cfg.rate_limit.window_seconds, 60);
        assert!(!cfg.rate_limit.trust_proxy_headers);
        assert_eq!(cfg.seed.owner_username, "owner");
    }

    #[test]
    fn test_token_ttl_from_minutes() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.security.token_ttl(), Duration::from_secs(1440 * 60));
    }

    #[test]
    fn test_security_debug_redacts_secrets() {
        let mut cfg = valid();
        cfg.security.signature_key = "very-secret-key".to_string();
        let printed = format!("{:?}", cfg.security);
        assert!(!printed.contains("very-secret-key"));
        assert!(!printed.contains("\"secret\""));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(config::validate(&valid()).is_ok());

        let mut cfg = valid();
        cfg.server.port = 0;
        assert!(config::validate(&cfg).unwrap_err().to_string().contains("invalid server.port"));

        let mut cfg = valid();
        cfg.security.jwt_secret = "  ".to_string();
        assert!(config::validate(&cfg).unwrap_err().to_string().contains("jwt_secret"));

        let mut cfg = valid();
        cfg.security.jwt_expiration_minutes = 0;
        assert!(config::validate(&cfg).is_err());

        let mut cfg = valid();
        cfg.rate_limit.max_requests = 0;
        assert!(config::validate(&cfg).unwrap_err().to_string().contains("max_requests"));

        let mut cfg = valid();
        cfg.rate_limit.window_seconds = 0;
        assert!(config::validate(&cfg).is_err());

        let mut cfg = valid();
        cfg.database.max_connections = 0;
        assert!(config::validate(&cfg).is_err());
    }

    #[test]
    fn test_load_requires_jwt_secret() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        let err = config::load().unwrap_err();
        assert!(err.to_string().contains("jwt_secret"));
    }

    #[test]
    fn test_load_from_env() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        env::set_var("POS_BACKEND__SECURITY__JWT_SECRET", "from-env");
        env::set_var("POS_BACKEND__SERVER__PORT", "3000");
        env::set_var("POS_BACKEND__RATE_LIMIT__MAX_REQUESTS", "5");
        env::set_var("POS_BACKEND__RATE_LIMIT__TRUST_PROXY_HEADERS", "true");
        env::set_var("POS_BACKEND__SECURITY__SIGNATURE_MAX_SKEW_SECONDS", "120");

        let cfg = config::load();
        clear_env();
        let cfg = cfg.unwrap();

        assert_eq!(cfg.security.jwt_secret, "from-env");
        assert_eq!(cfg.server.port, 3000);
        assert_eq!(cfg.rate_limit.max_requests, 5);
        assert!(cfg.rate_limit.trust_proxy_headers);
        assert_eq!(cfg.security.signature_max_skew_seconds, Some(120));
        // untouched keys keep their defaults
        assert_eq!(cfg.rate_limit.window_seconds, 60);
    }

    #[test]
    fn test_load_rejects_invalid_env_value() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        env::set_var("POS_BACKEND__SECURITY__JWT_SECRET", "from-env");
        env::set_var("POS_BACKEND__RATE_LIMIT__MAX_REQUESTS", "0");
        let result = config::load();
        clear_env();
        assert!(result.unwrap_err().to_string().contains("max_requests"));
    }

    #[test]
    fn test_ensure_sqlite_parent_dir_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("pos.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        config::ensure_sqlite_parent_dir(&url).unwrap();
        assert!(dir.path().join("nested").is_dir());

        // non-sqlite urls are left alone
        config::ensure_sqlite_parent_dir("postgres://localhost/pos").unwrap();
    }
}
