use sqlx::SqlitePool;

use crate::config::SeedConfig;
use crate::password::hash_password;

pub async fn init_db(pool: &SqlitePool) -> anyhow::Result<()> {
    // Pragmas for better durability/performance
    if let Err(e) = sqlx::query("PRAGMA journal_mode=WAL;").execute(pool).await {
        tracing::warn!("Failed to set WAL journal mode: {}", e);
    }
    if let Err(e) = sqlx::query("PRAGMA synchronous=NORMAL;").execute(pool).await {
        tracing::warn!("Failed to set synchronous mode: {}", e);
    }
    // Foreign keys are critical - fail if this doesn't work
    sqlx::query("PRAGMA foreign_keys=ON;").execute(pool).await?;
    if let Err(e) = sqlx::query("PRAGMA busy_timeout=10000;").execute(pool).await {
        tracing::warn!("Failed to set busy_timeout: {}", e);
    }

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS roles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            username TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL,
            phone_number TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            role_id INTEGER NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            FOREIGN KEY(role_id) REFERENCES roles(id) ON DELETE RESTRICT
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT NOT NULL UNIQUE,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            price_buy INTEGER NOT NULL,
            price_sale INTEGER NOT NULL,
            stock INTEGER NOT NULL,
            unit TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
    )
    .execute(pool)
    .await?;

    let indexes = [
        ("idx_users_role", "CREATE INDEX IF NOT EXISTS idx_users_role ON users(role_id)"),
        ("idx_products_created", "CREATE INDEX IF NOT EXISTS idx_products_created ON products(created_at DESC)"),
    ];
    for (name, query) in indexes {
        if let Err(e) = sqlx::query(query).execute(pool).await {
            tracing::warn!("Failed to create index {}: {}", name, e);
        }
    }

    Ok(())
}

/// Seeds the fixed roles and the initial owner account. Idempotent.
pub async fn seed(pool: &SqlitePool, cfg: &SeedConfig) -> anyhow::Result<()> {
    for (code, name) in [("OWNER", "Owner"), ("ADMIN", "Administrator")] {
        sqlx::query("INSERT INTO roles (code, name) VALUES (?1, ?2) ON CONFLICT(code) DO NOTHING")
            .bind(code)
            .bind(name)
            .execute(pool)
            .await?;
        tracing::info!("role {} successfully seeded", code);
    }

    let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE username = ?1")
        .bind(&cfg.owner_username)
        .fetch_optional(pool)
        .await?;
    if exists.is_some() {
        return Ok(());
    }

    let password = hash_password(&cfg.owner_password)?;
    sqlx::query(
        r#"INSERT INTO users (uuid, name, username, password, phone_number, email, role_id)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, (SELECT id FROM roles WHERE code = 'OWNER'))"#,
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(&cfg.owner_name)
    .bind(&cfg.owner_username)
    .bind(password)
    .bind(&cfg.owner_phone)
    .bind(&cfg.owner_email)
    .execute(pool)
    .await?;
    tracing::info!("user {} successfully seeded", cfg.owner_username);

    Ok(())
}
