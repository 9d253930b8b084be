use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{validation, AppError, AppResult, OptionExt};
use crate::middleware::AuthContext;
use crate::password::{hash_password, verify_password};
use crate::routes::OWNER_ROLE;
use crate::state::AppState;
use crate::types::{ApiResponse, Identity, LoginRequest, RegisterRequest, UpdateUserRequest, UserRow};

const USER_SELECT: &str = "SELECT u.id, u.uuid, u.name, u.username, u.password, u.phone_number, u.email, r.code AS role_code \
     FROM users u JOIN roles r ON r.id = u.role_id";

const INVALID_LOGIN: &str = "invalid username or password";

fn to_identity(row: &UserRow) -> AppResult<Identity> {
    let uuid = Uuid::parse_str(&row.uuid).map_err(|e| AppError::Internal(anyhow::anyhow!("corrupt user uuid {}: {}", row.uuid, e)))?;
    Ok(Identity {
        uuid,
        name: row.name.clone(),
        username: row.username.clone(),
        phone_number: row.phone_number.clone(),
        email: row.email.clone(),
        role: row.role_code.to_lowercase(),
    })
}

fn parse_uuid(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest(format!("invalid uuid '{}'", raw)))
}

async fn find_by_uuid(db: &SqlitePool, uuid: &Uuid) -> AppResult<Option<UserRow>> {
    let row = sqlx::query_as::<_, UserRow>(&format!("{USER_SELECT} WHERE u.uuid = ?1"))
        .bind(uuid.to_string())
        .fetch_optional(db)
        .await?;
    Ok(row)
}

/// Returns true when `column` already holds `value` for a user other than `except_id`.
async fn taken(db: &SqlitePool, column: &str, value: &str, except_id: Option<i64>) -> AppResult<bool> {
    let sql = match column {
        "username" => "SELECT id FROM users WHERE username = ?1 AND id != ?2",
        _ => "SELECT id FROM users WHERE email = ?1 AND id != ?2",
    };
    let row: Option<(i64,)> = sqlx::query_as(sql).bind(value).bind(except_id.unwrap_or(-1)).fetch_optional(db).await?;
    Ok(row.is_some())
}

async fn hash_blocking(password: String) -> AppResult<String> {
    let hashed = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(e.into()))??;
    Ok(hashed)
}

fn validate_profile(name: &str, username: &str, phone_number: &str, email: &str) -> AppResult<()> {
    validation::validate_required(name, "name")?;
    validation::validate_max_len(name, 100, "name")?;
    validation::validate_required(username, "username")?;
    validation::validate_max_len(username, 50, "username")?;
    validation::validate_required(phone_number, "phoneNumber")?;
    validation::validate_max_len(phone_number, 20, "phoneNumber")?;
    validation::validate_email(email, "email")?;
    Ok(())
}

fn check_confirmation(password: &str, confirm: &str) -> AppResult<()> {
    validation::validate_required(password, "password")?;
    if password != confirm {
        return Err(AppError::BadRequest("password and confirm password do not match".to_string()));
    }
    Ok(())
}

/// `POST /api/v1/auth/login`
pub async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> AppResult<Json<ApiResponse<Identity>>> {
    validation::validate_required(&req.username, "username")?;
    validation::validate_required(&req.password, "password")?;

    let row = sqlx::query_as::<_, UserRow>(&format!("{USER_SELECT} WHERE u.username = ?1"))
        .bind(req.username.trim())
        .fetch_optional(&state.db)
        .await?;
    let Some(row) = row else {
        tracing::info!(username = %req.username, "login rejected: unknown user");
        return Err(AppError::Unauthorized(INVALID_LOGIN.to_string()));
    };

    let hash = row.password.clone();
    let password = req.password;
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AppError::Internal(e.into()))?;
    if !valid {
        tracing::info!(username = %row.username, "login rejected: wrong password");
        return Err(AppError::Unauthorized(INVALID_LOGIN.to_string()));
    }

    let identity = to_identity(&row)?;
    let token = state.pipeline.tokens().issue(&identity)?;
    tracing::info!(user = %identity.uuid, role = %identity.role, "login succeeded");
    Ok(Json(ApiResponse::ok(identity).with_token(token)))
}

/// `POST /api/v1/auth/register`, owner only.
pub async fn register(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(req): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Identity>>)> {
    validate_profile(&req.name, &req.username, &req.phone_number, &req.email)?;
    check_confirmation(&req.password, &req.confirm_password)?;
    validation::validate_required(&req.role_code, "roleCode")?;

    let role: Option<(i64,)> = sqlx::query_as("SELECT id FROM roles WHERE code = UPPER(?1)")
        .bind(req.role_code.trim())
        .fetch_optional(&state.db)
        .await?;
    let (role_id,) = role.ok_or_else(|| AppError::BadRequest(format!("role '{}' not found", req.role_code)))?;

    if taken(&state.db, "username", req.username.trim(), None).await? {
        return Err(AppError::Conflict("username already exist".to_string()));
    }
    if taken(&state.db, "email", req.email.trim(), None).await? {
        return Err(AppError::Conflict("email already exist".to_string()));
    }

    let hashed = hash_blocking(req.password).await?;
    let uuid = Uuid::new_v4();
    sqlx::query(
        r#"INSERT INTO users (uuid, name, username, password, phone_number, email, role_id)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
    )
    .bind(uuid.to_string())
    .bind(req.name.trim())
    .bind(req.username.trim())
    .bind(hashed)
    .bind(req.phone_number.trim())
    .bind(req.email.trim())
    .bind(role_id)
    .execute(&state.db)
    .await?;

    let row = find_by_uuid(&state.db, &uuid).await?.ok_or_not_found("user")?;
    let identity = to_identity(&row)?;
    tracing::info!(user = %identity.uuid, by = %ctx.identity.uuid, "user registered");
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(identity))))
}

/// `GET /api/v1/auth/user`: the caller's profile, read fresh from the store.
pub async fn get_user_login(State(state): State<AppState>, ctx: AuthContext) -> AppResult<Json<ApiResponse<Identity>>> {
    let row = find_by_uuid(&state.db, &ctx.identity.uuid).await?.ok_or_not_found("user")?;
    Ok(Json(ApiResponse::ok(to_identity(&row)?)))
}

/// `GET /api/v1/auth/{uuid}`
pub async fn get_user_by_uuid(State(state): State<AppState>, Path(uuid): Path<String>) -> AppResult<Json<ApiResponse<Identity>>> {
    let uuid = parse_uuid(&uuid)?;
    let row = find_by_uuid(&state.db, &uuid).await?.ok_or_not_found("user")?;
    Ok(Json(ApiResponse::ok(to_identity(&row)?)))
}

/// `PUT /api/v1/auth/{uuid}`: callers may update themselves; owners may update anyone.
pub async fn update_user(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(uuid): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> AppResult<Json<ApiResponse<Identity>>> {
    let uuid = parse_uuid(&uuid)?;
    if ctx.identity.uuid != uuid && ctx.identity.role != OWNER_ROLE {
        return Err(AppError::Forbidden { role: ctx.identity.role.clone(), required_roles: vec![OWNER_ROLE.to_string()] });
    }

    validate_profile(&req.name, &req.username, &req.phone_number, &req.email)?;
    let existing = find_by_uuid(&state.db, &uuid).await?.ok_or_not_found("user")?;

    if taken(&state.db, "username", req.username.trim(), Some(existing.id)).await? {
        return Err(AppError::Conflict("username already exist".to_string()));
    }
    if taken(&state.db, "email", req.email.trim(), Some(existing.id)).await? {
        return Err(AppError::Conflict("email already exist".to_string()));
    }

    let hashed = match req.password {
        Some(password) if !password.is_empty() => {
            check_confirmation(&password, req.confirm_password.as_deref().unwrap_or_default())?;
            Some(hash_blocking(password).await?)
        }
        _ => None,
    };

    sqlx::query(
        r#"UPDATE users SET name = ?1, username = ?2, phone_number = ?3, email = ?4,
               password = COALESCE(?5, password),
               updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
           WHERE id = ?6"#,
    )
    .bind(req.name.trim())
    .bind(req.username.trim())
    .bind(req.phone_number.trim())
    .bind(req.email.trim())
    .bind(hashed)
    .bind(existing.id)
    .execute(&state.db)
    .await?;

    let row = find_by_uuid(&state.db, &uuid).await?.ok_or_not_found("user")?;
    tracing::info!(user = %uuid, by = %ctx.identity.uuid, "user updated");
    Ok(Json(ApiResponse::ok(to_identity(&row)?)))
}
