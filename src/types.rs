use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authenticated caller, carried inside the bearer token and exposed to handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub uuid: Uuid,
    pub name: String,
    pub username: String,
    pub phone_number: String,
    pub email: String,
    /// Lower-cased role code.
    pub role: String,
}

/// Success envelope shared by every handler.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: &'static str,
    pub message: String,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { status: "success", message: "OK".to_string(), data: Some(data), token: None }
    }

    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self { status: "success", message: message.into(), data: None, token: None }
    }
}

// --- users ---

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub username: String,
    pub password: String,
    pub confirm_password: String,
    pub phone_number: String,
    pub email: String,
    pub role_code: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub name: String,
    pub username: String,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
    pub phone_number: String,
    pub email: String,
}

/// `users` joined with `roles`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub uuid: String,
    pub name: String,
    pub username: String,
    pub password: String,
    pub phone_number: String,
    pub email: String,
    pub role_code: String,
}

// --- products ---

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRequest {
    pub code: String,
    pub name: String,
    pub price_buy: i64,
    pub price_sale: i64,
    pub stock: i64,
    pub unit: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub code: Option<String>,
    pub name: Option<String>,
    pub price_buy: Option<i64>,
    pub price_sale: Option<i64>,
    pub stock: Option<i64>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProductDto {
    pub uuid: String,
    pub code: String,
    pub name: String,
    pub price_buy: i64,
    pub price_sale: i64,
    pub stock: i64,
    pub unit: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort_column: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationResult<T: Serialize> {
    pub count: i64,
    pub total_page: i64,
    pub current_page: i64,
    pub per_page: i64,
    pub next_page: Option<i64>,
    pub previous_page: Option<i64>,
    pub data: Vec<T>,
}

impl<T: Serialize> PaginationResult<T> {
    pub fn new(count: i64, page: i64, limit: i64, data: Vec<T>) -> Self {
        let total_page = if limit > 0 { (count + limit - 1) / limit } else { 0 };
        Self {
            count,
            total_page,
            current_page: page,
            per_page: limit,
            next_page: (page < total_page).then_some(page + 1),
            previous_page: (page > 1).then_some(page - 1),
            data,
        }
    }
}
