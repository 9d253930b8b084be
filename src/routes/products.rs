use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{validation, AppError, AppResult, OptionExt};
use crate::middleware::AuthContext;
use crate::state::AppState;
use crate::types::{ApiResponse, PaginationQuery, PaginationResult, ProductDto, ProductRequest, UpdateProductRequest};

const PRODUCT_SELECT: &str = "SELECT uuid, code, name, price_buy, price_sale, stock, unit, created_at, updated_at FROM products";

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;

/// Maps a client-supplied sort column to a SQL column. Anything else falls back to `created_at`.
fn sort_column(raw: Option<&str>) -> &'static str {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some("code") => "code",
        Some("name") => "name",
        Some("pricebuy") | Some("price_buy") => "price_buy",
        Some("pricesale") | Some("price_sale") => "price_sale",
        Some("stock") => "stock",
        Some("unit") => "unit",
        Some("updatedat") | Some("updated_at") => "updated_at",
        _ => "created_at",
    }
}

fn sort_order(raw: Option<&str>) -> &'static str {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some("asc") => "ASC",
        _ => "DESC",
    }
}

fn validate_product(code: &str, name: &str, price_buy: i64, price_sale: i64, stock: i64, unit: &str) -> AppResult<()> {
    validation::validate_required(code, "code")?;
    validation::validate_max_len(code, 50, "code")?;
    validation::validate_required(name, "name")?;
    validation::validate_max_len(name, 200, "name")?;
    validation::validate_non_negative(price_buy, "priceBuy")?;
    validation::validate_non_negative(price_sale, "priceSale")?;
    validation::validate_non_negative(stock, "stock")?;
    validation::validate_required(unit, "unit")?;
    validation::validate_max_len(unit, 20, "unit")?;
    Ok(())
}

async fn find_by_uuid(db: &SqlitePool, raw: &str) -> AppResult<ProductDto> {
    let uuid = Uuid::parse_str(raw).map_err(|_| AppError::BadRequest(format!("invalid uuid '{}'", raw)))?;
    let product = sqlx::query_as::<_, ProductDto>(&format!("{PRODUCT_SELECT} WHERE uuid = ?1"))
        .bind(uuid.to_string())
        .fetch_optional(db)
        .await?;
    product.ok_or_not_found("product")
}

async fn code_taken(db: &SqlitePool, code: &str, except_uuid: Option<&str>) -> AppResult<bool> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM products WHERE code = ?1 AND uuid != ?2")
        .bind(code)
        .bind(except_uuid.unwrap_or(""))
        .fetch_optional(db)
        .await?;
    Ok(row.is_some())
}

/// `GET /api/v1/products`
pub async fn list_products(State(state): State<AppState>) -> AppResult<Json<ApiResponse<Vec<ProductDto>>>> {
    let products = sqlx::query_as::<_, ProductDto>(&format!("{PRODUCT_SELECT} ORDER BY created_at DESC, id DESC"))
        .fetch_all(&state.db)
        .await?;
    Ok(Json(ApiResponse::ok(products)))
}

/// `GET /api/v1/products/pagination?page=&limit=&sortColumn=&sortOrder=`
pub async fn list_products_paginated(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> AppResult<Json<ApiResponse<PaginationResult<ProductDto>>>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let column = sort_column(query.sort_column.as_deref());
    let order = sort_order(query.sort_order.as_deref());

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products").fetch_one(&state.db).await?;

    // column and order come from the whitelists above
    let sql = format!("{PRODUCT_SELECT} ORDER BY {column} {order}, id {order} LIMIT ?1 OFFSET ?2");
    let products = sqlx::query_as::<_, ProductDto>(&sql)
        .bind(limit)
        .bind((page - 1).saturating_mul(limit))
        .fetch_all(&state.db)
        .await?;

    Ok(Json(ApiResponse::ok(PaginationResult::new(count, page, limit, products))))
}

/// `GET /api/v1/products/{uuid}`
pub async fn get_product(State(state): State<AppState>, Path(uuid): Path<String>) -> AppResult<Json<ApiResponse<ProductDto>>> {
    Ok(Json(ApiResponse::ok(find_by_uuid(&state.db, &uuid).await?)))
}

/// `GET /api/v1/products/code/{code}`
pub async fn get_product_by_code(State(state): State<AppState>, Path(code): Path<String>) -> AppResult<Json<ApiResponse<ProductDto>>> {
    let product = sqlx::query_as::<_, ProductDto>(&format!("{PRODUCT_SELECT} WHERE code = ?1"))
        .bind(code.trim())
        .fetch_optional(&state.db)
        .await?
        .ok_or_not_found("product")?;
    Ok(Json(ApiResponse::ok(product)))
}

/// `POST /api/v1/products`
pub async fn create_product(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(req): Json<ProductRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<ProductDto>>)> {
    validate_product(&req.code, &req.name, req.price_buy, req.price_sale, req.stock, &req.unit)?;
    if code_taken(&state.db, req.code.trim(), None).await? {
        return Err(AppError::Conflict("product already exist".to_string()));
    }

    let uuid = Uuid::new_v4().to_string();
    sqlx::query(
        r#"INSERT INTO products (uuid, code, name, price_buy, price_sale, stock, unit)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
    )
    .bind(&uuid)
    .bind(req.code.trim())
    .bind(req.name.trim())
    .bind(req.price_buy)
    .bind(req.price_sale)
    .bind(req.stock)
    .bind(req.unit.trim())
    .execute(&state.db)
    .await?;

    let product = find_by_uuid(&state.db, &uuid).await?;
    tracing::info!(product = %uuid, code = %product.code, by = %ctx.identity.uuid, "product created");
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(product))))
}

/// `PUT /api/v1/products/{uuid}`: absent fields keep their stored value.
pub async fn update_product(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(uuid): Path<String>,
    Json(req): Json<UpdateProductRequest>,
) -> AppResult<Json<ApiResponse<ProductDto>>> {
    let existing = find_by_uuid(&state.db, &uuid).await?;

    let code = req.code.map(|c| c.trim().to_string()).unwrap_or(existing.code.clone());
    let name = req.name.map(|n| n.trim().to_string()).unwrap_or(existing.name.clone());
    let price_buy = req.price_buy.unwrap_or(existing.price_buy);
    let price_sale = req.price_sale.unwrap_or(existing.price_sale);
    let stock = req.stock.unwrap_or(existing.stock);
    let unit = req.unit.map(|u| u.trim().to_string()).unwrap_or(existing.unit.clone());
    validate_product(&code, &name, price_buy, price_sale, stock, &unit)?;

    if code != existing.code && code_taken(&state.db, &code, Some(&existing.uuid)).await? {
        return Err(AppError::Conflict("product already exist".to_string()));
    }

    sqlx::query(
        r#"UPDATE products SET code = ?1, name = ?2, price_buy = ?3, price_sale = ?4, stock = ?5, unit = ?6,
               updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
           WHERE uuid = ?7"#,
    )
    .bind(&code)
    .bind(&name)
    .bind(price_buy)
    .bind(price_sale)
    .bind(stock)
    .bind(&unit)
    .bind(&existing.uuid)
    .execute(&state.db)
    .await?;

    let product = find_by_uuid(&state.db, &existing.uuid).await?;
    tracing::info!(product = %existing.uuid, by = %ctx.identity.uuid, "product updated");
    Ok(Json(ApiResponse::ok(product)))
}

/// `DELETE /api/v1/products/{uuid}`
pub async fn delete_product(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(uuid): Path<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    let existing = find_by_uuid(&state.db, &uuid).await?;
    sqlx::query("DELETE FROM products WHERE uuid = ?1").bind(&existing.uuid).execute(&state.db).await?;
    tracing::info!(product = %existing.uuid, by = %ctx.identity.uuid, "product deleted");
    Ok(Json(ApiResponse::message("product deleted")))
}
