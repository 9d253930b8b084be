//! # POS Backend Library
//!
//! Core library for the point-of-sale backend: user accounts with roles, a product catalogue,
//! and the request security pipeline that guards both.
//!
//! ## Architecture
//!
//! The application is built using:
//! - **Axum**: HTTP server, routing and middleware
//! - **SQLx**: Asynchronous database operations with SQLite
//! - **Tokio**: Async runtime
//! - **jsonwebtoken / sha2 / subtle**: bearer tokens and request signatures
//!
//! ## Core Components
//!
//! - [`config`]: Layered configuration (embedded defaults, file, environment)
//! - [`db`]: Schema initialization and seed data
//! - [`error`]: Centralized error handling and HTTP error responses
//! - [`metrics`]: Pipeline counters
//! - [`middleware`]: Failure boundary, rate limiter, signature and token verification, role checks
//! - [`password`]: Argon2 password hashing
//! - [`routes`]: HTTP API endpoint handlers
//! - [`state`]: Shared application state
//! - [`types`]: Data transfer objects and shared type definitions
//!
//! ## Request pipeline
//!
//! Every request passes the failure boundary and the per-client rate limiter. Routes then
//! declare their own guard: public, authenticated (bearer token plus request signature), or
//! role-gated (authenticated plus a role allow-list).

pub mod config;
pub mod db;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod password;
pub mod routes;
pub mod state;
pub mod types;

#[cfg(test)]
mod tests;
