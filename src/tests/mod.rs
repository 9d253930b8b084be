//! Integration tests for the POS backend.
//!
//! - **support**: shared fixture (temp SQLite database, seeded owner, signed request helpers)
//! - **api_tests**: end-to-end requests through the full router and security pipeline
//! - **config_tests**: configuration defaults, layering and validation
//! - **error_tests**: error mapping and response bodies

pub mod config_tests;
pub mod support;
