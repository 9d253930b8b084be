//! The request-security pipeline.
//!
//! Stages, outermost first: [`failure`] (panic boundary), [`rate_limit`] (per-IP quota),
//! then per route through [`guard`]: [`token`] (bearer JWT), [`signature`] (shared-secret
//! request proof) and [`role`] (allow-list). [`ip`] resolves the rate-limit key.

pub mod failure;
pub mod guard;
pub mod ip;
pub mod rate_limit;
pub mod role;
pub mod signature;
pub mod token;

pub use guard::{GuardState, Pipeline, RouteGuard};
pub use rate_limit::RateLimiter;
pub use role::AllowedRoles;
pub use token::AuthContext;
