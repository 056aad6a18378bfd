//! # Token Relay Library
//!
//! Fetches an OAuth2 client-credentials access token from a token endpoint,
//! caches it, and serves it over HTTP so browser-side callers never see the
//! client secret.
//!
//! Modules:
//! - `cache` — single-flight token cache and its slots
//! - `sources` — upstream token exchange
//! - `parser` — token endpoint response parsing
//! - `server` — axum routes for both credential variants
//! - `config` — service configuration and credentials

pub mod cache;
pub mod config;
pub mod error;
pub mod helpers;
pub mod observability;
pub mod parser;
pub mod server;
pub mod sources;
pub mod utils;

#[cfg(test)]
mod tests;

pub use crate::cache::token::Token;
pub use crate::cache::token_cache::TokenCache;
pub use crate::config::settings::ServiceConfig;
pub use crate::error::TokenError;
