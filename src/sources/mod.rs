//! Upstream token sources.
//!
//! A source performs exactly one exchange per call; caching and coordination
//! of concurrent callers live in [`crate::cache`].

use std::future::Future;

use crate::cache::token::Token;
use crate::config::credentials::Credentials;
use crate::error::TokenError;

pub mod oauth2;

pub use oauth2::OAuth2Source;

pub trait FetchToken: Clone + Send + Sync + 'static {
    /// Perform one upstream exchange for `credentials`.
    fn fetch_token(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<Token, TokenError>> + Send;
}
