//! Single-flight token cache.
//!
//! The cache holds at most one token and at most one in-flight refresh. Callers
//! that arrive while a refresh is running await the same shared future, so
//! overlapping callers cause exactly one upstream exchange and all observe its
//! outcome.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::token::Token;
use crate::config::credentials::Credentials;
use crate::error::TokenError;
use crate::helpers::time::now_ms;
use crate::observability::metrics::get_metrics;
use crate::sources::FetchToken;

type PendingToken = Shared<BoxFuture<'static, Result<Arc<Token>, TokenError>>>;

enum CacheState {
    Empty,
    Valid(Arc<Token>),
    Refreshing {
        pending: PendingToken,
        stale: Option<Arc<Token>>,
    },
}

impl CacheState {
    fn fresh_token(&self, now_ms: i64, skew_ms: i64) -> Option<Arc<Token>> {
        match self {
            CacheState::Valid(token) if token.is_fresh(now_ms, skew_ms) => Some(token.clone()),
            _ => None,
        }
    }

    /// The refresh still running, if any. A settled handle left behind by an
    /// aborted refresh task does not count.
    fn in_flight(&self) -> Option<PendingToken> {
        match self {
            CacheState::Refreshing { pending, .. } if pending.peek().is_none() => Some(pending.clone()),
            _ => None,
        }
    }

    fn token(&self) -> Option<Arc<Token>> {
        match self {
            CacheState::Empty => None,
            CacheState::Valid(token) => Some(token.clone()),
            CacheState::Refreshing { stale, .. } => stale.clone(),
        }
    }

    fn take_token(&mut self) -> Option<Arc<Token>> {
        match std::mem::replace(self, CacheState::Empty) {
            CacheState::Empty => None,
            CacheState::Valid(token) => Some(token),
            CacheState::Refreshing { stale, .. } => stale,
        }
    }
}

/// One cache slot. Cloning is cheap and clones share the same state.
#[derive(Clone)]
pub struct TokenCache {
    state: Arc<Mutex<CacheState>>,
    skew_ms: i64,
}

impl TokenCache {
    /// `skew_seconds`: a token is refreshed once `now + skew` reaches its expiry.
    pub fn new(skew_seconds: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState::Empty)),
            skew_ms: i64::try_from(skew_seconds.saturating_mul(1000)).unwrap_or(i64::MAX),
        }
    }

    /// Return a fresh token, joining or starting a refresh when needed.
    ///
    /// Failures are never cached: the next call after a failed refresh starts a
    /// new exchange.
    pub async fn acquire<S: FetchToken>(
        &self,
        source: &S,
        credentials: &Credentials,
    ) -> Result<Arc<Token>, TokenError> {
        let metrics = get_metrics().await;

        let pending = {
            let mut state = self.state.lock().await;

            if let Some(token) = state.fresh_token(now_ms(), self.skew_ms) {
                debug!("serving cached token, expires at {}", token.expires_at);
                metrics.cache_hits.inc();
                return Ok(token);
            }

            match state.in_flight() {
                Some(pending) => {
                    debug!("joining in-flight token refresh");
                    metrics.refresh_joins.inc();
                    pending
                }
                None => {
                    // claimed under the lock: every later caller sees `Refreshing`
                    let stale = state.take_token();
                    info!("starting token refresh, stale token present: {}", stale.is_some());
                    let pending = self.spawn_refresh(source.clone(), credentials.clone());
                    *state = CacheState::Refreshing { pending: pending.clone(), stale };
                    pending
                }
            }
        };

        pending.await
    }

    /// Currently stored token without triggering a refresh. May be stale.
    pub async fn peek(&self) -> Option<Arc<Token>> {
        self.state.lock().await.token()
    }

    /// True when the slot holds neither a token nor a running refresh.
    pub async fn is_empty(&self) -> bool {
        matches!(*self.state.lock().await, CacheState::Empty)
    }

    /// Run the exchange on its own task so a caller that goes away does not
    /// cancel it for the others attached to the same handle.
    fn spawn_refresh<S: FetchToken>(&self, source: S, credentials: Credentials) -> PendingToken {
        let state = self.state.clone();
        let task = tokio::spawn(async move {
            let result = source.fetch_token(&credentials).await.map(Arc::new);

            let mut state = state.lock().await;
            let stale = state.take_token();
            *state = match &result {
                Ok(token) => CacheState::Valid(token.clone()),
                // expired or inside the skew window: the next caller refreshes again
                Err(_) => stale.map(CacheState::Valid).unwrap_or(CacheState::Empty),
            };
            result
        });

        async move {
            task.await.unwrap_or_else(|e| {
                warn!("token refresh task did not complete: {}", e);
                Err(TokenError::Transport(format!("token refresh aborted: {}", e)))
            })
        }
        .boxed()
        .shared()
    }
}
