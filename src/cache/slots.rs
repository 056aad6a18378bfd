use std::collections::HashMap;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::cache::token::Token;
use crate::cache::token_cache::TokenCache;
use crate::config::credentials::Credentials;
use crate::config::settings::{CacheConfig, CacheScope};
use crate::error::TokenError;
use crate::sources::FetchToken;

/// Hands out the [`TokenCache`] a credential set should use.
///
/// With [`CacheScope::Shared`] every caller gets the same slot, so callers
/// sending different credentials share one token. [`CacheScope::PerCredentials`]
/// isolates them, keyed by a digest of the credentials. A keyed slot that ends
/// a failed exchange without a token is dropped, so rejected credential sets
/// do not accumulate.
pub struct CacheSlots {
    scope: CacheScope,
    skew_seconds: u64,
    shared: TokenCache,
    keyed: Mutex<HashMap<String, TokenCache>>,
}

impl CacheSlots {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            scope: config.scope,
            skew_seconds: config.skew_seconds,
            shared: TokenCache::new(config.skew_seconds),
            keyed: Mutex::new(HashMap::new()),
        }
    }

    pub fn scope(&self) -> CacheScope {
        self.scope
    }

    pub async fn slot(&self, credentials: &Credentials) -> TokenCache {
        match self.scope {
            CacheScope::Shared => self.shared.clone(),
            CacheScope::PerCredentials => {
                let key = slot_key(credentials);
                let mut keyed = self.keyed.lock().await;
                keyed
                    .entry(key)
                    .or_insert_with_key(|key| {
                        debug!("new cache slot {} for {}", key, credentials.instance_url());
                        TokenCache::new(self.skew_seconds)
                    })
                    .clone()
            }
        }
    }

    /// [`TokenCache::acquire`] on the slot for `credentials`.
    pub async fn acquire<S: FetchToken>(
        &self,
        source: &S,
        credentials: &Credentials,
    ) -> Result<Arc<Token>, TokenError> {
        let result = self.slot(credentials).await.acquire(source, credentials).await;
        if result.is_err() && self.scope == CacheScope::PerCredentials {
            self.release(credentials).await;
        }
        result
    }

    /// Number of per-credential slots currently held.
    pub async fn keyed_len(&self) -> usize {
        self.keyed.lock().await.len()
    }

    async fn release(&self, credentials: &Credentials) {
        let key = slot_key(credentials);
        let mut keyed = self.keyed.lock().await;
        let Some(cache) = keyed.get(&key) else {
            return;
        };
        // a refresh started by another caller keeps the slot
        if cache.is_empty().await {
            debug!("dropping cache slot {} after failed exchange", key);
            keyed.remove(&key);
        }
    }
}

/// Digest of the credential identity; the secret never appears in clear text.
fn slot_key(credentials: &Credentials) -> String {
    let mut hasher = Sha256::new();
    for part in [credentials.instance_url(), credentials.client_id(), credentials.client_secret()] {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::common::ScriptedSource;

    fn creds(client_id: &str) -> Credentials {
        Credentials::try_new(Some("https://x.example.com"), Some(client_id), Some("secret"), "test").unwrap()
    }

    fn config(scope: CacheScope) -> CacheConfig {
        CacheConfig { scope, ..CacheConfig::default() }
    }

    #[tokio::test]
    async fn test_shared_scope_conflates_credentials() {
        let slots = CacheSlots::new(&config(CacheScope::Shared));
        let source = ScriptedSource::ok("tok-a", 60);

        let a = slots.slot(&creds("a")).await.acquire(&source, &creds("a")).await.unwrap();
        let b = slots.slot(&creds("b")).await.acquire(&source, &creds("b")).await.unwrap();

        assert_eq!(b.access_token, a.access_token);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_per_credentials_scope_isolates_tokens() {
        let slots = CacheSlots::new(&config(CacheScope::PerCredentials));
        let source = ScriptedSource::ok("tok-a", 60);

        slots.slot(&creds("a")).await.acquire(&source, &creds("a")).await.unwrap();
        source.succeed_with("tok-b", 60);
        let b = slots.slot(&creds("b")).await.acquire(&source, &creds("b")).await.unwrap();
        let a_again = slots.slot(&creds("a")).await.acquire(&source, &creds("a")).await.unwrap();

        assert_eq!(b.access_token, "tok-b");
        assert_eq!(a_again.access_token, "tok-a");
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_rejected_credentials_do_not_keep_slots() {
        let slots = CacheSlots::new(&config(CacheScope::PerCredentials));
        let source = ScriptedSource::failing(TokenError::UpstreamRejected {
            status: 401,
            body: "invalid_client".to_owned(),
        });

        for i in 0..5000 {
            let secret = format!("secret-{}", i);
            let creds = Credentials::try_new(Some("https://x.example.com"), Some("a"), Some(&secret), "test").unwrap();
            slots.acquire(&source, &creds).await.unwrap_err();
        }

        assert_eq!(source.calls(), 5000);
        assert_eq!(slots.keyed_len().await, 0);
    }

    #[tokio::test]
    async fn test_successful_credentials_keep_their_slot() {
        let slots = CacheSlots::new(&config(CacheScope::PerCredentials));
        let source = ScriptedSource::ok("tok-a", 60);

        slots.acquire(&source, &creds("a")).await.unwrap();
        source.fail_with(TokenError::MalformedResponse);
        slots.acquire(&source, &creds("b")).await.unwrap_err();
        let a_again = slots.acquire(&source, &creds("a")).await.unwrap();

        assert_eq!(a_again.access_token, "tok-a");
        assert_eq!(slots.keyed_len().await, 1);
        assert_eq!(source.calls(), 2);
    }

    #[test]
    fn slot_key_does_not_leak_secret() {
        let key = slot_key(&creds("a"));
        assert!(!key.contains("secret"));
        assert_ne!(key, slot_key(&creds("b")));
    }
}
