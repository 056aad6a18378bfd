// tests/common/mod.rs
pub use axum::Router;
pub use tokio::task::JoinHandle;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::post;
use reqwest::Client;

use crate::cache::token::Token;
use crate::config::credentials::Credentials;
use crate::error::TokenError;
use crate::helpers::time::now_ms;
use crate::sources::FetchToken;

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

pub fn build_reqwest_client() -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .expect("reqwest client")
}

pub fn test_credentials() -> Credentials {
    Credentials::try_new(Some("https://login.example.com"), Some("client"), Some("secret"), "test")
        .expect("valid test credentials")
}

/// Token endpoint stub: answers every exchange with `status` / `body` after `delay`
/// and counts the calls it receives.
pub struct UpstreamStub {
    pub handle: JoinHandle<()>,
    pub addr: SocketAddr,
    calls: Arc<AtomicUsize>,
    reply: Arc<Mutex<(StatusCode, String)>>,
}

impl UpstreamStub {
    pub async fn start(status: StatusCode, body: &str, delay: Duration) -> Self {
        let calls = Arc::new(AtomicUsize::new(0));
        let reply = Arc::new(Mutex::new((status, body.to_owned())));

        let (counter, current) = (calls.clone(), reply.clone());
        let router = Router::new().route(
            "/services/oauth2/token",
            post(move || {
                let (counter, current) = (counter.clone(), current.clone());
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(delay).await;
                    current.lock().unwrap().clone()
                }
            }),
        );
        let (handle, addr) = spawn_axum(router).await;
        Self { handle, addr, calls, reply }
    }

    pub fn instance_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reply_with(&self, status: StatusCode, body: &str) {
        *self.reply.lock().unwrap() = (status, body.to_owned());
    }
}

impl Drop for UpstreamStub {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// In-process [`FetchToken`] with a swappable outcome and a call counter.
#[derive(Clone)]
pub struct ScriptedSource {
    calls: Arc<AtomicUsize>,
    outcome: Arc<Mutex<Result<(String, i64), TokenError>>>,
    delay: Duration,
}

impl ScriptedSource {
    pub fn ok(access_token: &str, expires_in_secs: i64) -> Self {
        Self::with_outcome(Ok((access_token.to_owned(), expires_in_secs)))
    }

    pub fn failing(err: TokenError) -> Self {
        Self::with_outcome(Err(err))
    }

    fn with_outcome(outcome: Result<(String, i64), TokenError>) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            outcome: Arc::new(Mutex::new(outcome)),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn succeed_with(&self, access_token: &str, expires_in_secs: i64) {
        *self.outcome.lock().unwrap() = Ok((access_token.to_owned(), expires_in_secs));
    }

    pub fn fail_with(&self, err: TokenError) {
        *self.outcome.lock().unwrap() = Err(err);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FetchToken for ScriptedSource {
    async fn fetch_token(&self, _credentials: &Credentials) -> Result<Token, TokenError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let outcome = self.outcome.lock().unwrap().clone();
        let now = now_ms();
        outcome.map(|(access_token, expires_in_secs)| Token {
            access_token,
            token_type: "Bearer".to_owned(),
            issued_at: now,
            expires_at: now + expires_in_secs * 1000,
        })
    }
}
