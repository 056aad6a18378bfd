use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use tracing::{debug, error, info};

use crate::cache::token::Token;
use crate::config::credentials::Credentials;
use crate::config::settings::SettingsConfig;
use crate::error::TokenError;
use crate::helpers::time::{get_instant, now_ms};
use crate::observability::metrics::get_metrics;
use crate::parser::parser::parse_token_response;
use crate::sources::FetchToken;

const GRANT_TYPE: &str = "client_credentials";

/// Client-credentials exchange against `{instance_url}/services/oauth2/token`.
#[derive(Debug, Clone)]
pub struct OAuth2Source {
    client: Client,
    timeout_ms: u64,
    default_expires_in_secs: u64,
}

impl OAuth2Source {
    pub fn new(timeout_ms: u64, default_expires_in_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;
        Ok(Self { client, timeout_ms, default_expires_in_secs })
    }

    pub fn from_settings(settings: &SettingsConfig) -> Result<Self> {
        Self::new(settings.upstream.timeout_ms, settings.cache.default_expires_in_seconds)
    }

    async fn exchange(&self, credentials: &Credentials) -> Result<Token, TokenError> {
        let url = credentials.token_url();
        debug!("requesting token from {}", url);

        let response = self
            .client
            .post(&url)
            .form(&[
                ("grant_type", GRANT_TYPE),
                ("client_id", credentials.client_id()),
                ("client_secret", credentials.client_secret()),
            ])
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.map_transport_error(e))?;
        if !status.is_success() {
            return Err(TokenError::UpstreamRejected { status: status.as_u16(), body });
        }

        parse_token_response(&body, now_ms(), self.default_expires_in_secs)
    }

    fn map_transport_error(&self, err: reqwest::Error) -> TokenError {
        if err.is_timeout() {
            TokenError::Timeout(self.timeout_ms)
        } else {
            TokenError::Transport(err.to_string())
        }
    }
}

impl FetchToken for OAuth2Source {
    async fn fetch_token(&self, credentials: &Credentials) -> Result<Token, TokenError> {
        let metrics = get_metrics().await;
        let start = get_instant();
        metrics.upstream_fetch_requests.inc();

        let result = self.exchange(credentials).await;
        metrics.upstream_fetch_duration.observe(start.elapsed().as_secs_f64());

        match &result {
            Ok(token) => {
                info!(
                    "token fetched from {}, expires at {}",
                    credentials.instance_url(),
                    token.expires_at
                );
                metrics.token_expiry_unix.set(token.expires_at / 1000);
            }
            Err(e) => {
                error!(reason = e.reason(), "token fetch from {} failed: {}", credentials.instance_url(), e);
                metrics.upstream_fetch_failures.with_label_values(&[e.reason()]).inc();
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::common::spawn_axum;
    use axum::{routing::post, Router};
    use httpmock::prelude::*;
    use std::time::Duration;

    fn credentials(instance_url: &str) -> Credentials {
        Credentials::try_new(Some(instance_url), Some("my-id"), Some("my-secret"), "test").unwrap()
    }

    #[tokio::test]
    async fn test_posts_client_credentials_form() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/services/oauth2/token")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .form_urlencoded_tuple("grant_type", "client_credentials")
                    .form_urlencoded_tuple("client_id", "my-id")
                    .form_urlencoded_tuple("client_secret", "my-secret");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"access_token":"tok1","token_type":"Bearer","expires_in":60}"#);
            })
            .await;

        let source = OAuth2Source::new(2_000, 300).unwrap();
        let before = now_ms();
        let token = source.fetch_token(&credentials(&server.base_url())).await.unwrap();

        mock.assert_async().await;
        assert_eq!(token.access_token, "tok1");
        assert!(token.expires_at >= before + 60_000);
        assert!(token.expires_at <= now_ms() + 60_000);
    }

    #[tokio::test]
    async fn test_rejection_carries_status_and_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/services/oauth2/token");
                then.status(401).body("invalid_client");
            })
            .await;

        let source = OAuth2Source::new(2_000, 300).unwrap();
        let err = source.fetch_token(&credentials(&server.base_url())).await.unwrap_err();

        assert_eq!(
            err,
            TokenError::UpstreamRejected { status: 401, body: "invalid_client".to_owned() }
        );
    }

    #[tokio::test]
    async fn test_missing_access_token_is_malformed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/services/oauth2/token");
                then.status(200).body(r#"{"token_type":"Bearer"}"#);
            })
            .await;

        let source = OAuth2Source::new(2_000, 300).unwrap();
        let err = source.fetch_token(&credentials(&server.base_url())).await.unwrap_err();
        assert_eq!(err, TokenError::MalformedResponse);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        // bind then drop to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let source = OAuth2Source::new(2_000, 300).unwrap();
        let err = source
            .fetch_token(&credentials(&format!("http://{}", addr)))
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::Transport(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_hanging_endpoint_times_out() {
        let router = Router::new().route(
            "/services/oauth2/token",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "{}"
            }),
        );
        let (handle, addr) = spawn_axum(router).await;

        let source = OAuth2Source::new(200, 300).unwrap();
        let err = source
            .fetch_token(&credentials(&format!("http://{}", addr)))
            .await
            .unwrap_err();
        assert_eq!(err, TokenError::Timeout(200));

        handle.abort();
    }
}
