use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, warn};

use crate::cache::token::Token;
use crate::config::credentials::{Credentials, CredentialsBody};
use crate::config::settings::CredentialsMode;
use crate::error::{TokenError, TOKEN_FETCH_FAILED};
use crate::observability::metrics::get_metrics;
use crate::server::server::{AppState, TokenState};

static OK_MSG: &str = "ok";
static BAD_REQUEST_MSG: &str = "bad_request";
static ERROR_MSG: &str = "error";

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

/// `GET /api/token`: credentials from process configuration.
pub async fn get_token(State(state): State<AppState>) -> Response {
    let token_state = &state.token_state;
    // missing process credentials are a server misconfiguration, not the caller's fault
    let credentials = match token_state.credentials.resolve() {
        Ok(credentials) => credentials,
        Err(e) => return respond(CredentialsMode::Fixed, Err(e)).await,
    };
    let result = acquire(token_state, &credentials).await;
    respond(CredentialsMode::Fixed, result).await
}

/// `POST /api/token`: credentials from the JSON body.
pub async fn post_token(State(state): State<AppState>, body: Bytes) -> Response {
    let parsed: CredentialsBody = serde_json::from_slice(&body).unwrap_or_else(|e| {
        warn!("token request body is not a credentials object: {}", e);
        CredentialsBody::default()
    });

    let credentials = match parsed.resolve() {
        Ok(credentials) => credentials,
        Err(e) => {
            warn!("rejecting token request: {}", e);
            count(CredentialsMode::PerRequest, BAD_REQUEST_MSG).await;
            let body = ErrorBody { error: e.to_string(), detail: None };
            return (StatusCode::BAD_REQUEST, Json(body)).into_response();
        }
    };

    let result = acquire(&state.token_state, &credentials).await;
    respond(CredentialsMode::PerRequest, result).await
}

pub async fn health() -> &'static str {
    "ok"
}

async fn acquire(
    token_state: &TokenState,
    credentials: &Credentials,
) -> Result<Arc<Token>, TokenError> {
    token_state.slots.acquire(&token_state.source, credentials).await
}

async fn respond(
    mode: CredentialsMode,
    result: Result<Arc<Token>, TokenError>,
) -> Response {
    match result {
        Ok(token) => {
            count(mode, OK_MSG).await;
            (StatusCode::OK, Json(token.as_ref())).into_response()
        }
        Err(e) => {
            error!(reason = e.reason(), "Token fetch error: {}", e);
            count(mode, ERROR_MSG).await;
            let body = ErrorBody {
                error: TOKEN_FETCH_FAILED.to_owned(),
                detail: Some(e.to_string()),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}

async fn count(mode: CredentialsMode, outcome: &str) {
    get_metrics()
        .await
        .token_requests
        .with_label_values(&[mode.as_str(), outcome])
        .inc();
}
