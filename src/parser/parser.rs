use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::token::Token;
use crate::error::TokenError;
use crate::utils::constants::DEFAULT_TOKEN_TYPE;

/// Turn a successful token endpoint body into a [`Token`].
///
/// `expires_in` falls back to `default_expires_in_secs` when absent or not a number.
/// `issued_at` is taken from the response (Salesforce sends milliseconds as a string)
/// and falls back to `now_ms`.
pub fn parse_token_response(
    body: &str,
    now_ms: i64,
    default_expires_in_secs: u64,
) -> Result<Token, TokenError> {
    let json_body: Value = serde_json::from_str(body).map_err(|e| {
        warn!("Token response is not valid JSON: {}", e);
        TokenError::MalformedResponse
    })?;

    let access_token = json_body
        .get("access_token")
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
        .ok_or(TokenError::MalformedResponse)?;

    let token_type = json_body
        .get("token_type")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_TOKEN_TYPE);

    let expires_in_secs = json_body
        .get("expires_in")
        .and_then(Value::as_f64)
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .unwrap_or_else(|| {
            debug!("expires_in absent or not a number, using {}s", default_expires_in_secs);
            default_expires_in_secs as f64
        });

    Ok(Token {
        access_token: access_token.to_owned(),
        token_type: token_type.to_owned(),
        issued_at: json_body.get("issued_at").and_then(parse_millis).unwrap_or(now_ms),
        expires_at: now_ms.saturating_add((expires_in_secs * 1000.0) as i64),
    })
}

fn parse_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
