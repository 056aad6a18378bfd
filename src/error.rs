use thiserror::Error;

/// Machine readable code returned to HTTP callers when a token cannot be produced.
pub const TOKEN_FETCH_FAILED: &str = "token_fetch_failed";

/// Failure of a single `acquire` attempt.
///
/// Cloneable: every caller attached to one refresh receives the same value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Missing {0}")]
    MissingCredentials(&'static str),

    #[error("Token endpoint returned {status}: {body}")]
    UpstreamRejected { status: u16, body: String },

    #[error("No access_token in response")]
    MalformedResponse,

    #[error("Token endpoint request failed: {0}")]
    Transport(String),

    #[error("Token endpoint did not answer within {0} ms")]
    Timeout(u64),
}

impl TokenError {
    /// Label used for the `reason` dimension of failure metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            TokenError::MissingCredentials(_) => "missing_credentials",
            TokenError::UpstreamRejected { .. } => "upstream_rejected",
            TokenError::MalformedResponse => "malformed_response",
            TokenError::Transport(_) => "transport",
            TokenError::Timeout(_) => "timeout",
        }
    }
}
