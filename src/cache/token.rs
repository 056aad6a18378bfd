use serde::Serialize;

/// Access token as handed to HTTP callers. All timestamps are Unix epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

impl Token {
    /// True while `now + skew` is still before `expires_at`.
    pub fn is_fresh(&self, now_ms: i64, skew_ms: i64) -> bool {
        now_ms.saturating_add(skew_ms) < self.expires_at
    }
}
