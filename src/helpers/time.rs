use chrono::Utc;
use tokio::time::Instant;

/// Wall clock in Unix epoch milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn get_instant() -> Instant {
    Instant::now()
}
