//! Shared constants and invariants

pub const DEFAULT_SKEW_SECS: u64 = 10;
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 300;
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 5000;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;

pub const TOKEN_PATH: &str = "/api/token";
pub const HEALTH_PATH: &str = "/health";
pub const OAUTH2_TOKEN_PATH: &str = "/services/oauth2/token";
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";
