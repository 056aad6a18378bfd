use serde::Deserialize;
use veil::Redact;

use crate::error::TokenError;
use crate::utils::constants::OAUTH2_TOKEN_PATH;

/// What is reported when the process-wide credentials are incomplete.
pub const MISSING_ENV_CREDENTIALS: &str = "SF_INSTANCE_URL / SF_CLIENT_ID / SF_CLIENT_SECRET env vars";
/// What is reported when a request body lacks one of the credential fields.
pub const MISSING_BODY_CREDENTIALS: &str = "SF_INSTANCE / SF_CLIENT_ID / SF_CLIENT_SECRET in request body";

/// Validated client-credentials triple. Only built through [`Credentials::try_new`].
#[derive(Redact, Clone, PartialEq, Eq)]
pub struct Credentials {
    instance_url: String,
    client_id: String,
    #[redact]
    client_secret: String,
}

impl Credentials {
    /// Build credentials, rejecting absent or blank fields.
    /// `missing` names what the caller failed to provide.
    pub fn try_new(
        instance_url: Option<&str>,
        client_id: Option<&str>,
        client_secret: Option<&str>,
        missing: &'static str,
    ) -> Result<Self, TokenError> {
        let (Some(instance_url), Some(client_id), Some(client_secret)) = (
            non_blank(instance_url),
            non_blank(client_id),
            non_blank(client_secret),
        ) else {
            return Err(TokenError::MissingCredentials(missing));
        };

        Ok(Self {
            instance_url: {
                let url = instance_url.trim();
                url.strip_suffix('/').unwrap_or(url).to_owned()
            },
            client_id: client_id.to_owned(),
            client_secret: client_secret.to_owned(),
        })
    }

    pub fn instance_url(&self) -> &str {
        &self.instance_url
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    pub fn token_url(&self) -> String {
        format!("{}{}", self.instance_url, OAUTH2_TOKEN_PATH)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Credential block of the YAML config (fixed-credentials variant).
#[derive(Debug, Deserialize, Clone, Default)]
pub struct CredentialsConfig {
    pub instance_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl CredentialsConfig {
    pub fn resolve(&self) -> Result<Credentials, TokenError> {
        Credentials::try_new(
            self.instance_url.as_deref(),
            self.client_id.as_deref(),
            self.client_secret.as_deref(),
            MISSING_ENV_CREDENTIALS,
        )
    }
}

/// JSON body accepted by `POST /api/token`.
#[derive(Debug, Deserialize, Default)]
pub struct CredentialsBody {
    #[serde(rename = "SF_INSTANCE")]
    pub instance_url: Option<String>,
    #[serde(rename = "CLIENT_ID")]
    pub client_id: Option<String>,
    #[serde(rename = "CLIENT_SECRET")]
    pub client_secret: Option<String>,
}

impl CredentialsBody {
    pub fn resolve(&self) -> Result<Credentials, TokenError> {
        Credentials::try_new(
            self.instance_url.as_deref(),
            self.client_id.as_deref(),
            self.client_secret.as_deref(),
            MISSING_BODY_CREDENTIALS,
        )
    }
}
