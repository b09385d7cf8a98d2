//! Credential validation against the remote verification authority.
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::AuthorityConfig;
use crate::error::{GateError, GateResult, VERIFICATION_FAILED};

/// Visitor record returned by the authority on approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub visitor_name: String,
    pub visitor_phone: String,
    pub entry_time: DateTime<Utc>,
    /// Operator recorded as approving the entry.
    pub verified_by: String,
}

/// Any authority failure: rejection, transport or malformed reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorityError {
    pub message: Option<String>,
}

impl AuthorityError {
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }

    /// Message to show, with empty strings treated as absent.
    pub fn display_message(&self) -> &str {
        self.message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(VERIFICATION_FAILED)
    }
}

#[async_trait]
pub trait VerificationAuthority: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerificationResult, AuthorityError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyRequest<'a> {
    qr_code: &'a str,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Authority reached over HTTP: `POST {base_url}{verify_path}` with `{"qrCode": token}`.
#[derive(Clone)]
pub struct HttpAuthority {
    client: Client,
    url: String,
    bearer_token: Option<String>,
}

impl HttpAuthority {
    pub fn new(config: &AuthorityConfig) -> GateResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| GateError::Config(format!("failed to create HTTP client: {}", e)))?;

        let path = config.verify_path.trim();
        let path = if path.is_empty() || path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };

        Ok(Self {
            client,
            url: format!("{}{}", config.base_url.trim().trim_end_matches('/'), path),
            bearer_token: config.bearer_token.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl VerificationAuthority for HttpAuthority {
    async fn verify(&self, token: &str) -> Result<VerificationResult, AuthorityError> {
        debug!(url = %self.url, "verifying visitor token");

        let mut request = self.client.post(&self.url).json(&VerifyRequest { qr_code: token });
        if let Some(bearer) = &self.bearer_token {
            request = request.bearer_auth(bearer);
        }

        let response = request.send().await.map_err(|e| {
            warn!(error = %e, "authority unreachable");
            AuthorityError::default()
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|body| body.message);
            warn!(%status, message = ?message, "authority rejected token");
            return Err(AuthorityError { message });
        }

        response.json::<VerificationResult>().await.map_err(|e| {
            warn!(error = %e, "malformed authority response");
            AuthorityError::default()
        })
    }
}

/// Validates a token with exactly one authority call.
#[derive(Clone)]
pub struct CredentialValidator {
    authority: Arc<dyn VerificationAuthority>,
}

impl CredentialValidator {
    pub fn new(authority: Arc<dyn VerificationAuthority>) -> Self {
        Self { authority }
    }

    pub async fn validate(&self, token: &str) -> GateResult<VerificationResult> {
        let token = token.trim();
        if token.is_empty() {
            return Err(GateError::Input("Please enter a QR code".to_string()));
        }

        match self.authority.verify(token).await {
            Ok(result) => {
                info!(visitor = %result.visitor_name, verified_by = %result.verified_by, "visitor approved");
                Ok(result)
            }
            Err(e) => Err(GateError::Validation(e.display_message().to_string())),
        }
    }
}

/// Advisory check for the `VISITOR-<unix-ts>-<alnum>` shape. Never used to reject.
pub fn looks_like_visitor_token(token: &str) -> bool {
    let mut parts = token.trim().splitn(3, '-');
    let (Some(prefix), Some(timestamp), Some(suffix)) = (parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    prefix == "VISITOR"
        && !timestamp.is_empty()
        && timestamp.bytes().all(|b| b.is_ascii_digit())
        && !suffix.is_empty()
        && suffix.bytes().all(|b| b.is_ascii_alphanumeric())
}
