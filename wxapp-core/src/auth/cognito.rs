use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, header::CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::{config::CognitoConfig, credential::IdToken};

use super::{AuthBackend, AuthOutcome};

const INITIATE_AUTH_TARGET: &str = "AWSCognitoIdentityProviderService.InitiateAuth";
const AMZ_JSON: &str = "application/x-amz-json-1.1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Username/password verification against an AWS Cognito user pool.
#[derive(Debug, Clone)]
pub struct CognitoAuthBackend {
    config: CognitoConfig,
    endpoint: String,
    http: Client,
}

impl CognitoAuthBackend {
    pub fn new(config: CognitoConfig) -> Result<Self> {
        Self::with_timeout(config, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(config: CognitoConfig, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for Cognito")?;
        let endpoint = format!("https://cognito-idp.{}.amazonaws.com/", config.region);

        Ok(Self { config, endpoint, http })
    }

    async fn initiate_auth(&self, username: &str, password: &SecretString) -> Result<AuthOutcome> {
        let request = InitiateAuthRequest {
            auth_flow: "USER_PASSWORD_AUTH",
            client_id: &self.config.client_id,
            auth_parameters: AuthParameters { username, password: password.expose_secret() },
        };
        let body = serde_json::to_vec(&request).context("Failed to encode InitiateAuth request")?;

        let res = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, AMZ_JSON)
            .header("X-Amz-Target", INITIATE_AUTH_TARGET)
            .body(body)
            .send()
            .await
            .context("Failed to send request to Cognito")?;

        let status = res.status();
        let body = res.text().await.context("Failed to read Cognito response body")?;

        interpret_response(status, &body)
    }
}

#[async_trait]
impl AuthBackend for CognitoAuthBackend {
    async fn verify(&self, username: &str, password: &SecretString) -> AuthOutcome {
        match self.initiate_auth(username, password).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(error = %err, "cognito request failed");
                AuthOutcome::Rejected(format!("Authentication error: {err:#}"))
            }
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthRequest<'a> {
    auth_flow: &'static str,
    client_id: &'a str,
    auth_parameters: AuthParameters<'a>,
}

#[derive(Serialize)]
struct AuthParameters<'a> {
    #[serde(rename = "USERNAME")]
    username: &'a str,
    #[serde(rename = "PASSWORD")]
    password: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthResponse {
    authentication_result: Option<AuthenticationResult>,
    challenge_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    id_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CognitoErrorBody {
    #[serde(rename = "__type")]
    kind: Option<String>,
    message: Option<String>,
}

/// Map an InitiateAuth HTTP response onto an outcome.
///
/// Rejections by the user pool are outcomes; malformed responses are errors.
fn interpret_response(status: StatusCode, body: &str) -> Result<AuthOutcome> {
    if !status.is_success() {
        let parsed: CognitoErrorBody = serde_json::from_str(body).map_err(|_| {
            anyhow!("Cognito request failed with status {}: {}", status, truncate_body(body))
        })?;

        // `__type` is sometimes namespaced: "com.amazonaws...#NotAuthorizedException".
        let kind = parsed.kind.as_deref().map(|k| k.rsplit('#').next().unwrap_or(k));

        let reason = match kind {
            Some("NotAuthorizedException") => "Invalid username or password".to_string(),
            Some("UserNotFoundException") => "User not found".to_string(),
            _ => format!(
                "Authentication error: {}",
                parsed
                    .message
                    .clone()
                    .or_else(|| parsed.kind.clone())
                    .unwrap_or_else(|| status.to_string())
            ),
        };
        return Ok(AuthOutcome::Rejected(reason));
    }

    let parsed: InitiateAuthResponse =
        serde_json::from_str(body).context("Failed to parse Cognito InitiateAuth JSON")?;

    if let Some(token) = parsed.authentication_result.and_then(|r| r.id_token) {
        return Ok(AuthOutcome::Verified(IdToken::new(token)));
    }

    Ok(AuthOutcome::Rejected(match parsed.challenge_name {
        Some(challenge) => format!("Authentication challenge '{challenge}' is not supported"),
        None => "Cognito response contained no ID token".to_string(),
    }))
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
