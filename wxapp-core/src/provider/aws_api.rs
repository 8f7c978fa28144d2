use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::{convert::TryFrom, sync::Arc, time::Duration};
use tracing::debug;

use crate::{
    credential::IdToken,
    model::{ForecastKind, VariableSet},
};

use super::{MetadataBackend, MetadataConnector};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AwsModel {
    Gso,
    AccessG,
    AccessGe,
    AccessCe,
}

impl AwsModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AwsModel::Gso => "gso",
            AwsModel::AccessG => "access-g",
            AwsModel::AccessGe => "access-ge",
            AwsModel::AccessCe => "access-ce",
        }
    }

    pub const fn all() -> &'static [AwsModel] {
        &[AwsModel::Gso, AwsModel::AccessG, AwsModel::AccessGe, AwsModel::AccessCe]
    }

    /// `gso` serves both deterministic and ensemble views.
    pub fn for_kind(kind: ForecastKind) -> &'static [AwsModel] {
        match kind {
            ForecastKind::Deterministic => &[AwsModel::Gso, AwsModel::AccessG],
            ForecastKind::Ensemble => &[AwsModel::Gso, AwsModel::AccessGe, AwsModel::AccessCe],
            ForecastKind::All => Self::all(),
        }
    }

    /// Whether the metadata endpoint expects a `domain` parameter.
    fn sends_domain(&self) -> bool {
        matches!(self, AwsModel::Gso | AwsModel::AccessCe)
    }
}

impl TryFrom<&str> for AwsModel {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        AwsModel::all()
            .iter()
            .copied()
            .find(|m| m.as_str() == lower)
            .ok_or_else(|| {
                anyhow!(
                    "Unknown model '{value}'. Supported models: gso, access-g, access-ge, access-ce."
                )
            })
    }
}

/// Hands out [`HttpMetadataBackend`]s bound to a token.
#[derive(Debug, Clone)]
pub struct HttpMetadataConnector {
    base_url: String,
    http: Client,
}

impl HttpMetadataConnector {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for the metadata API")?;

        Ok(Self { base_url: base_url.into().trim_end_matches('/').to_string(), http })
    }
}

impl MetadataConnector for HttpMetadataConnector {
    fn connect(&self, token: &IdToken) -> Arc<dyn MetadataBackend> {
        Arc::new(HttpMetadataBackend {
            base_url: self.base_url.clone(),
            token: token.clone(),
            http: self.http.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct HttpMetadataBackend {
    base_url: String,
    token: IdToken,
    http: Client,
}

impl HttpMetadataBackend {
    fn metadata_url(&self, model: &str) -> String {
        format!("{}/metadata/{}", self.base_url, model)
    }
}

#[async_trait]
impl MetadataBackend for HttpMetadataBackend {
    async fn fetch(&self, model: &str, domain: &str) -> Result<VariableSet> {
        let parsed_model = AwsModel::try_from(model)?;

        let mut request = self
            .http
            .get(self.metadata_url(model))
            .bearer_auth(self.token.expose_secret());
        if parsed_model.sends_domain() {
            request = request.query(&[("domain", domain)]);
        }

        debug!(model, domain, "requesting model metadata");

        let res = request
            .send()
            .await
            .with_context(|| format!("Failed to send metadata request for {model}"))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .with_context(|| format!("Failed to read metadata response body for {model}"))?;

        if status == StatusCode::UNAUTHORIZED {
            return Err(anyhow!("Unauthorized: token expired or invalid"));
        }
        if !status.is_success() {
            return Err(anyhow!(
                "Metadata API error ({}) {}: {}",
                model,
                status,
                truncate_body(&body),
            ));
        }

        parse_variables(model, &body)
    }
}

#[derive(Debug, Deserialize)]
struct MetadataResponse {
    available_variables: Option<Vec<String>>,
    variables: Option<Vec<String>>,
    data: Option<MetadataData>,
}

#[derive(Debug, Deserialize)]
struct MetadataData {
    available_variables: Option<Vec<String>>,
}

/// Variables may sit under `available_variables`, `variables` or
/// `data.available_variables`, checked in that order.
fn parse_variables(model: &str, body: &str) -> Result<VariableSet> {
    let parsed: MetadataResponse = serde_json::from_str(body)
        .with_context(|| format!("Failed to parse metadata JSON for {model}"))?;

    let vars = parsed
        .available_variables
        .or(parsed.variables)
        .or_else(|| parsed.data.and_then(|d| d.available_variables))
        .unwrap_or_default();

    if vars.is_empty() {
        return Err(anyhow!("No variables found in metadata response for {model}"));
    }

    Ok(vars.into_iter().collect())
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 300;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_as_str_roundtrip() {
        for model in AwsModel::all() {
            assert_eq!(AwsModel::try_from(model.as_str()).unwrap(), *model);
        }
    }

    #[test]
    fn unknown_model_error() {
        let err = AwsModel::try_from("access-x").unwrap_err();
        assert!(err.to_string().contains("Unknown model"));
    }

    #[test]
    fn gso_is_both_deterministic_and_ensemble() {
        assert!(AwsModel::for_kind(ForecastKind::Deterministic).contains(&AwsModel::Gso));
        assert!(AwsModel::for_kind(ForecastKind::Ensemble).contains(&AwsModel::Gso));
        assert!(!AwsModel::for_kind(ForecastKind::Deterministic).contains(&AwsModel::AccessCe));
    }

    #[test]
    fn only_gso_and_access_ce_send_domain() {
        assert!(AwsModel::Gso.sends_domain());
        assert!(AwsModel::AccessCe.sends_domain());
        assert!(!AwsModel::AccessG.sends_domain());
        assert!(!AwsModel::AccessGe.sends_domain());
    }

    #[test]
    fn parses_top_level_available_variables() {
        let body = r#"{"available_variables":["t2","ws10"],"latest_run":"x"}"#;
        let vars = parse_variables("gso", body).unwrap();
        assert_eq!(vars.into_iter().collect::<Vec<_>>(), vec!["t2", "ws10"]);
    }

    #[test]
    fn falls_back_to_variables_then_nested_data() {
        let vars = parse_variables("access-g", r#"{"variables":["tp"]}"#).unwrap();
        assert!(vars.contains("tp"));

        let body = r#"{"data":{"available_variables":["rh2"]}}"#;
        let vars = parse_variables("access-ge", body).unwrap();
        assert!(vars.contains("rh2"));
    }

    #[test]
    fn empty_variable_list_is_an_error() {
        let err = parse_variables("access-ce", r#"{"available_variables":[]}"#).unwrap_err();
        assert!(err.to_string().contains("No variables found"));
        assert!(err.to_string().contains("access-ce"));
    }

    #[test]
    fn connector_trims_trailing_slash() {
        let connector = HttpMetadataConnector::new("https://api.example.com/prod/").unwrap();
        let backend = HttpMetadataBackend {
            base_url: connector.base_url.clone(),
            token: IdToken::new("t"),
            http: Client::new(),
        };

        assert_eq!(backend.metadata_url("gso"), "https://api.example.com/prod/metadata/gso");
    }

    #[tokio::test]
    async fn unresponsive_api_times_out() {
        // Accepts connections into the backlog and never answers.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let connector =
            HttpMetadataConnector::with_timeout(base_url, Duration::from_millis(200)).unwrap();
        let backend = connector.connect(&IdToken::new("t"));

        let err = backend.fetch("gso", "australia").await.unwrap_err();

        let source = err.downcast_ref::<reqwest::Error>().expect("reqwest error");
        assert!(source.is_timeout());
        assert!(err.to_string().contains("gso"));
    }

    #[test]
    fn truncate_body_limits_length() {
        let long = "x".repeat(500);
        assert_eq!(truncate_body(&long).len(), 303);
        assert_eq!(truncate_body("short"), "short");
    }
}
