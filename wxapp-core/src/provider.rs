use crate::{
    credential::{CredentialState, IdToken},
    model::{Domain, ForecastKind, GSO_DOMAIN, VariableSet},
    provider::{aws_api::AwsModel, open_meteo::OpenMeteoCatalog},
};
use async_trait::async_trait;
use std::{convert::TryFrom, fmt, fmt::Debug, sync::Arc};

pub mod aws_api;
pub mod instance;
pub mod open_meteo;
pub mod registry;

pub use instance::{ProviderInstance, VariableOrigin, VariableUnion};
pub use registry::ProviderRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenMeteo,
    AwsApi,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenMeteo => "open-meteo",
            ProviderId::AwsApi => "aws-api",
        }
    }

    /// Name shown to the user and used as the registry key.
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderId::OpenMeteo => "Open-Meteo",
            ProviderId::AwsApi => "AWS API",
        }
    }

    pub fn requires_auth(&self) -> bool {
        matches!(self, ProviderId::AwsApi)
    }

    /// Declaration order: providers without auth first.
    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::OpenMeteo, ProviderId::AwsApi]
    }

    pub fn models(&self, kind: ForecastKind) -> Vec<&'static str> {
        match self {
            ProviderId::OpenMeteo => open_meteo::models(kind),
            ProviderId::AwsApi => AwsModel::for_kind(kind).iter().map(|m| m.as_str()).collect(),
        }
    }

    /// Domain a model's metadata is looked up under when the instance is bound
    /// to `bound`.
    pub fn metadata_domain(&self, model: &str, bound: Option<Domain>) -> String {
        match (self, AwsModel::try_from(model)) {
            (ProviderId::AwsApi, Ok(AwsModel::Gso)) => GSO_DOMAIN.to_string(),
            _ => bound.map(|d| d.as_str()).unwrap_or("default").to_string(),
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.trim().to_lowercase();

        ProviderId::all()
            .iter()
            .copied()
            .find(|id| id.as_str() == lower || id.display_name().to_lowercase() == lower)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown provider '{value}'. Supported providers: Open-Meteo, AWS API."
                )
            })
    }
}

/// Identifies one configuration of a provider. Two descriptors with the same
/// name and different fingerprints are different provider instances.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigFingerprint(String);

impl ConfigFingerprint {
    pub fn derive(id: ProviderId, state: &CredentialState) -> Self {
        match (id.requires_auth(), state.session()) {
            (true, Some(session)) => {
                Self(format!("{}/{}/g{}", id.as_str(), session.domain, session.generation))
            }
            _ => Self(id.as_str().to_string()),
        }
    }
}

impl fmt::Display for ConfigFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDescriptor {
    pub name: String,
    pub id: ProviderId,
    pub requires_auth: bool,
    pub fingerprint: ConfigFingerprint,
    /// Domain the provider is bound to, if it depends on one.
    pub domain: Option<Domain>,
}

impl ProviderDescriptor {
    pub fn new(id: ProviderId, state: &CredentialState) -> Self {
        Self {
            name: id.display_name().to_string(),
            id,
            requires_auth: id.requires_auth(),
            fingerprint: ConfigFingerprint::derive(id, state),
            domain: if id.requires_auth() { state.domain() } else { None },
        }
    }
}

/// Source of per-model variable lists.
#[async_trait]
pub trait MetadataBackend: Send + Sync + Debug {
    async fn fetch(&self, model: &str, domain: &str) -> anyhow::Result<VariableSet>;
}

/// Builds a metadata backend bound to a token. Called once per auth-gated
/// provider instance.
pub trait MetadataConnector: Send + Sync + Debug {
    fn connect(&self, token: &IdToken) -> Arc<dyn MetadataBackend>;
}

/// Construct the metadata backend for a descriptor from the current credentials.
pub fn backend_for(
    descriptor: &ProviderDescriptor,
    state: &CredentialState,
    connector: &dyn MetadataConnector,
) -> anyhow::Result<Arc<dyn MetadataBackend>> {
    match descriptor.id {
        ProviderId::OpenMeteo => Ok(Arc::new(OpenMeteoCatalog)),
        ProviderId::AwsApi => {
            let session = state.session().ok_or_else(|| {
                anyhow::anyhow!(
                    "No token available for provider '{}'.\n\
                     Hint: log in before selecting it.",
                    descriptor.name
                )
            })?;
            Ok(connector.connect(&session.token))
        }
    }
}
