use crate::credential::CredentialState;

use super::{ProviderDescriptor, ProviderId};

/// The providers available for one credential state, in display order.
///
/// Always rebuilt from scratch with [`ProviderRegistry::compute`]; there is no
/// way to patch an existing registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderRegistry {
    descriptors: Vec<ProviderDescriptor>,
}

impl ProviderRegistry {
    /// Providers without auth come first in declaration order, followed by the
    /// auth-gated ones if `state` is authenticated.
    pub fn compute(state: &CredentialState) -> Self {
        let descriptors = ProviderId::all()
            .iter()
            .filter(|id| !id.requires_auth() || state.is_authenticated())
            .map(|id| ProviderDescriptor::new(*id, state))
            .collect();

        Self { descriptors }
    }

    pub fn get(&self, name: &str) -> Option<&ProviderDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.descriptors.iter().map(|d| d.name.as_str()).collect()
    }

    /// Fallback selection: the first registered provider.
    pub fn default_name(&self) -> Option<&str> {
        self.descriptors.first().map(|d| d.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProviderDescriptor> {
        self.descriptors.iter()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
