//! A provider bound to one configuration epoch.
//!
//! Instances are never reconfigured. When a descriptor's fingerprint changes
//! the controller drops the old instance (and its cache) and builds a new one
//! with a new epoch.

use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, trace, warn};

use crate::{
    cache::{CacheKey, Epoch, FetchPlan, FetchTicket, MetadataCache},
    canonical,
    error::MetadataFetchError,
    model::{ForecastKind, VariableSet},
};

use super::{ConfigFingerprint, MetadataBackend, ProviderDescriptor};

/// Where a canonical variable was first seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableOrigin {
    pub raw_name: String,
    pub model: String,
}

/// Union of every model's variables, keyed by canonical name.
///
/// Models whose metadata could not be fetched contribute nothing and are
/// listed in `failures`.
#[derive(Debug, Default)]
pub struct VariableUnion {
    pub variables: BTreeMap<String, VariableOrigin>,
    pub failures: Vec<MetadataFetchError>,
}

impl VariableUnion {
    pub fn names(&self) -> Vec<&str> {
        self.variables.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

#[derive(Debug)]
pub struct ProviderInstance {
    descriptor: ProviderDescriptor,
    backend: Arc<dyn MetadataBackend>,
    cache: MetadataCache,
}

impl ProviderInstance {
    pub fn new(
        descriptor: ProviderDescriptor,
        epoch: Epoch,
        backend: Arc<dyn MetadataBackend>,
    ) -> Self {
        let cache = MetadataCache::new(descriptor.name.clone(), epoch);
        Self { descriptor, backend, cache }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn fingerprint(&self) -> &ConfigFingerprint {
        &self.descriptor.fingerprint
    }

    pub fn epoch(&self) -> Epoch {
        self.cache.epoch()
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    pub fn available_models(&self, kind: ForecastKind) -> Vec<&'static str> {
        self.descriptor.id.models(kind)
    }

    /// Domain used for `model`'s metadata under this instance's binding.
    pub fn metadata_domain(&self, model: &str) -> String {
        self.descriptor.id.metadata_domain(model, self.descriptor.domain)
    }

    pub fn begin_fetch(&mut self, model: &str, domain: &str) -> FetchPlan {
        self.cache.begin(CacheKey::new(model, domain))
    }

    /// Apply the result of a fetch started with [`Self::begin_fetch`].
    ///
    /// Returns `Ok(None)` when the ticket belongs to another epoch; such
    /// results are dropped.
    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: anyhow::Result<VariableSet>,
    ) -> Result<Option<VariableSet>, MetadataFetchError> {
        if ticket.epoch != self.epoch() || ticket.provider != self.name() {
            let current_epoch = self.epoch();
            debug!(
                provider = %ticket.provider,
                model = %ticket.key.model,
                ticket_epoch = %ticket.epoch,
                %current_epoch,
                "dropping metadata from a previous epoch"
            );
            return Ok(None);
        }

        self.settle(ticket, result).map(Some)
    }

    /// Variables for `(model, domain)`, fetching at most once per epoch.
    ///
    /// The exclusive borrow spans the fetch, so no in-flight mark is taken and
    /// dropping the returned future leaves the cache as it was.
    pub async fn get_variables(
        &mut self,
        model: &str,
        domain: &str,
    ) -> Result<VariableSet, MetadataFetchError> {
        let key = CacheKey::new(model, domain);
        if let Some(vars) = self.cache.get(&key) {
            trace!(provider = %self.name(), model, domain, "metadata cache hit");
            return Ok(vars.clone());
        }

        match self.backend.fetch(model, domain).await {
            Ok(vars) => Ok(self.cache.fill(key, vars).clone()),
            Err(cause) => {
                let err = self.fetch_error(model, domain, cause);
                warn!(error = %err, "metadata fetch failed");
                Err(err)
            }
        }
    }

    /// Union of all models' variables under the bound domain, de-duplicated by
    /// canonical name. The first model (in declaration order) to report a
    /// canonical name is recorded as its origin.
    pub async fn available_variables(&mut self) -> VariableUnion {
        let mut union = VariableUnion::default();

        for model in self.available_models(ForecastKind::All) {
            let domain = self.metadata_domain(model);

            match self.get_variables(model, &domain).await {
                Ok(vars) => {
                    for raw in vars {
                        union.variables.entry(canonical::to_canonical(&raw)).or_insert_with(|| {
                            VariableOrigin { raw_name: raw, model: model.to_string() }
                        });
                    }
                }
                Err(err) => union.failures.push(err),
            }
        }

        union
    }

    fn settle(
        &mut self,
        ticket: FetchTicket,
        result: anyhow::Result<VariableSet>,
    ) -> Result<VariableSet, MetadataFetchError> {
        match result {
            Ok(vars) => match self.cache.complete(&ticket, vars) {
                Ok(stored) => Ok(stored.clone()),
                Err(stale) => {
                    Err(self.fetch_error(&ticket.key.model, &ticket.key.domain, stale.into()))
                }
            },
            Err(cause) => {
                if let Err(stale) = self.cache.abandon(&ticket) {
                    debug!(error = %stale, "abandoned ticket belongs to another epoch");
                }
                let err = self.fetch_error(&ticket.key.model, &ticket.key.domain, cause);
                warn!(error = %err, "metadata fetch failed");
                Err(err)
            }
        }
    }

    fn fetch_error(&self, model: &str, domain: &str, cause: anyhow::Error) -> MetadataFetchError {
        MetadataFetchError {
            provider: self.name().to_string(),
            model: model.to_string(),
            domain: domain.to_string(),
            cause,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        credential::CredentialState,
        model::Domain,
        provider::{ProviderId, open_meteo::OpenMeteoCatalog},
        testing::{FakeMetadata, authenticated, poll_once},
    };

    fn aws_instance(backend: Arc<FakeMetadata>, epoch: u64) -> ProviderInstance {
        let state = authenticated(Domain::Brisbane, 1);
        let descriptor = ProviderDescriptor::new(ProviderId::AwsApi, &state);
        ProviderInstance::new(descriptor, Epoch(epoch), backend)
    }

    #[tokio::test]
    async fn second_lookup_is_served_from_cache() {
        let backend = Arc::new(FakeMetadata::default().with("gso", &["t2", "ws10"]));
        let mut instance = aws_instance(backend.clone(), 1);

        let first = instance.get_variables("gso", "brisbane").await.unwrap();
        let second = instance.get_variables("gso", "brisbane").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(backend.calls("gso", "brisbane"), 1);
    }

    #[tokio::test]
    async fn keys_are_per_model_and_domain() {
        let backend = Arc::new(FakeMetadata::default().with("access-ce", &["t2"]));
        let mut instance = aws_instance(backend.clone(), 1);

        instance.get_variables("access-ce", "brisbane").await.unwrap();
        instance.get_variables("access-ce", "sydney").await.unwrap();

        assert_eq!(backend.total_calls(), 2);
        assert_eq!(instance.cache().len(), 2);
    }

    #[tokio::test]
    async fn dropped_lookup_does_not_block_the_next_one() {
        let backend = Arc::new(FakeMetadata::default().with("gso", &["t2"]).hanging("gso"));
        let mut instance = aws_instance(backend.clone(), 1);

        assert!(poll_once(instance.get_variables("gso", "australia")).await.is_none());

        backend.release("gso");
        let vars = instance.get_variables("gso", "australia").await.unwrap();

        assert!(vars.contains("t2"));
        assert_eq!(backend.calls("gso", "australia"), 2);
        assert_eq!(instance.cache().len(), 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let backend = Arc::new(FakeMetadata::default().failing("access-g"));
        let mut instance = aws_instance(backend.clone(), 1);

        let err = instance.get_variables("access-g", "brisbane").await.unwrap_err();
        assert_eq!(err.model, "access-g");
        assert_eq!(err.domain, "brisbane");

        instance.get_variables("access-g", "brisbane").await.unwrap_err();
        assert_eq!(backend.calls("access-g", "brisbane"), 2);
        assert!(instance.cache().is_empty());
    }

    #[tokio::test]
    async fn union_collapses_aliases_and_survives_one_model_outage() {
        let backend = Arc::new(
            FakeMetadata::default()
                .with("gso", &["t2", "ws10"])
                .with("access-g", &["temperature_2m", "tp"])
                .failing("access-ge")
                .with("access-ce", &["air_temperature_2m", "rh2"]),
        );
        let mut instance = aws_instance(backend.clone(), 1);

        let union = instance.available_variables().await;

        assert_eq!(
            union.names(),
            vec!["precipitation", "relative_humidity_2m", "temperature_2m", "wind_speed_10m"]
        );
        assert_eq!(union.failures.len(), 1);
        assert_eq!(union.failures[0].model, "access-ge");

        let origin = &union.variables["temperature_2m"];
        assert_eq!(origin.model, "gso");
        assert_eq!(origin.raw_name, "t2");
    }

    #[tokio::test]
    async fn union_queries_gso_under_australia() {
        let backend = Arc::new(FakeMetadata::default().with("gso", &["t2"]));
        let mut instance = aws_instance(backend.clone(), 1);

        instance.available_variables().await;

        assert_eq!(backend.calls("gso", "australia"), 1);
        assert_eq!(backend.calls("access-ce", "brisbane"), 1);
    }

    #[tokio::test]
    async fn failed_completion_releases_the_key() {
        let backend = Arc::new(FakeMetadata::default());
        let mut instance = aws_instance(backend, 1);
        let FetchPlan::Fetch(ticket) = instance.begin_fetch("access-g", "brisbane") else {
            panic!("expected a ticket");
        };

        let err = instance.complete_fetch(ticket, Err(anyhow::anyhow!("503"))).unwrap_err();

        assert_eq!(err.model, "access-g");
        assert!(instance.cache().is_empty());
        assert!(matches!(instance.begin_fetch("access-g", "brisbane"), FetchPlan::Fetch(_)));
    }

    #[tokio::test]
    async fn ticket_from_previous_epoch_is_dropped() {
        let backend = Arc::new(FakeMetadata::default());
        let mut old = aws_instance(backend.clone(), 1);
        let FetchPlan::Fetch(ticket) = old.begin_fetch("access-ce", "brisbane") else {
            panic!("expected a ticket");
        };

        let mut fresh = aws_instance(backend, 2);
        let applied = fresh
            .complete_fetch(ticket, Ok(["t2".to_string()].into_iter().collect()))
            .unwrap();

        assert!(applied.is_none());
        assert!(fresh.cache().is_empty());
    }

    #[tokio::test]
    async fn open_meteo_instance_uses_static_catalog() {
        let descriptor =
            ProviderDescriptor::new(ProviderId::OpenMeteo, &CredentialState::Anonymous);
        let mut instance =
            ProviderInstance::new(descriptor, Epoch(1), Arc::new(OpenMeteoCatalog));

        let union = instance.available_variables().await;

        assert!(union.failures.is_empty());
        assert!(union.names().contains(&"shortwave_radiation"));
    }
}
