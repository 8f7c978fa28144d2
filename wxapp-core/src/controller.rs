//! Session lifecycle: login, domain change and logout.
//!
//! Every trigger validates first, then commits a credential transition, then
//! (if the transition changed configuration) rebuilds the provider registry
//! from scratch and swaps out any provider instance whose fingerprint moved.
//! Handlers take `&mut self`, so two triggers never interleave.

use chrono::Utc;
use secrecy::SecretString;
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, info, warn};

use crate::{
    auth::{AuthBackend, AuthOutcome, CognitoAuthBackend},
    cache::{FetchPlan, FetchTicket},
    config::Config,
    credential::{CredentialEvent, CredentialState, Edges},
    error::SessionError,
    model::{Domain, VariableSet},
    provider::{
        self, MetadataConnector, ProviderInstance, ProviderRegistry, VariableUnion,
        aws_api::HttpMetadataConnector,
    },
    session::{Frame, Session},
};

#[derive(Debug)]
pub struct LifecycleController {
    session: Session,
    auth: Arc<dyn AuthBackend>,
    connector: Arc<dyn MetadataConnector>,
    default_domain: Domain,
}

impl LifecycleController {
    pub fn new(
        auth: Arc<dyn AuthBackend>,
        connector: Arc<dyn MetadataConnector>,
        default_domain: Domain,
    ) -> Self {
        let mut controller =
            Self { session: Session::default(), auth, connector, default_domain };
        controller.rebuild();
        controller
    }

    /// Controller wired to the Cognito and HTTP metadata backends in `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self::new(
            Arc::new(CognitoAuthBackend::new(config.cognito.clone())?),
            Arc::new(HttpMetadataConnector::new(config.api_base_url.clone())?),
            config.default_domain,
        ))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> &CredentialState {
        self.session.credentials()
    }

    pub fn registry(&self) -> &ProviderRegistry {
        self.session.registry()
    }

    pub fn consume_notification(&self) -> bool {
        self.session.consume_notification()
    }

    pub fn selection(&self) -> Option<&str> {
        self.session.selection()
    }

    pub fn set_selection(&mut self, name: &str) -> Result<(), SessionError> {
        self.session.set_selection(name)
    }

    pub fn observe(&self) -> Frame {
        self.session.observe()
    }

    pub fn default_domain(&self) -> Domain {
        self.default_domain
    }

    /// Log in under the configured default domain.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<(), SessionError> {
        let domain = self.default_domain;
        self.login_in(username, password, domain).await
    }

    /// Log in and bind the authenticated provider to `domain`.
    ///
    /// Also valid while already authenticated: a rejected re-login keeps the
    /// current session untouched.
    pub async fn login_in(
        &mut self,
        username: &str,
        password: &str,
        domain: Domain,
    ) -> Result<(), SessionError> {
        let password = SecretString::from(password.to_string());

        // Validated now, committed once verification returns: a dropped
        // future leaves the credential state untouched.
        let submit = self.session.credentials.transition(CredentialEvent::Submit {
            username: username.to_string(),
            password: password.clone(),
            domain,
        })?;

        let outcome = self.auth.verify(username, &password).await;
        self.session.credentials.commit(submit);
        let rejection = match &outcome {
            AuthOutcome::Verified(token) if token.is_empty() => {
                Some("backend returned an empty token".to_string())
            }
            AuthOutcome::Verified(_) => None,
            AuthOutcome::Rejected(reason) => Some(reason.clone()),
        };

        let edges = self.apply(CredentialEvent::Complete { outcome, at: Utc::now() })?;

        if let Some(reason) = rejection {
            let kept_session = self.state().is_authenticated();
            warn!(username, %reason, kept_session, "login rejected");
            return Err(SessionError::Authentication { action: "login", reason });
        }

        info!(username, %domain, "login succeeded");
        self.on_edges(edges);
        Ok(())
    }

    /// Rebind the authenticated provider to `domain`.
    ///
    /// Returns `false` (and changes nothing) if `domain` is already current.
    pub fn change_domain(&mut self, domain: Domain) -> Result<bool, SessionError> {
        let edges = self.apply(CredentialEvent::ChangeDomain(domain))?;
        if !edges.config_changed {
            debug!(%domain, "domain unchanged");
            return Ok(false);
        }

        info!(%domain, "domain changed");
        self.on_edges(edges);
        Ok(true)
    }

    pub fn logout(&mut self) {
        let transition = self.session.credentials.logged_out();
        let edges = self.session.credentials.commit(transition);
        info!("logged out");
        self.on_edges(edges);
    }

    pub fn instance(&self, provider: &str) -> Option<&ProviderInstance> {
        self.session.instance(provider)
    }

    pub async fn get_variables(
        &mut self,
        provider: &str,
        model: &str,
        domain: &str,
    ) -> Result<VariableSet, SessionError> {
        let instance = self.instance_mut(provider)?;
        Ok(instance.get_variables(model, domain).await?)
    }

    /// Canonical union of every model's variables for `provider`.
    pub async fn available_variables(
        &mut self,
        provider: &str,
    ) -> Result<VariableUnion, SessionError> {
        let instance = self.instance_mut(provider)?;
        Ok(instance.available_variables().await)
    }

    /// First half of an externally driven fetch. See [`Self::complete_fetch`].
    pub fn begin_fetch(
        &mut self,
        provider: &str,
        model: &str,
        domain: &str,
    ) -> Result<FetchPlan, SessionError> {
        Ok(self.instance_mut(provider)?.begin_fetch(model, domain))
    }

    /// Apply a fetch result. Results for replaced or removed instances are
    /// dropped and yield `Ok(None)`.
    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: anyhow::Result<VariableSet>,
    ) -> Result<Option<VariableSet>, SessionError> {
        let Some(instance) = self.session.instances.get_mut(&ticket.provider) else {
            debug!(
                provider = %ticket.provider,
                epoch = %ticket.epoch,
                "dropping metadata for removed provider"
            );
            return Ok(None);
        };

        Ok(instance.complete_fetch(ticket, result)?)
    }

    fn instance_mut(&mut self, provider: &str) -> Result<&mut ProviderInstance, SessionError> {
        self.session
            .instances
            .get_mut(provider)
            .ok_or_else(|| SessionError::UnknownProvider(provider.to_string()))
    }

    fn apply(&mut self, event: CredentialEvent) -> Result<Edges, SessionError> {
        let transition = self.session.credentials.transition(event)?;
        Ok(self.session.credentials.commit(transition))
    }

    fn on_edges(&mut self, edges: Edges) {
        if edges.config_changed {
            self.rebuild();
        }
        if edges.just_authenticated && !self.session.notification.set() {
            debug!("notification already pending");
        }
    }

    /// Recompute the registry and reconcile instances and selection with it.
    fn rebuild(&mut self) {
        let registry = ProviderRegistry::compute(self.session.credentials.state());
        let mut previous = std::mem::take(&mut self.session.instances);
        let mut instances = HashMap::with_capacity(registry.len());

        for descriptor in registry.iter() {
            if let Some(existing) = previous.remove(&descriptor.name) {
                if existing.fingerprint() == &descriptor.fingerprint {
                    instances.insert(descriptor.name.clone(), existing);
                    continue;
                }
                debug!(
                    provider = %descriptor.name,
                    old = %existing.fingerprint(),
                    new = %descriptor.fingerprint,
                    "configuration changed, discarding instance"
                );
            }

            let state = self.session.credentials.state();
            match provider::backend_for(descriptor, state, self.connector.as_ref()) {
                Ok(backend) => {
                    let epoch = self.session.next_epoch();
                    debug!(provider = %descriptor.name, %epoch, "creating provider instance");
                    instances.insert(
                        descriptor.name.clone(),
                        ProviderInstance::new(descriptor.clone(), epoch, backend),
                    );
                }
                Err(err) => {
                    warn!(
                        provider = %descriptor.name,
                        error = %err,
                        "failed to initialise provider"
                    );
                }
            }
        }

        for name in previous.keys() {
            debug!(provider = %name, "provider removed from registry");
        }

        debug!(providers = ?registry.names(), "registry recomputed");
        self.session.registry = registry;
        self.session.instances = instances;
        self.session.selection.reconcile(&self.session.registry);
        self.session.rerender.schedule();
    }
}
