//! Session-scoped state owned by the [`LifecycleController`].
//!
//! Everything here lives in memory for one interactive session. The rendering
//! layer reads it through [`Session::observe`]; only the controller mutates
//! credentials and provider instances.
//!
//! [`LifecycleController`]: crate::controller::LifecycleController

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::debug;

use crate::{
    cache::Epoch,
    credential::{CredentialState, CredentialStore},
    error::SessionError,
    model::Domain,
    notification::{NotificationFlag, RerenderSignal},
    provider::{ProviderDescriptor, ProviderInstance, ProviderRegistry},
};

/// The provider the user picked. Falls back to the registry's first entry
/// whenever the pick is missing from the current registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    chosen: Option<String>,
}

impl Selection {
    pub fn effective<'a>(&'a self, registry: &'a ProviderRegistry) -> Option<&'a str> {
        match self.chosen.as_deref() {
            Some(name) if registry.contains(name) => Some(name),
            _ => registry.default_name(),
        }
    }

    pub fn choose(&mut self, name: &str, registry: &ProviderRegistry) -> Result<(), SessionError> {
        if !registry.contains(name) {
            return Err(SessionError::UnknownProvider(name.to_string()));
        }
        self.chosen = Some(name.to_string());
        Ok(())
    }

    /// Reset the pick if it no longer exists. Returns `true` if it was reset.
    pub fn reconcile(&mut self, registry: &ProviderRegistry) -> bool {
        let missing = matches!(self.chosen.as_deref(), Some(name) if !registry.contains(name));
        if !missing {
            return false;
        }

        let fallback = registry.default_name().map(str::to_string);
        debug!(
            removed = ?self.chosen,
            fallback = ?fallback,
            "selected provider no longer available"
        );
        self.chosen = fallback;
        true
    }
}

/// Credential state as shown to the user. Carries no token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthSummary {
    Anonymous,
    Authenticating,
    Authenticated { domain: Domain, since: DateTime<Utc> },
    Failed { reason: String },
}

impl From<&CredentialState> for AuthSummary {
    fn from(state: &CredentialState) -> Self {
        match state {
            CredentialState::Anonymous => AuthSummary::Anonymous,
            CredentialState::Authenticating { .. } => AuthSummary::Authenticating,
            CredentialState::Authenticated(session) => {
                AuthSummary::Authenticated { domain: session.domain, since: session.since }
            }
            CredentialState::Failed { reason } => AuthSummary::Failed { reason: reason.clone() },
        }
    }
}

/// Snapshot for one observation pass.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Derived state changed since the previous pass.
    pub rerender: bool,
    /// The one-shot "provider now available" notification.
    pub notification: bool,
    pub providers: Vec<ProviderDescriptor>,
    pub selection: Option<String>,
    pub auth: AuthSummary,
}

#[derive(Debug, Default)]
pub struct Session {
    pub(crate) credentials: CredentialStore,
    pub(crate) registry: ProviderRegistry,
    pub(crate) instances: HashMap<String, ProviderInstance>,
    pub(crate) selection: Selection,
    pub(crate) notification: NotificationFlag,
    pub(crate) rerender: RerenderSignal,
    last_epoch: u64,
}

impl Session {
    pub fn credentials(&self) -> &CredentialState {
        self.credentials.state()
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn instance(&self, name: &str) -> Option<&ProviderInstance> {
        self.instances.get(name)
    }

    pub fn selection(&self) -> Option<&str> {
        self.selection.effective(&self.registry)
    }

    pub fn set_selection(&mut self, name: &str) -> Result<(), SessionError> {
        self.selection.choose(name, &self.registry)
    }

    /// `true` exactly once after each successful login.
    pub fn consume_notification(&self) -> bool {
        self.notification.consume()
    }

    pub fn take_rerender(&self) -> bool {
        self.rerender.take()
    }

    /// Consume both signals and snapshot what the renderer needs.
    pub fn observe(&self) -> Frame {
        Frame {
            rerender: self.take_rerender(),
            notification: self.consume_notification(),
            providers: self.registry.iter().cloned().collect(),
            selection: self.selection().map(str::to_string),
            auth: AuthSummary::from(self.credentials()),
        }
    }

    pub(crate) fn next_epoch(&mut self) -> Epoch {
        self.last_epoch += 1;
        Epoch(self.last_epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::authenticated;

    #[test]
    fn selection_defaults_to_first_provider() {
        let registry = ProviderRegistry::compute(&CredentialState::Anonymous);
        let selection = Selection::default();

        assert_eq!(selection.effective(&registry), Some("Open-Meteo"));
    }

    #[test]
    fn choosing_unknown_provider_fails() {
        let registry = ProviderRegistry::compute(&CredentialState::Anonymous);
        let mut selection = Selection::default();

        let err = selection.choose("AWS API", &registry).unwrap_err();
        assert!(matches!(err, SessionError::UnknownProvider(name) if name == "AWS API"));
    }

    #[test]
    fn reconcile_keeps_present_choice() {
        let registry = ProviderRegistry::compute(&authenticated(Domain::Brisbane, 1));
        let mut selection = Selection::default();
        selection.choose("AWS API", &registry).unwrap();

        let moved = ProviderRegistry::compute(&authenticated(Domain::Sydney, 1));
        assert!(!selection.reconcile(&moved));
        assert_eq!(selection.effective(&moved), Some("AWS API"));
    }

    #[test]
    fn reconcile_falls_back_when_choice_disappears() {
        let registry = ProviderRegistry::compute(&authenticated(Domain::Brisbane, 1));
        let mut selection = Selection::default();
        selection.choose("AWS API", &registry).unwrap();

        let anonymous = ProviderRegistry::compute(&CredentialState::Anonymous);
        assert!(selection.reconcile(&anonymous));
        assert_eq!(selection.effective(&anonymous), Some("Open-Meteo"));

        // The fallback sticks even after the provider comes back.
        assert_eq!(selection.effective(&registry), Some("Open-Meteo"));
    }

    #[test]
    fn auth_summary_hides_token() {
        let summary = AuthSummary::from(&authenticated(Domain::Perth, 1));

        assert!(matches!(summary, AuthSummary::Authenticated { domain: Domain::Perth, .. }));
        assert!(!format!("{summary:?}").contains("test-token"));
    }

    #[test]
    fn epochs_increase() {
        let mut session = Session::default();
        let a = session.next_epoch();
        let b = session.next_epoch();

        assert!(b > a);
    }
}
