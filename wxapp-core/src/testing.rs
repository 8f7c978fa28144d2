//! Hand-written fakes for the external collaborators.

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use secrecy::SecretString;
use std::{
    collections::{HashMap, HashSet},
    future::{Future, pending, ready},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use crate::{
    auth::{AuthBackend, AuthOutcome},
    credential::{AuthenticatedSession, CredentialState, IdToken},
    model::{Domain, VariableSet},
    provider::{MetadataBackend, MetadataConnector},
};

pub fn authenticated(domain: Domain, generation: u64) -> CredentialState {
    CredentialState::Authenticated(AuthenticatedSession {
        token: IdToken::new("test-token"),
        domain,
        since: Utc::now(),
        generation,
    })
}

/// Poll `fut` once and drop it if it is still pending, the way a timeout
/// wrapper gives up on a slow call.
pub async fn poll_once<F: Future>(fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        out = fut => Some(out),
        _ = ready(()) => None,
    }
}

/// Metadata backend that counts calls per `(model, domain)`.
///
/// Unscripted models answer with an empty set. Hanging models never answer
/// until released.
#[derive(Debug, Default)]
pub struct FakeMetadata {
    variables: HashMap<String, VariableSet>,
    failing: HashSet<String>,
    hanging: Mutex<HashSet<String>>,
    calls: Mutex<HashMap<(String, String), usize>>,
}

impl FakeMetadata {
    pub fn with(mut self, model: &str, vars: &[&str]) -> Self {
        self.variables.insert(model.to_string(), vars.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn failing(mut self, model: &str) -> Self {
        self.failing.insert(model.to_string());
        self
    }

    pub fn hanging(self, model: &str) -> Self {
        self.hanging.lock().unwrap().insert(model.to_string());
        self
    }

    pub fn release(&self, model: &str) {
        self.hanging.lock().unwrap().remove(model);
    }

    pub fn calls(&self, model: &str, domain: &str) -> usize {
        let calls = self.calls.lock().unwrap();
        calls.get(&(model.to_string(), domain.to_string())).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl MetadataBackend for FakeMetadata {
    async fn fetch(&self, model: &str, domain: &str) -> anyhow::Result<VariableSet> {
        let key = (model.to_string(), domain.to_string());
        *self.calls.lock().unwrap().entry(key).or_default() += 1;

        let hangs = self.hanging.lock().unwrap().contains(model);
        if hangs {
            pending::<()>().await;
        }
        if self.failing.contains(model) {
            return Err(anyhow!("upstream returned 503 for {model}"));
        }
        Ok(self.variables.get(model).cloned().unwrap_or_default())
    }
}

/// Connector that hands out one shared [`FakeMetadata`].
#[derive(Debug, Default)]
pub struct FakeConnector {
    backend: Arc<FakeMetadata>,
    connections: AtomicUsize,
}

impl FakeConnector {
    pub fn new(backend: Arc<FakeMetadata>) -> Self {
        Self { backend, connections: AtomicUsize::new(0) }
    }

    pub fn backend(&self) -> &Arc<FakeMetadata> {
        &self.backend
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl MetadataConnector for FakeConnector {
    fn connect(&self, _token: &IdToken) -> Arc<dyn MetadataBackend> {
        self.connections.fetch_add(1, Ordering::SeqCst);
        self.backend.clone()
    }
}

/// Auth backend with a scripted outcome. While hanging, `verify` never
/// returns.
#[derive(Debug)]
pub struct FakeAuth {
    outcome: Mutex<AuthOutcome>,
    hanging: AtomicBool,
    calls: AtomicUsize,
}

impl FakeAuth {
    fn scripted(outcome: AuthOutcome) -> Self {
        Self {
            outcome: Mutex::new(outcome),
            hanging: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn accepting(token: &str) -> Self {
        Self::scripted(AuthOutcome::Verified(IdToken::new(token)))
    }

    pub fn rejecting(reason: &str) -> Self {
        Self::scripted(AuthOutcome::Rejected(reason.to_string()))
    }

    pub fn set_hanging(&self, hanging: bool) {
        self.hanging.store(hanging, Ordering::SeqCst);
    }

    pub fn set_outcome(&self, outcome: AuthOutcome) {
        *self.outcome.lock().unwrap() = outcome;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthBackend for FakeAuth {
    async fn verify(&self, _username: &str, _password: &SecretString) -> AuthOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hanging.load(Ordering::SeqCst) {
            pending::<()>().await;
        }
        self.outcome.lock().unwrap().clone()
    }
}
