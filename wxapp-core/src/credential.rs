//! Credential state and its transition rules.
//!
//! [`CredentialStore::transition`] is a pure function of the current state and
//! an event; nothing changes until the resulting [`Transition`] is committed.
//! The controller is the only caller of [`CredentialStore::commit`].

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;

use crate::{
    auth::AuthOutcome,
    error::{SessionError, ValidationError},
    model::Domain,
};

/// An identity token issued by the auth backend.
///
/// Wrapped in `SecretString` so it never shows up in `Debug` output, logs or
/// error messages.
#[derive(Clone)]
pub struct IdToken(SecretString);

impl IdToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// Only for building the `Authorization` header.
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().trim().is_empty()
    }
}

impl fmt::Debug for IdToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdToken([REDACTED])")
    }
}

/// A verified login.
#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    pub token: IdToken,
    pub domain: Domain,
    pub since: DateTime<Utc>,
    /// Bumped on every successful login; part of the provider fingerprint so a
    /// new token always yields a fresh provider instance.
    pub generation: u64,
}

/// A login that has been submitted but not yet verified.
#[derive(Debug, Clone)]
pub struct PendingLogin {
    pub username: String,
    pub domain: Domain,
    /// The session that was active when the login was submitted, restored if
    /// verification fails.
    pub previous: Option<AuthenticatedSession>,
}

#[derive(Debug, Clone, Default)]
pub enum CredentialState {
    #[default]
    Anonymous,
    Authenticating {
        pending: PendingLogin,
    },
    Authenticated(AuthenticatedSession),
    Failed {
        reason: String,
    },
}

impl CredentialState {
    pub fn label(&self) -> &'static str {
        match self {
            CredentialState::Anonymous => "anonymous",
            CredentialState::Authenticating { .. } => "authenticating",
            CredentialState::Authenticated(_) => "authenticated",
            CredentialState::Failed { .. } => "failed",
        }
    }

    pub fn session(&self) -> Option<&AuthenticatedSession> {
        match self {
            CredentialState::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session().is_some()
    }

    pub fn domain(&self) -> Option<Domain> {
        self.session().map(|s| s.domain)
    }
}

#[derive(Debug)]
pub enum CredentialEvent {
    Submit {
        username: String,
        password: SecretString,
        domain: Domain,
    },
    Complete {
        outcome: AuthOutcome,
        at: DateTime<Utc>,
    },
    ChangeDomain(Domain),
    Logout,
}

/// Edges raised by a transition; consumed by the controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Edges {
    pub just_authenticated: bool,
    pub config_changed: bool,
}

#[derive(Debug, Clone)]
pub struct Transition {
    pub next: CredentialState,
    pub edges: Edges,
    pub next_generation: u64,
}

#[derive(Debug, Default)]
pub struct CredentialStore {
    state: CredentialState,
    generation: u64,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &CredentialState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Compute the next state for `event` without touching `self`.
    pub fn transition(&self, event: CredentialEvent) -> Result<Transition, SessionError> {
        match event {
            CredentialEvent::Submit { username, password, domain } => {
                if username.trim().is_empty() {
                    return Err(ValidationError::EmptyField { action: "login", field: "username" }
                        .into());
                }
                if password.expose_secret().is_empty() {
                    return Err(ValidationError::EmptyField { action: "login", field: "password" }
                        .into());
                }

                let previous = match &self.state {
                    CredentialState::Anonymous | CredentialState::Failed { .. } => None,
                    CredentialState::Authenticated(session) => Some(session.clone()),
                    CredentialState::Authenticating { .. } => {
                        return Err(self.precondition("login"));
                    }
                };

                Ok(Transition {
                    next: CredentialState::Authenticating {
                        pending: PendingLogin { username, domain, previous },
                    },
                    edges: Edges::default(),
                    next_generation: self.generation,
                })
            }

            CredentialEvent::Complete { outcome, at } => {
                let CredentialState::Authenticating { pending } = &self.state else {
                    return Err(self.precondition("completing authentication"));
                };

                match outcome {
                    AuthOutcome::Verified(token) if !token.is_empty() => {
                        let generation = self.generation + 1;
                        Ok(Transition {
                            next: CredentialState::Authenticated(AuthenticatedSession {
                                token,
                                domain: pending.domain,
                                since: at,
                                generation,
                            }),
                            edges: Edges { just_authenticated: true, config_changed: true },
                            next_generation: generation,
                        })
                    }
                    AuthOutcome::Verified(_) => {
                        Ok(self.reject(pending, "backend returned an empty token"))
                    }
                    AuthOutcome::Rejected(reason) => Ok(self.reject(pending, &reason)),
                }
            }

            CredentialEvent::ChangeDomain(domain) => {
                let CredentialState::Authenticated(session) = &self.state else {
                    return Err(self.precondition("domain change"));
                };

                if session.domain == domain {
                    return Ok(Transition {
                        next: self.state.clone(),
                        edges: Edges::default(),
                        next_generation: self.generation,
                    });
                }

                Ok(Transition {
                    next: CredentialState::Authenticated(AuthenticatedSession {
                        domain,
                        ..session.clone()
                    }),
                    edges: Edges { just_authenticated: false, config_changed: true },
                    next_generation: self.generation,
                })
            }

            CredentialEvent::Logout => Ok(self.logged_out()),
        }
    }

    /// Logout is valid from every state.
    pub fn logged_out(&self) -> Transition {
        Transition {
            next: CredentialState::Anonymous,
            edges: Edges { just_authenticated: false, config_changed: true },
            next_generation: self.generation,
        }
    }

    pub fn commit(&mut self, transition: Transition) -> Edges {
        self.state = transition.next;
        self.generation = transition.next_generation;
        transition.edges
    }

    /// A failed re-authentication restores the session that was active before.
    fn reject(&self, pending: &PendingLogin, reason: &str) -> Transition {
        let next = match &pending.previous {
            Some(previous) => CredentialState::Authenticated(previous.clone()),
            None => CredentialState::Failed { reason: reason.to_string() },
        };

        Transition { next, edges: Edges::default(), next_generation: self.generation }
    }

    fn precondition(&self, action: &'static str) -> SessionError {
        SessionError::Precondition { action, state: self.state.label() }
    }
}
