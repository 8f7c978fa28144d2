use async_trait::async_trait;
use secrecy::SecretString;
use std::fmt::Debug;

use crate::credential::IdToken;

pub mod cognito;

pub use cognito::CognitoAuthBackend;

/// Result of asking the auth backend to verify a username/password pair.
#[derive(Debug, Clone)]
pub enum AuthOutcome {
    Verified(IdToken),
    /// Human-readable reason; never contains the password.
    Rejected(String),
}

/// Credential verification collaborator.
///
/// Implementations fold transport failures into [`AuthOutcome::Rejected`] so
/// the session sees a single failure path.
#[async_trait]
pub trait AuthBackend: Send + Sync + Debug {
    async fn verify(&self, username: &str, password: &SecretString) -> AuthOutcome;
}
