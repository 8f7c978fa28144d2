use thiserror::Error;

use crate::cache::Epoch;

/// Missing or malformed input. Recovered locally by re-prompting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{action}: {field} must not be empty")]
    EmptyField { action: &'static str, field: &'static str },

    #[error(
        "Unknown domain '{value}'. Supported domains: adelaide, brisbane, sydney, darwin, \
         canberra, hobart, melbourne, perth, nqld."
    )]
    UnknownDomain { value: String },
}

/// Errors surfaced by session transitions.
///
/// None of these leave the session in a worse state than before the
/// triggering action: validation and precondition failures happen before any
/// mutation, and a rejected re-authentication keeps the existing session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{action} failed: {reason}")]
    Authentication { action: &'static str, reason: String },

    #[error("{action} is not allowed while {state}")]
    Precondition { action: &'static str, state: &'static str },

    #[error("Unknown provider '{0}'")]
    UnknownProvider(String),

    #[error(transparent)]
    Metadata(#[from] MetadataFetchError),
}

/// A single model's metadata could not be fetched.
///
/// Never cached: the next lookup for the same key tries again.
#[derive(Debug, Error)]
#[error("{provider}: failed to fetch metadata for model '{model}' (domain '{domain}'): {cause}")]
pub struct MetadataFetchError {
    pub provider: String,
    pub model: String,
    pub domain: String,
    #[source]
    pub cause: anyhow::Error,
}

/// A fetch result arrived for an instance that has since been replaced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "{provider}: dropped metadata for '{model}' from epoch {ticket_epoch} (current epoch: {current_epoch})"
)]
pub struct StaleEpochError {
    pub provider: String,
    pub model: String,
    pub ticket_epoch: Epoch,
    pub current_epoch: Epoch,
}
