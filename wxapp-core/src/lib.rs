//! Core library for the `wxapp` CLI.
//!
//! This crate defines:
//! - Configuration loading and the Cognito login flow
//! - The credential state machine and the provider registry derived from it
//! - Per-provider metadata caches invalidated by configuration epochs
//! - Canonical weather-variable naming across providers
//!
//! It is used by `wxapp-cli`, but can also be reused by other front ends. The
//! entry point is [`LifecycleController`].

pub mod auth;
pub mod cache;
pub mod canonical;
pub mod config;
pub mod controller;
pub mod credential;
pub mod error;
pub mod model;
pub mod notification;
pub mod provider;
pub mod session;

#[cfg(test)]
mod testing;

pub use config::{CognitoConfig, Config};
pub use controller::LifecycleController;
pub use credential::CredentialState;
pub use error::{MetadataFetchError, SessionError, ValidationError};
pub use model::{Domain, ForecastKind, VariableSet};
pub use provider::{ProviderDescriptor, ProviderId, ProviderRegistry, VariableUnion};
pub use session::{AuthSummary, Frame};
