use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, convert::TryFrom, fmt, str::FromStr};

use crate::error::ValidationError;

/// Variables reported by a provider for one model, by raw provider name.
pub type VariableSet = BTreeSet<String>;

/// Domain the `gso` model is always queried with, whatever the bound domain.
pub const GSO_DOMAIN: &str = "australia";

/// Regional domain the authenticated provider is bound to.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Adelaide,
    #[default]
    Brisbane,
    Sydney,
    Darwin,
    Canberra,
    Hobart,
    Melbourne,
    Perth,
    Nqld,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Adelaide => "adelaide",
            Domain::Brisbane => "brisbane",
            Domain::Sydney => "sydney",
            Domain::Darwin => "darwin",
            Domain::Canberra => "canberra",
            Domain::Hobart => "hobart",
            Domain::Melbourne => "melbourne",
            Domain::Perth => "perth",
            Domain::Nqld => "nqld",
        }
    }

    /// Selection order used by the login form and the domain picker.
    pub const fn all() -> &'static [Domain] {
        &[
            Domain::Brisbane,
            Domain::Adelaide,
            Domain::Sydney,
            Domain::Darwin,
            Domain::Canberra,
            Domain::Hobart,
            Domain::Melbourne,
            Domain::Perth,
            Domain::Nqld,
        ]
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let lower = value.trim().to_lowercase();

        Domain::all()
            .iter()
            .copied()
            .find(|d| d.as_str() == lower)
            .ok_or_else(|| ValidationError::UnknownDomain { value: value.to_string() })
    }
}

impl TryFrom<&str> for Domain {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Which family of models a caller is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForecastKind {
    Deterministic,
    Ensemble,
    All,
}
