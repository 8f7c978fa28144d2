use anyhow::Result;
use async_trait::async_trait;

use crate::model::{ForecastKind, VariableSet};

use super::MetadataBackend;

const DETERMINISTIC_MODELS: &[&str] = &[
    "ecmwf_ifs",
    "ecmwf_aifs025",
    "bom_access_global",
    "gfs_global",
    "cma_grapes_global",
    "ukmo_global_deterministic_10km",
];

const ENSEMBLE_MODELS: &[&str] = &["ecmwf_ifs_ensemble", "gfs_ensemble"];

/// Hourly parameters every Open-Meteo model serves.
pub const BASE_HOURLY_PARAMS: &[&str] = &[
    "shortwave_radiation",
    "temperature_2m",
    "cloud_cover",
    "wind_speed_10m",
    "wind_direction_10m",
    "wind_gusts_10m",
    "relative_humidity_2m",
    "dewpoint_2m",
];

pub fn models(kind: ForecastKind) -> Vec<&'static str> {
    match kind {
        ForecastKind::Deterministic => DETERMINISTIC_MODELS.to_vec(),
        ForecastKind::Ensemble => ENSEMBLE_MODELS.to_vec(),
        ForecastKind::All => DETERMINISTIC_MODELS.iter().chain(ENSEMBLE_MODELS).copied().collect(),
    }
}

/// Open-Meteo needs no metadata endpoint: every model supports the same base
/// parameter list, served through the regular cache path.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenMeteoCatalog;

#[async_trait]
impl MetadataBackend for OpenMeteoCatalog {
    async fn fetch(&self, _model: &str, _domain: &str) -> Result<VariableSet> {
        Ok(BASE_HOURLY_PARAMS.iter().map(|v| v.to_string()).collect())
    }
}
