//! Canonical variable names.
//!
//! Providers name the same physical quantity differently (`t2`, `temp_2m`,
//! `air_temperature_2m`, ...). Every raw name maps to at most one canonical
//! name; names missing from the table are their own canonical form.

use std::{
    collections::{BTreeSet, HashMap},
    sync::LazyLock,
};

/// Canonical name followed by its aliases. The canonical name is always an
/// alias of itself. If an alias appears under two entries the first one wins.
const ALIASES: &[(&str, &[&str])] = &[
    // Temperature
    (
        "temperature_2m",
        &[
            "t2", "temp_2m", "air_temperature_2m", "t2m", "2m_temperature", "temp", "t", "tas",
            "air_temp",
        ],
    ),
    (
        "temperature_2m_max",
        &["t2_max", "tmax", "temp_max", "2m_temperature_max", "temperature_max"],
    ),
    (
        "temperature_2m_min",
        &["t2_min", "tmin", "temp_min", "2m_temperature_min", "temperature_min"],
    ),
    ("dewpoint_2m", &["d2", "dewpoint", "dew_point_2m", "d2m", "dwpt", "dew_point"]),
    // Wind
    (
        "wind_speed_10m",
        &["ws10", "wind_speed", "wspd", "10m_wind_speed", "ws_10m", "u10", "v10", "ws", "wind"],
    ),
    (
        "wind_direction_10m",
        &["wd10", "wind_direction", "wdir", "10m_wind_direction", "wd_10m", "wd", "wdir_10m"],
    ),
    (
        "wind_gusts_10m",
        &["wg10", "wind_gust_10m", "wind_gusts", "wpgt", "gust_10m", "gusts", "gust", "wg"],
    ),
    // Precipitation
    (
        "precipitation",
        &["tp", "total_precipitation", "precip", "prcp", "rain", "rainfall", "pr", "accum_precip"],
    ),
    ("snowfall", &["snow", "snow_depth", "sf", "snow_accum"]),
    // Humidity
    (
        "relative_humidity_2m",
        &["rh2", "rh_2m", "humidity", "rhum", "rh", "relative_humidity", "hur", "rel_hum"],
    ),
    // Pressure
    (
        "pressure_msl",
        &[
            "msl", "mean_sea_level_pressure", "pressure", "mslp", "pres", "sea_level_pressure",
            "slp", "pmsl", "psl",
        ],
    ),
    ("surface_pressure", &["sp", "sfc_pressure", "ps", "sfc_pres"]),
    // Cloud and radiation
    ("cloud_cover", &["tcc", "total_cloud_cover", "cloudcover", "cloud", "clouds", "cld", "clt"]),
    ("cloud_cover_low", &["lcc", "low_cloud_cover", "low_cloud"]),
    ("cloud_cover_mid", &["mcc", "mid_cloud_cover", "medium_cloud_cover", "mid_cloud"]),
    ("cloud_cover_high", &["hcc", "high_cloud_cover", "high_cloud"]),
    (
        "shortwave_radiation",
        &[
            "ssrd",
            "solar_radiation",
            "sr",
            "surface_solar_radiation",
            "swr",
            "ghi",
            "sw_dn_avg",
            "sw_dn",
            "surface_global_irradiance",
            "downwelling_shortwave",
            "ghi_avg",
            "swdown",
            "rsds",
            "global_horizontal_irradiance",
            "sw_radiation",
        ],
    ),
    (
        "direct_radiation",
        &["direct_normal_irradiance", "dni", "beam_radiation", "dni_avg", "sw_dir", "direct_solar"],
    ),
    (
        "diffuse_radiation",
        &[
            "diffuse_horizontal_irradiance", "dhi", "diffuse_solar_radiation", "dhi_avg",
            "sw_diff", "diffuse_solar",
        ],
    ),
    (
        "longwave_radiation",
        &["lw_dn", "lw_down", "lwdown", "longwave_down", "downwelling_longwave", "rlds"],
    ),
    // Waves
    ("wave_height", &["hs", "significant_wave_height", "swh", "swell_wave_height"]),
    ("wave_period", &["tp", "peak_wave_period", "wave_period_peak"]),
    ("wave_direction", &["wd", "mean_wave_direction", "mwd"]),
    // Other
    ("visibility", &["vis", "horizontal_visibility"]),
    ("cape", &["convective_available_potential_energy"]),
    ("lifted_index", &["li"]),
    ("soil_temperature_0_to_7cm", &["st0_7", "soil_temp_0_7"]),
    ("soil_moisture_0_to_7cm", &["sm0_7", "soil_moisture_0_7"]),
];

/// Source naming schemes [`from_canonical`] can translate into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingScheme {
    Canonical,
    Aws,
    Meteostat,
}

const AWS_NAMES: &[(&str, &str)] = &[
    ("temperature_2m", "t2"),
    ("wind_speed_10m", "ws10"),
    ("wind_direction_10m", "wd10"),
    ("precipitation", "tp"),
];

const METEOSTAT_NAMES: &[(&str, &str)] = &[
    ("temperature_2m", "temp"),
    ("dewpoint_2m", "dwpt"),
    ("relative_humidity_2m", "rhum"),
    ("wind_direction_10m", "wdir"),
    ("wind_speed_10m", "wspd"),
    ("wind_gusts_10m", "wpgt"),
    ("surface_pressure", "pres"),
    ("precipitation", "prcp"),
];

static ALIAS_TO_CANONICAL: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    let mut map = HashMap::new();
    for (canonical, aliases) in ALIASES {
        map.entry(*canonical).or_insert(*canonical);
        for alias in *aliases {
            map.entry(*alias).or_insert(*canonical);
        }
    }
    map
});

/// Canonical form of `name`; unknown names are returned unchanged.
pub fn to_canonical(name: &str) -> String {
    ALIAS_TO_CANONICAL
        .get(name.to_lowercase().as_str())
        .map(|c| c.to_string())
        .unwrap_or_else(|| name.to_string())
}

pub fn are_equivalent(a: &str, b: &str) -> bool {
    to_canonical(a) == to_canonical(b)
}

pub fn canonical_names() -> Vec<&'static str> {
    let mut names: Vec<_> = ALIASES.iter().map(|(c, _)| *c).collect();
    names.sort_unstable();
    names
}

/// All names that resolve to `canonical`, including itself.
pub fn alternatives(canonical: &str) -> BTreeSet<String> {
    let mut names: BTreeSet<String> = ALIAS_TO_CANONICAL
        .iter()
        .filter(|(_, c)| **c == canonical)
        .map(|(alias, _)| alias.to_string())
        .collect();
    names.insert(canonical.to_string());
    names
}

pub fn standardize<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    names.iter().map(|n| to_canonical(n.as_ref())).collect()
}

/// Canonical names present in both lists, sorted.
pub fn common_variables<A: AsRef<str>, B: AsRef<str>>(a: &[A], b: &[B]) -> Vec<String> {
    let left: BTreeSet<String> = standardize(a).into_iter().collect();
    let right: BTreeSet<String> = standardize(b).into_iter().collect();
    left.intersection(&right).cloned().collect()
}

pub fn from_canonical(canonical: &str, scheme: NamingScheme) -> String {
    let table = match scheme {
        NamingScheme::Canonical => return canonical.to_string(),
        NamingScheme::Aws => AWS_NAMES,
        NamingScheme::Meteostat => METEOSTAT_NAMES,
    };

    table
        .iter()
        .find(|(c, _)| *c == canonical)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| canonical.to_string())
}
