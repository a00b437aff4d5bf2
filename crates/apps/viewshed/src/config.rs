use std::env;
use std::time::Duration;

use clap::Parser;
use foundation::SpatialReference;
use geoprocessing::DemResolution;

use crate::controller::AnalysisInputs;

pub const DEFAULT_SERVICE_URL: &str =
    "https://elevation.arcgis.com/arcgis/rest/services/Tools/Elevation/GPServer/Viewshed";

#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Interactive viewshed analysis client")]
pub struct Args {
    /// Viewshed geoprocessing service URL (env: VIEWSHED_SERVICE_URL)
    #[arg(long)]
    pub service_url: Option<String>,

    /// Access token appended to every request (env: VIEWSHED_TOKEN)
    #[arg(long)]
    pub token: Option<String>,

    /// Status poll interval in milliseconds (env: VIEWSHED_POLL_INTERVAL_MS)
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Maximum viewshed distance in meters (env: VIEWSHED_MAX_DISTANCE)
    #[arg(long)]
    pub max_distance: Option<f64>,

    /// Observer height above the surface in meters (env: VIEWSHED_OBSERVER_OFFSET)
    #[arg(long)]
    pub observer_offset: Option<f64>,

    /// DEM resolution: FINEST, 10m, 24m, 30m or 90m (env: VIEWSHED_DEM_RESOLUTION)
    #[arg(long)]
    pub dem_resolution: Option<String>,

    /// Spatial reference of clicked coordinates (env: VIEWSHED_WKID)
    #[arg(long)]
    pub wkid: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewshedConfig {
    pub service_url: String,
    pub token: Option<String>,
    pub poll_interval: Duration,
    pub inputs: AnalysisInputs,
    pub dem_resolution: DemResolution,
    pub spatial_reference: SpatialReference,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Invalid {
        setting: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(setting: &'static str, value: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            setting,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Invalid {
                setting,
                value,
                reason,
            } => write!(f, "invalid {setting} '{value}': {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Args {
    /// Resolves settings from the process environment.
    pub fn into_config(self) -> Result<ViewshedConfig, ConfigError> {
        self.resolve(|key| env::var(key).ok())
    }

    /// Flags win over `lookup`, which wins over built-in defaults.
    pub fn resolve(
        self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<ViewshedConfig, ConfigError> {
        let env = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let pick = |flag: Option<String>, key: &str| {
            flag.filter(|v| !v.trim().is_empty()).or_else(|| env(key))
        };

        let service_url = pick(self.service_url, "VIEWSHED_SERVICE_URL")
            .unwrap_or_else(|| DEFAULT_SERVICE_URL.to_string());
        check_url(&service_url)?;

        let token = pick(self.token, "VIEWSHED_TOKEN");

        let poll_ms = flag_or_env(
            self.poll_interval_ms,
            env("VIEWSHED_POLL_INTERVAL_MS"),
            "poll interval",
            2000_u64,
        )?;
        if poll_ms == 0 {
            return Err(ConfigError::invalid("poll interval", "0", "must be positive"));
        }

        let max_distance = flag_or_env(
            self.max_distance,
            env("VIEWSHED_MAX_DISTANCE"),
            "max distance",
            5000.0,
        )?;
        if !max_distance.is_finite() || max_distance <= 0.0 {
            return Err(ConfigError::invalid(
                "max distance",
                &max_distance.to_string(),
                "must be a positive number of meters",
            ));
        }

        let observer_offset = flag_or_env(
            self.observer_offset,
            env("VIEWSHED_OBSERVER_OFFSET"),
            "observer offset",
            2.0,
        )?;
        if !observer_offset.is_finite() {
            return Err(ConfigError::invalid(
                "observer offset",
                &observer_offset.to_string(),
                "must be finite",
            ));
        }

        let dem_resolution = match pick(self.dem_resolution, "VIEWSHED_DEM_RESOLUTION") {
            Some(raw) => raw
                .parse::<DemResolution>()
                .map_err(|reason| ConfigError::invalid("DEM resolution", &raw, reason))?,
            None => DemResolution::default(),
        };

        let wkid = flag_or_env(self.wkid, env("VIEWSHED_WKID"), "wkid", 102_100_u32)?;
        let spatial_reference = SpatialReference::new(wkid);
        if !spatial_reference.is_web_mercator() && !spatial_reference.is_geographic() {
            return Err(ConfigError::invalid(
                "wkid",
                &wkid.to_string(),
                "only Web Mercator and WGS84 are supported",
            ));
        }

        Ok(ViewshedConfig {
            service_url,
            token,
            poll_interval: Duration::from_millis(poll_ms),
            inputs: AnalysisInputs {
                max_distance,
                observer_offset,
            },
            dem_resolution,
            spatial_reference,
        })
    }
}

/// A typed flag wins; otherwise the environment value is parsed.
fn flag_or_env<T>(
    flag: Option<T>,
    raw: Option<String>,
    setting: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(value) = flag {
        return Ok(value);
    }
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid(setting, &raw, e.to_string())),
        None => Ok(default),
    }
}

fn check_url(raw: &str) -> Result<(), ConfigError> {
    let url = reqwest::Url::parse(raw)
        .map_err(|e| ConfigError::invalid("service URL", raw, e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::invalid(
            "service URL",
            raw,
            format!("unsupported scheme '{other}'"),
        )),
    }
}
