use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use tracing::info;

use crate::handlers::position_source::parse_route;
use crate::handlers::tracker::TrackerSettings;
use crate::models::error::ConfigError;
use crate::models::position::Position;

pub struct Config {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub api_base_url: String,
    pub nominatim_url: String,
    pub geocoder_language: String,
    pub user_agent: String,
    pub static_dir: Option<PathBuf>,
    pub max_concurrent_sessions: usize,
    pub tracker: TrackerSettings,
    pub simulate_route: Option<Vec<Position>>,
    pub simulate_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = TrackerSettings::default();
        Ok(Self {
            host: try_load("HOST", "0.0.0.0")?,
            port: try_load("PORT", "3000")?,
            jwt_secret: try_load("JWT_SECRET", "SECRET")?,
            api_base_url: try_load("API_BASE_URL", "http://localhost:8080")?,
            nominatim_url: try_load("NOMINATIM_URL", "https://nominatim.openstreetmap.org")?,
            geocoder_language: try_load("GEOCODER_LANGUAGE", "es")?,
            user_agent: try_load("USER_AGENT", "GeoRules/1.0")?,
            static_dir: env::var("STATIC_DIR").ok().map(PathBuf::from),
            max_concurrent_sessions: try_load("MAX_CONCURRENT_SESSIONS", "10000")?,
            tracker: TrackerSettings {
                radius_km: try_load("RADIUS_KM", &defaults.radius_km.to_string())?,
                hysteresis_km: try_load("HYSTERESIS_KM", &defaults.hysteresis_km.to_string())?,
                pan_threshold_km: try_load("PAN_THRESHOLD_KM", &defaults.pan_threshold_km.to_string())?,
                zoom: try_load("ZOOM", &defaults.zoom.to_string())?,
            },
            simulate_route: env::var("SIMULATE_ROUTE").ok().map(|raw| parse_route(&raw)).transpose()?,
            simulate_interval: Duration::from_millis(try_load("SIMULATE_INTERVAL_MS", "1000")?),
        })
    }
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    parse(key, &raw)
}

fn parse<T: FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        message: e.to_string(),
    })
}
