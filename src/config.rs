//! Layered configuration: compiled defaults, then `config.toml`, then
//! `BUSTRACK_*` environment variables (`__` separates sections).

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::error::TrackerError;

pub const CONFIG_FILE: &str = "config.toml";
pub const ENV_PREFIX: &str = "BUSTRACK_";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub basic: BasicConfig,
    pub auth: AuthConfig,
    pub eta: EtaConfig,
    pub simulator: SimulatorConfig,
    pub seed: SeedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicConfig {
    pub listen_addr: String,
    pub database_url: String,
    pub loglevel: String,
    /// Base64 of at least 64 random bytes. A fresh key is generated when
    /// absent, which invalidates sessions on every restart.
    pub cookie_secret: Option<String>,
    pub insecure_cookie: bool,
    /// Offset of the campus wall clock from UTC; stop and schedule times are
    /// interpreted in it.
    pub utc_offset_minutes: i32,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            database_url: "sqlite:data/bustrack.sqlite".to_string(),
            loglevel: "info".to_string(),
            cookie_secret: None,
            insecure_cookie: false,
            utc_offset_minutes: 6 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub login_per_minute: u32,
    pub session_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login_per_minute: 30,
            session_hours: 12,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct EtaConfig {
    pub default_speed_kmh: f64,
    pub buffer_factor: f64,
    /// Locations older than this are not considered "live".
    pub active_window_secs: i64,
}

impl EtaConfig {
    pub fn validate(&self) -> Result<(), TrackerError> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.default_speed_kmh) {
            return Err(TrackerError::Config(
                "eta.default_speed_kmh must be a positive number".to_string(),
            ));
        }
        if !positive(self.buffer_factor) {
            return Err(TrackerError::Config(
                "eta.buffer_factor must be a positive number".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for EtaConfig {
    fn default() -> Self {
        Self {
            default_speed_kmh: 30.0,
            buffer_factor: 1.2,
            active_window_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub speed_kmh: f64,
    pub real_driver_window_secs: i64,
    /// 0 runs until shutdown.
    pub duration_secs: u64,
    /// Empty simulates every active bus.
    pub bus_ids: Vec<i64>,
    pub centre_lat: f64,
    pub centre_lon: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 10,
            speed_kmh: 30.0,
            real_driver_window_secs: 300,
            duration_secs: 0,
            bus_ids: Vec::new(),
            centre_lat: 23.8859,
            centre_lon: 90.3971,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    pub admin_username: String,
    pub admin_password: String,
    pub admin_email: String,
    pub authority_username: String,
    pub authority_password: String,
    pub authority_email: String,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            admin_username: "admin".to_string(),
            admin_password: "admin123".to_string(),
            admin_email: "admin@example.com".to_string(),
            authority_username: "authority".to_string(),
            authority_password: "authority123".to_string(),
            authority_email: "authority@example.com".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, TrackerError> {
        let cfg: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| TrackerError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), TrackerError> {
        self.eta.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn eta_speed_and_buffer_must_be_positive() {
        for (speed, buffer) in [(0.0, 1.2), (-5.0, 1.2), (f64::NAN, 1.2), (30.0, 0.0)] {
            let eta = EtaConfig {
                default_speed_kmh: speed,
                buffer_factor: buffer,
                ..EtaConfig::default()
            };
            assert!(
                matches!(eta.validate(), Err(TrackerError::Config(_))),
                "accepted speed {speed}, buffer {buffer}"
            );
        }
    }
}
